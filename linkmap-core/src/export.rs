// Graph export in JSON, Graphviz DOT, CSV and adjacency matrix form

use crate::error::{GraphError, Result};
use crate::model::{LinkEdge, MetaValue, NodeId};
use crate::store::GraphStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Dot,
    Csv,
    Adjacency,
}

impl FromStr for ExportFormat {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "dot" => Ok(ExportFormat::Dot),
            "csv" => Ok(ExportFormat::Csv),
            "adjacency" => Ok(ExportFormat::Adjacency),
            _ => Err(GraphError::UnsupportedFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Drop pages ranked below this value, together with their links
    pub min_importance: Option<f64>,
    /// Include anchor text, link context and page metadata
    pub include_metadata: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjacencyMatrix {
    /// Row and column order, sorted by URL
    pub nodes: Vec<String>,
    /// `matrix[i][j]` is the observation count of the link from row `i` to column `j`
    pub matrix: Vec<Vec<u64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphExport {
    Json(serde_json::Value),
    Dot(String),
    Csv(String),
    Adjacency(AdjacencyMatrix),
}

impl GraphExport {
    pub fn format(&self) -> ExportFormat {
        match self {
            GraphExport::Json(_) => ExportFormat::Json,
            GraphExport::Dot(_) => ExportFormat::Dot,
            GraphExport::Csv(_) => ExportFormat::Csv,
            GraphExport::Adjacency(_) => ExportFormat::Adjacency,
        }
    }

    /// Text form suitable for writing to a file
    pub fn render(&self) -> Result<String> {
        match self {
            GraphExport::Json(value) => Ok(serde_json::to_string_pretty(value)?),
            GraphExport::Dot(text) | GraphExport::Csv(text) => Ok(text.clone()),
            GraphExport::Adjacency(matrix) => Ok(serde_json::to_string_pretty(matrix)?),
        }
    }
}

#[derive(Debug, Serialize)]
struct ExportNode<'a> {
    url: &'a str,
    domain: &'a str,
    path: &'a str,
    importance: f64,
    depth: u32,
    discovered_at: DateTime<Utc>,
    in_degree: usize,
    out_degree: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a BTreeMap<String, MetaValue>>,
}

#[derive(Debug, Serialize)]
struct ExportEdge<'a> {
    source: &'a str,
    target: &'a str,
    count: u64,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    anchor_text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ExportSummary {
    node_count: usize,
    link_count: usize,
    total_observations: u64,
    density: f64,
    domain_count: usize,
    mean_importance: f64,
}

#[derive(Debug, Serialize)]
struct JsonGraph<'a> {
    nodes: Vec<ExportNode<'a>>,
    edges: Vec<ExportEdge<'a>>,
    statistics: ExportSummary,
}

/// The pages and links that survive the importance filter, in URL order
struct Selection<'a> {
    nodes: Vec<NodeId>,
    edges: Vec<(NodeId, NodeId, &'a LinkEdge)>,
}

fn select<'a>(store: &'a GraphStore, importance: &[f64], options: &ExportOptions) -> Selection<'a> {
    let keep = |id: NodeId| match options.min_importance {
        Some(min) => importance.get(id.index()).copied().unwrap_or(0.0) >= min,
        None => true,
    };
    let nodes: Vec<NodeId> = store
        .sorted_node_ids()
        .into_iter()
        .filter(|id| keep(*id))
        .collect();
    let edges = store
        .edges()
        .into_iter()
        .filter(|(from, to, _)| keep(*from) && keep(*to))
        .collect();
    Selection { nodes, edges }
}

/// Serialize the store. `importance` holds one score per page, indexed by
/// `NodeId::index()`.
pub fn export(
    store: &GraphStore,
    format: ExportFormat,
    importance: &[f64],
    options: &ExportOptions,
) -> Result<GraphExport> {
    let selection = select(store, importance, options);
    match format {
        ExportFormat::Json => export_json(store, &selection, importance, options),
        ExportFormat::Dot => Ok(GraphExport::Dot(export_dot(
            store, &selection, importance, options,
        ))),
        ExportFormat::Csv => export_csv(store, &selection, importance, options),
        ExportFormat::Adjacency => Ok(GraphExport::Adjacency(export_adjacency(
            store, &selection,
        ))),
    }
}

fn score(importance: &[f64], id: NodeId) -> f64 {
    importance.get(id.index()).copied().unwrap_or(0.0)
}

fn url<'a>(store: &'a GraphStore, id: NodeId) -> &'a str {
    store.url_of(id).unwrap_or_default()
}

fn export_json(
    store: &GraphStore,
    selection: &Selection<'_>,
    importance: &[f64],
    options: &ExportOptions,
) -> Result<GraphExport> {
    let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
    let mut out_degree: HashMap<NodeId, usize> = HashMap::new();
    for (from, to, _) in &selection.edges {
        *out_degree.entry(*from).or_insert(0) += 1;
        *in_degree.entry(*to).or_insert(0) += 1;
    }

    let nodes: Vec<ExportNode<'_>> = selection
        .nodes
        .iter()
        .filter_map(|&id| {
            let node = store.node_by_id(id)?;
            Some(ExportNode {
                url: &node.url,
                domain: &node.domain,
                path: &node.path,
                importance: score(importance, id),
                depth: node.depth,
                discovered_at: node.discovered_at,
                in_degree: in_degree.get(&id).copied().unwrap_or(0),
                out_degree: out_degree.get(&id).copied().unwrap_or(0),
                metadata: options.include_metadata.then_some(&node.metadata),
            })
        })
        .collect();

    let edges: Vec<ExportEdge<'_>> = selection
        .edges
        .iter()
        .map(|(from, to, edge)| ExportEdge {
            source: url(store, *from),
            target: url(store, *to),
            count: edge.count,
            first_seen: edge.first_seen,
            last_seen: edge.last_seen,
            anchor_text: edge
                .anchor_text
                .as_deref()
                .filter(|_| options.include_metadata),
            context: edge.context.as_deref().filter(|_| options.include_metadata),
        })
        .collect();

    let node_count = nodes.len();
    let link_count = edges.len();
    let mut domains: Vec<&str> = nodes.iter().map(|n| n.domain).collect();
    domains.sort_unstable();
    domains.dedup();

    let statistics = ExportSummary {
        node_count,
        link_count,
        total_observations: edges.iter().map(|e| e.count).sum(),
        density: density(node_count, link_count),
        domain_count: domains.len(),
        mean_importance: if node_count > 0 {
            nodes.iter().map(|n| n.importance).sum::<f64>() / node_count as f64
        } else {
            0.0
        },
    };

    let value = serde_json::to_value(JsonGraph {
        nodes,
        edges,
        statistics,
    })?;
    Ok(GraphExport::Json(value))
}

/// Links present divided by links possible, for a simple directed graph
pub fn density(node_count: usize, link_count: usize) -> f64 {
    if node_count < 2 {
        return 0.0;
    }
    link_count as f64 / (node_count as f64 * (node_count as f64 - 1.0))
}

fn escape_dot(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn export_dot(
    store: &GraphStore,
    selection: &Selection<'_>,
    importance: &[f64],
    options: &ExportOptions,
) -> String {
    let mut out = String::new();
    out.push_str("digraph links {\n");
    out.push_str("  rankdir=LR;\n");
    out.push_str("  node [shape=box, style=rounded];\n");

    for &id in &selection.nodes {
        let Some(node) = store.node_by_id(id) else {
            continue;
        };
        let _ = write!(
            out,
            "  \"{}\" [label=\"{}{}\", tooltip=\"{}\", importance=\"{:.6}\"",
            escape_dot(&node.url),
            escape_dot(&node.domain),
            escape_dot(&node.path),
            escape_dot(&node.url),
            score(importance, id)
        );
        if options.include_metadata {
            for (key, value) in &node.metadata {
                let _ = write!(
                    out,
                    ", \"meta_{}\"=\"{}\"",
                    escape_dot(key),
                    escape_dot(&value.to_flat_string())
                );
            }
        }
        out.push_str("];\n");
    }

    for (from, to, edge) in &selection.edges {
        let _ = write!(
            out,
            "  \"{}\" -> \"{}\" [weight={}, penwidth={:.1}",
            escape_dot(url(store, *from)),
            escape_dot(url(store, *to)),
            edge.count,
            1.0 + (edge.count as f64).ln()
        );
        if options.include_metadata
            && let Some(anchor) = &edge.anchor_text
        {
            let _ = write!(out, ", label=\"{}\"", escape_dot(anchor));
        }
        out.push_str("];\n");
    }

    out.push_str("}\n");
    out
}

fn export_csv(
    store: &GraphStore,
    selection: &Selection<'_>,
    importance: &[f64],
    options: &ExportOptions,
) -> Result<GraphExport> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![
        "source",
        "target",
        "count",
        "first_seen",
        "last_seen",
        "source_importance",
        "target_importance",
    ];
    if options.include_metadata {
        header.extend(["anchor_text", "context"]);
    }
    writer.write_record(&header)?;

    for (from, to, edge) in &selection.edges {
        let mut record = vec![
            url(store, *from).to_string(),
            url(store, *to).to_string(),
            edge.count.to_string(),
            edge.first_seen.to_rfc3339(),
            edge.last_seen.to_rfc3339(),
            format!("{:.6}", score(importance, *from)),
            format!("{:.6}", score(importance, *to)),
        ];
        if options.include_metadata {
            record.push(edge.anchor_text.clone().unwrap_or_default());
            record.push(edge.context.clone().unwrap_or_default());
        }
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| GraphError::Io(std::io::Error::other(e.error().to_string())))?;
    let text = String::from_utf8(bytes).map_err(|e| GraphError::Io(std::io::Error::other(e)))?;
    Ok(GraphExport::Csv(text))
}

fn export_adjacency(store: &GraphStore, selection: &Selection<'_>) -> AdjacencyMatrix {
    let position: HashMap<NodeId, usize> = selection
        .nodes
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, i))
        .collect();

    let n = selection.nodes.len();
    let mut matrix = vec![vec![0u64; n]; n];
    for (from, to, edge) in &selection.edges {
        if let (Some(&row), Some(&col)) = (position.get(from), position.get(to)) {
            matrix[row][col] = edge.count;
        }
    }

    AdjacencyMatrix {
        nodes: selection
            .nodes
            .iter()
            .map(|&id| url(store, id).to_string())
            .collect(),
        matrix,
    }
}
