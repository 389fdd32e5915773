//! Node and edge storage for the link graph.
//!
//! Pages are interned by normalized URL into a petgraph arena, so every
//! algorithm works on dense indices instead of string keys. The store keeps
//! a generation counter that moves on every effectful mutation; cached
//! analysis compares against it to decide whether it is still valid.

use crate::model::{LinkEdge, LinkMetadata, MetaValue, NodeId, PageNode};
use crate::url_norm::{extract_domain, extract_url_path, normalize_url};
use chrono::Utc;
use petgraph::Direction;
use petgraph::graph::DiGraph;
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

/// Read-only adjacency snapshot indexed by `NodeId::index()`.
///
/// Neighbor lists and `order` are sorted by URL so traversals are
/// deterministic regardless of insertion order.
#[derive(Debug, Clone)]
pub struct Adjacency {
    pub order: Vec<usize>,
    pub outbound: Vec<Vec<usize>>,
    pub inbound: Vec<Vec<usize>>,
}

impl Adjacency {
    pub fn len(&self) -> usize {
        self.outbound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outbound.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct GraphStore {
    graph: DiGraph<PageNode, LinkEdge>,
    index: HashMap<String, NodeId>,
    generation: u64,
    base_importance: f64,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::with_base_importance(1.0)
    }

    pub fn with_base_importance(base_importance: f64) -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            generation: 0,
            base_importance,
        }
    }

    /// Make sure a page exists. Returns `false` only when the URL does not parse.
    pub fn ensure_node(&mut self, url: &str) -> bool {
        match normalize_url(url) {
            Some(normalized) => {
                self.intern(normalized);
                true
            }
            None => {
                trace!("Ignoring unparseable URL {}", url);
                false
            }
        }
    }

    /// Record one observation of a link from `from` to `to`.
    ///
    /// Repeated observations of the same ordered pair bump the edge count and
    /// refresh `last_seen`; anchor text and context are overwritten with the
    /// latest supplied values. Unparseable URLs and self-links are ignored.
    pub fn add_link(&mut self, from: &str, to: &str, metadata: LinkMetadata) -> bool {
        let (Some(source), Some(target)) = (normalize_url(from), normalize_url(to)) else {
            trace!("Ignoring link with unparseable endpoint: {} -> {}", from, to);
            return false;
        };
        if source == target {
            trace!("Ignoring self-link on {}", source);
            return false;
        }

        let source_id = self.intern(source);
        let target_id = self.intern(target);
        let now = Utc::now();

        match self.graph.find_edge(source_id, target_id) {
            Some(edge_id) => {
                let edge = &mut self.graph[edge_id];
                edge.count += 1;
                edge.last_seen = now;
                if metadata.anchor_text.is_some() {
                    edge.anchor_text = metadata.anchor_text;
                }
                if metadata.context.is_some() {
                    edge.context = metadata.context;
                }
            }
            None => {
                self.graph.add_edge(
                    source_id,
                    target_id,
                    LinkEdge {
                        count: 1,
                        anchor_text: metadata.anchor_text,
                        context: metadata.context,
                        first_seen: now,
                        last_seen: now,
                    },
                );
            }
        }

        self.generation += 1;
        true
    }

    fn intern(&mut self, normalized: String) -> NodeId {
        if let Some(&id) = self.index.get(&normalized) {
            return id;
        }

        let node = PageNode {
            domain: extract_domain(&normalized),
            path: extract_url_path(&normalized),
            url: normalized.clone(),
            importance: self.base_importance,
            importance_history: Vec::new(),
            depth: 0,
            discovered_at: Utc::now(),
            metadata: BTreeMap::new(),
        };
        let id = self.graph.add_node(node);
        self.index.insert(normalized, id);
        self.generation += 1;
        id
    }

    /// Pages linked from `url`, sorted by URL. Unknown pages have none.
    pub fn outbound(&self, url: &str) -> Vec<NodeId> {
        self.neighbors(url, Direction::Outgoing)
    }

    /// Pages linking to `url`, sorted by URL. Unknown pages have none.
    pub fn inbound(&self, url: &str) -> Vec<NodeId> {
        self.neighbors(url, Direction::Incoming)
    }

    fn neighbors(&self, url: &str, direction: Direction) -> Vec<NodeId> {
        let Some(id) = self.node_id(url) else {
            return Vec::new();
        };
        let mut ids: Vec<NodeId> = self.graph.neighbors_directed(id, direction).collect();
        ids.sort_by(|a, b| self.graph[*a].url.cmp(&self.graph[*b].url));
        ids
    }

    pub fn node_id(&self, url: &str) -> Option<NodeId> {
        let normalized = normalize_url(url)?;
        self.index.get(&normalized).copied()
    }

    pub fn node(&self, url: &str) -> Option<&PageNode> {
        self.node_id(url).map(|id| &self.graph[id])
    }

    pub fn node_by_id(&self, id: NodeId) -> Option<&PageNode> {
        self.graph.node_weight(id)
    }

    pub fn url_of(&self, id: NodeId) -> Option<&str> {
        self.graph.node_weight(id).map(|node| node.url.as_str())
    }

    pub fn edge(&self, from: &str, to: &str) -> Option<&LinkEdge> {
        self.edge_between(self.node_id(from)?, self.node_id(to)?)
    }

    pub fn edge_between(&self, from: NodeId, to: NodeId) -> Option<&LinkEdge> {
        self.graph
            .find_edge(from, to)
            .and_then(|edge_id| self.graph.edge_weight(edge_id))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct ordered pairs ever linked
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Annotate the crawl depth of a page. Returns `false` for unknown pages.
    pub fn set_depth(&mut self, url: &str, depth: u32) -> bool {
        let Some(id) = self.node_id(url) else {
            return false;
        };
        self.graph[id].depth = depth;
        self.generation += 1;
        true
    }

    /// Attach caller metadata to a page. Returns `false` for unknown pages.
    pub fn set_node_metadata(&mut self, url: &str, key: &str, value: MetaValue) -> bool {
        let Some(id) = self.node_id(url) else {
            return false;
        };
        self.graph[id].metadata.insert(key.to_string(), value);
        self.generation += 1;
        true
    }

    /// Pages in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &PageNode)> {
        self.graph
            .node_indices()
            .map(move |id| (id, &self.graph[id]))
    }

    /// Page ids sorted by URL
    pub fn sorted_node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.graph.node_indices().collect();
        ids.sort_by(|a, b| self.graph[*a].url.cmp(&self.graph[*b].url));
        ids
    }

    /// Every distinct link, sorted by source then target URL
    pub fn edges(&self) -> Vec<(NodeId, NodeId, &LinkEdge)> {
        let mut edges: Vec<(NodeId, NodeId, &LinkEdge)> = self
            .graph
            .edge_references()
            .map(|edge| (edge.source(), edge.target(), edge.weight()))
            .collect();
        edges.sort_by(|a, b| {
            self.graph[a.0]
                .url
                .cmp(&self.graph[b.0].url)
                .then_with(|| self.graph[a.1].url.cmp(&self.graph[b.1].url))
        });
        edges
    }

    pub fn adjacency(&self) -> Adjacency {
        let n = self.graph.node_count();
        let mut outbound = vec![Vec::new(); n];
        let mut inbound = vec![Vec::new(); n];
        for edge in self.graph.edge_references() {
            outbound[edge.source().index()].push(edge.target().index());
            inbound[edge.target().index()].push(edge.source().index());
        }

        let url = |i: &usize| self.graph[NodeId::new(*i)].url.as_str();
        for list in outbound.iter_mut().chain(inbound.iter_mut()) {
            list.sort_by(|a, b| url(a).cmp(url(b)));
        }
        let order = self
            .sorted_node_ids()
            .into_iter()
            .map(|id| id.index())
            .collect();

        Adjacency {
            order,
            outbound,
            inbound,
        }
    }

    /// Overwrite each page's importance with a ranking indexed by
    /// `NodeId::index()`. This is ranker output, so it does not move the
    /// generation.
    pub(crate) fn apply_importance(&mut self, scores: &[f64], history_len: usize) {
        for (i, score) in scores.iter().enumerate() {
            let Some(node) = self.graph.node_weight_mut(NodeId::new(i)) else {
                continue;
            };
            node.importance = *score;
            if history_len > 0 {
                node.importance_history.push(*score);
                let excess = node.importance_history.len().saturating_sub(history_len);
                node.importance_history.drain(..excess);
            }
        }
    }

    /// Read-only petgraph view, used for cross-checks and custom traversals
    pub fn graph(&self) -> &DiGraph<PageNode, LinkEdge> {
        &self.graph
    }

    /// Drop every page and link
    pub fn clear(&mut self) {
        self.graph.clear();
        self.index.clear();
        self.generation += 1;
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}
