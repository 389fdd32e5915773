//! Link cycle detection.
//!
//! Runs a depth-first search from every unvisited page (in URL order) with an
//! explicit frame stack. Reaching a page that is still on the current path
//! closes a cycle made of the path suffix starting at that page.

use crate::budget::AnalysisBudget;
use crate::model::{EdgeSummary, NodeId};
use crate::store::GraphStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

const NOT_ON_PATH: usize = usize::MAX;

/// A directed cycle of distinct pages.
///
/// `nodes` starts at the lexicographically smallest URL; the closing link
/// runs from the last entry back to the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    pub nodes: Vec<String>,
    pub length: usize,
    /// Mean observation count over the cycle's links
    pub strength: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<EdgeSummary>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycles: Vec<Cycle>,
    pub truncated: bool,
}

pub fn detect_cycles(
    store: &GraphStore,
    max_cycle_length: usize,
    include_metadata: bool,
    budget: &AnalysisBudget,
) -> CycleReport {
    let adjacency = store.adjacency();
    let n = adjacency.len();

    let mut visited = vec![false; n];
    let mut position = vec![NOT_ON_PATH; n];
    let mut path: Vec<usize> = Vec::new();
    let mut frames: Vec<(usize, usize)> = Vec::new();

    let mut seen: HashSet<String> = HashSet::new();
    let mut cycles = Vec::new();
    let mut steps: u64 = 0;
    let mut truncated = false;

    'roots: for &root in &adjacency.order {
        if visited[root] {
            continue;
        }
        visited[root] = true;
        position[root] = path.len();
        path.push(root);
        frames.push((root, 0));

        while let Some(frame) = frames.last_mut() {
            let (node, next) = *frame;

            if next < adjacency.outbound[node].len() {
                frame.1 += 1;
                steps += 1;
                if budget.exhausted(steps) {
                    warn!("Cycle detection stopped by budget after {} steps", steps);
                    truncated = true;
                    break 'roots;
                }

                let neighbor = adjacency.outbound[node][next];
                if position[neighbor] != NOT_ON_PATH {
                    let members = &path[position[neighbor]..];
                    if members.len() <= max_cycle_length
                        && let Some(cycle) = build_cycle(store, members, include_metadata)
                    {
                        if seen.insert(cycle.nodes.join(" -> ")) {
                            cycles.push(cycle);
                        }
                    }
                } else if !visited[neighbor] {
                    visited[neighbor] = true;
                    position[neighbor] = path.len();
                    path.push(neighbor);
                    frames.push((neighbor, 0));
                }
            } else {
                frames.pop();
                path.pop();
                position[node] = NOT_ON_PATH;
            }
        }
    }

    debug!(
        "Found {} cycles of at most {} pages",
        cycles.len(),
        max_cycle_length
    );

    CycleReport { cycles, truncated }
}

/// Rotate a raw cycle to its canonical start and score it
fn build_cycle(store: &GraphStore, members: &[usize], include_metadata: bool) -> Option<Cycle> {
    let urls: Vec<&str> = members
        .iter()
        .map(|&i| store.url_of(NodeId::new(i)))
        .collect::<Option<Vec<_>>>()?;

    let start = urls
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)?;
    let len = members.len();
    let rotated: Vec<usize> = (0..len).map(|k| members[(start + k) % len]).collect();

    let mut total: u64 = 0;
    let mut edges = Vec::with_capacity(len);
    for k in 0..len {
        let from = NodeId::new(rotated[k]);
        let to = NodeId::new(rotated[(k + 1) % len]);
        let edge = store.edge_between(from, to)?;
        total += edge.count;
        if include_metadata {
            edges.push(EdgeSummary {
                from: store.url_of(from)?.to_string(),
                to: store.url_of(to)?.to_string(),
                count: edge.count,
                anchor_text: edge.anchor_text.clone(),
                context: edge.context.clone(),
            });
        }
    }

    let nodes: Vec<String> = rotated
        .iter()
        .map(|&i| store.url_of(NodeId::new(i)).map(str::to_string))
        .collect::<Option<Vec<_>>>()?;

    Some(Cycle {
        length: nodes.len(),
        nodes,
        strength: total as f64 / len as f64,
        edges: include_metadata.then_some(edges),
    })
}
