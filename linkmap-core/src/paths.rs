//! Shortest relationship paths between pages.

use crate::model::{EdgeSummary, NodeId};
use crate::store::{Adjacency, GraphStore};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

const NO_PREDECESSOR: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathDirection {
    /// Links run from the first page to the last
    Forward,
    /// Links run from the last page to the first; nodes are listed reversed
    Reverse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipPath {
    /// Pages from the requested start to the requested end
    pub nodes: Vec<String>,
    /// Number of pages on the path
    pub length: usize,
    pub direction: PathDirection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<EdgeSummary>>,
}

/// Shortest chain of outbound links from `start` to `end` using at most
/// `max_depth` links. Unknown pages have no path.
pub fn shortest_path(
    store: &GraphStore,
    start: &str,
    end: &str,
    max_depth: usize,
) -> Option<Vec<NodeId>> {
    let start = store.node_id(start)?;
    let end = store.node_id(end)?;
    bfs(&store.adjacency(), start.index(), end.index(), max_depth)
        .map(|path| path.into_iter().map(NodeId::new).collect())
}

pub fn relationship_path(
    store: &GraphStore,
    url1: &str,
    url2: &str,
    max_depth: usize,
    bidirectional: bool,
    include_metadata: bool,
) -> Option<RelationshipPath> {
    let a = store.node_id(url1)?.index();
    let b = store.node_id(url2)?.index();
    let adjacency = store.adjacency();

    let forward = bfs(&adjacency, a, b, max_depth);
    let reverse = if bidirectional {
        bfs(&adjacency, b, a, max_depth)
    } else {
        None
    };

    let (mut nodes, direction) = match (forward, reverse) {
        (Some(f), Some(r)) if r.len() < f.len() => (r, PathDirection::Reverse),
        (Some(f), _) => (f, PathDirection::Forward),
        (None, Some(r)) => (r, PathDirection::Reverse),
        (None, None) => return None,
    };
    if direction == PathDirection::Reverse {
        nodes.reverse();
    }

    let edges = if include_metadata {
        Some(edge_summaries(store, &nodes, direction)?)
    } else {
        None
    };

    let urls = nodes
        .iter()
        .map(|&i| store.url_of(NodeId::new(i)).map(str::to_string))
        .collect::<Option<Vec<_>>>()?;

    Some(RelationshipPath {
        length: urls.len(),
        nodes: urls,
        direction,
        edges,
    })
}

fn edge_summaries(
    store: &GraphStore,
    nodes: &[usize],
    direction: PathDirection,
) -> Option<Vec<EdgeSummary>> {
    nodes
        .windows(2)
        .map(|pair| {
            let (from, to) = match direction {
                PathDirection::Forward => (NodeId::new(pair[0]), NodeId::new(pair[1])),
                PathDirection::Reverse => (NodeId::new(pair[1]), NodeId::new(pair[0])),
            };
            let edge = store.edge_between(from, to)?;
            Some(EdgeSummary {
                from: store.url_of(from)?.to_string(),
                to: store.url_of(to)?.to_string(),
                count: edge.count,
                anchor_text: edge.anchor_text.clone(),
                context: edge.context.clone(),
            })
        })
        .collect()
}

/// Breadth-first search with a predecessor table
fn bfs(adjacency: &Adjacency, start: usize, end: usize, max_depth: usize) -> Option<Vec<usize>> {
    if start == end {
        return Some(vec![start]);
    }

    let n = adjacency.len();
    let mut predecessor = vec![NO_PREDECESSOR; n];
    let mut depth = vec![0usize; n];
    let mut visited = vec![false; n];
    let mut queue = VecDeque::new();

    visited[start] = true;
    queue.push_back(start);

    while let Some(node) = queue.pop_front() {
        if depth[node] >= max_depth {
            continue;
        }
        for &next in &adjacency.outbound[node] {
            if visited[next] {
                continue;
            }
            visited[next] = true;
            predecessor[next] = node;
            depth[next] = depth[node] + 1;

            if next == end {
                let mut path = vec![end];
                let mut current = end;
                while predecessor[current] != NO_PREDECESSOR {
                    current = predecessor[current];
                    path.push(current);
                }
                path.reverse();
                return Some(path);
            }
            queue.push_back(next);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinkMetadata;

    #[test]
    fn test_depth_limit_hides_long_paths() {
        let mut store = GraphStore::new();
        store.add_link("https://a.test/", "https://b.test/", LinkMetadata::default());
        store.add_link("https://b.test/", "https://c.test/", LinkMetadata::default());

        assert!(shortest_path(&store, "https://a.test/", "https://c.test/", 1).is_none());
        let path = shortest_path(&store, "https://a.test/", "https://c.test/", 2).unwrap();
        assert_eq!(path.len(), 3);
    }
}
