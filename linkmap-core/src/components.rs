//! Strongly connected components (Tarjan), iterative.

use crate::model::NodeId;
use crate::store::{Adjacency, GraphStore};

const UNVISITED: usize = usize::MAX;

/// Number of strongly connected components
pub fn component_count(store: &GraphStore) -> usize {
    tarjan(&store.adjacency()).len()
}

/// Members of each component, each sorted by URL, components ordered by
/// their first URL
pub fn strongly_connected_components(store: &GraphStore) -> Vec<Vec<String>> {
    let mut components: Vec<Vec<String>> = tarjan(&store.adjacency())
        .into_iter()
        .map(|members| {
            let mut urls: Vec<String> = members
                .into_iter()
                .filter_map(|i| store.url_of(NodeId::new(i)).map(str::to_string))
                .collect();
            urls.sort();
            urls
        })
        .collect();
    components.sort();
    components
}

fn tarjan(adjacency: &Adjacency) -> Vec<Vec<usize>> {
    let n = adjacency.len();
    let mut index = vec![UNVISITED; n];
    let mut low_link = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut frames: Vec<(usize, usize)> = Vec::new();
    let mut next_index = 0;
    let mut components = Vec::new();

    for &root in &adjacency.order {
        if index[root] != UNVISITED {
            continue;
        }

        index[root] = next_index;
        low_link[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;
        frames.push((root, 0));

        while let Some(frame) = frames.last_mut() {
            let (v, next) = *frame;

            if next < adjacency.outbound[v].len() {
                frame.1 += 1;
                let w = adjacency.outbound[v][next];
                if index[w] == UNVISITED {
                    index[w] = next_index;
                    low_link[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    frames.push((w, 0));
                } else if on_stack[w] {
                    low_link[v] = low_link[v].min(index[w]);
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                low_link[parent] = low_link[parent].min(low_link[v]);
            }

            if low_link[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }

    components
}
