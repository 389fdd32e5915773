//! Structural health statistics for a link graph.

use crate::export::density;
use crate::store::GraphStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportanceDistribution {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub stddev: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub node_count: usize,
    pub link_count: usize,
    pub density: f64,
    pub avg_in_degree: f64,
    pub avg_out_degree: f64,
    pub max_in_degree: usize,
    pub max_out_degree: usize,
    pub cycle_count: usize,
    pub scc_count: usize,
    pub importance_distribution: ImportanceDistribution,
    /// Pages per host
    pub domain_distribution: BTreeMap<String, usize>,
    /// Number of reachable (source, target) pairs per shortest path length,
    /// measured in links, over the sampled sources
    pub path_length_distribution: BTreeMap<usize, usize>,
}

/// Figures that come from other analyses and are passed in
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisCounts {
    pub cycle_count: usize,
    pub scc_count: usize,
}

pub fn compute_statistics(
    store: &GraphStore,
    importance: &[f64],
    counts: AnalysisCounts,
    path_samples: usize,
) -> GraphStatistics {
    let node_count = store.node_count();
    if node_count == 0 {
        return GraphStatistics::default();
    }

    let adjacency = store.adjacency();
    let link_count = store.edge_count();

    let max_in_degree = adjacency.inbound.iter().map(Vec::len).max().unwrap_or(0);
    let max_out_degree = adjacency.outbound.iter().map(Vec::len).max().unwrap_or(0);
    // Every link adds one to some in-degree and one to some out-degree
    let avg_degree = link_count as f64 / node_count as f64;

    let mut domain_distribution = BTreeMap::new();
    for (_, node) in store.nodes() {
        *domain_distribution.entry(node.domain.clone()).or_insert(0) += 1;
    }

    let mut path_length_distribution = BTreeMap::new();
    for &source in adjacency.order.iter().take(path_samples) {
        let mut distance = vec![usize::MAX; node_count];
        let mut queue = VecDeque::new();
        distance[source] = 0;
        queue.push_back(source);
        while let Some(node) = queue.pop_front() {
            for &next in &adjacency.outbound[node] {
                if distance[next] == usize::MAX {
                    distance[next] = distance[node] + 1;
                    *path_length_distribution.entry(distance[next]).or_insert(0) += 1;
                    queue.push_back(next);
                }
            }
        }
    }

    GraphStatistics {
        node_count,
        link_count,
        density: density(node_count, link_count),
        avg_in_degree: avg_degree,
        avg_out_degree: avg_degree,
        max_in_degree,
        max_out_degree,
        cycle_count: counts.cycle_count,
        scc_count: counts.scc_count,
        importance_distribution: distribution(importance),
        domain_distribution,
        path_length_distribution,
    }
}

fn distribution(values: &[f64]) -> ImportanceDistribution {
    if values.is_empty() {
        return ImportanceDistribution::default();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;

    ImportanceDistribution {
        min: sorted[0],
        max: sorted[n - 1],
        mean,
        median,
        stddev: variance.sqrt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distribution_even_count() {
        let dist = distribution(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(dist.min, 1.0);
        assert_eq!(dist.max, 4.0);
        assert_eq!(dist.mean, 2.5);
        assert_eq!(dist.median, 2.5);
        assert!((dist.stddev - 1.118_033_988_749_895).abs() < 1e-12);
    }
}
