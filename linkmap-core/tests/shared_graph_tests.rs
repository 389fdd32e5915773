// Tests for concurrent use of a shared link graph

use linkmap_core::{LinkMetadata, RankParams, SharedLinkGraph};
use std::thread;

fn url(path: &str) -> String {
    format!("https://site.test/{}", path)
}

#[test]
fn test_handles_share_one_graph() {
    let graph = SharedLinkGraph::default();
    let other = graph.clone();

    other.add_link(&url("a"), &url("b"), LinkMetadata::default());

    assert_eq!(graph.read().link_count(), 1);
    assert_eq!(graph.component_count(), 2);
}

#[test]
fn test_shared_ranking_written_back() {
    let graph = SharedLinkGraph::default();
    graph.add_link(&url("a"), &url("b"), LinkMetadata::default());
    graph.add_link(&url("b"), &url("a"), LinkMetadata::default());

    let ranking = graph.calculate_importance(&RankParams::default());

    let reader = graph.read();
    let node = reader.store().node(&url("a")).unwrap();
    assert_eq!(node.importance, ranking.scores[&url("a")]);
    assert!((ranking.total() - 1.0).abs() < 1e-3);
}

#[test]
fn test_concurrent_writers_and_readers() {
    let graph = SharedLinkGraph::default();

    thread::scope(|scope| {
        for worker in 0..4 {
            let graph = graph.clone();
            scope.spawn(move || {
                for i in 0..50 {
                    let from = url(&format!("w{}/{}", worker, i));
                    let to = url(&format!("w{}/{}", worker, i + 1));
                    assert!(graph.add_link(&from, &to, LinkMetadata::default()));
                }
            });
        }

        for _ in 0..2 {
            let graph = graph.clone();
            scope.spawn(move || {
                for _ in 0..10 {
                    let ranking = graph.calculate_importance(&RankParams::default());
                    assert!(ranking.total() <= 1.0 + 1e-9);
                    graph.detect_cycles(None, false);
                    graph.get_statistics();
                }
            });
        }
    });

    // Four chains of 51 pages each
    assert_eq!(graph.read().node_count(), 204);
    assert_eq!(graph.read().link_count(), 200);
    assert!(graph.detect_cycles(None, false).is_empty());
    assert_eq!(graph.component_count(), 204);
}

#[test]
fn test_shared_path_and_export() {
    let graph = SharedLinkGraph::default();
    graph.add_link(&url("a"), &url("b"), LinkMetadata::default());
    graph.add_link(&url("b"), &url("c"), LinkMetadata::default());

    let path = graph
        .get_relationship_path(&url("a"), &url("c"), None, false, false)
        .unwrap();
    assert_eq!(path.length, 3);

    let text = graph
        .export_graph("csv", &Default::default())
        .unwrap()
        .render()
        .unwrap();
    assert_eq!(text.lines().count(), 3);

    graph.clear();
    assert_eq!(graph.get_statistics().node_count, 0);
}
