// Tests for graph export

use linkmap_core::{ExportFormat, ExportOptions, GraphError, GraphExport, LinkGraph, LinkMetadata};

fn url(path: &str) -> String {
    format!("https://site.test/{}", path)
}

fn sample_graph() -> LinkGraph {
    let mut graph = LinkGraph::new();
    graph.add_link(&url("a"), &url("b"), LinkMetadata::with_anchor("Read \"B\""));
    graph.add_link(&url("a"), &url("b"), LinkMetadata::default());
    graph.add_link(&url("b"), &url("c"), LinkMetadata::default());
    graph.add_link(&url("c"), &url("a"), LinkMetadata::default());
    graph.ensure_node(&url("orphan"));
    graph
}

// ============================================================================
// Format Parsing Tests
// ============================================================================

#[test]
fn test_export_format_from_str() {
    assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
    assert_eq!("DOT".parse::<ExportFormat>().unwrap(), ExportFormat::Dot);
    assert_eq!(" csv ".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
    assert_eq!("adjacency".parse::<ExportFormat>().unwrap(), ExportFormat::Adjacency);
    assert!("graphviz".parse::<ExportFormat>().is_err());
    assert!("matrix".parse::<ExportFormat>().is_err());
}

#[test]
fn test_unsupported_format_rejected() {
    let graph = sample_graph();
    let result = graph.export_graph("xml", &ExportOptions::default());

    match result {
        Err(GraphError::UnsupportedFormat(name)) => assert_eq!(name, "xml"),
        other => panic!("expected UnsupportedFormat, got {:?}", other),
    }
}

// ============================================================================
// JSON Export Tests
// ============================================================================

#[test]
fn test_json_has_one_entry_per_page_and_distinct_link() {
    let graph = sample_graph();
    let export = graph.export_graph("json", &ExportOptions::default()).unwrap();

    let GraphExport::Json(value) = export else {
        panic!("expected JSON export");
    };
    assert_eq!(value["nodes"].as_array().unwrap().len(), graph.node_count());
    assert_eq!(value["edges"].as_array().unwrap().len(), 3);
    assert_eq!(value["statistics"]["total_observations"], 4);
    assert_eq!(value["statistics"]["domain_count"], 1);

    let first_edge = &value["edges"][0];
    assert_eq!(first_edge["source"], url("a"));
    assert_eq!(first_edge["count"], 2);
    assert!(first_edge.get("anchor_text").is_none());
}

#[test]
fn test_json_metadata_is_opt_in() {
    let graph = sample_graph();
    let options = ExportOptions {
        include_metadata: true,
        ..ExportOptions::default()
    };

    let GraphExport::Json(value) = graph.export_graph("json", &options).unwrap() else {
        panic!("expected JSON export");
    };
    assert_eq!(value["edges"][0]["anchor_text"], "Read \"B\"");
    assert!(value["nodes"][0]["metadata"].is_object());
}

#[test]
fn test_min_importance_drops_pages_and_their_links() {
    let graph = sample_graph();
    let options = ExportOptions {
        // The orphan only receives the teleport share
        min_importance: Some(0.1),
        ..ExportOptions::default()
    };

    let GraphExport::Json(value) = graph.export_graph("json", &options).unwrap() else {
        panic!("expected JSON export");
    };
    let nodes = value["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 3);
    assert!(nodes.iter().all(|n| n["url"] != url("orphan")));
    assert_eq!(value["edges"].as_array().unwrap().len(), 3);
}

#[test]
fn test_json_export_of_empty_graph() {
    let graph = LinkGraph::new();
    let GraphExport::Json(value) = graph.export_graph("json", &ExportOptions::default()).unwrap()
    else {
        panic!("expected JSON export");
    };

    assert!(value["nodes"].as_array().unwrap().is_empty());
    assert_eq!(value["statistics"]["density"], 0.0);
}

// ============================================================================
// DOT / CSV / Adjacency Tests
// ============================================================================

#[test]
fn test_dot_export_escapes_labels() {
    let graph = sample_graph();
    let options = ExportOptions {
        include_metadata: true,
        ..ExportOptions::default()
    };

    let export = graph.export_graph("dot", &options).unwrap();
    assert_eq!(export.format(), ExportFormat::Dot);
    let text = export.render().unwrap();

    assert!(text.starts_with("digraph links {"));
    assert!(text.trim_end().ends_with('}'));
    assert!(text.contains(&format!("\"{}\" -> \"{}\"", url("a"), url("b"))));
    assert!(text.contains("label=\"Read \\\"B\\\"\""));
}

#[test]
fn test_csv_export_rows() {
    let graph = sample_graph();
    let text = graph
        .export_graph("csv", &ExportOptions::default())
        .unwrap()
        .render()
        .unwrap();

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines[0],
        "source,target,count,first_seen,last_seen,source_importance,target_importance"
    );
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with(&format!("{},{},2,", url("a"), url("b"))));
}

#[test]
fn test_csv_metadata_columns_are_quoted() {
    let graph = sample_graph();
    let options = ExportOptions {
        include_metadata: true,
        ..ExportOptions::default()
    };
    let text = graph.export_graph("csv", &options).unwrap().render().unwrap();

    assert!(text.lines().next().unwrap().ends_with(",anchor_text,context"));
    assert!(text.contains("\"Read \"\"B\"\"\""));
}

#[test]
fn test_adjacency_matrix_counts() {
    let graph = sample_graph();
    let GraphExport::Adjacency(adjacency) =
        graph.export_graph("adjacency", &ExportOptions::default()).unwrap()
    else {
        panic!("expected adjacency export");
    };

    assert_eq!(
        adjacency.nodes,
        vec![url("a"), url("b"), url("c"), url("orphan")]
    );
    assert_eq!(adjacency.matrix[0][1], 2);
    assert_eq!(adjacency.matrix[1][2], 1);
    assert_eq!(adjacency.matrix[2][0], 1);
    assert_eq!(adjacency.matrix[3].iter().sum::<u64>(), 0);
}
