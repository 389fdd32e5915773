// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    AnalysisRequest, EdgeRecord, build_graph, load_edges_from_file, load_urls_from_file,
    load_urls_from_source, parse_edge_line, parse_url_line, render_analysis,
};

// Re-export crawl functionality from linkmap-core
pub use linkmap_core::crawl::{
    CrawlOptions, CrawlProgressCallback, FollowMode, execute_crawl, generate_crawl_report,
};
