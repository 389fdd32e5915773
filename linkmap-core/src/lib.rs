//! Link graph store and analysis engine for linkmap.
//!
//! Crawlers feed `(source, target)` observations into a [`LinkGraph`]
//! (or a [`SharedLinkGraph`] when several tasks feed and query it at once);
//! the graph answers importance, cycle, component, path and statistics
//! queries and exports itself as JSON, DOT, CSV or an adjacency matrix.

pub mod budget;
pub mod cache;
pub mod components;
pub mod config;
pub mod crawl;
pub mod cycles;
pub mod error;
pub mod export;
pub mod graph;
pub mod model;
pub mod paths;
pub mod rank;
pub mod stats;
pub mod store;
pub mod url_norm;

use colored::Colorize;

pub use budget::AnalysisBudget;
pub use cache::CacheStats;
pub use config::GraphConfig;
pub use cycles::Cycle;
pub use error::{GraphError, Result};
pub use export::{AdjacencyMatrix, ExportFormat, ExportOptions, GraphExport};
pub use graph::{ImportanceRanking, LinkGraph, SharedLinkGraph};
pub use model::{EdgeSummary, LinkEdge, LinkMetadata, MetaValue, NodeId, PageNode};
pub use paths::{PathDirection, RelationshipPath};
pub use rank::RankParams;
pub use stats::{GraphStatistics, ImportanceDistribution};
pub use url_norm::normalize_url;

pub fn print_banner() {
    let banner = r#"
   __ _       _
  / /(_)_ __ | | ___ __ ___   __ _ _ __
 / / | | '_ \| |/ / '_ ` _ \ / _` | '_ \
/ /__| | | | |   <| | | | | | (_| | |_) |
\____/_|_| |_|_|\_\_| |_| |_|\__,_| .__/
                                  |_|
"#;
    println!("{}", banner.cyan());
    println!(
        "  {} {}\n",
        "link graph analysis".bright_black(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
}
