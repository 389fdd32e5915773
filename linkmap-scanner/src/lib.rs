pub mod crawler;
pub mod error;
pub mod result;

pub use crawler::{Crawler, LinkCallback, ProgressCallback, ResultCallback};
pub use error::ScanError;
pub use result::{CrawlResult, DiscoveredLink};
