use linkmap_scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Unsupported export format: {0} (expected json, dot, csv or adjacency)")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Crawl failed: {0}")]
    Crawl(#[from] ScanError),
}

pub type Result<T> = std::result::Result<T, GraphError>;
