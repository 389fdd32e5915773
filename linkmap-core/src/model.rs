use chrono::{DateTime, Utc};
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dense index of a page in the graph arena
pub type NodeId = NodeIndex;

/// Caller-supplied metadata value attached to a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Map(BTreeMap<String, MetaValue>),
}

impl MetaValue {
    /// Flat string form used by the DOT and CSV exporters
    pub fn to_flat_string(&self) -> String {
        match self {
            MetaValue::Bool(b) => b.to_string(),
            MetaValue::Number(n) => n.to_string(),
            MetaValue::Text(s) => s.clone(),
            MetaValue::Map(map) => {
                let parts: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v.to_flat_string()))
                    .collect();
                format!("{{{}}}", parts.join(";"))
            }
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::Text(value)
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        MetaValue::Number(value)
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        MetaValue::Bool(value)
    }
}

/// A crawled or discovered page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageNode {
    pub url: String,
    pub domain: String,
    pub path: String,
    pub importance: f64,
    /// Most recent ranked values, oldest first
    pub importance_history: Vec<f64>,
    pub depth: u32,
    pub discovered_at: DateTime<Utc>,
    pub metadata: BTreeMap<String, MetaValue>,
}

/// A hyperlink observed one or more times between two pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkEdge {
    pub count: u64,
    pub anchor_text: Option<String>,
    pub context: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// What the crawler knows about a single link observation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkMetadata {
    pub anchor_text: Option<String>,
    pub context: Option<String>,
}

impl LinkMetadata {
    pub fn with_anchor(anchor_text: impl Into<String>) -> Self {
        Self {
            anchor_text: Some(anchor_text.into()),
            context: None,
        }
    }
}

/// Edge details carried by cycles and paths when metadata is requested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSummary {
    pub from: String,
    pub to: String,
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}
