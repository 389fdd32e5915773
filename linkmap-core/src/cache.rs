//! Memoized analysis results.
//!
//! Entries remember the store generation they were computed at; a lookup
//! only hits when that generation still matches. Inserting at a newer
//! generation evicts every older entry, so the map only ever holds results
//! for a single generation.

use crate::cycles::CycleReport;
use crate::paths::RelationshipPath;
use crate::rank::RankOutcome;
use crate::stats::GraphStatistics;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisKind {
    Importance,
    Cycles,
    Components,
    Path,
    Statistics,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Importance => "importance",
            AnalysisKind::Cycles => "cycles",
            AnalysisKind::Components => "components",
            AnalysisKind::Path => "path",
            AnalysisKind::Statistics => "statistics",
        }
    }
}

#[derive(Debug, Clone)]
pub enum CachedAnalysis {
    Ranking(RankOutcome),
    Cycles(CycleReport),
    Components(Vec<Vec<String>>),
    Path(Option<RelationshipPath>),
    Statistics(Box<GraphStatistics>),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    generation: u64,
    value: CachedAnalysis,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
pub struct AnalysisCache {
    entries: HashMap<(AnalysisKind, String), CacheEntry>,
    hits: u64,
    misses: u64,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, kind: AnalysisKind, params: &str, generation: u64) -> Option<CachedAnalysis> {
        let key = (kind, params.to_string());
        match self.entries.get(&key) {
            Some(entry) if entry.generation == generation => {
                self.hits += 1;
                trace!("Cache hit for {} [{}]", kind.as_str(), params);
                Some(entry.value.clone())
            }
            Some(_) => {
                self.entries.remove(&key);
                self.misses += 1;
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, kind: AnalysisKind, params: String, generation: u64, value: CachedAnalysis) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.generation == generation);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            trace!("Evicted {} stale cache entries", evicted);
        }
        self.entries
            .insert((kind, params), CacheEntry { generation, value });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}
