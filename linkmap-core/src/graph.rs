//! The link graph as seen by crawlers and by the reporting layer.
//!
//! `LinkGraph` owns the store, the analysis cache and the configuration.
//! Mutations need `&mut self`; every analysis runs on `&self` and populates
//! the cache through an inner mutex. `SharedLinkGraph` puts a `LinkGraph`
//! behind a read-write lock so a crawl can feed links while queries run.

use crate::budget::AnalysisBudget;
use crate::cache::{AnalysisCache, AnalysisKind, CacheStats, CachedAnalysis};
use crate::components;
use crate::config::GraphConfig;
use crate::cycles::{self, Cycle, CycleReport};
use crate::error::Result;
use crate::export::{self, ExportFormat, ExportOptions, GraphExport};
use crate::model::{LinkMetadata, MetaValue, NodeId};
use crate::paths::{self, RelationshipPath};
use crate::rank::{self, RankOutcome, RankParams};
use crate::stats::{self, AnalysisCounts, GraphStatistics};
use crate::store::GraphStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Importance scores keyed by page URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceRanking {
    pub scores: BTreeMap<String, f64>,
    pub iterations: usize,
    pub converged: bool,
    /// Stopped early by an analysis budget
    pub truncated: bool,
}

impl ImportanceRanking {
    /// Highest-ranked pages first, ties broken by URL
    pub fn top(&self, limit: usize) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .scores
            .iter()
            .map(|(url, score)| (url.as_str(), *score))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(limit);
        ranked
    }

    pub fn total(&self) -> f64 {
        self.scores.values().sum()
    }
}

#[derive(Debug)]
pub struct LinkGraph {
    store: GraphStore,
    cache: Mutex<AnalysisCache>,
    config: GraphConfig,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            store: GraphStore::with_base_importance(config.base_importance),
            cache: Mutex::new(AnalysisCache::new()),
            config,
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn generation(&self) -> u64 {
        self.store.generation()
    }

    fn cache(&self) -> MutexGuard<'_, AnalysisCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    pub fn ensure_node(&mut self, url: &str) -> bool {
        self.store.ensure_node(url)
    }

    pub fn add_link(&mut self, from: &str, to: &str, metadata: LinkMetadata) -> bool {
        self.store.add_link(from, to, metadata)
    }

    pub fn set_depth(&mut self, url: &str, depth: u32) -> bool {
        self.store.set_depth(url, depth)
    }

    pub fn set_node_metadata(&mut self, url: &str, key: &str, value: MetaValue) -> bool {
        self.store.set_node_metadata(url, key, value)
    }

    /// Drop all pages, links, cached analysis and importance history
    pub fn clear(&mut self) {
        self.store.clear();
        self.cache().clear();
        debug!("Link graph cleared");
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn outbound(&self, url: &str) -> Vec<NodeId> {
        self.store.outbound(url)
    }

    pub fn inbound(&self, url: &str) -> Vec<NodeId> {
        self.store.inbound(url)
    }

    pub fn node_count(&self) -> usize {
        self.store.node_count()
    }

    pub fn link_count(&self) -> usize {
        self.store.edge_count()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache().stats()
    }

    // ------------------------------------------------------------------
    // Importance
    // ------------------------------------------------------------------

    /// Run (or fetch from cache) the ranker without touching stored importance
    pub fn rank(&self, params: &RankParams, budget: &AnalysisBudget) -> RankOutcome {
        let key = params.cache_key();
        let generation = self.store.generation();
        if let Some(CachedAnalysis::Ranking(outcome)) =
            self.cache().get(AnalysisKind::Importance, &key, generation)
        {
            return outcome;
        }

        let outcome = rank::power_iteration(
            &self.store,
            params,
            budget,
            self.config.parallel_rank_threshold,
        );
        if !outcome.truncated {
            self.cache().insert(
                AnalysisKind::Importance,
                key,
                generation,
                CachedAnalysis::Ranking(outcome.clone()),
            );
        }
        outcome
    }

    /// Write a ranking back onto the pages
    pub fn apply_ranking(&mut self, outcome: &RankOutcome) {
        self.store
            .apply_importance(&outcome.scores, self.config.importance_history_len);
    }

    pub fn calculate_importance(&mut self, params: &RankParams) -> ImportanceRanking {
        self.calculate_importance_with_budget(params, &AnalysisBudget::unlimited())
    }

    pub fn calculate_importance_with_budget(
        &mut self,
        params: &RankParams,
        budget: &AnalysisBudget,
    ) -> ImportanceRanking {
        let outcome = self.rank(params, budget);
        self.apply_ranking(&outcome);
        self.ranking_by_url(&outcome)
    }

    pub fn ranking_by_url(&self, outcome: &RankOutcome) -> ImportanceRanking {
        let scores = outcome
            .scores
            .iter()
            .enumerate()
            .filter_map(|(i, score)| {
                self.store
                    .url_of(NodeId::new(i))
                    .map(|url| (url.to_string(), *score))
            })
            .collect();
        ImportanceRanking {
            scores,
            iterations: outcome.iterations,
            converged: outcome.converged,
            truncated: outcome.truncated,
        }
    }

    fn default_scores(&self) -> Vec<f64> {
        self.rank(&self.config.rank_params(), &AnalysisBudget::unlimited())
            .scores
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    /// Cycles of at most `max_cycle_length` pages (config default when `None`)
    pub fn detect_cycles(&self, max_cycle_length: Option<usize>, include_metadata: bool) -> Vec<Cycle> {
        self.detect_cycles_with_budget(max_cycle_length, include_metadata, &AnalysisBudget::unlimited())
            .cycles
    }

    pub fn detect_cycles_with_budget(
        &self,
        max_cycle_length: Option<usize>,
        include_metadata: bool,
        budget: &AnalysisBudget,
    ) -> CycleReport {
        let max_len = max_cycle_length.unwrap_or(self.config.max_cycle_length);
        let key = format!("max_length={};metadata={}", max_len, include_metadata);
        let generation = self.store.generation();
        if let Some(CachedAnalysis::Cycles(report)) =
            self.cache().get(AnalysisKind::Cycles, &key, generation)
        {
            return report;
        }

        let report = cycles::detect_cycles(&self.store, max_len, include_metadata, budget);
        if !report.truncated {
            self.cache().insert(
                AnalysisKind::Cycles,
                key,
                generation,
                CachedAnalysis::Cycles(report.clone()),
            );
        }
        report
    }

    pub fn strongly_connected_components(&self) -> Vec<Vec<String>> {
        let generation = self.store.generation();
        if let Some(CachedAnalysis::Components(found)) =
            self.cache().get(AnalysisKind::Components, "", generation)
        {
            return found;
        }

        let found = components::strongly_connected_components(&self.store);
        self.cache().insert(
            AnalysisKind::Components,
            String::new(),
            generation,
            CachedAnalysis::Components(found.clone()),
        );
        found
    }

    pub fn component_count(&self) -> usize {
        self.strongly_connected_components().len()
    }

    /// Shortest link chain between two pages (config depth when `None`).
    /// With `bidirectional` the reverse direction is tried as well and the
    /// shorter of the two is returned.
    pub fn get_relationship_path(
        &self,
        url1: &str,
        url2: &str,
        max_depth: Option<usize>,
        bidirectional: bool,
        include_metadata: bool,
    ) -> Option<RelationshipPath> {
        let depth = max_depth.unwrap_or(self.config.max_path_depth);
        let key = format!(
            "{}|{}|depth={};bidirectional={};metadata={}",
            url1, url2, depth, bidirectional, include_metadata
        );
        let generation = self.store.generation();
        if let Some(CachedAnalysis::Path(path)) = self.cache().get(AnalysisKind::Path, &key, generation) {
            return path;
        }

        let path =
            paths::relationship_path(&self.store, url1, url2, depth, bidirectional, include_metadata);
        self.cache().insert(
            AnalysisKind::Path,
            key,
            generation,
            CachedAnalysis::Path(path.clone()),
        );
        path
    }

    // ------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------

    /// Export in `format` ("json", "dot", "csv" or "adjacency").
    ///
    /// Importance columns come from the default-parameter ranking, which is
    /// computed here if no cached one exists.
    pub fn export_graph(&self, format: &str, options: &ExportOptions) -> Result<GraphExport> {
        let format: ExportFormat = format.parse()?;
        let scores = self.default_scores();
        export::export(&self.store, format, &scores, options)
    }

    pub fn get_statistics(&self) -> GraphStatistics {
        let generation = self.store.generation();
        if let Some(CachedAnalysis::Statistics(found)) =
            self.cache().get(AnalysisKind::Statistics, "", generation)
        {
            return *found;
        }

        let counts = AnalysisCounts {
            cycle_count: self.detect_cycles(None, false).len(),
            scc_count: self.component_count(),
        };
        let scores = self.default_scores();
        let found = stats::compute_statistics(
            &self.store,
            &scores,
            counts,
            self.config.stats_path_samples,
        );
        self.cache().insert(
            AnalysisKind::Statistics,
            String::new(),
            generation,
            CachedAnalysis::Statistics(Box::new(found.clone())),
        );
        found
    }
}

impl Default for LinkGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle to a `LinkGraph` shared between a crawl and its readers
#[derive(Debug, Clone, Default)]
pub struct SharedLinkGraph {
    inner: Arc<RwLock<LinkGraph>>,
}

impl SharedLinkGraph {
    pub fn new(graph: LinkGraph) -> Self {
        Self {
            inner: Arc::new(RwLock::new(graph)),
        }
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Self::new(LinkGraph::with_config(config))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, LinkGraph> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, LinkGraph> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ensure_node(&self, url: &str) -> bool {
        self.write().ensure_node(url)
    }

    pub fn add_link(&self, from: &str, to: &str, metadata: LinkMetadata) -> bool {
        self.write().add_link(from, to, metadata)
    }

    pub fn set_depth(&self, url: &str, depth: u32) -> bool {
        self.write().set_depth(url, depth)
    }

    /// Rank under the read lock, then write the scores back under a short
    /// write lock, skipping the write if links arrived in the meantime.
    pub fn calculate_importance(&self, params: &RankParams) -> ImportanceRanking {
        self.calculate_importance_with_budget(params, &AnalysisBudget::unlimited())
    }

    pub fn calculate_importance_with_budget(
        &self,
        params: &RankParams,
        budget: &AnalysisBudget,
    ) -> ImportanceRanking {
        let (outcome, generation, ranking) = self.rank_snapshot(params, budget);
        self.apply_if_current(&outcome, generation);
        ranking
    }

    /// Rank under the read lock, returning the generation that was ranked
    pub(crate) fn rank_snapshot(
        &self,
        params: &RankParams,
        budget: &AnalysisBudget,
    ) -> (RankOutcome, u64, ImportanceRanking) {
        let graph = self.read();
        let outcome = graph.rank(params, budget);
        let ranking = graph.ranking_by_url(&outcome);
        (outcome, graph.generation(), ranking)
    }

    /// Store `outcome` on the pages unless the graph moved past `generation`
    pub(crate) fn apply_if_current(&self, outcome: &RankOutcome, generation: u64) -> bool {
        let mut graph = self.write();
        if graph.generation() != generation {
            debug!("Graph changed while ranking; stored importance left as is");
            return false;
        }
        graph.apply_ranking(outcome);
        true
    }

    pub fn detect_cycles(&self, max_cycle_length: Option<usize>, include_metadata: bool) -> Vec<Cycle> {
        self.read().detect_cycles(max_cycle_length, include_metadata)
    }

    pub fn component_count(&self) -> usize {
        self.read().component_count()
    }

    pub fn get_relationship_path(
        &self,
        url1: &str,
        url2: &str,
        max_depth: Option<usize>,
        bidirectional: bool,
        include_metadata: bool,
    ) -> Option<RelationshipPath> {
        self.read()
            .get_relationship_path(url1, url2, max_depth, bidirectional, include_metadata)
    }

    pub fn export_graph(&self, format: &str, options: &ExportOptions) -> Result<GraphExport> {
        self.read().export_graph(format, options)
    }

    pub fn get_statistics(&self) -> GraphStatistics {
        self.read().get_statistics()
    }

    pub fn clear(&self) {
        self.write().clear();
    }
}
