//! Engine configuration.
//!
//! Every field has a default, so a config file only needs to name the
//! values it overrides.

use crate::error::{GraphError, Result};
use crate::rank::RankParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Importance assigned to a node before any ranking has run.
    pub base_importance: f64,
    pub damping: f64,
    pub max_iterations: usize,
    pub convergence_threshold: f64,
    pub max_cycle_length: usize,
    pub max_path_depth: usize,
    /// Number of BFS sources sampled for the path length distribution.
    pub stats_path_samples: usize,
    /// Ranked values retained per node.
    pub importance_history_len: usize,
    /// Node count above which the ranking update pass runs on the rayon pool.
    pub parallel_rank_threshold: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_importance: 1.0,
            damping: 0.85,
            max_iterations: 100,
            convergence_threshold: 1e-4,
            max_cycle_length: 10,
            max_path_depth: 10,
            stats_path_samples: 100,
            importance_history_len: 10,
            parallel_rank_threshold: 2048,
        }
    }
}

impl GraphConfig {
    /// Load a JSON config file, filling omitted fields with defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: GraphConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.damping) {
            return Err(GraphError::Config(format!(
                "damping must be within [0, 1], got {}",
                self.damping
            )));
        }
        if self.convergence_threshold < 0.0 || self.convergence_threshold.is_nan() {
            return Err(GraphError::Config(format!(
                "convergence_threshold must be non-negative, got {}",
                self.convergence_threshold
            )));
        }
        if self.max_cycle_length < 2 {
            return Err(GraphError::Config(
                "max_cycle_length must be at least 2".to_string(),
            ));
        }
        Ok(())
    }

    /// Ranker parameters derived from this config
    pub fn rank_params(&self) -> RankParams {
        RankParams {
            damping: self.damping,
            max_iterations: self.max_iterations,
            convergence_threshold: self.convergence_threshold,
        }
    }
}
