//! Inference configuration, loadable from JSON.

use semgraph_factor::{BpSettings, InferenceMethod};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Every knob of the second stage. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    pub method: InferenceMethod,
    pub beam_size: usize,
    pub bp_threshold: f64,
    pub bp_max_iterations: usize,
    pub bp_max_time_ms: Option<u64>,
    /// Upper bound on factor jobs per graph; larger graphs are dropped.
    pub factor_limit: usize,
    /// Upper bound on max-marginal combinations decoded after message passing.
    pub max_parses_limit: usize,
    pub belief_epsilon: f64,
    /// Tolerance of the derivation normalizer check.
    pub norm_epsilon: f64,
    /// Repair incomplete base derivations instead of pruning them.
    pub sloppy: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            method: InferenceMethod::Beam,
            beam_size: 50,
            bp_threshold: 0.001,
            bp_max_iterations: 100,
            bp_max_time_ms: None,
            factor_limit: 1000,
            max_parses_limit: 200,
            belief_epsilon: 1e-5,
            norm_epsilon: 1e-2,
            sloppy: false,
        }
    }
}

impl InferenceConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: InferenceConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn with_method(mut self, method: InferenceMethod) -> Self {
        self.method = method;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sizes = [
            ("beam_size", self.beam_size),
            ("bp_max_iterations", self.bp_max_iterations),
            ("factor_limit", self.factor_limit),
            ("max_parses_limit", self.max_parses_limit),
        ];
        for (field, value) in sizes {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        let tolerances = [
            ("bp_threshold", self.bp_threshold),
            ("belief_epsilon", self.belief_epsilon),
            ("norm_epsilon", self.norm_epsilon),
        ];
        for (field, value) in tolerances {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be positive, got {value}"),
                });
            }
        }
        Ok(())
    }

    pub fn bp_settings(&self) -> BpSettings {
        BpSettings {
            threshold: self.bp_threshold,
            max_iterations: self.bp_max_iterations,
            max_time: self.bp_max_time_ms.map(Duration::from_millis),
            belief_epsilon: self.belief_epsilon,
        }
    }
}
