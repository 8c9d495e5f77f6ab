//! Sparse named feature vectors and the linear weight model.

use crate::math::log_add;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Join key segments with `#`, e.g. `UNARY#boy#boy-01`.
pub fn feature_key(parts: &[&str]) -> String {
    parts.join("#")
}

// ============================================================================
// Feature vector
// ============================================================================

/// Sparse vector keyed by feature name. Iteration order is the key order,
/// which keeps float accumulation reproducible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    values: BTreeMap<String, f64>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, key: &str) -> f64 {
        self.values.get(key).copied().unwrap_or(0.0)
    }

    pub fn get_opt(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn set(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    pub fn add(&mut self, key: impl Into<String>, value: f64) {
        *self.values.entry(key.into()).or_insert(0.0) += value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// `self += other`.
    pub fn add_all(&mut self, other: &FeatureVector) {
        for (key, value) in other.iter() {
            self.add(key, value);
        }
    }

    /// `self += scale * other`.
    pub fn add_scaled(&mut self, other: &FeatureVector, scale: f64) {
        for (key, value) in other.iter() {
            self.add(key, value * scale);
        }
    }

    pub fn dot(&self, other: &FeatureVector) -> f64 {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.iter().map(|(key, value)| value * large.get(key)).sum()
    }

    /// Accumulate `weight * other` into a vector that stores log values:
    /// `self[k] = log(exp(self[k]) + exp(log_weight) * other[k])`.
    ///
    /// Non-positive entries of `other` have no log-space image and are
    /// skipped.
    pub fn add_log_scaled(&mut self, other: &FeatureVector, log_weight: f64) {
        for (key, value) in other.iter() {
            if value <= 0.0 {
                continue;
            }
            let term = log_weight + value.ln();
            let entry = self.values.entry(key.to_string()).or_insert(f64::NEG_INFINITY);
            *entry = log_add(*entry, term);
        }
    }

    /// Merge another log-valued vector into this one.
    pub fn log_merge(&mut self, other: &FeatureVector) {
        for (key, value) in other.iter() {
            let entry = self.values.entry(key.to_string()).or_insert(f64::NEG_INFINITY);
            *entry = log_add(*entry, value);
        }
    }
}

impl FromIterator<(String, f64)> for FeatureVector {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        let mut vector = FeatureVector::new();
        for (key, value) in iter {
            vector.add(key, value);
        }
        vector
    }
}

// ============================================================================
// Weight model
// ============================================================================

/// Read-only scoring model shared by every graph of one parse.
pub trait WeightModel: Send + Sync {
    fn theta(&self) -> &FeatureVector;

    fn score(&self, features: &FeatureVector) -> f64 {
        self.theta().dot(features)
    }
}

#[derive(Debug, Error)]
pub enum WeightsError {
    #[error("failed to read weights {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid weights json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Linear model over a sparse weight vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinearModel {
    theta: FeatureVector,
}

impl LinearModel {
    pub fn new(theta: FeatureVector) -> Self {
        Self { theta }
    }

    pub fn with_weight(mut self, key: impl Into<String>, weight: f64) -> Self {
        self.theta.set(key, weight);
        self
    }

    /// Weights as a flat JSON object, `{"UNARY#boy#boy-01": 1.5, ...}`.
    pub fn from_json_str(text: &str) -> Result<Self, WeightsError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, WeightsError> {
        let text = std::fs::read_to_string(path).map_err(|source| WeightsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}

impl WeightModel for LinearModel {
    fn theta(&self) -> &FeatureVector {
        &self.theta
    }
}
