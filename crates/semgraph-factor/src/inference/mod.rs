//! Inference over built factor graphs.
//!
//! Three interchangeable methods:
//! - `beam`: bounded enumeration of joint assignments, ranked by score;
//! - `lbp`: loopy belief propagation followed by max-marginal decoding;
//! - `none`: returns the input expression untouched.

pub mod beam;
pub mod lbp;
pub mod none;

use crate::features::FeatureVector;
use semgraph_logic::Expr;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One resolved expression produced by inference.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub expression: Expr,
    pub score: f64,
    pub features: FeatureVector,
    /// Sum of max log-beliefs; only set by message passing.
    pub log_probability: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InferenceOutcome {
    pub results: Vec<EvaluationResult>,
    /// No candidate was pruned along the way.
    pub exact: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceMethod {
    #[default]
    #[serde(alias = "enumeration")]
    Beam,
    #[serde(alias = "message-passing", alias = "loopy-bp")]
    Lbp,
    None,
}

impl InferenceMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            InferenceMethod::Beam => "beam",
            InferenceMethod::Lbp => "lbp",
            InferenceMethod::None => "none",
        }
    }
}

impl fmt::Display for InferenceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InferenceMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "beam" | "enumeration" => Ok(InferenceMethod::Beam),
            "lbp" | "message-passing" | "loopy-bp" => Ok(InferenceMethod::Lbp),
            "none" => Ok(InferenceMethod::None),
            other => Err(format!("unknown inference method `{other}`")),
        }
    }
}
