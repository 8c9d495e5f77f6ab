use crate::config::ConfigError;
use semgraph_factor::{FactorGraphError, InferenceError, InferenceMethod};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    /// The query needs a decomposition the inference method cannot give.
    #[error("`{operation}` is not supported under {method} inference")]
    Unsupported {
        operation: &'static str,
        method: InferenceMethod,
    },

    #[error(transparent)]
    Graph(#[from] FactorGraphError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
