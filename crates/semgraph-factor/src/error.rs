use crate::graph::NodeId;
use thiserror::Error;

/// Errors raised while building or querying a factor graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FactorGraphError {
    /// A factor job that references no decision variable.
    #[error("factor `{label}` connects no decision variables")]
    NoVariables { label: String },

    /// The semantic structure violates a shape the factories rely on.
    #[error("malformed semantic structure: {0}")]
    Malformed(String),

    #[error("node {node} has no candidate at index {index}")]
    UnknownAssignment { node: NodeId, index: usize },

    #[error("assignment has no value for node {0}")]
    IncompleteAssignment(NodeId),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("{remaining} factors were never scored during enumeration")]
    UnconsumedFactors { remaining: usize },

    #[error("graph has no marginals, run belief propagation first")]
    MissingMarginals,

    #[error(transparent)]
    Graph(#[from] FactorGraphError),
}
