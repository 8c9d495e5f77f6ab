//! semgraph-factor: factor graphs over semantic expressions.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────┐  nodes + domains  ┌─────────────┐  jobs   ┌──────────────────┐
//! │   Expr   │──────────────────►│ FactorGraph │◄────────│ PotentialFactory │
//! └──────────┘  AssignmentSource └──────┬──────┘ (rayon) └──────────────────┘
//!                                       │
//!                       ┌───────────────┼───────────────┐
//!                       ▼               ▼               ▼
//!                  ┌─────────┐     ┌─────────┐     ┌─────────┐
//!                  │  beam   │     │   lbp   │     │  none   │
//!                  └────┬────┘     └────┬────┘     └────┬────┘
//!                       └───────────────┼───────────────┘
//!                                       ▼
//!                              EvaluationResult*
//! ```
//!
//! ## Scoring
//! - Every factor row carries a sparse [`FeatureVector`] and the score
//!   `θ · features` under the [`WeightModel`].
//! - The score of a full assignment is the sum of its factor scores.
//! - Scores are log potentials; all normalization happens in log space.
//!
//! ## Concurrency
//! Factories only read the graph and return deferred [`FactorJob`]s. Jobs run
//! in parallel and their tables are attached in job order, so graphs are
//! identical from run to run.

pub mod assignment;
pub mod builder;
pub mod error;
pub mod factories;
pub mod features;
pub mod graph;
pub mod inference;
pub mod job;
pub mod math;
pub mod table;

pub use assignment::{
    AssignmentSource, CandidateTable, CandidateTableError, ChainedSources, NoCandidates,
    ReferenceCandidates,
};
pub use builder::GraphBuilder;
pub use error::{FactorGraphError, InferenceError};
pub use factories::{
    default_factories, ClosureFactory, PotentialFactory, ReferenceControlFactory,
    RelationPreferenceFactory, SideInfo, SurfaceFormFactory, UnaryBiasFactory,
};
pub use features::{feature_key, FeatureVector, LinearModel, WeightModel, WeightsError};
pub use graph::{Factor, FactorGraph, FactorId, Node, NodeId, NodeKind};
pub use inference::lbp::{BpReport, BpSettings};
pub use inference::{EvaluationResult, InferenceMethod, InferenceOutcome};
pub use job::FactorJob;
pub use math::{log_add, log_sum_exp};
pub use table::{Assignment, ColumnHeader, FactorTable};
