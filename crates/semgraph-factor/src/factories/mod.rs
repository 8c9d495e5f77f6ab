//! Potential factories.
//!
//! A factory inspects a built graph and returns deferred [`FactorJob`]s; it
//! never mutates the graph. Every stock factory tags its feature keys with
//! a short prefix (`UNARY`, `FACLEX`, `CLOSURE`, `RELPREF`, `REFCTRL`).

mod closure;
mod control;
mod relation;
pub mod shapes;
mod surface;
mod unary;

pub use closure::ClosureFactory;
pub use control::ReferenceControlFactory;
pub use relation::RelationPreferenceFactory;
pub use surface::SurfaceFormFactory;
pub use unary::UnaryBiasFactory;

use crate::error::FactorGraphError;
use crate::features::WeightModel;
use crate::graph::FactorGraph;
use crate::job::FactorJob;
use semgraph_logic::LogicContext;
use std::sync::Arc;

/// Sentence-level information handed to every factory. None of the stock
/// factories read from it yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct SideInfo;

pub trait PotentialFactory: Send + Sync {
    fn name(&self) -> &'static str;

    fn create_jobs(
        &self,
        ctx: &LogicContext,
        graph: &FactorGraph,
        side: &SideInfo,
        model: &dyn WeightModel,
    ) -> Result<Vec<FactorJob>, FactorGraphError>;
}

/// The stock factory set. [`ReferenceControlFactory`] is opt-in.
pub fn default_factories() -> Vec<Arc<dyn PotentialFactory>> {
    vec![
        Arc::new(UnaryBiasFactory),
        Arc::new(SurfaceFormFactory),
        Arc::new(ClosureFactory),
        Arc::new(RelationPreferenceFactory),
    ]
}
