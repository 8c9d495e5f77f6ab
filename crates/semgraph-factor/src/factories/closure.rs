use super::shapes::entity_nodes;
use super::{PotentialFactory, SideInfo};
use crate::error::FactorGraphError;
use crate::features::{FeatureVector, WeightModel};
use crate::graph::FactorGraph;
use crate::job::FactorJob;
use semgraph_logic::LogicContext;

const TAG: &str = "CLOSURE";

/// Constant penalty (or bonus, depending on the learned weight) for graphs
/// built from a repaired structure. Attached to the root entity identifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClosureFactory;

impl PotentialFactory for ClosureFactory {
    fn name(&self) -> &'static str {
        TAG
    }

    fn create_jobs(
        &self,
        ctx: &LogicContext,
        graph: &FactorGraph,
        _side: &SideInfo,
        _model: &dyn WeightModel,
    ) -> Result<Vec<FactorJob>, FactorGraphError> {
        if !graph.is_closure() {
            return Ok(Vec::new());
        }
        let Some(root) = entity_nodes(ctx, graph, graph.root()) else {
            return Ok(Vec::new());
        };
        Ok(vec![FactorJob::new(TAG, vec![root.id], |_| {
            let mut features = FeatureVector::new();
            features.set(TAG, 1.0);
            features
        })])
    }
}
