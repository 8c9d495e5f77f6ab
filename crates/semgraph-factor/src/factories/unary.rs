use super::{PotentialFactory, SideInfo};
use crate::error::FactorGraphError;
use crate::features::{feature_key, FeatureVector, WeightModel};
use crate::graph::{FactorGraph, NodeKind};
use crate::job::FactorJob;
use semgraph_logic::LogicContext;

const TAG: &str = "UNARY";

/// Bias of each underspecified constant towards each of its candidates:
/// `UNARY#<constant>#<candidate>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnaryBiasFactory;

impl PotentialFactory for UnaryBiasFactory {
    fn name(&self) -> &'static str {
        TAG
    }

    fn create_jobs(
        &self,
        _ctx: &LogicContext,
        graph: &FactorGraph,
        _side: &SideInfo,
        _model: &dyn WeightModel,
    ) -> Result<Vec<FactorJob>, FactorGraphError> {
        let jobs = graph
            .variables()
            .filter(|node| matches!(node.kind(), NodeKind::Constant) && node.is_underspecified())
            .map(|node| {
                let base = node.expr().head_name();
                FactorJob::new(TAG, vec![node.id()], move |values| {
                    let mut features = FeatureVector::new();
                    features.set(feature_key(&[TAG, &base, &values[0].head_name()]), 1.0);
                    features
                })
            })
            .collect();
        Ok(jobs)
    }
}
