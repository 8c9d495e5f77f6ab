use super::{PotentialFactory, SideInfo};
use crate::error::FactorGraphError;
use crate::features::{feature_key, FeatureVector, WeightModel};
use crate::graph::{FactorGraph, NodeKind};
use crate::job::FactorJob;
use semgraph_logic::LogicContext;

const TAG: &str = "FACLEX";

/// Pairs the surface form a constant was read off with the candidate it
/// resolves to: `FACLEX#<surface>#<candidate>`, plus a directional variant
/// when the overlay carries one.
#[derive(Debug, Default, Clone, Copy)]
pub struct SurfaceFormFactory;

impl PotentialFactory for SurfaceFormFactory {
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
        let mut jobs = Vec::new();
        for node in graph.variables() {
            if !matches!(node.kind(), NodeKind::Constant) || !node.is_underspecified() {
                continue;
            }
            let Some(overlay) = node.expr().as_constant().and_then(|c| c.overlay()) else {
                continue;
            };
            let surface = overlay.surface().to_string();
            let directionality = overlay.directionality().map(str::to_string);
            jobs.push(FactorJob::new(TAG, vec![node.id()], move |values| {
                let value = values[0].head_name();
                let mut features = FeatureVector::new();
                features.set(feature_key(&[TAG, &surface, &value]), 1.0);
                if let Some(dir) = &directionality {
                    features.set(feature_key(&[TAG, &surface, dir, &value]), 1.0);
                }
                features
            }));
        }
        Ok(jobs)
    }
}
