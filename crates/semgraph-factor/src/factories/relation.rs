use super::shapes::{
    all_entities, conjunct_nodes, entity_instances, entity_nodes, is_occurrence_of, reference_id,
    typing_node,
};
use super::{PotentialFactory, SideInfo};
use crate::error::FactorGraphError;
use crate::features::{feature_key, FeatureVector, WeightModel};
use crate::graph::{FactorGraph, NodeId, NodeKind};
use crate::job::FactorJob;
use semgraph_logic::{Expr, LogicContext};

const TAG: &str = "RELPREF";
const PASSIVE_SUFFIX: &str = "-of";

/// Selectional preference of relations: which subject and object types a
/// relation links. Passive relations (`rel-of`) are scored as their active
/// form with the arguments swapped.
#[derive(Debug, Default, Clone, Copy)]
pub struct RelationPreferenceFactory;

/// Trigram and both bigrams for one `(subject, relation, object)` triple.
fn preference_features(subject: &Expr, relation: &Expr, object: &Expr) -> FeatureVector {
    let mut subject = subject.head_name();
    let mut object = object.head_name();
    let mut relation = relation.head_name();
    if let Some(active) = relation.strip_suffix(PASSIVE_SUFFIX) {
        relation = active.to_string();
        std::mem::swap(&mut subject, &mut object);
    }
    let mut features = FeatureVector::new();
    features.set(feature_key(&[TAG, &subject, &relation, &object]), 1.0);
    features.set(feature_key(&[TAG, &subject, &relation]), 1.0);
    features.set(feature_key(&[TAG, &relation, &object]), 1.0);
    features
}

fn triple_job(nodes: Vec<NodeId>) -> FactorJob {
    FactorJob::new(TAG, nodes, |values| {
        preference_features(&values[0], &values[1], &values[2])
    })
}

impl PotentialFactory for RelationPreferenceFactory {
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
        let instances = entity_instances(ctx, graph)?;
        let mut jobs = Vec::new();

        for entity in all_entities(ctx, graph) {
            let Some(subject) = typing_node(ctx, graph, &entity)? else {
                continue;
            };
            for conjunct in conjunct_nodes(ctx, graph, entity.body) {
                let NodeKind::Literal { predicate, args } = graph.node(conjunct).kind() else {
                    continue;
                };
                let relation = *predicate;
                if args.len() != 2
                    || !matches!(graph.node(relation).kind(), NodeKind::Constant)
                    || !is_occurrence_of(graph, args[0], entity.variable)
                {
                    continue;
                }
                let argument = args[1];

                if let Some(object) = entity_nodes(ctx, graph, argument) {
                    if let Some(object_type) = typing_node(ctx, graph, &object)? {
                        jobs.push(triple_job(vec![subject, relation, object_type]));
                    }
                } else if let Some(reference) = reference_id(ctx, graph, argument) {
                    for &(instance_type, instance_id) in &instances {
                        jobs.push(FactorJob::new(
                            TAG,
                            vec![subject, reference, instance_type, instance_id, relation],
                            |values| {
                                if values[1] == values[3] {
                                    preference_features(&values[0], &values[4], &values[2])
                                } else {
                                    FeatureVector::new()
                                }
                            },
                        ));
                    }
                } else if matches!(graph.node(argument).kind(), NodeKind::Constant) {
                    jobs.push(triple_job(vec![subject, relation, argument]));
                }
            }
        }
        Ok(jobs)
    }
}
