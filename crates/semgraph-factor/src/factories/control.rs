use super::shapes::{all_entities, entity_nodes, summarize, EntitySummary};
use super::{PotentialFactory, SideInfo};
use crate::error::FactorGraphError;
use crate::features::{feature_key, FeatureVector, WeightModel};
use crate::graph::{FactorGraph, NodeId};
use crate::job::FactorJob;
use ahash::AHashMap;
use semgraph_logic::LogicContext;
use tracing::debug;

const TAG: &str = "REFCTRL";

/// Control structures: an entity nested under a parent refers back to an
/// instance the parent is related to ("I want to buy a ticket").
///
/// Fires `REFCTRL#parent-type#parent-rel-to-referent#parent-rel-to-child#child-rel-to-ref`
/// and the bare `REFCTRL` indicator when the child's reference resolves to
/// the parent's related instance. Each job spans six nodes, so the tables
/// grow quickly; the factory is not part of the stock set.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceControlFactory;

/// Job node order: parent typing, parent relation, parent related id,
/// parent-to-child relation, child relation, child reference id.
fn control_job(nodes: Vec<NodeId>) -> FactorJob {
    FactorJob::new(TAG, nodes, |values| {
        let mut features = FeatureVector::new();
        if values[2] == values[5] {
            features.set(
                feature_key(&[
                    TAG,
                    &values[0].head_name(),
                    &values[1].head_name(),
                    &values[3].head_name(),
                    &values[4].head_name(),
                ]),
                1.0,
            );
            features.set(TAG, 1.0);
        }
        features
    })
}

impl PotentialFactory for ReferenceControlFactory {
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
        let mut summaries: AHashMap<NodeId, EntitySummary> = AHashMap::new();
        for entity in all_entities(ctx, graph) {
            match summarize(ctx, graph, &entity)? {
                Some(summary) => {
                    summaries.insert(entity.term, summary);
                }
                None => debug!(entity = %graph.node(entity.term).expr(), "untyped entity skipped"),
            }
        }

        let mut jobs = Vec::new();
        for parent in all_entities(ctx, graph) {
            let Some(parent) = summaries.get(&parent.term) else {
                continue;
            };
            for link in &parent.related {
                let Some(child) = entity_nodes(ctx, graph, link.argument)
                    .and_then(|nested| summaries.get(&nested.term))
                else {
                    continue;
                };
                for own in child.related.iter().filter(|r| r.is_reference) {
                    let Some(reference) = own.target else {
                        continue;
                    };
                    for sibling in &parent.related {
                        let Some(referent) = sibling.target else {
                            continue;
                        };
                        jobs.push(control_job(vec![
                            parent.typing,
                            sibling.relation,
                            referent,
                            link.relation,
                            own.relation,
                            reference,
                        ]));
                    }
                }
            }
        }
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::{NoCandidates, ReferenceCandidates};
    use crate::features::LinearModel;

    const WANT_TO_BUY: &str = "(a:<id,<<e,t>,e>> !0 (lambda $0:e (and:<t*,t> (want-01:<e,t> $0) \
        (c_ARG0:<e,<e,t>> $0 (a:<id,<<e,t>,e>> !1 (lambda $1:e (person:<e,t> $1)))) \
        (c_ARG1:<e,<e,t>> $0 (a:<id,<<e,t>,e>> !2 (lambda $2:e (and:<t*,t> (buy-01:<e,t> $2) \
        (c_ARG0:<e,<e,t>> $2 (ref:<id,e> na:id)))))))))";

    fn jobs_for(ctx: &LogicContext, graph: &FactorGraph) -> Vec<FactorJob> {
        ReferenceControlFactory
            .create_jobs(ctx, graph, &SideInfo::default(), &LinearModel::default())
            .unwrap()
    }

    #[test]
    fn test_nested_reference_fires_once_per_parent_relation() {
        let ctx = LogicContext::new();
        let expr = ctx.read(WANT_TO_BUY).unwrap();
        let graph = FactorGraph::from_expression(&ctx, &expr, &ReferenceCandidates, false);
        let jobs = jobs_for(&ctx, &graph);
        // One job per relation of the parent: c_ARG0 (to !1) and c_ARG1 (to !2).
        assert_eq!(jobs.len(), 2);

        let model = LinearModel::default();
        let table = jobs[0].run(&graph, &model).unwrap().unwrap();
        let firing: Vec<usize> = (0..table.len())
            .filter(|&row| !table.features_at(row).is_empty())
            .collect();
        assert_eq!(firing.len(), 1);
        let features = table.features_at(firing[0]);
        assert_eq!(features.get("REFCTRL#want-01#c_ARG0#c_ARG1#c_ARG0"), 1.0);
        assert_eq!(features.get("REFCTRL"), 1.0);
        assert_eq!(features.len(), 2);
    }

    #[test]
    fn test_resolved_structure_has_no_control_jobs() {
        let ctx = LogicContext::new();
        let expr = ctx
            .read(
                "(a:<id,<<e,t>,e>> !0 (lambda $0:e (and:<t*,t> (want-01:<e,t> $0) \
                 (c_ARG0:<e,<e,t>> $0 (a:<id,<<e,t>,e>> !1 (lambda $1:e (boy:<e,t> $1)))))))",
            )
            .unwrap();
        let graph = FactorGraph::from_expression(&ctx, &expr, &NoCandidates, false);
        assert!(jobs_for(&ctx, &graph).is_empty());
    }
}
