//! Local shape matching over graph nodes.

use crate::error::FactorGraphError;
use crate::graph::{FactorGraph, NodeId, NodeKind};
use semgraph_logic::LogicContext;

/// Node ids of one entity-introduction term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityNodes {
    pub term: NodeId,
    pub id: NodeId,
    pub variable: NodeId,
    pub body: NodeId,
}

pub fn entity_nodes(ctx: &LogicContext, graph: &FactorGraph, node: NodeId) -> Option<EntityNodes> {
    let NodeKind::Literal { predicate, args } = graph.node(node).kind() else {
        return None;
    };
    let is_skolem = graph
        .node(*predicate)
        .expr()
        .as_constant()
        .is_some_and(|c| c.same_symbol(ctx.skolem_predicate()));
    if !is_skolem || args.len() != 2 {
        return None;
    }
    let NodeKind::Lambda { arg, body } = graph.node(args[1]).kind() else {
        return None;
    };
    Some(EntityNodes {
        term: node,
        id: args[0],
        variable: *arg,
        body: *body,
    })
}

/// Every entity term in the graph, in node order.
pub fn all_entities(ctx: &LogicContext, graph: &FactorGraph) -> Vec<EntityNodes> {
    graph
        .nodes()
        .iter()
        .filter_map(|node| entity_nodes(ctx, graph, node.id()))
        .collect()
}

/// Conjunct nodes of a body; a non-conjunction body is its own conjunct.
pub fn conjunct_nodes(ctx: &LogicContext, graph: &FactorGraph, body: NodeId) -> Vec<NodeId> {
    match graph.node(body).kind() {
        NodeKind::Literal { predicate, args } if ctx.is_conjunction(graph.node(*predicate).expr()) => {
            args.clone()
        }
        _ => vec![body],
    }
}

/// `node` is an occurrence of the variable bound at `variable`.
pub fn is_occurrence_of(graph: &FactorGraph, node: NodeId, variable: NodeId) -> bool {
    matches!(graph.node(node).kind(), NodeKind::Variable)
        && graph.node(node).expr() == graph.node(variable).expr()
}

/// Identifier node of a `(ref id)` literal.
pub fn reference_id(ctx: &LogicContext, graph: &FactorGraph, node: NodeId) -> Option<NodeId> {
    let NodeKind::Literal { predicate, args } = graph.node(node).kind() else {
        return None;
    };
    let is_ref = graph
        .node(*predicate)
        .expr()
        .as_constant()
        .is_some_and(|c| c.same_symbol(ctx.reference_predicate()));
    (is_ref && args.len() == 1).then(|| args[0])
}

/// Predicate node of the entity's unary typing literal `(type $x)`.
///
/// More than one typing literal on one entity is a malformed structure.
pub fn typing_node(
    ctx: &LogicContext,
    graph: &FactorGraph,
    entity: &EntityNodes,
) -> Result<Option<NodeId>, FactorGraphError> {
    let mut found: Option<NodeId> = None;
    for conjunct in conjunct_nodes(ctx, graph, entity.body) {
        let NodeKind::Literal { predicate, args } = graph.node(conjunct).kind() else {
            continue;
        };
        let typing = args.len() == 1
            && matches!(graph.node(*predicate).kind(), NodeKind::Constant)
            && is_occurrence_of(graph, args[0], entity.variable);
        if !typing {
            continue;
        }
        if found.is_some() {
            return Err(FactorGraphError::Malformed(format!(
                "entity {} has more than one typing literal",
                graph.node(entity.term).expr()
            )));
        }
        found = Some(*predicate);
    }
    Ok(found)
}

/// `(typing predicate node, identifier node)` for every typed entity.
pub fn entity_instances(
    ctx: &LogicContext,
    graph: &FactorGraph,
) -> Result<Vec<(NodeId, NodeId)>, FactorGraphError> {
    let mut instances = Vec::new();
    for entity in all_entities(ctx, graph) {
        if let Some(typing) = typing_node(ctx, graph, &entity)? {
            instances.push((typing, entity.id));
        }
    }
    Ok(instances)
}

/// One binary relation of an entity, `(rel $x arg)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Related {
    pub relation: NodeId,
    pub argument: NodeId,
    /// Identifier node of the related instance: the nested entity's id or
    /// the id inside a `(ref id)`. `None` for constant arguments.
    pub target: Option<NodeId>,
    pub is_reference: bool,
}

/// A typed entity with its outgoing relations in conjunct order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySummary {
    pub entity: EntityNodes,
    pub typing: NodeId,
    pub related: Vec<Related>,
}

/// Summarize an entity; `None` when it has no typing literal.
pub fn summarize(
    ctx: &LogicContext,
    graph: &FactorGraph,
    entity: &EntityNodes,
) -> Result<Option<EntitySummary>, FactorGraphError> {
    let Some(typing) = typing_node(ctx, graph, entity)? else {
        return Ok(None);
    };
    let mut related = Vec::new();
    for conjunct in conjunct_nodes(ctx, graph, entity.body) {
        let NodeKind::Literal { predicate, args } = graph.node(conjunct).kind() else {
            continue;
        };
        if args.len() != 2
            || !matches!(graph.node(*predicate).kind(), NodeKind::Constant)
            || !is_occurrence_of(graph, args[0], entity.variable)
        {
            continue;
        }
        let argument = args[1];
        let (target, is_reference) = if let Some(id) = reference_id(ctx, graph, argument) {
            (Some(id), true)
        } else if let Some(nested) = entity_nodes(ctx, graph, argument) {
            (Some(nested.id), false)
        } else if matches!(graph.node(argument).kind(), NodeKind::Constant) {
            (None, false)
        } else {
            continue;
        };
        related.push(Related {
            relation: *predicate,
            argument,
            target,
            is_reference,
        });
    }
    Ok(Some(EntitySummary {
        entity: *entity,
        typing,
        related,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::NoCandidates;

    #[test]
    fn test_entity_typing_and_instances() {
        let ctx = LogicContext::new();
        let expr = ctx
            .read(
                "(a:<id,<<e,t>,e>> !0 (lambda $0:e (and:<t*,t> (want-01:<e,t> $0) \
                 (c_ARG0:<e,<e,t>> $0 (a:<id,<<e,t>,e>> !1 (lambda $1:e (boy:<e,t> $1)))))))",
            )
            .unwrap();
        let graph = FactorGraph::from_expression(&ctx, &expr, &NoCandidates, false);
        let root = entity_nodes(&ctx, &graph, graph.root()).unwrap();
        let typing = typing_node(&ctx, &graph, &root).unwrap().unwrap();
        assert_eq!(graph.node(typing).expr().to_string(), "want-01:<e,t>");

        let instances = entity_instances(&ctx, &graph).unwrap();
        assert_eq!(instances.len(), 2);
        let names: Vec<String> = instances
            .iter()
            .map(|(t, _)| graph.node(*t).expr().head_name())
            .collect();
        assert!(names.contains(&"boy".to_string()));
    }

    #[test]
    fn test_summary_lists_relations_and_targets() {
        let ctx = LogicContext::new();
        let expr = ctx
            .read(
                "(a:<id,<<e,t>,e>> !0 (lambda $0:e (and:<t*,t> (want-01:<e,t> $0) \
                 (c_ARG0:<e,<e,t>> $0 (a:<id,<<e,t>,e>> !1 (lambda $1:e (boy:<e,t> $1)))) \
                 (c_ARG1:<e,<e,t>> $0 (ref:<id,e> !1)) \
                 (c_mod:<e,<e,t>> $0 very:e))))",
            )
            .unwrap();
        let graph = FactorGraph::from_expression(&ctx, &expr, &NoCandidates, false);
        let root = entity_nodes(&ctx, &graph, graph.root()).unwrap();
        let summary = summarize(&ctx, &graph, &root).unwrap().unwrap();
        assert_eq!(graph.node(summary.typing).expr().head_name(), "want-01");
        assert_eq!(summary.related.len(), 3);
        assert!(!summary.related[0].is_reference);
        assert!(summary.related[0].target.is_some());
        assert!(summary.related[1].is_reference);
        assert_eq!(summary.related[2].target, None);
    }

    #[test]
    fn test_two_typing_literals_are_malformed() {
        let ctx = LogicContext::new();
        let expr = ctx
            .read("(a:<id,<<e,t>,e>> !0 (lambda $0:e (and:<t*,t> (boy:<e,t> $0) (girl:<e,t> $0))))")
            .unwrap();
        let graph = FactorGraph::from_expression(&ctx, &expr, &NoCandidates, false);
        let root = entity_nodes(&ctx, &graph, graph.root()).unwrap();
        assert!(matches!(
            typing_node(&ctx, &graph, &root),
            Err(FactorGraphError::Malformed(_))
        ));
    }
}
