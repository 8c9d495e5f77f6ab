//! Factor graphs over expression trees.
//!
//! The node arena mirrors the expression exactly; node ids are assigned in
//! post-order, so children always precede their parent. Constants and
//! identifier slots are decision variables with a non-empty domain, every
//! other node is fixed structure.

use crate::assignment::AssignmentSource;
use crate::error::FactorGraphError;
use crate::features::FeatureVector;
use crate::table::{Assignment, FactorTable};
use semgraph_logic::{Expr, ExprKind, LogicContext};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactorId(pub u32);

impl FactorId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FactorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

// ============================================================================
// Nodes and factors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Lambda { arg: NodeId, body: NodeId },
    Literal { predicate: NodeId, args: Vec<NodeId> },
    Constant,
    SkolemId,
    Variable,
}

#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    expr: Expr,
    kind: NodeKind,
    domain: Vec<Expr>,
    underspecified: bool,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The expression this node was built from.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Candidate values; empty for structural nodes.
    pub fn domain(&self) -> &[Expr] {
        &self.domain
    }

    pub fn is_variable(&self) -> bool {
        !self.domain.is_empty()
    }

    /// The domain came from the assignment source rather than defaulting
    /// to the node itself.
    pub fn is_underspecified(&self) -> bool {
        self.underspecified
    }
}

#[derive(Debug, Clone)]
pub struct Factor {
    id: FactorId,
    label: String,
    table: FactorTable,
}

impl Factor {
    pub fn id(&self) -> FactorId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn table(&self) -> &FactorTable {
        &self.table
    }

    pub(crate) fn table_mut(&mut self) -> &mut FactorTable {
        &mut self.table
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.table.headers().iter().map(|h| h.node())
    }
}

// ============================================================================
// Graph
// ============================================================================

#[derive(Debug, Clone)]
pub struct FactorGraph {
    nodes: Vec<Node>,
    root: NodeId,
    closure: bool,
    factors: Vec<Factor>,
    edges: Vec<Vec<FactorId>>,
    variable_beliefs: Vec<Option<Vec<f64>>>,
    has_marginals: bool,
}

struct NodeBuilder<'a> {
    ctx: &'a LogicContext,
    root: &'a Expr,
    source: &'a dyn AssignmentSource,
    nodes: Vec<Node>,
}

impl NodeBuilder<'_> {
    fn push(&mut self, expr: Expr, kind: NodeKind, domain: Vec<Expr>, underspecified: bool) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            expr,
            kind,
            domain,
            underspecified,
        });
        id
    }

    fn add(&mut self, expr: &Expr) -> NodeId {
        match expr.kind() {
            ExprKind::Lambda { arg, body } => {
                let arg = self.push(
                    Expr::variable(arg.clone()),
                    NodeKind::Variable,
                    Vec::new(),
                    false,
                );
                let body = self.add(body);
                self.push(expr.clone(), NodeKind::Lambda { arg, body }, Vec::new(), false)
            }
            ExprKind::Literal { predicate, args } => {
                let predicate = self.add(predicate);
                let args = args.iter().map(|arg| self.add(arg)).collect();
                self.push(expr.clone(), NodeKind::Literal { predicate, args }, Vec::new(), false)
            }
            ExprKind::Constant(_) => {
                let mut domain: Vec<Expr> = Vec::new();
                for candidate in self.source.candidates(self.ctx, self.root, expr) {
                    if !domain.contains(&candidate) {
                        domain.push(candidate);
                    }
                }
                let underspecified = !domain.is_empty();
                if domain.is_empty() {
                    domain.push(expr.clone());
                }
                self.push(expr.clone(), NodeKind::Constant, domain, underspecified)
            }
            ExprKind::SkolemId(_) => {
                self.push(expr.clone(), NodeKind::SkolemId, vec![expr.clone()], false)
            }
            ExprKind::Variable(_) => {
                self.push(expr.clone(), NodeKind::Variable, Vec::new(), false)
            }
        }
    }
}

impl FactorGraph {
    /// Build the node structure of `root`. The graph has no factors yet.
    pub fn from_expression(
        ctx: &LogicContext,
        root: &Expr,
        source: &dyn AssignmentSource,
        closure: bool,
    ) -> Self {
        let mut builder = NodeBuilder {
            ctx,
            root,
            source,
            nodes: Vec::new(),
        };
        let root_id = builder.add(root);
        let nodes = builder.nodes;
        let count = nodes.len();
        Self {
            nodes,
            root: root_id,
            closure,
            factors: Vec::new(),
            edges: vec![Vec::new(); count],
            variable_beliefs: vec![None; count],
            has_marginals: false,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_expression(&self) -> &Expr {
        &self.node(self.root).expr
    }

    pub fn is_closure(&self) -> bool {
        self.closure
    }

    pub fn has_marginals(&self) -> bool {
        self.has_marginals
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn variables(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.is_variable())
    }

    pub fn factors(&self) -> &[Factor] {
        &self.factors
    }

    pub fn factor(&self, id: FactorId) -> &Factor {
        &self.factors[id.index()]
    }

    /// Factors attached to a node, in registration order.
    pub fn edges(&self, node: NodeId) -> &[FactorId] {
        &self.edges[node.index()]
    }

    pub fn variable_belief(&self, node: NodeId) -> Option<&[f64]> {
        self.variable_beliefs[node.index()].as_deref()
    }

    /// Register a finished factor and append its edges.
    pub fn attach(&mut self, label: &str, table: FactorTable) -> FactorId {
        let id = FactorId(self.factors.len() as u32);
        for header in table.headers() {
            self.edges[header.node().index()].push(id);
        }
        self.factors.push(Factor {
            id,
            label: label.to_string(),
            table,
        });
        id
    }

    pub(crate) fn factor_mut(&mut self, id: FactorId) -> &mut Factor {
        &mut self.factors[id.index()]
    }

    pub(crate) fn set_variable_belief(&mut self, node: NodeId, belief: Vec<f64>) {
        self.variable_beliefs[node.index()] = Some(belief);
    }

    pub(crate) fn mark_marginals(&mut self) {
        self.has_marginals = true;
    }

    // ------------------------------------------------------------------
    // Assignments
    // ------------------------------------------------------------------

    /// Resolved expression for an assignment. Singleton-domain nodes may be
    /// left out of the assignment.
    pub fn to_expression(&self, assignment: &Assignment) -> Result<Expr, FactorGraphError> {
        self.expression_at(self.root, assignment)
    }

    fn expression_at(&self, id: NodeId, assignment: &Assignment) -> Result<Expr, FactorGraphError> {
        let node = self.node(id);
        match &node.kind {
            NodeKind::Lambda { arg, body } => {
                let new_body = self.expression_at(*body, assignment)?;
                match self.node(*arg).expr.as_variable() {
                    Some(variable) => Ok(Expr::lambda(variable.clone(), new_body)),
                    None => Err(FactorGraphError::Malformed(format!(
                        "lambda node {id} has a non-variable argument"
                    ))),
                }
            }
            NodeKind::Literal { predicate, args } => {
                let predicate = self.expression_at(*predicate, assignment)?;
                let args = args
                    .iter()
                    .map(|arg| self.expression_at(*arg, assignment))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::literal(predicate, args))
            }
            NodeKind::Constant | NodeKind::SkolemId => match assignment.get(&id) {
                Some(&index) => node
                    .domain
                    .get(index)
                    .cloned()
                    .ok_or(FactorGraphError::UnknownAssignment { node: id, index }),
                None if node.domain.len() == 1 => Ok(node.domain[0].clone()),
                None => Err(FactorGraphError::IncompleteAssignment(id)),
            },
            NodeKind::Variable => Ok(node.expr.clone()),
        }
    }

    /// Align `expr` with the graph structure and return the assignment that
    /// reproduces it, or `None` when no assignment does. Overlays are ignored.
    pub fn mapping_of(&self, expr: &Expr) -> Option<Assignment> {
        let mut assignment = Assignment::new();
        self.align(self.root, expr, &mut assignment)
            .then_some(assignment)
    }

    fn align(&self, id: NodeId, expr: &Expr, assignment: &mut Assignment) -> bool {
        let node = self.node(id);
        match &node.kind {
            NodeKind::Lambda { arg, body } => match expr.as_lambda() {
                Some((variable, inner)) => {
                    self.node(*arg).expr.as_variable() == Some(variable)
                        && self.align(*body, inner, assignment)
                }
                None => false,
            },
            NodeKind::Literal { predicate, args } => match expr.as_literal() {
                Some((target_predicate, target_args)) if target_args.len() == args.len() => {
                    self.align(*predicate, target_predicate, assignment)
                        && args
                            .iter()
                            .zip(target_args)
                            .all(|(arg, target)| self.align(*arg, target, assignment))
                }
                _ => false,
            },
            NodeKind::Constant | NodeKind::SkolemId => {
                let target = expr.strip_overlays();
                match node.domain.iter().position(|v| v.strip_overlays() == target) {
                    Some(index) => {
                        assignment.insert(id, index);
                        true
                    }
                    None => false,
                }
            }
            NodeKind::Variable => node.expr == *expr,
        }
    }

    /// Sum of all factor features for a full assignment.
    pub fn features_of(&self, assignment: &Assignment) -> Result<FeatureVector, FactorGraphError> {
        let mut features = FeatureVector::new();
        for factor in &self.factors {
            features.add_all(factor.table.features(assignment)?);
        }
        Ok(features)
    }

    /// Sum of all factor scores for a full assignment.
    pub fn score_of(&self, assignment: &Assignment) -> Result<f64, FactorGraphError> {
        self.factors
            .iter()
            .map(|factor| factor.table.score(assignment))
            .sum()
    }

    /// Sum of the variables' log beliefs under an assignment; `None` before
    /// message passing or when the assignment misses a variable with beliefs.
    pub fn marginals_product(&self, assignment: &Assignment) -> Option<f64> {
        if !self.has_marginals {
            return None;
        }
        let mut total = 0.0;
        for node in self.variables() {
            let Some(belief) = self.variable_belief(node.id) else {
                continue;
            };
            let index = match assignment.get(&node.id) {
                Some(&index) => index,
                None if node.domain.len() == 1 => 0,
                None => return None,
            };
            total += belief.get(index)?;
        }
        Some(total)
    }
}

impl fmt::Display for FactorGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "graph root={} closure={} marginals={}",
            self.root, self.closure, self.has_marginals
        )?;
        for node in &self.nodes {
            match &node.kind {
                NodeKind::Lambda { arg, body } => {
                    writeln!(f, "  {} lambda {} {}", node.id, arg, body)?
                }
                NodeKind::Literal { predicate, args } => {
                    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                    writeln!(f, "  {} literal {} [{}]", node.id, predicate, args.join(", "))?
                }
                NodeKind::Variable => writeln!(f, "  {} variable {}", node.id, node.expr)?,
                NodeKind::Constant | NodeKind::SkolemId => {
                    let domain: Vec<String> = node.domain.iter().map(|d| d.to_string()).collect();
                    write!(f, "  {} {} domain=[{}]", node.id, node.expr, domain.join(", "))?;
                    if let Some(belief) = self.variable_belief(node.id) {
                        let probs: Vec<String> =
                            belief.iter().map(|b| format!("{:.3}", b.exp())).collect();
                        write!(f, " belief=[{}]", probs.join(", "))?;
                    }
                    writeln!(f)?;
                }
            }
        }
        for factor in &self.factors {
            let nodes: Vec<String> = factor.nodes().map(|n| n.to_string()).collect();
            writeln!(
                f,
                "  {} {} over [{}] rows={}",
                factor.id,
                factor.label,
                nodes.join(", "),
                factor.table.len()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::{CandidateTable, NoCandidates};

    #[test]
    fn test_nodes_mirror_expression_in_post_order() {
        let ctx = LogicContext::new();
        let expr = ctx.read("(lambda $0:e (boy:<e,t> $0))").unwrap();
        let graph = FactorGraph::from_expression(&ctx, &expr, &NoCandidates, false);
        assert_eq!(graph.nodes().len(), 5);
        assert_eq!(graph.root(), NodeId(4));
        assert_eq!(graph.node(NodeId(1)).kind(), &NodeKind::Constant);
        assert_eq!(graph.variables().count(), 1);
        assert_eq!(graph.root_expression(), &expr);
    }

    #[test]
    fn test_to_expression_and_mapping_agree() {
        let ctx = LogicContext::new();
        let expr = ctx.read("(c_REL:<e,<e,t>> !0 !1)").unwrap();
        let mut table = CandidateTable::new();
        table.insert(
            ctx.read("c_REL:<e,<e,t>>").unwrap(),
            vec![
                ctx.read("c_ARG0:<e,<e,t>>").unwrap(),
                ctx.read("c_ARG1:<e,<e,t>>").unwrap(),
            ],
        );
        let graph = FactorGraph::from_expression(&ctx, &expr, &table, false);
        let predicate = graph
            .variables()
            .find(|n| n.is_underspecified())
            .map(|n| n.id())
            .unwrap();

        let mut assignment = Assignment::new();
        assignment.insert(predicate, 1);
        let resolved = graph.to_expression(&assignment).unwrap();
        assert_eq!(resolved.to_string(), "(c_ARG1:<e,<e,t>> !0 !1)");

        let mapping = graph.mapping_of(&resolved).unwrap();
        assert_eq!(mapping.get(&predicate), Some(&1));
        assert!(graph.mapping_of(&ctx.read("(c_ARG2:<e,<e,t>> !0 !1)").unwrap()).is_none());
    }

    #[test]
    fn test_incomplete_assignment_is_error() {
        let ctx = LogicContext::new();
        let expr = ctx.read("boy:<e,t>").unwrap();
        let mut table = CandidateTable::new();
        table.insert(
            expr.clone(),
            vec![ctx.read("boy-01:<e,t>").unwrap(), ctx.read("boy-02:<e,t>").unwrap()],
        );
        let graph = FactorGraph::from_expression(&ctx, &expr, &table, false);
        assert_eq!(
            graph.to_expression(&Assignment::new()),
            Err(FactorGraphError::IncompleteAssignment(NodeId(0)))
        );
    }
}
