//! Dense factor tables.
//!
//! One row per full assignment of the factor's columns, laid out row-major
//! with the last column varying fastest. Scores are log potentials; beliefs
//! (after message passing) are normalized log probabilities.

use crate::error::FactorGraphError;
use crate::features::FeatureVector;
use crate::graph::NodeId;
use crate::math::{log_sum_exp, normalize_log};
use ahash::AHashMap;
use semgraph_logic::Expr;

/// Node → index into that node's domain. May be partial.
pub type Assignment = AHashMap<NodeId, usize>;

/// One column of a table: a decision variable and its domain.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnHeader {
    node: NodeId,
    values: Vec<Expr>,
}

impl ColumnHeader {
    pub fn new(node: NodeId, values: Vec<Expr>) -> Self {
        Self { node, values }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn values(&self) -> &[Expr] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> Option<&Expr> {
        self.values.get(index)
    }
}

#[derive(Debug, Clone)]
pub struct FactorTable {
    headers: Vec<ColumnHeader>,
    strides: Vec<usize>,
    scores: Vec<f64>,
    features: Vec<FeatureVector>,
    beliefs: Option<Vec<f64>>,
}

impl FactorTable {
    /// Empty table (all scores 0, no features) over the given columns.
    pub fn new(headers: Vec<ColumnHeader>) -> Self {
        let mut strides = vec![0; headers.len()];
        let mut stride = 1;
        for (i, header) in headers.iter().enumerate().rev() {
            strides[i] = stride;
            stride *= header.len();
        }
        let size = stride;
        Self {
            headers,
            strides,
            scores: vec![0.0; size],
            features: vec![FeatureVector::new(); size],
            beliefs: None,
        }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn headers(&self) -> &[ColumnHeader] {
        &self.headers
    }

    pub fn column_of(&self, node: NodeId) -> Option<usize> {
        self.headers.iter().position(|h| h.node == node)
    }

    // ------------------------------------------------------------------
    // Indexed access
    // ------------------------------------------------------------------

    pub fn flat_index(&self, indices: &[usize]) -> usize {
        indices
            .iter()
            .zip(&self.strides)
            .map(|(index, stride)| index * stride)
            .sum()
    }

    /// Column indices of a row.
    pub fn unravel(&self, row: usize) -> Vec<usize> {
        self.headers
            .iter()
            .zip(&self.strides)
            .map(|(header, stride)| (row / stride) % header.len())
            .collect()
    }

    pub fn get_indexed(&self, indices: &[usize]) -> f64 {
        self.scores[self.flat_index(indices)]
    }

    pub fn features_indexed(&self, indices: &[usize]) -> &FeatureVector {
        &self.features[self.flat_index(indices)]
    }

    pub fn set_indexed(&mut self, indices: &[usize], score: f64, features: FeatureVector) {
        let row = self.flat_index(indices);
        self.set_row(row, score, features);
    }

    pub fn set_row(&mut self, row: usize, score: f64, features: FeatureVector) {
        self.scores[row] = score;
        self.features[row] = features;
    }

    pub fn score_at(&self, row: usize) -> f64 {
        self.scores[row]
    }

    pub fn features_at(&self, row: usize) -> &FeatureVector {
        &self.features[row]
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    // ------------------------------------------------------------------
    // Assignment access
    // ------------------------------------------------------------------

    /// Every column has a value in `assignment`.
    pub fn is_complete(&self, assignment: &Assignment) -> bool {
        self.headers
            .iter()
            .all(|header| assignment.contains_key(&header.node))
    }

    fn indices_of(&self, assignment: &Assignment) -> Result<Vec<usize>, FactorGraphError> {
        self.headers
            .iter()
            .map(|header| {
                let index = *assignment
                    .get(&header.node)
                    .ok_or(FactorGraphError::IncompleteAssignment(header.node))?;
                if index >= header.len() {
                    return Err(FactorGraphError::UnknownAssignment {
                        node: header.node,
                        index,
                    });
                }
                Ok(index)
            })
            .collect()
    }

    fn rows_matching<'a>(&'a self, assignment: &'a Assignment) -> impl Iterator<Item = usize> + 'a {
        (0..self.len()).filter(move |&row| {
            self.unravel(row)
                .iter()
                .zip(&self.headers)
                .all(|(index, header)| {
                    assignment
                        .get(&header.node)
                        .map_or(true, |wanted| wanted == index)
                })
        })
    }

    /// Score of a full assignment, or the log-sum-exp over all rows
    /// compatible with a partial one.
    pub fn get(&self, assignment: &Assignment) -> f64 {
        match self.indices_of(assignment) {
            Ok(indices) => self.get_indexed(&indices),
            Err(_) => log_sum_exp(self.rows_matching(assignment).map(|row| self.scores[row])),
        }
    }

    pub fn set(
        &mut self,
        assignment: &Assignment,
        score: f64,
        features: FeatureVector,
    ) -> Result<(), FactorGraphError> {
        let indices = self.indices_of(assignment)?;
        self.set_indexed(&indices, score, features);
        Ok(())
    }

    /// Score of a full assignment; partial assignments are an error.
    pub fn score(&self, assignment: &Assignment) -> Result<f64, FactorGraphError> {
        let indices = self.indices_of(assignment)?;
        Ok(self.get_indexed(&indices))
    }

    pub fn features(&self, assignment: &Assignment) -> Result<&FeatureVector, FactorGraphError> {
        let indices = self.indices_of(assignment)?;
        Ok(self.features_indexed(&indices))
    }

    /// Normalize scores in log space.
    pub fn normalize(&mut self) {
        normalize_log(&mut self.scores);
    }

    // ------------------------------------------------------------------
    // Beliefs
    // ------------------------------------------------------------------

    pub fn has_beliefs(&self) -> bool {
        self.beliefs.is_some()
    }

    pub fn beliefs(&self) -> Option<&[f64]> {
        self.beliefs.as_deref()
    }

    pub(crate) fn set_beliefs(&mut self, beliefs: Vec<f64>) {
        debug_assert_eq!(beliefs.len(), self.len());
        self.beliefs = Some(beliefs);
    }

    /// Log belief of a full assignment, marginalized for a partial one.
    pub fn belief(&self, assignment: &Assignment) -> Option<f64> {
        let beliefs = self.beliefs.as_ref()?;
        Some(match self.indices_of(assignment) {
            Ok(indices) => beliefs[self.flat_index(&indices)],
            Err(_) => log_sum_exp(self.rows_matching(assignment).map(|row| beliefs[row])),
        })
    }

    /// `Σ exp(belief)`; 1 for a well-formed belief table.
    pub fn belief_mass(&self) -> Option<f64> {
        self.beliefs
            .as_ref()
            .map(|beliefs| beliefs.iter().map(|b| b.exp()).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use semgraph_logic::{LogicContext, Type};

    fn header(ctx: &LogicContext, node: u32, names: &[&str]) -> ColumnHeader {
        ColumnHeader::new(
            NodeId(node),
            names
                .iter()
                .map(|n| Expr::constant(ctx.constant(n, Type::entity())))
                .collect(),
        )
    }

    #[test]
    fn test_table_size_is_product_of_domains() {
        let ctx = LogicContext::new();
        let table = FactorTable::new(vec![header(&ctx, 0, &["a", "b"]), header(&ctx, 1, &["x", "y", "z"])]);
        assert_eq!(table.len(), 6);
    }

    #[test]
    fn test_last_column_varies_fastest() {
        let ctx = LogicContext::new();
        let table = FactorTable::new(vec![header(&ctx, 0, &["a", "b"]), header(&ctx, 1, &["x", "y", "z"])]);
        assert_eq!(table.unravel(0), vec![0, 0]);
        assert_eq!(table.unravel(1), vec![0, 1]);
        assert_eq!(table.unravel(3), vec![1, 0]);
        assert_eq!(table.flat_index(&[1, 2]), 5);
    }

    #[test]
    fn test_partial_get_marginalizes() {
        let ctx = LogicContext::new();
        let mut table = FactorTable::new(vec![header(&ctx, 0, &["a", "b"]), header(&ctx, 1, &["x", "y"])]);
        for (row, score) in [0.1, 0.7, -0.4, 1.2].into_iter().enumerate() {
            table.set_row(row, score, FeatureVector::new());
        }
        let mut partial = Assignment::new();
        partial.insert(NodeId(0), 1);
        assert!(!table.is_complete(&partial));
        assert_relative_eq!(table.get(&partial), log_sum_exp([-0.4, 1.2]), epsilon = 1e-12);

        partial.insert(NodeId(1), 0);
        assert!(table.is_complete(&partial));
        assert_relative_eq!(table.get(&partial), -0.4);
    }

    #[test]
    fn test_set_rejects_out_of_domain_index() {
        let ctx = LogicContext::new();
        let mut table = FactorTable::new(vec![header(&ctx, 4, &["a", "b"])]);
        let mut assignment = Assignment::new();
        assignment.insert(NodeId(4), 2);
        assert_eq!(
            table.set(&assignment, 1.0, FeatureVector::new()),
            Err(FactorGraphError::UnknownAssignment { node: NodeId(4), index: 2 })
        );
    }
}
