//! Deferred factor construction.
//!
//! A [`FactorJob`] captures everything it needs when a factory creates it:
//! the node ids it connects and an immutable feature function. Running a job
//! only reads the graph, so jobs of one graph run in parallel; registering
//! the resulting table is left to the caller.

use crate::error::FactorGraphError;
use crate::features::{FeatureVector, WeightModel};
use crate::graph::{FactorGraph, NodeId};
use crate::table::{ColumnHeader, FactorTable};
use semgraph_logic::Expr;
use std::fmt;

/// Computes the features of one row. The slice holds one value per
/// connected node, in the job's node order: the candidate value for
/// decision variables and the fixed expression for structural nodes.
pub type FeatureFn = dyn Fn(&[Expr]) -> FeatureVector + Send + Sync;

pub struct FactorJob {
    label: String,
    nodes: Vec<NodeId>,
    features: Box<FeatureFn>,
}

impl FactorJob {
    pub fn new<F>(label: impl Into<String>, nodes: Vec<NodeId>, features: F) -> Self
    where
        F: Fn(&[Expr]) -> FeatureVector + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            nodes,
            features: Box::new(features),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Build the factor table. `Ok(None)` when no row has any feature.
    pub fn run(
        &self,
        graph: &FactorGraph,
        model: &dyn WeightModel,
    ) -> Result<Option<FactorTable>, FactorGraphError> {
        let mut headers: Vec<ColumnHeader> = Vec::new();
        for &id in &self.nodes {
            let node = graph.node(id);
            if node.is_variable() && !headers.iter().any(|h| h.node() == id) {
                headers.push(ColumnHeader::new(id, node.domain().to_vec()));
            }
        }
        if headers.is_empty() {
            return Err(FactorGraphError::NoVariables {
                label: self.label.clone(),
            });
        }

        let mut table = FactorTable::new(headers);
        // Position of each job node among the table columns.
        let columns: Vec<Option<usize>> =
            self.nodes.iter().map(|&id| table.column_of(id)).collect();

        let mut any_features = false;
        let mut values: Vec<Expr> = Vec::with_capacity(self.nodes.len());
        for row in 0..table.len() {
            let indices = table.unravel(row);
            values.clear();
            for (&id, column) in self.nodes.iter().zip(&columns) {
                let value = match column {
                    Some(column) => &table.headers()[*column].values()[indices[*column]],
                    None => graph.node(id).expr(),
                };
                values.push(value.clone());
            }
            let features = (self.features)(&values);
            any_features |= !features.is_empty();
            let score = model.score(&features);
            table.set_row(row, score, features);
        }

        Ok(any_features.then_some(table))
    }
}

impl fmt::Debug for FactorJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactorJob")
            .field("label", &self.label)
            .field("nodes", &self.nodes)
            .finish()
    }
}
