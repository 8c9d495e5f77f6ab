//! Graph construction: nodes from the expression, factors from the
//! potential factories.

use crate::assignment::AssignmentSource;
use crate::error::FactorGraphError;
use crate::factories::{PotentialFactory, SideInfo};
use crate::features::WeightModel;
use crate::graph::FactorGraph;
use crate::job::FactorJob;
use rayon::prelude::*;
use semgraph_logic::{Expr, LogicContext};
use std::sync::Arc;
use tracing::{debug, warn};

/// Builds factor graphs for one configured factory set.
pub struct GraphBuilder<'a> {
    ctx: &'a LogicContext,
    source: &'a dyn AssignmentSource,
    factories: &'a [Arc<dyn PotentialFactory>],
    factor_limit: usize,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        ctx: &'a LogicContext,
        source: &'a dyn AssignmentSource,
        factories: &'a [Arc<dyn PotentialFactory>],
        factor_limit: usize,
    ) -> Self {
        Self {
            ctx,
            source,
            factories,
            factor_limit,
        }
    }

    /// Build the graph of `expr` and attach every factor.
    ///
    /// Returns `Ok(None)` when the factories produce more jobs than the
    /// factor limit; the caller drops that base derivation.
    pub fn build(
        &self,
        expr: &Expr,
        closure: bool,
        side: &SideInfo,
        model: &dyn WeightModel,
    ) -> Result<Option<FactorGraph>, FactorGraphError> {
        let mut graph = FactorGraph::from_expression(self.ctx, expr, self.source, closure);

        let mut jobs: Vec<FactorJob> = Vec::new();
        for factory in self.factories {
            let created = factory.create_jobs(self.ctx, &graph, side, model)?;
            debug!(factory = factory.name(), jobs = created.len(), "created factor jobs");
            jobs.extend(created);
        }

        if jobs.len() > self.factor_limit {
            warn!(
                jobs = jobs.len(),
                limit = self.factor_limit,
                expression = %expr,
                "too many factors, skipping graph"
            );
            return Ok(None);
        }

        let tables = jobs
            .par_iter()
            .map(|job| job.run(&graph, model))
            .collect::<Result<Vec<_>, _>>()?;

        for (job, table) in jobs.iter().zip(tables) {
            if let Some(table) = table {
                graph.attach(job.label(), table);
            }
        }

        debug!(
            nodes = graph.nodes().len(),
            variables = graph.variables().count(),
            factors = graph.factors().len(),
            "built factor graph"
        );
        Ok(Some(graph))
    }
}
