//! The second-stage parser: one factor graph per base derivation, inference
//! over every graph, then aggregation into derivations.

use crate::base::{BaseDerivation, BaseParseOutput, ClosureRepair, ResultFilter};
use crate::config::InferenceConfig;
use crate::derivation::{DerivationBuilder, InferenceTriple};
use crate::error::ParseError;
use crate::output::{ParseOutput, ParsedGraph};
use ahash::AHashMap;
use rayon::prelude::*;
use semgraph_factor::inference::{beam, lbp, none};
use semgraph_factor::{
    default_factories, log_sum_exp, AssignmentSource, FactorGraph, GraphBuilder, InferenceMethod,
    InferenceOutcome, PotentialFactory, SideInfo, WeightModel,
};
use semgraph_logic::{assign_ids, canonicalize, merge_named_entities, Expr, LogicContext};
use std::sync::Arc;
use tracing::{debug, info};

pub struct GraphParser {
    ctx: Arc<LogicContext>,
    config: InferenceConfig,
    source: Arc<dyn AssignmentSource>,
    factories: Vec<Arc<dyn PotentialFactory>>,
    closure: Option<Arc<dyn ClosureRepair>>,
}

/// A base structure ready for graph construction.
struct Prepared {
    base: usize,
    expr: Expr,
    closure: bool,
}

impl GraphParser {
    /// A parser with the stock factories.
    pub fn new(
        ctx: Arc<LogicContext>,
        config: InferenceConfig,
        source: Arc<dyn AssignmentSource>,
    ) -> Self {
        Self {
            ctx,
            config,
            source,
            factories: default_factories(),
            closure: None,
        }
    }

    pub fn with_factories(mut self, factories: Vec<Arc<dyn PotentialFactory>>) -> Self {
        self.factories = factories;
        self
    }

    /// Repair used for incomplete derivations when `sloppy` is set.
    pub fn with_closure(mut self, closure: Arc<dyn ClosureRepair>) -> Self {
        self.closure = Some(closure);
        self
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub fn context(&self) -> &LogicContext {
        &self.ctx
    }

    /// The structure a graph is built from: complete semantics, or the
    /// repaired structure of an incomplete derivation under sloppy inference.
    fn base_structure<D: BaseDerivation>(&self, derivation: &D) -> Option<(Expr, bool)> {
        if derivation.is_complete() {
            return derivation.semantics().map(|expr| (expr.clone(), false));
        }
        if !self.config.sloppy {
            return None;
        }
        let repair = self.closure.as_ref()?;
        repair.repair(&self.ctx, derivation).map(|expr| (expr, true))
    }

    fn prepare<B: BaseParseOutput>(&self, base: &B, filter: &dyn ResultFilter) -> Vec<Prepared> {
        let mut prepared = Vec::new();
        for (index, derivation) in base.derivations().iter().enumerate() {
            let Some((expr, closure)) = self.base_structure(derivation) else {
                debug!(base = index, "pruned base derivation without semantics");
                continue;
            };
            if !filter.test_step(&expr) {
                debug!(base = index, expression = %expr, "base structure rejected by filter");
                continue;
            }
            let expr = assign_ids(&self.ctx, &expr);
            let expr = merge_named_entities(&self.ctx, &expr);
            let expr = canonicalize(&self.ctx, &expr);
            prepared.push(Prepared {
                base: index,
                expr,
                closure,
            });
        }
        prepared
    }

    fn infer(
        &self,
        graph: &mut FactorGraph,
        model: &dyn WeightModel,
    ) -> Result<InferenceOutcome, ParseError> {
        Ok(match self.config.method {
            InferenceMethod::Beam => beam::search(graph, self.config.beam_size)?,
            InferenceMethod::Lbp => {
                lbp::run(graph, &self.config.bp_settings());
                InferenceOutcome {
                    results: lbp::max_evaluations(graph, model, self.config.max_parses_limit)?,
                    exact: true,
                }
            }
            InferenceMethod::None => none::pass_through(graph),
        })
    }

    /// Run the second stage over every base derivation.
    pub fn parse<'b, B: BaseParseOutput>(
        &self,
        base: &'b B,
        side: &SideInfo,
        model: &dyn WeightModel,
        filter: &dyn ResultFilter,
    ) -> Result<ParseOutput<'b, B>, ParseError> {
        let prepared = self.prepare(base, filter);
        let builder = GraphBuilder::new(
            &self.ctx,
            self.source.as_ref(),
            &self.factories,
            self.config.factor_limit,
        );

        let inferred = prepared
            .par_iter()
            .map(|item| -> Result<Option<(usize, FactorGraph, InferenceOutcome)>, ParseError> {
                let Some(mut graph) = builder.build(&item.expr, item.closure, side, model)? else {
                    return Ok(None);
                };
                let outcome = self.infer(&mut graph, model)?;
                Ok(Some((item.base, graph, outcome)))
            })
            .collect::<Result<Vec<_>, ParseError>>()?;

        // Aggregate in base order.
        let mut exact = base.is_exact();
        let mut graphs = Vec::new();
        let mut builders: Vec<DerivationBuilder> = Vec::new();
        let mut index: AHashMap<Expr, usize> = AHashMap::new();
        for (base_index, graph, outcome) in inferred.into_iter().flatten() {
            exact &= outcome.exact;
            let kept: Vec<_> = outcome
                .results
                .into_iter()
                .filter(|result| filter.test_result(&result.expression))
                .collect();
            let eval_log_norm = log_sum_exp(kept.iter().map(|r| r.score));
            for evaluation in kept {
                let key = canonicalize(&self.ctx, &evaluation.expression).strip_overlays();
                let slot = *index.entry(key.clone()).or_insert_with(|| {
                    builders.push(DerivationBuilder::new(key));
                    builders.len() - 1
                });
                builders[slot].push(InferenceTriple {
                    base: base_index,
                    evaluation,
                    eval_log_norm,
                });
            }
            graphs.push(ParsedGraph::new(base_index, graph));
        }

        let derivations = builders
            .into_iter()
            .map(|b| b.finish(base.derivations(), false))
            .collect();
        let output = ParseOutput::new(
            self.ctx.clone(),
            self.config.method,
            base,
            graphs,
            derivations,
            index,
            exact,
            self.config.norm_epsilon,
        );
        info!(
            method = %self.config.method,
            bases = base.derivations().len(),
            graphs = output.graphs().len(),
            derivations = output.derivations().len(),
            exact = output.is_exact(),
            log_norm = output.log_norm(),
            "second-stage parse finished"
        );
        Ok(output)
    }
}
