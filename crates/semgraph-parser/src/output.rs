//! Aggregated second-stage output and its queries.

use crate::base::{BaseDerivation, BaseParseOutput, ResultFilter};
use crate::derivation::{Derivation, DerivationBuilder, InferenceTriple};
use crate::error::ParseError;
use ahash::AHashMap;
use parking_lot::RwLock;
use semgraph_factor::{
    log_add, log_sum_exp, EvaluationResult, FactorGraph, FeatureVector, InferenceMethod,
};
use semgraph_logic::{canonicalize, Expr, LogicContext};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, warn};

/// A factor graph together with the base derivation it was built from.
#[derive(Debug, Clone)]
pub struct ParsedGraph {
    base: usize,
    graph: FactorGraph,
}

impl ParsedGraph {
    pub(crate) fn new(base: usize, graph: FactorGraph) -> Self {
        Self { base, graph }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn graph(&self) -> &FactorGraph {
        &self.graph
    }
}

pub struct ParseOutput<'b, B: BaseParseOutput> {
    ctx: Arc<LogicContext>,
    method: InferenceMethod,
    base: &'b B,
    graphs: Vec<ParsedGraph>,
    derivations: Vec<Derivation>,
    index: AHashMap<Expr, usize>,
    /// Base derivations with at least one stored triple, ascending.
    participating: Vec<usize>,
    /// Result normalizer of each participating base's graph.
    eval_norms: AHashMap<usize, f64>,
    exact: bool,
    log_norm: f64,
    norm_epsilon: f64,
    reconstructed: RwLock<AHashMap<Expr, Vec<Derivation>>>,
}

fn best_of<'a>(derivations: impl Iterator<Item = &'a Derivation>) -> Vec<&'a Derivation> {
    let derivations: Vec<&Derivation> = derivations.collect();
    let best = derivations
        .iter()
        .map(|d| d.score())
        .fold(f64::NEG_INFINITY, f64::max);
    derivations.into_iter().filter(|d| d.score() == best).collect()
}

impl<'b, B: BaseParseOutput> ParseOutput<'b, B> {
    pub(crate) fn new(
        ctx: Arc<LogicContext>,
        method: InferenceMethod,
        base: &'b B,
        graphs: Vec<ParsedGraph>,
        derivations: Vec<Derivation>,
        index: AHashMap<Expr, usize>,
        exact: bool,
        norm_epsilon: f64,
    ) -> Self {
        let mut eval_norms = AHashMap::new();
        let mut participating = BTreeSet::new();
        for triple in derivations.iter().flat_map(|d| d.triples()) {
            participating.insert(triple.base);
            eval_norms.entry(triple.base).or_insert(triple.eval_log_norm);
        }
        let bases = base.derivations();
        let log_norm = log_sum_exp(participating.iter().map(|&i| bases[i].log_inside_score()));

        let output = Self {
            ctx,
            method,
            base,
            graphs,
            derivations,
            index,
            participating: participating.into_iter().collect(),
            eval_norms,
            exact,
            log_norm,
            norm_epsilon,
            reconstructed: RwLock::new(AHashMap::new()),
        };
        output.verify_norm();
        output
    }

    /// Check that the derivation inside scores add up to the normalizer.
    pub fn verify_norm(&self) -> bool {
        let total = log_sum_exp(self.derivations.iter().map(|d| d.log_inside_score()));
        if total == f64::NEG_INFINITY && self.log_norm == f64::NEG_INFINITY {
            return true;
        }
        let drift = (total - self.log_norm).abs();
        if drift > self.norm_epsilon {
            error!(
                derivations = self.derivations.len(),
                total,
                log_norm = self.log_norm,
                drift,
                "derivation inside scores do not sum to the normalizer"
            );
            return false;
        }
        true
    }

    fn require_decomposable(&self, operation: &'static str) -> Result<(), ParseError> {
        if self.method == InferenceMethod::Lbp {
            return Err(ParseError::Unsupported {
                operation,
                method: self.method,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Derivations
    // ------------------------------------------------------------------

    pub fn derivations(&self) -> &[Derivation] {
        &self.derivations
    }

    /// Derivations with the best viterbi score, ties included.
    pub fn max_derivations(&self) -> Vec<&Derivation> {
        best_of(self.derivations.iter())
    }

    pub fn derivations_where(
        &self,
        filter: &dyn ResultFilter,
    ) -> Result<Vec<&Derivation>, ParseError> {
        self.require_decomposable("derivations_where")?;
        Ok(self
            .derivations
            .iter()
            .filter(|d| filter.test_result(d.result()))
            .collect())
    }

    pub fn max_derivations_where(
        &self,
        filter: &dyn ResultFilter,
    ) -> Result<Vec<&Derivation>, ParseError> {
        self.require_decomposable("max_derivations_where")?;
        Ok(best_of(
            self.derivations.iter().filter(|d| filter.test_result(d.result())),
        ))
    }

    /// Every way the graphs can produce `expr`, compared up to renaming of
    /// bound variables and identifiers.
    ///
    /// Stored derivations are returned as they are. Otherwise the
    /// derivation is rebuilt from the graphs whose assignments reach
    /// `expr`; such derivations are flagged as excluded from the
    /// normalizer and memoized.
    pub fn derivations_for(&self, expr: &Expr) -> Result<Vec<Derivation>, ParseError> {
        let key = canonicalize(&self.ctx, expr).strip_overlays();
        if let Some(&i) = self.index.get(&key) {
            return Ok(vec![self.derivations[i].clone()]);
        }
        if self.method == InferenceMethod::None {
            return Ok(Vec::new());
        }
        if let Some(hit) = self.reconstructed.read().get(&key) {
            return Ok(hit.clone());
        }

        let mut builder = DerivationBuilder::new(key.clone());
        for parsed in &self.graphs {
            let graph = &parsed.graph;
            let Some(mapping) = graph.mapping_of(&key) else {
                continue;
            };
            let features = graph.features_of(&mapping)?;
            let score = graph.score_of(&mapping)?;
            let evaluation = EvaluationResult {
                expression: graph.to_expression(&mapping)?,
                score,
                features,
                log_probability: graph.marginals_product(&mapping),
            };
            builder.push(InferenceTriple {
                base: parsed.base,
                evaluation,
                eval_log_norm: self.eval_norms.get(&parsed.base).copied().unwrap_or(score),
            });
        }

        let found = if builder.is_empty() {
            Vec::new()
        } else {
            warn!(
                expression = %key,
                method = %self.method,
                "reconstructed a derivation outside the stored results"
            );
            vec![builder.finish(self.base.derivations(), true)]
        };
        self.reconstructed.write().insert(key, found.clone());
        Ok(found)
    }

    // ------------------------------------------------------------------
    // Normalizers
    // ------------------------------------------------------------------

    /// Log of the total mass of all stored derivations.
    pub fn log_norm(&self) -> f64 {
        self.log_norm
    }

    pub fn log_norm_where(&self, filter: &dyn ResultFilter) -> Result<f64, ParseError> {
        let kept = self.derivations_where(filter)?;
        Ok(log_sum_exp(kept.iter().map(|d| d.log_inside_score())))
    }

    pub fn log_norm_for(&self, expr: &Expr) -> Result<f64, ParseError> {
        let found = self.derivations_for(expr)?;
        Ok(log_sum_exp(found.iter().map(|d| d.log_inside_score())))
    }

    // ------------------------------------------------------------------
    // Expected features
    // ------------------------------------------------------------------

    /// Unnormalized log expected features of the given derivations,
    /// including the base features routed through them.
    fn expected_over<'a>(&self, derivations: impl Iterator<Item = &'a Derivation>) -> FeatureVector {
        let bases = self.base.derivations();
        let mut expected = FeatureVector::new();
        let mut outside: AHashMap<usize, f64> = AHashMap::new();
        for triple in derivations.flat_map(|d| d.triples()) {
            let weight = triple.log_probability();
            expected.add_log_scaled(
                &triple.evaluation.features,
                weight + bases[triple.base].log_inside_score(),
            );
            let entry = outside.entry(triple.base).or_insert(f64::NEG_INFINITY);
            *entry = log_add(*entry, weight);
        }
        expected.log_merge(&self.base.log_expected_features(&|i| outside.get(&i).copied()));
        expected
    }

    /// Expectations from factor beliefs, one pass over every belief row.
    fn expected_from_beliefs(&self) -> FeatureVector {
        let bases = self.base.derivations();
        let mut expected = FeatureVector::new();
        for parsed in &self.graphs {
            if self.participating.binary_search(&parsed.base).is_err() {
                continue;
            }
            let inside = bases[parsed.base].log_inside_score();
            for factor in parsed.graph.factors() {
                let table = factor.table();
                let Some(beliefs) = table.beliefs() else {
                    continue;
                };
                for (row, belief) in beliefs.iter().enumerate() {
                    expected.add_log_scaled(table.features_at(row), belief + inside);
                }
            }
        }
        let participating = &self.participating;
        expected.log_merge(&self.base.log_expected_features(&|i| {
            participating.binary_search(&i).ok().map(|_| 0.0)
        }));
        expected
    }

    pub fn log_expected_features(&self) -> FeatureVector {
        match self.method {
            InferenceMethod::Lbp => self.expected_from_beliefs(),
            InferenceMethod::Beam | InferenceMethod::None => {
                self.expected_over(self.derivations.iter())
            }
        }
    }

    pub fn log_expected_features_where(
        &self,
        filter: &dyn ResultFilter,
    ) -> Result<FeatureVector, ParseError> {
        let kept = self.derivations_where(filter)?;
        Ok(self.expected_over(kept.into_iter()))
    }

    pub fn log_expected_features_for(&self, expr: &Expr) -> Result<FeatureVector, ParseError> {
        let found = self.derivations_for(expr)?;
        Ok(self.expected_over(found.iter()))
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Both the base output and every inference pass were exact.
    pub fn is_exact(&self) -> bool {
        self.exact
    }

    pub fn graphs(&self) -> &[ParsedGraph] {
        &self.graphs
    }

    pub fn method(&self) -> InferenceMethod {
        self.method
    }

    pub fn base(&self) -> &B {
        self.base
    }
}
