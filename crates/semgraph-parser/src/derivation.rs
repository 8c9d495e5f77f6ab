//! Second-stage derivations: one resolved result and every way of reaching it.

use crate::base::BaseDerivation;
use semgraph_factor::{log_sum_exp, EvaluationResult};
use semgraph_logic::Expr;

/// One way of producing a result: a base derivation, one inference result
/// over its graph, and the normalizer of that graph's results.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceTriple {
    pub base: usize,
    pub evaluation: EvaluationResult,
    pub eval_log_norm: f64,
}

impl InferenceTriple {
    /// Log probability of the evaluation among its graph's results.
    pub fn log_probability(&self) -> f64 {
        self.evaluation.score - self.eval_log_norm
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Derivation {
    result: Expr,
    triples: Vec<InferenceTriple>,
    viterbi: f64,
    log_inside: f64,
    max_triples: Vec<usize>,
    excluded_from_norm: bool,
}

impl Derivation {
    /// The resolved structure, overlays stripped.
    pub fn result(&self) -> &Expr {
        &self.result
    }

    pub fn triples(&self) -> &[InferenceTriple] {
        &self.triples
    }

    /// Best base score plus evaluation score over all triples.
    pub fn score(&self) -> f64 {
        self.viterbi
    }

    pub fn log_inside_score(&self) -> f64 {
        self.log_inside
    }

    /// Triples reaching the viterbi score, ties included.
    pub fn max_triples(&self) -> impl Iterator<Item = &InferenceTriple> {
        self.max_triples.iter().map(|&i| &self.triples[i])
    }

    /// Reconstructed on demand; not part of [`crate::ParseOutput::log_norm`].
    pub fn is_excluded_from_norm(&self) -> bool {
        self.excluded_from_norm
    }
}

/// Collects triples for one result before scoring them.
#[derive(Debug, Clone)]
pub struct DerivationBuilder {
    result: Expr,
    triples: Vec<InferenceTriple>,
}

impl DerivationBuilder {
    pub fn new(result: Expr) -> Self {
        Self {
            result,
            triples: Vec::new(),
        }
    }

    pub fn push(&mut self, triple: InferenceTriple) {
        self.triples.push(triple);
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Score the triples against their base derivations.
    pub fn finish<D: BaseDerivation>(self, bases: &[D], excluded_from_norm: bool) -> Derivation {
        let totals: Vec<f64> = self
            .triples
            .iter()
            .map(|t| bases[t.base].score() + t.evaluation.score)
            .collect();
        let viterbi = totals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let max_triples = totals
            .iter()
            .enumerate()
            .filter(|(_, total)| **total == viterbi)
            .map(|(i, _)| i)
            .collect();
        let log_inside = log_sum_exp(
            self.triples
                .iter()
                .map(|t| t.log_probability() + bases[t.base].log_inside_score()),
        );
        Derivation {
            result: self.result,
            triples: self.triples,
            viterbi,
            log_inside,
            max_triples,
            excluded_from_norm,
        }
    }
}
