//! Seams to the first-stage parser and caller-supplied hooks.

use semgraph_factor::{log_sum_exp, FeatureVector};
use semgraph_logic::{Expr, LogicContext};

// ============================================================================
// First-stage output
// ============================================================================

/// One derivation of the first-stage parse.
pub trait BaseDerivation: Send + Sync {
    /// The semantic structure, when the derivation produced one.
    fn semantics(&self) -> Option<&Expr>;

    fn is_complete(&self) -> bool;

    /// Viterbi score.
    fn score(&self) -> f64;

    fn log_inside_score(&self) -> f64;
}

/// The packed first-stage output the second stage runs over.
pub trait BaseParseOutput: Send + Sync {
    type Derivation: BaseDerivation;

    fn derivations(&self) -> &[Self::Derivation];

    /// Whether the first stage pruned anything.
    fn is_exact(&self) -> bool;

    /// Log expected first-stage features, with each derivation weighted by
    /// its log outside score. `outside(i)` is `None` for derivations that
    /// carry no mass.
    fn log_expected_features(&self, _outside: &dyn Fn(usize) -> Option<f64>) -> FeatureVector {
        FeatureVector::new()
    }
}

/// A plain in-memory derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleDerivation {
    semantics: Option<Expr>,
    complete: bool,
    score: f64,
    log_inside: f64,
    features: FeatureVector,
}

impl SimpleDerivation {
    /// A complete derivation whose inside score equals its viterbi score.
    pub fn complete(semantics: Expr, score: f64) -> Self {
        Self {
            semantics: Some(semantics),
            complete: true,
            score,
            log_inside: score,
            features: FeatureVector::new(),
        }
    }

    pub fn incomplete(semantics: Option<Expr>, score: f64) -> Self {
        Self {
            semantics,
            complete: false,
            score,
            log_inside: score,
            features: FeatureVector::new(),
        }
    }

    pub fn with_inside(mut self, log_inside: f64) -> Self {
        self.log_inside = log_inside;
        self
    }

    pub fn with_features(mut self, features: FeatureVector) -> Self {
        self.features = features;
        self
    }

    pub fn features(&self) -> &FeatureVector {
        &self.features
    }
}

impl BaseDerivation for SimpleDerivation {
    fn semantics(&self) -> Option<&Expr> {
        self.semantics.as_ref()
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn score(&self) -> f64 {
        self.score
    }

    fn log_inside_score(&self) -> f64 {
        self.log_inside
    }
}

/// A flat list of [`SimpleDerivation`]s.
#[derive(Debug, Clone, Default)]
pub struct DerivationList {
    derivations: Vec<SimpleDerivation>,
    exact: bool,
}

impl DerivationList {
    pub fn new(derivations: Vec<SimpleDerivation>) -> Self {
        Self {
            derivations,
            exact: true,
        }
    }

    pub fn with_exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    pub fn log_norm(&self) -> f64 {
        log_sum_exp(self.derivations.iter().map(|d| d.log_inside))
    }
}

impl BaseParseOutput for DerivationList {
    type Derivation = SimpleDerivation;

    fn derivations(&self) -> &[SimpleDerivation] {
        &self.derivations
    }

    fn is_exact(&self) -> bool {
        self.exact
    }

    fn log_expected_features(&self, outside: &dyn Fn(usize) -> Option<f64>) -> FeatureVector {
        let mut expected = FeatureVector::new();
        for (index, derivation) in self.derivations.iter().enumerate() {
            if let Some(weight) = outside(index) {
                expected.add_log_scaled(&derivation.features, weight + derivation.log_inside);
            }
        }
        expected
    }
}

// ============================================================================
// Hooks
// ============================================================================

/// Caller-supplied validity checks on semantic structures.
pub trait ResultFilter: Send + Sync {
    /// Checked on the base structure before a graph is built.
    fn test_step(&self, _expr: &Expr) -> bool {
        true
    }

    /// Checked on every resolved result.
    fn test_result(&self, _expr: &Expr) -> bool {
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl ResultFilter for AcceptAll {}

/// Best-effort structural repair of an incomplete derivation.
pub trait ClosureRepair: Send + Sync {
    fn repair(&self, ctx: &LogicContext, derivation: &dyn BaseDerivation) -> Option<Expr>;
}
