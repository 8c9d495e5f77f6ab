//! End-to-end tests of the second stage over small hand-built base outputs.

use approx::assert_relative_eq;
use semgraph_factor::{
    log_sum_exp, CandidateTable, InferenceMethod, LinearModel, SideInfo,
};
use semgraph_logic::{Expr, LogicContext};
use semgraph_parser::{
    AcceptAll, BaseDerivation, ClosureRepair, DerivationList, GraphParser, InferenceConfig,
    ParseError, ResultFilter, SimpleDerivation,
};
use std::sync::Arc;

// ============================================================================
// Fixtures
// ============================================================================

const BOY: &str = "(a:<id,<<e,t>,e>> na:id (lambda $0:e (boy:<e,t> $0)))";
const LAD: &str = "(a:<id,<<e,t>,e>> na:id (lambda $0:e (boy:<e,t>[lad] $0)))";

fn resolved(ctx: &LogicContext, sense: &str) -> Expr {
    ctx.read(&format!("(a:<id,<<e,t>,e>> !0 (lambda $0:e ({sense}:<e,t> $0)))"))
        .unwrap()
}

fn parser(ctx: &Arc<LogicContext>, config: InferenceConfig) -> GraphParser {
    let mut candidates = CandidateTable::new();
    candidates.insert(
        ctx.read("boy:<e,t>").unwrap(),
        vec![ctx.read("boy-01:<e,t>").unwrap(), ctx.read("boy-02:<e,t>").unwrap()],
    );
    GraphParser::new(ctx.clone(), config, Arc::new(candidates))
}

fn model() -> LinearModel {
    LinearModel::default()
        .with_weight("UNARY#boy#boy-01", 1.0)
        .with_weight("FACLEX#lad#boy-02", 2.0)
}

struct OnlySense(&'static str);

impl ResultFilter for OnlySense {
    fn test_result(&self, expr: &Expr) -> bool {
        expr.to_string().contains(self.0)
    }
}

struct ReadBack(Arc<LogicContext>);

impl ClosureRepair for ReadBack {
    fn repair(&self, _ctx: &LogicContext, _derivation: &dyn BaseDerivation) -> Option<Expr> {
        self.0.read(BOY).ok()
    }
}

// ============================================================================
// Aggregation
// ============================================================================

#[test]
fn test_two_bases_share_one_result() {
    let ctx = Arc::new(LogicContext::new());
    let base = DerivationList::new(vec![
        SimpleDerivation::complete(ctx.read(BOY).unwrap(), -1.0),
        SimpleDerivation::complete(ctx.read(LAD).unwrap(), -2.5),
    ]);
    let output = parser(&ctx, InferenceConfig::default())
        .parse(&base, &SideInfo::default(), &model(), &AcceptAll)
        .unwrap();

    assert!(output.is_exact());
    assert_eq!(output.graphs().len(), 2);
    assert_eq!(output.derivations().len(), 2);

    let found = output.derivations_for(&resolved(&ctx, "boy-01")).unwrap();
    assert_eq!(found.len(), 1);
    let derivation = &found[0];
    assert_eq!(derivation.triples().len(), 2);
    assert!(!derivation.is_excluded_from_norm());

    // Base 1 ranks boy-01 (1.0) against boy-02 (0.0); base 2 against 2.0.
    let p1 = 1.0 - log_sum_exp([1.0, 0.0]);
    let p2 = 1.0 - log_sum_exp([1.0, 2.0]);
    assert_relative_eq!(
        derivation.log_inside_score(),
        log_sum_exp([p1 - 1.0, p2 - 2.5]),
        epsilon = 1e-9
    );
    // Best route: base 1 (-1.0) with eval score 1.0.
    assert_relative_eq!(derivation.score(), 0.0, epsilon = 1e-12);
}

#[test]
fn test_inside_scores_sum_to_log_norm() {
    let ctx = Arc::new(LogicContext::new());
    let base = DerivationList::new(vec![
        SimpleDerivation::complete(ctx.read(BOY).unwrap(), -1.0),
        SimpleDerivation::complete(ctx.read(LAD).unwrap(), -2.5),
    ]);
    let output = parser(&ctx, InferenceConfig::default())
        .parse(&base, &SideInfo::default(), &model(), &AcceptAll)
        .unwrap();

    let total = log_sum_exp(output.derivations().iter().map(|d| d.log_inside_score()));
    assert_relative_eq!(total, output.log_norm(), epsilon = 1e-6);
    assert_relative_eq!(output.log_norm(), log_sum_exp([-1.0, -2.5]), epsilon = 1e-9);
    assert!(output.verify_norm());

    let best = output.max_derivations();
    assert_eq!(best.len(), 1);
    assert_eq!(best[0].result(), &resolved(&ctx, "boy-01"));
}

#[test]
fn test_expected_features_weight_results_by_probability() {
    let ctx = Arc::new(LogicContext::new());
    let base = DerivationList::new(vec![SimpleDerivation::complete(ctx.read(BOY).unwrap(), 0.0)]);
    let output = parser(&ctx, InferenceConfig::default())
        .parse(&base, &SideInfo::default(), &model(), &AcceptAll)
        .unwrap();

    let expected = output.log_expected_features();
    assert_relative_eq!(
        expected.get("UNARY#boy#boy-01"),
        1.0 - log_sum_exp([1.0, 0.0]),
        epsilon = 1e-9
    );
    assert_relative_eq!(
        expected.get("UNARY#boy#boy-02"),
        0.0 - log_sum_exp([1.0, 0.0]),
        epsilon = 1e-9
    );

    let only = output
        .log_expected_features_for(&resolved(&ctx, "boy-02"))
        .unwrap();
    assert!(only.get_opt("UNARY#boy#boy-01").is_none());
    assert!(only.get_opt("UNARY#boy#boy-02").is_some());
}

// ============================================================================
// On-demand reconstruction
// ============================================================================

#[test]
fn test_pruned_result_is_reconstructed_and_excluded() {
    let ctx = Arc::new(LogicContext::new());
    let base = DerivationList::new(vec![SimpleDerivation::complete(ctx.read(BOY).unwrap(), 0.0)]);
    let config = InferenceConfig {
        beam_size: 1,
        ..InferenceConfig::default()
    };
    let output = parser(&ctx, config)
        .parse(&base, &SideInfo::default(), &model(), &AcceptAll)
        .unwrap();
    assert!(!output.is_exact());
    assert_eq!(output.derivations().len(), 1);

    let found = output.derivations_for(&resolved(&ctx, "boy-02")).unwrap();
    assert_eq!(found.len(), 1);
    assert!(found[0].is_excluded_from_norm());
    let triple = &found[0].triples()[0];
    assert_relative_eq!(triple.evaluation.score, 0.0);
    // Normalizer borrowed from the stored result of the same base.
    assert_relative_eq!(triple.eval_log_norm, 1.0);

    // Memoized: the second call returns the same derivation.
    assert_eq!(output.derivations_for(&resolved(&ctx, "boy-02")).unwrap(), found);
    assert_relative_eq!(
        output.log_norm_for(&resolved(&ctx, "boy-02")).unwrap(),
        found[0].log_inside_score()
    );
}

#[test]
fn test_lookup_ignores_variable_and_id_numbering() {
    let ctx = Arc::new(LogicContext::new());
    let base = DerivationList::new(vec![SimpleDerivation::complete(ctx.read(BOY).unwrap(), 0.0)]);
    let config = InferenceConfig {
        beam_size: 1,
        ..InferenceConfig::default()
    };
    let output = parser(&ctx, config)
        .parse(&base, &SideInfo::default(), &model(), &AcceptAll)
        .unwrap();

    let renamed = |sense: &str| {
        ctx.read(&format!("(a:<id,<<e,t>,e>> !3 (lambda $7:e ({sense}:<e,t> $7)))"))
            .unwrap()
    };

    let stored = output.derivations_for(&renamed("boy-01")).unwrap();
    assert_eq!(stored.len(), 1);
    assert!(!stored[0].is_excluded_from_norm());
    assert_eq!(stored[0].result(), &resolved(&ctx, "boy-01"));

    let rebuilt = output.derivations_for(&renamed("boy-02")).unwrap();
    assert_eq!(rebuilt.len(), 1);
    assert!(rebuilt[0].is_excluded_from_norm());
    assert_eq!(output.derivations_for(&resolved(&ctx, "boy-02")).unwrap(), rebuilt);
}

#[test]
fn test_unreachable_expression_has_no_derivations() {
    let ctx = Arc::new(LogicContext::new());
    let base = DerivationList::new(vec![SimpleDerivation::complete(ctx.read(BOY).unwrap(), 0.0)]);
    let output = parser(&ctx, InferenceConfig::default())
        .parse(&base, &SideInfo::default(), &model(), &AcceptAll)
        .unwrap();
    assert!(output
        .derivations_for(&resolved(&ctx, "boy-03"))
        .unwrap()
        .is_empty());
    assert_eq!(
        output.log_norm_for(&resolved(&ctx, "boy-03")).unwrap(),
        f64::NEG_INFINITY
    );
}

// ============================================================================
// Methods
// ============================================================================

#[test]
fn test_none_method_passes_structure_through() {
    let ctx = Arc::new(LogicContext::new());
    let base = DerivationList::new(vec![SimpleDerivation::complete(ctx.read(BOY).unwrap(), 0.0)]);
    let config = InferenceConfig::default().with_method(InferenceMethod::None);
    let output = parser(&ctx, config)
        .parse(&base, &SideInfo::default(), &model(), &AcceptAll)
        .unwrap();
    assert_eq!(output.derivations().len(), 1);
    assert_eq!(output.derivations()[0].result(), &resolved(&ctx, "boy"));
    assert_eq!(output.derivations()[0].triples()[0].evaluation.score, 0.0);
    assert!(output
        .derivations_for(&resolved(&ctx, "boy-01"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_lbp_rejects_filtered_queries() {
    let ctx = Arc::new(LogicContext::new());
    let base = DerivationList::new(vec![SimpleDerivation::complete(ctx.read(BOY).unwrap(), 0.0)]);
    let config = InferenceConfig::default().with_method(InferenceMethod::Lbp);
    let output = parser(&ctx, config)
        .parse(&base, &SideInfo::default(), &model(), &AcceptAll)
        .unwrap();

    assert!(output.is_exact());
    assert_eq!(output.max_derivations()[0].result(), &resolved(&ctx, "boy-01"));
    for factor in output.graphs()[0].graph().factors() {
        assert_relative_eq!(factor.table().belief_mass().unwrap(), 1.0, epsilon = 1e-5);
    }
    assert!(matches!(
        output.derivations_where(&AcceptAll),
        Err(ParseError::Unsupported { operation: "derivations_where", method: InferenceMethod::Lbp })
    ));
    assert!(matches!(
        output.log_norm_where(&AcceptAll),
        Err(ParseError::Unsupported { .. })
    ));
    assert!(matches!(
        output.log_expected_features_where(&AcceptAll),
        Err(ParseError::Unsupported { .. })
    ));
    assert!(matches!(
        output.max_derivations_where(&AcceptAll),
        Err(ParseError::Unsupported { .. })
    ));

    // Belief-weighted expectation of the unary feature is P(boy-01).
    let expected = output.log_expected_features();
    assert_relative_eq!(
        expected.get("UNARY#boy#boy-01"),
        1.0 - log_sum_exp([1.0, 0.0]),
        epsilon = 1e-6
    );
}

// ============================================================================
// Filters and repair
// ============================================================================

#[test]
fn test_result_filter_drops_results() {
    let ctx = Arc::new(LogicContext::new());
    let base = DerivationList::new(vec![SimpleDerivation::complete(ctx.read(BOY).unwrap(), 0.0)]);
    let output = parser(&ctx, InferenceConfig::default())
        .parse(&base, &SideInfo::default(), &model(), &OnlySense("boy-02"))
        .unwrap();
    assert_eq!(output.derivations().len(), 1);
    let triple = &output.derivations()[0].triples()[0];
    assert_relative_eq!(triple.log_probability(), 0.0, epsilon = 1e-12);

    let kept = output.derivations_where(&OnlySense("boy-01")).unwrap();
    assert!(kept.is_empty());
}

#[test]
fn test_incomplete_derivations_need_sloppy_repair() {
    let ctx = Arc::new(LogicContext::new());
    let base = DerivationList::new(vec![SimpleDerivation::incomplete(None, 0.0)]);

    let strict = parser(&ctx, InferenceConfig::default())
        .with_closure(Arc::new(ReadBack(ctx.clone())))
        .parse(&base, &SideInfo::default(), &model(), &AcceptAll)
        .unwrap();
    assert!(strict.graphs().is_empty());
    assert_eq!(strict.log_norm(), f64::NEG_INFINITY);

    let config = InferenceConfig {
        sloppy: true,
        ..InferenceConfig::default()
    };
    let sloppy = parser(&ctx, config)
        .with_closure(Arc::new(ReadBack(ctx.clone())))
        .parse(&base, &SideInfo::default(), &model(), &AcceptAll)
        .unwrap();
    assert_eq!(sloppy.graphs().len(), 1);
    let graph = sloppy.graphs()[0].graph();
    assert!(graph.is_closure());
    assert!(graph.factors().iter().any(|f| f.label() == "CLOSURE"));
}
