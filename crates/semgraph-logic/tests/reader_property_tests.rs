//! Property tests for the expression reader and printer.
//!
//! 1. Printing then reading returns a structurally equal expression
//! 2. Canonicalization is idempotent
//! 3. Stripping overlays is idempotent and removes every overlay

use proptest::prelude::*;
use semgraph_logic::{canonicalize, Expr, LogicContext, Overlay, SkolemId, Type, Variable};

// ============================================================================
// Strategies
// ============================================================================

#[derive(Debug, Clone)]
enum Shape {
    Constant(String, Option<String>),
    Skolem(u32),
    Entity(u32, Vec<(String, Shape)>),
}

fn name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,6}(-0[1-9])?".prop_map(|s| s)
}

fn shape_strategy() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        (name_strategy(), proptest::option::of("[a-z]{1,5}"))
            .prop_map(|(name, surface)| Shape::Constant(name, surface)),
        (0u32..5).prop_map(Shape::Skolem),
    ];
    leaf.prop_recursive(3, 16, 3, |inner| {
        (0u32..5, prop::collection::vec((name_strategy(), inner), 0..3))
            .prop_map(|(id, relations)| Shape::Entity(id, relations))
    })
}

fn build(ctx: &LogicContext, shape: &Shape, next_var: &mut u32) -> Expr {
    match shape {
        Shape::Constant(name, surface) => {
            let constant = ctx.constant(name, Type::entity());
            match surface {
                Some(surface) => Expr::constant(constant.with_overlay(Overlay::new(surface, None))),
                None => Expr::constant(constant),
            }
        }
        Shape::Skolem(id) => Expr::skolem_id(SkolemId(*id)),
        Shape::Entity(id, relations) => {
            let variable = Variable::new(*next_var, Type::entity());
            *next_var += 1;
            let x = Expr::variable(variable.clone());
            let typing = Expr::literal(
                Expr::constant(ctx.constant("thing", Type::function(Type::entity(), Type::truth()))),
                vec![x.clone()],
            );
            let mut conjuncts = vec![typing];
            for (relation, target) in relations {
                let rel = ctx.constant(
                    relation,
                    Type::function(Type::entity(), Type::function(Type::entity(), Type::truth())),
                );
                conjuncts.push(Expr::literal(
                    Expr::constant(rel),
                    vec![x.clone(), build(ctx, target, next_var)],
                ));
            }
            let body = Expr::literal(Expr::constant(ctx.conjunction().clone()), conjuncts);
            Expr::literal(
                Expr::constant(ctx.skolem_predicate().clone()),
                vec![Expr::skolem_id(SkolemId(*id)), Expr::lambda(variable, body)],
            )
        }
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn print_then_read_is_identity(shape in shape_strategy()) {
        let ctx = LogicContext::new();
        let expr = build(&ctx, &shape, &mut 0);
        let text = expr.to_string();
        let read = ctx.read(&text).unwrap();
        prop_assert_eq!(read, expr);
    }

    #[test]
    fn canonicalize_is_idempotent(shape in shape_strategy()) {
        let ctx = LogicContext::new();
        let expr = build(&ctx, &shape, &mut 3);
        let once = canonicalize(&ctx, &expr);
        let twice = canonicalize(&ctx, &once);
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn strip_overlays_removes_all(shape in shape_strategy()) {
        let ctx = LogicContext::new();
        let stripped = build(&ctx, &shape, &mut 0).strip_overlays();
        let mut overlays = 0;
        stripped.walk(&mut |e| {
            if e.as_constant().is_some_and(|c| c.overlay().is_some()) {
                overlays += 1;
            }
        });
        prop_assert_eq!(overlays, 0);
        prop_assert_eq!(stripped.strip_overlays(), stripped);
    }
}
