//! Passes applied to a candidate expression before graph construction.

use crate::context::LogicContext;
use crate::expr::{Expr, ExprKind, SkolemId, Variable};
use std::collections::HashMap;

/// Replace the identifier placeholder of every entity term with a fresh
/// identifier. Fresh identifiers are handed out in pre-order and continue
/// after the largest identifier already present.
pub fn assign_ids(ctx: &LogicContext, expr: &Expr) -> Expr {
    let mut next = expr
        .skolem_ids()
        .iter()
        .map(|id| id.0 + 1)
        .max()
        .unwrap_or(0);
    assign(ctx, expr, &mut next)
}

fn assign(ctx: &LogicContext, expr: &Expr, next: &mut u32) -> Expr {
    let needs_id = ctx
        .entity_term(expr)
        .is_some_and(|term| ctx.is_id_placeholder(term.id));
    match expr.kind() {
        ExprKind::Literal { predicate, args } if needs_id => {
            let id = Expr::skolem_id(SkolemId(*next));
            *next += 1;
            let mut new_args = Vec::with_capacity(args.len());
            new_args.push(id);
            for arg in &args[1..] {
                new_args.push(assign(ctx, arg, next));
            }
            Expr::literal(predicate.clone(), new_args)
        }
        _ => expr.map_children(|child| assign(ctx, child, next)),
    }
}

/// Replace every repeated named entity with a reference to its first
/// occurrence. Two named entities repeat each other when they are equal up
/// to identifiers, bound-variable names and overlays.
pub fn merge_named_entities(ctx: &LogicContext, expr: &Expr) -> Expr {
    let mut seen: Vec<(Expr, SkolemId)> = Vec::new();
    merge(ctx, expr, &mut seen)
}

fn merge(ctx: &LogicContext, expr: &Expr, seen: &mut Vec<(Expr, SkolemId)>) -> Expr {
    if ctx.is_named_entity(expr) {
        if let Some(id) = ctx.entity_term(expr).and_then(|term| term.id.as_skolem_id()) {
            let key = anonymize(ctx, expr);
            if let Some((_, first)) = seen.iter().find(|(existing, _)| *existing == key) {
                return ctx.reference_to(*first);
            }
            seen.push((key, id));
        }
    }
    expr.map_children(|child| merge(ctx, child, seen))
}

fn anonymize(ctx: &LogicContext, expr: &Expr) -> Expr {
    let placeholder = Expr::constant(ctx.id_placeholder().clone());
    let without_ids = expr.strip_overlays().rewrite(&mut |e| {
        e.as_skolem_id().map(|_| placeholder.clone())
    });
    renumber_variables(&without_ids)
}

/// Canonical form used to compare results across graphs: identifiers are
/// renumbered in order of definition (then first use), bound variables in
/// order of binding.
pub fn canonicalize(ctx: &LogicContext, expr: &Expr) -> Expr {
    renumber_variables(&renumber_ids(ctx, expr))
}

fn renumber_ids(ctx: &LogicContext, expr: &Expr) -> Expr {
    let mut order: Vec<SkolemId> = Vec::new();
    expr.walk(&mut |e| {
        if let Some(id) = ctx.entity_term(e).and_then(|term| term.id.as_skolem_id()) {
            if !order.contains(&id) {
                order.push(id);
            }
        }
    });
    for id in expr.skolem_ids() {
        if !order.contains(&id) {
            order.push(id);
        }
    }
    if order.iter().enumerate().all(|(i, id)| id.0 as usize == i) {
        return expr.clone();
    }

    let table: HashMap<SkolemId, SkolemId> = order
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, SkolemId(i as u32)))
        .collect();
    expr.rewrite(&mut |e| {
        e.as_skolem_id()
            .map(|id| Expr::skolem_id(table.get(&id).copied().unwrap_or(id)))
    })
}

fn renumber_variables(expr: &Expr) -> Expr {
    let mut scope: Vec<(u32, Variable)> = Vec::new();
    let mut next = 0;
    renumber(expr, &mut scope, &mut next)
}

fn renumber(expr: &Expr, scope: &mut Vec<(u32, Variable)>, next: &mut u32) -> Expr {
    match expr.kind() {
        ExprKind::Lambda { arg, body } => {
            let fresh = Variable::new(*next, arg.ty().clone());
            *next += 1;
            scope.push((arg.id(), fresh.clone()));
            let body = renumber(body, scope, next);
            scope.pop();
            Expr::lambda(fresh, body)
        }
        ExprKind::Variable(variable) => scope
            .iter()
            .rev()
            .find(|(old, _)| *old == variable.id())
            .map(|(_, fresh)| Expr::variable(fresh.clone()))
            .unwrap_or_else(|| expr.clone()),
        _ => expr.map_children(|child| renumber(child, scope, next)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOY_WANTS_GIRL: &str = "(a:<id,<<e,t>,e>> na:id (lambda $0:e (and:<t*,t> \
        (want-01:<e,t> $0) \
        (c_ARG0:<e,<e,t>> $0 (a:<id,<<e,t>,e>> na:id (lambda $1:e (boy:<e,t> $1)))) \
        (c_ARG1:<e,<e,t>> $0 (a:<id,<<e,t>,e>> na:id (lambda $2:e (girl:<e,t> $2)))))))";

    #[test]
    fn test_assign_ids_in_preorder() {
        let ctx = LogicContext::new();
        let expr = ctx.read(BOY_WANTS_GIRL).unwrap();
        let with_ids = assign_ids(&ctx, &expr);
        assert_eq!(
            with_ids.skolem_ids(),
            vec![SkolemId(0), SkolemId(1), SkolemId(2)]
        );
        assert!(with_ids.to_string().contains("(boy:<e,t> $1)"));
        let term = ctx.entity_term(&with_ids).unwrap();
        assert_eq!(term.id.as_skolem_id(), Some(SkolemId(0)));
    }

    #[test]
    fn test_assign_ids_continues_after_existing() {
        let ctx = LogicContext::new();
        let expr = ctx
            .read("(a:<id,<<e,t>,e>> na:id (lambda $0:e (c_ARG0:<e,<e,t>> $0 (ref:<id,e> !4))))")
            .unwrap();
        let with_ids = assign_ids(&ctx, &expr);
        let term = ctx.entity_term(&with_ids).unwrap();
        assert_eq!(term.id.as_skolem_id(), Some(SkolemId(5)));
    }

    #[test]
    fn test_merge_named_entities_replaces_repeats() {
        let ctx = LogicContext::new();
        let person = |id: u32, var: u32, name_id: u32, name_var: u32| {
            format!(
                "(a:<id,<<e,t>,e>> !{id} (lambda ${var}:e (and:<t*,t> (person:<e,t> ${var}) \
                 (c_name:<e,<e,t>> ${var} (a:<id,<<e,t>,e>> !{name_id} (lambda ${name_var}:e \
                 (and:<t*,t> (name:<e,t> ${name_var}) (c_op1:<e,<txt,t>> ${name_var} John:txt))))))))"
            )
        };
        let text = format!(
            "(a:<id,<<e,t>,e>> !0 (lambda $0:e (and:<t*,t> (say-01:<e,t> $0) \
             (c_ARG0:<e,<e,t>> $0 {}) (c_ARG1:<e,<e,t>> $0 {}))))",
            person(1, 1, 2, 2),
            person(3, 3, 4, 4)
        );
        let expr = ctx.read(&text).unwrap();
        let merged = merge_named_entities(&ctx, &expr);
        assert!(merged.to_string().contains("(ref:<id,e> !1)"));
        assert_eq!(
            merged.skolem_ids(),
            vec![SkolemId(0), SkolemId(1), SkolemId(2)]
        );
    }

    #[test]
    fn test_canonicalize_orders_by_definition() {
        let ctx = LogicContext::new();
        let a = ctx
            .read(
                "(a:<id,<<e,t>,e>> !7 (lambda $4:e (and:<t*,t> (see-01:<e,t> $4) \
                 (c_ARG0:<e,<e,t>> $4 (ref:<id,e> !3)) \
                 (c_ARG1:<e,<e,t>> $4 (a:<id,<<e,t>,e>> !3 (lambda $9:e (dog:<e,t> $9)))))))",
            )
            .unwrap();
        let canonical = canonicalize(&ctx, &a);
        assert_eq!(
            canonical.to_string(),
            "(a:<id,<<e,t>,e>> !0 (lambda $0:e (and:<t*,t> (see-01:<e,t> $0) \
             (c_ARG0:<e,<e,t>> $0 (ref:<id,e> !1)) \
             (c_ARG1:<e,<e,t>> $0 (a:<id,<<e,t>,e>> !1 (lambda $1:e (dog:<e,t> $1)))))))"
        );
        assert_eq!(canonicalize(&ctx, &canonical), canonical);
    }
}
