//! Explicit logic context: the constant interner plus the handful of
//! well-known constants the rest of the system pattern-matches on.

use crate::expr::{Constant, Expr, SkolemId, Symbol, Variable};
use crate::reader::{self, LogicError};
use crate::types::Type;
use dashmap::DashMap;
use std::sync::Arc;

// ============================================================================
// Interning
// ============================================================================

/// Concurrent interning table keyed by `(name, type)`.
///
/// Interned constants share one [`Symbol`], so equality checks between
/// constants read from different places short-circuit on pointer identity.
#[derive(Debug, Default)]
pub struct ConstantInterner {
    symbols: DashMap<(Arc<str>, Type), Arc<Symbol>>,
}

impl ConstantInterner {
    pub fn new() -> Self {
        Self {
            symbols: DashMap::new(),
        }
    }

    /// Intern a `(name, type)` pair, returning the shared symbol.
    pub fn intern(&self, name: &str, ty: &Type) -> Arc<Symbol> {
        self.symbols
            .entry((Arc::from(name), ty.clone()))
            .or_insert_with(|| Arc::new(Symbol::new(name, ty.clone())))
            .clone()
    }

    /// Look up an existing symbol without inserting.
    pub fn get(&self, name: &str, ty: &Type) -> Option<Arc<Symbol>> {
        self.symbols
            .get(&(Arc::from(name), ty.clone()))
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

// ============================================================================
// Context
// ============================================================================

/// Borrowed view of an entity-introduction term `(a:<id,<<e,t>,e>> ID (lambda $x:e BODY))`.
#[derive(Debug, Clone, Copy)]
pub struct EntityTerm<'a> {
    pub id: &'a Expr,
    pub variable: &'a Variable,
    pub body: &'a Expr,
}

/// Shared logic services passed to every entry point.
#[derive(Debug)]
pub struct LogicContext {
    interner: ConstantInterner,
    skolem_predicate: Constant,
    reference_predicate: Constant,
    id_placeholder: Constant,
    conjunction: Constant,
    name_relation: Arc<str>,
}

impl LogicContext {
    pub fn new() -> Self {
        let interner = ConstantInterner::new();
        let entity_predicate = Type::function(Type::entity(), Type::truth());
        let skolem_predicate = Constant::from_symbol(interner.intern(
            "a",
            &Type::function(
                Type::id(),
                Type::function(entity_predicate, Type::entity()),
            ),
        ));
        let reference_predicate = Constant::from_symbol(
            interner.intern("ref", &Type::function(Type::id(), Type::entity())),
        );
        let id_placeholder = Constant::from_symbol(interner.intern("na", &Type::id()));
        let conjunction = Constant::from_symbol(interner.intern(
            "and",
            &Type::function(Type::array(Type::truth()), Type::truth()),
        ));
        Self {
            interner,
            skolem_predicate,
            reference_predicate,
            id_placeholder,
            conjunction,
            name_relation: Arc::from("c_name"),
        }
    }

    pub fn interner(&self) -> &ConstantInterner {
        &self.interner
    }

    /// Interned constant for `(name, type)`.
    pub fn constant(&self, name: &str, ty: Type) -> Constant {
        Constant::from_symbol(self.interner.intern(name, &ty))
    }

    /// Read an expression in the textual notation (see [`crate::reader`]).
    pub fn read(&self, text: &str) -> Result<Expr, LogicError> {
        reader::read_expr(self, text)
    }

    pub fn skolem_predicate(&self) -> &Constant {
        &self.skolem_predicate
    }

    pub fn reference_predicate(&self) -> &Constant {
        &self.reference_predicate
    }

    pub fn id_placeholder(&self) -> &Constant {
        &self.id_placeholder
    }

    pub fn conjunction(&self) -> &Constant {
        &self.conjunction
    }

    pub fn name_relation(&self) -> &str {
        &self.name_relation
    }

    pub fn entity_term<'a>(&self, expr: &'a Expr) -> Option<EntityTerm<'a>> {
        let (predicate, args) = expr.as_literal()?;
        let constant = predicate.as_constant()?;
        if args.len() != 2 || !constant.same_symbol(&self.skolem_predicate) {
            return None;
        }
        let (variable, body) = args[1].as_lambda()?;
        Some(EntityTerm {
            id: &args[0],
            variable,
            body,
        })
    }

    /// The identifier argument of a reference literal `(ref:<id,e> ID)`.
    pub fn reference_target<'a>(&self, expr: &'a Expr) -> Option<&'a Expr> {
        let (predicate, args) = expr.as_literal()?;
        let constant = predicate.as_constant()?;
        if args.len() == 1 && constant.same_symbol(&self.reference_predicate) {
            Some(&args[0])
        } else {
            None
        }
    }

    pub fn reference_to(&self, id: SkolemId) -> Expr {
        Expr::literal(
            Expr::constant(self.reference_predicate.clone()),
            vec![Expr::skolem_id(id)],
        )
    }

    pub fn is_id_placeholder(&self, expr: &Expr) -> bool {
        expr.as_constant()
            .is_some_and(|constant| constant.same_symbol(&self.id_placeholder))
    }

    pub fn is_conjunction(&self, predicate: &Expr) -> bool {
        predicate
            .as_constant()
            .is_some_and(|constant| constant.same_symbol(&self.conjunction))
    }

    /// The conjuncts of an entity body; a non-conjunction body is its own
    /// single conjunct.
    pub fn conjuncts<'a>(&self, body: &'a Expr) -> Vec<&'a Expr> {
        match body.as_literal() {
            Some((predicate, args)) if self.is_conjunction(predicate) => args.iter().collect(),
            _ => vec![body],
        }
    }

    /// An entity whose body carries a name relation.
    pub fn is_named_entity(&self, expr: &Expr) -> bool {
        let Some(term) = self.entity_term(expr) else {
            return false;
        };
        self.conjuncts(term.body).into_iter().any(|conjunct| {
            conjunct.as_literal().is_some_and(|(predicate, args)| {
                args.len() == 2
                    && predicate
                        .as_constant()
                        .is_some_and(|c| c.name() == &*self.name_relation)
            })
        })
    }
}

impl Default for LogicContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interner_shares_symbols() {
        let ctx = LogicContext::new();
        let before = ctx.interner().len();
        let a = ctx.constant("boy", Type::function(Type::entity(), Type::truth()));
        let b = ctx.constant("boy", Type::function(Type::entity(), Type::truth()));
        assert!(Arc::ptr_eq(a.symbol(), b.symbol()));
        assert_eq!(ctx.interner().len(), before + 1);

        let other = ctx.constant("boy", Type::entity());
        assert_ne!(a, other);
    }

    #[test]
    fn test_entity_term_shape() {
        let ctx = LogicContext::new();
        let expr = ctx
            .read("(a:<id,<<e,t>,e>> !0 (lambda $0:e (boy:<e,t> $0)))")
            .unwrap();
        let term = ctx.entity_term(&expr).unwrap();
        assert_eq!(term.id.as_skolem_id(), Some(SkolemId(0)));
        assert_eq!(term.variable.id(), 0);
        assert_eq!(ctx.conjuncts(term.body).len(), 1);
        assert!(!ctx.is_named_entity(&expr));
    }

    #[test]
    fn test_named_entity_detection() {
        let ctx = LogicContext::new();
        let expr = ctx
            .read(
                "(a:<id,<<e,t>,e>> !0 (lambda $0:e (and:<t*,t> (person:<e,t> $0) \
                 (c_name:<e,<e,t>> $0 (a:<id,<<e,t>,e>> !1 (lambda $1:e (name:<e,t> $1)))))))",
            )
            .unwrap();
        assert!(ctx.is_named_entity(&expr));
    }
}
