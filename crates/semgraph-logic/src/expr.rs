//! Expression trees.
//!
//! Expressions are immutable and reference counted; rewriting returns new
//! trees and shares every untouched subtree with the input.

use crate::types::Type;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Leaves
// ============================================================================

/// Interned `(name, type)` pair backing every [`Constant`].
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    name: Arc<str>,
    ty: Type,
}

impl Symbol {
    pub(crate) fn new(name: &str, ty: Type) -> Self {
        Self {
            name: Arc::from(name),
            ty,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }
}

/// Per-word information attached to a constant by the lexicon: the surface
/// form it was read off and, optionally, its syntactic directionality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Overlay {
    surface: Arc<str>,
    directionality: Option<Arc<str>>,
}

impl Overlay {
    pub fn new(surface: &str, directionality: Option<&str>) -> Self {
        Self {
            surface: Arc::from(surface),
            directionality: directionality.map(Arc::from),
        }
    }

    pub fn surface(&self) -> &str {
        &self.surface
    }

    pub fn directionality(&self) -> Option<&str> {
        self.directionality.as_deref()
    }
}

/// A logical constant. Construct through [`crate::LogicContext::constant`]
/// so that equal `(name, type)` pairs share one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constant {
    symbol: Arc<Symbol>,
    overlay: Option<Arc<Overlay>>,
}

impl Constant {
    pub(crate) fn from_symbol(symbol: Arc<Symbol>) -> Self {
        Self {
            symbol,
            overlay: None,
        }
    }

    pub fn name(&self) -> &str {
        self.symbol.name()
    }

    pub fn ty(&self) -> &Type {
        self.symbol.ty()
    }

    pub fn symbol(&self) -> &Arc<Symbol> {
        &self.symbol
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_deref()
    }

    pub fn with_overlay(&self, overlay: Overlay) -> Constant {
        Constant {
            symbol: self.symbol.clone(),
            overlay: Some(Arc::new(overlay)),
        }
    }

    pub fn stripped(&self) -> Constant {
        Constant {
            symbol: self.symbol.clone(),
            overlay: None,
        }
    }

    /// Same name and type, ignoring any overlay.
    pub fn same_symbol(&self, other: &Constant) -> bool {
        Arc::ptr_eq(&self.symbol, &other.symbol) || self.symbol == other.symbol
    }
}

/// A variable bound by a lambda.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    id: u32,
    ty: Type,
}

impl Variable {
    pub fn new(id: u32, ty: Type) -> Self {
        Self { id, ty }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }
}

/// An entity identifier slot (`!n`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SkolemId(pub u32);

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, PartialEq, Eq, Hash)]
pub enum ExprKind {
    /// Application of a predicate to an ordered argument list.
    Literal { predicate: Expr, args: Vec<Expr> },
    /// Binder: bound variable plus body.
    Lambda { arg: Variable, body: Expr },
    Constant(Constant),
    Variable(Variable),
    SkolemId(SkolemId),
}

/// A shared, immutable expression tree. Equality is structural.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Expr(Arc<ExprKind>);

impl Expr {
    pub fn literal(predicate: Expr, args: Vec<Expr>) -> Self {
        Expr(Arc::new(ExprKind::Literal { predicate, args }))
    }

    pub fn lambda(arg: Variable, body: Expr) -> Self {
        Expr(Arc::new(ExprKind::Lambda { arg, body }))
    }

    pub fn constant(constant: Constant) -> Self {
        Expr(Arc::new(ExprKind::Constant(constant)))
    }

    pub fn variable(variable: Variable) -> Self {
        Expr(Arc::new(ExprKind::Variable(variable)))
    }

    pub fn skolem_id(id: SkolemId) -> Self {
        Expr(Arc::new(ExprKind::SkolemId(id)))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0
    }

    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self.kind() {
            ExprKind::Constant(constant) => Some(constant),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self.kind() {
            ExprKind::Variable(variable) => Some(variable),
            _ => None,
        }
    }

    pub fn as_skolem_id(&self) -> Option<SkolemId> {
        match self.kind() {
            ExprKind::SkolemId(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<(&Expr, &[Expr])> {
        match self.kind() {
            ExprKind::Literal { predicate, args } => Some((predicate, args.as_slice())),
            _ => None,
        }
    }

    pub fn as_lambda(&self) -> Option<(&Variable, &Expr)> {
        match self.kind() {
            ExprKind::Lambda { arg, body } => Some((arg, body)),
            _ => None,
        }
    }

    /// Type of the expression, `None` when an application is ill-typed.
    pub fn ty(&self) -> Option<Type> {
        match self.kind() {
            ExprKind::Literal { predicate, args } => predicate.ty()?.apply(args.len()),
            ExprKind::Lambda { arg, body } => Some(Type::function(arg.ty().clone(), body.ty()?)),
            ExprKind::Constant(constant) => Some(constant.ty().clone()),
            ExprKind::Variable(variable) => Some(variable.ty().clone()),
            ExprKind::SkolemId(_) => Some(Type::id()),
        }
    }

    /// Short name used when composing feature keys.
    pub fn head_name(&self) -> String {
        match self.kind() {
            ExprKind::Literal { predicate, .. } => predicate.head_name(),
            ExprKind::Lambda { body, .. } => body.head_name(),
            ExprKind::Constant(constant) => constant.name().to_string(),
            ExprKind::Variable(_) => "var".to_string(),
            ExprKind::SkolemId(_) => "id".to_string(),
        }
    }

    /// Visit every subexpression in pre-order.
    pub fn walk<F>(&self, visit: &mut F)
    where
        F: FnMut(&Expr),
    {
        visit(self);
        match self.kind() {
            ExprKind::Literal { predicate, args } => {
                predicate.walk(visit);
                for arg in args {
                    arg.walk(visit);
                }
            }
            ExprKind::Lambda { body, .. } => body.walk(visit),
            _ => {}
        }
    }

    /// Rebuild this node with every direct child passed through `f`.
    /// Returns `self` unchanged (shared) when no child changed.
    pub fn map_children<F>(&self, mut f: F) -> Expr
    where
        F: FnMut(&Expr) -> Expr,
    {
        match self.kind() {
            ExprKind::Literal { predicate, args } => {
                let new_predicate = f(predicate);
                let new_args: Vec<Expr> = args.iter().map(&mut f).collect();
                let unchanged = new_predicate.ptr_eq(predicate)
                    && new_args.iter().zip(args).all(|(new, old)| new.ptr_eq(old));
                if unchanged {
                    self.clone()
                } else {
                    Expr::literal(new_predicate, new_args)
                }
            }
            ExprKind::Lambda { arg, body } => {
                let new_body = f(body);
                if new_body.ptr_eq(body) {
                    self.clone()
                } else {
                    Expr::lambda(arg.clone(), new_body)
                }
            }
            _ => self.clone(),
        }
    }

    /// Top-down rewrite: wherever `f` returns a replacement it is used as is,
    /// otherwise the children are rewritten.
    pub fn rewrite<F>(&self, f: &mut F) -> Expr
    where
        F: FnMut(&Expr) -> Option<Expr>,
    {
        if let Some(replacement) = f(self) {
            return replacement;
        }
        self.map_children(|child| child.rewrite(f))
    }

    /// The same expression with every constant overlay removed.
    pub fn strip_overlays(&self) -> Expr {
        self.rewrite(&mut |expr| match expr.as_constant() {
            Some(constant) if constant.overlay().is_some() => {
                Some(Expr::constant(constant.stripped()))
            }
            _ => None,
        })
    }

    /// Distinct identifier slots in order of first occurrence.
    pub fn skolem_ids(&self) -> Vec<SkolemId> {
        let mut ids = Vec::new();
        self.walk(&mut |expr| {
            if let Some(id) = expr.as_skolem_id() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        });
        ids
    }

    pub fn size(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Literal { predicate, args } => {
                write!(f, "({predicate}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                write!(f, ")")
            }
            ExprKind::Lambda { arg, body } => {
                write!(f, "(lambda ${}:{} {body})", arg.id(), arg.ty())
            }
            ExprKind::Constant(constant) => {
                write!(f, "{}:{}", constant.name(), constant.ty())?;
                if let Some(overlay) = constant.overlay() {
                    match overlay.directionality() {
                        Some(dir) => write!(f, "[{}|{}]", overlay.surface(), dir)?,
                        None => write!(f, "[{}]", overlay.surface())?,
                    }
                }
                Ok(())
            }
            ExprKind::Variable(variable) => write!(f, "${}", variable.id()),
            ExprKind::SkolemId(id) => write!(f, "!{}", id.0),
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
