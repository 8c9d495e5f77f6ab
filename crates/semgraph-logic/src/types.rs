//! Simple types for the lambda calculus.
//!
//! Types are written the way the reader accepts them:
//! - primitives: `e`, `t`, `id`, `txt`, ...
//! - arrays: `t*` (a predicate over an array domain accepts any number of
//!   arguments of the element type)
//! - functions: `<e,t>`, `<e,<e,t>>`, `<t*,t>`

use std::fmt;
use std::sync::Arc;

/// A simple type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    Primitive(Arc<str>),
    Array(Arc<Type>),
    Function(Arc<Type>, Arc<Type>),
}

impl Type {
    pub fn primitive(name: &str) -> Self {
        Type::Primitive(Arc::from(name))
    }

    /// Entity type `e`.
    pub fn entity() -> Self {
        Self::primitive("e")
    }

    /// Truth type `t`.
    pub fn truth() -> Self {
        Self::primitive("t")
    }

    /// Identifier type `id`.
    pub fn id() -> Self {
        Self::primitive("id")
    }

    pub fn array(element: Type) -> Self {
        Type::Array(Arc::new(element))
    }

    pub fn function(domain: Type, range: Type) -> Self {
        Type::Function(Arc::new(domain), Arc::new(range))
    }

    pub fn is_truth(&self) -> bool {
        matches!(self, Type::Primitive(name) if &**name == "t")
    }

    pub fn is_entity(&self) -> bool {
        matches!(self, Type::Primitive(name) if &**name == "e")
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function(..))
    }

    pub fn domain(&self) -> Option<&Type> {
        match self {
            Type::Function(domain, _) => Some(domain),
            _ => None,
        }
    }

    pub fn range(&self) -> Option<&Type> {
        match self {
            Type::Function(_, range) => Some(range),
            _ => None,
        }
    }

    /// The type obtained by applying a value of this type to `arity` arguments.
    ///
    /// An array domain absorbs all remaining arguments in one step, so
    /// `<t*,t>` applied to any positive number of arguments is `t`.
    pub fn apply(&self, arity: usize) -> Option<Type> {
        let mut current = self.clone();
        let mut remaining = arity;
        while remaining > 0 {
            let (domain, range) = match &current {
                Type::Function(domain, range) => (domain.clone(), range.clone()),
                _ => return None,
            };
            remaining = match &*domain {
                Type::Array(_) => 0,
                _ => remaining - 1,
            };
            current = (*range).clone();
        }
        Some(current)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(name) => write!(f, "{name}"),
            Type::Array(element) => write!(f, "{element}*"),
            Type::Function(domain, range) => write!(f, "<{domain},{range}>"),
        }
    }
}
