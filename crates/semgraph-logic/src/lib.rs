//! semgraph-logic: typed lambda-calculus expressions for second-stage
//! disambiguation.
//!
//! ```text
//! ┌──────────────┐   read    ┌────────────┐  assign_ids / merge /  ┌───────────────┐
//! │ text notation│──────────►│    Expr    │───────────────────────►│ canonical Expr│
//! └──────────────┘           └────────────┘     canonicalize       └───────────────┘
//!                                  ▲
//!                    constants interned in LogicContext
//! ```
//!
//! Expressions are immutable trees shared through `Arc`. Every traversal is
//! a plain recursive function returning a new tree; nothing mutates shared
//! state while walking.
//!
//! The [`LogicContext`] replaces process-wide services: it owns the
//! concurrent constant interner and knows the well-known constants (entity
//! introduction `a`, reference `ref`, identifier placeholder `na`,
//! conjunction `and`). Create one per process, or one per test.

pub mod context;
pub mod expr;
pub mod preprocess;
pub mod reader;
pub mod types;

pub use context::{ConstantInterner, EntityTerm, LogicContext};
pub use expr::{Constant, Expr, ExprKind, Overlay, SkolemId, Symbol, Variable};
pub use preprocess::{assign_ids, canonicalize, merge_named_entities};
pub use reader::{read_expr, read_type, LogicError};
pub use types::Type;
