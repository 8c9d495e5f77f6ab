//! Candidate domains for decision points.

use ahash::AHashMap;
use semgraph_logic::{Expr, LogicContext, LogicError};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Supplies the candidate values of one decision point.
///
/// `node` is a subexpression of `root`. An empty result means the node is
/// not underspecified; the graph builder then gives it the singleton domain
/// `{node}`.
pub trait AssignmentSource: Send + Sync {
    fn candidates(&self, ctx: &LogicContext, root: &Expr, node: &Expr) -> Vec<Expr>;
}

/// Never proposes candidates; every constant stays as written.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCandidates;

impl AssignmentSource for NoCandidates {
    fn candidates(&self, _ctx: &LogicContext, _root: &Expr, _node: &Expr) -> Vec<Expr> {
        Vec::new()
    }
}

// ============================================================================
// Reference resolution
// ============================================================================

/// Resolves the identifier placeholder of a reference literal to every
/// entity identifier present in the root expression.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceCandidates;

impl AssignmentSource for ReferenceCandidates {
    fn candidates(&self, ctx: &LogicContext, root: &Expr, node: &Expr) -> Vec<Expr> {
        if !ctx.is_id_placeholder(node) {
            return Vec::new();
        }
        root.skolem_ids().into_iter().map(Expr::skolem_id).collect()
    }
}

// ============================================================================
// Mapping table
// ============================================================================

#[derive(Debug, Error)]
pub enum CandidateTableError {
    #[error("invalid candidate table json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid expression `{text}`: {source}")]
    Read { text: String, source: LogicError },
}

/// Fixed underspecified-constant → candidates table.
#[derive(Debug, Default, Clone)]
pub struct CandidateTable {
    entries: AHashMap<Expr, Vec<Expr>>,
}

impl CandidateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register candidates for a constant. Lookups ignore overlays.
    pub fn insert(&mut self, constant: Expr, candidates: Vec<Expr>) {
        self.entries.insert(constant.strip_overlays(), candidates);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load `{"c_ARG0:<e,<e,t>>": ["c_ARG0:<e,<e,t>>", "c_ARG1:<e,<e,t>>"]}`.
    pub fn from_json_str(ctx: &LogicContext, text: &str) -> Result<Self, CandidateTableError> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(text)?;
        let read = |text: &str| {
            ctx.read(text).map_err(|source| CandidateTableError::Read {
                text: text.to_string(),
                source,
            })
        };
        let mut table = CandidateTable::new();
        for (key, values) in raw {
            let candidates = values
                .iter()
                .map(|value| read(value))
                .collect::<Result<Vec<_>, _>>()?;
            table.insert(read(&key)?, candidates);
        }
        Ok(table)
    }
}

impl AssignmentSource for CandidateTable {
    fn candidates(&self, _ctx: &LogicContext, _root: &Expr, node: &Expr) -> Vec<Expr> {
        if node.as_constant().is_none() {
            return Vec::new();
        }
        self.entries
            .get(&node.strip_overlays())
            .cloned()
            .unwrap_or_default()
    }
}

// ============================================================================
// Composition
// ============================================================================

/// Asks each source in turn; the first non-empty answer wins.
#[derive(Clone, Default)]
pub struct ChainedSources {
    sources: Vec<Arc<dyn AssignmentSource>>,
}

impl ChainedSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: Arc<dyn AssignmentSource>) -> Self {
        self.sources.push(source);
        self
    }
}

impl AssignmentSource for ChainedSources {
    fn candidates(&self, ctx: &LogicContext, root: &Expr, node: &Expr) -> Vec<Expr> {
        self.sources
            .iter()
            .map(|source| source.candidates(ctx, root, node))
            .find(|candidates| !candidates.is_empty())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_candidates_lists_all_ids() {
        let ctx = LogicContext::new();
        let root = ctx
            .read(
                "(a:<id,<<e,t>,e>> !0 (lambda $0:e (and:<t*,t> (want-01:<e,t> $0) \
                 (c_ARG0:<e,<e,t>> $0 (a:<id,<<e,t>,e>> !1 (lambda $1:e (boy:<e,t> $1)))) \
                 (c_ARG1:<e,<e,t>> $0 (ref:<id,e> na:id)))))",
            )
            .unwrap();
        let placeholder = Expr::constant(ctx.id_placeholder().clone());
        let candidates = ReferenceCandidates.candidates(&ctx, &root, &placeholder);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].to_string(), "!1");
    }

    #[test]
    fn test_candidate_table_from_json_ignores_overlays() {
        let ctx = LogicContext::new();
        let table = CandidateTable::from_json_str(
            &ctx,
            r#"{"c_REL:<e,<e,t>>": ["c_ARG0:<e,<e,t>>", "c_ARG1:<e,<e,t>>"]}"#,
        )
        .unwrap();
        let node = ctx.read("c_REL:<e,<e,t>>[of]").unwrap();
        let root = node.clone();
        assert_eq!(table.candidates(&ctx, &root, &node).len(), 2);
    }

    #[test]
    fn test_chained_sources_first_non_empty() {
        let ctx = LogicContext::new();
        let mut table = CandidateTable::new();
        let key = ctx.read("boy:<e,t>").unwrap();
        table.insert(key.clone(), vec![ctx.read("boy-01:<e,t>").unwrap()]);
        let chain = ChainedSources::new()
            .with(Arc::new(ReferenceCandidates))
            .with(Arc::new(table));
        assert_eq!(chain.candidates(&ctx, &key, &key).len(), 1);
    }

    #[test]
    fn test_candidate_table_bad_expression() {
        let ctx = LogicContext::new();
        let err = CandidateTable::from_json_str(&ctx, r#"{"boy": ["boy:<e,t>"]}"#).unwrap_err();
        assert!(matches!(err, CandidateTableError::Read { .. }));
    }
}
