//! Loading expressions, candidates, weights and configuration from disk.

use anyhow::{anyhow, Context, Result};
use semgraph_factor::{
    AssignmentSource, CandidateTable, ChainedSources, LinearModel, ReferenceCandidates,
};
use semgraph_logic::{Expr, LogicContext};
use semgraph_parser::{InferenceConfig, SimpleDerivation};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// One base derivation in a `--bases` file.
#[derive(Debug, Deserialize)]
struct BaseEntry {
    semantics: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    inside: Option<f64>,
}

/// Base derivations from inline expressions, or from a JSON file of
/// `[{"semantics": "...", "score": -1.2}]`.
pub fn load_bases(
    ctx: &LogicContext,
    expressions: &[String],
    bases: Option<&Path>,
) -> Result<Vec<SimpleDerivation>> {
    let mut derivations = Vec::new();
    for text in expressions {
        let expr = read_expression(ctx, text)?;
        derivations.push(SimpleDerivation::complete(expr, 0.0));
    }
    if let Some(path) = bases {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let entries: Vec<BaseEntry> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid base derivations in {}", path.display()))?;
        for entry in entries {
            let expr = read_expression(ctx, &entry.semantics)?;
            let mut derivation = SimpleDerivation::complete(expr, entry.score);
            if let Some(inside) = entry.inside {
                derivation = derivation.with_inside(inside);
            }
            derivations.push(derivation);
        }
    }
    if derivations.is_empty() {
        return Err(anyhow!("no expressions given (pass them inline or with `--bases`)"));
    }
    Ok(derivations)
}

pub fn read_expression(ctx: &LogicContext, text: &str) -> Result<Expr> {
    ctx.read(text)
        .with_context(|| format!("failed to read expression `{text}`"))
}

/// Candidate table (optional) chained with reference resolution.
pub fn load_source(
    ctx: &LogicContext,
    candidates: Option<&Path>,
) -> Result<Arc<dyn AssignmentSource>> {
    let mut chained = ChainedSources::new();
    if let Some(path) = candidates {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let table = CandidateTable::from_json_str(ctx, &raw)
            .with_context(|| format!("invalid candidate table {}", path.display()))?;
        tracing::debug!(entries = table.len(), path = %path.display(), "loaded candidates");
        chained = chained.with(Arc::new(table));
    }
    Ok(Arc::new(chained.with(Arc::new(ReferenceCandidates))))
}

pub fn load_weights(path: Option<&Path>) -> Result<LinearModel> {
    match path {
        Some(path) => LinearModel::from_path(path)
            .with_context(|| format!("failed to load weights {}", path.display())),
        None => Ok(LinearModel::default()),
    }
}

pub fn load_config(path: Option<&Path>) -> Result<InferenceConfig> {
    match path {
        Some(path) => Ok(InferenceConfig::from_path(path)?),
        None => Ok(InferenceConfig::default()),
    }
}
