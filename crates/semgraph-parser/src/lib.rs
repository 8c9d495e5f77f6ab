//! semgraph-parser: the second parsing stage.
//!
//! ```text
//! BaseParseOutput ──► assign_ids ─► merge_named_entities ─► canonicalize
//!        │                                                      │
//!        │                              GraphBuilder (per base, rayon)
//!        │                                                      │
//!        │                              beam | lbp | none       ▼
//!        └──────────────► aggregation by result ◄──── EvaluationResult*
//!                                 │
//!                                 ▼
//!                            ParseOutput
//! ```
//!
//! A [`Derivation`] groups every `(base, evaluation, normalizer)` triple that
//! reaches one result. Its inside score is
//! `logsumexp(eval.score - normalizer + base.inside)` over the triples, and
//! the inside scores of all derivations add up to [`ParseOutput::log_norm`].

pub mod base;
pub mod config;
pub mod derivation;
pub mod error;
pub mod output;
pub mod parser;

pub use base::{
    AcceptAll, BaseDerivation, BaseParseOutput, ClosureRepair, DerivationList, ResultFilter,
    SimpleDerivation,
};
pub use config::{ConfigError, InferenceConfig};
pub use derivation::{Derivation, DerivationBuilder, InferenceTriple};
pub use error::ParseError;
pub use output::{ParseOutput, ParsedGraph};
pub use parser::GraphParser;
