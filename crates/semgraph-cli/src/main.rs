//! semgraph CLI
//!
//! Debugging surface for the second stage:
//! - `inspect`: preprocess one expression, build its factor graph and print it
//! - `infer`: run inference over one or more base structures and rank results

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use semgraph_factor::{
    default_factories, GraphBuilder, InferenceMethod, SideInfo, WeightModel,
};
use semgraph_logic::{assign_ids, canonicalize, merge_named_entities, LogicContext};
use semgraph_parser::{AcceptAll, DerivationList, GraphParser};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod inputs;

#[derive(Parser)]
#[command(name = "semgraph")]
#[command(author, version, about = "Factor-graph disambiguation of semantic structures")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ModelArgs {
    /// Candidate table JSON: `{"constant": ["candidate", ...]}`.
    #[arg(long)]
    candidates: Option<PathBuf>,

    /// Feature weights JSON: `{"FEATURE#key": weight}`.
    #[arg(long)]
    weights: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and print the factor graph of one expression.
    Inspect {
        expression: String,

        #[command(flatten)]
        model: ModelArgs,

        /// Treat the expression as a repaired (closure) structure.
        #[arg(long)]
        closure: bool,

        /// Maximum number of factor jobs.
        #[arg(long, default_value_t = 1000)]
        factor_limit: usize,
    },

    /// Run inference and print the ranked derivations.
    Infer {
        /// Base structures, each scored 0.
        expressions: Vec<String>,

        /// JSON file of base derivations with scores.
        #[arg(long)]
        bases: Option<PathBuf>,

        /// Inference configuration JSON.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the configured method (beam, lbp, none).
        #[arg(long)]
        method: Option<InferenceMethod>,

        #[command(flatten)]
        model: ModelArgs,

        /// Number of derivations to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Print a JSON summary instead of text.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct DerivationSummary {
    result: String,
    score: f64,
    log_inside: f64,
    probability: f64,
    triples: usize,
}

#[derive(Serialize)]
struct InferenceSummary {
    method: InferenceMethod,
    exact: bool,
    log_norm: f64,
    graphs: usize,
    derivations: Vec<DerivationSummary>,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_inspect(
    expression: &str,
    model: &ModelArgs,
    closure: bool,
    factor_limit: usize,
) -> Result<()> {
    let ctx = LogicContext::new();
    let expr = inputs::read_expression(&ctx, expression)?;
    let expr = canonicalize(&ctx, &merge_named_entities(&ctx, &assign_ids(&ctx, &expr)));
    let source = inputs::load_source(&ctx, model.candidates.as_deref())?;
    let weights = inputs::load_weights(model.weights.as_deref())?;
    let factories = default_factories();

    let builder = GraphBuilder::new(&ctx, source.as_ref(), &factories, factor_limit);
    println!("{} {}", "expression".bold(), expr);
    match builder.build(&expr, closure, &SideInfo, &weights)? {
        Some(graph) => {
            print!("{graph}");
            for factor in graph.factors() {
                println!("{} {} {}", "factor".bold(), factor.id(), factor.label().cyan());
                for row in 0..factor.table().len() {
                    let features = factor.table().features_at(row);
                    println!(
                        "  row {row:>3} score {:>8.3}  {}",
                        weights.score(features),
                        serde_json::to_string(features)?
                    );
                }
            }
        }
        None => println!("{}", "graph exceeds the factor limit".yellow()),
    }
    Ok(())
}

fn cmd_infer(
    expressions: &[String],
    bases: Option<&std::path::Path>,
    config: Option<&std::path::Path>,
    method: Option<InferenceMethod>,
    model: &ModelArgs,
    top: usize,
    json: bool,
) -> Result<()> {
    let ctx = Arc::new(LogicContext::new());
    let mut config = inputs::load_config(config)?;
    if let Some(method) = method {
        config = config.with_method(method);
    }
    config.validate()?;

    let base = DerivationList::new(inputs::load_bases(&ctx, expressions, bases)?);
    let source = inputs::load_source(&ctx, model.candidates.as_deref())?;
    let weights = inputs::load_weights(model.weights.as_deref())?;

    let parser = GraphParser::new(ctx.clone(), config, source);
    let output = parser.parse(&base, &SideInfo, &weights, &AcceptAll)?;

    let mut ranked: Vec<_> = output.derivations().iter().collect();
    ranked.sort_by(|a, b| b.log_inside_score().total_cmp(&a.log_inside_score()));
    let log_norm = output.log_norm();
    let summary = InferenceSummary {
        method: output.method(),
        exact: output.is_exact(),
        log_norm,
        graphs: output.graphs().len(),
        derivations: ranked
            .iter()
            .take(top)
            .map(|d| DerivationSummary {
                result: d.result().to_string(),
                score: d.score(),
                log_inside: d.log_inside_score(),
                probability: (d.log_inside_score() - log_norm).exp(),
                triples: d.triples().len(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "{} method={} exact={} graphs={} log_norm={:.4}",
        "ok".green().bold(),
        summary.method,
        summary.exact,
        summary.graphs,
        summary.log_norm
    );
    for (rank, d) in summary.derivations.iter().enumerate() {
        println!(
            "{:>3}. p={:.4} viterbi={:>8.3} {}",
            rank + 1,
            d.probability,
            d.score,
            d.result
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Inspect {
            expression,
            model,
            closure,
            factor_limit,
        } => cmd_inspect(expression, model, *closure, *factor_limit),
        Commands::Infer {
            expressions,
            bases,
            config,
            method,
            model,
            top,
            json,
        } => cmd_infer(
            expressions,
            bases.as_deref(),
            config.as_deref(),
            *method,
            model,
            *top,
            *json,
        ),
    }
}
