//! Loopy belief propagation in log space.
//!
//! ```text
//!   variable ──(ν: variable→factor)──► factor
//!   variable ◄─(μ: factor→variable)─── factor
//! ```
//!
//! Each iteration first recomputes every ν from the previous μ, then every
//! μ from the fresh ν. Messages are normalized after every update. The loop
//! stops when the largest change of any μ (in probability space) falls under
//! the threshold, or when the iteration or time budget runs out. Beliefs are
//! then written back into the graph.

use super::EvaluationResult;
use crate::error::InferenceError;
use crate::features::WeightModel;
use crate::graph::{FactorGraph, NodeId};
use crate::math::{log_add, normalize_log};
use crate::table::Assignment;
use rayon::prelude::*;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct BpSettings {
    /// Convergence threshold on the largest message change.
    pub threshold: f64,
    pub max_iterations: usize,
    pub max_time: Option<Duration>,
    /// Tolerance when checking that beliefs sum to one.
    pub belief_epsilon: f64,
}

impl Default for BpSettings {
    fn default() -> Self {
        Self {
            threshold: 0.001,
            max_iterations: 100,
            max_time: None,
            belief_epsilon: 1e-5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BpReport {
    pub iterations: usize,
    pub converged: bool,
    pub timed_out: bool,
    pub final_diff: f64,
}

/// One (factor, column) connection.
#[derive(Debug, Clone, Copy)]
struct Edge {
    factor: usize,
    column: usize,
    node: NodeId,
    size: usize,
}

struct Topology {
    edges: Vec<Edge>,
    /// Edge ids of each node, by node index.
    by_node: Vec<Vec<usize>>,
    /// Edge ids of each factor, one per column.
    by_factor: Vec<Vec<usize>>,
}

impl Topology {
    fn of(graph: &FactorGraph) -> Self {
        let mut edges = Vec::new();
        let mut by_node = vec![Vec::new(); graph.nodes().len()];
        let mut by_factor = Vec::with_capacity(graph.factors().len());
        for (factor, f) in graph.factors().iter().enumerate() {
            let mut columns = Vec::new();
            for (column, header) in f.table().headers().iter().enumerate() {
                let id = edges.len();
                edges.push(Edge {
                    factor,
                    column,
                    node: header.node(),
                    size: header.len(),
                });
                by_node[header.node().index()].push(id);
                columns.push(id);
            }
            by_factor.push(columns);
        }
        Self {
            edges,
            by_node,
            by_factor,
        }
    }

    fn uniform(&self) -> Vec<Vec<f64>> {
        self.edges
            .iter()
            .map(|e| vec![-(e.size as f64).ln(); e.size])
            .collect()
    }

    /// ν for every edge: product of the other factors' μ at the same node.
    fn to_factors(&self, to_variables: &[Vec<f64>]) -> Vec<Vec<f64>> {
        self.edges
            .par_iter()
            .enumerate()
            .map(|(id, edge)| {
                let mut message = vec![0.0; edge.size];
                for &other in &self.by_node[edge.node.index()] {
                    if other == id {
                        continue;
                    }
                    for (m, incoming) in message.iter_mut().zip(&to_variables[other]) {
                        *m += incoming;
                    }
                }
                normalize_log(&mut message);
                message
            })
            .collect()
    }

    /// μ for every edge: the factor marginalized onto the edge's column.
    fn to_variables(&self, graph: &FactorGraph, to_factors: &[Vec<f64>]) -> Vec<Vec<f64>> {
        self.edges
            .par_iter()
            .map(|edge| {
                let table = graph.factors()[edge.factor].table();
                let columns = &self.by_factor[edge.factor];
                let mut message = vec![f64::NEG_INFINITY; edge.size];
                for row in 0..table.len() {
                    let indices = table.unravel(row);
                    let mut value = table.score_at(row);
                    for (column, &other) in columns.iter().enumerate() {
                        if column != edge.column {
                            value += to_factors[other][indices[column]];
                        }
                    }
                    let slot = &mut message[indices[edge.column]];
                    *slot = log_add(*slot, value);
                }
                normalize_log(&mut message);
                message
            })
            .collect()
    }
}

fn max_change(old: &[Vec<f64>], new: &[Vec<f64>]) -> f64 {
    old.iter()
        .zip(new)
        .flat_map(|(a, b)| a.iter().zip(b))
        .map(|(a, b)| (a.exp() - b.exp()).abs())
        .fold(0.0, f64::max)
}

fn check_mass(what: &str, owner: &str, mass: f64, epsilon: f64) {
    if (mass - 1.0).abs() > epsilon {
        error!(kind = what, owner, mass, "beliefs do not sum to one");
    }
}

/// Run message passing and store variable and factor beliefs in `graph`.
pub fn run(graph: &mut FactorGraph, settings: &BpSettings) -> BpReport {
    let topology = Topology::of(graph);
    let started = Instant::now();

    let mut to_variables = topology.uniform();
    let mut to_factors = topology.uniform();
    let mut report = BpReport {
        iterations: 0,
        converged: topology.edges.is_empty(),
        timed_out: false,
        final_diff: 0.0,
    };

    while !report.converged && report.iterations < settings.max_iterations {
        to_factors = topology.to_factors(&to_variables);
        let updated = topology.to_variables(graph, &to_factors);
        report.final_diff = max_change(&to_variables, &updated);
        to_variables = updated;
        report.iterations += 1;
        debug!(iteration = report.iterations, diff = report.final_diff, "message passing");

        if report.final_diff < settings.threshold {
            report.converged = true;
        } else if settings.max_time.is_some_and(|limit| started.elapsed() >= limit) {
            report.timed_out = true;
            warn!(iterations = report.iterations, "message passing hit its time budget");
            break;
        }
    }
    if !report.converged && !report.timed_out {
        warn!(
            iterations = report.iterations,
            diff = report.final_diff,
            "message passing did not converge"
        );
    }
    if !topology.edges.is_empty() {
        to_factors = topology.to_factors(&to_variables);
    }

    // Variable beliefs.
    let variables: Vec<(NodeId, usize)> = graph
        .variables()
        .map(|node| (node.id(), node.domain().len()))
        .collect();
    for (id, size) in variables {
        let edges = &topology.by_node[id.index()];
        let mut belief = vec![0.0; size];
        for &edge in edges {
            for (b, incoming) in belief.iter_mut().zip(&to_variables[edge]) {
                *b += incoming;
            }
        }
        normalize_log(&mut belief);
        check_mass(
            "variable",
            &id.to_string(),
            belief.iter().map(|b| b.exp()).sum(),
            settings.belief_epsilon,
        );
        graph.set_variable_belief(id, belief);
    }

    // Factor beliefs.
    let factor_beliefs: Vec<Vec<f64>> = graph
        .factors()
        .par_iter()
        .enumerate()
        .map(|(factor, f)| {
            let table = f.table();
            let columns = &topology.by_factor[factor];
            let mut belief: Vec<f64> = (0..table.len())
                .map(|row| {
                    let indices = table.unravel(row);
                    columns
                        .iter()
                        .enumerate()
                        .map(|(column, &edge)| to_factors[edge][indices[column]])
                        .sum::<f64>()
                        + table.score_at(row)
                })
                .collect();
            normalize_log(&mut belief);
            belief
        })
        .collect();
    for (index, belief) in factor_beliefs.into_iter().enumerate() {
        let id = graph.factors()[index].id();
        let table = graph.factor_mut(id).table_mut();
        table.set_beliefs(belief);
        if let Some(mass) = table.belief_mass() {
            check_mass("factor", &id.to_string(), mass, settings.belief_epsilon);
        }
    }

    graph.mark_marginals();
    debug!(
        iterations = report.iterations,
        converged = report.converged,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "belief propagation finished"
    );
    report
}

/// Decode max-marginal assignments after [`run`].
///
/// Each variable keeps every value tied at its maximum belief. The joint
/// results are the cartesian product of those sets; when the product
/// exceeds `limit` nothing is returned.
pub fn max_evaluations(
    graph: &FactorGraph,
    model: &dyn WeightModel,
    limit: usize,
) -> Result<Vec<EvaluationResult>, InferenceError> {
    if !graph.has_marginals() {
        return Err(InferenceError::MissingMarginals);
    }

    let mut choices: Vec<(NodeId, Vec<usize>)> = Vec::new();
    let mut log_probability = 0.0;
    for node in graph.variables() {
        let Some(belief) = graph.variable_belief(node.id()) else {
            return Err(InferenceError::MissingMarginals);
        };
        if belief.len() == 1 {
            choices.push((node.id(), vec![0]));
            log_probability += belief[0];
            continue;
        }
        let best = belief.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let tied: Vec<usize> = belief
            .iter()
            .enumerate()
            .filter(|(_, b)| (*b - best).abs() <= 1e-12)
            .map(|(i, _)| i)
            .collect();
        log_probability += best;
        choices.push((node.id(), tied));
    }

    let total = choices
        .iter()
        .try_fold(1usize, |acc, (_, tied)| acc.checked_mul(tied.len()));
    match total {
        Some(total) if total <= limit => {}
        _ => {
            warn!(
                combinations = ?total,
                limit,
                "too many max-marginal assignments, returning none"
            );
            return Ok(Vec::new());
        }
    }

    let mut assignments: Vec<Assignment> = vec![Assignment::new()];
    for (id, tied) in &choices {
        assignments = assignments
            .into_iter()
            .flat_map(|partial| {
                tied.iter().map(move |&value| {
                    let mut next = partial.clone();
                    next.insert(*id, value);
                    next
                })
            })
            .collect();
    }

    assignments
        .into_iter()
        .map(|assignment| {
            let features = graph.features_of(&assignment)?;
            Ok(EvaluationResult {
                expression: graph.to_expression(&assignment)?,
                score: model.score(&features),
                features,
                log_probability: Some(log_probability),
            })
        })
        .collect()
}
