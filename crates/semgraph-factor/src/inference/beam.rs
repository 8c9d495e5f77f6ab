//! Bounded enumeration of joint assignments.
//!
//! Variables are assigned one at a time: singleton domains first, then in
//! ascending order of factor count. A factor contributes its score at the
//! step where its last variable is assigned, so every partial configuration
//! carries the exact score of the factors it fully covers. After each step
//! the frontier is cut to the `beam` best configurations.

use super::{EvaluationResult, InferenceOutcome};
use crate::error::InferenceError;
use crate::features::FeatureVector;
use crate::graph::{FactorGraph, NodeId};
use crate::table::Assignment;
use rayon::prelude::*;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
struct Configuration {
    /// Value index per ordered variable assigned so far.
    values: Vec<usize>,
    score: f64,
}

/// A factor with the positions of its columns in the variable order.
struct Scheduled {
    factor: usize,
    positions: Vec<usize>,
}

/// Enumerate the best `beam` assignments of `graph`, best first.
pub fn search(graph: &FactorGraph, beam: usize) -> Result<InferenceOutcome, InferenceError> {
    let beam = beam.max(1);

    let mut order: Vec<NodeId> = graph.variables().map(|node| node.id()).collect();
    order.sort_by_key(|&id| (graph.node(id).domain().len() != 1, graph.edges(id).len()));

    let position_of = |id: NodeId| order.iter().position(|&o| o == id);

    // Factors grouped by the step that completes them.
    let mut steps: Vec<Vec<Scheduled>> = (0..order.len()).map(|_| Vec::new()).collect();
    let mut unconsumed = 0;
    for (index, factor) in graph.factors().iter().enumerate() {
        let positions: Option<Vec<usize>> = factor.nodes().map(position_of).collect();
        let Some(positions) = positions else {
            unconsumed += 1;
            continue;
        };
        match positions.iter().copied().max() {
            Some(last) => steps[last].push(Scheduled {
                factor: index,
                positions,
            }),
            None => unconsumed += 1,
        }
    }
    if unconsumed > 0 {
        return Err(InferenceError::UnconsumedFactors {
            remaining: unconsumed,
        });
    }

    let mut exact = true;
    let mut frontier = vec![Configuration {
        values: Vec::new(),
        score: 0.0,
    }];

    for (step, &id) in order.iter().enumerate() {
        let domain = graph.node(id).domain().len();
        let scheduled = &steps[step];

        let mut expanded: Vec<Configuration> = frontier
            .par_iter()
            .flat_map_iter(|config| {
                (0..domain).map(move |value| {
                    let mut values = Vec::with_capacity(config.values.len() + 1);
                    values.extend_from_slice(&config.values);
                    values.push(value);
                    let gained: f64 = scheduled
                        .iter()
                        .map(|s| {
                            let indices: Vec<usize> = s.positions.iter().map(|&p| values[p]).collect();
                            graph.factors()[s.factor].table().get_indexed(&indices)
                        })
                        .sum();
                    Configuration {
                        values,
                        score: config.score + gained,
                    }
                })
            })
            .collect();

        if expanded.len() > beam {
            exact = false;
            expanded.sort_by(|a, b| b.score.total_cmp(&a.score));
            expanded.truncate(beam);
        }
        trace!(step, node = %id, frontier = expanded.len(), "beam step");
        frontier = expanded;
    }

    let schedule: Vec<&Scheduled> = steps.iter().flatten().collect();
    let mut results = frontier
        .into_iter()
        .map(|config| {
            let assignment: Assignment = order.iter().copied().zip(config.values.iter().copied()).collect();
            let mut features = FeatureVector::new();
            for s in &schedule {
                let indices: Vec<usize> = s.positions.iter().map(|&p| config.values[p]).collect();
                features.add_all(graph.factors()[s.factor].table().features_indexed(&indices));
            }
            Ok(EvaluationResult {
                expression: graph.to_expression(&assignment)?,
                score: config.score,
                features,
                log_probability: None,
            })
        })
        .collect::<Result<Vec<_>, InferenceError>>()?;
    results.sort_by(|a, b| b.score.total_cmp(&a.score));

    debug!(results = results.len(), exact, "beam search finished");
    Ok(InferenceOutcome { results, exact })
}
