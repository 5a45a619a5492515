//! Batch evaluation: many independent simulation runs over one graph.
//!
//! Run `i` gets its own `StdRng` seeded with `master + i`, so
//! [`evaluate`] and [`evaluate_parallel`] produce identical statistics.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{EvalConfig, SimConfig};
use crate::error::{ConfigError, SimulationError};
use crate::graph::Graph;
use crate::simulation::{simulate, Outcome, SimulationRun};

/// Outcome of one run, without the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub outcome: Outcome,
    pub turns: u32,
    pub visited: usize,
}

impl From<&SimulationRun> for RunSummary {
    fn from(run: &SimulationRun) -> Self {
        Self {
            outcome: run.outcome,
            turns: run.turns,
            visited: run.visited,
        }
    }
}

/// Aggregate over a batch. Percentages are of `runs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub runs: u32,
    pub victory_pct: f64,
    /// Victories at or under the turn threshold.
    pub quick_victory_pct: f64,
    pub slow_victory_pct: f64,
    pub capture_pct: f64,
    pub timeout_pct: f64,
    pub depleted_pct: f64,
    pub avg_turns_to_victory: Option<f64>,
    pub min_turns_to_victory: Option<u32>,
    pub avg_visited_on_victory: Option<f64>,
}

impl BatchStats {
    /// Sum of the four outcome shares; 100 up to float rounding.
    pub fn outcome_pct_total(&self) -> f64 {
        self.victory_pct + self.capture_pct + self.timeout_pct + self.depleted_pct
    }
}

/// Seed for run `index`. `StdRng::seed_from_u64` scrambles it, so adjacent
/// seeds still give unrelated streams.
pub fn run_seed(master: u64, index: u32) -> u64 {
    master.wrapping_add(u64::from(index))
}

pub fn aggregate(runs: &[RunSummary], victory_turn_threshold: u32) -> BatchStats {
    let total = runs.len();
    if total == 0 {
        return BatchStats::default();
    }
    let pct = |count: usize| count as f64 * 100.0 / total as f64;
    let count = |outcome: Outcome| runs.iter().filter(|r| r.outcome == outcome).count();

    let victories: Vec<&RunSummary> = runs
        .iter()
        .filter(|r| r.outcome == Outcome::Victory)
        .collect();
    let quick = victories
        .iter()
        .filter(|r| r.turns <= victory_turn_threshold)
        .count();

    BatchStats {
        runs: total as u32,
        victory_pct: pct(victories.len()),
        quick_victory_pct: pct(quick),
        slow_victory_pct: pct(victories.len() - quick),
        capture_pct: pct(count(Outcome::Captured)),
        timeout_pct: pct(count(Outcome::Timeout)),
        depleted_pct: pct(count(Outcome::ResourceDepleted)),
        avg_turns_to_victory: mean(victories.iter().map(|r| r.turns as f64)),
        min_turns_to_victory: victories.iter().map(|r| r.turns).min(),
        avg_visited_on_victory: mean(victories.iter().map(|r| r.visited as f64)),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn run_one(
    graph: &Graph,
    sim: &SimConfig,
    seed: u64,
    index: u32,
) -> Result<RunSummary, SimulationError> {
    let mut rng = StdRng::seed_from_u64(run_seed(seed, index));
    simulate(graph, sim, &mut rng).map(|run| RunSummary::from(&run))
}

fn check_runs(eval: &EvalConfig) -> Result<(), SimulationError> {
    if eval.runs == 0 {
        return Err(SimulationError::Config(vec![ConfigError::ZeroRuns]));
    }
    Ok(())
}

pub fn evaluate(
    graph: &Graph,
    sim: &SimConfig,
    eval: &EvalConfig,
) -> Result<BatchStats, SimulationError> {
    check_runs(eval)?;
    let runs = (0..eval.runs)
        .map(|i| run_one(graph, sim, eval.seed, i))
        .collect::<Result<Vec<_>, _>>()?;
    let stats = aggregate(&runs, eval.victory_turn_threshold);
    log::info!(
        "evaluated {} runs: {:.1}% victory, {:.1}% captured, {:.1}% timeout",
        stats.runs,
        stats.victory_pct,
        stats.capture_pct,
        stats.timeout_pct
    );
    Ok(stats)
}

/// [`evaluate`] with runs spread over the rayon thread pool.
pub fn evaluate_parallel(
    graph: &Graph,
    sim: &SimConfig,
    eval: &EvalConfig,
) -> Result<BatchStats, SimulationError> {
    check_runs(eval)?;
    let runs = (0..eval.runs)
        .into_par_iter()
        .map(|i| run_one(graph, sim, eval.seed, i))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(aggregate(&runs, eval.victory_turn_threshold))
}
