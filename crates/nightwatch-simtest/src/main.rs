//! Nightwatch Headless Level Harness
//!
//! Generates one level, checks it against the level-design constraints,
//! repairs choke points and scores it with a batch of simulated runs.
//! Runs entirely in-process with no rendering or networking.
//!
//! Usage:
//!   cargo run -p nightwatch-simtest
//!   cargo run -p nightwatch-simtest -- --seed 7 --runs 500 --parallel --verbose
//!   cargo run -p nightwatch-simtest -- --export level.json

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use nightwatch_logic::config::{
    validate_layout, validate_params, validate_sim, CaptureRule, EvalConfig, ForwardRule,
    GenerationParams, LayoutConfig, SimConfig,
};
use nightwatch_logic::constants::{evaluation, generation, repair};
use nightwatch_logic::evaluation::{evaluate, evaluate_parallel};
use nightwatch_logic::generation::generate_and_validate;
use nightwatch_logic::graph::Graph;
use nightwatch_logic::perception::control_map;
use nightwatch_logic::simulation::{simulate, Outcome, Simulation, SimulationRun};
use nightwatch_logic::snapshot;
use nightwatch_logic::validation::{
    check_validity, find_articulation_points, repair_choke_points,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

// ── Command line ────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "nightwatch-simtest")]
#[command(about = "Generate, validate and score a Nightwatch level")]
struct Args {
    /// Seed for generation and the batch master seed
    #[arg(long, default_value_t = evaluation::DEFAULT_SEED)]
    seed: u64,

    /// Simulated runs in the batch
    #[arg(long, default_value_t = evaluation::DEFAULT_RUNS)]
    runs: u32,

    /// Generate-validate attempts before giving up
    #[arg(long, default_value_t = generation::MAX_ATTEMPTS)]
    attempts: u32,

    /// Articulation points tolerated after repair
    #[arg(long, default_value_t = repair::CHOKE_LIMIT)]
    choke_limit: usize,

    /// Backdoor target as a percentage of the node count
    #[arg(long, default_value_t = generation::BACKDOOR_PCT)]
    backdoor_pct: f32,

    /// Shortest allowed backdoor, in backdoor-free hops
    #[arg(long, default_value_t = generation::MIN_LEN)]
    min_len: u32,

    /// Longest allowed backdoor, in backdoor-free hops
    #[arg(long, default_value_t = generation::MAX_LEN)]
    max_len: u32,

    /// Which region pairs may host forward backdoors
    #[arg(long, value_enum, default_value_t = ForwardArg::Unrestricted)]
    forward_rule: ForwardArg,

    /// When a patrol catches the player
    #[arg(long, value_enum, default_value_t = CaptureArg::SameNode)]
    capture: CaptureArg,

    /// Turns the player can afford before running out of resources
    #[arg(long)]
    resource_budget: Option<u32>,

    /// Spread batch runs over all cores
    #[arg(long)]
    parallel: bool,

    /// Write the accepted level (`.bin` for a binary snapshot, JSON otherwise)
    #[arg(long)]
    export: Option<PathBuf>,

    /// Print passing checks as well as failures
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ForwardArg {
    Unrestricted,
    ExcludeMiddleRow,
    TowardLastRow,
}

impl From<ForwardArg> for ForwardRule {
    fn from(arg: ForwardArg) -> Self {
        match arg {
            ForwardArg::Unrestricted => ForwardRule::Unrestricted,
            ForwardArg::ExcludeMiddleRow => ForwardRule::ExcludeMiddleRow,
            ForwardArg::TowardLastRow => ForwardRule::TowardLastRow,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CaptureArg {
    SameNode,
    Perceived,
}

impl From<CaptureArg> for CaptureRule {
    fn from(arg: CaptureArg) -> Self {
        match arg {
            CaptureArg::SameNode => CaptureRule::SameNode,
            CaptureArg::Perceived => CaptureRule::Perceived,
        }
    }
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

impl TestResult {
    fn new(name: &str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            detail: detail.into(),
        }
    }
}

struct Setup {
    layout: LayoutConfig,
    params: GenerationParams,
    sim: SimConfig,
    eval: EvalConfig,
}

fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    println!("=== Nightwatch Level Harness ===\n");

    let setup = Setup {
        layout: LayoutConfig::default(),
        params: GenerationParams {
            backdoor_pct: args.backdoor_pct,
            min_len: args.min_len,
            max_len: args.max_len,
            forward_rule: args.forward_rule.into(),
            ..GenerationParams::default()
        },
        sim: SimConfig {
            capture_rule: args.capture.into(),
            resource_budget: args.resource_budget,
            ..SimConfig::default()
        },
        eval: EvalConfig {
            runs: args.runs,
            seed: args.seed,
            ..EvalConfig::default()
        },
    };

    let mut results = Vec::new();

    // 1. Configuration
    let config_ok = validate_configuration(&setup, &mut results);

    // 2. Generation
    let level = if config_ok {
        generate_level(&setup, &args, &mut results)
    } else {
        None
    };

    if let Some(mut graph) = level {
        // 3. Structure
        validate_structure(&graph, &setup, &mut results);

        // 4. Backdoors
        validate_backdoors(&graph, &setup, &mut results);

        // 5. Choke points
        validate_choke_points(&mut graph, &setup, &args, &mut results);

        // 6. Single run
        validate_single_run(&graph, &setup, &args, &mut results);

        // 7. Batch
        validate_batch(&graph, &setup, &args, &mut results);

        // 8. Export
        if let Some(path) = &args.export {
            validate_export(&graph, path, &mut results);
        }
    }

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || args.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Configuration ────────────────────────────────────────────────────

fn validate_configuration(setup: &Setup, results: &mut Vec<TestResult>) -> bool {
    println!("--- Configuration ---");
    let mut all_ok = true;

    for (name, errors) in [
        ("config_layout", validate_layout(&setup.layout)),
        ("config_generation", validate_params(&setup.params)),
        ("config_simulation", validate_sim(&setup.sim)),
    ] {
        all_ok &= errors.is_empty();
        let detail = if errors.is_empty() {
            "ok".to_string()
        } else {
            errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        };
        results.push(TestResult::new(name, errors.is_empty(), detail));
    }

    results.push(TestResult::new(
        "config_runs",
        setup.eval.runs > 0,
        format!("{} runs, master seed {}", setup.eval.runs, setup.eval.seed),
    ));
    all_ok && setup.eval.runs > 0
}

// ── 2. Generation ───────────────────────────────────────────────────────

fn generate_level(setup: &Setup, args: &Args, results: &mut Vec<TestResult>) -> Option<Graph> {
    println!("--- Generation ---");
    let mut rng = StdRng::seed_from_u64(args.seed);
    let outcome = match generate_and_validate(&setup.layout, &setup.params, args.attempts, &mut rng)
    {
        Ok(outcome) => outcome,
        Err(e) => {
            results.push(TestResult::new("generation_run", false, e.to_string()));
            return None;
        }
    };

    if args.verbose {
        for failure in &outcome.failures {
            println!("  rejected: {}", failure);
        }
    }
    results.push(TestResult::new(
        "generation_accepted",
        outcome.success,
        format!(
            "{} after {} attempt(s), {} rejections",
            if outcome.success { "accepted" } else { "gave up" },
            outcome.attempts,
            outcome.failures.len()
        ),
    ));

    let graph = outcome.graph?;
    if let Some(placement) = &graph.meta.placement {
        results.push(TestResult::new(
            "generation_placement",
            placement.added > 0,
            format!(
                "{}/{} placed (passes {:?}), {} candidates",
                placement.added, placement.target, placement.per_pass, placement.candidates
            ),
        ));
    }
    Some(graph)
}

// ── 3. Structure ────────────────────────────────────────────────────────

fn validate_structure(graph: &Graph, setup: &Setup, results: &mut Vec<TestResult>) {
    println!("--- Structure ---");

    results.push(TestResult::new(
        "structure_invariants",
        graph.check_invariants().is_ok(),
        match graph.check_invariants() {
            Ok(()) => "dense ids, canonical unique edges".to_string(),
            Err(e) => e.to_string(),
        },
    ));

    results.push(TestResult::new(
        "structure_node_count",
        graph.nodes.len() == setup.layout.total_nodes as usize,
        format!(
            "{} nodes over {} regions",
            graph.nodes.len(),
            graph.regions.len()
        ),
    ));

    let start_region = graph.start_node().and_then(|n| graph.region_of(n));
    let goal_region = graph.goal_node().and_then(|n| graph.region_of(n));
    results.push(TestResult::new(
        "structure_roles",
        start_region == Some(setup.layout.start_region)
            && goal_region == Some(setup.layout.goal_region),
        format!(
            "start in {}, goal in {}",
            graph.meta.start_region_label, graph.meta.goal_region_label
        ),
    ));

    let reachable = graph
        .start_node()
        .zip(graph.goal_node())
        .and_then(|(s, g)| graph.adjacency().hop_distance(s, g));
    results.push(TestResult::new(
        "structure_goal_reachable",
        reachable.is_some(),
        match reachable {
            Some(hops) => format!("goal {} hops from start", hops),
            None => "goal unreachable from start".to_string(),
        },
    ));

    let summary = graph.summary();
    results.push(TestResult::new(
        "structure_edge_mix",
        summary.intra > 0 && summary.inter > 0,
        format!(
            "intra={} inter={} backdoor={} diagonal={:.0}% deg3={:.0}% (target {}%) deg4+={:.0}% (target {}%)",
            summary.intra,
            summary.inter,
            summary.backdoor,
            summary.diagonal_pct,
            summary.degree3_pct,
            summary.degree3_target_pct,
            summary.degree4_plus_pct,
            summary.degree4_target_pct
        ),
    ));
}

// ── 4. Backdoors ────────────────────────────────────────────────────────

fn validate_backdoors(graph: &Graph, setup: &Setup, results: &mut Vec<TestResult>) {
    println!("--- Backdoors ---");
    let report = check_validity(
        graph,
        &setup.layout,
        setup.params.min_len,
        setup.params.max_len,
    );

    results.push(TestResult::new(
        "backdoors_valid",
        report.is_valid(),
        if report.is_valid() {
            format!(
                "{} backdoors, avg {:.1} hops, {} region pairs, score {:.1}",
                report.total, report.avg_hops, report.variety, report.score
            )
        } else {
            report.failures.join("; ")
        },
    ));

    results.push(TestResult::new(
        "backdoors_balance",
        (report.forward_pct - 50.0).abs() <= generation::BALANCE_TOLERANCE_PCT as f32,
        format!(
            "forward {} ({}%), lateral {} ({}%)",
            report.forward, report.forward_pct, report.lateral, report.lateral_pct
        ),
    ));

    let in_start = graph
        .backdoors()
        .filter(|e| {
            [e.from, e.to]
                .iter()
                .any(|&n| graph.region_of(n) == Some(setup.layout.start_region))
        })
        .count();
    results.push(TestResult::new(
        "backdoors_avoid_start",
        in_start == 0,
        format!("{} backdoors touch the start region", in_start),
    ));
}

// ── 5. Choke points ─────────────────────────────────────────────────────

fn validate_choke_points(
    graph: &mut Graph,
    setup: &Setup,
    args: &Args,
    results: &mut Vec<TestResult>,
) {
    println!("--- Choke Points ---");
    let before = find_articulation_points(graph.nodes.len(), &graph.edges);
    let mut rng = StdRng::seed_from_u64(args.seed);
    let report = repair_choke_points(graph, args.choke_limit, repair::ATTEMPT_BUDGET, &mut rng);
    let after = find_articulation_points(graph.nodes.len(), &graph.edges);

    results.push(TestResult::new(
        "choke_repaired",
        report.fixed && after.len() <= args.choke_limit,
        format!(
            "{} → {} articulation points with {} added edges (limit {})",
            before.len(),
            after.len(),
            report.attempts,
            args.choke_limit
        ),
    ));

    results.push(TestResult::new(
        "choke_graph_intact",
        graph.check_invariants().is_ok(),
        "invariants hold after repair",
    ));

    let recheck = check_validity(
        graph,
        &setup.layout,
        setup.params.min_len,
        setup.params.max_len,
    );
    results.push(TestResult::new(
        "choke_backdoors_intact",
        recheck.is_valid(),
        if recheck.is_valid() {
            format!("{} backdoors still inside their hop window", recheck.total)
        } else {
            recheck.failures.join("; ")
        },
    ));
}

// ── 6. Single run ───────────────────────────────────────────────────────

fn validate_single_run(graph: &Graph, setup: &Setup, args: &Args, results: &mut Vec<TestResult>) {
    println!("--- Single Run ---");
    let mut rng = StdRng::seed_from_u64(args.seed);

    match Simulation::new(graph, &setup.sim, &mut rng) {
        Ok(sim) => {
            results.push(TestResult::new(
                "run_initial_state",
                graph.start_node() == Some(sim.player())
                    && sim.alert() == 1
                    && sim.outcome().is_none(),
                format!("player on {}, alert {}", sim.player(), sim.alert()),
            ));

            let patrols = sim.roster().patrols();
            let watched = control_map(graph, &graph.adjacency(), patrols);
            let start_watched = graph
                .start_node()
                .is_some_and(|start| watched.is_watched(start));
            results.push(TestResult::new(
                "run_initial_patrols",
                !start_watched,
                format!(
                    "{} patrol(s) watching {} nodes",
                    patrols.len(),
                    watched.coverage.len()
                ),
            ));
        }
        Err(e) => {
            results.push(TestResult::new("run_setup", false, e.to_string()));
            return;
        }
    }

    let mut rng = StdRng::seed_from_u64(args.seed);
    let run = match simulate(graph, &setup.sim, &mut rng) {
        Ok(run) => run,
        Err(e) => {
            results.push(TestResult::new("run_simulate", false, e.to_string()));
            return;
        }
    };

    let bounded = run.trace.len() as u32 <= setup.sim.max_turns + 1
        && run.trace.iter().all(|s| (1..=5).contains(&s.alert));
    results.push(TestResult::new(
        "run_trace_bounds",
        bounded,
        format!(
            "{} states, final alert {}",
            run.trace.len(),
            run.trace.last().map_or(0, |s| s.alert)
        ),
    ));

    results.push(TestResult::new(
        "run_outcome",
        outcome_consistent(graph, &setup.sim, &run),
        format!(
            "{:?} after {} turns, {} nodes visited",
            run.outcome, run.turns, run.visited
        ),
    ));
}

/// Whether the final state of `run` actually shows its outcome.
fn outcome_consistent(graph: &Graph, sim: &SimConfig, run: &SimulationRun) -> bool {
    let Some(last) = run.trace.last() else {
        return false;
    };
    match run.outcome {
        Outcome::Victory => graph.goal_node() == Some(last.player),
        Outcome::Captured => match sim.capture_rule {
            CaptureRule::SameNode => last.patrols.iter().any(|p| p.node == last.player),
            CaptureRule::Perceived => {
                let reach = sim.cone_depth + sim.alert_depth_bonus;
                let dist = graph.adjacency().hop_distances(last.player);
                last.patrols
                    .iter()
                    .any(|p| dist[p.node as usize].is_some_and(|d| d <= reach))
            }
        },
        Outcome::Timeout => run.turns == sim.max_turns,
        Outcome::ResourceDepleted => last.resources_left == Some(0),
    }
}

// ── 7. Batch ────────────────────────────────────────────────────────────

fn validate_batch(graph: &Graph, setup: &Setup, args: &Args, results: &mut Vec<TestResult>) {
    println!("--- Batch ---");
    let stats = if args.parallel {
        evaluate_parallel(graph, &setup.sim, &setup.eval)
    } else {
        evaluate(graph, &setup.sim, &setup.eval)
    };
    let stats = match stats {
        Ok(stats) => stats,
        Err(e) => {
            results.push(TestResult::new("batch_evaluate", false, e.to_string()));
            return;
        }
    };

    results.push(TestResult::new(
        "batch_shares",
        (stats.outcome_pct_total() - 100.0).abs() < 1e-6,
        format!(
            "victory {:.1}% (quick {:.1}%, slow {:.1}%), captured {:.1}%, timeout {:.1}%, depleted {:.1}%",
            stats.victory_pct,
            stats.quick_victory_pct,
            stats.slow_victory_pct,
            stats.capture_pct,
            stats.timeout_pct,
            stats.depleted_pct
        ),
    ));

    results.push(TestResult::new(
        "batch_victory_turns",
        true,
        match (stats.avg_turns_to_victory, stats.min_turns_to_victory) {
            (Some(avg), Some(min)) => format!(
                "avg {:.1} turns (min {}), avg {:.1} nodes visited",
                avg,
                min,
                stats.avg_visited_on_victory.unwrap_or(0.0)
            ),
            _ => "no victories".to_string(),
        },
    ));

    // a small batch both ways must agree exactly
    let small_batch = EvalConfig {
        runs: setup.eval.runs.min(16),
        ..setup.eval.clone()
    };
    let same = match (
        evaluate(graph, &setup.sim, &small_batch),
        evaluate_parallel(graph, &setup.sim, &small_batch),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    results.push(TestResult::new(
        "batch_deterministic",
        same,
        format!("sequential and parallel agree over {} runs", small_batch.runs),
    ));
}

// ── 8. Export ───────────────────────────────────────────────────────────

fn validate_export(graph: &Graph, path: &Path, results: &mut Vec<TestResult>) {
    println!("--- Export ---");
    let binary = path.extension().is_some_and(|ext| ext == "bin");

    let written = File::create(path)
        .map_err(snapshot::SnapshotError::from)
        .and_then(|file| {
            let writer = BufWriter::new(file);
            if binary {
                snapshot::save(writer, graph)
            } else {
                snapshot::write_json(writer, graph)
            }
        });
    if let Err(e) = written {
        results.push(TestResult::new("export_write", false, e.to_string()));
        return;
    }

    let reloaded = File::open(path)
        .map_err(snapshot::SnapshotError::from)
        .and_then(|file| {
            let reader = BufReader::new(file);
            if binary {
                snapshot::load(reader)
            } else {
                snapshot::read_json(reader)
            }
        });
    results.push(match reloaded {
        Ok(copy) => TestResult::new(
            "export_reload",
            copy.edges == graph.edges && copy.nodes.len() == graph.nodes.len(),
            format!("{} written and reloaded", path.display()),
        ),
        Err(e) => TestResult::new("export_reload", false, e.to_string()),
    });
}
