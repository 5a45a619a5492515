//! Level generation pipeline and the generate-validate retry loop.
//!
//! `generate` runs regions → nodes → roles → base edges → backdoors and
//! checks the structural invariants of the result. `generate_and_validate`
//! wraps it in a bounded retry loop that discards graphs failing validation.

use rand::Rng;

use crate::backdoors::place_backdoors;
use crate::config::{validate_layout, validate_params, GenerationParams, LayoutConfig};
use crate::edges::build_base_edges;
use crate::error::GenerateError;
use crate::graph::{Graph, GraphMeta};
use crate::nodes::{assign_roles, distribute_nodes};
use crate::regions::generate_regions;
use crate::validation::{check_validity, prune_backdoors_by_hop, ValidationReport};

fn validate_inputs(layout: &LayoutConfig, params: &GenerationParams) -> Result<(), GenerateError> {
    let mut errors = validate_layout(layout);
    errors.extend(validate_params(params));
    if errors.is_empty() {
        Ok(())
    } else {
        Err(GenerateError::Config(errors))
    }
}

/// Build one level. Constraint checks are left to [`check_validity`].
pub fn generate(
    layout: &LayoutConfig,
    params: &GenerationParams,
    rng: &mut impl Rng,
) -> Result<Graph, GenerateError> {
    validate_inputs(layout, params)?;

    let regions = generate_regions(layout);
    let mut nodes = distribute_nodes(&regions, layout, rng);
    assign_roles(&mut nodes, &regions, layout.start_region, layout.goal_region)?;

    let mut edges = build_base_edges(&nodes, layout, params, rng);
    let placement = place_backdoors(&nodes, &regions, &edges, layout, params);
    edges.extend(placement.edges);

    let label = |id: u32| {
        regions
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.label.clone())
            .unwrap_or_default()
    };
    let meta = GraphMeta {
        total_nodes: nodes.len() as u32,
        region_count: regions.len() as u32,
        start_region_label: label(layout.start_region),
        goal_region_label: label(layout.goal_region),
        placement: Some(placement.report),
    };

    let graph = Graph {
        regions,
        nodes,
        edges: edges.into_vec(),
        meta,
        params: params.clone(),
    };
    graph.check_invariants()?;
    Ok(graph)
}

/// Result of the retry loop. `graph` is the accepted level, if any.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub success: bool,
    pub graph: Option<Graph>,
    /// Failures of every rejected attempt, each prefixed `Attempt N:`.
    pub failures: Vec<String>,
    pub attempts: u32,
    /// Validation of the accepted graph.
    pub report: Option<ValidationReport>,
}

/// Generate, prune out-of-window backdoors, validate; retry from scratch up
/// to `max_attempts` times (at least once).
pub fn generate_and_validate(
    layout: &LayoutConfig,
    params: &GenerationParams,
    max_attempts: u32,
    rng: &mut impl Rng,
) -> Result<GenerationOutcome, GenerateError> {
    validate_inputs(layout, params)?;

    let max_attempts = max_attempts.max(1);
    let mut failures = Vec::new();
    for attempt in 1..=max_attempts {
        let mut graph = generate(layout, params, rng)?;
        prune_backdoors_by_hop(&mut graph, params.min_len, params.max_len);
        let report = check_validity(&graph, layout, params.min_len, params.max_len);

        if report.is_valid() {
            log::info!(
                "attempt {}: accepted with {} backdoors ({} forward, {} lateral)",
                attempt,
                report.total,
                report.forward,
                report.lateral
            );
            return Ok(GenerationOutcome {
                success: true,
                graph: Some(graph),
                failures,
                attempts: attempt,
                report: Some(report),
            });
        }

        log::info!(
            "attempt {}: rejected ({} problems, first: {})",
            attempt,
            report.failures.len(),
            report.failures.first().map(String::as_str).unwrap_or("-")
        );
        failures.extend(
            report
                .failures
                .into_iter()
                .map(|f| format!("Attempt {}: {}", attempt, f)),
        );
    }

    log::warn!("no valid level after {} attempts", max_attempts);
    Ok(GenerationOutcome {
        success: false,
        graph: None,
        failures,
        attempts: max_attempts,
        report: None,
    })
}
