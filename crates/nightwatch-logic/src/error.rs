//! Error types shared across the crate.
//!
//! Configuration problems are collected as lists (every problem is reported at
//! once), structural graph problems stop at the first violation.

use thiserror::Error;

use crate::graph::{NodeId, NodeRole, RegionId};

/// A single problem found while validating a configuration struct.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("region grid must be at least 1x1, got {rows}x{cols}")]
    EmptyGrid { rows: u32, cols: u32 },
    #[error("{nodes} nodes cannot give each of {regions} regions a node")]
    TooFewNodes { nodes: u32, regions: u32 },
    #[error("region {region} is outside a grid of {regions} regions")]
    RegionOutOfRange { region: RegionId, regions: u32 },
    #[error("start and goal both use region {0}")]
    StartIsGoal(RegionId),
    #[error("cell size must be positive, got {0}")]
    InvalidCellSize(f32),
    #[error("node margin {margin} leaves no room inside a {extent}-unit region")]
    MarginTooLarge { margin: f32, extent: f32 },
    #[error("hop window [{min}, {max}] is empty or starts at zero")]
    InvalidHopWindow { min: u32, max: u32 },
    #[error("{name} = {value} is outside 0..=100")]
    PercentOutOfRange { name: &'static str, value: f32 },
    #[error("{name} = {value} is outside 0..=1")]
    FractionOutOfRange { name: &'static str, value: f64 },
    #[error("inter-region edge count {0} is above 3")]
    TooManyBridges(u32),
    #[error("cone angle {0} is outside (0, 360]")]
    InvalidConeAngle(f32),
    #[error("turn cap must be positive")]
    ZeroTurns,
    #[error("resource budget must be positive when set")]
    ZeroResourceBudget,
    #[error("batch must contain at least one run")]
    ZeroRuns,
}

/// Structural violation of the graph invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("graph has no regions")]
    NoRegions,
    #[error("node at index {index} has id {id}")]
    NodeIdGap { index: usize, id: NodeId },
    #[error("node {node} references missing region {region}")]
    UnknownRegion { node: NodeId, region: RegionId },
    #[error("region {0} has no nodes")]
    EmptyRegion(RegionId),
    #[error("expected exactly one {role} node, found {count}")]
    RoleCount { role: NodeRole, count: usize },
    #[error("edge {from}-{to} references a missing node")]
    DanglingEdge { from: NodeId, to: NodeId },
    #[error("self loop on node {0}")]
    SelfLoop(NodeId),
    #[error("edge {from}-{to} is not stored in canonical order")]
    NonCanonicalEdge { from: NodeId, to: NodeId },
    #[error("duplicate edge {from}-{to}")]
    DuplicateEdge { from: NodeId, to: NodeId },
}

/// Failure to build a level at all (as opposed to building one that fails
/// validation, which is reported through failure strings).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerateError {
    #[error("invalid configuration: {}", join_errors(.0))]
    Config(Vec<ConfigError>),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("graph has no {0} node")]
    MissingRole(NodeRole),
    #[error("invalid simulation configuration: {}", join_errors(.0))]
    Config(Vec<ConfigError>),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
