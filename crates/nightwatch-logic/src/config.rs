//! Level, generation, simulation and batch configuration.
//!
//! Every struct has a `Default` built from [`crate::constants`] and a
//! `validate_*` function that returns every problem it finds.

use serde::{Deserialize, Serialize};

use crate::constants::{evaluation, generation, layout, simulation};
use crate::error::ConfigError;
use crate::graph::RegionId;

// ── Layout ──────────────────────────────────────────────────────────────

/// Region grid, map size and node placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub rows: u32,
    pub cols: u32,
    pub cell_size: f32,
    pub scale: f32,
    pub total_nodes: u32,
    pub start_region: RegionId,
    pub goal_region: RegionId,
    pub node_margin: f32,
    pub k_extra: usize,
    pub border_pad_fraction: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            rows: layout::REGION_ROWS,
            cols: layout::REGION_COLS,
            cell_size: layout::CELL_SIZE,
            scale: layout::SCALE,
            total_nodes: layout::TOTAL_NODES,
            start_region: layout::START_REGION,
            goal_region: layout::GOAL_REGION,
            node_margin: layout::NODE_MARGIN,
            k_extra: generation::K_EXTRA,
            border_pad_fraction: generation::BORDER_PAD_FRACTION,
        }
    }
}

impl LayoutConfig {
    pub fn region_count(&self) -> u32 {
        self.rows * self.cols
    }

    /// Side length of one region in map units.
    pub fn region_extent(&self) -> f32 {
        self.cell_size * self.scale
    }

    pub fn row_of(&self, region: RegionId) -> u32 {
        region / self.cols.max(1)
    }

    pub fn col_of(&self, region: RegionId) -> u32 {
        region % self.cols.max(1)
    }

    /// Manhattan grid distance between two regions.
    pub fn grid_distance(&self, a: RegionId, b: RegionId) -> u32 {
        self.row_of(a).abs_diff(self.row_of(b)) + self.col_of(a).abs_diff(self.col_of(b))
    }
}

pub fn validate_layout(config: &LayoutConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    if config.rows == 0 || config.cols == 0 {
        errors.push(ConfigError::EmptyGrid {
            rows: config.rows,
            cols: config.cols,
        });
        return errors;
    }
    let regions = config.region_count();
    if config.total_nodes < regions {
        errors.push(ConfigError::TooFewNodes {
            nodes: config.total_nodes,
            regions,
        });
    }
    for region in [config.start_region, config.goal_region] {
        if region >= regions {
            errors.push(ConfigError::RegionOutOfRange { region, regions });
        }
    }
    if config.start_region == config.goal_region {
        errors.push(ConfigError::StartIsGoal(config.start_region));
    }
    if config.cell_size <= 0.0 || config.scale <= 0.0 {
        errors.push(ConfigError::InvalidCellSize(config.cell_size * config.scale));
    } else if config.node_margin < 0.0 || config.node_margin * 2.0 >= config.region_extent() {
        errors.push(ConfigError::MarginTooLarge {
            margin: config.node_margin,
            extent: config.region_extent(),
        });
    }
    if !(0.0..=1.0).contains(&config.border_pad_fraction) {
        errors.push(ConfigError::FractionOutOfRange {
            name: "border_pad_fraction",
            value: config.border_pad_fraction as f64,
        });
    }

    errors
}

// ── Generation ──────────────────────────────────────────────────────────

/// Which forward pairs pass 1 of backdoor placement may reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ForwardRule {
    /// Any forward pair qualifies.
    #[default]
    Unrestricted,
    /// Reject pairs with both endpoints in the middle region row.
    ExcludeMiddleRow,
    /// As `ExcludeMiddleRow`, and one endpoint must sit in the last row.
    TowardLastRow,
}

impl ForwardRule {
    pub fn allows(self, row_a: u32, row_b: u32, rows: u32) -> bool {
        let middle = rows / 2;
        let both_middle = rows >= 3 && row_a == middle && row_b == middle;
        match self {
            ForwardRule::Unrestricted => true,
            ForwardRule::ExcludeMiddleRow => !both_middle,
            ForwardRule::TowardLastRow => {
                let last = rows.saturating_sub(1);
                !both_middle && (row_a == last || row_b == last)
            }
        }
    }
}

/// Caller-tunable generation parameters. Stored on the generated graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub backdoor_pct: f32,
    pub min_len: u32,
    pub max_len: u32,
    pub diagonal_bias_pct: f32,
    /// Bridges per adjacent region pair; 0 picks 1-3 at random.
    pub inter_region_edges: u32,
    pub degree3_pct: f32,
    pub degree4_pct: f32,
    pub forward_weight: f32,
    pub forward_rule: ForwardRule,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            backdoor_pct: generation::BACKDOOR_PCT,
            min_len: generation::MIN_LEN,
            max_len: generation::MAX_LEN,
            diagonal_bias_pct: generation::DIAGONAL_BIAS_PCT,
            inter_region_edges: generation::INTER_REGION_EDGES,
            degree3_pct: generation::DEGREE3_PCT,
            degree4_pct: generation::DEGREE4_PCT,
            forward_weight: generation::FORWARD_WEIGHT,
            forward_rule: ForwardRule::default(),
        }
    }
}

pub fn validate_params(params: &GenerationParams) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    if params.min_len == 0 || params.min_len > params.max_len {
        errors.push(ConfigError::InvalidHopWindow {
            min: params.min_len,
            max: params.max_len,
        });
    }
    for (name, value) in [
        ("backdoor_pct", params.backdoor_pct),
        ("diagonal_bias_pct", params.diagonal_bias_pct),
        ("degree3_pct", params.degree3_pct),
        ("degree4_pct", params.degree4_pct),
    ] {
        if !(0.0..=100.0).contains(&value) {
            errors.push(ConfigError::PercentOutOfRange { name, value });
        }
    }
    if params.inter_region_edges > 3 {
        errors.push(ConfigError::TooManyBridges(params.inter_region_edges));
    }
    if !(0.0..=1.0).contains(&params.forward_weight) {
        errors.push(ConfigError::FractionOutOfRange {
            name: "forward_weight",
            value: params.forward_weight as f64,
        });
    }

    errors
}

// ── Simulation ──────────────────────────────────────────────────────────

/// When a patrol catches the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaptureRule {
    /// Player and patrol occupy the same node after the patrol step.
    #[default]
    SameNode,
    /// Player stands anywhere inside a patrol's cone after the patrol step.
    Perceived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub max_turns: u32,
    pub cone_depth: u32,
    pub cone_angle: f32,
    pub alert_up_chance: f64,
    pub alert_down_chance: f64,
    pub alert_depth_threshold: u8,
    pub alert_depth_bonus: u32,
    pub spawn_chance: f64,
    pub min_spawn_from_player: u32,
    pub min_spawn_from_start: u32,
    pub patrol_weight: f32,
    pub goal_weight: f32,
    pub stay_penalty: f32,
    pub capture_rule: CaptureRule,
    /// Turns the player can afford; `None` disables the resource loss.
    pub resource_budget: Option<u32>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_turns: simulation::MAX_TURNS,
            cone_depth: simulation::CONE_DEPTH,
            cone_angle: simulation::CONE_ANGLE,
            alert_up_chance: simulation::ALERT_UP_CHANCE,
            alert_down_chance: simulation::ALERT_DOWN_CHANCE,
            alert_depth_threshold: simulation::ALERT_DEPTH_THRESHOLD,
            alert_depth_bonus: simulation::ALERT_DEPTH_BONUS,
            spawn_chance: simulation::SPAWN_CHANCE,
            min_spawn_from_player: simulation::MIN_SPAWN_FROM_PLAYER,
            min_spawn_from_start: simulation::MIN_SPAWN_FROM_START,
            patrol_weight: simulation::PATROL_WEIGHT,
            goal_weight: simulation::GOAL_WEIGHT,
            stay_penalty: simulation::STAY_PENALTY,
            capture_rule: CaptureRule::default(),
            resource_budget: None,
        }
    }
}

pub fn validate_sim(config: &SimConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    if config.max_turns == 0 {
        errors.push(ConfigError::ZeroTurns);
    }
    if !(config.cone_angle > 0.0 && config.cone_angle <= 360.0) {
        errors.push(ConfigError::InvalidConeAngle(config.cone_angle));
    }
    for (name, value) in [
        ("alert_up_chance", config.alert_up_chance),
        ("alert_down_chance", config.alert_down_chance),
        ("spawn_chance", config.spawn_chance),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ConfigError::FractionOutOfRange { name, value });
        }
    }
    if config.alert_up_chance + config.alert_down_chance > 1.0 {
        errors.push(ConfigError::FractionOutOfRange {
            name: "alert_up_chance + alert_down_chance",
            value: config.alert_up_chance + config.alert_down_chance,
        });
    }
    if config.resource_budget == Some(0) {
        errors.push(ConfigError::ZeroResourceBudget);
    }

    errors
}

// ── Evaluation ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalConfig {
    pub runs: u32,
    /// Master seed; run `i` uses a seed derived from this and `i`.
    pub seed: u64,
    pub victory_turn_threshold: u32,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            runs: evaluation::DEFAULT_RUNS,
            seed: evaluation::DEFAULT_SEED,
            victory_turn_threshold: evaluation::VICTORY_TURN_THRESHOLD,
        }
    }
}
