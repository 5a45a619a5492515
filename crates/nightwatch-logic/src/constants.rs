//! Level constants: grid layout, generation defaults, patrol and player tuning.
//!
//! These feed the `Default` impls in [`crate::config`]. Anything a caller may
//! want to vary per level lives on a config struct; the values here are the
//! shipped defaults.

/// Region grid and node placement.
pub mod layout {
    pub const TOTAL_NODES: u32 = 150;
    pub const REGION_ROWS: u32 = 3;
    pub const REGION_COLS: u32 = 3;
    /// Row-major region index of the player's start region (B1).
    pub const START_REGION: u32 = 3;
    /// Row-major region index of the goal region (B3).
    pub const GOAL_REGION: u32 = 5;
    pub const CELL_SIZE: f32 = 160.0;
    pub const SCALE: f32 = 1.25;
    /// Inset from every region edge inside which nodes are laid out.
    pub const NODE_MARGIN: f32 = 12.0;
    /// Jitter is `JITTER_FRACTION * spacing`, capped at `MAX_JITTER` map units.
    pub const JITTER_FRACTION: f32 = 0.05;
    pub const MAX_JITTER: f32 = 2.0;
}

/// Edge and backdoor generation.
pub mod generation {
    pub const BACKDOOR_PCT: f32 = 8.0;
    pub const MIN_LEN: u32 = 3;
    pub const MAX_LEN: u32 = 6;
    pub const DIAGONAL_BIAS_PCT: f32 = 70.0;
    /// 0 = pick 1 (50%), 2 (25%) or 3 (25%) bridges per adjacent region pair.
    pub const INTER_REGION_EDGES: u32 = 0;
    pub const DEGREE3_PCT: f32 = 30.0;
    pub const DEGREE4_PCT: f32 = 15.0;
    /// Extra nearest-neighbour edges per node on top of the spanning tree.
    pub const K_EXTRA: usize = 2;
    /// Both |dx| and |dy| must exceed this for an edge to count as diagonal.
    pub const DIAGONAL_TOLERANCE: f32 = 5.0;
    /// Axis-aligned edges cost up to this much extra at 100% diagonal bias.
    pub const AXIS_PENALTY: f32 = 0.5;
    /// Border band width as a fraction of the region's half-extent.
    pub const BORDER_PAD_FRACTION: f32 = 0.4;
    /// Share of the backdoor target reserved for forward pairs in pass 1.
    pub const FORWARD_WEIGHT: f32 = 0.5;
    /// Allowed deviation of the forward/lateral split from 50/50, in percent.
    pub const BALANCE_TOLERANCE_PCT: u32 = 10;
    pub const MAX_ATTEMPTS: u32 = 30;
}

/// Choke-point repair.
pub mod repair {
    pub const CHOKE_LIMIT: usize = 2;
    pub const ATTEMPT_BUDGET: u32 = 200;
    /// Random picks are drawn from this many shortest candidate edges.
    pub const CANDIDATE_POOL: usize = 60;
}

/// Turn simulation and patrol AI.
pub mod simulation {
    pub const MAX_TURNS: u32 = 150;
    pub const CONE_DEPTH: u32 = 2;
    pub const CONE_ANGLE: f32 = 80.0;
    pub const ALERT_MIN: u8 = 1;
    pub const ALERT_MAX: u8 = 5;
    pub const ALERT_UP_CHANCE: f64 = 0.10;
    pub const ALERT_DOWN_CHANCE: f64 = 0.05;
    /// At or above this alert level every cone reaches one hop further.
    pub const ALERT_DEPTH_THRESHOLD: u8 = 4;
    pub const ALERT_DEPTH_BONUS: u32 = 1;
    /// Per-region chance of a new patrol when alert rises.
    pub const SPAWN_CHANCE: f64 = 0.12;
    pub const MIN_SPAWN_FROM_PLAYER: u32 = 2;
    pub const MIN_SPAWN_FROM_START: u32 = 6;
    pub const PATROL_WEIGHT: f32 = 0.6;
    pub const GOAL_WEIGHT: f32 = 1.0;
    pub const STAY_PENALTY: f32 = 0.0;
    /// Stand-in hop count for unreachable nodes in player scoring.
    pub const UNREACHABLE_HOPS: u32 = 999;
}

/// Batch evaluation.
pub mod evaluation {
    pub const DEFAULT_RUNS: u32 = 100;
    pub const DEFAULT_SEED: u64 = 42;
    /// Victories at or under this many turns count as "quick".
    pub const VICTORY_TURN_THRESHOLD: u32 = 80;
}
