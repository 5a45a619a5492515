//! Turn-based infiltration run: a greedy player against alert-driven patrols.
//!
//! Each turn, in order:
//!
//! 1. the player moves (or stays),
//! 2. the alert level is rolled; a rise may spawn patrols, a drop removes
//!    the patrol nearest the player,
//! 3. every patrol looks and moves,
//! 4. the run ends on capture, victory, resource depletion or the turn cap.
//!
//! The graph is only borrowed; all per-run state is owned by [`Simulation`].

use std::collections::HashSet;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{validate_sim, CaptureRule, SimConfig};
use crate::constants::simulation::{ALERT_MAX, ALERT_MIN, UNREACHABLE_HOPS};
use crate::error::SimulationError;
use crate::graph::{Adjacency, Graph, NodeId, NodeRole};
use crate::patrol::{PatrolSnapshot, Roster};
use crate::perception::perceived_nodes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Victory,
    Captured,
    ResourceDepleted,
    Timeout,
}

/// Snapshot of one turn, after every actor has moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub turn: u32,
    pub player: NodeId,
    pub patrols: Vec<PatrolSnapshot>,
    pub alert: u8,
    pub resources_left: Option<u32>,
    /// Set only on the final state of a run.
    pub outcome: Option<Outcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRun {
    pub outcome: Outcome,
    pub turns: u32,
    /// Distinct nodes the player stood on, start included.
    pub visited: usize,
    /// Turn 0 (initial placement) through the final turn.
    pub trace: Vec<SimulationState>,
}

/// Roll the alert level: up one with `alert_up_chance`, else down one with
/// `alert_down_chance`, clamped to 1..=5.
pub fn roll_alert(alert: u8, config: &SimConfig, rng: &mut impl Rng) -> u8 {
    let r: f64 = rng.gen();
    if r < config.alert_up_chance {
        (alert + 1).min(ALERT_MAX)
    } else if r < config.alert_up_chance + config.alert_down_chance {
        alert.saturating_sub(1).max(ALERT_MIN)
    } else {
        alert
    }
}

/// Greedy player step over neighbours plus staying put:
/// `patrol_hops * patrol_weight - goal_hops * goal_weight`, highest wins,
/// earlier options win ties. Unreachable counts as `UNREACHABLE_HOPS`.
pub fn choose_player_move(
    adjacency: &Adjacency,
    player: NodeId,
    goal_dist: &[Option<u32>],
    patrol_dist: &[Option<u32>],
    config: &SimConfig,
) -> NodeId {
    let hops = |dist: &[Option<u32>], n: NodeId| {
        dist.get(n as usize)
            .copied()
            .flatten()
            .unwrap_or(UNREACHABLE_HOPS) as f32
    };
    let neighbors = adjacency.neighbors(player);
    let score = |n: NodeId| {
        let mut s = hops(patrol_dist, n) * config.patrol_weight
            - hops(goal_dist, n) * config.goal_weight;
        if n == player && !neighbors.is_empty() {
            s -= config.stay_penalty;
        }
        s
    };

    let mut best = (player, f32::NEG_INFINITY);
    for option in neighbors.iter().copied().chain(std::iter::once(player)) {
        let s = score(option);
        if s > best.1 {
            best = (option, s);
        }
    }
    best.0
}

pub struct Simulation<'g> {
    graph: &'g Graph,
    config: &'g SimConfig,
    adjacency: Adjacency,
    goal: NodeId,
    goal_dist: Vec<Option<u32>>,
    player: NodeId,
    alert: u8,
    turn: u32,
    resources_left: Option<u32>,
    roster: Roster,
    visited: HashSet<NodeId>,
    outcome: Option<Outcome>,
}

impl<'g> Simulation<'g> {
    /// Place the player on the start node and seed the initial patrols.
    pub fn new(
        graph: &'g Graph,
        config: &'g SimConfig,
        rng: &mut impl Rng,
    ) -> Result<Self, SimulationError> {
        let errors = validate_sim(config);
        if !errors.is_empty() {
            return Err(SimulationError::Config(errors));
        }
        let start = graph
            .start_node()
            .ok_or(SimulationError::MissingRole(NodeRole::Start))?;
        let goal = graph
            .goal_node()
            .ok_or(SimulationError::MissingRole(NodeRole::Goal))?;
        graph.check_invariants()?;

        let adjacency = graph.adjacency();
        let goal_dist = adjacency.hop_distances(goal);
        let start_dist = adjacency.hop_distances(start);
        let roster = Roster::initial(graph, &start_dist, config, rng);

        Ok(Self {
            graph,
            config,
            adjacency,
            goal,
            goal_dist,
            player: start,
            alert: ALERT_MIN,
            turn: 0,
            resources_left: config.resource_budget,
            roster,
            visited: HashSet::from([start]),
            outcome: None,
        })
    }

    pub fn player(&self) -> NodeId {
        self.player
    }

    pub fn alert(&self) -> u8 {
        self.alert
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn state(&self) -> SimulationState {
        SimulationState {
            turn: self.turn,
            player: self.player,
            patrols: self.roster.snapshots(),
            alert: self.alert,
            resources_left: self.resources_left,
            outcome: self.outcome,
        }
    }

    fn depth_bonus(&self) -> u32 {
        if self.alert >= self.config.alert_depth_threshold {
            self.config.alert_depth_bonus
        } else {
            0
        }
    }

    fn is_captured(&self) -> bool {
        match self.config.capture_rule {
            CaptureRule::SameNode => self.roster.positions().any(|p| p == self.player),
            CaptureRule::Perceived => {
                let bonus = self.depth_bonus();
                self.roster.patrols().iter().any(|p| {
                    perceived_nodes(self.graph, &self.adjacency, p, bonus).contains(&self.player)
                })
            }
        }
    }

    /// Play one turn. Returns the outcome if the run ended this turn; a
    /// finished run does not advance further.
    pub fn step(&mut self, rng: &mut impl Rng) -> Option<Outcome> {
        if self.outcome.is_some() {
            return self.outcome;
        }
        self.turn += 1;

        let patrol_dist = self
            .adjacency
            .multi_source_distances(self.roster.positions());
        self.player = choose_player_move(
            &self.adjacency,
            self.player,
            &self.goal_dist,
            &patrol_dist,
            self.config,
        );
        self.visited.insert(self.player);

        let before = self.alert;
        self.alert = roll_alert(before, self.config, rng);
        if self.alert != before {
            let player_dist = self.adjacency.hop_distances(self.player);
            if self.alert > before {
                let spawned = self
                    .roster
                    .spawn_wave(self.graph, &player_dist, self.config, rng);
                log::trace!("turn {}: alert {} (+{} patrols)", self.turn, self.alert, spawned);
            } else {
                self.roster.despawn_nearest(&player_dist);
                log::trace!("turn {}: alert {} (-1 patrol)", self.turn, self.alert);
            }
        }

        let bonus = self.depth_bonus();
        self.roster
            .advance(self.graph, &self.adjacency, self.player, bonus, rng);

        if let Some(left) = self.resources_left.as_mut() {
            *left = left.saturating_sub(1);
        }

        self.outcome = if self.is_captured() {
            Some(Outcome::Captured)
        } else if self.player == self.goal {
            Some(Outcome::Victory)
        } else if self.resources_left == Some(0) {
            Some(Outcome::ResourceDepleted)
        } else if self.turn >= self.config.max_turns {
            Some(Outcome::Timeout)
        } else {
            None
        };
        self.outcome
    }

    /// Play to the end, recording every turn.
    pub fn run(mut self, rng: &mut impl Rng) -> SimulationRun {
        let mut trace = vec![self.state()];
        let outcome = loop {
            let ended = self.step(rng);
            trace.push(self.state());
            if let Some(outcome) = ended {
                break outcome;
            }
        };
        SimulationRun {
            outcome,
            turns: self.turn,
            visited: self.visited.len(),
            trace,
        }
    }
}

/// Run one full simulation over `graph`.
pub fn simulate(
    graph: &Graph,
    config: &SimConfig,
    rng: &mut impl Rng,
) -> Result<SimulationRun, SimulationError> {
    let run = Simulation::new(graph, config, rng)?.run(rng);
    log::debug!(
        "simulation: {:?} after {} turns, {} nodes visited",
        run.outcome,
        run.turns,
        run.visited
    );
    Ok(run)
}
