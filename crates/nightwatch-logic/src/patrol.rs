//! Patrol records and the roster that spawns, despawns and moves them.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::graph::{Adjacency, Graph, NodeId};
use crate::perception::perceived_nodes;

/// A single patrol. Heading is derived from `prev`; `intent` is the node it
/// last saw the player on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patrol {
    pub id: u32,
    pub node: NodeId,
    pub prev: Option<NodeId>,
    pub depth: u32,
    pub angle: f32,
    pub intent: Option<NodeId>,
}

/// Immutable per-turn view of a patrol, as stored in simulation traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatrolSnapshot {
    pub id: u32,
    pub node: NodeId,
    pub prev: Option<NodeId>,
    pub intent: Option<NodeId>,
}

impl From<&Patrol> for PatrolSnapshot {
    fn from(p: &Patrol) -> Self {
        Self {
            id: p.id,
            node: p.node,
            prev: p.prev,
            intent: p.intent,
        }
    }
}

/// All live patrols in one simulation run.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    patrols: Vec<Patrol>,
    next_id: u32,
}

impl Roster {
    /// One patrol per region, on a random node at least
    /// `min_spawn_from_start` hops from the start (any node in the region if
    /// none is that far).
    pub fn initial(
        graph: &Graph,
        start_dist: &[Option<u32>],
        config: &SimConfig,
        rng: &mut impl Rng,
    ) -> Self {
        let mut roster = Roster::default();
        for region in &graph.regions {
            if let Some(node) =
                pick_node(graph, region.id, start_dist, config.min_spawn_from_start, rng)
            {
                roster.spawn(node, config);
            }
        }
        roster
    }

    pub fn patrols(&self) -> &[Patrol] {
        &self.patrols
    }

    pub fn len(&self) -> usize {
        self.patrols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patrols.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.patrols.iter().map(|p| p.node)
    }

    pub fn snapshots(&self) -> Vec<PatrolSnapshot> {
        self.patrols.iter().map(PatrolSnapshot::from).collect()
    }

    pub fn spawn(&mut self, node: NodeId, config: &SimConfig) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.patrols.push(Patrol {
            id,
            node,
            prev: None,
            depth: config.cone_depth,
            angle: config.cone_angle,
            intent: None,
        });
        id
    }

    /// Alert went up: each region independently rolls `spawn_chance` for a
    /// new patrol at least `min_spawn_from_player` hops from the player.
    /// Returns how many spawned.
    pub fn spawn_wave(
        &mut self,
        graph: &Graph,
        player_dist: &[Option<u32>],
        config: &SimConfig,
        rng: &mut impl Rng,
    ) -> usize {
        let mut spawned = 0;
        for region in &graph.regions {
            if !rng.gen_bool(config.spawn_chance) {
                continue;
            }
            if let Some(node) =
                pick_node(graph, region.id, player_dist, config.min_spawn_from_player, rng)
            {
                self.spawn(node, config);
                spawned += 1;
            }
        }
        spawned
    }

    /// Alert went down: remove the patrol hop-closest to the player. Ties go
    /// to the oldest patrol.
    pub fn despawn_nearest(&mut self, player_dist: &[Option<u32>]) -> Option<Patrol> {
        let index = self
            .patrols
            .iter()
            .enumerate()
            .min_by_key(|(i, p)| (hops_or_max(player_dist, p.node), *i))
            .map(|(i, _)| i)?;
        Some(self.patrols.remove(index))
    }

    /// One patrol step: look, update intent, then move one hop toward the
    /// intent or to a random neighbour.
    pub fn advance(
        &mut self,
        graph: &Graph,
        adjacency: &Adjacency,
        player: NodeId,
        depth_bonus: u32,
        rng: &mut impl Rng,
    ) {
        for patrol in &mut self.patrols {
            if perceived_nodes(graph, adjacency, patrol, depth_bonus).contains(&player) {
                patrol.intent = Some(player);
            }
            if patrol.intent == Some(patrol.node) {
                patrol.intent = None;
            }

            let next = match patrol.intent {
                Some(target) => step_toward(adjacency, patrol.node, target),
                None => None,
            }
            .or_else(|| adjacency.neighbors(patrol.node).choose(rng).copied());

            if let Some(next) = next {
                patrol.prev = Some(patrol.node);
                patrol.node = next;
            }
        }
    }
}

fn hops_or_max(dist: &[Option<u32>], node: NodeId) -> u32 {
    dist.get(node as usize).copied().flatten().unwrap_or(u32::MAX)
}

/// Random node of `region` at least `min_hops` from the distance map's
/// source; unreachable nodes count as far. Falls back to any node of the
/// region.
fn pick_node(
    graph: &Graph,
    region: u32,
    dist: &[Option<u32>],
    min_hops: u32,
    rng: &mut impl Rng,
) -> Option<NodeId> {
    let members: Vec<NodeId> = graph.nodes_in_region(region).map(|n| n.id).collect();
    let far: Vec<NodeId> = members
        .iter()
        .copied()
        .filter(|&n| hops_or_max(dist, n) >= min_hops)
        .collect();
    if far.is_empty() {
        members.choose(rng).copied()
    } else {
        far.choose(rng).copied()
    }
}

/// Neighbour of `from` on a shortest path to `target`. First neighbour wins
/// ties; `None` when `target` is unreachable.
fn step_toward(adjacency: &Adjacency, from: NodeId, target: NodeId) -> Option<NodeId> {
    let dist = adjacency.hop_distances(target);
    adjacency
        .neighbors(from)
        .iter()
        .filter_map(|&n| dist[n as usize].map(|d| (d, n)))
        .min_by_key(|&(d, _)| d)
        .map(|(_, n)| n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationParams;
    use crate::graph::{BoundingBox, Edge, EdgeKind, GraphMeta, Node, NodeRole, Region};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Two regions of four nodes each, chained 0-1-2-3-4-5-6-7 along x.
    fn line_graph() -> Graph {
        let regions: Vec<Region> = (0..2)
            .map(|i| {
                let bbox = BoundingBox {
                    x0: i as f32 * 100.0,
                    y0: 0.0,
                    x1: (i + 1) as f32 * 100.0,
                    y1: 100.0,
                };
                Region {
                    id: i,
                    row: 0,
                    col: i,
                    label: format!("A{}", i + 1),
                    bbox,
                    seed: bbox.center(),
                }
            })
            .collect();
        let nodes = (0..8)
            .map(|i| Node {
                id: i,
                x: 12.5 + 25.0 * i as f32,
                y: 50.0,
                region: i / 4,
                role: match i {
                    0 => NodeRole::Start,
                    7 => NodeRole::Goal,
                    _ => NodeRole::Normal,
                },
            })
            .collect();
        let edges = (0..7)
            .filter_map(|i| {
                let kind = if i == 3 { EdgeKind::Inter } else { EdgeKind::Intra };
                Edge::new(i, i + 1, kind)
            })
            .collect();
        Graph {
            regions,
            nodes,
            edges,
            meta: GraphMeta {
                total_nodes: 8,
                region_count: 2,
                start_region_label: "A1".into(),
                goal_region_label: "A2".into(),
                placement: None,
            },
            params: GenerationParams::default(),
        }
    }

    #[test]
    fn initial_patrols_keep_distance_from_start() {
        let g = line_graph();
        let adj = g.adjacency();
        let start_dist = adj.hop_distances(0);
        let config = SimConfig {
            min_spawn_from_start: 5,
            ..SimConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(42);
        let roster = Roster::initial(&g, &start_dist, &config, &mut rng);

        assert_eq!(roster.len(), 2);
        // region 0 has nothing 5 hops out, so it falls back to any node
        assert!(roster.patrols()[0].node < 4);
        assert!(roster.patrols()[1].node >= 5);
        assert_eq!(roster.patrols()[1].depth, config.cone_depth);
    }

    #[test]
    fn despawn_removes_closest() {
        let g = line_graph();
        let adj = g.adjacency();
        let config = SimConfig::default();
        let mut roster = Roster::default();
        roster.spawn(7, &config);
        roster.spawn(2, &config);
        roster.spawn(5, &config);
        let removed = roster.despawn_nearest(&adj.hop_distances(3)).unwrap();
        assert_eq!(removed.node, 2);
        assert_eq!(roster.positions().collect::<Vec<_>>(), vec![7, 5]);
        assert!(Roster::default().despawn_nearest(&[]).is_none());
    }

    #[test]
    fn spawn_wave_stays_away_from_player() {
        let g = line_graph();
        let adj = g.adjacency();
        let config = SimConfig {
            spawn_chance: 1.0,
            ..SimConfig::default()
        };
        let player_dist = adj.hop_distances(4);
        let mut rng = StdRng::seed_from_u64(3);
        let mut roster = Roster::default();
        assert_eq!(roster.spawn_wave(&g, &player_dist, &config, &mut rng), 2);
        for p in roster.patrols() {
            assert!(player_dist[p.node as usize].unwrap() >= 2, "spawned on {}", p.node);
        }
        let ids: Vec<_> = roster.patrols().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn patrol_chases_seen_player() {
        let g = line_graph();
        let adj = g.adjacency();
        let config = SimConfig::default();
        let mut roster = Roster::default();
        roster.spawn(5, &config);
        roster.patrols[0].prev = Some(6); // facing west, toward lower ids
        let mut rng = StdRng::seed_from_u64(1);

        roster.advance(&g, &adj, 3, 0, &mut rng);
        let p = &roster.patrols()[0];
        assert_eq!(p.intent, Some(3));
        assert_eq!((p.node, p.prev), (4, Some(5)));

        // player slips away out of sight; the patrol keeps heading for 3
        roster.advance(&g, &adj, 0, 0, &mut rng);
        assert_eq!(roster.patrols()[0].node, 3);
        // intent reached: it is dropped and the patrol wanders
        roster.advance(&g, &adj, 0, 0, &mut rng);
        assert_ne!(roster.patrols()[0].intent, Some(3));
    }

    #[test]
    fn patrol_wanders_to_a_neighbour() {
        let g = line_graph();
        let adj = g.adjacency();
        let config = SimConfig::default();
        let mut roster = Roster::default();
        roster.spawn(4, &config);
        let mut rng = StdRng::seed_from_u64(9);
        // player far behind, out of the cone
        roster.advance(&g, &adj, 0, 0, &mut rng);
        let p = &roster.patrols()[0];
        assert!(p.node == 3 || p.node == 5);
        assert_eq!(p.prev, Some(4));
    }

    #[test]
    fn snapshot_copies_position_and_intent() {
        let config = SimConfig::default();
        let mut roster = Roster::default();
        roster.spawn(2, &config);
        roster.patrols[0].intent = Some(6);
        assert_eq!(
            roster.snapshots(),
            vec![PatrolSnapshot {
                id: 0,
                node: 2,
                prev: None,
                intent: Some(6)
            }]
        );
    }
}
