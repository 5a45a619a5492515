//! Patrol perception: heading, vision cone and the per-node control map.
//!
//! A cone is the set of nodes within `depth` BFS hops of the patrol whose
//! direction from the patrol lies within `angle / 2` of its heading. The
//! patrol's own node is always inside its cone.

use std::collections::{BTreeMap, BTreeSet};

use crate::graph::{Adjacency, Graph, NodeId};
use crate::patrol::Patrol;

/// Unit facing vector in map coordinates (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Heading {
    pub x: f32,
    pub y: f32,
}

impl Heading {
    /// Facing "up" the map; used when a patrol has nowhere to look.
    pub const DEFAULT: Heading = Heading { x: 0.0, y: -1.0 };

    /// Normalised direction from `from` to `to`, or `None` if they coincide.
    pub fn between(from: (f32, f32), to: (f32, f32)) -> Option<Heading> {
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let len = dx.hypot(dy);
        if len <= f32::EPSILON {
            return None;
        }
        Some(Heading {
            x: dx / len,
            y: dy / len,
        })
    }
}

/// Heading from the previous node, else toward the first neighbour, else
/// [`Heading::DEFAULT`].
pub fn heading(graph: &Graph, adjacency: &Adjacency, node: NodeId, prev: Option<NodeId>) -> Heading {
    let Some(here) = graph.node(node).map(|n| n.position()) else {
        return Heading::DEFAULT;
    };
    let from_prev = prev
        .and_then(|p| graph.node(p))
        .and_then(|p| Heading::between(p.position(), here));
    let from_neighbor = || {
        adjacency
            .neighbors(node)
            .first()
            .and_then(|&n| graph.node(n))
            .and_then(|n| Heading::between(here, n.position()))
    };
    from_prev.or_else(from_neighbor).unwrap_or(Heading::DEFAULT)
}

/// Whether `target` lies within `angle_deg / 2` of `heading` as seen from
/// `origin`. A target at the origin is always inside.
pub fn in_cone(origin: (f32, f32), heading: Heading, target: (f32, f32), angle_deg: f32) -> bool {
    let Some(dir) = Heading::between(origin, target) else {
        return true;
    };
    let dot = (dir.x * heading.x + dir.y * heading.y).clamp(-1.0, 1.0);
    dot.acos().to_degrees() <= angle_deg / 2.0
}

/// Nodes a viewer at `node` facing `heading` can see.
pub fn cone_nodes(
    graph: &Graph,
    adjacency: &Adjacency,
    node: NodeId,
    heading: Heading,
    depth: u32,
    angle_deg: f32,
) -> Vec<NodeId> {
    let Some(origin) = graph.node(node).map(|n| n.position()) else {
        return Vec::new();
    };
    adjacency
        .within_hops(node, depth)
        .into_iter()
        .filter(|&(id, hops)| {
            hops == 0
                || graph
                    .node(id)
                    .is_some_and(|n| in_cone(origin, heading, n.position(), angle_deg))
        })
        .map(|(id, _)| id)
        .collect()
}

/// A patrol's current cone, with `depth_bonus` extra hops of reach.
pub fn perceived_nodes(
    graph: &Graph,
    adjacency: &Adjacency,
    patrol: &Patrol,
    depth_bonus: u32,
) -> Vec<NodeId> {
    let facing = heading(graph, adjacency, patrol.node, patrol.prev);
    cone_nodes(
        graph,
        adjacency,
        patrol.node,
        facing,
        patrol.depth + depth_bonus,
        patrol.angle,
    )
}

/// Which nodes the patrols currently watch and where they are heading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlMap {
    /// node → number of cones covering it
    pub coverage: BTreeMap<NodeId, usize>,
    pub intents: BTreeSet<NodeId>,
}

impl ControlMap {
    pub fn is_watched(&self, node: NodeId) -> bool {
        self.coverage.contains_key(&node)
    }
}

pub fn control_map(graph: &Graph, adjacency: &Adjacency, patrols: &[Patrol]) -> ControlMap {
    let mut map = ControlMap::default();
    for patrol in patrols {
        for node in perceived_nodes(graph, adjacency, patrol, 0) {
            *map.coverage.entry(node).or_insert(0) += 1;
        }
        if let Some(intent) = patrol.intent {
            map.intents.insert(intent);
        }
    }
    map
}
