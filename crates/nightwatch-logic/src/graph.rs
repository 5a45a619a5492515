//! Level graph data model, adjacency and hop-distance queries.
//!
//! A [`Graph`] is the boundary format of the crate: it is what generation
//! produces, what the simulator reads and what snapshots store. Node ids are
//! dense (`0..nodes.len()`) so per-node data lives in plain `Vec`s indexed by
//! id. Edges are undirected and stored canonically with `from < to`.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backdoors::PlacementReport;
use crate::config::GenerationParams;
use crate::constants::generation::DIAGONAL_TOLERANCE;
use crate::error::GraphError;

pub type NodeId = u32;
pub type RegionId = u32;

// ── Geometry ────────────────────────────────────────────────────────────

/// Axis-aligned rectangle in map units, `x0 <= x1`, `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    /// Distance from a point inside the box to its nearest edge.
    pub fn edge_distance(&self, x: f32, y: f32) -> f32 {
        (x - self.x0)
            .abs()
            .min((self.x1 - x).abs())
            .min((y - self.y0).abs())
            .min((self.y1 - y).abs())
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

// ── Regions and nodes ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub row: u32,
    pub col: u32,
    /// Row letter plus 1-based column, e.g. "B1".
    pub label: String,
    pub bbox: BoundingBox,
    /// Representative point (the box centre).
    pub seed: (f32, f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NodeRole {
    #[default]
    Normal,
    Start,
    Goal,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeRole::Normal => "normal",
            NodeRole::Start => "start",
            NodeRole::Goal => "goal",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub x: f32,
    pub y: f32,
    pub region: RegionId,
    pub role: NodeRole,
}

impl Node {
    pub fn distance_to(&self, other: &Node) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}

// ── Edges ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Both endpoints in the same region.
    Intra,
    /// Bridge between grid-adjacent regions (also used by choke repair).
    Inter,
    /// Long-range shortcut placed by backdoor generation.
    Backdoor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
}

impl Edge {
    /// Canonical edge between `a` and `b`; `None` for a self loop.
    pub fn new(a: NodeId, b: NodeId, kind: EdgeKind) -> Option<Self> {
        if a == b {
            return None;
        }
        let (from, to) = edge_key(a, b);
        Some(Self { from, to, kind })
    }

    pub fn key(&self) -> (NodeId, NodeId) {
        (self.from, self.to)
    }

    pub fn is_backdoor(&self) -> bool {
        self.kind == EdgeKind::Backdoor
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

/// Order-independent key for an undirected pair.
pub fn edge_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// True when both axis offsets exceed the diagonal tolerance.
pub fn is_diagonal(a: &Node, b: &Node) -> bool {
    (a.x - b.x).abs() > DIAGONAL_TOLERANCE && (a.y - b.y).abs() > DIAGONAL_TOLERANCE
}

/// Insertion-ordered edge list that rejects self loops and duplicates.
#[derive(Debug, Clone, Default)]
pub struct EdgeSet {
    edges: Vec<Edge>,
    keys: HashSet<(NodeId, NodeId)>,
}

impl EdgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edge unless it is a self loop or the pair is already present.
    /// Returns whether the edge was added.
    pub fn insert(&mut self, a: NodeId, b: NodeId, kind: EdgeKind) -> bool {
        let Some(edge) = Edge::new(a, b, kind) else {
            return false;
        };
        if !self.keys.insert(edge.key()) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    pub fn contains(&self, a: NodeId, b: NodeId) -> bool {
        self.keys.contains(&edge_key(a, b))
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn as_slice(&self) -> &[Edge] {
        &self.edges
    }

    pub fn into_vec(self) -> Vec<Edge> {
        self.edges
    }
}

impl Extend<Edge> for EdgeSet {
    fn extend<I: IntoIterator<Item = Edge>>(&mut self, iter: I) {
        for edge in iter {
            self.insert(edge.from, edge.to, edge.kind);
        }
    }
}

// ── Graph ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMeta {
    pub total_nodes: u32,
    pub region_count: u32,
    pub start_region_label: String,
    pub goal_region_label: String,
    /// How the backdoor passes went when this graph was generated.
    pub placement: Option<PlacementReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub regions: Vec<Region>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub meta: GraphMeta,
    pub params: GenerationParams,
}

impl Graph {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id as usize)
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    fn node_with_role(&self, role: NodeRole) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.role == role).map(|n| n.id)
    }

    pub fn start_node(&self) -> Option<NodeId> {
        self.node_with_role(NodeRole::Start)
    }

    pub fn goal_node(&self) -> Option<NodeId> {
        self.node_with_role(NodeRole::Goal)
    }

    pub fn region_of(&self, id: NodeId) -> Option<RegionId> {
        self.node(id).map(|n| n.region)
    }

    pub fn nodes_in_region(&self, region: RegionId) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().filter(move |n| n.region == region)
    }

    pub fn backdoors(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(|e| e.is_backdoor())
    }

    /// Adjacency over every edge kind.
    pub fn adjacency(&self) -> Adjacency {
        Adjacency::from_edges(self.nodes.len(), &self.edges)
    }

    /// Adjacency over intra and inter edges only.
    pub fn base_adjacency(&self) -> Adjacency {
        Adjacency::from_edges(
            self.nodes.len(),
            self.edges.iter().filter(|e| !e.is_backdoor()),
        )
    }

    /// Check the structural invariants every graph must satisfy: dense ids,
    /// known regions, no empty region, exactly one start and one goal,
    /// canonical edges with no self loops, duplicates or dangling endpoints.
    pub fn check_invariants(&self) -> Result<(), GraphError> {
        if self.regions.is_empty() {
            return Err(GraphError::NoRegions);
        }

        let mut per_region: HashMap<RegionId, usize> =
            self.regions.iter().map(|r| (r.id, 0)).collect();
        for (index, node) in self.nodes.iter().enumerate() {
            if node.id as usize != index {
                return Err(GraphError::NodeIdGap { index, id: node.id });
            }
            match per_region.get_mut(&node.region) {
                Some(count) => *count += 1,
                None => {
                    return Err(GraphError::UnknownRegion {
                        node: node.id,
                        region: node.region,
                    })
                }
            }
        }
        if let Some(region) = self.regions.iter().find(|r| per_region[&r.id] == 0) {
            return Err(GraphError::EmptyRegion(region.id));
        }

        for role in [NodeRole::Start, NodeRole::Goal] {
            let count = self.nodes.iter().filter(|n| n.role == role).count();
            if count != 1 {
                return Err(GraphError::RoleCount { role, count });
            }
        }

        let mut seen = HashSet::with_capacity(self.edges.len());
        for edge in &self.edges {
            let (from, to) = (edge.from, edge.to);
            if from == to {
                return Err(GraphError::SelfLoop(from));
            }
            if from > to {
                return Err(GraphError::NonCanonicalEdge { from, to });
            }
            if to as usize >= self.nodes.len() {
                return Err(GraphError::DanglingEdge { from, to });
            }
            if !seen.insert(edge.key()) {
                return Err(GraphError::DuplicateEdge { from, to });
            }
        }

        Ok(())
    }

    pub fn summary(&self) -> GraphSummary {
        let mut summary = GraphSummary {
            nodes: self.nodes.len(),
            degree3_target_pct: self.params.degree3_pct,
            degree4_target_pct: self.params.degree4_pct,
            ..GraphSummary::default()
        };

        let mut diagonal = 0usize;
        for edge in &self.edges {
            match edge.kind {
                EdgeKind::Intra => summary.intra += 1,
                EdgeKind::Inter => summary.inter += 1,
                EdgeKind::Backdoor => summary.backdoor += 1,
            }
            if let (Some(a), Some(b)) = (self.node(edge.from), self.node(edge.to)) {
                if is_diagonal(a, b) {
                    diagonal += 1;
                }
            }
        }
        summary.diagonal_pct = percent(diagonal, self.edges.len());

        let adjacency = self.adjacency();
        for id in 0..self.nodes.len() as NodeId {
            *summary
                .degree_histogram
                .entry(adjacency.degree(id))
                .or_insert(0) += 1;
        }
        let degree3 = summary.degree_histogram.get(&3).copied().unwrap_or(0);
        let degree4_plus: usize = summary.degree_histogram.range(4..).map(|(_, c)| c).sum();
        summary.degree3_pct = percent(degree3, self.nodes.len());
        summary.degree4_plus_pct = percent(degree4_plus, self.nodes.len());

        summary
    }
}

fn percent(part: usize, whole: usize) -> f32 {
    if whole == 0 {
        0.0
    } else {
        part as f32 * 100.0 / whole as f32
    }
}

/// Edge mix and degree shape of a graph, compared against the degree targets
/// it was generated with. The targets are informational only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphSummary {
    pub nodes: usize,
    pub intra: usize,
    pub inter: usize,
    pub backdoor: usize,
    pub diagonal_pct: f32,
    /// degree → node count
    pub degree_histogram: BTreeMap<usize, usize>,
    pub degree3_pct: f32,
    pub degree4_plus_pct: f32,
    pub degree3_target_pct: f32,
    pub degree4_target_pct: f32,
}

// ── Adjacency ───────────────────────────────────────────────────────────

/// Neighbour lists indexed by node id, in edge insertion order.
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    neighbors: Vec<Vec<NodeId>>,
}

impl Adjacency {
    pub fn from_edges<'a>(node_count: usize, edges: impl IntoIterator<Item = &'a Edge>) -> Self {
        let mut neighbors = vec![Vec::new(); node_count];
        for edge in edges {
            let (a, b) = (edge.from as usize, edge.to as usize);
            if a >= node_count || b >= node_count || a == b {
                continue;
            }
            if !neighbors[a].contains(&edge.to) {
                neighbors[a].push(edge.to);
                neighbors[b].push(edge.from);
            }
        }
        Self { neighbors }
    }

    pub fn neighbors(&self, node: NodeId) -> &[NodeId] {
        self.neighbors
            .get(node as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn degree(&self, node: NodeId) -> usize {
        self.neighbors(node).len()
    }

    /// BFS hop distance from `source` to every node; `None` = unreachable.
    pub fn hop_distances(&self, source: NodeId) -> Vec<Option<u32>> {
        self.multi_source_distances([source])
    }

    /// BFS hop distance to the nearest of several sources.
    pub fn multi_source_distances(
        &self,
        sources: impl IntoIterator<Item = NodeId>,
    ) -> Vec<Option<u32>> {
        let mut dist = vec![None; self.neighbors.len()];
        let mut queue = VecDeque::new();
        for source in sources {
            if let Some(slot) = dist.get_mut(source as usize) {
                if slot.is_none() {
                    *slot = Some(0);
                    queue.push_back(source);
                }
            }
        }
        while let Some(current) = queue.pop_front() {
            let next = dist[current as usize].map_or(0, |d| d + 1);
            for &neighbor in self.neighbors(current) {
                let slot = &mut dist[neighbor as usize];
                if slot.is_none() {
                    *slot = Some(next);
                    queue.push_back(neighbor);
                }
            }
        }
        dist
    }

    /// Hop distance between two nodes, stopping as soon as `to` is reached.
    pub fn hop_distance(&self, from: NodeId, to: NodeId) -> Option<u32> {
        if from as usize >= self.neighbors.len() || to as usize >= self.neighbors.len() {
            return None;
        }
        if from == to {
            return Some(0);
        }
        let mut dist = vec![None; self.neighbors.len()];
        dist[from as usize] = Some(0u32);
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            let next = dist[current as usize].map_or(0, |d| d + 1);
            for &neighbor in self.neighbors(current) {
                if neighbor == to {
                    return Some(next);
                }
                if dist[neighbor as usize].is_none() {
                    dist[neighbor as usize] = Some(next);
                    queue.push_back(neighbor);
                }
            }
        }
        None
    }

    /// Nodes within `depth` hops of `source` with their hop count, BFS order.
    pub fn within_hops(&self, source: NodeId, depth: u32) -> Vec<(NodeId, u32)> {
        if source as usize >= self.neighbors.len() {
            return Vec::new();
        }
        let mut seen = HashSet::from([source]);
        let mut out = vec![(source, 0)];
        let mut cursor = 0;
        while cursor < out.len() {
            let (current, hops) = out[cursor];
            cursor += 1;
            if hops == depth {
                continue;
            }
            for &neighbor in self.neighbors(current) {
                if seen.insert(neighbor) {
                    out.push((neighbor, hops + 1));
                }
            }
        }
        out
    }
}

/// Memoised single-source BFS maps over a fixed adjacency.
///
/// Backdoor placement asks for hop counts between many pairs that share an
/// endpoint; each source is searched once.
pub struct HopCache<'a> {
    adjacency: &'a Adjacency,
    maps: HashMap<NodeId, Vec<Option<u32>>>,
}

impl<'a> HopCache<'a> {
    pub fn new(adjacency: &'a Adjacency) -> Self {
        Self {
            adjacency,
            maps: HashMap::new(),
        }
    }

    pub fn hops(&mut self, a: NodeId, b: NodeId) -> Option<u32> {
        if let Some(map) = self.maps.get(&b) {
            return map.get(a as usize).copied().flatten();
        }
        let adjacency = self.adjacency;
        self.maps
            .entry(a)
            .or_insert_with(|| adjacency.hop_distances(a))
            .get(b as usize)
            .copied()
            .flatten()
    }

    /// Number of sources searched so far.
    pub fn cached_sources(&self) -> usize {
        self.maps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(NodeId, NodeId)]) -> Vec<Edge> {
        pairs
            .iter()
            .filter_map(|&(a, b)| Edge::new(a, b, EdgeKind::Intra))
            .collect()
    }

    fn node(id: NodeId, x: f32, y: f32, region: RegionId, role: NodeRole) -> Node {
        Node {
            id,
            x,
            y,
            region,
            role,
        }
    }

    fn tiny_graph() -> Graph {
        let bbox = BoundingBox {
            x0: 0.0,
            y0: 0.0,
            x1: 100.0,
            y1: 100.0,
        };
        Graph {
            regions: vec![Region {
                id: 0,
                row: 0,
                col: 0,
                label: "A1".into(),
                bbox,
                seed: bbox.center(),
            }],
            nodes: vec![
                node(0, 10.0, 10.0, 0, NodeRole::Start),
                node(1, 50.0, 10.0, 0, NodeRole::Normal),
                node(2, 90.0, 90.0, 0, NodeRole::Goal),
            ],
            edges: vec![
                Edge::new(0, 1, EdgeKind::Intra).unwrap(),
                Edge::new(1, 2, EdgeKind::Intra).unwrap(),
            ],
            meta: GraphMeta {
                total_nodes: 3,
                region_count: 1,
                start_region_label: "A1".into(),
                goal_region_label: "A1".into(),
                placement: None,
            },
            params: GenerationParams::default(),
        }
    }

    #[test]
    fn edge_is_canonical() {
        let e = Edge::new(9, 4, EdgeKind::Inter).unwrap();
        assert_eq!(e.key(), (4, 9));
        assert!(Edge::new(3, 3, EdgeKind::Intra).is_none());
    }

    #[test]
    fn edge_set_dedups_both_orders() {
        let mut set = EdgeSet::new();
        assert!(set.insert(1, 2, EdgeKind::Intra));
        assert!(!set.insert(2, 1, EdgeKind::Backdoor));
        assert!(!set.insert(5, 5, EdgeKind::Intra));
        assert_eq!(set.len(), 1);
        assert!(set.contains(2, 1));
    }

    #[test]
    fn bfs_distances() {
        let adj = Adjacency::from_edges(5, &edges(&[(0, 1), (1, 2), (2, 3)]));
        let d = adj.hop_distances(0);
        assert_eq!(d, vec![Some(0), Some(1), Some(2), Some(3), None]);
        assert_eq!(adj.hop_distance(3, 0), Some(3));
        assert_eq!(adj.hop_distance(0, 4), None);
        assert_eq!(adj.hop_distance(2, 2), Some(0));
    }

    #[test]
    fn multi_source_takes_nearest() {
        let adj = Adjacency::from_edges(5, &edges(&[(0, 1), (1, 2), (2, 3), (3, 4)]));
        let d = adj.multi_source_distances([0, 4]);
        assert_eq!(d, vec![Some(0), Some(1), Some(2), Some(1), Some(0)]);
    }

    #[test]
    fn within_hops_respects_depth() {
        let adj = Adjacency::from_edges(5, &edges(&[(0, 1), (1, 2), (2, 3), (0, 4)]));
        let near: Vec<_> = adj.within_hops(0, 1);
        assert_eq!(near, vec![(0, 0), (1, 1), (4, 1)]);
        assert_eq!(adj.within_hops(0, 0), vec![(0, 0)]);
    }

    #[test]
    fn from_edges_skips_repeats_and_out_of_range() {
        let mut list = edges(&[(0, 1), (1, 2)]);
        list.extend(edges(&[(1, 0), (2, 7)]));
        let adj = Adjacency::from_edges(3, &list);
        assert_eq!(adj.neighbors(1), &[0, 2]);
        assert_eq!(adj.degree(2), 1);
        assert!(adj.neighbors(9).is_empty());
    }

    #[test]
    fn hop_cache_reuses_maps() {
        let adj = Adjacency::from_edges(4, &edges(&[(0, 1), (1, 2), (2, 3)]));
        let mut cache = HopCache::new(&adj);
        assert_eq!(cache.hops(0, 3), Some(3));
        assert_eq!(cache.hops(0, 2), Some(2));
        assert_eq!(cache.hops(3, 0), Some(3));
        assert_eq!(cache.cached_sources(), 1);
    }

    #[test]
    fn valid_graph_passes_invariants() {
        assert_eq!(tiny_graph().check_invariants(), Ok(()));
    }

    #[test]
    fn duplicate_edge_detected() {
        let mut g = tiny_graph();
        g.edges.push(Edge::new(1, 0, EdgeKind::Backdoor).unwrap());
        assert_eq!(
            g.check_invariants(),
            Err(GraphError::DuplicateEdge { from: 0, to: 1 })
        );
    }

    #[test]
    fn missing_goal_detected() {
        let mut g = tiny_graph();
        g.nodes[2].role = NodeRole::Normal;
        assert_eq!(
            g.check_invariants(),
            Err(GraphError::RoleCount {
                role: NodeRole::Goal,
                count: 0
            })
        );
    }

    #[test]
    fn dangling_edge_detected() {
        let mut g = tiny_graph();
        g.edges.push(Edge::new(1, 7, EdgeKind::Inter).unwrap());
        assert_eq!(
            g.check_invariants(),
            Err(GraphError::DanglingEdge { from: 1, to: 7 })
        );
    }

    #[test]
    fn summary_counts_kinds_and_degrees() {
        let mut g = tiny_graph();
        g.edges.push(Edge::new(0, 2, EdgeKind::Backdoor).unwrap());
        let s = g.summary();
        assert_eq!((s.intra, s.inter, s.backdoor), (2, 0, 1));
        assert_eq!(s.degree_histogram.get(&2), Some(&3));
        // 0-1 is axis-aligned, 1-2 and 0-2 are diagonal.
        assert!(s.diagonal_pct > 60.0);
    }

    #[test]
    fn diagonal_needs_both_axes() {
        let a = node(0, 0.0, 0.0, 0, NodeRole::Normal);
        let b = node(1, 30.0, 4.0, 0, NodeRole::Normal);
        let c = node(2, 30.0, 30.0, 0, NodeRole::Normal);
        assert!(!is_diagonal(&a, &b));
        assert!(is_diagonal(&a, &c));
    }
}
