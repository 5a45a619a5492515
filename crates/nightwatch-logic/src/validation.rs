//! Level validation and choke-point repair.
//!
//! Validation never errors: every broken rule becomes a human-readable
//! failure string, and a graph is accepted only when the list is empty.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::backdoors::{classify, BackdoorClass};
use crate::config::LayoutConfig;
use crate::constants::generation::BALANCE_TOLERANCE_PCT;
use crate::constants::repair::CANDIDATE_POOL;
use crate::graph::{edge_key, Adjacency, Edge, EdgeKind, Graph, NodeId};

// ── Backdoor checks ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub total: usize,
    pub forward: usize,
    pub lateral: usize,
    pub forward_pct: f32,
    pub lateral_pct: f32,
    /// Mean backdoor-free hop length over connected backdoors.
    pub avg_hops: f32,
    /// Distinct unordered region pairs joined by backdoors.
    pub variety: usize,
    pub score: f32,
    pub failures: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }
}

pub fn check_validity(
    graph: &Graph,
    layout: &LayoutConfig,
    min_len: u32,
    max_len: u32,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    let backdoors: Vec<&Edge> = graph.backdoors().collect();
    report.total = backdoors.len();

    if backdoors.is_empty() {
        report.failures.push("No backdoors generated".into());
        return report;
    }

    let base = graph.base_adjacency();
    let mut pairs = HashSet::new();
    let mut hop_sum = 0u32;
    for edge in &backdoors {
        let (Some(a), Some(b)) = (graph.node(edge.from), graph.node(edge.to)) else {
            report
                .failures
                .push(format!("Missing node for backdoor: {}", edge));
            continue;
        };

        if a.region == layout.start_region || b.region == layout.start_region {
            report
                .failures
                .push(format!("Backdoor endpoint in start region: {}", edge));
        }
        match classify(layout, a.region, b.region) {
            BackdoorClass::Forward => report.forward += 1,
            BackdoorClass::Lateral => report.lateral += 1,
        }
        pairs.insert(edge_key(a.region, b.region));

        match base.hop_distance(edge.from, edge.to) {
            None => report
                .failures
                .push(format!("Backdoor disconnected: {}", edge)),
            Some(hops) => {
                hop_sum += hops;
                if hops < min_len {
                    report
                        .failures
                        .push(format!("Backdoor shorter than min: hops={} {}", hops, edge));
                } else if hops > max_len {
                    report
                        .failures
                        .push(format!("Backdoor longer than max: hops={} {}", hops, edge));
                }
            }
        }
    }

    let total = report.total as f32;
    report.forward_pct = (report.forward as f32 * 100.0 / total).round();
    report.lateral_pct = (report.lateral as f32 * 100.0 / total).round();
    if (report.forward_pct - 50.0).abs() > BALANCE_TOLERANCE_PCT as f32 {
        report.failures.push(format!(
            "Forward/Lateral split out of ±{}%: forward {}% lateral {}%",
            BALANCE_TOLERANCE_PCT, report.forward_pct, report.lateral_pct
        ));
    }

    report.avg_hops = hop_sum as f32 / total;
    report.variety = pairs.len();
    let avg_in_window = report.avg_hops >= min_len as f32 && report.avg_hops <= max_len as f32;
    report.score = total * 0.4
        + report.variety as f32 * 0.3
        + if avg_in_window { 0.3 } else { 0.0 };

    report
}

/// Drop backdoors whose backdoor-free hop distance is outside the window.
/// Returns how many were removed.
pub fn prune_backdoors_by_hop(graph: &mut Graph, min_len: u32, max_len: u32) -> usize {
    let base = graph.base_adjacency();
    let before = graph.edges.len();
    graph.edges.retain(|e| {
        !e.is_backdoor()
            || base
                .hop_distance(e.from, e.to)
                .is_some_and(|h| h >= min_len && h <= max_len)
    });
    let removed = before - graph.edges.len();
    if removed > 0 {
        log::debug!("pruned {} backdoors outside [{}, {}]", removed, min_len, max_len);
    }
    removed
}

// ── Articulation points ─────────────────────────────────────────────────

/// Cut vertices of the undirected graph, ascending by id.
///
/// Iterative Tarjan: an explicit stack of `(node, next neighbour index)`
/// frames replaces recursion, so deep graphs cannot overflow the call stack.
pub fn find_articulation_points(node_count: usize, edges: &[Edge]) -> Vec<NodeId> {
    let adjacency = Adjacency::from_edges(node_count, edges);
    let mut disc = vec![0u32; node_count];
    let mut low = vec![0u32; node_count];
    let mut parent: Vec<Option<NodeId>> = vec![None; node_count];
    let mut is_cut = vec![false; node_count];
    let mut timer = 0u32;

    for root in 0..node_count as NodeId {
        if disc[root as usize] != 0 {
            continue;
        }
        timer += 1;
        disc[root as usize] = timer;
        low[root as usize] = timer;
        let mut root_children = 0;
        let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];

        while let Some(frame) = stack.last_mut() {
            let u = frame.0;
            let neighbors = adjacency.neighbors(u);
            if let Some(&v) = neighbors.get(frame.1) {
                frame.1 += 1;
                if disc[v as usize] == 0 {
                    parent[v as usize] = Some(u);
                    timer += 1;
                    disc[v as usize] = timer;
                    low[v as usize] = timer;
                    if u == root {
                        root_children += 1;
                    }
                    stack.push((v, 0));
                } else if parent[u as usize] != Some(v) {
                    low[u as usize] = low[u as usize].min(disc[v as usize]);
                }
            } else {
                stack.pop();
                if let Some(p) = parent[u as usize] {
                    low[p as usize] = low[p as usize].min(low[u as usize]);
                    if p != root && low[u as usize] >= disc[p as usize] {
                        is_cut[p as usize] = true;
                    }
                }
            }
        }

        if root_children > 1 {
            is_cut[root as usize] = true;
        }
    }

    (0..node_count as NodeId)
        .filter(|&n| is_cut[n as usize])
        .collect()
}

// ── Choke-point repair ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    pub fixed: bool,
    /// Edges added.
    pub attempts: u32,
    /// Articulation points left when repair stopped.
    pub articulation_count: usize,
}

/// Add short cross-region `Inter` edges until at most `limit` articulation
/// points remain or `budget` edges have been added. An edge that would bring
/// any backdoor under `graph.params.min_len` backdoor-free hops is never
/// added, so an accepted level stays inside its hop window.
pub fn repair_choke_points(
    graph: &mut Graph,
    limit: usize,
    budget: u32,
    rng: &mut impl Rng,
) -> RepairReport {
    let min_len = graph.params.min_len;
    let mut attempts = 0;
    loop {
        let cuts = find_articulation_points(graph.nodes.len(), &graph.edges).len();
        if cuts <= limit {
            log::debug!("choke repair done: {} cut vertices after {} edges", cuts, attempts);
            return RepairReport {
                fixed: true,
                attempts,
                articulation_count: cuts,
            };
        }
        if attempts >= budget {
            log::warn!(
                "choke repair budget of {} exhausted with {} cut vertices left",
                budget,
                cuts
            );
            return RepairReport {
                fixed: false,
                attempts,
                articulation_count: cuts,
            };
        }

        let existing: HashSet<(NodeId, NodeId)> = graph.edges.iter().map(Edge::key).collect();
        let base = graph.base_adjacency();
        let reach: Vec<BackdoorReach> = graph
            .backdoors()
            .map(|e| (base.hop_distances(e.from), base.hop_distances(e.to)))
            .collect();
        let mut candidates: Vec<(f32, NodeId, NodeId)> = Vec::new();
        for (i, a) in graph.nodes.iter().enumerate() {
            for b in &graph.nodes[i + 1..] {
                if a.region != b.region
                    && !existing.contains(&edge_key(a.id, b.id))
                    && !shortens_backdoor(&reach, a.id, b.id, min_len)
                {
                    candidates.push((a.distance_to(b), a.id, b.id));
                }
            }
        }
        if candidates.is_empty() {
            log::warn!("choke repair has no candidate edges; {} cut vertices left", cuts);
            return RepairReport {
                fixed: false,
                attempts,
                articulation_count: cuts,
            };
        }
        candidates.sort_by(|x, y| x.0.total_cmp(&y.0));
        candidates.truncate(CANDIDATE_POOL);

        if let Some(&(_, a, b)) = candidates.choose(rng) {
            if let Some(edge) = Edge::new(a, b, EdgeKind::Inter) {
                graph.edges.push(edge);
            }
        }
        attempts += 1;
    }
}

/// Backdoor-free hop maps from both ends of one backdoor.
type BackdoorReach = (Vec<Option<u32>>, Vec<Option<u32>>);

/// Whether a new base edge `a-b` opens a path under `min_len` hops between
/// the ends of any backdoor.
fn shortens_backdoor(reach: &[BackdoorReach], a: NodeId, b: NodeId, min_len: u32) -> bool {
    let via = |from: &[Option<u32>], to: &[Option<u32>], x: NodeId, y: NodeId| {
        match (from[x as usize], to[y as usize]) {
            (Some(dx), Some(dy)) => Some(dx + 1 + dy),
            _ => None,
        }
    };
    reach.iter().any(|(from, to)| {
        [via(from, to, a, b), via(from, to, b, a)]
            .into_iter()
            .flatten()
            .any(|hops| hops < min_len)
    })
}
