//! Base corridor network: per-region spanning trees, nearest-neighbour
//! extras, and bridges between grid-adjacent regions.
//!
//! Distances are weighted by the diagonal bias so that, at high bias,
//! diagonal corridors win over axis-aligned ones of similar length.

use rand::Rng;

use crate::config::{GenerationParams, LayoutConfig};
use crate::constants::generation::AXIS_PENALTY;
use crate::graph::{is_diagonal, EdgeKind, EdgeSet, Node, NodeId, RegionId};
use crate::regions::adjacent_pairs;

/// Euclidean distance, inflated for axis-aligned pairs by up to
/// `AXIS_PENALTY` at 100% bias.
pub fn weighted_distance(a: &Node, b: &Node, diagonal_bias_pct: f32) -> f32 {
    let d = a.distance_to(b);
    if is_diagonal(a, b) {
        d
    } else {
        d * (1.0 + diagonal_bias_pct / 100.0 * AXIS_PENALTY)
    }
}

/// Build intra and inter edges for a node set.
pub fn build_base_edges(
    nodes: &[Node],
    layout: &LayoutConfig,
    params: &GenerationParams,
    rng: &mut impl Rng,
) -> EdgeSet {
    let bias = params.diagonal_bias_pct;
    let mut edges = EdgeSet::new();

    for region in 0..layout.region_count() {
        let members: Vec<&Node> = nodes.iter().filter(|n| n.region == region).collect();
        spanning_tree(&members, bias, &mut edges);
        nearest_extras(&members, layout.k_extra, bias, &mut edges);
    }

    for (a, b) in adjacent_pairs(layout) {
        let count = bridge_count(params.inter_region_edges, rng);
        bridge_regions(nodes, a, b, count, bias, &mut edges);
    }

    log::debug!(
        "base edges: {} over {} nodes ({} region pairs bridged)",
        edges.len(),
        nodes.len(),
        adjacent_pairs(layout).len()
    );
    edges
}

/// Prim's algorithm over the complete weighted graph of one region.
fn spanning_tree(members: &[&Node], bias: f32, edges: &mut EdgeSet) {
    if members.len() < 2 {
        return;
    }
    // best[i] = (cost, tree member) for every node not yet in the tree
    let mut in_tree = vec![false; members.len()];
    let mut best: Vec<(f32, usize)> = vec![(f32::INFINITY, 0); members.len()];
    in_tree[0] = true;
    for (i, m) in members.iter().enumerate().skip(1) {
        best[i] = (weighted_distance(members[0], m, bias), 0);
    }

    for _ in 1..members.len() {
        let next = (0..members.len())
            .filter(|&i| !in_tree[i])
            .min_by(|&i, &j| best[i].0.total_cmp(&best[j].0));
        let Some(next) = next else { break };
        in_tree[next] = true;
        edges.insert(members[best[next].1].id, members[next].id, EdgeKind::Intra);

        for i in 0..members.len() {
            if in_tree[i] {
                continue;
            }
            let d = weighted_distance(members[next], members[i], bias);
            if d < best[i].0 {
                best[i] = (d, next);
            }
        }
    }
}

/// Connect every node to its `k` nearest same-region neighbours. Pairs the
/// tree already joined are skipped by the edge set.
fn nearest_extras(members: &[&Node], k: usize, bias: f32, edges: &mut EdgeSet) {
    if k == 0 {
        return;
    }
    for node in members {
        let mut others: Vec<(f32, NodeId)> = members
            .iter()
            .filter(|o| o.id != node.id)
            .map(|o| (weighted_distance(node, o, bias), o.id))
            .collect();
        others.sort_by(|a, b| a.0.total_cmp(&b.0));
        for &(_, other) in others.iter().take(k) {
            edges.insert(node.id, other, EdgeKind::Intra);
        }
    }
}

/// 0 draws 1 (50%), 2 (25%) or 3 (25%); anything else is used as given.
fn bridge_count(configured: u32, rng: &mut impl Rng) -> usize {
    if configured > 0 {
        return configured as usize;
    }
    let r: f64 = rng.gen();
    if r < 0.5 {
        1
    } else if r < 0.75 {
        2
    } else {
        3
    }
}

/// Join regions `a` and `b` with the `count` shortest cross pairs, using each
/// node at most once for this pair of regions.
fn bridge_regions(
    nodes: &[Node],
    a: RegionId,
    b: RegionId,
    count: usize,
    bias: f32,
    edges: &mut EdgeSet,
) {
    let mut pairs: Vec<(f32, NodeId, NodeId)> = Vec::new();
    for na in nodes.iter().filter(|n| n.region == a) {
        for nb in nodes.iter().filter(|n| n.region == b) {
            pairs.push((weighted_distance(na, nb, bias), na.id, nb.id));
        }
    }
    pairs.sort_by(|x, y| x.0.total_cmp(&y.0));

    let mut used: Vec<NodeId> = Vec::with_capacity(count * 2);
    let mut added = 0;
    for (_, na, nb) in pairs {
        if added == count {
            break;
        }
        if used.contains(&na) || used.contains(&nb) {
            continue;
        }
        if edges.insert(na, nb, EdgeKind::Inter) {
            used.push(na);
            used.push(nb);
            added += 1;
        }
    }
}
