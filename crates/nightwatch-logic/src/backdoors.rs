//! Backdoor placement.
//!
//! Backdoors are long-range shortcuts between border nodes of different
//! regions. A candidate pair is only ever accepted when its hop distance in
//! the base network (intra + inter edges) lies inside `[min_len, max_len]`,
//! and neither endpoint may sit in the start region.
//!
//! Placement runs up to two passes:
//!
//! 1. Shortest pairs first, filling separate forward and lateral quotas.
//! 2. Remaining in-window pairs, closest to the middle of the window first,
//!    longer pairs breaking ties, until the target is met or the pool runs
//!    out. A longest-first fill over the same pool would find nothing left,
//!    so there is no third pass.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::{GenerationParams, LayoutConfig};
use crate::graph::{edge_key, Adjacency, Edge, EdgeKind, EdgeSet, HopCache, Node, NodeId, Region};
use crate::regions::map_bounds;

/// Forward pairs change the distance to the goal region, lateral pairs keep it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackdoorClass {
    Forward,
    Lateral,
}

pub fn classify(layout: &LayoutConfig, region_a: u32, region_b: u32) -> BackdoorClass {
    let goal = layout.goal_region;
    if layout.grid_distance(region_a, goal) != layout.grid_distance(region_b, goal) {
        BackdoorClass::Forward
    } else {
        BackdoorClass::Lateral
    }
}

/// `max(1, round(pct% of node_count))`.
pub fn backdoor_target(backdoor_pct: f32, node_count: usize) -> usize {
    ((backdoor_pct / 100.0 * node_count as f32).round() as usize).max(1)
}

/// Nodes close to a region border or the map border, outside the start
/// region. The band is `border_pad_fraction` of the larger half-extent.
pub fn border_nodes(nodes: &[Node], regions: &[Region], layout: &LayoutConfig) -> Vec<NodeId> {
    let Some(map) = map_bounds(regions) else {
        return Vec::new();
    };
    nodes
        .iter()
        .filter(|n| n.region != layout.start_region)
        .filter(|n| {
            let Some(region) = regions.iter().find(|r| r.id == n.region) else {
                return false;
            };
            let b = region.bbox;
            let pad = (b.width() / 2.0).max(b.height() / 2.0) * layout.border_pad_fraction;
            b.edge_distance(n.x, n.y) <= pad || map.edge_distance(n.x, n.y) <= pad
        })
        .map(|n| n.id)
        .collect()
}

/// Outcome of a placement run. Stored on the generated graph's metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacementReport {
    pub target: usize,
    pub added: usize,
    pub forward: usize,
    pub lateral: usize,
    pub forward_quota: usize,
    pub lateral_quota: usize,
    /// Backdoors added by pass 1 and pass 2.
    pub per_pass: [usize; 2],
    pub forward_pct: f32,
    pub avg_hops: f32,
    pub candidates: usize,
    pub failures: Vec<String>,
}

pub struct Placement {
    pub edges: Vec<Edge>,
    pub report: PlacementReport,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    a: NodeId,
    b: NodeId,
    distance: f32,
    hops: Option<u32>,
    class: BackdoorClass,
    /// Whether the forward rule lets pass 1 count this pair as forward.
    forward_ok: bool,
}

/// Accumulates accepted backdoors across the passes.
struct Placer {
    target: usize,
    used: HashSet<(NodeId, NodeId)>,
    edges: Vec<Edge>,
    forward: usize,
    lateral: usize,
    per_pass: [usize; 2],
    hop_total: u32,
}

impl Placer {
    fn is_free(&self, c: &Candidate) -> bool {
        !self.used.contains(&edge_key(c.a, c.b))
    }

    fn is_full(&self) -> bool {
        self.edges.len() >= self.target
    }

    fn accept(&mut self, c: &Candidate, pass: usize) {
        if !self.used.insert(edge_key(c.a, c.b)) {
            return;
        }
        let Some(edge) = Edge::new(c.a, c.b, EdgeKind::Backdoor) else {
            return;
        };
        self.edges.push(edge);
        match c.class {
            BackdoorClass::Forward => self.forward += 1,
            BackdoorClass::Lateral => self.lateral += 1,
        }
        self.per_pass[pass] += 1;
        self.hop_total += c.hops.unwrap_or(0);
    }
}

/// Choose backdoors for a node set whose base network is `base`.
pub fn place_backdoors(
    nodes: &[Node],
    regions: &[Region],
    base: &EdgeSet,
    layout: &LayoutConfig,
    params: &GenerationParams,
) -> Placement {
    let target = backdoor_target(params.backdoor_pct, nodes.len());
    let forward_quota = (target as f32 * params.forward_weight).round() as usize;
    let lateral_quota = target.saturating_sub(forward_quota);
    let (min_len, max_len) = (params.min_len, params.max_len);
    let in_window = |c: &Candidate| c.hops.is_some_and(|h| h >= min_len && h <= max_len);

    let adjacency = Adjacency::from_edges(nodes.len(), base.as_slice());
    let mut hops = HopCache::new(&adjacency);
    let border = border_nodes(nodes, regions, layout);

    let mut candidates = Vec::new();
    for (i, &a) in border.iter().enumerate() {
        for &b in &border[i + 1..] {
            let (na, nb) = (&nodes[a as usize], &nodes[b as usize]);
            if na.region == nb.region || base.contains(a, b) {
                continue;
            }
            let class = classify(layout, na.region, nb.region);
            let forward_ok = class == BackdoorClass::Forward
                && params.forward_rule.allows(
                    layout.row_of(na.region),
                    layout.row_of(nb.region),
                    layout.rows,
                );
            candidates.push(Candidate {
                a,
                b,
                distance: na.distance_to(nb),
                hops: hops.hops(a, b),
                class,
                forward_ok,
            });
        }
    }
    candidates.sort_by(|x, y| x.distance.total_cmp(&y.distance));

    let mut placer = Placer {
        target,
        used: HashSet::new(),
        edges: Vec::with_capacity(target),
        forward: 0,
        lateral: 0,
        per_pass: [0; 2],
        hop_total: 0,
    };

    // Pass 1: shortest first, separate quotas.
    for c in &candidates {
        if placer.forward >= forward_quota && placer.lateral >= lateral_quota {
            break;
        }
        if !in_window(c) || !placer.is_free(c) {
            continue;
        }
        if c.forward_ok && placer.forward < forward_quota {
            placer.accept(c, 0);
        } else if c.class == BackdoorClass::Lateral && placer.lateral < lateral_quota {
            placer.accept(c, 0);
        }
    }

    // Pass 2: hop counts near the middle of the window.
    if !placer.is_full() {
        let mid = (min_len + max_len) as f32 / 2.0;
        let mut rest: Vec<&Candidate> = candidates
            .iter()
            .filter(|&c| in_window(c) && placer.is_free(c))
            .collect();
        rest.sort_by(|x, y| {
            let dx = (x.hops.unwrap_or(0) as f32 - mid).abs();
            let dy = (y.hops.unwrap_or(0) as f32 - mid).abs();
            dx.total_cmp(&dy).then(y.distance.total_cmp(&x.distance))
        });
        for c in rest {
            if placer.is_full() {
                break;
            }
            placer.accept(c, 1);
        }
    }

    let added = placer.edges.len();
    let mut failures = Vec::new();
    if added < target {
        failures.push(format!("Only {}/{} backdoors added", added, target));
        log::warn!(
            "backdoor shortfall: {}/{} from {} candidates",
            added,
            target,
            candidates.len()
        );
    }
    log::debug!(
        "backdoors: {} forward, {} lateral, passes {:?}",
        placer.forward,
        placer.lateral,
        placer.per_pass
    );

    let report = PlacementReport {
        target,
        added,
        forward: placer.forward,
        lateral: placer.lateral,
        forward_quota,
        lateral_quota,
        per_pass: placer.per_pass,
        forward_pct: if added == 0 {
            0.0
        } else {
            placer.forward as f32 * 100.0 / added as f32
        },
        avg_hops: if added == 0 {
            0.0
        } else {
            placer.hop_total as f32 / added as f32
        },
        candidates: candidates.len(),
        failures,
    };

    Placement {
        edges: placer.edges,
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edges::build_base_edges;
    use crate::graph::{BoundingBox, NodeRole};
    use crate::nodes::distribute_nodes;
    use crate::regions::generate_regions;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn node(id: NodeId, x: f32, y: f32, region: u32) -> Node {
        Node {
            id,
            x,
            y,
            region,
            role: NodeRole::Normal,
        }
    }

    /// Three 100x100 regions in a row; start on the left, goal on the right.
    fn strip_layout() -> (LayoutConfig, Vec<Region>) {
        let layout = LayoutConfig {
            rows: 1,
            cols: 3,
            cell_size: 100.0,
            scale: 1.0,
            total_nodes: 5,
            start_region: 0,
            goal_region: 2,
            ..LayoutConfig::default()
        };
        let regions = generate_regions(&layout);
        (layout, regions)
    }

    /// n1 (region 1) and n2 (region 2) are 2 hops apart, n1 and n4 are 3.
    fn strip_nodes() -> (Vec<Node>, EdgeSet) {
        let nodes = vec![
            node(0, 50.0, 50.0, 0),
            node(1, 190.0, 50.0, 1),
            node(2, 210.0, 50.0, 2),
            node(3, 150.0, 10.0, 1),
            node(4, 250.0, 90.0, 2),
        ];
        let mut base = EdgeSet::new();
        base.insert(0, 1, EdgeKind::Inter);
        base.insert(1, 3, EdgeKind::Intra);
        base.insert(3, 2, EdgeKind::Inter);
        base.insert(2, 4, EdgeKind::Intra);
        (nodes, base)
    }

    #[test]
    fn target_is_at_least_one() {
        assert_eq!(backdoor_target(8.0, 150), 12);
        assert_eq!(backdoor_target(0.0, 150), 1);
        assert_eq!(backdoor_target(8.0, 5), 1);
    }

    #[test]
    fn classification_by_goal_distance() {
        let layout = LayoutConfig::default();
        // goal is region 5 (row 1, col 2)
        assert_eq!(classify(&layout, 0, 1), BackdoorClass::Forward);
        assert_eq!(classify(&layout, 2, 4), BackdoorClass::Lateral);
        assert_eq!(classify(&layout, 0, 6), BackdoorClass::Lateral);
        assert_eq!(classify(&layout, 4, 5), BackdoorClass::Forward);
    }

    #[test]
    fn border_nodes_skip_start_region_and_centres() {
        let (layout, regions) = strip_layout();
        let mut nodes = strip_nodes().0;
        nodes.push(node(5, 150.0, 50.0, 1));
        let border = border_nodes(&nodes, &regions, &layout);
        assert_eq!(border, vec![1, 2, 3, 4]);
    }

    #[test]
    fn short_pairs_never_accepted() {
        let (layout, regions) = strip_layout();
        let (nodes, base) = strip_nodes();
        let params = GenerationParams {
            min_len: 3,
            max_len: 6,
            ..GenerationParams::default()
        };
        let placement = place_backdoors(&nodes, &regions, &base, &layout, &params);

        // 1-2 is the closest pair but only 2 hops apart.
        let keys: Vec<_> = placement.edges.iter().map(|e| e.key()).collect();
        assert_eq!(keys, vec![(1, 4)]);
        assert_eq!(placement.report.forward, 1);
        assert_eq!(placement.report.avg_hops, 3.0);
        assert_eq!(placement.report.per_pass, [1, 0]);
        assert!(placement.report.failures.is_empty());
    }

    #[test]
    fn unmet_quota_falls_through_to_pass_two() {
        // all quota is lateral, but the only in-window pair is forward
        let (layout, regions) = strip_layout();
        let (nodes, base) = strip_nodes();
        let params = GenerationParams {
            forward_weight: 0.0,
            ..GenerationParams::default()
        };
        let placement = place_backdoors(&nodes, &regions, &base, &layout, &params);
        assert_eq!(placement.report.lateral_quota, 1);
        assert_eq!(placement.report.per_pass, [0, 1]);
        assert_eq!(placement.edges[0].key(), (1, 4));
    }

    #[test]
    fn nothing_in_window_reports_shortfall() {
        let (layout, regions) = strip_layout();
        let (nodes, base) = strip_nodes();
        let params = GenerationParams {
            min_len: 4,
            max_len: 6,
            ..GenerationParams::default()
        };
        let placement = place_backdoors(&nodes, &regions, &base, &layout, &params);
        assert!(placement.edges.is_empty());
        assert_eq!(placement.report.failures, vec!["Only 0/1 backdoors added"]);
    }

    #[test]
    fn generated_backdoors_respect_window_and_start_region() {
        let layout = LayoutConfig::default();
        let params = GenerationParams::default();
        let regions = generate_regions(&layout);
        for seed in [1u64, 2, 3, 42] {
            let mut rng = StdRng::seed_from_u64(seed);
            let nodes = distribute_nodes(&regions, &layout, &mut rng);
            let base = build_base_edges(&nodes, &layout, &params, &mut rng);
            let adjacency = Adjacency::from_edges(nodes.len(), base.as_slice());
            let placement = place_backdoors(&nodes, &regions, &base, &layout, &params);

            assert!(!placement.edges.is_empty(), "seed {}", seed);
            assert!(placement.edges.len() <= placement.report.target);
            for e in &placement.edges {
                let hops = adjacency.hop_distance(e.from, e.to).unwrap();
                assert!((3..=6).contains(&hops), "seed {} edge {} hops {}", seed, e, hops);
                assert_ne!(nodes[e.from as usize].region, layout.start_region);
                assert_ne!(nodes[e.to as usize].region, layout.start_region);
                assert!(!base.contains(e.from, e.to));
            }
        }
    }

    #[test]
    fn pass_one_honours_forward_rule() {
        let layout = LayoutConfig::default();
        let params = GenerationParams {
            forward_rule: crate::config::ForwardRule::ExcludeMiddleRow,
            backdoor_pct: 4.0,
            ..GenerationParams::default()
        };
        let regions = generate_regions(&layout);
        let mut rng = StdRng::seed_from_u64(9);
        let nodes = distribute_nodes(&regions, &layout, &mut rng);
        let base = build_base_edges(&nodes, &layout, &params, &mut rng);
        let placement = place_backdoors(&nodes, &regions, &base, &layout, &params);

        let pass_one = placement.report.per_pass[0];
        for e in placement.edges.iter().take(pass_one) {
            let (ra, rb) = (nodes[e.from as usize].region, nodes[e.to as usize].region);
            let both_middle = layout.row_of(ra) == 1 && layout.row_of(rb) == 1;
            assert!(
                !(both_middle && classify(&layout, ra, rb) == BackdoorClass::Forward),
                "edge {} joins middle-row regions",
                e
            );
        }
    }

    #[test]
    fn map_border_counts_as_border() {
        let regions = vec![Region {
            id: 0,
            row: 0,
            col: 0,
            label: "A1".into(),
            bbox: BoundingBox {
                x0: 0.0,
                y0: 0.0,
                x1: 100.0,
                y1: 100.0,
            },
            seed: (50.0, 50.0),
        }];
        let layout = LayoutConfig {
            rows: 1,
            cols: 1,
            start_region: 9,
            ..LayoutConfig::default()
        };
        let nodes = vec![node(0, 5.0, 50.0, 0), node(1, 50.0, 50.0, 0)];
        assert_eq!(border_nodes(&nodes, &regions, &layout), vec![0]);
    }
}
