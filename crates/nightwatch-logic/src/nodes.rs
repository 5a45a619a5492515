//! Node distribution and start/goal role assignment.

use rand::Rng;

use crate::config::LayoutConfig;
use crate::constants::layout::{JITTER_FRACTION, MAX_JITTER};
use crate::error::GraphError;
use crate::graph::{Node, NodeId, NodeRole, Region, RegionId};

/// How many nodes each region gets: an even share, with the remainder handed
/// out one each starting from region 0.
pub fn region_quotas(total: u32, regions: usize) -> Vec<u32> {
    if regions == 0 {
        return Vec::new();
    }
    let base = total / regions as u32;
    let remainder = (total % regions as u32) as usize;
    (0..regions)
        .map(|i| base + u32::from(i < remainder))
        .collect()
}

/// Spread `layout.total_nodes` across the regions on a jittered grid inset
/// by `layout.node_margin`. Ids come out dense in region order.
pub fn distribute_nodes(
    regions: &[Region],
    layout: &LayoutConfig,
    rng: &mut impl Rng,
) -> Vec<Node> {
    let quotas = region_quotas(layout.total_nodes, regions.len());
    let mut nodes = Vec::with_capacity(layout.total_nodes as usize);

    for (region, &quota) in regions.iter().zip(&quotas) {
        let b = region.bbox;
        let margin = layout.node_margin;
        let inner_w = (b.width() - 2.0 * margin).max(f32::EPSILON);
        let inner_h = (b.height() - 2.0 * margin).max(f32::EPSILON);

        let cols = ((quota as f32 * inner_w / inner_h).sqrt().round() as u32).max(1);
        let rows = quota.div_ceil(cols).max(1);
        let sx = inner_w / cols as f32;
        let sy = inner_h / rows as f32;
        let jx = (sx * JITTER_FRACTION).min(MAX_JITTER);
        let jy = (sy * JITTER_FRACTION).min(MAX_JITTER);

        let mut placed = 0;
        'grid: for r in 0..rows {
            for c in 0..cols {
                if placed == quota {
                    break 'grid;
                }
                let x = b.x0 + margin + (c as f32 + 0.5) * sx + (rng.gen::<f32>() - 0.5) * jx;
                let y = b.y0 + margin + (r as f32 + 0.5) * sy + (rng.gen::<f32>() - 0.5) * jy;
                nodes.push(Node {
                    id: nodes.len() as NodeId,
                    x,
                    y,
                    region: region.id,
                    role: NodeRole::Normal,
                });
                placed += 1;
            }
        }
    }

    nodes
}

/// Node in `region` closest to the region's seed point. Ties go to the
/// lowest id.
pub fn nearest_to_seed(nodes: &[Node], region: &Region) -> Option<NodeId> {
    let (sx, sy) = region.seed;
    nodes
        .iter()
        .filter(|n| n.region == region.id)
        .map(|n| (n.id, (n.x - sx).hypot(n.y - sy)))
        .fold(None, |best: Option<(NodeId, f32)>, (id, d)| match best {
            Some((_, bd)) if bd <= d => best,
            _ => Some((id, d)),
        })
        .map(|(id, _)| id)
}

/// Mark the start and goal nodes: the node nearest each region's seed.
pub fn assign_roles(
    nodes: &mut [Node],
    regions: &[Region],
    start_region: RegionId,
    goal_region: RegionId,
) -> Result<(NodeId, NodeId), GraphError> {
    let pick = |region_id: RegionId, nodes: &[Node]| {
        regions
            .iter()
            .find(|r| r.id == region_id)
            .and_then(|r| nearest_to_seed(nodes, r))
            .ok_or(GraphError::EmptyRegion(region_id))
    };
    let start = pick(start_region, nodes)?;
    let goal = pick(goal_region, nodes)?;
    nodes[start as usize].role = NodeRole::Start;
    nodes[goal as usize].role = NodeRole::Goal;
    Ok((start, goal))
}
