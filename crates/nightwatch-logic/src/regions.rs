//! Region grid layout.

use crate::config::LayoutConfig;
use crate::graph::{BoundingBox, Region, RegionId};

/// Lay out `rows x cols` square regions in row-major order.
pub fn generate_regions(layout: &LayoutConfig) -> Vec<Region> {
    let extent = layout.region_extent();
    let mut regions = Vec::with_capacity(layout.region_count() as usize);
    for row in 0..layout.rows {
        for col in 0..layout.cols {
            let bbox = BoundingBox {
                x0: col as f32 * extent,
                y0: row as f32 * extent,
                x1: (col + 1) as f32 * extent,
                y1: (row + 1) as f32 * extent,
            };
            regions.push(Region {
                id: row * layout.cols + col,
                row,
                col,
                label: region_label(row, col),
                bbox,
                seed: bbox.center(),
            });
        }
    }
    regions
}

/// "A1", "B3", ... Rows past Z fall back to "R<row>".
pub fn region_label(row: u32, col: u32) -> String {
    match char::from_u32('A' as u32 + row) {
        Some(letter) if row < 26 => format!("{}{}", letter, col + 1),
        _ => format!("R{}-{}", row, col + 1),
    }
}

/// Pairs of regions sharing a side: right neighbour, then down neighbour.
pub fn adjacent_pairs(layout: &LayoutConfig) -> Vec<(RegionId, RegionId)> {
    let mut pairs = Vec::new();
    for row in 0..layout.rows {
        for col in 0..layout.cols {
            let id = row * layout.cols + col;
            if col + 1 < layout.cols {
                pairs.push((id, id + 1));
            }
            if row + 1 < layout.rows {
                pairs.push((id, id + layout.cols));
            }
        }
    }
    pairs
}

/// Bounding box of the whole map.
pub fn map_bounds(regions: &[Region]) -> Option<BoundingBox> {
    let (first, rest) = regions.split_first()?;
    Some(rest.iter().fold(first.bbox, |acc, r| acc.union(&r.bbox)))
}
