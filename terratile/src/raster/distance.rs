//! Signed-distance rasterization of polygon boundaries.
//!
//! Distances are measured in whole cells, positive inside the polygon,
//! negative outside, zero on cells touching the boundary. A cell whose
//! center lies exactly on a boundary crossing counts as inside
//! (closed-boundary rule).
//!
//! The field is computed in two passes. First, for every column within
//! the distance of interest, the exact in-column distance of each cell to
//! the nearest crossing along that column. Second, per cell, a refinement
//! scan over neighboring columns: a crossing `m` cells away along a
//! column `dx` over is `sqrt(dx^2 + m^2)` cells away in 2D, and an
//! inside/outside flip between columns marks a boundary lying between
//! them. The scan stops as soon as no closer column can exist, so cost is
//! bounded by the distance of interest, not the polygon size.

use super::CELLS;
use crate::geom::RegionPos;
use crate::vector::ProjectedPolygon;

/// Column marker for "no crossing anywhere in this column": unbounded
/// outside.
const FAR_OUTSIDE: i32 = i32::MIN;

/// Computes the clamped signed distance field of `polygon` over one
/// region.
///
/// Cells within `max_dist` of the boundary (on either side) are delivered
/// to `draw` with their distance, clamped above to `max_dist`. Cells
/// farther outside than `max_dist`, and cells with no boundary in scan
/// range at all, are skipped, so a polygon far from the region costs
/// nothing.
pub fn distance_field(
    polygon: &ProjectedPolygon,
    region: RegionPos,
    max_dist: u32,
    mut draw: impl FnMut(usize, usize, i32),
) {
    let d = max_dist as i32;
    let min_x = region.min_block_x();
    let min_z = region.min_block_z();

    // In-column distances for every column the refinement scan can touch.
    let column_count = CELLS + 2 * d as usize;
    let mut columns = Vec::with_capacity(column_count);
    for i in 0..column_count {
        let x = (min_x - d + i as i32) as f64 + 0.5;
        columns.push(column_distances(&polygon.crossings_in_column(x), min_z));
    }

    for x in 0..CELLS {
        for z in 0..CELLS {
            if let Some(dist) = refine(&columns, x, z, d) {
                if dist >= -d {
                    draw(x, z, dist.min(d));
                }
            }
        }
    }
}

/// Exact signed distance from each of the 16 cells of one column to the
/// nearest crossing within that column, in whole cells.
///
/// Crossings come in enter/exit pairs (guaranteed by ring closure). A
/// cell is inside when its center lies within a pair, boundary values
/// included; inside distance is the count of cells to the nearer span
/// end, outside distance the negated count to the nearest inside cell.
fn column_distances(crossings: &[f64], min_z: i32) -> [i32; CELLS] {
    let mut out = [FAR_OUTSIDE; CELLS];
    if crossings.is_empty() {
        return out;
    }

    // Inside spans in global cell indices, cell-center rule. A sliver
    // containing no cell center yields no span.
    let spans: Vec<(i64, i64)> = crossings
        .chunks_exact(2)
        .map(|pair| ((pair[0] - 0.5).ceil() as i64, (pair[1] - 0.5).floor() as i64))
        .filter(|&(first, last)| first <= last)
        .collect();

    for (z, slot) in out.iter_mut().enumerate() {
        let cell = min_z as i64 + z as i64;
        let mut nearest_outside = i64::MAX;
        for &(first, last) in &spans {
            if (first..=last).contains(&cell) {
                *slot = (cell - first).min(last - cell) as i32;
                nearest_outside = i64::MIN;
                break;
            }
            let to_span = if cell < first { first - cell } else { cell - last };
            nearest_outside = nearest_outside.min(to_span);
        }
        if nearest_outside > 0 && nearest_outside != i64::MAX {
            *slot = -(nearest_outside as i32);
        }
    }
    out
}

/// Refines one cell's in-column distance against neighboring columns.
///
/// Candidates per column at offset `dx`, by inside/outside state:
/// same-side columns contribute the 2D distance to their nearest
/// crossing; an opposite-side column means a boundary between the
/// columns, `dx - 1` cells away seen from inside, `dx` seen from
/// outside. A column at offset `dx` can never beat a best below
/// `dx - 1`, which bounds the scan. Returns `None` when no column in
/// range holds a crossing.
fn refine(columns: &[[i32; CELLS]], x: usize, z: usize, d: i32) -> Option<i32> {
    let center = x as i64 + d as i64;
    let own = columns[center as usize][z];
    let inside = own != FAR_OUTSIDE && own >= 0;
    let mut best: i64 = match own {
        FAR_OUTSIDE => i64::MAX,
        m => m.unsigned_abs() as i64,
    };

    for dx in 1..=d as i64 {
        if dx - 1 >= best {
            break;
        }
        for column in [center - dx, center + dx] {
            let m = columns[column as usize][z];
            let candidate = match (inside, m) {
                (false, FAR_OUTSIDE) => continue,
                (true, FAR_OUTSIDE) => dx - 1,
                (true, m) if m < 0 => dx - 1,
                (false, m) if m >= 0 => dx,
                (_, m) => hypot_cells(dx, m as i64),
            };
            best = best.min(candidate);
        }
    }

    if best == i64::MAX {
        return None;
    }
    Some(if inside { best as i32 } else { -(best as i32) })
}

fn hypot_cells(dx: i64, m: i64) -> i64 {
    ((dx * dx + m * m) as f64).sqrt() as i64
}
