//! Rasterization of local-space vector geometry into region cell grids.
//!
//! All functions draw into one 16x16 region through a per-cell callback
//! taking local cell coordinates. Geometry coordinates are global block
//! coordinates; a cell covers `[n, n + 1)` on each axis and is sampled at
//! its center.

mod distance;

pub use distance::distance_field;

use crate::bvh::Bvh;
use crate::geom::{RegionPos, REGION_SIZE};
use crate::vector::{ProjectedPolygon, Segment};

const CELLS: usize = REGION_SIZE as usize;

/// Marks every cell a segment passes through, one cell wide.
pub fn draw_narrow_lines(
    segments: &Bvh<Segment>,
    region: RegionPos,
    mut draw: impl FnMut(usize, usize),
) {
    let bounds = region.block_bounds();
    let min_x = region.min_block_x() as f64;
    let min_z = region.min_block_z() as f64;

    let mut touched = [false; CELLS * CELLS];
    segments.for_each_intersecting(&bounds, |segment| {
        // Walk the segment at quarter-cell steps; short enough that no
        // traversed cell is skipped at 45 degrees.
        let dx = segment.x1 - segment.x0;
        let dz = segment.z1 - segment.z0;
        let steps = (dx.abs().max(dz.abs()) * 4.0).ceil().max(1.0);
        for i in 0..=steps as u32 {
            let t = i as f64 / steps;
            let x = segment.x0 + dx * t - min_x;
            let z = segment.z0 + dz * t - min_z;
            if (0.0..CELLS as f64).contains(&x) && (0.0..CELLS as f64).contains(&z) {
                touched[x as usize * CELLS + z as usize] = true;
            }
        }
    });

    for x in 0..CELLS {
        for z in 0..CELLS {
            if touched[x * CELLS + z] {
                draw(x, z);
            }
        }
    }
}

/// Marks every cell whose center lies within `radius` of any segment.
pub fn draw_wide_lines(
    segments: &Bvh<Segment>,
    radius: f64,
    region: RegionPos,
    mut draw: impl FnMut(usize, usize),
) {
    let bounds = region.block_bounds().expand(radius);
    let min_x = region.min_block_x() as f64;
    let min_z = region.min_block_z() as f64;
    let radius_sq = radius * radius;

    let mut candidates = Vec::new();
    segments.for_each_intersecting(&bounds, |segment| candidates.push(*segment));
    if candidates.is_empty() {
        return;
    }

    for x in 0..CELLS {
        for z in 0..CELLS {
            let cx = min_x + x as f64 + 0.5;
            let cz = min_z + z as f64 + 0.5;
            if candidates
                .iter()
                .any(|segment| segment.distance_sq(cx, cz) <= radius_sq)
            {
                draw(x, z);
            }
        }
    }
}

/// Fills the polygon interior by even-odd counting, boundary cells
/// included.
pub fn fill_polygon(
    polygon: &ProjectedPolygon,
    region: RegionPos,
    mut draw: impl FnMut(usize, usize),
) {
    let min_x = region.min_block_x() as f64;
    let min_z = region.min_block_z();

    for x in 0..CELLS {
        let crossings = polygon.crossings_in_column(min_x + x as f64 + 0.5);
        for pair in crossings.chunks_exact(2) {
            let (enter, exit) = (pair[0], pair[1]);
            // Cells whose center lies within the inside span.
            let first = ((enter - 0.5).ceil() as i64 - min_z as i64).max(0);
            let last = ((exit - 0.5).floor() as i64 - min_z as i64).min(CELLS as i64 - 1);
            for z in first..=last {
                draw(x, z as usize);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(f: impl FnOnce(&mut dyn FnMut(usize, usize))) -> Vec<(usize, usize)> {
        let mut cells = Vec::new();
        f(&mut |x, z| cells.push((x, z)));
        cells.sort_unstable();
        cells
    }

    #[test]
    fn test_narrow_line_horizontal() {
        let segments = Bvh::build(vec![Segment::new(2.5, 4.5, 9.5, 4.5)]);
        let cells = collect(|draw| {
            draw_narrow_lines(&segments, RegionPos::new(0, 0), |x, z| draw(x, z))
        });
        let expected: Vec<_> = (2..=9).map(|x| (x, 4)).collect();
        assert_eq!(cells, expected);
    }

    #[test]
    fn test_narrow_line_diagonal_connected() {
        let segments = Bvh::build(vec![Segment::new(0.5, 0.5, 7.5, 7.5)]);
        let cells = collect(|draw| {
            draw_narrow_lines(&segments, RegionPos::new(0, 0), |x, z| draw(x, z))
        });
        for i in 0..=7 {
            assert!(cells.contains(&(i, i)), "missing diagonal cell {i}");
        }
    }

    #[test]
    fn test_narrow_line_clips_to_region() {
        let segments = Bvh::build(vec![Segment::new(-5.0, 3.5, 40.0, 3.5)]);
        let cells = collect(|draw| {
            draw_narrow_lines(&segments, RegionPos::new(0, 0), |x, z| draw(x, z))
        });
        assert_eq!(cells.len(), 16);
        assert!(cells.iter().all(|&(_, z)| z == 3));
    }

    #[test]
    fn test_wide_line_radius() {
        let segments = Bvh::build(vec![Segment::new(0.0, 8.5, 16.0, 8.5)]);
        let cells = collect(|draw| {
            draw_wide_lines(&segments, 2.0, RegionPos::new(0, 0), |x, z| draw(x, z))
        });
        // Centers within 2.0 of z = 8.5 are rows 6..=10; rows 6 and 10 sit
        // exactly at the radius and boundary cells are drawn.
        assert_eq!(cells.len(), 16 * 5);
        assert!(cells.iter().all(|&(_, z)| (6..=10).contains(&z)));
    }

    #[test]
    fn test_wide_line_reaches_from_neighbor_region() {
        // Segment entirely in the region at x < 0, wide enough to spill in.
        let segments = Bvh::build(vec![Segment::new(-1.0, 0.0, -1.0, 16.0)]);
        let cells = collect(|draw| {
            draw_wide_lines(&segments, 3.0, RegionPos::new(0, 0), |x, z| draw(x, z))
        });
        assert!(!cells.is_empty());
        assert!(cells.iter().all(|&(x, _)| x <= 1));
    }

    #[test]
    fn test_fill_square() {
        let ring = vec![(3.0, 3.0), (13.0, 3.0), (13.0, 13.0), (3.0, 13.0), (3.0, 3.0)];
        let polygon = ProjectedPolygon::new(&[ring]);
        let cells = collect(|draw| {
            fill_polygon(&polygon, RegionPos::new(0, 0), |x, z| draw(x, z))
        });
        assert_eq!(cells.len(), 100);
        assert!(cells.iter().all(|&(x, z)| (3..13).contains(&x) && (3..13).contains(&z)));
    }

    #[test]
    fn test_fill_respects_holes() {
        let outer = vec![(0.0, 0.0), (16.0, 0.0), (16.0, 16.0), (0.0, 16.0), (0.0, 0.0)];
        let inner = vec![(4.0, 4.0), (12.0, 4.0), (12.0, 12.0), (4.0, 12.0), (4.0, 4.0)];
        let polygon = ProjectedPolygon::new(&[outer, inner]);
        let cells = collect(|draw| {
            fill_polygon(&polygon, RegionPos::new(0, 0), |x, z| draw(x, z))
        });
        assert!(!cells.contains(&(8, 8)));
        assert!(cells.contains(&(8, 2)));
        assert_eq!(cells.len(), 256 - 64);
    }

    #[test]
    fn test_fill_in_far_region_uses_global_coordinates() {
        // Region (1, 1) spans blocks 16..32 on both axes.
        let ring = vec![(18.0, 18.0), (20.0, 18.0), (20.0, 20.0), (18.0, 20.0), (18.0, 18.0)];
        let polygon = ProjectedPolygon::new(&[ring]);
        let cells = collect(|draw| {
            fill_polygon(&polygon, RegionPos::new(1, 1), |x, z| draw(x, z))
        });
        assert_eq!(cells, vec![(2, 2), (2, 3), (3, 2), (3, 3)]);
    }
}
