//! Projected vector geometry ready for rasterization.
//!
//! Feature records are mapped (see [`FeatureMapper`]) into [`VectorShape`]s:
//! local-space geometry indexed by a segment BVH plus an ordered list of
//! draw rules. Shapes are immutable after construction and applied to
//! region builders concurrently without synchronization.

mod draw;
mod mapper;

pub use draw::{BlockId, DrawRule};
pub use mapper::{FeatureMapper, MappingRule, ShapeSpec, TagMatch};

use std::sync::Arc;

use crate::bake::ChunkDataBuilder;
use crate::bvh::{Boundable, Bvh};
use crate::geom::{Bounds2d, RegionPos};
use crate::raster;

/// One directed line segment in local block coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub x0: f64,
    pub z0: f64,
    pub x1: f64,
    pub z1: f64,
}

impl Segment {
    pub fn new(x0: f64, z0: f64, x1: f64, z1: f64) -> Self {
        Self { x0, z0, x1, z1 }
    }

    /// Z coordinate where this segment crosses the vertical line at `x`.
    ///
    /// Crossings are counted half-open in X, `min(x0, x1) <= x < max(x0,
    /// x1)`, so a vertex shared by two segments crosses exactly once and
    /// vertical segments never cross.
    pub fn crossing_z(&self, x: f64) -> Option<f64> {
        let (lo, hi) = if self.x0 <= self.x1 {
            (self.x0, self.x1)
        } else {
            (self.x1, self.x0)
        };
        if !(lo <= x && x < hi) {
            return None;
        }
        let t = (x - self.x0) / (self.x1 - self.x0);
        Some(self.z0 + t * (self.z1 - self.z0))
    }

    /// Squared distance from a point to the nearest point on this segment.
    pub fn distance_sq(&self, x: f64, z: f64) -> f64 {
        let dx = self.x1 - self.x0;
        let dz = self.z1 - self.z0;
        let len_sq = dx * dx + dz * dz;
        let t = if len_sq == 0.0 {
            0.0
        } else {
            (((x - self.x0) * dx + (z - self.z0) * dz) / len_sq).clamp(0.0, 1.0)
        };
        let px = self.x0 + t * dx - x;
        let pz = self.z0 + t * dz - z;
        px * px + pz * pz
    }
}

impl Boundable for Segment {
    fn bounds(&self) -> Bounds2d {
        Bounds2d::of(self.x0, self.x1, self.z0, self.z1)
    }
}

/// A closed polygon (all rings, exterior and interior) as a BVH of its
/// boundary segments.
///
/// Interior rings punch holes through even-odd counting, so no
/// exterior/interior distinction is kept after projection.
#[derive(Debug)]
pub struct ProjectedPolygon {
    segments: Bvh<Segment>,
}

impl ProjectedPolygon {
    /// Builds from closed rings of local-space points. Rings are assumed
    /// validated (closed, 4+ points) at decode time.
    pub fn new(rings: &[Vec<(f64, f64)>]) -> Self {
        let mut segments = Vec::new();
        for ring in rings {
            for pair in ring.windows(2) {
                segments.push(Segment::new(pair[0].0, pair[0].1, pair[1].0, pair[1].1));
            }
        }
        Self {
            segments: Bvh::build(segments),
        }
    }

    pub fn bounds(&self) -> Bounds2d {
        *self.segments.bounds()
    }

    /// Z coordinates where the boundary crosses the vertical line at `x`,
    /// sorted ascending. An even count is guaranteed by ring closure and
    /// the half-open crossing rule.
    pub fn crossings_in_column(&self, x: f64) -> Vec<f64> {
        let bounds = self.bounds();
        let column = Bounds2d::of(x, x, bounds.min_z() - 1.0, bounds.max_z() + 1.0);
        let mut crossings = Vec::new();
        self.segments.for_each_intersecting(&column, |segment| {
            if let Some(z) = segment.crossing_z(x) {
                crossings.push(z);
            }
        });
        crossings.sort_by(f64::total_cmp);
        crossings
    }
}

/// Geometry variant of a mapped shape.
#[derive(Debug)]
pub enum ShapeKind {
    /// One-cell-wide path along the segments.
    NarrowLine { segments: Bvh<Segment> },
    /// All cells within `radius` of any segment.
    WideLine { segments: Bvh<Segment>, radius: f64 },
    /// Even-odd interior fill.
    FillPolygon { polygon: ProjectedPolygon },
    /// Signed-distance fill, cells drawn with their clamped distance as
    /// weight.
    DistancePolygon { polygon: ProjectedPolygon, max_dist: u32 },
}

/// One source feature mapped into drawable local-space geometry.
#[derive(Debug)]
pub struct VectorShape {
    id: Arc<str>,
    layer: f64,
    draw: Vec<DrawRule>,
    kind: ShapeKind,
}

impl VectorShape {
    pub fn new(id: Arc<str>, layer: f64, draw: Vec<DrawRule>, kind: ShapeKind) -> Self {
        Self { id, layer, draw, kind }
    }

    /// Source feature id, used for cross-tile dedup and ordering
    /// tie-breaks.
    pub fn id(&self) -> &Arc<str> {
        &self.id
    }

    /// Draw layer. Shapes are applied in ascending layer order; equal
    /// layers are ordered by id so output never depends on registration
    /// order.
    pub fn layer(&self) -> f64 {
        self.layer
    }

    pub fn bounds(&self) -> Bounds2d {
        match &self.kind {
            ShapeKind::NarrowLine { segments } => *segments.bounds(),
            ShapeKind::WideLine { segments, radius } => segments.bounds().expand(*radius),
            ShapeKind::FillPolygon { polygon } => polygon.bounds(),
            ShapeKind::DistancePolygon { polygon, max_dist } => {
                polygon.bounds().expand(*max_dist as f64)
            }
        }
    }

    /// Rasterizes this shape into one region's builder.
    pub fn apply(&self, builder: &mut ChunkDataBuilder, region: RegionPos) {
        if !self.bounds().intersects(&region.block_bounds()) {
            return;
        }
        let draw = |builder: &mut ChunkDataBuilder, x: usize, z: usize, weight: i32| {
            for rule in &self.draw {
                rule.draw(builder, x, z, weight);
            }
        };
        match &self.kind {
            ShapeKind::NarrowLine { segments } => {
                raster::draw_narrow_lines(segments, region, |x, z| draw(builder, x, z, 0));
            }
            ShapeKind::WideLine { segments, radius } => {
                raster::draw_wide_lines(segments, *radius, region, |x, z| draw(builder, x, z, 0));
            }
            ShapeKind::FillPolygon { polygon } => {
                raster::fill_polygon(polygon, region, |x, z| draw(builder, x, z, 0));
            }
            ShapeKind::DistancePolygon { polygon, max_dist } => {
                raster::distance_field(polygon, region, *max_dist, |x, z, dist| {
                    draw(builder, x, z, dist);
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crossing_half_open() {
        let up = Segment::new(0.0, 0.0, 2.0, 2.0);
        assert_eq!(up.crossing_z(0.0), Some(0.0));
        assert_eq!(up.crossing_z(1.0), Some(1.0));
        // Endpoint at max X does not cross; the next segment picks it up.
        assert_eq!(up.crossing_z(2.0), None);
        assert_eq!(up.crossing_z(-0.5), None);
    }

    #[test]
    fn test_vertical_segment_never_crosses() {
        let vertical = Segment::new(1.0, 0.0, 1.0, 5.0);
        assert_eq!(vertical.crossing_z(1.0), None);
    }

    #[test]
    fn test_segment_distance() {
        let seg = Segment::new(0.0, 0.0, 10.0, 0.0);
        assert_eq!(seg.distance_sq(5.0, 3.0), 9.0);
        assert_eq!(seg.distance_sq(-4.0, 3.0), 25.0);
        assert_eq!(seg.distance_sq(7.0, 0.0), 0.0);
    }

    #[test]
    fn test_polygon_column_crossings_sorted_even() {
        // Unit square 0..4, crossed mid-column.
        let ring = vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)];
        let polygon = ProjectedPolygon::new(&[ring]);
        let crossings = polygon.crossings_in_column(2.0);
        assert_eq!(crossings, vec![0.0, 4.0]);
        assert!(polygon.crossings_in_column(5.0).is_empty());
    }

    #[test]
    fn test_shape_bounds_cover_draw_reach() {
        let ring = vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)];
        let segments = || Bvh::build(vec![Segment::new(0.0, 0.0, 4.0, 4.0)]);
        let shape = |kind| VectorShape::new(Arc::from("way/1"), 0.0, Vec::new(), kind);

        let narrow = shape(ShapeKind::NarrowLine { segments: segments() });
        assert_eq!(narrow.bounds(), Bounds2d::of(0.0, 4.0, 0.0, 4.0));

        let wide = shape(ShapeKind::WideLine { segments: segments(), radius: 2.0 });
        assert_eq!(wide.bounds(), Bounds2d::of(-2.0, 6.0, -2.0, 6.0));

        let polygon = ProjectedPolygon::new(&[ring.clone()]);
        assert_eq!(polygon.bounds(), Bounds2d::of(0.0, 4.0, 0.0, 4.0));
        let fill = shape(ShapeKind::FillPolygon {
            polygon: ProjectedPolygon::new(&[ring.clone()]),
        });
        assert_eq!(fill.bounds(), Bounds2d::of(0.0, 4.0, 0.0, 4.0));

        let distance = shape(ShapeKind::DistancePolygon {
            polygon: ProjectedPolygon::new(&[ring]),
            max_dist: 3,
        });
        assert_eq!(distance.bounds(), Bounds2d::of(-3.0, 7.0, -3.0, 7.0));
    }

    #[test]
    fn test_polygon_with_hole_has_four_crossings() {
        let outer = vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)];
        let inner = vec![(3.0, 3.0), (7.0, 3.0), (7.0, 7.0), (3.0, 7.0), (3.0, 3.0)];
        let polygon = ProjectedPolygon::new(&[outer, inner]);
        assert_eq!(polygon.crossings_in_column(5.0).len(), 4);
        assert_eq!(polygon.crossings_in_column(1.0).len(), 2);
    }
}
