//! Corner-defined bounding boxes.
//!
//! Projecting an axis-aligned box corner-by-corner yields an arbitrary
//! (possibly rotated or warped) quadrilateral. [`CornerBoundingBox2d`] keeps
//! the four projected corners plus a conservative axis-aligned hull sampled
//! from corners *and* edge midpoints, so projection distortion along the
//! edges cannot push geometry outside the hull used for BVH and tile
//! queries.

use super::{Bounds2d, Point2};
use crate::projection::{GeographicProjection, ProjectionError};

/// A quadrilateral defined by its four corners.
///
/// Corners are named by their parametric position: `p00` at `(0, 0)`, `p10`
/// at `(1, 0)` (max X edge), `p01` at `(0, 1)` (max Z edge), `p11` at
/// `(1, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerBoundingBox2d {
    p00: Point2,
    p10: Point2,
    p01: Point2,
    p11: Point2,
    hull: Bounds2d,
}

impl CornerBoundingBox2d {
    /// Wraps an axis-aligned box. The hull equals the input bounds.
    pub fn axis_aligned(bounds: &Bounds2d) -> Self {
        Self {
            p00: Point2::new(bounds.min_x(), bounds.min_z()),
            p10: Point2::new(bounds.max_x(), bounds.min_z()),
            p01: Point2::new(bounds.min_x(), bounds.max_z()),
            p11: Point2::new(bounds.max_x(), bounds.max_z()),
            hull: *bounds,
        }
    }

    /// Bilinear interpolation within the quadrilateral.
    ///
    /// `(0, 0)` is `p00`, `(1, 1)` is `p11`. Fractions outside `[0, 1]`
    /// extrapolate.
    pub fn point(&self, fx: f64, fz: f64) -> Point2 {
        let lo = self.p00.lerp(self.p10, fx);
        let hi = self.p01.lerp(self.p11, fx);
        lo.lerp(hi, fz)
    }

    /// Converts a geographic-space box to local space by projecting each
    /// corner.
    ///
    /// Fails with [`ProjectionError`] when any sampled point falls outside
    /// the projection's valid range; callers treat this as "the area is
    /// unavailable", not as a fatal error.
    pub fn from_geo(&self, projection: &dyn GeographicProjection) -> Result<Self, ProjectionError> {
        self.map_points(|p| projection.project(p.x, p.z).map(|(x, z)| Point2::new(x, z)))
    }

    /// Converts a local-space box to geographic space by unprojecting each
    /// corner.
    pub fn to_geo(&self, projection: &dyn GeographicProjection) -> Result<Self, ProjectionError> {
        self.map_points(|p| projection.unproject(p.x, p.z).map(|(lon, lat)| Point2::new(lon, lat)))
    }

    /// Axis-aligned hull of the quadrilateral, suitable for BVH and tile
    /// queries.
    pub fn axis_align(&self) -> Bounds2d {
        self.hull
    }

    fn map_points(
        &self,
        f: impl Fn(Point2) -> Result<Point2, ProjectionError>,
    ) -> Result<Self, ProjectionError> {
        let p00 = f(self.p00)?;
        let p10 = f(self.p10)?;
        let p01 = f(self.p01)?;
        let p11 = f(self.p11)?;

        // Edge midpoints are mapped too: on a warped projection the image of
        // an edge can bulge past the segment between its mapped endpoints.
        let hull = Bounds2d::covering([
            p00,
            p10,
            p01,
            p11,
            f(self.p00.lerp(self.p10, 0.5))?,
            f(self.p01.lerp(self.p11, 0.5))?,
            f(self.p00.lerp(self.p01, 0.5))?,
            f(self.p10.lerp(self.p11, 0.5))?,
        ]);

        Ok(Self { p00, p10, p01, p11, hull })
    }
}
