//! Geometric primitives shared by the spatial index, projections and
//! datasets.
//!
//! Provides 2D points, axis-aligned bounds, tile/region grid coordinates and
//! the distortion-aware [`CornerBoundingBox2d`] used to carry a region's
//! footprint between geographic and local space.

mod bounds;
mod corner;

pub use bounds::Bounds2d;
pub use corner::CornerBoundingBox2d;

/// Side length of a region in blocks (columns per axis).
pub const REGION_SIZE: i32 = 16;

/// An immutable point in 2D space.
///
/// Depending on context the axes are either geographic (`x` = longitude,
/// `z` = latitude) or local block coordinates. No invariants beyond
/// finiteness are assumed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2 {
    pub x: f64,
    pub z: f64,
}

impl Point2 {
    pub const fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }

    /// Linear interpolation between two points.
    #[inline]
    pub fn lerp(self, other: Point2, t: f64) -> Point2 {
        Point2 {
            x: self.x + (other.x - self.x) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }
}

/// Integer coordinates of one fixed-size cell in a dataset-specific grid.
///
/// The grid origin and scale are projection parameters of the owning
/// dataset, not global constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TilePos {
    pub x: i32,
    pub z: i32,
}

impl TilePos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

impl std::fmt::Display for TilePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Coordinates of one region (a 16x16 column of output), the unit of final
/// output composition. Generally larger than one dataset tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionPos {
    pub x: i32,
    pub z: i32,
}

impl RegionPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Smallest block X coordinate contained in this region.
    #[inline]
    pub fn min_block_x(&self) -> i32 {
        self.x * REGION_SIZE
    }

    /// Smallest block Z coordinate contained in this region.
    #[inline]
    pub fn min_block_z(&self) -> i32 {
        self.z * REGION_SIZE
    }

    /// Axis-aligned footprint of this region in local block coordinates.
    pub fn block_bounds(&self) -> Bounds2d {
        let x = self.min_block_x() as f64;
        let z = self.min_block_z() as f64;
        Bounds2d::of(x, x + REGION_SIZE as f64, z, z + REGION_SIZE as f64)
    }
}

impl std::fmt::Display for RegionPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "region({}, {})", self.x, self.z)
    }
}
