//! Axis-aligned 2D bounding boxes.

use super::{Point2, TilePos};

/// An axis-aligned bounding box in 2D space.
///
/// Maintains `min <= max` on each axis. The [`Bounds2d::EMPTY`] sentinel
/// represents the empty set: it intersects nothing and unions to the other
/// operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds2d {
    min_x: f64,
    max_x: f64,
    min_z: f64,
    max_z: f64,
}

impl Bounds2d {
    /// The empty bounding box. Intersects nothing.
    pub const EMPTY: Bounds2d = Bounds2d {
        min_x: f64::INFINITY,
        max_x: f64::NEG_INFINITY,
        min_z: f64::INFINITY,
        max_z: f64::NEG_INFINITY,
    };

    /// Creates a bounding box from two coordinate pairs, sorting each axis so
    /// the `min <= max` invariant holds regardless of argument order.
    pub fn of(x0: f64, x1: f64, z0: f64, z1: f64) -> Self {
        Self {
            min_x: x0.min(x1),
            max_x: x0.max(x1),
            min_z: z0.min(z1),
            max_z: z0.max(z1),
        }
    }

    /// Bounding box covering a set of points. Empty input yields
    /// [`Bounds2d::EMPTY`].
    pub fn covering<I: IntoIterator<Item = Point2>>(points: I) -> Self {
        let mut bounds = Self::EMPTY;
        for p in points {
            bounds = bounds.including(p);
        }
        bounds
    }

    pub fn min_x(&self) -> f64 {
        self.min_x
    }

    pub fn max_x(&self) -> f64 {
        self.max_x
    }

    pub fn min_z(&self) -> f64 {
        self.min_z
    }

    pub fn max_z(&self) -> f64 {
        self.max_z
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_z > self.max_z
    }

    /// Checks whether this box and `other` overlap. Touching edges count as
    /// intersecting. The empty box intersects nothing.
    #[inline]
    pub fn intersects(&self, other: &Bounds2d) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_z <= other.max_z
            && self.max_z >= other.min_z
    }

    /// Checks whether the given point lies inside this box (edges included).
    #[inline]
    pub fn contains(&self, point: Point2) -> bool {
        self.min_x <= point.x && point.x <= self.max_x && self.min_z <= point.z && point.z <= self.max_z
    }

    /// Smallest box containing both operands.
    pub fn union(&self, other: &Bounds2d) -> Bounds2d {
        Bounds2d {
            min_x: self.min_x.min(other.min_x),
            max_x: self.max_x.max(other.max_x),
            min_z: self.min_z.min(other.min_z),
            max_z: self.max_z.max(other.max_z),
        }
    }

    /// Smallest box containing this box and the given point.
    pub fn including(&self, point: Point2) -> Bounds2d {
        Bounds2d {
            min_x: self.min_x.min(point.x),
            max_x: self.max_x.max(point.x),
            min_z: self.min_z.min(point.z),
            max_z: self.max_z.max(point.z),
        }
    }

    /// Grows the box by `d` on every side.
    pub fn expand(&self, d: f64) -> Bounds2d {
        Bounds2d {
            min_x: self.min_x - d,
            max_x: self.max_x + d,
            min_z: self.min_z - d,
            max_z: self.max_z + d,
        }
    }

    /// Center point of each axis.
    #[inline]
    pub fn center(&self) -> Point2 {
        Point2::new((self.min_x + self.max_x) * 0.5, (self.min_z + self.max_z) * 0.5)
    }

    /// Enumerates every tile of side `tile_size` that this box touches.
    ///
    /// Tiles are keyed by `floor(coordinate / tile_size)` on each axis and
    /// yielded in row-major order. An empty box yields no tiles.
    pub fn to_tiles(&self, tile_size: f64) -> Vec<TilePos> {
        if self.is_empty() {
            return Vec::new();
        }
        let min_tx = (self.min_x / tile_size).floor() as i32;
        let max_tx = (self.max_x / tile_size).floor() as i32;
        let min_tz = (self.min_z / tile_size).floor() as i32;
        let max_tz = (self.max_z / tile_size).floor() as i32;

        let mut tiles = Vec::with_capacity(((max_tx - min_tx + 1) * (max_tz - min_tz + 1)) as usize);
        for tx in min_tx..=max_tx {
            for tz in min_tz..=max_tz {
                tiles.push(TilePos::new(tx, tz));
            }
        }
        tiles
    }
}
