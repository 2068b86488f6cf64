//! Projection transforms.

use std::sync::Arc;

use super::{GeographicProjection, ProjectionError};
use crate::geom::Bounds2d;

/// Wraps a projection and applies a linear transform to its local
/// coordinates.
///
/// Typically used to scale degrees to blocks, or to flip an axis so Z grows
/// south in the generated world.
pub struct ScaleOffset {
    inner: Arc<dyn GeographicProjection>,
    scale_x: f64,
    scale_z: f64,
    offset_x: f64,
    offset_z: f64,
}

impl ScaleOffset {
    pub fn new(
        inner: Arc<dyn GeographicProjection>,
        scale_x: f64,
        scale_z: f64,
        offset_x: f64,
        offset_z: f64,
    ) -> Self {
        Self {
            inner,
            scale_x,
            scale_z,
            offset_x,
            offset_z,
        }
    }
}

impl GeographicProjection for ScaleOffset {
    fn project(&self, lon: f64, lat: f64) -> Result<(f64, f64), ProjectionError> {
        let (x, z) = self.inner.project(lon, lat)?;
        Ok((x * self.scale_x + self.offset_x, z * self.scale_z + self.offset_z))
    }

    fn unproject(&self, x: f64, z: f64) -> Result<(f64, f64), ProjectionError> {
        self.inner
            .unproject((x - self.offset_x) / self.scale_x, (z - self.offset_z) / self.scale_z)
    }

    fn geo_bounds(&self) -> Bounds2d {
        self.inner.geo_bounds()
    }

    fn meters_per_unit(&self) -> f64 {
        self.inner.meters_per_unit() / self.scale_x.abs()
    }
}
