//! Web Mercator projection.

use super::{GeographicProjection, ProjectionError};
use crate::geom::Bounds2d;
use std::f64::consts::PI;

/// Web Mercator valid latitude range; the projection diverges at the poles.
pub const MAX_LAT: f64 = 85.05112878;
pub const MIN_LAT: f64 = -MAX_LAT;

/// Equatorial circumference used for the meters-per-unit estimate.
const EARTH_CIRCUMFERENCE: f64 = 40_075_016.686;

/// The spherical Web Mercator projection used by slippy-map tile servers.
///
/// Local coordinates are measured in tile-pixel units: at zoom `z` the whole
/// world maps onto a square of side `256 * 2^z`, X growing east and Z growing
/// south. Latitudes beyond +/-85.05112878 degrees are out of domain.
#[derive(Debug, Clone, Copy)]
pub struct WebMercator {
    zoom: u8,
}

impl WebMercator {
    pub fn new(zoom: u8) -> Self {
        Self { zoom }
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    #[inline]
    fn world_size(&self) -> f64 {
        256.0 * 2.0_f64.powi(self.zoom as i32)
    }
}

impl GeographicProjection for WebMercator {
    fn project(&self, lon: f64, lat: f64) -> Result<(f64, f64), ProjectionError> {
        if !(-180.0..=180.0).contains(&lon) || !(MIN_LAT..=MAX_LAT).contains(&lat) {
            return Err(ProjectionError::at(lon, lat));
        }

        let size = self.world_size();
        let x = (lon + 180.0) / 360.0 * size;
        let lat_rad = lat.to_radians();
        let z = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * size;
        Ok((x, z))
    }

    fn unproject(&self, x: f64, z: f64) -> Result<(f64, f64), ProjectionError> {
        let size = self.world_size();
        if !(0.0..=size).contains(&x) || !(0.0..=size).contains(&z) {
            return Err(ProjectionError::at(x, z));
        }

        let lon = x / size * 360.0 - 180.0;
        let lat = (PI * (1.0 - 2.0 * z / size)).sinh().atan().to_degrees();
        Ok((lon, lat))
    }

    fn geo_bounds(&self) -> Bounds2d {
        Bounds2d::of(-180.0, 180.0, MIN_LAT, MAX_LAT)
    }

    fn meters_per_unit(&self) -> f64 {
        EARTH_CIRCUMFERENCE / self.world_size()
    }
}
