//! Geographic projections.
//!
//! A projection maps geographic coordinates (longitude, latitude in degrees)
//! to a dataset-local planar grid and back. Both directions are fallible:
//! inputs outside the projection's valid domain produce
//! [`ProjectionError`], which callers treat as "this tile/feature is
//! unavailable" - a recoverable condition, never a fatal error.

mod transform;
mod web_mercator;

pub use transform::ScaleOffset;
pub use web_mercator::WebMercator;

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::geom::Bounds2d;

/// Error produced when a coordinate falls outside a projection's valid
/// range.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("position ({x}, {z}) outside projection bounds")]
pub struct ProjectionError {
    pub x: f64,
    pub z: f64,
}

impl ProjectionError {
    pub(crate) fn at(x: f64, z: f64) -> Self {
        Self { x, z }
    }
}

/// A bidirectional mapping between geographic and local coordinates.
///
/// Implementations are pure and stateless; they are shared freely between
/// threads.
pub trait GeographicProjection: Send + Sync {
    /// Maps geographic coordinates to local grid coordinates.
    fn project(&self, lon: f64, lat: f64) -> Result<(f64, f64), ProjectionError>;

    /// Maps local grid coordinates back to geographic coordinates.
    fn unproject(&self, x: f64, z: f64) -> Result<(f64, f64), ProjectionError>;

    /// Valid geographic domain of this projection.
    fn geo_bounds(&self) -> Bounds2d;

    /// Approximate meters covered by one local unit at the equator.
    fn meters_per_unit(&self) -> f64;
}

/// Meters per degree of latitude on the WGS84 sphere approximation.
const METERS_PER_DEGREE: f64 = 111_319.491;

/// The identity projection: local X is longitude, local Z is latitude, both
/// in degrees.
///
/// Used by vector tile grids that key tiles on fractional-degree cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct Equirectangular;

impl GeographicProjection for Equirectangular {
    fn project(&self, lon: f64, lat: f64) -> Result<(f64, f64), ProjectionError> {
        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            return Err(ProjectionError::at(lon, lat));
        }
        Ok((lon, lat))
    }

    fn unproject(&self, x: f64, z: f64) -> Result<(f64, f64), ProjectionError> {
        if !(-180.0..=180.0).contains(&x) || !(-90.0..=90.0).contains(&z) {
            return Err(ProjectionError::at(x, z));
        }
        Ok((x, z))
    }

    fn geo_bounds(&self) -> Bounds2d {
        Bounds2d::of(-180.0, 180.0, -90.0, 90.0)
    }

    fn meters_per_unit(&self) -> f64 {
        METERS_PER_DEGREE
    }
}

/// Declarative projection configuration, resolved once at startup.
///
/// A closed set of variants: unknown projection names fail during config
/// deserialization, never at request time.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProjectionSpec {
    Equirectangular,
    WebMercator {
        zoom: u8,
    },
    /// Wraps another projection with a linear transform, e.g. to scale one
    /// degree to a number of blocks.
    ScaleOffset {
        inner: Box<ProjectionSpec>,
        #[serde(default = "one")]
        scale_x: f64,
        #[serde(default = "one")]
        scale_z: f64,
        #[serde(default)]
        offset_x: f64,
        #[serde(default)]
        offset_z: f64,
    },
}

fn one() -> f64 {
    1.0
}

impl ProjectionSpec {
    /// Instantiates the configured projection.
    pub fn build(&self) -> Arc<dyn GeographicProjection> {
        match self {
            ProjectionSpec::Equirectangular => Arc::new(Equirectangular),
            ProjectionSpec::WebMercator { zoom } => Arc::new(WebMercator::new(*zoom)),
            ProjectionSpec::ScaleOffset {
                inner,
                scale_x,
                scale_z,
                offset_x,
                offset_z,
            } => Arc::new(ScaleOffset::new(inner.build(), *scale_x, *scale_z, *offset_x, *offset_z)),
        }
    }
}
