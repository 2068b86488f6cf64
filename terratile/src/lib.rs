//! Terratile - real-world terrain data for procedural world generation
//!
//! This library converts real-world geographic data (elevation rasters and
//! vector features such as roads, buildings and water bodies) into cached,
//! queryable per-region terrain attributes.
//!
//! # High-Level API
//!
//! The [`bake`] module provides the top-level facade:
//!
//! ```ignore
//! use terratile::bake::EarthGenerator;
//! use terratile::config::GeneratorConfig;
//! use terratile::geom::RegionPos;
//!
//! let config = GeneratorConfig::from_json(&std::fs::read_to_string("config.json")?)?;
//! let generator = EarthGenerator::new(config, runtime.handle().clone())?;
//!
//! // The single blocking boundary of the whole system.
//! let data = generator.region_blocking(RegionPos::new(812, -170))?;
//! println!("surface at (0, 0): {}", data.surface_height(0, 0));
//! ```
//!
//! Everything below the facade is asynchronous: datasets decompose queries
//! into tiles, tiles are fetched through a deduplicating persistent fetch
//! cache, and per-region results are composed exactly once per region key.

pub mod bake;
pub mod bvh;
pub mod config;
pub mod dataset;
pub mod feature;
pub mod fetch;
pub mod geom;
pub mod logging;
pub mod projection;
pub mod raster;
pub mod vector;

/// Version of the terratile library.
///
/// The version is defined in `Cargo.toml` and injected at compile time; it is
/// also embedded in the User-Agent header sent to dataset sources.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
