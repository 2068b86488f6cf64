//! Asynchronous tiled datasets.
//!
//! A dataset maps a geographic query onto a grid of fixed-size tiles,
//! fetches and decodes each tile at most once while its future is cached,
//! and assembles the per-tile results into the caller's answer. Two
//! capability shapes exist:
//!
//! - [`ScalarDataset`]: interpolated numeric samples at a point or over a
//!   grid, with `NaN` as the explicit "no data" signal.
//! - [`VectorTileDataset`]: variable-length sets of vector shapes
//!   intersecting a region, deduplicated across tile boundaries.
//!
//! Decoded tiles live in an in-memory [`TileCache`] bounded by
//! time-since-access pruning; failures are cached only transiently so a
//! later request may retry the decode.

mod scalar;
mod tile_cache;
mod tiled;
mod vector;

pub use scalar::{BlendMode, ScalarDataset, ScalarTile, ScalarTileLoader};
pub use tile_cache::{TileCache, TileFuture};
pub use tiled::{TileLoader, TiledDataset};
pub use vector::{VectorTileDataset, VectorTileLoader};

#[cfg(test)]
pub(crate) use scalar::tests::terrarium_png;

use thiserror::Error;

use crate::fetch::{FetchError, TemplateError};
use crate::geom::TilePos;
use crate::projection::ProjectionError;

/// Errors surfaced by dataset queries.
///
/// Cloneable so one failed tile decode can be observed by every waiter of
/// its shared future.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatasetError {
    /// The underlying fetch failed after retries.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A tile payload was structurally invalid. Fails only requests that
    /// need this tile.
    #[error("failed to decode tile {pos}: {message}")]
    Decode { pos: TilePos, message: String },

    /// The query point lies outside the dataset projection's valid range.
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    /// An URL template referenced an unknown property. Config validation
    /// makes this unreachable for well-formed configs.
    #[error(transparent)]
    Template(#[from] TemplateError),
}
