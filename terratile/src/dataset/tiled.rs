//! Generic tiled dataset plumbing.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{try_join_all, BoxFuture};

use super::{DatasetError, TileCache};
use crate::geom::{Bounds2d, TilePos};

/// Fetches and decodes one tile of a dataset.
///
/// The returned future must own everything it needs (implementations clone
/// `Arc` handles into it) so it can be cached independently of the loader
/// borrow.
pub trait TileLoader: Send + Sync + 'static {
    type Tile: Send + Sync + 'static;

    fn load(&self, pos: TilePos) -> BoxFuture<'static, Result<Self::Tile, DatasetError>>;
}

/// Decomposes area queries into tile keys and caches decoded tiles.
///
/// Coordinates are in the owning dataset's local grid; `tile_size` local
/// units per tile on each axis.
pub struct TiledDataset<L: TileLoader> {
    loader: L,
    tile_size: f64,
    cache: TileCache<L::Tile>,
}

impl<L: TileLoader> TiledDataset<L> {
    pub fn new(loader: L, tile_size: f64) -> Self {
        Self {
            loader,
            tile_size,
            cache: TileCache::new(),
        }
    }

    pub fn tile_size(&self) -> f64 {
        self.tile_size
    }

    /// Tile key containing the given local coordinates.
    pub fn tile_at(&self, x: f64, z: f64) -> TilePos {
        TilePos::new(
            (x / self.tile_size).floor() as i32,
            (z / self.tile_size).floor() as i32,
        )
    }

    /// Awaits one tile, decoding it at most once while its future is
    /// cached. A failed decode is forgotten once observed so later calls
    /// may retry.
    pub async fn tile(&self, pos: TilePos) -> Result<Arc<L::Tile>, DatasetError> {
        let future = self.cache.get_or_insert_with(pos, || {
            let inner = self.loader.load(pos);
            Box::pin(async move { inner.await.map(Arc::new) })
        });

        match future.clone().await {
            Ok(tile) => Ok(tile),
            Err(e) => {
                self.cache.discard_failed(pos, &future);
                Err(e)
            }
        }
    }

    /// Awaits every tile the given local bounds touch, in parallel.
    pub async fn tiles_in(
        &self,
        bounds: &Bounds2d,
    ) -> Result<Vec<(TilePos, Arc<L::Tile>)>, DatasetError> {
        let positions = bounds.to_tiles(self.tile_size);
        let tiles = try_join_all(positions.iter().map(|&pos| self.tile(pos))).await?;
        Ok(positions.into_iter().zip(tiles).collect())
    }

    /// Evicts decoded tiles not accessed within `max_age`; never touches
    /// in-flight decodes.
    pub fn prune(&self, max_age: Duration) {
        self.cache.prune(max_age);
    }

    pub fn cached_tiles(&self) -> usize {
        self.cache.len()
    }
}
