//! Region bake pipeline and its cache.
//!
//! ```text
//!   EarthGenerator::region(pos)
//!        |
//!        v
//!   RegionCache ---- at most one bake per region key
//!        |
//!        v
//!   baker chain ---- requests in parallel, bakes in registered order
//!     |   |   |
//!     v   v   v
//!   heights  landcover  features      (tiled datasets)
//! ```
//!
//! A region's composite is computed exactly once while its future is
//! cached; failed computations are dropped on observation so a later
//! request retries.

mod bakers;
mod chunk_data;

pub use bakers::{Baker, BakerData};
pub use chunk_data::{
    ChunkData, ChunkDataBuilder, WaterType, WATER_DEPTH_OFFSET, WATER_DEPTH_UNKNOWN,
};

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::future::{try_join_all, BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::config::{ConfigError, GeneratorConfig};
use crate::dataset::{
    DatasetError, ScalarDataset, ScalarTileLoader, VectorTileDataset, VectorTileLoader,
};
use crate::fetch::{FetchCache, FetchConfig, FetchError};
use crate::geom::{CornerBoundingBox2d, RegionPos};
use crate::projection::{GeographicProjection, ProjectionError};
use crate::vector::FeatureMapper;

/// Failure of one region's bake. Cloneable so a shared future can hand
/// the same failure to every waiter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BakeError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

/// Failure to assemble a generator from configuration.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Everything the baker chain reads: the generator projection, the
/// datasets, and the registered baker order. Assembled once at startup,
/// immutable afterwards.
pub struct GeneratorDatasets {
    pub projection: Arc<dyn GeographicProjection>,
    pub heights: ScalarDataset,
    pub landcover: ScalarDataset,
    pub features: VectorTileDataset,
    pub bakers: Vec<Baker>,
    pub default_height: i32,
}

/// Bakes one region from scratch.
///
/// A region wholly outside the projection domain bakes to the blank
/// composite (default height, unknown-depth ocean everywhere) rather
/// than failing; there is simply no data there.
async fn bake_region(
    datasets: Arc<GeneratorDatasets>,
    pos: RegionPos,
) -> Result<Arc<ChunkData>, BakeError> {
    let mut builder = ChunkDataBuilder::new(datasets.default_height);

    let local = CornerBoundingBox2d::axis_aligned(&pos.block_bounds());
    let bounds_geo = match local.to_geo(&*datasets.projection) {
        Ok(bounds) => bounds,
        Err(e) => {
            debug!(region = %pos, error = %e, "region outside projection domain");
            builder.mark_all_ocean_unknown();
            return Ok(Arc::new(builder.build()));
        }
    };

    let requests = datasets.bakers.iter().map(|baker| {
        let datasets = &datasets;
        let bounds_geo = &bounds_geo;
        async move { baker.request(datasets, bounds_geo).await }
    });
    let payloads = try_join_all(requests).await?;

    for (baker, payload) in datasets.bakers.iter().zip(payloads) {
        baker.bake(pos, payload, &mut builder);
    }
    Ok(Arc::new(builder.build()))
}

type RegionFuture = Shared<BoxFuture<'static, Result<Arc<ChunkData>, BakeError>>>;

struct RegionEntry {
    future: RegionFuture,
    last_access: Instant,
}

/// Per-region composite cache with at-most-once computation per key.
pub struct RegionCache {
    datasets: Arc<GeneratorDatasets>,
    entries: DashMap<RegionPos, RegionEntry>,
}

impl RegionCache {
    pub fn new(datasets: Arc<GeneratorDatasets>) -> Self {
        Self {
            datasets,
            entries: DashMap::new(),
        }
    }

    pub fn datasets(&self) -> &Arc<GeneratorDatasets> {
        &self.datasets
    }

    /// Returns the region's composite, baking it if this is the first
    /// request. Concurrent callers share one bake; a failed bake is
    /// forgotten so the next request retries.
    pub async fn get(&self, pos: RegionPos) -> Result<Arc<ChunkData>, BakeError> {
        let future = self.entry_future(pos);
        match future.clone().await {
            Ok(data) => Ok(data),
            Err(e) => {
                self.entries
                    .remove_if(&pos, |_, entry| RegionFuture::ptr_eq(&entry.future, &future));
                Err(e)
            }
        }
    }

    /// The completed composite if one is already available, without
    /// triggering or waiting for a bake.
    pub fn try_get(&self, pos: RegionPos) -> Option<Result<Arc<ChunkData>, BakeError>> {
        let entry = self.entries.get(&pos)?;
        entry.future.peek().cloned()
    }

    fn entry_future(&self, pos: RegionPos) -> RegionFuture {
        match self.entries.entry(pos) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                occupied.get_mut().last_access = Instant::now();
                occupied.get().future.clone()
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let future = bake_region(self.datasets.clone(), pos).boxed().shared();
                vacant.insert(RegionEntry {
                    future: future.clone(),
                    last_access: Instant::now(),
                });
                future
            }
        }
    }

    /// Evicts completed composites not accessed within `max_age`.
    /// In-flight bakes are never evicted, so eviction cannot cancel a
    /// computation.
    pub fn prune(&self, max_age: Duration) {
        let mut evicted = 0usize;
        self.entries.retain(|_, entry| {
            let keep = entry.future.peek().is_none() || entry.last_access.elapsed() <= max_age;
            if !keep {
                evicted += 1;
            }
            keep
        });
        if evicted > 0 {
            debug!(evicted, remaining = self.entries.len(), "pruned region cache");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Top-level facade: configuration in, per-region terrain data out.
pub struct EarthGenerator {
    regions: RegionCache,
    runtime: Handle,
}

impl EarthGenerator {
    /// Validates the configuration and assembles the full dataset stack.
    pub fn new(config: GeneratorConfig, runtime: Handle) -> Result<Self, GeneratorError> {
        config.validate()?;

        let projection = config.projection.build();
        let fetch = Arc::new(FetchCache::open(
            &config.cache_dir.join("fetch"),
            FetchConfig {
                retries: config.fetch.retries,
                timeout: Duration::from_secs(config.fetch.timeout_secs),
            },
        )?);

        let heights = ScalarDataset::new(
            config.heights.projection.build(),
            ScalarTileLoader::new(
                fetch.clone(),
                config.heights.urls.clone(),
                config.heights.resolution,
            ),
            config.heights.blend,
        );
        let landcover = ScalarDataset::new(
            config.landcover.projection.build(),
            ScalarTileLoader::new(
                fetch.clone(),
                config.landcover.urls.clone(),
                config.landcover.resolution,
            ),
            config.landcover.blend,
        );
        let features = VectorTileDataset::new(
            VectorTileLoader::new(
                fetch,
                config.features.urls.clone(),
                Arc::new(FeatureMapper::new(config.features.rules.clone())),
                projection.clone(),
            ),
            config.features.tile_degrees,
        );

        let datasets = Arc::new(GeneratorDatasets {
            projection,
            heights,
            landcover,
            features,
            bakers: config.bakers.clone(),
            default_height: config.default_height,
        });
        info!(
            bakers = datasets.bakers.len(),
            cache_dir = %config.cache_dir.display(),
            "earth generator ready"
        );

        Ok(Self {
            regions: RegionCache::new(datasets),
            runtime,
        })
    }

    /// Asynchronous region access; the form every internal caller uses.
    pub async fn region(&self, pos: RegionPos) -> Result<Arc<ChunkData>, BakeError> {
        self.regions.get(pos).await
    }

    /// Synchronous region access for callers outside the runtime. This is
    /// the single blocking boundary of the system; never call it from
    /// within the runtime's own threads.
    pub fn region_blocking(&self, pos: RegionPos) -> Result<Arc<ChunkData>, BakeError> {
        self.runtime.block_on(self.regions.get(pos))
    }

    /// The region's composite if it is already baked.
    pub fn try_region(&self, pos: RegionPos) -> Option<Result<Arc<ChunkData>, BakeError>> {
        self.regions.try_get(pos)
    }

    /// Evicts idle entries from the region cache and every dataset tile
    /// cache.
    pub fn prune(&self, max_age: Duration) {
        self.regions.prune(max_age);
        let datasets = self.regions.datasets();
        datasets.heights.prune(max_age);
        datasets.landcover.prune(max_age);
        datasets.features.prune(max_age);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::BlendMode;
    use crate::fetch::{FetchStore, HttpGet};
    use crate::projection::Equirectangular;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Serves terrarium tiles for every request and counts them.
    struct CountingTiles {
        requests: AtomicU32,
    }

    impl HttpGet for CountingTiles {
        fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Option<Bytes>, FetchError>> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            let body = if url.starts_with("http://h/") {
                Some(Bytes::from(crate::dataset::terrarium_png(16, |_, _| 10.0)))
            } else {
                // Vector tiles absent everywhere.
                None
            };
            async move { Ok(body) }.boxed()
        }
    }

    fn test_datasets(dir: &std::path::Path) -> (Arc<GeneratorDatasets>, Arc<CountingTiles>) {
        let client = Arc::new(CountingTiles {
            requests: AtomicU32::new(0),
        });
        let store = FetchStore::open(dir).unwrap();
        let fetch = Arc::new(FetchCache::new(store, client.clone(), 1));
        let projection: Arc<dyn GeographicProjection> = Arc::new(Equirectangular);

        let datasets = Arc::new(GeneratorDatasets {
            projection: projection.clone(),
            heights: ScalarDataset::new(
                projection.clone(),
                ScalarTileLoader::new(fetch.clone(), vec!["http://h/${x}/${z}".to_string()], 16),
                BlendMode::Nearest,
            ),
            landcover: ScalarDataset::new(
                projection.clone(),
                ScalarTileLoader::new(fetch.clone(), vec!["http://l/${x}/${z}".to_string()], 16),
                BlendMode::Nearest,
            ),
            features: VectorTileDataset::new(
                VectorTileLoader::new(
                    fetch,
                    vec!["http://v/${x}/${z}".to_string()],
                    Arc::new(FeatureMapper::new(Vec::new())),
                    projection,
                ),
                1.0,
            ),
            bakers: vec![Baker::Heights, Baker::Biomes, Baker::Features],
            default_height: -5,
        });
        (datasets, client)
    }

    #[tokio::test]
    async fn test_bake_produces_heights() {
        let dir = tempfile::tempdir().unwrap();
        let (datasets, _) = test_datasets(dir.path());
        let cache = RegionCache::new(datasets);

        let data = cache.get(RegionPos::new(0, 0)).await.unwrap();
        assert_eq!(data.surface_height(0, 0), 10);
        assert_eq!(data.water_type(0, 0), WaterType::None);
    }

    #[tokio::test]
    async fn test_region_outside_projection_is_blank_ocean() {
        let dir = tempfile::tempdir().unwrap();
        let (datasets, client) = test_datasets(dir.path());
        let cache = RegionCache::new(datasets);

        // Far past 180 degrees in block space.
        let data = cache.get(RegionPos::new(1000, 0)).await.unwrap();
        assert_eq!(data.surface_height(0, 0), -5);
        assert_eq!(data.water_type(8, 8), WaterType::Ocean);
        assert_eq!(data.water_depth(8, 8), None);
        assert_eq!(client.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_bake_once() {
        let dir = tempfile::tempdir().unwrap();
        let (datasets, _) = test_datasets(dir.path());
        let cache = Arc::new(RegionCache::new(datasets));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(
                async move { cache.get(RegionPos::new(0, 0)).await },
            ));
        }
        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap().unwrap());
        }

        assert_eq!(cache.len(), 1);
        for pair in results.windows(2) {
            assert!(Arc::ptr_eq(&pair[0], &pair[1]));
        }
    }

    #[tokio::test]
    async fn test_try_get_before_and_after() {
        let dir = tempfile::tempdir().unwrap();
        let (datasets, _) = test_datasets(dir.path());
        let cache = RegionCache::new(datasets);
        let pos = RegionPos::new(1, 1);

        assert!(cache.try_get(pos).is_none());
        let baked = cache.get(pos).await.unwrap();
        let peeked = cache.try_get(pos).unwrap().unwrap();
        assert!(Arc::ptr_eq(&baked, &peeked));
    }

    #[tokio::test]
    async fn test_prune_drops_idle_completed_regions() {
        let dir = tempfile::tempdir().unwrap();
        let (datasets, _) = test_datasets(dir.path());
        let cache = RegionCache::new(datasets);

        cache.get(RegionPos::new(0, 0)).await.unwrap();
        assert_eq!(cache.len(), 1);
        cache.prune(Duration::ZERO);
        assert!(cache.is_empty());
    }
}
