//! In-memory cache of decoded tile futures.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use super::DatasetError;
use crate::geom::TilePos;

/// A cloneable handle on one tile's (possibly still running) decode.
pub type TileFuture<T> = Shared<BoxFuture<'static, Result<Arc<T>, DatasetError>>>;

struct CacheEntry<T> {
    future: TileFuture<T>,
    last_access: Instant,
}

/// Maps tile keys to shared futures of decoded tile content.
///
/// Entries are inserted at most once per key while present, so a tile is
/// never fetched or decoded twice concurrently. Completed failures are
/// dropped when observed (see [`TileCache::discard_failed`]) so a later
/// request can retry; successes stay until pruned by time-since-access.
pub struct TileCache<T> {
    entries: DashMap<TilePos, CacheEntry<T>>,
}

impl<T: Send + Sync + 'static> TileCache<T> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Returns the cached future for `pos`, creating it with `make` if
    /// absent. The access time is refreshed either way.
    pub fn get_or_insert_with(
        &self,
        pos: TilePos,
        make: impl FnOnce() -> BoxFuture<'static, Result<Arc<T>, DatasetError>>,
    ) -> TileFuture<T> {
        match self.entries.entry(pos) {
            Entry::Occupied(mut entry) => {
                let entry = entry.get_mut();
                entry.last_access = Instant::now();
                entry.future.clone()
            }
            Entry::Vacant(entry) => {
                let future = make().shared();
                entry.insert(CacheEntry {
                    future: future.clone(),
                    last_access: Instant::now(),
                });
                future
            }
        }
    }

    /// Drops the entry for `pos` if it still holds the observed (failed)
    /// future, making room for a retry. A newer entry is left alone.
    pub fn discard_failed(&self, pos: TilePos, observed: &TileFuture<T>) {
        self.entries
            .remove_if(&pos, |_, entry| entry.future.ptr_eq(observed));
    }

    /// Evicts completed entries not accessed within `max_age`.
    ///
    /// An entry whose future has not resolved yet is never evicted, so
    /// pruning cannot cancel an in-flight fetch.
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
            debug!(evicted, remaining = self.entries.len(), "pruned tile cache");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Send + Sync + 'static> Default for TileCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ready_tile(value: u32) -> BoxFuture<'static, Result<Arc<u32>, DatasetError>> {
        async move { Ok(Arc::new(value)) }.boxed()
    }

    #[tokio::test]
    async fn test_insert_once_per_key() {
        let cache: TileCache<u32> = TileCache::new();
        let pos = TilePos::new(1, 2);
        let builds = AtomicU32::new(0);

        for _ in 0..5 {
            let fut = cache.get_or_insert_with(pos, || {
                builds.fetch_add(1, Ordering::SeqCst);
                ready_tile(7)
            });
            assert_eq!(*fut.await.unwrap(), 7);
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_discard_failed_allows_retry() {
        let cache: TileCache<u32> = TileCache::new();
        let pos = TilePos::new(0, 0);

        let failing = cache.get_or_insert_with(pos, || {
            async move {
                Err(DatasetError::Decode {
                    pos: TilePos::new(0, 0),
                    message: "bad payload".to_string(),
                })
            }
            .boxed()
        });
        assert!(failing.clone().await.is_err());
        cache.discard_failed(pos, &failing);

        let fut = cache.get_or_insert_with(pos, || ready_tile(9));
        assert_eq!(*fut.await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_prune_keeps_recent_and_in_flight() {
        let cache: TileCache<u32> = TileCache::new();

        // Completed entry, old enough to evict with a zero max_age.
        let done = cache.get_or_insert_with(TilePos::new(0, 0), || ready_tile(1));
        done.await.unwrap();

        // In-flight entry must survive pruning.
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let pending = cache.get_or_insert_with(TilePos::new(1, 0), || {
            async move {
                let _ = rx.await;
                Ok(Arc::new(2))
            }
            .boxed()
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.prune(Duration::ZERO);
        assert_eq!(cache.len(), 1, "in-flight entry retained");

        tx.send(()).unwrap();
        assert_eq!(*pending.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_prune_refreshed_by_access() {
        let cache: TileCache<u32> = TileCache::new();
        let pos = TilePos::new(3, 3);
        cache.get_or_insert_with(pos, || ready_tile(5)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        // Touch the entry, then prune with a window shorter than the sleep.
        cache.get_or_insert_with(pos, || unreachable!("entry exists"));
        cache.prune(Duration::from_millis(15));
        assert_eq!(cache.len(), 1);
    }
}
