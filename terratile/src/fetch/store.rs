//! Persistent key-value store for fetched payloads.

use super::FetchError;
use bytes::Bytes;
use std::path::Path;
use tracing::info;

/// Value layout: one flag byte followed by the payload.
const FLAG_NOT_FOUND: u8 = 0;
const FLAG_FOUND: u8 = 1;

/// Embedded persistent store mapping request identities to raw response
/// bytes.
///
/// Entries are immutable once written. A cached 404 is stored distinctly
/// from "not yet known": [`FetchStore::get`] returns `None` for an unknown
/// key and `Some(None)` for a key known to be absent upstream.
///
/// The underlying [`sled`] tree serializes writes internally and allows
/// concurrent reads; one store is opened per process.
#[derive(Clone)]
pub struct FetchStore {
    db: sled::Db,
}

impl FetchStore {
    /// Opens (or creates) the store rooted at `cache_dir`.
    pub fn open(cache_dir: &Path) -> Result<Self, FetchError> {
        info!(path = %cache_dir.display(), "opening fetch cache store");
        let db = sled::open(cache_dir).map_err(|e| FetchError::Store(e.to_string()))?;
        Ok(Self { db })
    }

    /// Looks up a key. Outer `None` = never fetched; `Some(None)` = cached
    /// NotFound; `Some(Some(bytes))` = cached payload.
    pub fn get(&self, key: &str) -> Result<Option<Option<Bytes>>, FetchError> {
        let value = self
            .db
            .get(key.as_bytes())
            .map_err(|e| FetchError::Store(e.to_string()))?;

        Ok(value.map(|raw| match raw.first() {
            Some(&FLAG_FOUND) => Some(Bytes::copy_from_slice(&raw[1..])),
            _ => None,
        }))
    }

    /// Persists an outcome for a key. `None` records a confirmed NotFound.
    pub fn put(&self, key: &str, payload: Option<&[u8]>) -> Result<(), FetchError> {
        let mut value = Vec::with_capacity(1 + payload.map_or(0, <[u8]>::len));
        match payload {
            Some(bytes) => {
                value.push(FLAG_FOUND);
                value.extend_from_slice(bytes);
            }
            None => value.push(FLAG_NOT_FOUND),
        }

        self.db
            .insert(key.as_bytes(), value)
            .map_err(|e| FetchError::Store(e.to_string()))?;
        Ok(())
    }
}
