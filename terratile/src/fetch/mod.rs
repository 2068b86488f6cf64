//! Deduplicated, retrying network fetch with a persistent write-through
//! cache.
//!
//! [`FetchCache`] is keyed by the normalized request URL. Concurrent callers
//! asking for the same key observe exactly one network attempt: the first
//! caller installs a shared future in the in-flight map and everyone else
//! awaits it. Successful responses (and confirmed 404s) are persisted to an
//! embedded [`sled`] store before the future resolves, so later lookups
//! never touch the network again.
//!
//! ```text
//! get(url) ──► store hit? ──────────────────────► bytes / NotFound
//!                 │ miss
//!                 ▼
//!           in-flight map ──► join existing attempt
//!                 │ vacant
//!                 ▼
//!           retry loop ──► persist ──► resolve all waiters
//! ```
//!
//! The persistent store grows monotonically; size management is an
//! operational concern outside this module.

mod client;
mod store;
mod template;

pub use client::{HttpGet, ReqwestGet};
pub use store::FetchStore;
pub use template::{format_url, template_keys, TemplateError};

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors produced while fetching a resource.
///
/// Variants carry rendered messages instead of source errors so results can
/// be cloned into every waiter of a shared in-flight fetch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Server answered with a non-success, non-404 status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The request could not be sent or the body could not be read.
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// Local file read failed for a reason other than the file missing.
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },

    /// The persistent store failed.
    #[error("fetch store error: {0}")]
    Store(String),

    /// Every retry attempt for one URL failed.
    #[error("{url}: all {attempts} attempts failed, last: {}", last_cause(.causes))]
    Exhausted {
        url: String,
        attempts: u32,
        causes: Vec<FetchError>,
    },

    /// Every candidate source errored (none even answered 404).
    #[error("all candidate sources failed, last: {}", last_cause(.causes))]
    AllSourcesFailed { causes: Vec<FetchError> },

    /// The source list was empty; a configuration bug.
    #[error("no candidate sources configured")]
    NoSources,
}

fn last_cause(causes: &[FetchError]) -> String {
    causes
        .last()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Retry and timeout policy for the fetch cache.
#[derive(Debug, Clone, Copy)]
pub struct FetchConfig {
    /// Attempts per URL before giving up.
    pub retries: u32,
    /// Per-attempt request timeout.
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            timeout: Duration::from_secs(30),
        }
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<Option<Bytes>, FetchError>>>;

/// Deduplicating, retrying fetch cache backed by a persistent key-value
/// store.
///
/// `Ok(None)` means the upstream confirmed the resource does not exist;
/// this outcome is cached just like a successful body, distinct from "not
/// yet known".
pub struct FetchCache {
    client: Arc<dyn HttpGet>,
    store: FetchStore,
    retries: u32,
    in_flight: DashMap<String, SharedFetch>,
}

impl FetchCache {
    /// Opens the persistent store under `cache_dir` and builds a cache using
    /// the default HTTP client.
    pub fn open(cache_dir: &std::path::Path, config: FetchConfig) -> Result<Self, FetchError> {
        let store = FetchStore::open(cache_dir)?;
        let client = Arc::new(ReqwestGet::new(config.timeout)?);
        Ok(Self::new(store, client, config.retries))
    }

    /// Builds a cache over an existing store and client. Test code injects
    /// stub clients here.
    pub fn new(store: FetchStore, client: Arc<dyn HttpGet>, retries: u32) -> Self {
        Self {
            client,
            store,
            retries: retries.max(1),
            in_flight: DashMap::new(),
        }
    }

    /// Fetches one URL, going to the network at most once per key across all
    /// concurrent callers and at most once per key ever after a cacheable
    /// outcome.
    ///
    /// `file://` URLs are read from the local filesystem directly; they are
    /// already on disk, so they bypass both the store and the in-flight map.
    pub async fn get(&self, url: &str) -> Result<Option<Bytes>, FetchError> {
        if let Some(path) = url.strip_prefix("file://") {
            return read_local(path).await;
        }

        if let Some(cached) = self.store.get(url)? {
            debug!(url, "fetch cache hit");
            return Ok(cached);
        }

        let shared = match self.in_flight.entry(url.to_string()) {
            Entry::Occupied(entry) => {
                debug!(url, "joining in-flight fetch");
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                let fut = fetch_and_persist(
                    self.client.clone(),
                    self.store.clone(),
                    url.to_string(),
                    self.retries,
                )
                .boxed()
                .shared();
                entry.insert(fut.clone());
                fut
            }
        };

        let result = shared.clone().await;
        // Only drop our own entry; a newer attempt may already occupy the slot.
        self.in_flight.remove_if(url, |_, fut| fut.ptr_eq(&shared));
        result
    }

    /// Tries candidate sources in order, returning the first success or
    /// confirmed NotFound.
    ///
    /// Errors only if every source errored; a single 404 among failures
    /// still counts as a valid "does not exist" answer.
    pub async fn get_first(&self, urls: &[String]) -> Result<Option<Bytes>, FetchError> {
        if urls.is_empty() {
            return Err(FetchError::NoSources);
        }

        let mut causes = Vec::new();
        let mut found_missing = false;
        for url in urls {
            match self.get(url).await {
                Ok(Some(bytes)) => return Ok(Some(bytes)),
                Ok(None) => found_missing = true,
                Err(e) => causes.push(e),
            }
        }

        if found_missing {
            Ok(None)
        } else {
            Err(FetchError::AllSourcesFailed { causes })
        }
    }
}

async fn fetch_and_persist(
    client: Arc<dyn HttpGet>,
    store: FetchStore,
    url: String,
    retries: u32,
) -> Result<Option<Bytes>, FetchError> {
    // Re-check the store: another task may have persisted this key between
    // the caller's probe and this future starting.
    if let Some(cached) = store.get(&url)? {
        return Ok(cached);
    }

    let mut causes = Vec::new();
    for attempt in 0..retries {
        debug!(url, attempt, "GET");
        match client.get(&url).await {
            Ok(Some(bytes)) => {
                store.put(&url, Some(&bytes))?;
                return Ok(Some(bytes));
            }
            Ok(None) => {
                info!(url, "resource not found, caching 404");
                store.put(&url, None)?;
                return Ok(None);
            }
            Err(e) => {
                warn!(url, attempt, error = %e, "fetch attempt failed");
                causes.push(e);
            }
        }
    }

    Err(FetchError::Exhausted {
        url,
        attempts: retries,
        causes,
    })
}

async fn read_local(path: &str) -> Result<Option<Bytes>, FetchError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(Bytes::from(bytes))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(FetchError::Io {
            path: path.to_string(),
            message: e.to_string(),
        }),
    }
}
