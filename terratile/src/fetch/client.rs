//! HTTP client abstraction for testability.

use super::FetchError;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use std::time::Duration;
use tracing::{trace, warn};

/// User-Agent identifying this tool to dataset servers, as some tile hosts
/// reject anonymous clients.
fn user_agent() -> String {
    format!("terratile/{}", crate::VERSION)
}

/// Async HTTP GET, object-safe so the fetch cache can hold stub clients in
/// tests.
///
/// `Ok(None)` means the server confirmed the resource does not exist (404);
/// every other non-success status is an error the caller may retry.
pub trait HttpGet: Send + Sync {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Option<Bytes>, FetchError>>;
}

/// Real HTTP client implementation using reqwest.
///
/// Follows redirects, applies a per-attempt timeout and keeps pooled
/// connections warm for parallel tile downloads.
#[derive(Clone)]
pub struct ReqwestGet {
    client: reqwest::Client,
}

impl ReqwestGet {
    /// Creates a client with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .pool_max_idle_per_host(64)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Request {
                url: String::new(),
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self { client })
    }
}

impl HttpGet for ReqwestGet {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Option<Bytes>, FetchError>> {
        async move {
            trace!(url, "HTTP GET starting");
            let response = self.client.get(url).send().await.map_err(|e| {
                warn!(url, error = %e, is_timeout = e.is_timeout(), "HTTP request failed");
                FetchError::Request {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            })?;

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !status.is_success() {
                warn!(url, status = status.as_u16(), "HTTP error status");
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            let bytes = response.bytes().await.map_err(|e| FetchError::Request {
                url: url.to_string(),
                message: format!("failed to read response body: {e}"),
            })?;
            trace!(url, bytes = bytes.len(), "HTTP response body read");
            Ok(Some(bytes))
        }
        .boxed()
    }
}
