//! Network fetching for tile payloads.
//!
//! - [`HttpClient`]: dyn-compatible async GET, injected into the engine so tests
//!   can script responses.
//! - [`ReqwestClient`]: the production client.
//! - [`FetchWindow`]: bounded-concurrency admission (semaphore + FIFO queue).

mod http;
mod window;

pub use http::ReqwestClient;
pub use window::{Admission, FetchWindow};

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use thiserror::Error;

/// Default number of simultaneously outstanding tile fetches.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 10;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors a fetch can settle with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The fetch was cancelled before it settled.
    #[error("Fetch aborted")]
    Aborted,
}

impl FetchError {
    /// True for cancellations, which are cleanup-only and never logged as failures.
    pub fn is_abort(&self) -> bool {
        matches!(self, FetchError::Aborted)
    }
}

/// Async HTTP GET.
///
/// Implementations must be `Send + Sync` so one client can serve every
/// in-flight fetch of an engine from the Tokio runtime.
pub trait HttpClient: Send + Sync + 'static {
    /// Performs a GET request and returns the response body.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Status`] for non-2xx responses and
    /// [`FetchError::Http`] for transport failures.
    fn get(&self, url: &str) -> BoxFuture<'_, Result<Bytes, FetchError>>;
}
