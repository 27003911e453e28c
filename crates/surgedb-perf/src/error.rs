use thiserror::Error;

/// Transport-level failure of a single HTTP call (connect, timeout, read).
///
/// A response carrying an error status is *not* a transport failure; callers
/// get the status back and decide how to count it.
#[derive(Debug, Clone, Error)]
#[error("transport error calling {url}: {message}")]
pub struct TransportError {
    /// URL that was being called.
    pub url: String,
    /// Human-readable cause.
    pub message: String,
}

impl TransportError {
    #[must_use]
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Canonical error type for a single benchmark run.
///
/// Per-operation failures during the timed window never surface here; they are
/// counted by the metrics collector. Everything in this enum aborts the run.
#[derive(Debug, Error)]
pub enum BenchError {
    /// The service rejected collection creation.
    #[error("create collection failed: {status} {body}")]
    CreateCollection {
        /// HTTP status returned by the service.
        status: u16,
        /// Response body, lossily decoded.
        body: String,
    },

    /// A prefill batch was rejected.
    #[error("prefill failed: {status} {body}")]
    Prefill {
        /// HTTP status returned by the service.
        status: u16,
        /// Response body, lossily decoded.
        body: String,
    },

    /// Setup call could not reach the service at all.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The run configuration violates an invariant.
    #[error("invalid benchmark config: {0}")]
    InvalidConfig(String),

    /// A worker task panicked or was aborted.
    #[error("worker {index} failed: {message}")]
    Worker {
        /// Zero-based worker index.
        index: usize,
        /// Join error description.
        message: String,
    },

    /// I/O error while persisting the summary.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Summary could not be serialized.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    /// Creates a `CreateCollection` variant from a raw response body.
    #[must_use]
    pub fn create_collection(status: u16, body: &[u8]) -> Self {
        Self::CreateCollection {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    /// Creates a `Prefill` variant from a raw response body.
    #[must_use]
    pub fn prefill(status: u16, body: &[u8]) -> Self {
        Self::Prefill {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }
}

/// Convenient result alias for benchmark operations.
pub type BenchResult<T> = Result<T, BenchError>;
