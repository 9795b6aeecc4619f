//! Error types for session records and the session cache.

/// Error type for session operations.
///
/// The in-memory [`Session`](crate::Session) operations never fail; these
/// variants come from the serialization boundary and from the cache and
/// store seam.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Session was not found in cache or storage.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Error from the session store backend.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Session record is past its deadline.
    #[error("Session expired: {0}")]
    Expired(String),

    /// A record or payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;
