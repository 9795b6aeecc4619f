//! Persistence seam for session records.
//!
//! The [`SessionStore`] trait decouples the session cache from specific
//! storage backends. Its associated `Value` type is the payload type of the
//! records it stores, so a backend can keep typed values without going
//! through JSON.

use crate::error::Result;
use crate::record::SessionObject;

/// Trait for session storage backends.
///
/// Implement this trait to connect the session cache to your storage backend.
/// The cache calls these methods on cache misses and when committing sessions.
/// Stores never see a [`Session`](crate::Session), only its record.
pub trait SessionStore: Send + Sync {
    /// Payload type of stored entries.
    type Value: Clone + Send + Sync + 'static;

    /// Load a session record.
    ///
    /// Return `Ok(None)` if the session doesn't exist in storage. Expired
    /// records may be returned; the cache checks the deadline.
    fn load(&self, session_id: &str) -> Result<Option<SessionObject<Self::Value>>>;

    /// Save a session record, replacing any previous one.
    fn save(&self, session_id: &str, object: &SessionObject<Self::Value>) -> Result<()>;

    /// Delete a session record.
    fn delete(&self, session_id: &str) -> Result<()>;

    /// Called when a record is dropped from the cache due to LRU pressure
    /// or expiration.
    ///
    /// Default implementation does nothing.
    fn on_evict(&self, _session_id: &str) -> Result<()> {
        Ok(())
    }
}

/// A no-op store for in-memory only caching.
#[derive(Debug, Clone, Default)]
pub struct NoPersistence;

impl SessionStore for NoPersistence {
    type Value = serde_json::Value;

    fn load(&self, _session_id: &str) -> Result<Option<SessionObject>> {
        Ok(None)
    }

    fn save(&self, _session_id: &str, _object: &SessionObject) -> Result<()> {
        Ok(())
    }

    fn delete(&self, _session_id: &str) -> Result<()> {
        Ok(())
    }
}
