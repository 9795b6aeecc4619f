//! Session cache with LRU eviction and on-demand expiry.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::expiry;
use crate::persistence::{NoPersistence, SessionStore};
use crate::record::SessionObject;
use crate::session::Session;

/// Inner state protected by RwLock.
struct CacheInner<P: SessionStore> {
    /// LRU cache of session records.
    lru: LruCache<String, SessionObject<P::Value>>,

    /// Persistence backend.
    persistence: P,
}

impl<P: SessionStore> CacheInner<P> {
    /// Insert a record, notifying the store about any LRU victim.
    fn put(&mut self, session_id: &str, object: SessionObject<P::Value>) {
        if let Some((evicted_id, _)) = self.lru.push(session_id.to_string(), object) {
            if evicted_id != session_id {
                debug!(session_id = %evicted_id, "Evicting LRU session to make room");
                self.notify_evict(&evicted_id);
            }
        }
    }

    /// Drop a record from the cache only.
    fn evict(&mut self, session_id: &str) -> bool {
        let evicted = self.lru.pop(session_id).is_some();
        if evicted {
            self.notify_evict(session_id);
        }
        evicted
    }

    fn notify_evict(&self, session_id: &str) {
        if let Err(e) = self.persistence.on_evict(session_id) {
            warn!(session_id = %session_id, error = %e, "Session store eviction hook failed");
        }
    }
}

/// Session cache in front of a [`SessionStore`].
///
/// This cache provides:
/// - LRU eviction when max capacity is reached
/// - Deadline checks when a session is opened (nothing is swept in the background)
/// - Write-through to the store on commit
/// - Thread-safe access to the cache map via RwLock
///
/// Each [`open`](Self::open) hands out an owned [`Session`]; changes become
/// visible to later opens only after [`commit`](Self::commit). Two
/// activations of the same session id are not arbitrated: the last commit
/// wins.
pub struct SessionCache<P: SessionStore = NoPersistence, C: Clock = SystemClock> {
    inner: Arc<RwLock<CacheInner<P>>>,
    config: CacheConfig,
    clock: C,
}

impl SessionCache<NoPersistence, SystemClock> {
    /// Create a new session cache with no persistence backend.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_persistence(config, NoPersistence)
    }
}

impl<P: SessionStore> SessionCache<P, SystemClock> {
    /// Create a new session cache with a persistence backend.
    pub fn with_persistence(config: CacheConfig, persistence: P) -> Self {
        Self::with_clock(config, persistence, SystemClock)
    }
}

impl<P: SessionStore, C: Clock + Clone> SessionCache<P, C> {
    /// Create a new session cache whose sessions read time from `clock`.
    pub fn with_clock(config: CacheConfig, persistence: P, clock: C) -> Self {
        let cap = NonZeroUsize::new(config.max_sessions).unwrap_or(NonZeroUsize::MIN);

        let inner = CacheInner {
            lru: LruCache::new(cap),
            persistence,
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
            config,
            clock,
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The clock handed to opened sessions.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Get the current number of cached sessions.
    pub async fn len(&self) -> usize {
        self.inner.read().await.lru.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.lru.is_empty()
    }

    /// A new, empty session armed with the configured TTL.
    pub fn create(&self) -> Session<P::Value, C> {
        let mut session = Session::with_clock(self.clock.clone());
        session.reset(self.config.ttl);
        session
    }

    /// Open a session for one activation.
    ///
    /// Looks in the cache first, then in the store. An unknown id yields a
    /// fresh session. An expired record is evicted and deleted from the
    /// store; the caller then gets a fresh session, or
    /// [`Error::Expired`] when `strict_expiry` is configured. With
    /// `rolling`, a live session has its deadline re-armed.
    pub async fn open(&self, session_id: &str) -> Result<Session<P::Value, C>> {
        self.open_inner(session_id, false).await
    }

    /// Open a session that must already exist.
    ///
    /// Same as [`open`](Self::open), except that an id unknown to both the
    /// cache and the store fails with [`Error::NotFound`]. An expired record
    /// still existed, so it is handled as in `open`.
    pub async fn open_existing(&self, session_id: &str) -> Result<Session<P::Value, C>> {
        self.open_inner(session_id, true).await
    }

    async fn open_inner(
        &self,
        session_id: &str,
        must_exist: bool,
    ) -> Result<Session<P::Value, C>> {
        let mut inner = self.inner.write().await;

        let (object, cached) = match inner.lru.get(session_id).cloned() {
            Some(object) => {
                trace!(session_id = %session_id, "Session found in cache");
                (Some(object), true)
            }
            None => {
                debug!(session_id = %session_id, "Session cache miss, loading from persistence");
                (inner.persistence.load(session_id)?, false)
            }
        };

        let Some(object) = object else {
            if must_exist {
                return Err(Error::NotFound(session_id.to_string()));
            }
            trace!(session_id = %session_id, "No stored session, creating a new one");
            return Ok(self.create());
        };

        let mut session = Session::from_object_with_clock(object, self.clock.clone());

        if session.is_expired() {
            debug!(session_id = %session_id, "Session expired, removing");
            inner.evict(session_id);
            inner.persistence.delete(session_id)?;

            if self.config.strict_expiry {
                return Err(Error::Expired(session_id.to_string()));
            }
            return Ok(self.create());
        }

        if !cached {
            inner.put(session_id, session.session_object().clone());
            debug!(
                session_id = %session_id,
                cache_size = inner.lru.len(),
                "Session loaded from persistence"
            );
        }

        if self.config.rolling {
            session.refresh(self.config.ttl);
        }

        Ok(session)
    }

    /// Write a session's record to the cache and the store.
    ///
    /// If the cache is at capacity, the least recently used session
    /// will be evicted (with on_evict callback).
    pub async fn commit<K: Clock>(
        &self,
        session_id: &str,
        session: &Session<P::Value, K>,
    ) -> Result<()> {
        let object = session.session_object().clone();
        let mut inner = self.inner.write().await;

        inner.persistence.save(session_id, &object)?;
        inner.put(session_id, object);

        trace!(
            session_id = %session_id,
            cache_size = inner.lru.len(),
            "Session committed"
        );

        Ok(())
    }

    /// Remove a session from cache and store.
    ///
    /// Returns whether the session was cached.
    pub async fn destroy(&self, session_id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let cached = inner.lru.pop(session_id).is_some();
        inner.persistence.delete(session_id)?;
        debug!(session_id = %session_id, cached, "Session destroyed");
        Ok(cached)
    }

    /// Drop a session from the cache only; the store keeps it.
    pub async fn invalidate(&self, session_id: &str) {
        let mut inner = self.inner.write().await;
        if inner.evict(session_id) {
            debug!(session_id = %session_id, "Session invalidated from cache");
        }
    }

    /// Check if a live session is cached (without loading).
    pub async fn contains(&self, session_id: &str) -> bool {
        let inner = self.inner.read().await;
        let now = self.clock.now();
        inner
            .lru
            .peek(session_id)
            .is_some_and(|object| !expiry::is_past(object.expire.as_deref(), now))
    }

    /// Remove every expired cached session from cache and store.
    ///
    /// Runs only when called.
    pub async fn purge_expired(&self) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let now = self.clock.now();

        let expired: Vec<String> = inner
            .lru
            .iter()
            .filter(|(_, object)| expiry::is_past(object.expire.as_deref(), now))
            .map(|(id, _)| id.clone())
            .collect();

        for session_id in &expired {
            debug!(session_id = %session_id, "Purging expired session");
            inner.evict(session_id);
            inner.persistence.delete(session_id)?;
        }

        if !expired.is_empty() {
            debug!(count = expired.len(), "Purged expired sessions");
        }

        Ok(expired.len())
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        CacheStats {
            size: inner.lru.len(),
            capacity: self.config.max_sessions,
        }
    }
}

impl<P: SessionStore, C: Clock + Clone> Clone for SessionCache<P, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: self.config.clone(),
            clock: self.clock.clone(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Current number of cached sessions.
    pub size: usize,

    /// Maximum capacity.
    pub capacity: usize,
}
