//! Configuration for the session cache.

use std::time::Duration;

use serde::Deserialize;

/// Default maximum number of sessions to cache.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Default TTL for sessions (none by default - sessions don't expire).
pub const DEFAULT_TTL: Option<Duration> = None;

/// Configuration for the session cache.
///
/// Deserializes from a host config section such as
///
/// ```toml
/// [session]
/// max_sessions = 500
/// ttl_secs = 3600
/// rolling = true
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawCacheConfig")]
pub struct CacheConfig {
    /// Maximum number of sessions to cache before LRU eviction.
    pub max_sessions: usize,

    /// Lifetime given to new sessions.
    /// `None` creates sessions that never expire.
    pub ttl: Option<Duration>,

    /// Re-arm the deadline of a live session each time it is opened.
    pub rolling: bool,

    /// Fail `open` with [`Error::Expired`](crate::Error::Expired) instead of
    /// handing out a fresh session when the stored one has expired.
    pub strict_expiry: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            ttl: DEFAULT_TTL,
            rolling: false,
            strict_expiry: false,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of sessions to cache.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Set the TTL for new sessions.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Disable TTL (sessions don't expire based on time).
    pub fn without_ttl(mut self) -> Self {
        self.ttl = None;
        self
    }

    /// Enable or disable rolling deadlines.
    pub fn with_rolling(mut self, enabled: bool) -> Self {
        self.rolling = enabled;
        self
    }

    /// Enable or disable strict expiry on open.
    pub fn with_strict_expiry(mut self, enabled: bool) -> Self {
        self.strict_expiry = enabled;
        self
    }
}

/// Wire form of [`CacheConfig`], with the TTL in whole seconds.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawCacheConfig {
    max_sessions: usize,
    ttl_secs: Option<u64>,
    rolling: bool,
    strict_expiry: bool,
}

impl Default for RawCacheConfig {
    fn default() -> Self {
        let config = CacheConfig::default();
        Self {
            max_sessions: config.max_sessions,
            ttl_secs: config.ttl.map(|ttl| ttl.as_secs()),
            rolling: config.rolling,
            strict_expiry: config.strict_expiry,
        }
    }
}

impl From<RawCacheConfig> for CacheConfig {
    fn from(raw: RawCacheConfig) -> Self {
        Self {
            max_sessions: raw.max_sessions,
            ttl: raw.ttl_secs.map(Duration::from_secs),
            rolling: raw.rolling,
            strict_expiry: raw.strict_expiry,
        }
    }
}
