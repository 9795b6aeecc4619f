//! Persisted session record types.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry<V = serde_json::Value> {
    /// Application payload.
    pub value: V,

    /// Delete the entry on its first read.
    #[serde(default)]
    pub flash: bool,
}

impl<V> SessionEntry<V> {
    /// An entry that survives reads.
    pub fn persistent(value: V) -> Self {
        Self {
            value,
            flash: false,
        }
    }

    /// An entry removed by its first read.
    pub fn flash(value: V) -> Self {
        Self { value, flash: true }
    }

    /// State of this entry.
    pub fn state(&self) -> EntryState {
        if self.flash {
            EntryState::Flash
        } else {
            EntryState::Persistent
        }
    }
}

/// Lifecycle of a single key in a session.
///
/// `set` moves any state to `Persistent`, `flash` moves any state to
/// `Flash`, and a keyed read moves the key to [`EntryState::after_read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// No entry under the key.
    Absent,
    /// Entry stays after reads.
    Persistent,
    /// Entry is removed by the next read.
    Flash,
}

impl EntryState {
    /// State of an optional entry.
    pub fn of<V>(entry: Option<&SessionEntry<V>>) -> Self {
        entry.map_or(Self::Absent, SessionEntry::state)
    }

    /// State the key is in after a read.
    pub fn after_read(self) -> Self {
        match self {
            Self::Absent | Self::Flash => Self::Absent,
            Self::Persistent => Self::Persistent,
        }
    }
}

/// The full session record, as handed to and from a session store.
///
/// Serializes as `{"data": {"<key>": {"value": .., "flash": ..}}, "expire": ".." | null}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionObject<V = serde_json::Value> {
    /// Stored values by key.
    #[serde(default = "HashMap::new")]
    pub data: HashMap<String, SessionEntry<V>>,

    /// ISO-8601 UTC deadline, or `None` when the session never expires.
    #[serde(default)]
    pub expire: Option<String>,
}

impl<V> Default for SessionObject<V> {
    fn default() -> Self {
        Self {
            data: HashMap::new(),
            expire: None,
        }
    }
}

impl<V> SessionObject<V> {
    /// An empty record with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deadline.
    pub fn with_expire(mut self, expire: impl Into<String>) -> Self {
        self.expire = Some(expire.into());
        self
    }

    /// Add an entry.
    pub fn with_entry(mut self, key: impl Into<String>, entry: SessionEntry<V>) -> Self {
        self.data.insert(key.into(), entry);
        self
    }
}

impl<V: Serialize> SessionObject<V> {
    /// Encode as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<V: DeserializeOwned> SessionObject<V> {
    /// Decode from JSON.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
