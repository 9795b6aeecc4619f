//! The in-memory session.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::expiry;
use crate::record::{EntryState, SessionEntry, SessionObject};

/// One user session: a keyed value map with an optional deadline.
///
/// A `Session` owns its [`SessionObject`] for one activation (typically one
/// request). It performs no I/O; a store hydrates it with
/// [`Session::from_object`] and persists [`Session::session_object`]
/// afterwards.
///
/// Values written with [`Session::flash`] are removed by the first
/// [`Session::get`] that returns them.
#[derive(Debug, Clone)]
pub struct Session<V = serde_json::Value, C: Clock = SystemClock> {
    object: SessionObject<V>,
    clock: C,
}

impl<V> Session<V, SystemClock> {
    /// Create an empty session with no deadline.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Adopt an existing record as-is.
    pub fn from_object(object: SessionObject<V>) -> Self {
        Self::from_object_with_clock(object, SystemClock)
    }
}

impl<V> Default for Session<V, SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> From<SessionObject<V>> for Session<V, SystemClock> {
    fn from(object: SessionObject<V>) -> Self {
        Self::from_object(object)
    }
}

impl<V, C: Clock> Session<V, C> {
    /// Create an empty session that reads time from `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self::from_object_with_clock(SessionObject::new(), clock)
    }

    /// Adopt an existing record, reading time from `clock`.
    ///
    /// The record is not validated; a malformed `expire` only shows up in
    /// [`Session::is_expired`].
    pub fn from_object_with_clock(object: SessionObject<V>, clock: C) -> Self {
        Self { object, clock }
    }

    /// The current record, including removals made by flash reads.
    pub fn session_object(&self) -> &SessionObject<V> {
        &self.object
    }

    /// Consume the session, returning its record.
    pub fn into_session_object(self) -> SessionObject<V> {
        self.object
    }

    /// Replace the whole record. Nothing is merged.
    pub fn set_session_object(&mut self, object: SessionObject<V>) {
        self.object = object;
    }

    /// The clock this session reads.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Drop every value and re-arm the deadline.
    ///
    /// With `Some(ttl)` the session expires `ttl` from now; with `None` it
    /// never expires.
    pub fn reset(&mut self, ttl: Option<Duration>) {
        self.object.data.clear();
        self.rearm(ttl);
    }

    /// Re-arm the deadline, keeping stored values.
    pub fn refresh(&mut self, ttl: Option<Duration>) {
        self.rearm(ttl);
    }

    fn rearm(&mut self, ttl: Option<Duration>) {
        self.object.expire = expiry::deadline_for(self.clock.now(), ttl);
        trace!(expire = ?self.object.expire, "Session deadline set");
    }

    /// Whether the deadline has passed.
    ///
    /// Never true without a deadline. The deadline instant itself is still
    /// live. An unparseable deadline counts as expired.
    pub fn is_expired(&self) -> bool {
        expiry::is_past(self.object.expire.as_deref(), self.clock.now())
    }

    /// The parsed deadline, if one is set and parseable.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.object.expire.as_deref().and_then(expiry::parse_timestamp)
    }

    /// Store `value` under `key`. Reads leave it in place.
    pub fn set(&mut self, key: impl Into<String>, value: V) {
        self.object
            .data
            .insert(key.into(), SessionEntry::persistent(value));
    }

    /// Store `value` under `key` for a single read.
    pub fn flash(&mut self, key: impl Into<String>, value: V) {
        self.object.data.insert(key.into(), SessionEntry::flash(value));
    }

    /// Read the value under `key` without consuming a flash entry.
    pub fn peek(&self, key: &str) -> Option<&V> {
        self.object.data.get(key).map(|entry| &entry.value)
    }

    /// Whether a value is stored under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.object.data.contains_key(key)
    }

    /// Remove and return the value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.object.data.remove(key).map(|entry| entry.value)
    }

    /// Keys currently stored.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.object.data.keys().map(String::as_str)
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.object.data.len()
    }

    /// Whether no values are stored.
    pub fn is_empty(&self) -> bool {
        self.object.data.is_empty()
    }
}

impl<V: Clone, C: Clock> Session<V, C> {
    /// Read the value under `key`.
    ///
    /// A flash entry is removed before this returns, so a second `get` for
    /// the same key yields `None`.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let state = EntryState::of(self.object.data.get(key));
        match (state, state.after_read()) {
            (EntryState::Absent, _) => None,
            (_, EntryState::Absent) => {
                let entry = self.object.data.remove(key)?;
                trace!(key = %key, "Flash value consumed");
                Some(entry.value)
            }
            (_, _) => self.object.data.get(key).map(|entry| entry.value.clone()),
        }
    }
}

impl<C: Clock> Session<serde_json::Value, C> {
    /// Read and decode the value under `key`.
    ///
    /// A flash entry is consumed even when it fails to decode as `T`.
    pub fn get_as<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        self.get(key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    /// Encode `value` and store it under `key`.
    pub fn set_as<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set(key, value);
        Ok(())
    }

    /// Encode `value` and store it under `key` for a single read.
    pub fn flash_as<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.flash(key, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{TimeDelta, TimeZone};
    use serde_json::{Value, json};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2222, 2, 2, 0, 0, 0).unwrap()
    }

    fn session_at(now: DateTime<Utc>) -> (Session<Value, FixedClock>, FixedClock) {
        let clock = FixedClock::new(now);
        (Session::with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_default_construction() {
        let session: Session = Session::new();
        assert!(session.session_object().data.is_empty());
        assert_eq!(session.session_object().expire, None);
        assert!(session.is_empty());
    }

    #[test]
    fn test_hydration_fidelity() {
        let obj = SessionObject::new()
            .with_entry("a", SessionEntry::persistent(json!(1)))
            .with_entry("b", SessionEntry::flash(json!("two")))
            .with_expire("2222-02-02T00:00:00.000Z");

        let session = Session::from_object(obj.clone());
        assert_eq!(session.session_object(), &obj);
        assert_eq!(session.into_session_object(), obj);
    }

    #[test]
    fn test_set_session_object_replaces() {
        let (mut session, _) = session_at(t0());
        session.set("old", json!(true));

        let replacement = SessionObject::new().with_entry("new", SessionEntry::flash(json!(1)));
        session.set_session_object(replacement.clone());

        assert_eq!(session.session_object(), &replacement);
        assert_eq!(session.get("old"), None);
    }

    #[test]
    fn test_reset_sets_deadline_and_clears() {
        let (mut session, _) = session_at(t0());
        session.set("a", json!(1));
        session.flash("b", json!(2));

        session.reset(Some(Duration::from_secs(60)));

        assert!(session.is_empty());
        assert_eq!(
            session.session_object().expire.as_deref(),
            Some("2222-02-02T00:01:00.000Z")
        );
        assert_eq!(session.expires_at(), Some(t0() + TimeDelta::seconds(60)));
    }

    #[test]
    fn test_reset_without_ttl() {
        let obj = SessionObject::new()
            .with_entry("a", SessionEntry::persistent(json!(1)))
            .with_expire("2222-02-02T00:00:00.000Z");
        let mut session = Session::from_object_with_clock(obj, FixedClock::new(t0()));

        session.reset(None);

        assert_eq!(session.session_object(), &SessionObject::new());
    }

    #[test]
    fn test_refresh_preserves_data() {
        let (mut session, _) = session_at(t0());
        session.set("a", json!(1));
        session.flash("b", json!(2));
        let before = session.session_object().data.clone();

        session.refresh(Some(Duration::from_secs(60)));

        assert_eq!(session.session_object().data, before);
        assert_eq!(
            session.session_object().expire.as_deref(),
            Some("2222-02-02T00:01:00.000Z")
        );

        session.refresh(None);
        assert_eq!(session.session_object().expire, None);
        assert_eq!(session.session_object().data, before);
    }

    #[test]
    fn test_expiration_boundary() {
        let (mut session, clock) = session_at(t0());
        session.refresh(Some(Duration::from_secs(60)));

        assert!(!session.is_expired());

        clock.set(t0() + TimeDelta::seconds(60));
        assert!(!session.is_expired());

        clock.advance(TimeDelta::milliseconds(1));
        assert!(session.is_expired());
    }

    #[test]
    fn test_no_deadline_never_expires() {
        let (session, clock) = session_at(t0());
        assert!(!session.is_expired());

        clock.set(DateTime::<Utc>::MAX_UTC);
        assert!(!session.is_expired());
    }

    #[test]
    fn test_is_expired_does_not_mutate() {
        let (mut session, clock) = session_at(t0());
        session.set("a", json!(1));
        session.refresh(Some(Duration::from_secs(1)));
        clock.advance(TimeDelta::seconds(5));

        assert!(session.is_expired());
        assert_eq!(session.get("a"), Some(json!(1)));
    }

    #[test]
    fn test_malformed_expire_counts_as_expired() {
        let obj: SessionObject = SessionObject::new().with_expire("next tuesday");
        let session = Session::from_object_with_clock(obj, FixedClock::new(t0()));

        assert!(session.is_expired());
        assert_eq!(session.expires_at(), None);
        assert_eq!(session.session_object().expire.as_deref(), Some("next tuesday"));
    }

    #[test]
    fn test_date_only_expire_is_live() {
        let obj: SessionObject = SessionObject::new().with_expire("2222-02-03");
        let session = Session::from_object_with_clock(obj, FixedClock::new(t0()));

        assert!(!session.is_expired());
        assert_eq!(session.expires_at(), Some(t0() + TimeDelta::days(1)));
    }

    #[test]
    fn test_flash_read_once() {
        let (mut session, _) = session_at(t0());
        session.flash("k", json!("v"));

        assert_eq!(session.get("k"), Some(json!("v")));
        assert_eq!(session.get("k"), None);
        assert!(!session.session_object().data.contains_key("k"));
    }

    #[test]
    fn test_get_follows_entry_state() {
        let (mut session, _) = session_at(t0());
        session.set("kept", json!(1));
        session.flash("once", json!(2));

        for key in ["kept", "once", "missing"] {
            let before = EntryState::of(session.session_object().data.get(key));
            let value = session.get(key);
            let after = EntryState::of(session.session_object().data.get(key));

            assert_eq!(after, before.after_read());
            assert_eq!(value.is_some(), before != EntryState::Absent);
        }
    }

    #[test]
    fn test_persistent_read_many() {
        let (mut session, _) = session_at(t0());
        session.set("k", json!("v"));

        assert_eq!(session.get("k"), Some(json!("v")));
        assert_eq!(session.get("k"), Some(json!("v")));
    }

    #[test]
    fn test_unknown_key() {
        let (mut session, _) = session_at(t0());
        session.set("a", json!(1));
        session.flash("b", json!(2));

        assert_eq!(session.get("missing"), None);
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn test_repeated_set_never_flashes() {
        let (mut session, _) = session_at(t0());
        for _ in 0..3 {
            session.set("k", json!("v"));
        }

        for _ in 0..5 {
            assert_eq!(session.get("k"), Some(json!("v")));
        }
    }

    #[test]
    fn test_overwrite_switches_flag() {
        let (mut session, _) = session_at(t0());

        session.flash("k", json!(1));
        session.set("k", json!(2));
        assert_eq!(session.get("k"), Some(json!(2)));
        assert_eq!(session.get("k"), Some(json!(2)));

        session.flash("k", json!(3));
        assert_eq!(session.get("k"), Some(json!(3)));
        assert_eq!(session.get("k"), None);
    }

    #[test]
    fn test_peek_keeps_flash_entry() {
        let (mut session, _) = session_at(t0());
        session.flash("notice", json!("saved"));

        assert_eq!(session.peek("notice"), Some(&json!("saved")));
        assert!(session.contains_key("notice"));
        assert_eq!(session.get("notice"), Some(json!("saved")));
        assert_eq!(session.peek("notice"), None);
    }

    #[test]
    fn test_remove_and_keys() {
        let (mut session, _) = session_at(t0());
        session.set("a", json!(1));
        session.set("b", json!(2));

        assert_eq!(session.remove("a"), Some(json!(1)));
        assert_eq!(session.remove("a"), None);
        assert_eq!(session.keys().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_typed_access() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Cart {
            items: Vec<String>,
        }

        let (mut session, _) = session_at(t0());
        let cart = Cart {
            items: vec!["apple".to_string()],
        };
        session.set_as("cart", &cart).unwrap();
        session.flash_as("notice", &"added").unwrap();

        assert_eq!(session.get_as::<Cart>("cart").unwrap(), Some(cart));
        assert_eq!(
            session.get_as::<String>("notice").unwrap(),
            Some("added".to_string())
        );
        assert_eq!(session.get_as::<String>("notice").unwrap(), None);
    }

    #[test]
    fn test_typed_flash_consumed_on_decode_error() {
        let (mut session, _) = session_at(t0());
        session.flash("n", json!("not a number"));

        assert!(session.get_as::<u32>("n").is_err());
        assert!(!session.contains_key("n"));
    }

    #[test]
    fn test_generic_payload() {
        let mut session: Session<u64, FixedClock> = Session::with_clock(FixedClock::new(t0()));
        session.flash("visits", 3);
        assert_eq!(session.get("visits"), Some(3));
        assert_eq!(session.get("visits"), None);
    }

    #[test]
    fn test_end_to_end_reset() {
        let obj = SessionObject::new()
            .with_entry("test", SessionEntry::flash(json!("x")))
            .with_expire("2222-02-02T00:00:00.000Z");
        let mut session = Session::from_object_with_clock(obj, FixedClock::new(t0()));

        session.reset(Some(Duration::from_secs(60)));

        let obj = session.session_object();
        assert!(obj.data.is_empty());
        assert_eq!(obj.expire.as_deref(), Some("2222-02-02T00:01:00.000Z"));
    }
}
