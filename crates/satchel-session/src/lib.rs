//! In-memory session state with expiration and flash values.
//!
//! This crate provides:
//! - [`Session`], a keyed value map owned by one session activation, with an
//!   optional absolute deadline and read-once "flash" values
//! - An injectable [`Clock`] so deadlines can be tested at fixed instants
//! - A [`SessionStore`] seam and an LRU-bounded [`SessionCache`] that
//!   hydrates sessions and writes them back
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use satchel_session::Session;
//! use serde_json::json;
//!
//! let mut session: Session = Session::new();
//! session.reset(Some(Duration::from_secs(3600)));
//! session.set("user", json!("ada"));
//! session.flash("notice", json!("Signed in"));
//!
//! assert_eq!(session.get("notice"), Some(json!("Signed in")));
//! assert_eq!(session.get("notice"), None);
//! assert_eq!(session.get("user"), Some(json!("ada")));
//! assert!(!session.is_expired());
//! ```

mod cache;
mod clock;
mod config;
mod error;
pub mod expiry;
mod persistence;
mod record;
mod session;

pub use cache::{CacheStats, SessionCache};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{CacheConfig, DEFAULT_MAX_SESSIONS, DEFAULT_TTL};
pub use error::{Error, Result};
pub use persistence::{NoPersistence, SessionStore};
pub use record::{EntryState, SessionEntry, SessionObject};
pub use session::Session;
