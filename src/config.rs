//! Container configuration
//!
//! A time-limited container is configured by three options:
//!
//! | option      | required | effect                                          |
//! |-------------|----------|-------------------------------------------------|
//! | `expiry`    | yes      | time-to-live of every expiring entry            |
//! | `on_expire` | no       | selects timer-driven eviction with a callback   |
//! | `entries`   | no       | initial contents, inserted as expiring entries  |
//!
//! # Example
//!
//! ```ignore
//! use timelimited::TimeLimitedMap;
//! use std::time::Duration;
//!
//! let sessions = TimeLimitedMap::builder(Duration::from_secs(30))
//!     .entries([("alice", 1), ("bob", 2)])
//!     .on_expire(|user, id, _inserted_at| println!("{user} ({id}) logged out"))
//!     .build()?;
//! ```

use std::fmt;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{ExpiryError, Result};
use crate::expiry::engine::OnExpire;
use crate::map::TimeLimitedMap;
use crate::set::TimeLimitedSet;

/// How expired entries are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Expired entries are purged on the next operation that observes them.
    LazySweep,
    /// Each expiring entry gets its own timer and triggers the callback.
    TimerDriven,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::LazySweep => write!(f, "lazy-sweep"),
            Strategy::TimerDriven => write!(f, "timer-driven"),
        }
    }
}

/// Rejects a zero time-to-live, and one whose deadline the clock cannot
/// represent.
pub(crate) fn validate_expiry(expiry: Duration) -> Result<Duration> {
    if expiry.is_zero() {
        return Err(ExpiryError::InvalidExpiry(expiry));
    }
    if Instant::now().checked_add(expiry).is_none() {
        return Err(ExpiryError::ExpiryTooLong(expiry));
    }
    Ok(expiry)
}

/// Builder for [`TimeLimitedMap`].
pub struct MapBuilder<K, V> {
    expiry: Duration,
    on_expire: Option<OnExpire<K, V>>,
    entries: Vec<(K, V)>,
}

impl<K, V> MapBuilder<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Send + 'static,
{
    pub(crate) fn new(expiry: Duration) -> Self {
        Self {
            expiry,
            on_expire: None,
            entries: Vec::new(),
        }
    }

    /// Switches to timer-driven eviction, calling `callback` with
    /// `(key, value, inserted_at)` for every entry that expires.
    pub fn on_expire<F>(mut self, callback: F) -> Self
    where
        F: Fn(K, V, Instant) + Send + Sync + 'static,
    {
        self.on_expire = Some(Box::new(callback));
        self
    }

    /// Initial entries, inserted as expiring in iteration order.
    pub fn entries<I>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        self.entries.extend(entries);
        self
    }

    /// Builds the map.
    ///
    /// Fails if the expiry is zero, or if a callback was given outside a
    /// Tokio runtime.
    pub fn build(self) -> Result<TimeLimitedMap<K, V>> {
        let map = TimeLimitedMap::from_config(self.expiry, self.on_expire)?;
        map.extend_from(self.entries);
        Ok(map)
    }
}

impl<K, V> fmt::Debug for MapBuilder<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapBuilder")
            .field("expiry", &self.expiry)
            .field("on_expire", &self.on_expire.is_some())
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Builder for [`TimeLimitedSet`].
pub struct SetBuilder<T> {
    expiry: Duration,
    on_expire: Option<OnExpire<T, ()>>,
    values: Vec<T>,
}

impl<T> SetBuilder<T>
where
    T: Hash + Eq + Clone + Send + 'static,
{
    pub(crate) fn new(expiry: Duration) -> Self {
        Self {
            expiry,
            on_expire: None,
            values: Vec::new(),
        }
    }

    /// Switches to timer-driven eviction, calling `callback` with
    /// `(value, inserted_at)` for every value that expires.
    pub fn on_expire<F>(mut self, callback: F) -> Self
    where
        F: Fn(T, Instant) + Send + Sync + 'static,
    {
        self.on_expire = Some(Box::new(move |value, (), inserted_at| {
            callback(value, inserted_at)
        }));
        self
    }

    /// Initial values, inserted as expiring in iteration order.
    pub fn values<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        self.values.extend(values);
        self
    }

    pub fn build(self) -> Result<TimeLimitedSet<T>> {
        let set = TimeLimitedSet::from_config(self.expiry, self.on_expire)?;
        set.extend_from(self.values);
        Ok(set)
    }
}

impl<T> fmt::Debug for SetBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetBuilder")
            .field("expiry", &self.expiry)
            .field("on_expire", &self.on_expire.is_some())
            .field("values", &self.values.len())
            .finish()
    }
}
