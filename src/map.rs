//! Time-Limited Map
//!
//! A key-value map whose entries expire a fixed time after they were
//! inserted. Every operation goes through the shared expiry engine, which
//! reconciles expired entries before reading the store in insertion order.
//!
//! ## Eviction
//!
//! - **Lazy sweep** (no callback): expired entries stay in memory until the
//!   next operation, which purges the expired prefix of the ledger first.
//!   Nothing is ever reported.
//! - **Timer-driven** (with callback): every expiring entry gets a Tokio
//!   timer that removes it at its deadline and then calls the callback with
//!   `(key, value, inserted_at)`.
//!
//! Entries inserted with [`TimeLimitedMap::insert_persistent`] are exempt
//! from both and live until removed or cleared.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::{MapBuilder, Strategy};
use crate::error::Result;
use crate::expiry::engine::{Engine, OnExpire};
use crate::expiry::ExpiresAt;

/// A map whose entries expire after a time-to-live.
///
/// All methods take `&self`; the map can be shared across tasks behind an
/// `Arc`. Snapshot methods such as [`keys`](Self::keys) and
/// [`entries`](Self::entries) return owned values in insertion order.
///
/// # Example
///
/// ```ignore
/// use timelimited::TimeLimitedMap;
/// use std::time::Duration;
///
/// let map = TimeLimitedMap::new(Duration::from_millis(100))?;
/// map.insert("session", "abc123");
/// map.insert_persistent("config", "debug");
/// assert_eq!(map.get("session"), Some("abc123"));
/// ```
pub struct TimeLimitedMap<K: Hash + Eq, V> {
    engine: Arc<Engine<K, V>>,
}

impl<K, V> TimeLimitedMap<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Send + 'static,
{
    /// Creates an empty map with lazy-sweep eviction.
    pub fn new(expiry: Duration) -> Result<Self> {
        Self::from_config(expiry, None)
    }

    /// Creates a map with lazy-sweep eviction, pre-filled with expiring entries.
    pub fn with_entries<I>(expiry: Duration, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let map = Self::new(expiry)?;
        map.extend_from(entries);
        Ok(map)
    }

    /// Creates an empty map with timer-driven eviction.
    ///
    /// `callback` receives `(key, value, inserted_at)` once for every entry
    /// that expires. Must be called from within a Tokio runtime.
    pub fn with_callback<F>(expiry: Duration, callback: F) -> Result<Self>
    where
        F: Fn(K, V, Instant) + Send + Sync + 'static,
    {
        Self::from_config(expiry, Some(Box::new(callback)))
    }

    /// Starts a [`MapBuilder`] for the given expiry.
    pub fn builder(expiry: Duration) -> MapBuilder<K, V> {
        MapBuilder::new(expiry)
    }

    pub(crate) fn from_config(
        expiry: Duration,
        on_expire: Option<OnExpire<K, V>>,
    ) -> Result<Self> {
        Ok(Self {
            engine: Engine::new(expiry, on_expire)?,
        })
    }

    pub(crate) fn extend_from<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.engine.insert(key, value, true);
        }
    }

    /// Inserts an expiring entry.
    ///
    /// Re-inserting an existing key restarts its expiry window and moves it
    /// to the newest position. Returns the previous live value, if any.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.engine.insert(key, value, true)
    }

    /// Inserts an entry that never expires.
    ///
    /// If the key was previously expiring, its pending expiry is cancelled.
    pub fn insert_persistent(&self, key: K, value: V) -> Option<V> {
        self.engine.insert(key, value, false)
    }

    /// Removes an entry, cancelling its pending expiry.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.engine.remove(key)
    }

    /// Removes every entry and cancels every pending expiry.
    pub fn clear(&self) {
        self.engine.clear();
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.engine.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.engine.read(|entries| entries.contains_key(key))
    }

    /// Returns a clone of the value stored for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.engine.read(|entries| entries.get(key).cloned())
    }

    /// Live keys, oldest first.
    pub fn keys(&self) -> Vec<K> {
        self.engine
            .read(|entries| entries.iter().map(|(key, _)| key.clone()).collect())
    }

    /// Live values, oldest first.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.engine
            .read(|entries| entries.iter().map(|(_, value)| value.clone()).collect())
    }

    /// Live entries, oldest first.
    pub fn entries(&self) -> Vec<(K, V)>
    where
        V: Clone,
    {
        self.engine.read(|entries| {
            entries
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
    }

    /// Calls `f` on every live entry, oldest first.
    ///
    /// `f` runs while the map is locked and must not call back into it.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        self.engine.read(|entries| {
            for (key, value) in entries.iter() {
                f(key, value);
            }
        });
    }

    /// When `key` expires: `None` if the key is not in the map,
    /// [`ExpiresAt::Never`] if it was inserted as persistent.
    pub fn expiry_at<Q>(&self, key: &Q) -> Option<ExpiresAt>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.engine.expiry_at(key)
    }

    /// The current time-to-live.
    pub fn expiry(&self) -> Duration {
        self.engine.ttl()
    }

    /// Changes the time-to-live of every expiring entry, measured from
    /// its original insertion time.
    pub fn set_expiry(&self, expiry: Duration) -> Result<()> {
        self.engine.set_ttl(expiry)
    }

    pub fn strategy(&self) -> Strategy {
        self.engine.strategy()
    }
}

impl<K, V> Extend<(K, V)> for TimeLimitedMap<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Send + 'static,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.extend_from(iter);
    }
}

impl<K: Hash + Eq, V> fmt::Debug for TimeLimitedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeLimitedMap")
            .field("engine", &self.engine)
            .finish()
    }
}
