//! Time-Limited Set
//!
//! The set counterpart of [`TimeLimitedMap`](crate::TimeLimitedMap): the same
//! expiry engine with values standing in for keys and `()` for values. The expiry callback receives `(value, inserted_at)`.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::{SetBuilder, Strategy};
use crate::error::Result;
use crate::expiry::engine::{Engine, OnExpire};
use crate::expiry::ExpiresAt;

/// A set whose values expire after a time-to-live.
pub struct TimeLimitedSet<T: Hash + Eq> {
    engine: Arc<Engine<T, ()>>,
}

impl<T> TimeLimitedSet<T>
where
    T: Hash + Eq + Clone + Send + 'static,
{
    /// Creates an empty set with lazy-sweep eviction.
    pub fn new(expiry: Duration) -> Result<Self> {
        Self::from_config(expiry, None)
    }

    /// Creates a set with lazy-sweep eviction, pre-filled with expiring values.
    pub fn with_values<I>(expiry: Duration, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
    {
        let set = Self::new(expiry)?;
        set.extend_from(values);
        Ok(set)
    }

    /// Creates an empty set with timer-driven eviction.
    ///
    /// `callback` receives `(value, inserted_at)` once for every value that
    /// expires. Must be called from within a Tokio runtime.
    pub fn with_callback<F>(expiry: Duration, callback: F) -> Result<Self>
    where
        F: Fn(T, Instant) + Send + Sync + 'static,
    {
        Self::builder(expiry).on_expire(callback).build()
    }

    pub fn builder(expiry: Duration) -> SetBuilder<T> {
        SetBuilder::new(expiry)
    }

    pub(crate) fn from_config(
        expiry: Duration,
        on_expire: Option<OnExpire<T, ()>>,
    ) -> Result<Self> {
        Ok(Self {
            engine: Engine::new(expiry, on_expire)?,
        })
    }

    pub(crate) fn extend_from<I>(&self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        for value in values {
            self.engine.insert(value, (), true);
        }
    }

    /// Adds an expiring value, restarting its window if already present.
    ///
    /// Returns `true` if the value was not already live in the set.
    pub fn insert(&self, value: T) -> bool {
        self.engine.insert(value, (), true).is_none()
    }

    /// Adds a value that never expires.
    pub fn insert_persistent(&self, value: T) -> bool {
        self.engine.insert(value, (), false).is_none()
    }

    pub fn remove<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.engine.remove(value).is_some()
    }

    pub fn clear(&self) {
        self.engine.clear();
    }

    pub fn len(&self) -> usize {
        self.engine.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.engine.read(|entries| entries.contains_key(value))
    }

    /// Live values, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.engine
            .read(|entries| entries.iter().map(|(value, _)| value.clone()).collect())
    }

    /// Calls `f` on every live value, oldest first.
    ///
    /// `f` runs while the set is locked and must not call back into it.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&T),
    {
        self.engine
            .read(|entries| entries.iter().for_each(|(value, _)| f(value)));
    }

    /// When `value` expires: `None` if it is not in the set,
    /// [`ExpiresAt::Never`] if it was inserted as persistent.
    pub fn expiry_at<Q>(&self, value: &Q) -> Option<ExpiresAt>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.engine.expiry_at(value)
    }

    pub fn expiry(&self) -> Duration {
        self.engine.ttl()
    }

    pub fn set_expiry(&self, expiry: Duration) -> Result<()> {
        self.engine.set_ttl(expiry)
    }

    pub fn strategy(&self) -> Strategy {
        self.engine.strategy()
    }
}

impl<T> Extend<T> for TimeLimitedSet<T>
where
    T: Hash + Eq + Clone + Send + 'static,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.extend_from(iter);
    }
}

impl<T: Hash + Eq> fmt::Debug for TimeLimitedSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeLimitedSet")
            .field("engine", &self.engine)
            .finish()
    }
}
