//! Shared Expiry Engine
//!
//! Both [`TimeLimitedMap`](crate::TimeLimitedMap) and
//! [`TimeLimitedSet`](crate::TimeLimitedSet) are thin façades over this
//! engine. It owns the entry store, the timestamp ledger and the active
//! eviction strategy, and keeps the three consistent.
//!
//! ## Strategies
//!
//! ```text
//!                ┌────────────────────────────────────────────┐
//!  façade call ─►│ Mutex<State>                               │
//!                │  ┌─────────────┐   ┌──────────────────────┐ │
//!                │  │ HashMap<K,V>│◄─►│ Ledger (insert order)│ │
//!                │  └─────────────┘   └──────────────────────┘ │
//!                │        ▲                                    │
//!                │        │ lazy: take_expired() before calls  │
//!                │        │ timer: one task per expiring key   │
//!                └────────┼────────────────────────────────────┘
//!                         │
//!                 Tokio timer task ── fire(key, id) ──► on_expire(key, value, inserted_at)
//! ```
//!
//! The callback always runs after the entry has been removed and with the
//! lock released.

use parking_lot::Mutex;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::{validate_expiry, Strategy};
use crate::error::Result;
use crate::expiry::ledger::{deadline, ExpiresAt, Ledger};
use crate::expiry::timer::Timers;

/// Callback invoked with `(key, value, inserted_at)` when an entry expires.
pub(crate) type OnExpire<K, V> = Box<dyn Fn(K, V, Instant) + Send + Sync>;

/// Read-only view of the live entries, in ledger order.
pub(crate) struct Entries<'a, K, V> {
    ledger: &'a Ledger<K>,
    store: &'a HashMap<K, V>,
}

impl<'a, K: Hash + Eq + Clone, V> Entries<'a, K, V> {
    pub fn get<Q>(&self, key: &Q) -> Option<&'a V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.get(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Live entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (&'a K, &'a V)> + 'a {
        let store = self.store;
        self.ledger
            .keys()
            .filter_map(move |key| store.get_key_value(key))
    }
}

/// Everything guarded by the engine lock.
struct State<K: Hash + Eq, V> {
    ttl: Duration,
    store: HashMap<K, V>,
    ledger: Ledger<K>,
    /// `Some` under timer-driven expiry
    timers: Option<Timers<K>>,
}

impl<K: Hash + Eq + Clone, V> State<K, V> {
    /// Lazy sweep: drops every expired entry from the ledger and the store.
    fn sweep(&mut self, now: Instant) -> usize {
        let expired = self.ledger.take_expired(now, self.ttl);
        for key in &expired {
            self.store.remove(key);
        }
        if !expired.is_empty() {
            trace!(
                expired = expired.len(),
                remaining = self.store.len(),
                "Swept expired entries"
            );
        }
        expired.len()
    }

    /// Brings the state up to date before an operation. Timer-driven state
    /// is reaped by its tasks and needs no reconciliation.
    fn reconcile(&mut self) {
        if self.timers.is_none() {
            self.sweep(Instant::now());
        }
    }
}

/// The expiry engine shared between a façade and its timer tasks.
pub(crate) struct Engine<K: Hash + Eq, V> {
    state: Mutex<State<K, V>>,
    on_expire: Option<OnExpire<K, V>>,
}

impl<K, V> Engine<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Send + 'static,
{
    /// Creates an engine. A callback selects timer-driven expiry, which
    /// must be created from within a Tokio runtime.
    pub fn new(ttl: Duration, on_expire: Option<OnExpire<K, V>>) -> Result<Arc<Self>> {
        let ttl = validate_expiry(ttl)?;
        let timers = if on_expire.is_some() {
            Some(Timers::on_current_runtime()?)
        } else {
            None
        };

        Ok(Arc::new(Self {
            state: Mutex::new(State {
                ttl,
                store: HashMap::new(),
                ledger: Ledger::default(),
                timers,
            }),
            on_expire,
        }))
    }

    pub fn strategy(&self) -> Strategy {
        if self.on_expire.is_some() {
            Strategy::TimerDriven
        } else {
            Strategy::LazySweep
        }
    }

    /// Inserts or replaces `key`, restarting its expiry window.
    pub fn insert(self: &Arc<Self>, key: K, value: V, expire: bool) -> Option<V> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let now = Instant::now();

        if let Some(timers) = state.timers.as_mut() {
            timers.cancel(&key);
        } else {
            state.sweep(now);
        }

        state.ledger.record(key.clone(), now, expire);
        let previous = state.store.insert(key.clone(), value);

        if expire {
            if let (Some(timers), ExpiresAt::At(at)) =
                (state.timers.as_mut(), deadline(now, state.ttl))
            {
                self.schedule(timers, key, at);
            }
        }

        previous
    }

    /// Spawns the eviction task for `key`. The task only holds a weak
    /// reference, so a dropped container is never kept alive by its timers.
    fn schedule(self: &Arc<Self>, timers: &mut Timers<K>, key: K, deadline: Instant) {
        let engine = Arc::downgrade(self);
        let task_key = key.clone();
        timers.schedule(key, move |id| async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(engine) = Weak::upgrade(&engine) {
                engine.fire(task_key, id);
            }
        });
    }

    /// Evicts `key` on behalf of timer `id` and notifies the callback.
    fn fire(&self, key: K, id: u64) {
        let evicted = {
            let mut state = self.state.lock();
            let current = match state.timers.as_mut() {
                Some(timers) => timers.complete(&key, id),
                None => false,
            };
            if !current {
                trace!("Ignoring stale expiry timer");
                return;
            }

            let record = state.ledger.remove(&key);
            let value = state.store.remove(&key);
            record.zip(value)
        };

        if let Some((record, value)) = evicted {
            debug!(
                elapsed_ms = record.inserted_at.elapsed().as_millis() as u64,
                "Expiry timer fired"
            );
            if let Some(on_expire) = &self.on_expire {
                on_expire(key, value, record.inserted_at);
            }
        }
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if let Some(timers) = state.timers.as_mut() {
            if timers.cancel(key) {
                debug!("Cancelled expiry timer for removed entry");
            }
        } else {
            state.sweep(Instant::now());
        }

        state.ledger.remove(key);
        state.store.remove(key)
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        if let Some(timers) = state.timers.as_mut() {
            timers.cancel_all();
        }
        state.ledger.clear();
        state.store.clear();
    }

    /// Runs `f` against the reconciled live entries.
    pub fn read<R>(&self, f: impl FnOnce(Entries<'_, K, V>) -> R) -> R {
        let mut guard = self.state.lock();
        guard.reconcile();
        let state = &*guard;
        f(Entries {
            ledger: &state.ledger,
            store: &state.store,
        })
    }

    pub fn len(&self) -> usize {
        self.read(|entries| entries.len())
    }

    pub fn expiry_at<Q>(&self, key: &Q) -> Option<ExpiresAt>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut state = self.state.lock();
        state.reconcile();
        state.ledger.expiry_of(key, state.ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.state.lock().ttl
    }

    /// Changes the time-to-live. Pending timers are moved to
    /// `inserted_at + ttl` so they agree with [`Engine::expiry_at`].
    pub fn set_ttl(self: &Arc<Self>, ttl: Duration) -> Result<()> {
        let ttl = validate_expiry(ttl)?;
        let mut state = self.state.lock();
        let previous = std::mem::replace(&mut state.ttl, ttl);

        let State { ledger, timers, .. } = &mut *state;
        if let Some(timers) = timers.as_mut() {
            let expiring = ledger.expiring();
            for (key, inserted_at) in expiring.iter().cloned() {
                match deadline(inserted_at, ttl) {
                    ExpiresAt::At(at) => self.schedule(timers, key, at),
                    ExpiresAt::Never => {
                        timers.cancel(&key);
                    }
                }
            }
            debug!(
                previous_ms = previous.as_millis() as u64,
                ttl_ms = ttl.as_millis() as u64,
                rescheduled = expiring.len(),
                "Expiry changed"
            );
        } else {
            debug!(
                previous_ms = previous.as_millis() as u64,
                ttl_ms = ttl.as_millis() as u64,
                "Expiry changed"
            );
        }

        Ok(())
    }

    #[cfg(test)]
    pub fn pending_timers(&self) -> usize {
        self.state
            .lock()
            .timers
            .as_ref()
            .map(|timers| timers.len())
            .unwrap_or(0)
    }

    #[cfg(test)]
    pub fn ledger_len(&self) -> usize {
        self.state.lock().ledger.len()
    }
}

impl<K: Hash + Eq, V> std::fmt::Debug for Engine<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Engine")
            .field("ttl", &state.ttl)
            .field("entries", &state.store.len())
            .field("timer_driven", &state.timers.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio_test::assert_ok;

    type MapEngine = Engine<String, u32>;

    const TTL: Duration = Duration::from_millis(100);

    fn lazy() -> Arc<MapEngine> {
        assert_ok!(MapEngine::new(TTL, None))
    }

    fn timed() -> (Arc<MapEngine>, mpsc::UnboundedReceiver<(String, u32, Instant)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let on_expire: OnExpire<String, u32> = Box::new(move |key, value, inserted_at| {
            let _ = tx.send((key, value, inserted_at));
        });
        (assert_ok!(MapEngine::new(TTL, Some(on_expire))), rx)
    }

    fn keys(engine: &MapEngine) -> Vec<String> {
        engine.read(|entries| entries.iter().map(|(key, _)| key.clone()).collect())
    }

    #[test]
    fn test_entries_follow_ledger_order() {
        let engine = lazy();
        assert_eq!(engine.insert("a".to_string(), 1, true), None);
        engine.insert("b".to_string(), 2, false);
        assert_eq!(engine.insert("a".to_string(), 3, true), Some(1));

        assert_eq!(keys(&engine), vec!["b", "a"]);
        assert_eq!(engine.read(|entries| entries.get("a").copied()), Some(3));
        assert!(engine.read(|entries| entries.contains_key("b")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_insert_and_sweep() {
        let engine = lazy();
        assert_eq!(engine.strategy(), Strategy::LazySweep);

        engine.insert("a".to_string(), 1, true);
        tokio::time::advance(Duration::from_millis(60)).await;
        engine.insert("b".to_string(), 2, true);
        assert_eq!(engine.len(), 2);

        tokio::time::advance(Duration::from_millis(40)).await;
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.ledger_len(), 1);

        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(engine.len(), 0);
        assert_eq!(engine.ledger_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_persistent_entry_does_not_block_sweep() {
        let engine = lazy();

        engine.insert("a".to_string(), 1, true);
        engine.insert("pinned".to_string(), 2, false);
        tokio::time::advance(Duration::from_millis(10)).await;
        engine.insert("b".to_string(), 3, true);

        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.expiry_at("pinned"), Some(ExpiresAt::Never));
        assert_eq!(engine.expiry_at("b"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_persistent_insert_over_expired_entry() {
        let engine = lazy();

        engine.insert("a".to_string(), 1, true);
        tokio::time::advance(TTL).await;

        // The expiring value is already gone; it is not handed back
        assert_eq!(engine.insert("a".to_string(), 2, false), None);
        assert_eq!(engine.expiry_at("a"), Some(ExpiresAt::Never));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_large_expired_prefix() {
        let engine = lazy();

        for i in 0..20_000u32 {
            engine.insert(i.to_string(), i, i % 4 != 0);
        }
        tokio::time::advance(TTL).await;
        engine.insert("fresh".to_string(), 0, true);

        assert_eq!(engine.len(), 5_001);
        assert_eq!(engine.ledger_len(), 5_001);
        assert_eq!(keys(&engine).first().map(String::as_str), Some("0"));
        assert_eq!(keys(&engine).last().map(String::as_str), Some("fresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_far_deadline_is_scheduled() {
        let (engine, mut rx) = timed();
        let century = Duration::from_secs(100 * 365 * 24 * 3600);

        assert_ok!(engine.set_ttl(century));
        let inserted_at = Instant::now();
        engine.insert("a".to_string(), 1, true);
        assert_eq!(engine.pending_timers(), 1);
        assert_eq!(
            engine.expiry_at("a"),
            Some(ExpiresAt::At(inserted_at + century))
        );

        tokio::time::sleep(TTL * 3).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(engine.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_evicts_and_notifies() {
        let (engine, mut rx) = timed();
        assert_eq!(engine.strategy(), Strategy::TimerDriven);

        let inserted_at = Instant::now();
        engine.insert("a".to_string(), 7, true);
        assert_eq!(engine.pending_timers(), 1);

        let (key, value, at) = rx.recv().await.expect("callback should fire");
        assert_eq!((key.as_str(), value, at), ("a", 7, inserted_at));
        assert!(Instant::now() >= inserted_at + TTL);
        assert_eq!(engine.len(), 0);
        assert_eq!(engine.ledger_len(), 0);
        assert_eq!(engine.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_remove_cancels() {
        let (engine, mut rx) = timed();

        engine.insert("a".to_string(), 1, true);
        assert_eq!(engine.remove("a"), Some(1));
        assert_eq!(engine.pending_timers(), 0);

        tokio::time::sleep(TTL * 2).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_persistent_insert_is_inert() {
        let (engine, mut rx) = timed();

        engine.insert("a".to_string(), 1, true);
        engine.insert("a".to_string(), 2, false);
        assert_eq!(engine.pending_timers(), 0);

        tokio::time::sleep(TTL * 3).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(engine.read(|entries| entries.get("a").copied()), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_fire_is_ignored() {
        let (engine, mut rx) = timed();

        engine.insert("a".to_string(), 1, true);
        // A task that woke up before the key was re-inserted
        engine.fire("a".to_string(), 0);
        assert_eq!(engine.len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_ttl_reschedules_timers() {
        let (engine, mut rx) = timed();
        let inserted_at = Instant::now();

        engine.insert("a".to_string(), 1, true);
        assert_ok!(engine.set_ttl(Duration::from_millis(300)));
        assert_eq!(
            engine.expiry_at("a"),
            Some(ExpiresAt::At(inserted_at + Duration::from_millis(300)))
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(engine.len(), 1);

        let (key, _, _) = rx.recv().await.expect("callback should fire");
        assert_eq!(key, "a");
        assert!(Instant::now() >= inserted_at + Duration::from_millis(300));
    }

    #[test]
    fn test_timer_driven_requires_runtime() {
        let on_expire: OnExpire<String, u32> = Box::new(|_, _, _| {});
        assert!(MapEngine::new(TTL, Some(on_expire)).is_err());
        assert!(MapEngine::new(TTL, None).is_ok());
    }
}
