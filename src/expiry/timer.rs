//! Per-entry eviction timers
//!
//! Under timer-driven expiry every expiring entry owns exactly one Tokio task
//! that sleeps until the entry's deadline and then evicts it. The registry
//! below is the only owner of those tasks:
//!
//! ```text
//!  insert(k) ──► cancel(k) ──► schedule(k) ──► spawn(sleep_until ─► fire(k, id))
//!  remove(k) ──► cancel(k)
//!  clear()   ──► cancel_all()
//!  drop      ──► cancel_all()
//! ```
//!
//! Aborting a task only helps while it is still sleeping. A task that has
//! already woken up may be waiting on the engine lock while the key is
//! re-inserted, so every timer carries a generation id and a firing task is
//! only honoured if its id is still the registered one.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::trace;

use crate::error::{ExpiryError, Result};

#[derive(Debug)]
struct PendingTimer {
    id: u64,
    handle: AbortHandle,
}

/// Registry of outstanding eviction tasks, one per expiring key.
#[derive(Debug)]
pub(crate) struct Timers<K: Hash + Eq> {
    runtime: Handle,
    pending: HashMap<K, PendingTimer>,
    next_id: u64,
}

impl<K: Hash + Eq> Timers<K> {
    /// Binds the registry to the runtime the caller is running on.
    pub fn on_current_runtime() -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| ExpiryError::NoRuntime)?;
        Ok(Self {
            runtime,
            pending: HashMap::new(),
            next_id: 0,
        })
    }

    /// Spawns the task built by `task` for `key`, replacing (and aborting)
    /// any task already registered for it. `task` receives the generation id
    /// the spawned task must present to [`Timers::complete`].
    pub fn schedule<F, Fut>(&mut self, key: K, task: F)
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.next_id = self.next_id.wrapping_add(1);
        let id = self.next_id;
        let handle = self.runtime.spawn(task(id)).abort_handle();

        if let Some(previous) = self.pending.insert(key, PendingTimer { id, handle }) {
            previous.handle.abort();
        }
    }

    /// Aborts the task registered for `key`, if any.
    pub fn cancel<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.pending.remove(key) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Aborts every outstanding task.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        for (_, timer) in self.pending.drain() {
            timer.handle.abort();
        }
        if cancelled > 0 {
            trace!(cancelled, "Cancelled pending expiry timers");
        }
        cancelled
    }

    /// Claims the registration for `key` on behalf of a firing task.
    ///
    /// Returns `false` when the task is stale: the key was removed,
    /// re-inserted or rescheduled after the task was spawned.
    pub fn complete(&mut self, key: &K, id: u64) -> bool {
        match self.pending.get(key) {
            Some(timer) if timer.id == id => {
                self.pending.remove(key);
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

impl<K: Hash + Eq> Drop for Timers<K> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
