//! Timestamp Ledger
//!
//! The ledger records, for every live key, when it was inserted and whether it
//! is allowed to expire. Each write stamps the key with a fresh sequence
//! number, so re-inserting a key moves it to the back. Because every record is
//! stamped with the current time when it is written, sequence order is also
//! ascending `inserted_at` order:
//!
//! ```text
//!   order (every key)          expiring (expiring keys only)
//!  ┌─────┬──────────┐          ┌─────┬──────────┐
//!  │ seq │ key      │          │ seq │ key      │
//!  ├─────┼──────────┤          ├─────┼──────────┤
//!  │  1  │ a  t=0   │          │  1  │ a  t=0   │ ◄─ pop_first while
//!  │  2  │ b  t=1   │          │  2  │ b  t=1   │    inserted_at <= now - ttl
//!  │  3  │ P  t=2   │          │  4  │ c  t=3   │
//!  │  4  │ c  t=3   │          │  5  │ d  t=9   │ ◄─ first live record: stop
//!  │  5  │ d  t=9   │          └─────┴──────────┘
//!  └─────┴──────────┘
//! ```
//!
//! Non-expiring records (`P` above) are never queued for expiry, so a sweep
//! can neither stop at them nor rescan them. Its cost is proportional to the
//! number of records it removes.

use std::borrow::Borrow;
use std::collections::{btree_map, BTreeMap, HashMap};
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// A ledger entry: when the key was inserted and whether it may expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Record {
    /// When the key was (last) inserted
    pub inserted_at: Instant,
    /// `false` for entries inserted as persistent
    pub expires: bool,
}

/// When a tracked key expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiresAt {
    /// The key was inserted as persistent, or its deadline lies beyond
    /// what the clock can represent
    Never,
    /// The key expires at this instant
    At(Instant),
}

impl ExpiresAt {
    /// Returns the expiry instant, or `None` for keys that never expire.
    pub fn instant(self) -> Option<Instant> {
        match self {
            ExpiresAt::Never => None,
            ExpiresAt::At(at) => Some(at),
        }
    }
}

#[derive(Debug)]
struct Slot {
    record: Record,
    seq: u64,
}

/// Records keyed by `K`, ordered by insertion sequence.
#[derive(Debug)]
pub(crate) struct Ledger<K> {
    slots: HashMap<K, Slot>,
    /// Every tracked key, oldest first
    order: BTreeMap<u64, K>,
    /// Expiring keys only, oldest first
    expiring: BTreeMap<u64, K>,
    next_seq: u64,
}

impl<K> Default for Ledger<K> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
            order: BTreeMap::new(),
            expiring: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl<K: Hash + Eq + Clone> Ledger<K> {
    /// Upserts a record, moving the key to the newest position.
    ///
    /// Returns the record it replaced.
    pub fn record(&mut self, key: K, now: Instant, expires: bool) -> Option<Record> {
        let previous = self.remove(&key);

        self.next_seq += 1;
        let seq = self.next_seq;
        self.order.insert(seq, key.clone());
        if expires {
            self.expiring.insert(seq, key.clone());
        }
        self.slots.insert(
            key,
            Slot {
                record: Record {
                    inserted_at: now,
                    expires,
                },
                seq,
            },
        );

        previous
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<Record>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.slots.remove(key)?;
        self.order.remove(&slot.seq);
        self.expiring.remove(&slot.seq);
        Some(slot.record)
    }

    #[cfg(test)]
    pub fn get<Q>(&self, key: &Q) -> Option<Record>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.slots.get(key).map(|slot| slot.record)
    }

    /// Absolute expiry of `key` under `ttl`, `None` if the key is unknown.
    pub fn expiry_of<Q>(&self, key: &Q, ttl: Duration) -> Option<ExpiresAt>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.slots.get(key).map(|slot| {
            if slot.record.expires {
                deadline(slot.record.inserted_at, ttl)
            } else {
                ExpiresAt::Never
            }
        })
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.order.clear();
        self.expiring.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Every tracked key, oldest first.
    pub fn keys(&self) -> btree_map::Values<'_, u64, K> {
        self.order.values()
    }

    /// Keys and insertion times of every expiring record, oldest first.
    pub fn expiring(&self) -> Vec<(K, Instant)> {
        self.expiring
            .values()
            .filter_map(|key| {
                let slot = self.slots.get(key)?;
                Some((key.clone(), slot.record.inserted_at))
            })
            .collect()
    }

    /// Removes every expiring record inserted at or before `now - ttl` and
    /// returns their keys, oldest first.
    ///
    /// Stops at the first expiring record still inside the window; every
    /// record after it is newer.
    pub fn take_expired(&mut self, now: Instant, ttl: Duration) -> Vec<K> {
        let Some(cutoff) = now.checked_sub(ttl) else {
            return Vec::new();
        };

        let mut expired = Vec::new();
        while let Some((_, key)) = self.expiring.first_key_value() {
            let live = self
                .slots
                .get(key)
                .is_some_and(|slot| slot.record.inserted_at > cutoff);
            if live {
                break;
            }

            if let Some((seq, key)) = self.expiring.pop_first() {
                self.order.remove(&seq);
                self.slots.remove(&key);
                expired.push(key);
            }
        }

        expired
    }
}

/// `inserted_at + ttl`, or [`ExpiresAt::Never`] when that is past the end
/// of the clock.
pub(crate) fn deadline(inserted_at: Instant, ttl: Duration) -> ExpiresAt {
    inserted_at
        .checked_add(ttl)
        .map_or(ExpiresAt::Never, ExpiresAt::At)
}
