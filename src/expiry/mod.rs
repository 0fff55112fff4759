//! Expiry Engine Module
//!
//! This module holds the machinery shared by both containers:
//!
//! - [`ledger`]: sequence-ordered record of when each key was inserted
//! - [`timer`]: owned, cancellable per-entry eviction tasks
//! - [`engine`]: the entry store, ledger and strategy behind one lock
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │  TimeLimitedMap  │     │  TimeLimitedSet  │
//! └────────┬─────────┘     └────────┬─────────┘
//!          │                        │
//!          ▼                        ▼
//! ┌─────────────────────────────────────────────┐
//! │                   Engine                    │
//! │  ┌────────────┐ ┌────────┐ ┌─────────────┐  │
//! │  │ HashMap    │ │ Ledger │ │ Timers      │  │
//! │  │ <K, V>     │ │        │ │ (callback   │  │
//! │  │            │ │        │ │  mode only) │  │
//! │  └────────────┘ └────────┘ └─────────────┘  │
//! └─────────────────────────────────────────────┘
//! ```

pub(crate) mod engine;
pub(crate) mod ledger;
pub(crate) mod timer;

pub use ledger::ExpiresAt;
