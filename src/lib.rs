//! # timelimited - Maps and Sets With Expiring Entries
//!
//! `timelimited` provides two in-memory containers whose entries remove
//! themselves a fixed time-to-live after they were inserted:
//!
//! - [`TimeLimitedMap`]: key-value pairs
//! - [`TimeLimitedSet`]: unique values
//!
//! ## Features
//!
//! - **Per-entry clocks**: every entry expires `expiry` after its own insertion
//! - **Lazy sweep**: without a callback, expired entries are purged by the next
//!   operation, touching only the expired prefix of the ledger
//! - **Timer-driven eviction**: with a callback, each entry gets its own Tokio
//!   timer and the callback is told about every expiry
//! - **Persistent entries**: `insert_persistent` opts an entry out of expiry
//! - **Mutable TTL**: `set_expiry` changes the window for existing entries too
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  TimeLimitedMap / TimeLimitedSet  (façade, &self methods)    │
//! │                                                              │
//! │     insert ─► reconcile ─► Ledger.record + Store.insert      │
//! │     get    ─► reconcile ─► Store.get                         │
//! │     remove ─► cancel timer / sweep ─► Ledger + Store remove  │
//! └───────────────────────────────┬──────────────────────────────┘
//!                                 │ Arc<Engine>
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Engine: Mutex<{ store, ledger, timers }> + on_expire         │
//! └───────────────────────────────▲──────────────────────────────┘
//!                                 │ Weak<Engine>
//!                      ┌──────────┴──────────┐
//!                      │ Tokio timer tasks   │ (timer-driven only)
//!                      └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use timelimited::{TimeLimitedMap, TimeLimitedSet};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> timelimited::Result<()> {
//!     // Lazy sweep: no runtime needed, nothing reported
//!     let seen = TimeLimitedSet::with_values(Duration::from_secs(60), ["a", "b"])?;
//!     seen.insert_persistent("admin");
//!
//!     // Timer-driven: the callback hears about every expiry
//!     let sessions = TimeLimitedMap::with_callback(
//!         Duration::from_secs(30),
//!         |user: String, token: String, inserted_at| {
//!             tracing::info!(%user, %token, ?inserted_at, "session expired");
//!         },
//!     )?;
//!     sessions.insert("alice".to_string(), "abc123".to_string());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`map`]: the time-limited map
//! - [`set`]: the time-limited set
//! - [`config`]: builders and eviction [`Strategy`]
//! - [`expiry`]: the shared ledger, timers and engine
//! - [`error`]: configuration errors

pub mod config;
pub mod error;
pub mod expiry;
pub mod map;
pub mod set;

// Re-export commonly used types for convenience
pub use config::{MapBuilder, SetBuilder, Strategy};
pub use error::{ExpiryError, Result};
pub use expiry::ExpiresAt;
pub use map::TimeLimitedMap;
pub use set::TimeLimitedSet;

/// Version of timelimited
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
