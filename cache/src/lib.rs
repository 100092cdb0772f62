//! An in-process, bounded LRU cache that wraps asynchronous loaders and
//! savers.
//!
//! # Features
//! - **Request coalescing**: concurrent `get`s for a missing key share one
//!   load, and every caller observes the same value or error.
//! - **Serialized writes**: `put`/`save` for a key chain onto the previous
//!   result for that key, so savers run strictly in submission order.
//! - **LRU eviction**: the least recently used entry is dropped as soon as an
//!   insertion exceeds capacity.
//! - **Expiry**: per-entry TTL checked lazily on access, with an optional
//!   background sweeper driven by an injectable ticker.
//! - **Self-healing**: an entry whose load or save fails is removed, so the
//!   next call starts fresh.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use fibre_coalesce::CacheBuilder;
//!
//! let cache = CacheBuilder::<u64, String, std::io::Error>::new()
//!   .capacity(1_000)
//!   .build()?;
//!
//! let name = cache
//!   .get(&7, || async { Ok::<_, std::io::Error>("seven".to_string()) })
//!   .await?;
//! assert_eq!(name.as_str(), "seven");
//! # Ok(())
//! # }
//! ```

// Public modules that form the API
pub mod builder;
pub mod error;
pub mod handles;
pub mod listener;
pub mod metrics;
pub mod result;
pub mod runtime;
pub mod task;
pub mod time;

// Internal, crate-only modules
mod entry;
mod lru_list;
mod shared;

// Re-export the primary user-facing types for convenience
pub use builder::{CacheBuilder, CacheConfig, MIN_CAPACITY};
pub use error::{BuildError, CacheError};
pub use handles::CoalescingCache;
pub use listener::{EvictionListener, EvictionReason};
pub use metrics::MetricsSnapshot;
pub use result::{Outcome, SharedResult};
pub use runtime::TaskSpawner;
#[cfg(feature = "tokio")]
pub use runtime::TokioSpawner;
pub use task::ticker::{ThreadTicker, TickHandle, Ticker};
pub use time::{Clock, ManualClock, SystemClock};
