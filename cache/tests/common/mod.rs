#![allow(dead_code)]

use fibre_coalesce::{CacheBuilder, CoalescingCache, EvictionReason, ManualClock};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub type TestCache = CoalescingCache<&'static str, u32, String>;

pub const CAPACITY: usize = 10;
pub const SETTLE_DELAY: Duration = Duration::from_millis(20);

pub type Evictions = Arc<Mutex<Vec<(&'static str, EvictionReason)>>>;

/// Builds a cache driven by the current Tokio runtime.
pub fn cache() -> TestCache {
  CacheBuilder::<&'static str, u32, String>::new()
    .capacity(CAPACITY)
    .build()
    .unwrap()
}

/// Builds a cache that records every eviction.
pub fn recording_cache() -> (TestCache, Evictions) {
  let evictions: Evictions = Arc::new(Mutex::new(Vec::new()));
  let cache = CacheBuilder::<&'static str, u32, String>::new()
    .capacity(CAPACITY)
    .eviction_listener({
      let evictions = evictions.clone();
      move |key, reason| evictions.lock().push((key, reason))
    })
    .build()
    .unwrap();
  (cache, evictions)
}

/// Builds a cache whose expiry and sweeper run on a virtual clock.
pub fn manual_cache(
  clock: &ManualClock,
  default_ttl: Option<Duration>,
  cleanup_interval: Option<Duration>,
) -> TestCache {
  let mut builder = CacheBuilder::<&'static str, u32, String>::new()
    .capacity(CAPACITY)
    .clock(clock.clone())
    .ticker(clock.clone());
  if let Some(ttl) = default_ttl {
    builder = builder.default_ttl(ttl);
  }
  if let Some(interval) = cleanup_interval {
    builder = builder.cleanup_interval(interval);
  }
  builder.build().unwrap()
}
