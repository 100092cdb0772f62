use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A relaxed event counter on its own cache line.
#[derive(Debug, Default)]
pub(crate) struct Counter(CachePadded<AtomicU64>);

impl Counter {
  #[inline]
  pub(crate) fn incr(&self) {
    self.add(1);
  }

  #[inline]
  pub(crate) fn add(&self, n: u64) {
    self.0.fetch_add(n, Ordering::Relaxed);
  }

  #[inline]
  pub(crate) fn get(&self) -> u64 {
    self.0.load(Ordering::Relaxed)
  }
}

/// Event counters shared by every handle to one cache.
#[derive(Debug)]
pub(crate) struct Metrics {
  pub(crate) hits: Counter,
  pub(crate) misses: Counter,
  pub(crate) load_failures: Counter,

  pub(crate) inserts: Counter,
  pub(crate) updates: Counter,
  pub(crate) save_failures: Counter,
  pub(crate) suppressed_failures: Counter,

  pub(crate) invalidations: Counter,
  pub(crate) evicted_by_capacity: Counter,
  pub(crate) evicted_by_ttl: Counter,
  pub(crate) removed_on_failure: Counter,

  pub(crate) sweeps: Counter,

  started: Instant,
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self {
      hits: Counter::default(),
      misses: Counter::default(),
      load_failures: Counter::default(),
      inserts: Counter::default(),
      updates: Counter::default(),
      save_failures: Counter::default(),
      suppressed_failures: Counter::default(),
      invalidations: Counter::default(),
      evicted_by_capacity: Counter::default(),
      evicted_by_ttl: Counter::default(),
      removed_on_failure: Counter::default(),
      sweeps: Counter::default(),
      started: Instant::now(),
    }
  }

  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.get();
    let misses = self.misses.get();
    let lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: match lookups {
        0 => 0.0,
        _ => hits as f64 / lookups as f64,
      },
      load_failures: self.load_failures.get(),
      inserts: self.inserts.get(),
      updates: self.updates.get(),
      save_failures: self.save_failures.get(),
      suppressed_failures: self.suppressed_failures.get(),
      invalidations: self.invalidations.get(),
      evicted_by_capacity: self.evicted_by_capacity.get(),
      evicted_by_ttl: self.evicted_by_ttl.get(),
      removed_on_failure: self.removed_on_failure.get(),
      sweeps: self.sweeps.get(),
      uptime_secs: self.started.elapsed().as_secs(),
    }
  }
}

/// Counters read at one moment. Individual fields are not read atomically
/// with respect to each other.
#[derive(Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
  /// Lookups served from an existing entry, pending or settled.
  pub hits: u64,
  /// Lookups that started a new load.
  pub misses: u64,
  /// `hits / (hits + misses)`, or zero before the first lookup.
  pub hit_ratio: f64,
  /// Loads that settled with an error or panicked.
  pub load_failures: u64,
  /// Writes that created a new entry.
  pub inserts: u64,
  /// Writes that replaced the result of an existing entry.
  pub updates: u64,
  /// Saves that settled with an error or panicked.
  pub save_failures: u64,
  /// Failures of a previous result that a chained write swallowed.
  pub suppressed_failures: u64,
  pub invalidations: u64,
  /// Least recently used entries dropped to stay within capacity.
  pub evicted_by_capacity: u64,
  /// Entries found expired, lazily or by a sweep.
  pub evicted_by_ttl: u64,
  /// Entries dropped because their load or save failed.
  pub removed_on_failure: u64,
  /// Background sweeps run so far.
  pub sweeps: u64,
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format_args!("{:.2}%", self.hit_ratio * 100.0))
      .field("load_failures", &self.load_failures)
      .field("save_failures", &self.save_failures)
      .field("suppressed_failures", &self.suppressed_failures)
      .field("evictions", &(self.evicted_by_capacity + self.evicted_by_ttl))
      .field("sweeps", &self.sweeps)
      .field("uptime_secs", &self.uptime_secs)
      .finish_non_exhaustive()
  }
}
