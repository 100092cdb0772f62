use crate::error::BuildError;
use crate::handles::CoalescingCache;
use crate::lru_list::LruList;
use crate::metrics::Metrics;
use crate::shared::CacheShared;
use crate::task::janitor::Janitor;
use crate::task::ticker::{ThreadTicker, Ticker};
use crate::time::{Clock, SystemClock};
use crate::{EvictionListener, TaskSpawner};

use core::fmt;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// The smallest capacity a cache can be built with.
pub const MIN_CAPACITY: usize = 10;

/// Plain-data cache configuration, e.g. loaded from a config file.
///
/// With the `serde` feature, durations use humantime notation (`"30s"`,
/// `"5m"`), and both durations may be omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheConfig {
  /// Maximum number of entries. Must be at least [`MIN_CAPACITY`].
  pub capacity: usize,
  /// TTL applied when a call does not pass its own. `None` or zero never expires.
  #[cfg_attr(feature = "serde", serde(default, with = "humantime_serde"))]
  pub default_ttl: Option<Duration>,
  /// Cadence of the background sweeper. `None` disables it.
  #[cfg_attr(feature = "serde", serde(default, with = "humantime_serde"))]
  pub cleanup_interval: Option<Duration>,
}

impl CacheConfig {
  pub fn new(capacity: usize) -> Self {
    Self {
      capacity,
      default_ttl: None,
      cleanup_interval: None,
    }
  }
}

/// A builder for creating `CoalescingCache` instances.
pub struct CacheBuilder<K, V, E, H = ahash::RandomState> {
  pub(crate) capacity: usize,
  pub(crate) default_ttl: Option<Duration>,
  pub(crate) cleanup_interval: Option<Duration>,
  pub(crate) hasher: H,
  clock: Option<Arc<dyn Clock>>,
  ticker: Option<Arc<dyn Ticker>>,
  spawner: Option<Arc<dyn TaskSpawner>>,
  listener: Option<Arc<dyn EvictionListener<K>>>,
  _marker: PhantomData<fn() -> (K, V, E)>,
}

// Manual Debug implementation for CacheBuilder.
impl<K, V, E, H> fmt::Debug for CacheBuilder<K, V, E, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("capacity", &self.capacity)
      .field("default_ttl", &self.default_ttl)
      .field("cleanup_interval", &self.cleanup_interval)
      .field("has_spawner", &self.spawner.is_some())
      .field("has_listener", &self.listener.is_some())
      .finish_non_exhaustive()
  }
}

// --- General Configuration Methods ---
impl<K, V, E, H> CacheBuilder<K, V, E, H> {
  /// Sets the maximum number of entries.
  pub fn capacity(mut self, capacity: usize) -> Self {
    self.capacity = capacity;
    self
  }

  /// Sets the TTL used when a call does not specify one.
  ///
  /// A zero duration is the same as no default: entries never expire.
  pub fn default_ttl(mut self, duration: Duration) -> Self {
    self.default_ttl = Some(duration);
    self
  }

  /// Enables the background sweeper, running `cleanup_expired` on this cadence.
  pub fn cleanup_interval(mut self, duration: Duration) -> Self {
    self.cleanup_interval = Some(duration);
    self
  }

  /// Sets the clock used for expiry. Defaults to [`SystemClock`].
  pub fn clock<C: Clock>(mut self, clock: C) -> Self {
    self.clock = Some(Arc::new(clock));
    self
  }

  /// Sets the ticking service that drives the sweeper. Defaults to
  /// [`ThreadTicker`].
  pub fn ticker<T: Ticker>(mut self, ticker: T) -> Self {
    self.ticker = Some(Arc::new(ticker));
    self
  }

  /// Sets the spawner that drives loads and writes.
  ///
  /// With the `tokio` feature the current Tokio runtime is used by default.
  pub fn spawner(mut self, spawner: Arc<dyn TaskSpawner>) -> Self {
    self.spawner = Some(spawner);
    self
  }

  /// Sets the eviction listener for the cache.
  pub fn eviction_listener<Listener>(mut self, listener: Listener) -> Self
  where
    Listener: EvictionListener<K> + 'static,
  {
    self.listener = Some(Arc::new(listener));
    self
  }
}

// --- Default Constructor ---
impl<K, V, E, H: BuildHasher + Default> CacheBuilder<K, V, E, H> {
  /// Creates a new `CacheBuilder` with default settings. A capacity must be
  /// set before building.
  pub fn new() -> Self {
    Self {
      capacity: 0,
      default_ttl: None,
      cleanup_interval: None,
      hasher: H::default(),
      clock: None,
      ticker: None,
      spawner: None,
      listener: None,
      _marker: PhantomData,
    }
  }

  /// Creates a builder preloaded from a `CacheConfig`.
  pub fn from_config(config: &CacheConfig) -> Self {
    let mut builder = Self::new().capacity(config.capacity);
    builder.default_ttl = config.default_ttl;
    builder.cleanup_interval = config.cleanup_interval;
    builder
  }
}

impl<K, V, E> Default for CacheBuilder<K, V, E, ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

// --- Build Methods ---
impl<K, V, E, H> CacheBuilder<K, V, E, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  E: Send + Sync + 'static,
  H: BuildHasher + Send + Sync + 'static,
{
  /// Sets the hasher for the cache index.
  pub fn hasher<H2: BuildHasher>(self, hasher: H2) -> CacheBuilder<K, V, E, H2> {
    CacheBuilder {
      capacity: self.capacity,
      default_ttl: self.default_ttl,
      cleanup_interval: self.cleanup_interval,
      hasher,
      clock: self.clock,
      ticker: self.ticker,
      spawner: self.spawner,
      listener: self.listener,
      _marker: PhantomData,
    }
  }

  /// Builds the cache, starting the sweeper if a cleanup interval is set.
  pub fn build(self) -> Result<CoalescingCache<K, V, E, H>, BuildError> {
    self.validate()?;

    let spawner = match self.spawner {
      Some(spawner) => spawner,
      None => Self::default_spawner()?,
    };
    let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
    let ticker = self.ticker.unwrap_or_else(|| Arc::new(ThreadTicker));

    let shared = Arc::new(CacheShared {
      store: Mutex::new(LruList::with_hasher(self.hasher)),
      metrics: Metrics::new(),
      capacity: self.capacity,
      default_ttl: self.default_ttl,
      clock,
      spawner,
      listener: self.listener,
      janitor: Mutex::new(None),
    });

    if let Some(interval) = self.cleanup_interval {
      let janitor = Janitor::spawn(Arc::downgrade(&shared), ticker.as_ref(), interval);
      *shared.janitor.lock() = Some(janitor);
    }

    Ok(CoalescingCache { shared })
  }

  #[cfg(feature = "tokio")]
  fn default_spawner() -> Result<Arc<dyn TaskSpawner>, BuildError> {
    crate::runtime::TokioSpawner::try_current()
      .map(|spawner| Arc::new(spawner) as Arc<dyn TaskSpawner>)
      .ok_or(BuildError::SpawnerRequired)
  }

  #[cfg(not(feature = "tokio"))]
  fn default_spawner() -> Result<Arc<dyn TaskSpawner>, BuildError> {
    Err(BuildError::SpawnerRequired)
  }

  /// Validates the builder configuration.
  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    if self.capacity < MIN_CAPACITY {
      return Err(BuildError::CapacityTooSmall {
        capacity: self.capacity,
        minimum: MIN_CAPACITY,
      });
    }
    if self.cleanup_interval.is_some_and(|interval| interval.is_zero()) {
      return Err(BuildError::ZeroCleanupInterval);
    }
    Ok(())
  }
}
