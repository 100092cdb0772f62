use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::listener::{EvictionListener, EvictionReason};
use crate::lru_list::LruList;
use crate::metrics::Metrics;
use crate::result::{Outcome, SharedResult};
use crate::task::janitor::Janitor;
use crate::time::Clock;
use crate::TaskSpawner;

use std::future::Future;
use std::hash::{BuildHasher, Hash};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;
use std::fmt;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;

/// A type-erased saver, invoked once the previous write for its key settled.
pub(crate) type Saver<K, V, E> =
  Box<dyn FnOnce(K, Arc<V>) -> BoxFuture<'static, Result<(), E>> + Send>;

type Removed<K> = Vec<(K, EvictionReason)>;

/// Which kind of production a spawned task drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Production {
  Load,
  Write,
}

/// The internal, thread-safe core of the cache.
///
/// The index and recency list share one lock. Every lookup-then-mutate
/// sequence runs entirely under it and it is never held across an await or
/// while user code runs.
pub(crate) struct CacheShared<K, V, E, H> {
  pub(crate) store: Mutex<LruList<K, CacheEntry<V, E>, H>>,
  pub(crate) metrics: Metrics,
  pub(crate) capacity: usize,
  pub(crate) default_ttl: Option<Duration>,
  pub(crate) clock: Arc<dyn Clock>,
  pub(crate) spawner: Arc<dyn TaskSpawner>,
  pub(crate) listener: Option<Arc<dyn EvictionListener<K>>>,
  pub(crate) janitor: Mutex<Option<Janitor>>,
}

impl<K, V, E, H> fmt::Debug for CacheShared<K, V, E, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("capacity", &self.capacity)
      .field("default_ttl", &self.default_ttl)
      .field("metrics", &self.metrics.snapshot())
      .finish_non_exhaustive()
  }
}

impl<K, V, E, H> Drop for CacheShared<K, V, E, H> {
  fn drop(&mut self) {
    if let Some(janitor) = self.janitor.get_mut().take() {
      janitor.stop();
    }
  }
}

impl<K, V, E, H> CacheShared<K, V, E, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  E: Send + Sync + 'static,
  H: BuildHasher + Send + Sync + 'static,
{
  /// The per-call override if given, else the configured default. Zero means
  /// the entry never expires.
  fn effective_ttl(&self, ttl: Option<Duration>) -> Option<Duration> {
    ttl.or(self.default_ttl).filter(|ttl| !ttl.is_zero())
  }

  /// Returns the shared result for `key`, starting `loader` only when no
  /// live entry exists.
  pub(crate) fn get<F, Fut>(
    self: &Arc<Self>,
    key: &K,
    ttl: Option<Duration>,
    loader: F,
  ) -> SharedResult<V, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
  {
    let now = self.clock.now();
    let mut removed = Vec::new();

    let result = {
      let mut store = self.store.lock();

      if let Some(entry) = store.get(key) {
        if !entry.is_expired(now) {
          let result = entry.result.clone();
          store.move_to_front(key);
          self.metrics.hits.incr();
          tracing::trace!("coalesced onto existing cache entry");
          return result;
        }
        store.remove(key);
        self.metrics.evicted_by_ttl.incr();
        removed.push((key.clone(), EvictionReason::Expired));
      }

      // Publish the pending slot before anything else can observe the miss.
      let result = SharedResult::pending();
      let entry = CacheEntry::new(result.clone(), self.effective_ttl(ttl), now);
      store.push_front(key.clone(), entry);
      self.metrics.misses.incr();
      tracing::trace!("cache miss; starting load");
      self.evict_over_capacity(&mut store, &mut removed);
      result
    };

    self.notify(removed);

    let load = match panic::catch_unwind(AssertUnwindSafe(loader)) {
      Ok(load) => load,
      Err(payload) => {
        self.on_production_failed(key, &result, Production::Load);
        result.settle(Err(CacheError::Aborted));
        panic::resume_unwind(payload);
      }
    };

    let production = async move {
      load
        .await
        .map(Arc::new)
        .map_err(|err| CacheError::Load(Arc::new(err)))
    };
    self.spawn_production(key.clone(), result.clone(), Production::Load, production);
    result
  }

  /// Chains a write for `key` onto whatever result the key currently holds.
  pub(crate) fn put(
    self: &Arc<Self>,
    key: K,
    value: V,
    ttl: Option<Duration>,
    saver: Option<Saver<K, V, E>>,
  ) -> SharedResult<V, E> {
    let now = self.clock.now();
    let ttl = self.effective_ttl(ttl);
    let result = SharedResult::pending();
    let mut removed = Vec::new();

    let previous = {
      let mut store = self.store.lock();

      let previous = store
        .get_mut(&key)
        .map(|entry| entry.replace(result.clone(), ttl, now));

      if previous.is_some() {
        store.move_to_front(&key);
        self.metrics.updates.incr();
      } else {
        store.push_front(key.clone(), CacheEntry::new(result.clone(), ttl, now));
        self.metrics.inserts.incr();
        self.evict_over_capacity(&mut store, &mut removed);
      }
      previous
    };

    self.notify(removed);

    let value = Arc::new(value);
    let shared = Arc::downgrade(self);
    let production = {
      let key = key.clone();
      async move {
        if let Some(previous) = previous {
          if let Err(err) = previous.await {
            tracing::warn!(
              failure = describe(&err),
              "previous result for key failed; continuing with the next write"
            );
            if let Some(shared) = shared.upgrade() {
              shared.metrics.suppressed_failures.incr();
            }
          }
        }

        if let Some(saver) = saver {
          if let Err(err) = saver(key, value.clone()).await {
            return Err(CacheError::Save(Arc::new(err)));
          }
        }
        Ok(value)
      }
    };

    self.spawn_production(key, result.clone(), Production::Write, production);
    result
  }

  /// Drives `production` to completion on the spawner. A failure removes the
  /// entry (if it still holds `result`) before `result` settles.
  ///
  /// If the spawner drops the task before it finishes, for example because
  /// the runtime shut down, the slot fails with `Aborted` instead of staying
  /// pending.
  fn spawn_production<Fut>(
    self: &Arc<Self>,
    key: K,
    result: SharedResult<V, E>,
    kind: Production,
    production: Fut,
  ) where
    Fut: Future<Output = Outcome<V, E>> + Send + 'static,
  {
    let guard = SettleGuard {
      shared: Arc::downgrade(self),
      key,
      result,
      kind,
      armed: true,
    };
    let task = async move {
      let outcome = AssertUnwindSafe(production)
        .catch_unwind()
        .await
        .unwrap_or(Err(CacheError::Aborted));
      guard.finish(outcome);
    };
    self.spawner.spawn(Box::pin(task));
  }

  fn on_production_failed(&self, key: &K, result: &SharedResult<V, E>, kind: Production) {
    match kind {
      Production::Load => self.metrics.load_failures.incr(),
      Production::Write => self.metrics.save_failures.incr(),
    }

    let removed = {
      let mut store = self.store.lock();
      let is_current = store
        .get(key)
        .is_some_and(|entry| entry.result.ptr_eq(result));
      if is_current {
        store.remove(key);
      }
      is_current
    };

    if removed {
      self.metrics.removed_on_failure.incr();
      tracing::debug!(production = ?kind, "removed cache entry after failure");
      self.notify(vec![(key.clone(), EvictionReason::Failed)]);
    }
  }

  /// Drops the least recently used entries until the index fits capacity.
  fn evict_over_capacity(
    &self,
    store: &mut LruList<K, CacheEntry<V, E>, H>,
    removed: &mut Removed<K>,
  ) {
    while store.len() > self.capacity {
      let Some((key, _)) = store.pop_back() else {
        break;
      };
      self.metrics.evicted_by_capacity.incr();
      tracing::debug!(capacity = self.capacity, "evicted least recently used entry");
      removed.push((key, EvictionReason::Capacity));
    }
  }

  pub(crate) fn invalidate(&self, key: &K) -> bool {
    let existed = self.store.lock().remove(key).is_some();
    if existed {
      self.metrics.invalidations.incr();
      self.notify(vec![(key.clone(), EvictionReason::Invalidated)]);
    }
    existed
  }

  pub(crate) fn contains_key(&self, key: &K) -> bool {
    let now = self.clock.now();
    let expired = {
      let mut store = self.store.lock();
      match store.get(key) {
        None => return false,
        Some(entry) if !entry.is_expired(now) => return true,
        Some(_) => store.remove(key).is_some(),
      }
    };

    if expired {
      self.metrics.evicted_by_ttl.incr();
      self.notify(vec![(key.clone(), EvictionReason::Expired)]);
    }
    false
  }

  pub(crate) fn peek(&self, key: &K) -> Option<SharedResult<V, E>> {
    let now = self.clock.now();
    let store = self.store.lock();
    store
      .get(key)
      .filter(|entry| !entry.is_expired(now))
      .map(|entry| entry.result.clone())
  }

  /// Removes every expired entry in one pass, returning how many were removed.
  pub(crate) fn cleanup_expired(&self) -> usize {
    let now = self.clock.now();
    let expired = self
      .store
      .lock()
      .drain_where(|_, entry| entry.is_expired(now));

    let count = expired.len();
    if count > 0 {
      self.metrics.evicted_by_ttl.add(count as u64);
      self.notify(
        expired
          .into_iter()
          .map(|(key, _)| (key, EvictionReason::Expired))
          .collect(),
      );
    }
    count
  }

  /// One janitor tick.
  pub(crate) fn sweep(&self) {
    self.metrics.sweeps.incr();
    let removed = self.cleanup_expired();
    if removed > 0 {
      tracing::debug!(removed, "janitor swept expired entries");
    }
  }

  pub(crate) fn clear(&self) {
    self.store.lock().clear();
  }

  pub(crate) fn destroy(&self) {
    let janitor = self.janitor.lock().take();
    if let Some(janitor) = janitor {
      janitor.stop();
      tracing::debug!("stopped cache janitor");
    }
    self.clear();
  }

  pub(crate) fn len(&self) -> usize {
    self.store.lock().len()
  }

  pub(crate) fn keys(&self) -> Vec<K> {
    self.store.lock().keys()
  }

  fn notify(&self, removed: Removed<K>) {
    if let Some(listener) = &self.listener {
      for (key, reason) in removed {
        listener.on_evict(key, reason);
      }
    }
  }
}

/// Settles a production's result exactly once, even when its task is dropped
/// without running to completion.
struct SettleGuard<K, V, E, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  E: Send + Sync + 'static,
  H: BuildHasher + Send + Sync + 'static,
{
  shared: Weak<CacheShared<K, V, E, H>>,
  key: K,
  result: SharedResult<V, E>,
  kind: Production,
  armed: bool,
}

impl<K, V, E, H> SettleGuard<K, V, E, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  E: Send + Sync + 'static,
  H: BuildHasher + Send + Sync + 'static,
{
  fn finish(mut self, outcome: Outcome<V, E>) {
    self.armed = false;
    self.settle(outcome);
  }

  fn settle(&self, outcome: Outcome<V, E>) {
    if outcome.is_err() {
      if let Some(shared) = self.shared.upgrade() {
        shared.on_production_failed(&self.key, &self.result, self.kind);
      }
    }
    self.result.settle(outcome);
  }
}

impl<K, V, E, H> Drop for SettleGuard<K, V, E, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  E: Send + Sync + 'static,
  H: BuildHasher + Send + Sync + 'static,
{
  fn drop(&mut self) {
    if self.armed {
      tracing::debug!(production = ?self.kind, "production dropped before settling");
      self.settle(Err(CacheError::Aborted));
    }
  }
}

fn describe<E>(err: &CacheError<E>) -> &'static str {
  match err {
    CacheError::Load(_) => "load",
    CacheError::Save(_) => "save",
    CacheError::Aborted => "aborted",
  }
}
