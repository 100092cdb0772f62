use crate::result::SharedResult;
use crate::shared::{CacheShared, Saver};
use crate::MetricsSnapshot;

use std::fmt;
use std::future::Future;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;

/// A bounded LRU cache that coalesces concurrent loads and serializes writes
/// per key.
///
/// Every operation that produces a value returns a [`SharedResult`]; the
/// cache itself never blocks. Cloning the cache is cheap and all clones share
/// the same entries.
pub struct CoalescingCache<K, V, E, H = ahash::RandomState> {
  pub(crate) shared: Arc<CacheShared<K, V, E, H>>,
}

impl<K, V, E, H> Clone for CoalescingCache<K, V, E, H> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<K, V, E, H> fmt::Debug for CoalescingCache<K, V, E, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CoalescingCache")
      .field("shared", &self.shared)
      .finish()
  }
}

impl<K, V, E, H> CoalescingCache<K, V, E, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  E: Send + Sync + 'static,
  H: BuildHasher + Send + Sync + 'static,
{
  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics.snapshot()
  }

  /// Returns the result for `key`, calling `loader` only on a miss.
  ///
  /// Concurrent callers for the same key share one in-flight load and observe
  /// the same value or error. If the load fails, the entry is dropped so the
  /// next call retries.
  pub fn get<F, Fut>(&self, key: &K, loader: F) -> SharedResult<V, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
  {
    self.shared.get(key, None, loader)
  }

  /// Like [`get`](Self::get), but a newly created entry uses `ttl` instead of
  /// the default TTL. A zero `ttl` never expires.
  pub fn get_with_ttl<F, Fut>(&self, key: &K, ttl: Duration, loader: F) -> SharedResult<V, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
  {
    self.shared.get(key, Some(ttl), loader)
  }

  /// Stores `value` for `key` after every earlier write for the key settled.
  pub fn put(&self, key: K, value: V) -> SharedResult<V, E> {
    self.shared.put(key, value, None, None)
  }

  pub fn put_with_ttl(&self, key: K, value: V, ttl: Duration) -> SharedResult<V, E> {
    self.shared.put(key, value, Some(ttl), None)
  }

  /// Stores `value` for `key` and persists it with `saver`.
  ///
  /// Writes for one key run strictly in submission order: `saver` is invoked
  /// only after the previous result for the key has settled, and a failure of
  /// that previous result is logged and skipped. If `saver` fails, the error
  /// goes to this caller only and the entry is dropped.
  pub fn save<S, Fut>(&self, key: K, value: V, saver: S) -> SharedResult<V, E>
  where
    S: FnOnce(K, Arc<V>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
  {
    self.shared.put(key, value, None, Some(erase_saver(saver)))
  }

  pub fn save_with_ttl<S, Fut>(&self, key: K, value: V, ttl: Duration, saver: S) -> SharedResult<V, E>
  where
    S: FnOnce(K, Arc<V>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
  {
    self
      .shared
      .put(key, value, Some(ttl), Some(erase_saver(saver)))
  }

  /// Returns the current result for `key` without starting a load or
  /// touching its recency.
  pub fn peek(&self, key: &K) -> Option<SharedResult<V, E>> {
    self.shared.peek(key)
  }

  /// Drops the entry for `key`. Returns `true` if one was present.
  ///
  /// An in-flight load or write keeps running and still settles its result.
  pub fn invalidate(&self, key: &K) -> bool {
    self.shared.invalidate(key)
  }

  /// Returns `true` if `key` maps to a live entry. An expired entry is removed.
  pub fn contains_key(&self, key: &K) -> bool {
    self.shared.contains_key(key)
  }

  /// Number of entries, possibly including expired ones not yet removed.
  pub fn len(&self) -> usize {
    self.shared.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Keys from most to least recently used.
  pub fn keys(&self) -> Vec<K> {
    self.shared.keys()
  }

  /// Removes every expired entry now, returning how many were removed.
  pub fn cleanup_expired(&self) -> usize {
    self.shared.cleanup_expired()
  }

  /// Drops all entries. The background sweeper keeps running.
  pub fn clear(&self) {
    self.shared.clear()
  }

  /// Stops the background sweeper and drops all entries.
  ///
  /// Safe to call more than once. The cache stays usable afterwards, but
  /// expired entries are then only removed lazily.
  pub fn destroy(&self) {
    self.shared.destroy()
  }
}

fn erase_saver<K, V, E, S, Fut>(saver: S) -> Saver<K, V, E>
where
  K: 'static,
  V: 'static,
  E: 'static,
  S: FnOnce(K, Arc<V>) -> Fut + Send + 'static,
  Fut: Future<Output = Result<(), E>> + Send + 'static,
{
  Box::new(move |key: K, value: Arc<V>| saver(key, value).boxed())
}
