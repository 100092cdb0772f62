use std::fmt;

/// Describes the reason an entry was removed from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
  /// The entry was the least recently used when the cache exceeded capacity.
  Capacity,
  /// The entry's time-to-live elapsed.
  Expired,
  /// The entry was manually invalidated.
  Invalidated,
  /// The load or save backing the entry failed.
  Failed,
}

impl fmt::Display for EvictionReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EvictionReason::Capacity => write!(f, "evicted due to capacity"),
      EvictionReason::Expired => write!(f, "evicted due to expiration (TTL)"),
      EvictionReason::Invalidated => write!(f, "manually invalidated"),
      EvictionReason::Failed => write!(f, "removed after a failed load or save"),
    }
  }
}

/// A listener that can be registered with the cache to receive notifications
/// when entries are removed.
///
/// `on_evict` is called on the thread that performed the removal, after the
/// cache's internal lock has been released. Entries dropped by `clear` or
/// `destroy` are not reported.
pub trait EvictionListener<K>: Send + Sync {
  fn on_evict(&self, key: K, reason: EvictionReason);
}

impl<K, F> EvictionListener<K> for F
where
  F: Fn(K, EvictionReason) + Send + Sync,
{
  fn on_evict(&self, key: K, reason: EvictionReason) {
    self(key, reason)
  }
}
