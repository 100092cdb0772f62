use crate::result::SharedResult;

use std::time::Duration;

/// A cache slot: the shared result for a key plus its absolute expiry.
///
/// Recency links are not stored here; they live in the `LruList` node that
/// owns this entry.
#[derive(Debug)]
pub(crate) struct CacheEntry<V, E> {
  pub(crate) result: SharedResult<V, E>,
  /// Expiry instant as a duration since the clock's epoch. `None` never expires.
  expires_at: Option<Duration>,
}

impl<V, E> CacheEntry<V, E> {
  pub(crate) fn new(result: SharedResult<V, E>, ttl: Option<Duration>, now: Duration) -> Self {
    Self {
      result,
      expires_at: ttl.map(|ttl| now.saturating_add(ttl)),
    }
  }

  /// Swaps in the result of a newer write and recomputes the expiry from its
  /// TTL, returning the result it replaced.
  pub(crate) fn replace(
    &mut self,
    result: SharedResult<V, E>,
    ttl: Option<Duration>,
    now: Duration,
  ) -> SharedResult<V, E> {
    self.expires_at = ttl.map(|ttl| now.saturating_add(ttl));
    std::mem::replace(&mut self.result, result)
  }

  #[inline]
  pub(crate) fn is_expired(&self, now: Duration) -> bool {
    self.expires_at.is_some_and(|expires_at| now >= expires_at)
  }
}
