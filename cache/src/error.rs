use std::fmt;
use std::sync::Arc;

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
  /// The configured capacity is below the supported minimum.
  #[error("cache capacity must be at least {minimum}, got {capacity}")]
  CapacityTooSmall { capacity: usize, minimum: usize },
  /// A cleanup interval of zero was configured. Omit the interval to rely on
  /// lazy expiry only.
  #[error("cleanup interval cannot be zero")]
  ZeroCleanupInterval,
  /// No `TaskSpawner` was configured and no default one is available (the
  /// `tokio` feature is disabled, or the builder ran outside a Tokio runtime).
  #[error("loads and writes require a task spawner or a running Tokio runtime")]
  SpawnerRequired,
}

/// The error a `SharedResult` settles with.
///
/// It is clonable regardless of `E` so every caller coalesced onto the same
/// load observes the identical failure.
#[derive(thiserror::Error)]
pub enum CacheError<E> {
  /// The loader passed to `get` failed.
  #[error("load failed: {0}")]
  Load(Arc<E>),
  /// The saver passed to `save` failed.
  #[error("save failed: {0}")]
  Save(Arc<E>),
  /// The loader or saver panicked before producing an outcome.
  #[error("load or save task panicked before settling")]
  Aborted,
}

impl<E> CacheError<E> {
  /// Returns the error produced by the caller's loader or saver, if any.
  pub fn inner(&self) -> Option<&E> {
    match self {
      CacheError::Load(err) | CacheError::Save(err) => Some(err),
      CacheError::Aborted => None,
    }
  }

  pub fn is_load(&self) -> bool {
    matches!(self, CacheError::Load(_))
  }

  pub fn is_save(&self) -> bool {
    matches!(self, CacheError::Save(_))
  }
}

impl<E> Clone for CacheError<E> {
  fn clone(&self) -> Self {
    match self {
      CacheError::Load(err) => CacheError::Load(err.clone()),
      CacheError::Save(err) => CacheError::Save(err.clone()),
      CacheError::Aborted => CacheError::Aborted,
    }
  }
}

impl<E: fmt::Debug> fmt::Debug for CacheError<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CacheError::Load(err) => f.debug_tuple("Load").field(err).finish(),
      CacheError::Save(err) => f.debug_tuple("Save").field(err).finish(),
      CacheError::Aborted => f.write_str("Aborted"),
    }
  }
}
