use crate::shared::CacheShared;
use crate::task::ticker::{TickHandle, Ticker};

use std::hash::{BuildHasher, Hash};
use std::sync::Weak;
use std::time::Duration;

/// The background sweeper that removes expired entries on a fixed cadence.
///
/// It only holds a weak back-reference to the cache core, so it never keeps
/// a dropped cache alive and owns none of its data.
#[derive(Debug)]
pub(crate) struct Janitor {
  handle: TickHandle,
}

impl Janitor {
  /// Registers the sweep with `ticker`.
  pub(crate) fn spawn<K, V, E, H>(
    shared: Weak<CacheShared<K, V, E, H>>,
    ticker: &dyn Ticker,
    tick_interval: Duration,
  ) -> Self
  where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    E: Send + Sync + 'static,
    H: BuildHasher + Send + Sync + 'static,
  {
    let handle = ticker.start(
      tick_interval,
      Box::new(move || {
        if let Some(shared) = shared.upgrade() {
          shared.sweep();
        }
      }),
    );

    Self { handle }
  }

  /// Stops the sweeper. A sweep that is already running completes.
  pub(crate) fn stop(self) {
    self.handle.cancel();
  }
}
