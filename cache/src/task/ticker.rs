use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A ticking service the cache uses to run its periodic sweeper.
///
/// Implementations call `tick` roughly every `interval` until the returned
/// [`TickHandle`] is cancelled or dropped.
pub trait Ticker: Send + Sync + 'static {
  fn start(&self, interval: Duration, tick: Box<dyn FnMut() + Send>) -> TickHandle;
}

/// Cancels a running tick registration. Dropping the handle also cancels it.
pub struct TickHandle {
  cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TickHandle {
  pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
    Self {
      cancel: Some(Box::new(cancel)),
    }
  }

  /// Stops all future ticks. A tick that is already running finishes.
  pub fn cancel(mut self) {
    self.cancel_now();
  }

  fn cancel_now(&mut self) {
    if let Some(cancel) = self.cancel.take() {
      cancel();
    }
  }
}

impl Drop for TickHandle {
  fn drop(&mut self) {
    self.cancel_now();
  }
}

impl fmt::Debug for TickHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TickHandle")
      .field("active", &self.cancel.is_some())
      .finish()
  }
}

#[derive(Default)]
struct StopSignal {
  stopped: Mutex<bool>,
  condvar: Condvar,
}

/// The default ticker: runs each registration on its own OS thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadTicker;

impl Ticker for ThreadTicker {
  fn start(&self, interval: Duration, mut tick: Box<dyn FnMut() + Send>) -> TickHandle {
    let signal = Arc::new(StopSignal::default());
    let thread_signal = signal.clone();

    let spawned = thread::Builder::new()
      .name("fibre-coalesce-janitor".into())
      .spawn(move || {
        let mut stopped = thread_signal.stopped.lock();
        loop {
          let deadline = Instant::now() + interval;
          while !*stopped {
            if thread_signal
              .condvar
              .wait_until(&mut stopped, deadline)
              .timed_out()
            {
              break;
            }
          }
          if *stopped {
            return;
          }
          // The flag is not held while the tick runs.
          parking_lot::MutexGuard::unlocked(&mut stopped, || tick());
        }
      });

    if let Err(err) = spawned {
      tracing::error!(error = %err, "failed to spawn janitor thread; expired entries will only be removed lazily");
    }

    TickHandle::new(move || {
      *signal.stopped.lock() = true;
      signal.condvar.notify_all();
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[test]
  fn thread_ticker_ticks_until_cancelled() {
    let count = Arc::new(AtomicUsize::new(0));
    let handle = {
      let count = count.clone();
      ThreadTicker.start(
        Duration::from_millis(5),
        Box::new(move || {
          count.fetch_add(1, Ordering::SeqCst);
        }),
      )
    };

    thread::sleep(Duration::from_millis(100));
    handle.cancel();
    let after_cancel = count.load(Ordering::SeqCst);
    assert!(after_cancel > 0, "ticker should have fired at least once");

    thread::sleep(Duration::from_millis(50));
    // At most one tick that was already in progress may land after cancel.
    assert!(count.load(Ordering::SeqCst) <= after_cancel + 1);
  }

  #[test]
  fn dropping_the_handle_cancels() {
    let count = Arc::new(AtomicUsize::new(0));
    {
      let count = count.clone();
      let _handle = ThreadTicker.start(
        Duration::from_millis(20),
        Box::new(move || {
          count.fetch_add(1, Ordering::SeqCst);
        }),
      );
    }
    thread::sleep(Duration::from_millis(80));
    assert_eq!(count.load(Ordering::SeqCst), 0);
  }
}
