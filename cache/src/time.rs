use crate::task::ticker::{TickHandle, Ticker};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

// The single, static reference point for wall-clock time in the cache.
// It is initialized lazily on its first use.
static CACHE_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// A helper to get the current time as a `Duration` since the epoch.
#[inline]
pub(crate) fn now_duration() -> Duration {
  Instant::now().saturating_duration_since(*CACHE_EPOCH)
}

/// A source of monotonic time for expiry calculations.
///
/// Time is expressed as a `Duration` since an arbitrary, clock-specific epoch.
pub trait Clock: Send + Sync + 'static {
  fn now(&self) -> Duration;
}

/// The default clock, backed by `std::time::Instant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  #[inline]
  fn now(&self) -> Duration {
    now_duration()
  }
}

struct ManualTimer {
  id: u64,
  interval: Duration,
  next_due: Duration,
  tick: Arc<Mutex<Box<dyn FnMut() + Send>>>,
}

#[derive(Default)]
struct ManualState {
  now: Duration,
  next_id: u64,
  timers: Vec<ManualTimer>,
}

/// A virtual clock that only moves when told to.
///
/// `ManualClock` is both a [`Clock`] and a [`Ticker`], so handing the same
/// instance to the builder for both lets tests drive expiry and the
/// background sweeper deterministically with [`advance`](Self::advance).
#[derive(Clone, Default)]
pub struct ManualClock {
  state: Arc<Mutex<ManualState>>,
}

impl fmt::Debug for ManualClock {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.lock();
    f.debug_struct("ManualClock")
      .field("now", &state.now)
      .field("active_timers", &state.timers.len())
      .finish()
  }
}

impl ManualClock {
  pub fn new() -> Self {
    Self::default()
  }

  /// Moves time forward by `by`, firing every tick that falls due on the way
  /// in chronological order. Ticks run on the calling thread.
  pub fn advance(&self, by: Duration) {
    let target = self.state.lock().now.saturating_add(by);

    loop {
      let due = {
        let mut state = self.state.lock();
        let next = state
          .timers
          .iter_mut()
          .filter(|timer| timer.next_due <= target)
          .min_by_key(|timer| timer.next_due)
          .map(|timer| {
            let at = timer.next_due;
            timer.next_due = at.saturating_add(timer.interval);
            (at, timer.tick.clone())
          });

        match next {
          Some((at, tick)) => {
            state.now = at;
            Some(tick)
          }
          None => {
            state.now = target;
            None
          }
        }
      };

      match due {
        Some(tick) => (tick.lock())(),
        None => break,
      }
    }
  }

  /// Number of tick registrations that have not been cancelled.
  pub fn active_timers(&self) -> usize {
    self.state.lock().timers.len()
  }
}

impl Clock for ManualClock {
  fn now(&self) -> Duration {
    self.state.lock().now
  }
}

impl Ticker for ManualClock {
  fn start(&self, interval: Duration, tick: Box<dyn FnMut() + Send>) -> TickHandle {
    let interval = interval.max(Duration::from_nanos(1));
    let id = {
      let mut state = self.state.lock();
      let id = state.next_id;
      state.next_id += 1;
      let next_due = state.now.saturating_add(interval);
      state.timers.push(ManualTimer {
        id,
        interval,
        next_due,
        tick: Arc::new(Mutex::new(tick)),
      });
      id
    };

    let state: Weak<Mutex<ManualState>> = Arc::downgrade(&self.state);
    TickHandle::new(move || {
      if let Some(state) = state.upgrade() {
        state.lock().timers.retain(|timer| timer.id != id);
      }
    })
  }
}
