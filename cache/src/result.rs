use crate::error::CacheError;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::{self, Thread};

/// The outcome a `SharedResult` settles with.
pub type Outcome<V, E> = Result<Arc<V>, CacheError<E>>;

/// Represents a party waiting on a `SharedResult`.
enum Waiter {
  Sync(Thread),
  Async(Waker),
}

impl Waiter {
  fn wake(self) {
    match self {
      Waiter::Sync(thread) => thread.unpark(),
      Waiter::Async(waker) => waker.wake(),
    }
  }
}

enum State<V, E> {
  Pending,
  Settled(Outcome<V, E>),
}

struct Inner<V, E> {
  state: State<V, E>,
  waiters: VecDeque<Waiter>,
}

/// A settle-once asynchronous result shared by every caller of the same
/// cache slot.
///
/// Cloning the handle is cheap and every clone observes the same outcome. It
/// can be awaited from async code or blocked on with [`wait`](Self::wait),
/// and dropping it never cancels the underlying load or save.
pub struct SharedResult<V, E> {
  inner: Arc<Mutex<Inner<V, E>>>,
}

impl<V, E> Clone for SharedResult<V, E> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
    }
  }
}

impl<V, E> fmt::Debug for SharedResult<V, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = match &self.inner.lock().state {
      State::Pending => "pending",
      State::Settled(Ok(_)) => "resolved",
      State::Settled(Err(_)) => "failed",
    };
    f.debug_struct("SharedResult").field("state", &state).finish()
  }
}

impl<V, E> SharedResult<V, E> {
  /// Creates a new handle in the pending state.
  pub(crate) fn pending() -> Self {
    Self {
      inner: Arc::new(Mutex::new(Inner {
        state: State::Pending,
        waiters: VecDeque::new(),
      })),
    }
  }

  /// Settles the handle and wakes all waiters. Only the first call has any
  /// effect; later outcomes are discarded.
  pub(crate) fn settle(&self, outcome: Outcome<V, E>) -> bool {
    let waiters = {
      let mut inner = self.inner.lock();
      if matches!(inner.state, State::Settled(_)) {
        return false;
      }
      inner.state = State::Settled(outcome);
      std::mem::take(&mut inner.waiters)
    };

    for waiter in waiters {
      waiter.wake();
    }
    true
  }

  /// Returns `true` if both handles refer to the same underlying result.
  #[inline]
  pub fn ptr_eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }

  pub fn is_settled(&self) -> bool {
    matches!(self.inner.lock().state, State::Settled(_))
  }

  /// Returns the outcome if the result has already settled, without waiting.
  pub fn peek(&self) -> Option<Outcome<V, E>> {
    match &self.inner.lock().state {
      State::Pending => None,
      State::Settled(outcome) => Some(outcome.clone()),
    }
  }

  /// Blocks the current thread until the result settles.
  ///
  /// Must not be called from within an async task on a single-threaded
  /// executor that is also responsible for driving the load.
  pub fn wait(&self) -> Outcome<V, E> {
    let mut queued = false;
    loop {
      {
        let mut inner = self.inner.lock();
        match &inner.state {
          State::Settled(outcome) => return outcome.clone(),
          State::Pending if !queued => {
            inner.waiters.push_back(Waiter::Sync(thread::current()));
            queued = true;
          }
          State::Pending => {}
        }
      }
      // Spurious wakeups are handled by re-checking the state.
      thread::park();
    }
  }

  #[cfg(test)]
  fn waiter_count(&self) -> usize {
    self.inner.lock().waiters.len()
  }
}

impl<V, E> Future for SharedResult<V, E> {
  type Output = Outcome<V, E>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let mut inner = self.inner.lock();
    match &inner.state {
      State::Settled(outcome) => Poll::Ready(outcome.clone()),
      State::Pending => {
        let already_queued = inner.waiters.iter().any(|waiter| match waiter {
          Waiter::Async(waker) => waker.will_wake(cx.waker()),
          Waiter::Sync(_) => false,
        });
        if !already_queued {
          inner.waiters.push_back(Waiter::Async(cx.waker().clone()));
        }
        Poll::Pending
      }
    }
  }
}
