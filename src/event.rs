//! The one-shot completion handle for a single event.
//!
//! An [`EventFuture`] is created once per event accepted by the core and
//! completed exactly once, by whichever caller first wins the
//! pending→success|failure transition. That caller, and only that caller,
//! invokes the event's `end()` terminator and is therefore the one
//! permitted to move the `sent`/`failed_send` counters (see
//! `crate::internal_events`) — this is the guard against the double-count
//! race the design notes call out for shutdown-then-late-flush.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

const PENDING: u8 = 0;
const SUCCESS: u8 = 1;
const FAILURE: u8 = 2;

/// A unit of log data carrying a payload and a one-shot terminator.
///
/// The core never inspects the payload; it only ever calls `end()` exactly
/// once, with the final [`Outcome`].
pub trait Event: Send + 'static {
    /// Invoked exactly once by the core when the event's outcome is known.
    fn end(self, outcome: Outcome);
}

/// The terminal state of an [`EventFuture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure { message: Option<String> },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

struct Inner<E> {
    state: AtomicU8,
    event: Mutex<Option<E>>,
    message: Mutex<Option<String>>,
    notify: Notify,
}

/// A one-shot completion handle for a single event.
///
/// Cloning an `EventFuture` shares the same underlying slot: whichever
/// clone calls `complete`/`fail` first wins, and every other clone
/// observes the same final outcome. This is what lets a batch hand a
/// future to a worker while a shutdown path concurrently holds another
/// clone ready to fail it.
pub struct EventFuture<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for EventFuture<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: fmt::Debug> fmt::Debug for EventFuture<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventFuture")
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl<E: Event> EventFuture<E> {
    /// Creates a new, pending future wrapping `event`.
    pub fn create(event: E) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: AtomicU8::new(PENDING),
                event: Mutex::new(Some(event)),
                message: Mutex::new(None),
                notify: Notify::new(),
            }),
        }
    }

    /// Returns `true` while the future has not yet been completed.
    pub fn is_pending(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == PENDING
    }

    /// Completes the future. Returns `true` if this call performed the
    /// transition (and therefore is the one that should move counters and
    /// invoke `end()`); returns `false` if the future was already
    /// completed, in which case this call is a no-op.
    pub fn complete(&self, success: bool) -> bool {
        self.complete_with(success, None)
    }

    /// Completes the future as a failure with a human-readable reason.
    /// Equivalent to `complete(false)` plus storing `message`. A no-op if
    /// already complete.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.complete_with(false, Some(message.into()))
    }

    fn complete_with(&self, success: bool, message: Option<String>) -> bool {
        let target = if success { SUCCESS } else { FAILURE };
        let won = self
            .inner
            .state
            .compare_exchange(PENDING, target, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if won {
            if let Some(message) = message {
                *self.inner.message.lock() = Some(message);
            }
            let event = self.inner.event.lock().take();
            let outcome = self.outcome_unchecked();
            if let Some(event) = event {
                event.end(outcome);
            }
            self.inner.notify.notify_waiters();
        }
        won
    }

    /// Blocks (asynchronously) until the future is non-pending, returning
    /// the final outcome. The core itself never calls this; it exists for
    /// external callers that want to await an individual event's result.
    pub async fn await_outcome(&self) -> Outcome {
        loop {
            if !self.is_pending() {
                return self.outcome_unchecked();
            }
            let notified = self.inner.notify.notified();
            if self.is_pending() {
                notified.await;
            }
        }
    }

    /// Returns the completed outcome, or `None` while still pending.
    pub fn snapshot(&self) -> Option<Outcome> {
        if self.is_pending() {
            None
        } else {
            Some(self.outcome_unchecked())
        }
    }

    /// Applies `f` to the wrapped event's payload without consuming it.
    ///
    /// Used by the encoder/filter path, which needs read access to a
    /// still-pending event's payload; it never returns `None` in correct
    /// usage since only `complete`/`fail` take the payload out, and those
    /// happen strictly after encoding for any given event.
    pub fn with_event<R>(&self, f: impl FnOnce(&E) -> R) -> Option<R> {
        self.inner.event.lock().as_ref().map(f)
    }

    /// Locks and returns the event slot directly, for callers (the batch
    /// encode path) that need a live `&E` across an iterator rather than
    /// one-shot access through a closure.
    pub(crate) fn event_guard(&self) -> parking_lot::MutexGuard<'_, Option<E>> {
        self.inner.event.lock()
    }

    fn outcome_unchecked(&self) -> Outcome {
        match self.inner.state.load(Ordering::Acquire) {
            SUCCESS => Outcome::Success,
            FAILURE => Outcome::Failure {
                message: self.inner.message.lock().clone(),
            },
            _ => Outcome::Failure {
                message: Some("polled while still pending".to_string()),
            },
        }
    }
}
