//! An append-only collection of event futures bound to one sender.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::encoding::Encoder;
use crate::error::EncodeError;
use crate::event::{Event, EventFuture, Outcome};

/// A group of event futures that is flushed together by one worker call.
///
/// A `Batch` is mutable (appendable) only while it is the *current* batch,
/// i.e. while it is held in a [`crate::batch_cell::CurrentBatchCell`]. A
/// caller normally stops appending once the cell has swapped it out, but an
/// append racing a concurrent swap is expected, not a bug: the feeder reads
/// the current batch and appends to it as two separate steps, and the
/// scheduler can seal that very batch in between. The append still lands
/// safely in the (now sealed) old batch and is still flushed; the cell's
/// swap is the ordering guarantee, not `append` itself.
pub struct Batch<E> {
    sender_id: Arc<str>,
    futures: Mutex<Vec<EventFuture<E>>>,
    sealed: AtomicBool,
    finalized: AtomicBool,
}

impl<E: Event> Batch<E> {
    /// Creates a fresh, empty, appendable batch for `sender_id`.
    pub fn new(sender_id: Arc<str>) -> Self {
        Self {
            sender_id,
            futures: Mutex::new(Vec::new()),
            sealed: AtomicBool::new(false),
            finalized: AtomicBool::new(false),
        }
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    /// Appends `event`, returning the future that will carry its outcome.
    /// Tolerates a batch that has already been sealed by a racing swap (see
    /// the struct docs); the event is still flushed along with the rest of
    /// the batch it landed in.
    pub fn append(&self, event: E) -> EventFuture<E> {
        let future = EventFuture::create(event);
        self.futures.lock().push(future.clone());
        future
    }

    /// Number of futures appended so far (pending or not).
    pub fn len(&self) -> usize {
        self.futures.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Marks the batch as no longer current. Idempotent.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    /// Returns the futures that are still pending, as of this call.
    ///
    /// Used by the worker to drive the sink call and, afterward, to
    /// complete whatever the sink call left pending.
    pub fn pending_iter(&self) -> Vec<EventFuture<E>> {
        self.futures
            .lock()
            .iter()
            .filter(|f| f.is_pending())
            .cloned()
            .collect()
    }

    /// Completes every still-pending future with the same outcome. Used by
    /// the worker on a `flush_batch` throw, and by the lifecycle controller
    /// when draining batches to failure at shutdown.
    pub fn fail_all_pending(&self, message: &str) {
        for future in self.pending_iter() {
            future.fail(message.to_string());
        }
    }

    /// Invokes `report` once per future with its final outcome, then marks
    /// the batch finalized. Idempotent: a second call is a no-op and
    /// returns `false`. This is the per-future status reporting step, which
    /// must run exactly once per sealed batch (including empty ones) after
    /// the sink attempt has completed.
    pub fn finalize<F: FnMut(&Outcome)>(&self, mut report: F) -> bool {
        if self
            .finalized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        for future in self.futures.lock().iter() {
            if let Some(outcome) = future.snapshot() {
                report(&outcome);
            }
        }
        true
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    /// Encodes the batch's still-pending events through `encoder`'s batch
    /// overload. Locks every pending future's event slot for the duration
    /// of the call so the encoder sees a live `&E` sequence without this
    /// batch needing to clone events or give up ownership of them (a
    /// future's event is only ever taken out by `complete`/`fail`, which
    /// for a pending future happens strictly after this returns).
    pub fn encode(&self, encoder: &dyn Encoder<E>) -> Result<bytes::Bytes, EncodeError> {
        let pending = self.pending_iter();
        let guards: Vec<_> = pending.iter().map(EventFuture::event_guard).collect();
        let mut events = guards.iter().filter_map(|guard| guard.as_ref());
        encoder.encode_batch(&mut events)
    }
}
