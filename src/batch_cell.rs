//! The single-slot atomically swappable reference that holds whichever
//! batch is currently accepting new events.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::batch::Batch;
use crate::event::Event;

/// Holds the batch that is currently current, providing an atomic
/// get-and-set primitive (`arc_swap::ArcSwap::swap` *is* the spec's
/// `get_and_set`).
///
/// Any append concurrent with a swap lands in either the pre- or
/// post-swap batch — both are acceptable, and no lock beyond the swap's
/// happens-before edge is needed, because the old batch is still flushed
/// regardless of which one a racing append landed in.
pub struct CurrentBatchCell<E> {
    slot: ArcSwap<Batch<E>>,
    sender_id: Arc<str>,
}

impl<E: Event> CurrentBatchCell<E> {
    pub fn new(sender_id: Arc<str>) -> Self {
        let initial = Arc::new(Batch::new(Arc::clone(&sender_id)));
        Self {
            slot: ArcSwap::new(initial),
            sender_id,
        }
    }

    /// The batch currently accepting appends.
    pub fn current(&self) -> Arc<Batch<E>> {
        self.slot.load_full()
    }

    /// Atomically installs a fresh, empty batch and returns the old one,
    /// sealed. Unconditional — only safe to call when no other swapper can
    /// be racing (e.g. during shutdown, once the stop barrier is held and
    /// the scheduler has been stopped).
    pub fn swap_fresh(&self) -> Arc<Batch<E>> {
        let fresh = Arc::new(Batch::new(Arc::clone(&self.sender_id)));
        let old = self.slot.swap(fresh);
        old.seal();
        old
    }

    /// Installs a fresh, empty batch in place of `expected`, but only if
    /// `expected` is still the current batch. Returns the old (now sealed)
    /// batch if this call performed the swap, or `None` if another swapper
    /// (the scheduler racing the feeder's size trigger, or vice versa) had
    /// already swapped it out first.
    ///
    /// This is the size/age-trigger-safe counterpart to `swap_fresh`: the
    /// feeder and the scheduler can each decide independently, from a
    /// batch reference they read moments earlier, that *this* batch should
    /// be sealed — `compare_and_swap` ensures only one of them actually
    /// performs the hand-off, and the loser simply does nothing, since the
    /// winner's hand-off already covers the same batch.
    pub fn swap_if_current(&self, expected: &Arc<Batch<E>>) -> Option<Arc<Batch<E>>> {
        let fresh = Arc::new(Batch::new(Arc::clone(&self.sender_id)));
        let prev_guard = self.slot.compare_and_swap(expected, fresh);
        let prev: Arc<Batch<E>> = Arc::clone(&prev_guard);
        if Arc::ptr_eq(&prev, expected) {
            prev.seal();
            Some(prev)
        } else {
            None
        }
    }
}
