//! The bounded channel between the feeder and the worker pool, carrying
//! sealed batches.
//!
//! Each worker holds its own clone of the receiver half rather than sharing
//! one behind a lock: `async_channel::Receiver::recv` takes `&self`, so an
//! idle worker parks on the empty channel without holding anything another
//! task (e.g. shutdown's drain) would ever need to wait on. Backpressure is
//! still enforced by a `Semaphore`, whose permit rides alongside each item
//! through the channel and is only dropped when a consumer actually removes
//! it, the same permit-travels-with-the-item pairing
//! `topology/channel/limited_queue.rs` uses for its single-consumer
//! channel, generalized here to one with many consumers.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::batch::Batch;
use crate::event::Event;

/// A sealed batch, or the shutdown sentinel ("null batch").
type Item<E> = Option<Arc<Batch<E>>>;
type Slot<E> = (OwnedSemaphorePermit, Item<E>);

#[derive(Debug)]
pub struct QueueClosed;

/// The feeder/scheduler-facing handle: `put` blocks when the queue is at
/// capacity, which is the backpressure surface the spec describes.
#[derive(Clone)]
pub struct BatchQueue<E> {
    tx: async_channel::Sender<Slot<E>>,
    limiter: Arc<Semaphore>,
    capacity: usize,
}

/// The worker-facing handle. Cheap to clone (an `async-channel` receiver
/// handle); one clone per worker, with no wrapping mutex.
#[derive(Clone)]
pub struct BatchQueueReceiver<E> {
    rx: async_channel::Receiver<Slot<E>>,
}

/// Creates a batch queue sized `8 * workers`, per spec.
pub fn batch_queue<E>(workers: usize) -> (BatchQueue<E>, BatchQueueReceiver<E>) {
    let capacity = (8 * workers).max(1);
    let (tx, rx) = async_channel::bounded(capacity);
    (
        BatchQueue {
            tx,
            limiter: Arc::new(Semaphore::new(capacity)),
            capacity,
        },
        BatchQueueReceiver { rx },
    )
}

impl<E: Event> BatchQueue<E> {
    /// Enqueues a sealed batch, blocking while the queue is full.
    pub async fn put(&self, batch: Arc<Batch<E>>) -> Result<(), QueueClosed> {
        let permit = Arc::clone(&self.limiter)
            .acquire_owned()
            .await
            .map_err(|_| QueueClosed)?;
        self.tx
            .send((permit, Some(batch)))
            .await
            .map_err(|_| QueueClosed)
    }

    /// Attempts to enqueue without blocking. A full queue or a closed
    /// receiver is returned as an error for the caller to log and swallow,
    /// rather than propagated as a hard error.
    pub fn try_put(&self, batch: Arc<Batch<E>>) -> Result<(), TryPutError<E>> {
        let permit = Arc::clone(&self.limiter)
            .try_acquire_owned()
            .map_err(|_| TryPutError::Full(Arc::clone(&batch)))?;
        self.tx
            .try_send((permit, Some(batch)))
            .map_err(|err| match err {
                async_channel::TrySendError::Full((_, Some(batch))) => TryPutError::Full(batch),
                async_channel::TrySendError::Full((_, None)) => {
                    unreachable!("sentinel never passed here")
                }
                async_channel::TrySendError::Closed(_) => TryPutError::Closed,
            })
    }

    /// Reserves a slot without blocking, before the caller has decided what
    /// it will enqueue. Used by the flush scheduler: it must not seal the
    /// current batch (removing it from the cell) unless a slot is already
    /// guaranteed, since a seal-then-send-fails sequence would strand the
    /// batch outside both the cell and the queue. Reserving first, then
    /// sealing, then sending through the reservation makes the enqueue
    /// itself infallible short of the channel having been closed out from
    /// under it.
    pub fn try_reserve(&self) -> Result<BatchPermit<E>, TryReserveError> {
        let permit = Arc::clone(&self.limiter)
            .try_acquire_owned()
            .map_err(|_| TryReserveError)?;
        Ok(BatchPermit {
            permit,
            tx: self.tx.clone(),
        })
    }

    /// Enqueues one shutdown sentinel. The lifecycle controller calls this
    /// once per worker.
    pub async fn put_sentinel(&self) -> Result<(), QueueClosed> {
        let permit = Arc::clone(&self.limiter)
            .acquire_owned()
            .await
            .map_err(|_| QueueClosed)?;
        self.tx.send((permit, None)).await.map_err(|_| QueueClosed)
    }

    /// Approximate current occupancy, used only for the "consider more
    /// workers" diagnostic warning.
    pub fn approximate_len(&self) -> usize {
        self.capacity
            .saturating_sub(self.limiter.available_permits())
    }
}

#[derive(Debug)]
pub enum TryPutError<E> {
    Full(Arc<Batch<E>>),
    Closed,
}

/// A reserved queue slot. `send` is infallible in practice: reserving
/// already proved there is room, and the permit travels with the item so
/// the slot stays occupied until a worker actually takes it.
pub struct BatchPermit<E> {
    permit: OwnedSemaphorePermit,
    tx: async_channel::Sender<Slot<E>>,
}

impl<E: Event> BatchPermit<E> {
    pub fn send(self, batch: Arc<Batch<E>>) {
        let _ = self.tx.try_send((self.permit, Some(batch)));
    }
}

#[derive(Debug)]
pub struct TryReserveError;

/// What a worker observed on `take()`.
pub enum Taken<E> {
    Batch(Arc<Batch<E>>),
    /// The shutdown sentinel: the worker should terminate.
    Sentinel,
    /// All senders were dropped without a sentinel ever arriving. Treated
    /// the same as the sentinel (terminate), defensively.
    Closed,
}

impl<E: Event> BatchQueueReceiver<E> {
    /// Takes only `&self`: safe to call concurrently from every worker's
    /// own clone, so an idle worker never parks while holding a lock
    /// another task needs.
    pub async fn take(&self) -> Taken<E> {
        match self.rx.recv().await {
            Ok((permit, Some(batch))) => {
                drop(permit);
                Taken::Batch(batch)
            }
            Ok((permit, None)) => {
                drop(permit);
                Taken::Sentinel
            }
            Err(_) => Taken::Closed,
        }
    }

    /// Drains whatever is currently queued, without blocking. Used by
    /// shutdown to collect in-flight batches so every pending future in
    /// them can be failed before the workers are told to stop. Races
    /// harmlessly against a worker's own concurrent `take()`: the channel
    /// delivers each queued item to exactly one of them, never both.
    pub fn drain_available(&self) -> Vec<Arc<Batch<E>>> {
        let mut drained = Vec::new();
        while let Ok((permit, item)) = self.rx.try_recv() {
            drop(permit);
            if let Some(batch) = item {
                drained.push(batch);
            }
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Outcome;

    struct NoopEvent;
    impl Event for NoopEvent {
        fn end(self, _outcome: Outcome) {}
    }

    #[tokio::test]
    async fn put_then_take_round_trips() {
        let (queue, rx) = batch_queue::<NoopEvent>(1);
        assert_eq!(queue.approximate_len(), 0);
        let batch = Arc::new(Batch::new(Arc::from("s")));
        queue.put(Arc::clone(&batch)).await.unwrap();
        assert_eq!(queue.approximate_len(), 1);

        match rx.take().await {
            Taken::Batch(got) => assert!(Arc::ptr_eq(&got, &batch)),
            _ => panic!("expected a batch"),
        }
    }

    #[tokio::test]
    async fn sentinel_per_worker_terminates_each() {
        let (queue, rx) = batch_queue::<NoopEvent>(2);
        queue.put_sentinel().await.unwrap();
        queue.put_sentinel().await.unwrap();

        assert!(matches!(rx.take().await, Taken::Sentinel));
        assert!(matches!(rx.take().await, Taken::Sentinel));
    }

    #[tokio::test]
    async fn each_worker_clone_can_take_without_a_shared_lock() {
        let (queue, rx) = batch_queue::<NoopEvent>(2);
        let rx_a = rx.clone();
        let rx_b = rx.clone();

        queue.put(Arc::new(Batch::new(Arc::from("s")))).await.unwrap();
        queue.put(Arc::new(Batch::new(Arc::from("s")))).await.unwrap();

        let (a, b) = tokio::join!(rx_a.take(), rx_b.take());
        let batches = [a, b]
            .into_iter()
            .filter(|taken| matches!(taken, Taken::Batch(_)))
            .count();
        assert_eq!(batches, 2, "both clones should independently receive a batch");
    }

    #[tokio::test]
    async fn drain_available_collects_without_blocking() {
        let (queue, rx) = batch_queue::<NoopEvent>(1);
        queue.put(Arc::new(Batch::new(Arc::from("s")))).await.unwrap();
        queue.put(Arc::new(Batch::new(Arc::from("s")))).await.unwrap();

        let drained = rx.drain_available();
        assert_eq!(drained.len(), 2);
    }

    #[tokio::test]
    async fn queue_capacity_is_eight_times_workers() {
        let (queue, _rx) = batch_queue::<NoopEvent>(3);
        for _ in 0..24 {
            queue
                .try_put(Arc::new(Batch::new(Arc::from("s"))))
                .expect("capacity should hold 8*workers items");
        }
        assert!(matches!(
            queue.try_put(Arc::new(Batch::new(Arc::from("s")))),
            Err(TryPutError::Full(_))
        ));
    }
}
