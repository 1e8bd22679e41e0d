//! The lifecycle controller: builds a [`Sender`] from settings, a sink, and
//! an encoder, then owns the feeder task, the worker pool, and the flush
//! scheduler for as long as the sender is running.
//!
//! Startup and shutdown are both serialized against the stop barrier the
//! feeder also acquires per dispatch step (spec §4.9, §9): `stop()` holds
//! that single permit for its entire sequence, which is what guarantees no
//! feeder iteration is mid-dispatch while shutdown proceeds.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::batch_cell::CurrentBatchCell;
use crate::config::SenderSettings;
use crate::encoding::{Encoder, Filter};
use crate::error::ConfigError;
use crate::event::Event;
use crate::internal_events::{self, InternalEvent, ShutdownBegun, ShutdownComplete};
use crate::mode::Mode;
use crate::queue::{batch_queue, BatchQueue, BatchQueueReceiver};
use crate::sink::Sink;
use crate::upstream::Upstream;
use crate::{feeder, scheduler, worker};

/// "Join with a 1-second budget, then interrupt" (spec §4.9/§5), mapped to
/// `tokio::time::timeout` plus `AbortHandle::abort`.
const WORKER_JOIN_BUDGET: Duration = Duration::from_secs(1);

/// Shared state reachable only by batched senders: the current-batch cell,
/// the queue into the worker pool, and the age clock the scheduler reads.
pub(crate) struct BatchingState<E: Event> {
    pub current_batch: CurrentBatchCell<E>,
    pub queue_tx: BatchQueue<E>,
    pub last_flush: Mutex<Instant>,
    pub batch_size: NonZeroUsize,
    pub workers: usize,
}

/// State shared by the feeder, the worker pool, and the scheduler.
pub(crate) struct Core<E: Event> {
    pub sender_id: Arc<str>,
    pub closed: AtomicBool,
    pub shutdown: Notify,
    pub mode: Mode,
    pub flush_interval: Duration,
    pub stop_barrier: Semaphore,
    pub batching: Option<BatchingState<E>>,
}

/// Builds a [`Sender`] from its settings, sink, and encoder. Mirrors this
/// codebase's `SinkConfig::build`-style split between a declarative
/// configuration object and the thing it constructs.
pub struct SenderBuilder<E: Event> {
    sender_id: String,
    settings: SenderSettings,
    sink: Arc<dyn Sink<E>>,
    encoder: Arc<dyn Encoder<E>>,
    filter: Option<Arc<dyn Filter>>,
    management_hook: Option<Arc<dyn Fn() -> Result<(), String> + Send + Sync>>,
}

impl<E: Event> SenderBuilder<E> {
    pub fn new(
        sender_id: impl Into<String>,
        settings: SenderSettings,
        sink: Arc<dyn Sink<E>>,
        encoder: Arc<dyn Encoder<E>>,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            settings,
            sink,
            encoder,
            filter: None,
            management_hook: None,
        }
    }

    pub fn filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Registers a best-effort management/monitoring unregister hook,
    /// invoked during `stop()` after workers have joined. Errors are
    /// logged, never propagated (spec §9 design notes).
    pub fn management_hook(
        mut self,
        hook: Arc<dyn Fn() -> Result<(), String> + Send + Sync>,
    ) -> Self {
        self.management_hook = Some(hook);
        self
    }

    /// Validates settings against the sink's declared capabilities,
    /// verifies the encoder, and spawns the feeder — plus, in batched
    /// mode, the worker pool and flush scheduler.
    pub fn start(self, upstream: Box<dyn Upstream<E>>) -> Result<Sender<E>, ConfigError> {
        self.encoder
            .verify()
            .map_err(|message| ConfigError::EncoderVerificationFailed { message })?;

        let resolved = self.settings.validate(
            self.sink.batch_capable(),
            self.sink.batch_only(),
            self.sink.is_async(),
        )?;

        let sender_id: Arc<str> = Arc::from(self.sender_id.as_str());

        let (batching, queue_rx) = if resolved.mode == Mode::Batched {
            let batch_size = resolved
                .batch_size
                .expect("batched mode always resolves a batch size");
            let (queue_tx, queue_rx) = batch_queue::<E>(resolved.workers);
            (
                Some(BatchingState {
                    current_batch: CurrentBatchCell::new(Arc::clone(&sender_id)),
                    queue_tx,
                    last_flush: Mutex::new(Instant::now()),
                    batch_size,
                    workers: resolved.workers,
                }),
                Some(queue_rx),
            )
        } else {
            (None, None)
        };

        let core = Arc::new(Core {
            sender_id: Arc::clone(&sender_id),
            closed: AtomicBool::new(false),
            shutdown: Notify::new(),
            mode: resolved.mode,
            flush_interval: resolved.flush_interval,
            stop_barrier: Semaphore::new(1),
            batching,
        });

        let feeder_handle = tokio::spawn(feeder::run(
            Arc::clone(&core),
            Arc::clone(&self.sink),
            Arc::clone(&self.encoder),
            self.filter.clone(),
            upstream,
        ));

        let mut worker_handles = Vec::new();
        let mut scheduler_handle = None;
        let mut shared_queue_rx = None;

        if resolved.mode == Mode::Batched {
            let queue_rx = queue_rx.expect("batched mode always creates a queue receiver");

            for worker_id in 0..resolved.workers {
                worker_handles.push(tokio::spawn(worker::run(
                    Arc::clone(&core),
                    Arc::clone(&self.sink),
                    Arc::clone(&self.encoder),
                    self.filter.clone(),
                    queue_rx.clone(),
                    worker_id,
                )));
            }

            scheduler_handle = Some(tokio::spawn(scheduler::run(Arc::clone(&core))));
            shared_queue_rx = Some(queue_rx);
        }

        Ok(Sender {
            core,
            sink: self.sink,
            management_hook: self.management_hook,
            feeder_handle: Some(feeder_handle),
            worker_handles,
            scheduler_handle,
            queue_rx: shared_queue_rx,
        })
    }
}

/// A running sender: owns the feeder task, the worker pool (batched mode
/// only), and the flush scheduler (batched mode only).
pub struct Sender<E: Event> {
    core: Arc<Core<E>>,
    sink: Arc<dyn Sink<E>>,
    management_hook: Option<Arc<dyn Fn() -> Result<(), String> + Send + Sync>>,
    feeder_handle: Option<JoinHandle<()>>,
    worker_handles: Vec<JoinHandle<()>>,
    scheduler_handle: Option<JoinHandle<()>>,
    queue_rx: Option<BatchQueueReceiver<E>>,
}

impl<E: Event> Sender<E> {
    pub fn sender_id(&self) -> &str {
        &self.core.sender_id
    }

    /// Triggers graceful shutdown and blocks until the three guarantees in
    /// spec §4.9 hold: no future remains pending, every worker has
    /// terminated, and `end()` has been called exactly once per event the
    /// core observed.
    pub async fn stop(&mut self) {
        let _barrier = self
            .core
            .stop_barrier
            .acquire()
            .await
            .expect("stop barrier is never closed");

        ShutdownBegun {
            sender_id: self.core.sender_id.to_string(),
        }
        .emit();
        self.core.closed.store(true, Ordering::Release);

        // Abort the scheduler first: it's the only other task that calls
        // `swap_if_current`, and the drain below uses the unconditional
        // `swap_fresh`, which is only race-free once the scheduler can no
        // longer observe and act on the same "current" batch.
        if let Some(scheduler_handle) = self.scheduler_handle.take() {
            scheduler_handle.abort();
        }

        if let Some(batching) = self.core.batching.as_ref() {
            let current = batching.current_batch.swap_fresh();
            current.fail_all_pending("sender is shutting down");
            current.finalize(|outcome| {
                internal_events::report_outcome(&self.core.sender_id, outcome)
            });

            if let Some(queue_rx) = &self.queue_rx {
                let drained = queue_rx.drain_available();
                for batch in drained {
                    batch.fail_all_pending("sender is shutting down");
                    batch.finalize(|outcome| {
                        internal_events::report_outcome(&self.core.sender_id, outcome)
                    });
                }
            }

            for _ in 0..batching.workers {
                if batching.queue_tx.put_sentinel().await.is_err() {
                    break;
                }
            }

            for handle in self.worker_handles.drain(..) {
                let abort_handle = handle.abort_handle();
                match timeout(WORKER_JOIN_BUDGET, handle).await {
                    Ok(Ok(())) => {}
                    Ok(Err(join_err)) => {
                        error!(
                            message = "worker task panicked",
                            sender_id = %self.core.sender_id,
                            error = %join_err,
                        );
                    }
                    Err(_) => {
                        warn!(
                            message = "worker did not join within its budget; aborting",
                            sender_id = %self.core.sender_id,
                        );
                        abort_handle.abort();
                    }
                }
            }
        }

        if let Some(hook) = &self.management_hook {
            if let Err(message) = hook() {
                warn!(
                    message = "management endpoint unregister failed",
                    sender_id = %self.core.sender_id,
                    error = %message,
                );
            }
        }

        self.sink.custom_stop().await;

        self.core.shutdown.notify_waiters();
        if let Some(handle) = self.feeder_handle.take() {
            let _ = handle.await;
        }

        ShutdownComplete {
            sender_id: self.core.sender_id.to_string(),
        }
        .emit();
    }
}
