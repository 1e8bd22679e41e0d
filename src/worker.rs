//! The worker pool: each worker drains the batch queue, hands the sealed
//! batch's payload to the sink, and completes every still-pending future
//! with the outcome. Order matters here — complete, then finalize — since
//! finalize's per-future reporting reads each future's final state.

use std::sync::Arc;
use std::time::Instant;

use crate::batch::Batch;
use crate::encoding::{apply_filter, Encoder, Filter};
use crate::error::SenderError;
use crate::event::Event;
use crate::internal_events::{
    self, BatchFlushFailed, BatchFlushed, BatchTaken, InternalEvent, WorkerStarted, WorkerStopped,
};
use crate::lifecycle::Core;
use crate::queue::{BatchQueueReceiver, Taken};
use crate::sink::Sink;

pub(crate) async fn run<E: Event>(
    core: Arc<Core<E>>,
    sink: Arc<dyn Sink<E>>,
    encoder: Arc<dyn Encoder<E>>,
    filter: Option<Arc<dyn Filter>>,
    queue_rx: BatchQueueReceiver<E>,
    worker_id: usize,
) {
    WorkerStarted {
        sender_id: core.sender_id.to_string(),
        worker_id,
    }
    .emit();

    loop {
        let taken = queue_rx.take().await;

        let batch = match taken {
            Taken::Sentinel | Taken::Closed => break,
            Taken::Batch(batch) => batch,
        };

        handle_batch(&core, sink.as_ref(), encoder.as_ref(), filter.as_deref(), &batch).await;
    }

    WorkerStopped {
        sender_id: core.sender_id.to_string(),
        worker_id,
    }
    .emit();
}

async fn handle_batch<E: Event>(
    core: &Core<E>,
    sink: &dyn Sink<E>,
    encoder: &dyn Encoder<E>,
    filter: Option<&dyn Filter>,
    batch: &Batch<E>,
) {
    BatchTaken {
        sender_id: core.sender_id.to_string(),
        size: batch.len(),
    }
    .emit();

    if batch.is_empty() {
        batch.finalize(|outcome| internal_events::report_outcome(&core.sender_id, outcome));
        BatchFlushed {
            sender_id: core.sender_id.to_string(),
            duration: None,
        }
        .emit();
        return;
    }

    if let Some(batching) = core.batching.as_ref() {
        *batching.last_flush.lock() = Instant::now();
    }

    let started = Instant::now();
    let result = encode_and_flush(sink, encoder, filter, batch).await;
    let duration = started.elapsed();

    let fatal_message = match &result {
        Ok(()) => {
            for future in batch.pending_iter() {
                future.complete(true);
            }
            None
        }
        Err(err) => {
            BatchFlushFailed {
                sender_id: core.sender_id.to_string(),
                message: err.label(),
            }
            .emit();
            let message = err.to_string();
            for future in batch.pending_iter() {
                future.fail(message.clone());
            }
            err.is_fatal().then_some(message)
        }
    };

    batch.finalize(|outcome| internal_events::report_outcome(&core.sender_id, outcome));
    BatchFlushed {
        sender_id: core.sender_id.to_string(),
        duration: Some(duration),
    }
    .emit();

    if let Some(message) = fatal_message {
        error!(
            message = "fatal error flushing batch; worker task terminating",
            sender_id = %core.sender_id,
            error = %message,
        );
        panic!("fatal sender error: {message}");
    }
}

async fn encode_and_flush<E: Event>(
    sink: &dyn Sink<E>,
    encoder: &dyn Encoder<E>,
    filter: Option<&dyn Filter>,
    batch: &Batch<E>,
) -> Result<(), SenderError> {
    let encoded = batch
        .encode(encoder)
        .map_err(|source| SenderError::Encode { source })?;
    let payload = apply_filter(encoded, filter).map_err(|source| SenderError::Encode { source })?;
    sink.flush_batch(payload).await
}
