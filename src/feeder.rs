//! The feeder loop: the single task that pulls events off the upstream
//! queue and routes them by mode. Every dispatch step is bracketed by the
//! stop barrier, so no event is accepted mid-shutdown.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;

use crate::encoding::{apply_filter, Encoder, Filter};
use crate::error::{EncodeError, SenderError};
use crate::event::{Event, EventFuture};
use crate::internal_events::{report_outcome, BatchSealed, InternalEvent};
use crate::lifecycle::Core;
use crate::mode::Mode;
use crate::sink::Sink;
use crate::upstream::Upstream;

pub(crate) async fn run<E: Event>(
    core: Arc<Core<E>>,
    sink: Arc<dyn Sink<E>>,
    encoder: Arc<dyn Encoder<E>>,
    filter: Option<Arc<dyn Filter>>,
    mut upstream: Box<dyn Upstream<E>>,
) {
    loop {
        if core.closed.load(Ordering::Acquire) {
            break;
        }

        let event = {
            let notified = core.shutdown.notified();
            tokio::pin!(notified);
            // Re-check `closed` after arming the notification, so a
            // shutdown that lands between the check above and this select
            // is never missed.
            if core.closed.load(Ordering::Acquire) {
                break;
            }
            tokio::select! {
                _ = &mut notified => None,
                event = upstream.take() => event,
            }
        };

        let Some(event) = event else {
            break;
        };

        let _permit = core
            .stop_barrier
            .acquire()
            .await
            .expect("stop barrier is never closed");

        if core.closed.load(Ordering::Acquire) {
            fail_event(&core, event, "sender is shutting down");
            continue;
        }

        match core.mode {
            Mode::Batched => dispatch_batched(&core, event).await,
            Mode::Asynchronous => {
                dispatch_async(&core, sink.as_ref(), encoder.as_ref(), filter.as_deref(), event)
                    .await
            }
            Mode::Synchronous => {
                dispatch_sync(&core, sink.as_ref(), encoder.as_ref(), filter.as_deref(), event)
                    .await
            }
        }
    }
}

fn encode_one<E: Event>(
    encoder: &dyn Encoder<E>,
    filter: Option<&dyn Filter>,
    event: &E,
) -> Result<Bytes, EncodeError> {
    let encoded = encoder.encode_event(event)?;
    apply_filter(encoded, filter)
}

/// Creates a future for `event`, fails it immediately with `message`, and
/// reports the outcome. Used for every path where the event never enters a
/// batch (so nothing else will ever call `finalize()` to report it):
/// closed-rejection and single-event encode failure.
fn fail_event<E: Event>(core: &Core<E>, event: E, message: impl Into<String>) {
    let future = EventFuture::create(event);
    future.fail(message);
    let outcome = future.snapshot().expect("fail() just completed this future");
    report_outcome(&core.sender_id, &outcome);
}

async fn dispatch_sync<E: Event>(
    core: &Core<E>,
    sink: &dyn Sink<E>,
    encoder: &dyn Encoder<E>,
    filter: Option<&dyn Filter>,
    event: E,
) {
    let payload = match encode_one(encoder, filter, &event) {
        Ok(payload) => payload,
        Err(source) => {
            fail_event(core, event, SenderError::Encode { source }.to_string());
            return;
        }
    };

    let future = EventFuture::create(event);
    let delivered = sink.send_one(payload).await;
    future.complete(delivered);
    let outcome = future.snapshot().expect("complete() just completed this future");
    report_outcome(&core.sender_id, &outcome);
}

async fn dispatch_async<E: Event>(
    core: &Core<E>,
    sink: &dyn Sink<E>,
    encoder: &dyn Encoder<E>,
    filter: Option<&dyn Filter>,
    event: E,
) {
    let payload = match encode_one(encoder, filter, &event) {
        Ok(payload) => payload,
        Err(source) => {
            fail_event(core, event, SenderError::Encode { source }.to_string());
            return;
        }
    };

    let future = EventFuture::create(event);
    let accepted = sink.send_async(payload, future.clone()).await;

    if !accepted {
        future.fail("send_async did not accept the event");
        let outcome = future.snapshot().expect("fail() just completed this future");
        report_outcome(&core.sender_id, &outcome);
        return;
    }

    // Accepted: the sink will call `complete`/`fail` on its own clone of
    // `future` at some later point, outside of this call. The feeder must
    // not block waiting for that (per spec §4.1, `await()` is for external
    // callers only), so a detached task plays that role purely to report
    // the eventual outcome once — this is the "explicit wiring" the async
    // send handoff Open Question calls for.
    let sender_id = Arc::clone(&core.sender_id);
    tokio::spawn(async move {
        let outcome = future.await_outcome().await;
        report_outcome(&sender_id, &outcome);
    });
}

async fn dispatch_batched<E: Event>(core: &Core<E>, event: E) {
    if let Err(event) = queue_event(core, event).await {
        fail_event(core, event, "sender is shutting down");
    }
}

/// `queue(event)` from spec §4.7: appends to the current batch, seals and
/// enqueues it on a size trigger, and warns if the queue is deeper than the
/// worker count. Returns the event back to the caller (instead of `false`)
/// when rejected, since the caller — not this function — owns reporting an
/// event that never entered a batch.
async fn queue_event<E: Event>(core: &Core<E>, event: E) -> Result<(), E> {
    if core.closed.load(Ordering::Acquire) {
        return Err(event);
    }

    let batching = core
        .batching
        .as_ref()
        .expect("batched mode always carries batching state");

    let current = batching.current_batch.current();
    current.append(event);

    if current.len() >= batching.batch_size.get() {
        if let Some(sealed) = batching.current_batch.swap_if_current(&current) {
            BatchSealed {
                sender_id: core.sender_id.to_string(),
                size: sealed.len(),
            }
            .emit();
            if batching.queue_tx.put(sealed).await.is_err() {
                warn!(
                    message = "batch queue closed while enqueuing a sealed batch",
                    sender_id = %core.sender_id,
                );
            }
        }
    }

    let depth = batching.queue_tx.approximate_len();
    if depth > batching.workers {
        warn!(
            message = "batch queue depth exceeds worker count; consider more workers",
            sender_id = %core.sender_id,
            depth,
            workers = batching.workers,
        );
    }

    Ok(())
}
