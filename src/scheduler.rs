//! The flush scheduler: a periodic task that seals the current batch once
//! it has outlived `flush_interval`, handing it to the batch queue on a
//! strictly non-blocking, best-effort basis.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::event::Event;
use crate::internal_events::{BatchSealed, InternalEvent};
use crate::lifecycle::Core;

const TICK: Duration = Duration::from_secs(5);

/// Runs until the core is closed. Spawned only for batched senders; the
/// lifecycle controller aborts this task's `JoinHandle` at the start of
/// shutdown rather than relying on the `closed` check below, so that a
/// `swap_if_current` race against the shutdown drain (which performs an
/// unconditional `swap_fresh`) cannot occur.
pub(crate) async fn run<E: Event>(core: Arc<Core<E>>) {
    let batching = core
        .batching
        .as_ref()
        .expect("the scheduler only runs for batched senders");

    let mut ticker = tokio::time::interval(TICK);
    ticker.tick().await; // the first tick fires immediately; nothing to do yet

    loop {
        ticker.tick().await;

        if core.closed.load(Ordering::Acquire) {
            break;
        }

        let elapsed = batching.last_flush.lock().elapsed();
        if elapsed <= core.flush_interval {
            continue;
        }

        // Reserve a slot before sealing: if the queue has no room, leave
        // the current batch alone and retry next tick rather than sealing
        // a batch we then cannot hand off.
        let permit = match batching.queue_tx.try_reserve() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    message = "flush scheduler could not reserve a queue slot; batch queue full, retrying next tick",
                    sender_id = %core.sender_id,
                );
                continue;
            }
        };

        let current = batching.current_batch.current();
        let Some(sealed) = batching.current_batch.swap_if_current(&current) else {
            // The feeder's size trigger already sealed this batch; the
            // reserved slot goes unused and is returned to the channel
            // when `permit` is dropped.
            continue;
        };

        BatchSealed {
            sender_id: core.sender_id.to_string(),
            size: sealed.len(),
        }
        .emit();
        permit.send(sealed);
    }
}
