//! One `InternalEvent` implementor per notable occurrence.
//!
//! Every place in `worker.rs`/`feeder.rs`/`scheduler.rs`/`lifecycle.rs` that
//! needs to move a counter or log something emits one of these structs
//! instead of calling `metrics`/`tracing` macros inline — this is the
//! single place a given occurrence's metric and its log line are defined,
//! mirroring `lib/vector-buffers/src/internal_events.rs` in the teacher
//! codebase.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::LazyLock;

use dashmap::DashMap;
use metrics::{counter, gauge, histogram};

use crate::event::Outcome;

/// Implemented by every occurrence this crate reports.
pub trait InternalEvent {
    fn emit(self);
}

/// Reports one future's terminal outcome. Shared by every completion site
/// (the feeder's synchronous/rejected paths, the worker's batch
/// completion, the async-accepted background reporter) so a given event is
/// counted exactly once, by whichever caller's `snapshot()` observes it
/// first becoming non-pending.
pub(crate) fn report_outcome(sender_id: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Success => EventCompleted {
            sender_id: sender_id.to_string(),
            success: true,
            message: None,
        }
        .emit(),
        Outcome::Failure { message } => EventCompleted {
            sender_id: sender_id.to_string(),
            success: false,
            message: message.clone(),
        }
        .emit(),
    }
}

static ACTIVE_BATCHES: LazyLock<DashMap<String, AtomicI64>> = LazyLock::new(DashMap::new);

fn adjust_active_batches(sender_id: &str, delta: i64) -> i64 {
    let counter = ACTIVE_BATCHES
        .entry(sender_id.to_string())
        .or_insert_with(|| AtomicI64::new(0));
    let mut new_val = 0;
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
            new_val = (current + delta).max(0);
            Some(new_val)
        })
        .ok();
    new_val
}

/// A batch was sealed (removed from the current-batch cell) and handed to
/// the batch queue.
pub struct BatchSealed {
    pub sender_id: String,
    pub size: usize,
}

impl InternalEvent for BatchSealed {
    fn emit(self) {
        let active = adjust_active_batches(&self.sender_id, 1);
        gauge!("active_batches", "sender_id" => self.sender_id.clone()).set(active as f64);
        debug!(
            message = "Sealed batch.",
            sender_id = %self.sender_id,
            size = self.size,
        );
    }
}

/// A worker took a batch off the queue. Recorded before the empty/size
/// branch so the histogram reflects every sealed batch, not just the ones
/// that reach a real sink call.
pub struct BatchTaken {
    pub sender_id: String,
    pub size: usize,
}

impl InternalEvent for BatchTaken {
    fn emit(self) {
        histogram!("batches_size", "sender_id" => self.sender_id.clone()).record(self.size as f64);
    }
}

/// A worker finished handling one batch (flushed or finalized empty).
/// `duration` is `None` for an empty batch, which never reaches a sink
/// call.
pub struct BatchFlushed {
    pub sender_id: String,
    pub duration: Option<std::time::Duration>,
}

impl InternalEvent for BatchFlushed {
    fn emit(self) {
        let active = adjust_active_batches(&self.sender_id, -1);
        gauge!("active_batches", "sender_id" => self.sender_id.clone()).set(active as f64);
        if let Some(duration) = self.duration {
            histogram!("flush_duration_seconds", "sender_id" => self.sender_id.clone())
                .record(duration.as_secs_f64());
        }
    }
}

/// A `flush_batch` call returned an error. Logging only: the per-event
/// `sender_errors_total` increments are owned entirely by `EventCompleted`,
/// which this failure leads to for every still-pending future in the batch
/// (via `Batch::fail_all_pending` + `finalize`). Counting here too would
/// double the total for an N-event batch.
pub struct BatchFlushFailed {
    pub sender_id: String,
    pub message: String,
}

impl InternalEvent for BatchFlushFailed {
    fn emit(self) {
        error!(
            message = "Sink flush failed.",
            sender_id = %self.sender_id,
            error = %self.message,
        );
    }
}

/// One event's terminal outcome, as reported by whichever caller won the
/// completion race (see `crate::event::EventFuture::complete`). The sole
/// place `sender_errors_total` is incremented, so every failure path,
/// batched or single-event, counts exactly once per event.
pub struct EventCompleted {
    pub sender_id: String,
    pub success: bool,
    pub message: Option<String>,
}

impl InternalEvent for EventCompleted {
    fn emit(self) {
        if self.success {
            counter!("sent_total", "sender_id" => self.sender_id).increment(1);
        } else {
            counter!("failed_send_total", "sender_id" => self.sender_id.clone()).increment(1);
            if let Some(message) = self.message {
                counter!(
                    "sender_errors_total",
                    "sender_id" => self.sender_id,
                    "message" => message
                )
                .increment(1);
            }
        }
    }
}

pub struct WorkerStarted {
    pub sender_id: String,
    pub worker_id: usize,
}

impl InternalEvent for WorkerStarted {
    fn emit(self) {
        debug!(message = "Worker started.", sender_id = %self.sender_id, worker_id = self.worker_id);
    }
}

pub struct WorkerStopped {
    pub sender_id: String,
    pub worker_id: usize,
}

impl InternalEvent for WorkerStopped {
    fn emit(self) {
        debug!(message = "Worker stopped.", sender_id = %self.sender_id, worker_id = self.worker_id);
    }
}

pub struct ShutdownBegun {
    pub sender_id: String,
}

impl InternalEvent for ShutdownBegun {
    fn emit(self) {
        info!(message = "Shutdown begun.", sender_id = %self.sender_id);
    }
}

pub struct ShutdownComplete {
    pub sender_id: String,
}

impl InternalEvent for ShutdownComplete {
    fn emit(self) {
        info!(message = "Shutdown complete.", sender_id = %self.sender_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use metrics_util::MetricKind;

    #[test]
    fn event_completed_moves_sent_or_failed_counter() {
        let recorder = DebuggingRecorder::default();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            EventCompleted {
                sender_id: "s".to_string(),
                success: true,
                message: None,
            }
            .emit();
            EventCompleted {
                sender_id: "s".to_string(),
                success: false,
                message: Some("boom".to_string()),
            }
            .emit();
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let find = |name: &str| {
            snapshot
                .iter()
                .find(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
                .map(|(_, _, _, value)| value.clone())
        };

        assert!(matches!(find("sent_total"), Some(DebugValue::Counter(1))));
        assert!(matches!(find("failed_send_total"), Some(DebugValue::Counter(1))));
        assert!(matches!(
            find("sender_errors_total"),
            Some(DebugValue::Counter(1))
        ));
    }

    #[test]
    fn batch_sealed_and_flushed_balance_active_batches_gauge() {
        let recorder = DebuggingRecorder::default();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            BatchSealed {
                sender_id: "gauge-test".to_string(),
                size: 4,
            }
            .emit();
            BatchFlushed {
                sender_id: "gauge-test".to_string(),
                duration: Some(std::time::Duration::from_millis(5)),
            }
            .emit();
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let gauge = snapshot
            .iter()
            .find(|(key, _, _, _)| key.kind() == MetricKind::Gauge && key.key().name() == "active_batches")
            .map(|(_, _, _, value)| value.clone());

        assert!(matches!(gauge, Some(DebugValue::Gauge(value)) if value == 0.0));
    }
}
