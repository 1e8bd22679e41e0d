//! The sink contract: the outbound delivery primitive the core drives.
//!
//! A concrete sender implements exactly one of the three capabilities by
//! overriding the matching method; the default implementations panic with
//! a descriptive message, so a misconfigured sender fails loudly at first
//! use rather than silently dropping events. Declarations
//! (`batch_capable`/`batch_only`/`is_async`) are plain methods rather than
//! a capability-interface hierarchy, per the spec's design notes.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::SenderError;
use crate::event::{Event, EventFuture};

/// The outbound delivery primitive.
#[async_trait]
pub trait Sink<E: Event>: Send + Sync + 'static {
    /// Whether this sender supports batched delivery.
    fn batch_capable(&self) -> bool {
        false
    }

    /// Whether this sender accepts *only* batched delivery, clamping
    /// `batch_size`/`workers` to at least 1 regardless of configuration.
    fn batch_only(&self) -> bool {
        false
    }

    /// Whether this sender's unbatched path is asynchronous (accepts now,
    /// completes later) rather than synchronous.
    fn is_async(&self) -> bool {
        false
    }

    /// Synchronous delivery of one encoded event. Returns `true` on
    /// delivery.
    async fn send_one(&self, _payload: Bytes) -> bool {
        unimplemented!("sink declares a synchronous capability without implementing send_one")
    }

    /// Accepts one encoded event for later completion. Returning `false`
    /// means "not accepted, treat as immediate failure"; returning `true`
    /// means the sink will call `complete`/`fail` on `future` itself, at
    /// some point after this call returns.
    async fn send_async(&self, _payload: Bytes, _future: EventFuture<E>) -> bool {
        unimplemented!("sink declares an async capability without implementing send_async")
    }

    /// Delivers one already-encoded batch payload. `Ok` completes every
    /// still-pending future in the batch with `true`; `Err` completes them
    /// all with `false` and records the error.
    async fn flush_batch(&self, _payload: Bytes) -> Result<(), SenderError> {
        unimplemented!("sink declares batch capability without implementing flush_batch")
    }

    /// Optional teardown hook invoked once during shutdown, after workers
    /// have been asked to stop.
    async fn custom_stop(&self) {}
}
