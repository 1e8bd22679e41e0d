//! The upstream producer contract: a blocking `take()` that the feeder
//! drives, one event at a time.

use async_trait::async_trait;

use crate::event::Event;

/// Supplies events to the feeder loop. `take` is expected to suspend
/// (block, in spec terms) until an event is available; the feeder races it
/// against the shutdown signal, so an `Upstream` implementation does not
/// need to handle interruption itself — returning `None` (the source is
/// exhausted) is enough to stop the feeder defensively even outside of a
/// shutdown.
#[async_trait]
pub trait Upstream<E: Event>: Send + Sync {
    async fn take(&mut self) -> Option<E>;
}

/// An `Upstream` backed by a bounded `tokio::sync::mpsc` channel — the
/// common case of an upstream queue between some producer stage and this
/// sender.
pub struct ChannelUpstream<E> {
    rx: tokio::sync::mpsc::Receiver<E>,
}

impl<E> ChannelUpstream<E> {
    pub fn new(rx: tokio::sync::mpsc::Receiver<E>) -> Self {
        Self { rx }
    }
}

#[async_trait]
impl<E: Event> Upstream<E> for ChannelUpstream<E> {
    async fn take(&mut self) -> Option<E> {
        self.rx.recv().await
    }
}
