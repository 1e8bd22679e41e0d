//! A sink test double with selectable behavior, modeled on the teacher
//! codebase's config/mode-enum test sinks
//! (`src/test_util/mock/sinks/{basic,completion,backpressure}.rs`): one
//! struct, one enum picking the behavior, reused across every scenario
//! instead of a bespoke sink per test.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use sender_core::error::SenderError;
use sender_core::event::{Event, EventFuture};
use sender_core::Sink;

#[derive(Clone)]
pub enum Mode {
    /// Accepts everything, recording the encoded payload it received.
    Echo,
    /// Rejects everything.
    AlwaysFail,
    /// Accepts after sleeping `Duration`, to exercise backpressure.
    Sleep(Duration),
}

#[derive(Clone, Copy, Default)]
pub struct Capabilities {
    pub batch_capable: bool,
    pub batch_only: bool,
    pub is_async: bool,
}

impl Capabilities {
    pub fn batched() -> Self {
        Self {
            batch_capable: true,
            batch_only: false,
            is_async: false,
        }
    }

    pub fn synchronous() -> Self {
        Self::default()
    }

    pub fn asynchronous() -> Self {
        Self {
            is_async: true,
            ..Self::default()
        }
    }
}

pub struct MockSink {
    mode: Mode,
    capabilities: Capabilities,
    received: Arc<Mutex<Vec<Bytes>>>,
}

impl MockSink {
    pub fn new(mode: Mode, capabilities: Capabilities) -> Self {
        Self {
            mode,
            capabilities,
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn received_payloads(&self) -> Vec<Bytes> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl<E: Event> Sink<E> for MockSink {
    fn batch_capable(&self) -> bool {
        self.capabilities.batch_capable
    }

    fn batch_only(&self) -> bool {
        self.capabilities.batch_only
    }

    fn is_async(&self) -> bool {
        self.capabilities.is_async
    }

    async fn send_one(&self, payload: Bytes) -> bool {
        match &self.mode {
            Mode::Echo => {
                self.received.lock().push(payload);
                true
            }
            Mode::AlwaysFail => false,
            Mode::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                self.received.lock().push(payload);
                true
            }
        }
    }

    async fn send_async(&self, payload: Bytes, future: EventFuture<E>) -> bool {
        match &self.mode {
            Mode::Echo => {
                self.received.lock().push(payload);
                future.complete(true);
                true
            }
            Mode::AlwaysFail => false,
            Mode::Sleep(duration) => {
                let duration = *duration;
                let received = Arc::clone(&self.received);
                tokio::spawn(async move {
                    tokio::time::sleep(duration).await;
                    received.lock().push(payload);
                    future.complete(true);
                });
                true
            }
        }
    }

    async fn flush_batch(&self, payload: Bytes) -> Result<(), SenderError> {
        match &self.mode {
            Mode::Echo => {
                self.received.lock().push(payload);
                Ok(())
            }
            Mode::AlwaysFail => Err(SenderError::Send {
                message: "mock sink always fails".to_string(),
            }),
            Mode::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                self.received.lock().push(payload);
                Ok(())
            }
        }
    }
}
