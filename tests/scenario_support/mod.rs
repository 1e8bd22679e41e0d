//! Shared test doubles for the scenario suite in `tests/scenarios.rs`.

pub mod mock_sink;

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use sender_core::error::EncodeError;
use sender_core::event::{Event, Outcome};
use sender_core::Encoder;

/// One outcome observed through `Event::end`, tagged with the id the test
/// assigned at creation so assertions can match events back to their
/// outcome regardless of completion order across batches/workers.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub id: usize,
    pub outcome: Outcome,
}

/// A test event that records its own terminal outcome into a shared list
/// instead of doing anything with it, so a test can inspect exactly which
/// ids succeeded/failed after a scenario runs.
pub struct RecordingEvent {
    pub id: usize,
    recorder: Arc<Mutex<Vec<Recorded>>>,
}

impl RecordingEvent {
    pub fn new(id: usize, recorder: &Recorder) -> Self {
        Self {
            id,
            recorder: Arc::clone(&recorder.0),
        }
    }
}

impl Event for RecordingEvent {
    fn end(self, outcome: Outcome) {
        self.recorder.lock().push(Recorded { id: self.id, outcome });
    }
}

/// Shared sink for a test's `RecordingEvent`s' outcomes.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Recorded>>>);

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event(&self, id: usize) -> RecordingEvent {
        RecordingEvent::new(id, self)
    }

    pub fn outcomes(&self) -> Vec<Recorded> {
        self.0.lock().clone()
    }

    pub fn success_count(&self) -> usize {
        self.outcomes().iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes().len() - self.success_count()
    }
}

/// Encodes a `RecordingEvent` as its decimal id, newline-terminated. Good
/// enough to exercise the encode/filter path without needing a real wire
/// format.
pub struct IdEncoder;

impl Encoder<RecordingEvent> for IdEncoder {
    fn encode_event(&self, event: &RecordingEvent) -> Result<Bytes, EncodeError> {
        Ok(Bytes::from(format!("{}\n", event.id)))
    }

    fn encode_batch(
        &self,
        events: &mut dyn Iterator<Item = &RecordingEvent>,
    ) -> Result<Bytes, EncodeError> {
        let mut out = String::new();
        for event in events {
            out.push_str(&event.id.to_string());
            out.push('\n');
        }
        Ok(Bytes::from(out))
    }
}
