//! The error taxonomy.
//!
//! `InterruptSignal` has no variant here: Rust has no checked exceptions to
//! throw a shutdown hint through, so it is realized instead as cooperative
//! cancellation against the `closed` flag (see `crate::lifecycle`). Every
//! other category from the spec's taxonomy is a variant below.

use std::fmt;

use snafu::Snafu;

/// An encoder or filter failure. Per spec, a filter error becomes an
/// encode error, so there is only one variant shape here; `stage`
/// distinguishes which collaborator raised it for logging purposes.
#[derive(Debug, Snafu)]
#[snafu(display("{stage} failed: {message}"))]
pub struct EncodeError {
    pub stage: EncodeStage,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStage {
    Encoder,
    Filter,
}

impl fmt::Display for EncodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeStage::Encoder => write!(f, "encoder"),
            EncodeStage::Filter => write!(f, "filter"),
        }
    }
}

impl EncodeError {
    pub fn encoder(message: impl Into<String>) -> Self {
        Self {
            stage: EncodeStage::Encoder,
            message: message.into(),
        }
    }

    pub fn filter(message: impl Into<String>) -> Self {
        Self {
            stage: EncodeStage::Filter,
            message: message.into(),
        }
    }
}

/// Misconfiguration discovered at construction time: the "fatal
/// configuration error surfaced at startup" the spec calls out for a
/// missing encoder, plus the sizing checks `SenderSettings::validate`
/// performs.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("batching is enabled but workers is 0"))]
    ZeroWorkers,
    #[snafu(display("batch_size is 0; omit it entirely to disable batching"))]
    ZeroBatchSize,
    #[snafu(display("sender requires an encoder but none was configured"))]
    MissingEncoder,
    #[snafu(display("encoder failed its startup self-check: {message}"))]
    EncoderVerificationFailed { message: String },
}

/// A runtime delivery/processing failure, classified the way the spec's
/// taxonomy requires: `Send` and `Encode` are recorded and the pipeline
/// continues; `Unexpected` is recorded as an unhandled-exception statistic
/// but likewise does not kill the feeder/worker; `Fatal` is the one
/// variant that is allowed to propagate out of a task.
#[derive(Debug, Snafu)]
pub enum SenderError {
    #[snafu(display("send failed: {message}"))]
    Send { message: String },

    #[snafu(display("encode failed: {source}"))]
    Encode { source: EncodeError },

    #[snafu(display("unexpected error: {source}"))]
    Unexpected {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("fatal error: {source}"))]
    Fatal {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl SenderError {
    /// The label this error should be recorded under in the
    /// `sender_errors[message]` counter.
    pub fn label(&self) -> String {
        match self {
            SenderError::Send { message } => message.clone(),
            SenderError::Encode { source } => source.to_string(),
            SenderError::Unexpected { source } => source.to_string(),
            SenderError::Fatal { source } => source.to_string(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, SenderError::Fatal { .. })
    }
}
