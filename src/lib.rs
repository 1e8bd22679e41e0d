//! The sender core.
//!
//! This crate implements the outbound stage of a log pipeline: a generic,
//! concurrent dispatch engine that sits between an upstream event queue and
//! a pluggable, sink-specific delivery primitive. It pulls events off an
//! upstream queue, optionally batches them, dispatches batches across a
//! fixed worker pool with backpressure, and tracks a completion future per
//! event so callers always learn the definitive outcome.
//!
//! Concrete sinks, encoders, filters, the upstream event source, and a
//! metrics/management backend are external collaborators: this crate only
//! defines the traits it drives them through.

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

#[macro_use]
extern crate tracing;

pub mod batch;
pub mod batch_cell;
pub mod config;
pub mod encoding;
pub mod error;
pub mod event;
pub mod feeder;
pub mod internal_events;
pub mod lifecycle;
pub mod mode;
pub mod queue;
pub mod scheduler;
pub mod sink;
pub mod upstream;
pub mod worker;

pub use batch::Batch;
pub use config::{ResolvedSettings, SenderSettings};
pub use encoding::{Encoder, Filter};
pub use error::{ConfigError, SenderError};
pub use event::{Event, EventFuture, Outcome};
pub use lifecycle::{Sender, SenderBuilder};
pub use mode::Mode;
pub use sink::Sink;
pub use upstream::{ChannelUpstream, Upstream};
