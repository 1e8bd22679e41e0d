//! Pluggable encoder and filter collaborators.
//!
//! Both are external to the core (spec §1): the core only defines the
//! trait surface it drives them through, at single-event and batch
//! granularity, and folds any filter failure into an `EncodeError` the way
//! the spec's §4.10 mandates.

use bytes::Bytes;

use crate::error::EncodeError;
use crate::event::Event;

/// Encodes events into their wire representation.
///
/// The batch overload is handed the pending events of a batch as a lazy
/// sequence (a boxed iterator, to keep the trait object-safe) rather than
/// a concrete collection, so a streaming encoder never has to materialize
/// the whole batch if it doesn't need to.
pub trait Encoder<E: Event>: Send + Sync + 'static {
    fn encode_event(&self, event: &E) -> Result<Bytes, EncodeError>;

    fn encode_batch(&self, events: &mut dyn Iterator<Item = &E>) -> Result<Bytes, EncodeError>;

    /// A cheap startup self-check invoked once by the lifecycle controller
    /// before any worker is spawned. Most encoders have nothing to check
    /// and can accept the default.
    fn verify(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Transforms an encoder's byte output. Optional; when absent, encoded
/// bytes pass through unchanged.
pub trait Filter: Send + Sync + 'static {
    fn filter(&self, bytes: Bytes) -> Result<Bytes, EncodeError>;
}

/// Applies `filter` (if present) to `encoded`, folding a filter error into
/// the same `EncodeError` type an encoder failure would produce.
pub fn apply_filter(encoded: Bytes, filter: Option<&dyn Filter>) -> Result<Bytes, EncodeError> {
    match filter {
        Some(filter) => filter.filter(encoded),
        None => Ok(encoded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Outcome;

    struct NoopEvent;
    impl Event for NoopEvent {
        fn end(self, _outcome: Outcome) {}
    }

    struct UpperFilter;
    impl Filter for UpperFilter {
        fn filter(&self, bytes: Bytes) -> Result<Bytes, EncodeError> {
            Ok(Bytes::from(bytes.to_ascii_uppercase()))
        }
    }

    struct RejectingFilter;
    impl Filter for RejectingFilter {
        fn filter(&self, _bytes: Bytes) -> Result<Bytes, EncodeError> {
            Err(EncodeError::filter("rejected"))
        }
    }

    #[test]
    fn no_filter_passes_through() {
        let bytes = Bytes::from_static(b"hello");
        let out = apply_filter(bytes.clone(), None).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn filter_error_becomes_encode_error() {
        let err = apply_filter(Bytes::from_static(b"hello"), Some(&RejectingFilter)).unwrap_err();
        assert_eq!(err.stage, crate::error::EncodeStage::Filter);
    }

    #[test]
    fn filter_transforms_bytes() {
        let out = apply_filter(Bytes::from_static(b"hi"), Some(&UpperFilter)).unwrap();
        assert_eq!(&out[..], b"HI");
    }
}
