//! The mode dispatcher: decided once at construction, it controls both how
//! an event is routed to the sink and *where* its outcome is reported.

/// One of the three delivery modes. Synchronous and rejected-async report
/// status in the feeder; batched and accepted-async report when the
/// future is later completed (by a worker or by the sink itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Synchronous,
    Asynchronous,
    Batched,
}

impl Mode {
    /// `batched` iff the sink is batch-capable and a non-zero batch size
    /// is configured; else `asynchronous` iff the sink declares itself
    /// async; else `synchronous`.
    pub fn resolve(batch_capable: bool, batch_size: Option<usize>, is_async: bool) -> Mode {
        let batching_enabled = batch_capable && batch_size.map(|n| n > 0).unwrap_or(false);
        if batching_enabled {
            Mode::Batched
        } else if is_async {
            Mode::Asynchronous
        } else {
            Mode::Synchronous
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batched_wins_when_batch_capable_and_sized() {
        assert_eq!(Mode::resolve(true, Some(10), true), Mode::Batched);
    }

    #[test]
    fn async_when_not_batched_but_declared_async() {
        assert_eq!(Mode::resolve(true, None, true), Mode::Asynchronous);
        assert_eq!(Mode::resolve(false, Some(10), true), Mode::Asynchronous);
    }

    #[test]
    fn synchronous_is_the_fallback() {
        assert_eq!(Mode::resolve(false, None, false), Mode::Synchronous);
        assert_eq!(Mode::resolve(true, Some(0), false), Mode::Synchronous);
    }
}
