//! The configuration surface: a `serde`-deserializable, unvalidated
//! [`SenderSettings`] and the validated, clamped [`ResolvedSettings`] the
//! core is actually constructed from.
//!
//! Parsing configuration files/environment is out of scope (spec §1); this
//! module only covers the shape the core accepts and the validation rule
//! the spec mandates (§3's `only_batch` clamp, §4.10/§4.11's fatal
//! misconfiguration checks).

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::mode::Mode;

fn default_workers() -> usize {
    2
}

fn default_flush_interval_secs() -> u64 {
    5
}

/// Raw, unvalidated per-sender configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SenderSettings {
    /// Absent disables batching.
    #[serde(default)]
    pub batch_size: Option<usize>,

    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

impl Default for SenderSettings {
    fn default() -> Self {
        Self {
            batch_size: None,
            workers: default_workers(),
            flush_interval_secs: default_flush_interval_secs(),
        }
    }
}

/// Immutable-after-start settings the core is constructed from.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub batch_size: Option<NonZeroUsize>,
    pub workers: usize,
    pub flush_interval: Duration,
    pub mode: Mode,
}

impl SenderSettings {
    /// Validates and resolves this configuration against a sink's declared
    /// capabilities, applying the `only_batch` clamp (§3: a batch-only
    /// sender's `batch_size`/`workers` are clamped to at least 1) and
    /// rejecting the configurations the spec calls fatal: `workers == 0`
    /// while batching is enabled, or an explicit `batch_size` of `0`.
    pub fn validate(
        &self,
        batch_capable: bool,
        batch_only: bool,
        is_async: bool,
    ) -> Result<ResolvedSettings, ConfigError> {
        if self.batch_size == Some(0) {
            return Err(ConfigError::ZeroBatchSize);
        }

        let mut batch_size = self.batch_size;
        let mut workers = self.workers;

        if batch_only {
            if batch_size.is_none() {
                batch_size = Some(1);
            }
            if workers == 0 {
                workers = 1;
            }
        }

        let batching_enabled = batch_capable && batch_size.is_some();
        if batching_enabled && workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }

        let batch_size = batch_size.map(|n| NonZeroUsize::new(n).expect("checked non-zero above"));
        let mode = Mode::resolve(batch_capable, batch_size.map(NonZeroUsize::get), is_async);

        Ok(ResolvedSettings {
            batch_size,
            workers,
            flush_interval: Duration::from_secs(self.flush_interval_secs),
            mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_batch_size_is_rejected() {
        let settings = SenderSettings {
            batch_size: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(true, false, false),
            Err(ConfigError::ZeroBatchSize)
        ));
    }

    #[test]
    fn zero_workers_with_batching_is_rejected() {
        let settings = SenderSettings {
            batch_size: Some(10),
            workers: 0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(true, false, false),
            Err(ConfigError::ZeroWorkers)
        ));
    }

    #[test]
    fn only_batch_clamps_to_at_least_one() {
        let settings = SenderSettings {
            batch_size: None,
            workers: 0,
            ..Default::default()
        };
        let resolved = settings.validate(true, true, false).unwrap();
        assert_eq!(resolved.batch_size.unwrap().get(), 1);
        assert_eq!(resolved.workers, 1);
        assert!(matches!(resolved.mode, Mode::Batched));
    }

    #[test]
    fn no_batch_size_without_only_batch_is_synchronous_or_async() {
        let settings = SenderSettings::default();
        let resolved = settings.validate(true, false, false).unwrap();
        assert!(matches!(resolved.mode, Mode::Synchronous));

        let resolved = settings.validate(true, false, true).unwrap();
        assert!(matches!(resolved.mode, Mode::Asynchronous));
    }
}
