use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::source::SampleError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SamplingMode {
    Active,
    Paused,
}

impl Default for SamplingMode {
    fn default() -> Self {
        SamplingMode::Active
    }
}

/// How a single poll of the activity source ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Sampled,
    PowerUnavailable,
    Failed,
}

impl SampleOutcome {
    pub fn of<T>(result: &Result<T, SampleError>) -> Self {
        match result {
            Ok(_) => SampleOutcome::Sampled,
            Err(SampleError::PowerStateUnavailable(_)) => SampleOutcome::PowerUnavailable,
            Err(SampleError::Transient(_)) => SampleOutcome::Failed,
        }
    }
}

impl SamplingMode {
    /// Mode the loop should be in after a poll ended with `outcome`.
    ///
    /// Transient failures never move the machine in either direction.
    pub fn next(self, outcome: SampleOutcome) -> SamplingMode {
        match (self, outcome) {
            (SamplingMode::Active, SampleOutcome::PowerUnavailable) => SamplingMode::Paused,
            (SamplingMode::Paused, SampleOutcome::Sampled) => SamplingMode::Active,
            (mode, _) => mode,
        }
    }

    pub fn is_paused(self) -> bool {
        self == SamplingMode::Paused
    }
}

/// Poll periods for each mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingCadence {
    pub active: Duration,
    pub paused: Duration,
}

impl Default for SamplingCadence {
    fn default() -> Self {
        Self {
            active: Duration::from_secs(5),
            paused: Duration::from_secs(30),
        }
    }
}

impl SamplingCadence {
    pub fn period(&self, mode: SamplingMode) -> Duration {
        match mode {
            SamplingMode::Active => self.active,
            SamplingMode::Paused => self.paused,
        }
    }
}
