//! Inert activity source for platforms without a window probe.
//!
//! Every poll succeeds with an empty sample, so the daemon runs and stays in
//! its active mode but nothing is ever written to the event store.

use super::source::{ActivitySample, ActivitySource, PowerState, SampleError};

#[derive(Debug, Default)]
pub struct NoopActivitySource;

impl NoopActivitySource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ActivitySource for NoopActivitySource {
    async fn sample(&self) -> Result<ActivitySample, SampleError> {
        Ok(ActivitySample::default())
    }

    async fn power_state(&self) -> Option<PowerState> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_source_yields_empty_samples() {
        let source = NoopActivitySource::new();
        let sample = source.sample().await.unwrap();
        assert!(sample.app_name.is_empty());
        assert!(source.power_state().await.is_none());
    }
}
