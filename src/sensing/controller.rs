use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::db::Database;

use super::loop_worker::{sensing_loop, SamplingLoopConfig};
use super::source::ActivitySource;
use super::state::SamplingMode;

/// Owns the sampling loop task and the mode channel other components
/// subscribe to.
pub struct SensingController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    mode_tx: watch::Sender<SamplingMode>,
}

impl SensingController {
    pub fn new() -> Self {
        let (mode_tx, _) = watch::channel(SamplingMode::default());
        Self {
            handle: None,
            cancel_token: None,
            mode_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SamplingMode> {
        self.mode_tx.subscribe()
    }

    pub fn mode(&self) -> SamplingMode {
        *self.mode_tx.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start_sensing(
        &mut self,
        source: Arc<dyn ActivitySource>,
        db: Database,
        config: SamplingLoopConfig,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("sensing already active");
        }

        // A fresh loop always begins sampling at the fast cadence.
        self.mode_tx.send_if_modified(|mode| {
            let changed = *mode != SamplingMode::Active;
            *mode = SamplingMode::Active;
            changed
        });

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(sensing_loop(
            source,
            db,
            config,
            self.mode_tx.clone(),
            cancel_token.clone(),
        ));

        info!(
            "Sensing started (active every {}s, paused every {}s)",
            config.cadence.active.as_secs(),
            config.cadence.paused.as_secs()
        );

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Stops future polls and waits for the loop task to exit.
    pub async fn stop_sensing(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("sensing loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for SensingController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::source::{ActivitySample, PowerState, SampleError};

    struct LockedScreen;

    #[async_trait::async_trait]
    impl ActivitySource for LockedScreen {
        async fn sample(&self) -> Result<ActivitySample, SampleError> {
            Err(SampleError::PowerStateUnavailable("screen is locked".into()))
        }

        async fn power_state(&self) -> Option<PowerState> {
            None
        }
    }

    #[tokio::test(start_paused = true)]
    async fn controller_reports_loop_mode_and_rejects_double_start() {
        let db = Database::open_in_memory().unwrap();
        let mut controller = SensingController::new();
        let mut mode_rx = controller.subscribe();
        assert_eq!(controller.mode(), SamplingMode::Active);

        controller
            .start_sensing(Arc::new(LockedScreen), db.clone(), SamplingLoopConfig::default())
            .unwrap();
        assert!(controller.is_running());
        assert!(controller
            .start_sensing(Arc::new(LockedScreen), db, SamplingLoopConfig::default())
            .is_err());

        mode_rx.changed().await.unwrap();
        assert_eq!(*mode_rx.borrow(), SamplingMode::Paused);
        assert_eq!(controller.mode(), SamplingMode::Paused);

        controller.stop_sensing().await.unwrap();
        assert!(!controller.is_running());
        controller.stop_sensing().await.unwrap();
    }
}
