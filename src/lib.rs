pub mod db;
pub mod processor;
pub mod rules;
pub mod segmentation;
pub mod sensing;
pub mod settings;
pub mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info};

use db::Database;
use processor::Processor;
use segmentation::SegmentationEngine;
use sensing::{ActivitySource, PlatformSource, SensingController};
use settings::Settings;

pub use utils::init_logging;

pub fn open_database(settings: &Settings) -> Result<Database> {
    let db_path = settings.database_path()?;
    Database::new(db_path).context("failed to initialize database")
}

/// The sampling loop and the processing loop sharing one database.
pub struct Daemon {
    sensing: SensingController,
    processor: Processor,
}

impl Daemon {
    pub fn new(db: Database, settings: &Settings) -> Self {
        let engine = SegmentationEngine::new(db, settings.segmentation());
        Self {
            sensing: SensingController::new(),
            processor: Processor::new(engine, settings.processing_interval()),
        }
    }

    pub fn start(
        &mut self,
        source: Arc<dyn ActivitySource>,
        db: Database,
        settings: &Settings,
    ) -> Result<()> {
        self.sensing
            .start_sensing(source, db, settings.sampling())?;
        self.processor.start(self.sensing.subscribe())?;
        Ok(())
    }

    /// Stops both loops, then folds whatever is left in the backlog so a
    /// clean exit never leaves unprocessed samples behind. A loop that fails
    /// to stop cleanly is logged and does not skip the final pass.
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Err(err) = self.sensing.stop_sensing().await {
            error!("Sampling loop did not stop cleanly: {err:#}");
        }
        if let Err(err) = self.processor.stop().await {
            error!("Processing loop did not stop cleanly: {err:#}");
        }

        match self.processor.run_once().await {
            Ok(report) => info!(
                "Final pass saved {} sessions from {} raw events",
                report.sessions_saved, report.samples_scanned
            ),
            Err(err) => error!("Final segmentation pass failed: {err:#}"),
        }
        Ok(())
    }
}

/// Runs until SIGINT/SIGTERM.
pub async fn run_daemon(settings: Settings) -> Result<()> {
    info!("Personal OS starting up...");

    let db = open_database(&settings)?;
    let mut daemon = Daemon::new(db.clone(), &settings);
    daemon.start(Arc::new(PlatformSource::new()), db, &settings)?;

    wait_for_shutdown_signal().await?;
    info!("Shutdown signal received...");

    daemon.shutdown().await?;
    info!("Personal OS shut down gracefully.");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = signal(SignalKind::terminate()).context("SIGTERM handler failed")?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("Ctrl+C handler failed")?,
            _ = term.recv() => {}
        }
        Ok(())
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Ctrl+C handler failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RawSample;
    use crate::sensing::{ActivitySample, PowerState, SampleError};
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Always focused on the same editor window.
    struct SteadyEditor {
        polls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ActivitySource for SteadyEditor {
        async fn sample(&self) -> Result<ActivitySample, SampleError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(ActivitySample::new("Editor", "main.rs"))
        }

        async fn power_state(&self) -> Option<PowerState> {
            None
        }
    }

    #[tokio::test]
    async fn shutdown_flushes_backlog_into_sessions() {
        let db = Database::open_in_memory().unwrap();
        let settings = Settings {
            processing_interval_secs: 3600,
            ..Settings::default()
        };
        let source = Arc::new(SteadyEditor {
            polls: AtomicUsize::new(0),
        });

        let mut daemon = Daemon::new(db.clone(), &settings);
        daemon.start(source.clone(), db.clone(), &settings).unwrap();

        while db.count_raw_samples().await.unwrap() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        daemon.shutdown().await.unwrap();

        assert!(source.polls.load(Ordering::SeqCst) >= 1);
        assert_eq!(db.count_raw_samples().await.unwrap(), 0);
    }

    /// Crashes the sampling task on its first poll.
    struct CrashingSource {
        crashed: AtomicBool,
    }

    #[async_trait::async_trait]
    impl ActivitySource for CrashingSource {
        async fn sample(&self) -> Result<ActivitySample, SampleError> {
            self.crashed.store(true, Ordering::SeqCst);
            panic!("window query crashed");
        }

        async fn power_state(&self) -> Option<PowerState> {
            None
        }
    }

    #[tokio::test]
    async fn crashed_sampling_loop_still_gets_final_flush() {
        let db = Database::open_in_memory().unwrap();
        for secs in [0, 20] {
            let stamp: DateTime<Utc> = DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap();
            db.insert_raw_sample(&RawSample::new(stamp, "Editor", "main.rs"))
                .await
                .unwrap();
        }
        let settings = Settings {
            processing_interval_secs: 3600,
            ..Settings::default()
        };
        let source = Arc::new(CrashingSource {
            crashed: AtomicBool::new(false),
        });

        let mut daemon = Daemon::new(db.clone(), &settings);
        daemon.start(source.clone(), db.clone(), &settings).unwrap();
        while !source.crashed.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        daemon.shutdown().await.unwrap();

        assert_eq!(db.count_raw_samples().await.unwrap(), 0);
        assert_eq!(db.list_sessions(10).await.unwrap().len(), 1);
    }
}
