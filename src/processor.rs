//! Periodic segmentation of the raw sample backlog.

use anyhow::{bail, Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::segmentation::{PassReport, SegmentationEngine};
use crate::sensing::SamplingMode;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

pub struct Processor {
    engine: SegmentationEngine,
    period: Duration,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl Processor {
    pub fn new(engine: SegmentationEngine, period: Duration) -> Self {
        Self {
            engine,
            period,
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawns the ticking loop. Passes are skipped whenever `mode_rx` last
    /// reported the sampling loop as paused.
    pub fn start(&mut self, mode_rx: watch::Receiver<SamplingMode>) -> Result<()> {
        if self.handle.is_some() {
            bail!("processor already running");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(processing_loop(
            self.engine.clone(),
            self.period,
            mode_rx,
            cancel_token.clone(),
        ));

        log_info!("processor started (every {}s)", self.period.as_secs());
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Halts future ticks. A pass already running is allowed to finish
    /// before this returns.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("processor task failed to join")?;
            log_info!("processor stopped");
        }
        Ok(())
    }

    /// Runs one pass immediately, independent of the ticking loop.
    pub async fn run_once(&self) -> Result<PassReport> {
        self.engine.run_pass().await
    }
}

async fn processing_loop(
    engine: SegmentationEngine,
    period: Duration,
    mode_rx: watch::Receiver<SamplingMode>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut paused = mode_rx.borrow().is_paused();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now_paused = mode_rx.borrow().is_paused();
                if now_paused != paused {
                    if now_paused {
                        log_info!("processor paused - system inactive");
                    } else {
                        log_info!("processor resumed - system active");
                    }
                    paused = now_paused;
                }

                if paused {
                    log_debug!("skipping segmentation pass while sampling is paused");
                    continue;
                }

                match engine.run_pass().await {
                    Ok(report) => log_report(&report),
                    Err(err) => log_error!("error processing raw events: {err:#}"),
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("processor shutting down");
                break;
            }
        }
    }
}

fn log_report(report: &PassReport) {
    if report.is_empty() {
        log_debug!("segmentation pass: no raw events");
        return;
    }
    log_info!(
        "segmentation pass: {} events ({} skipped) -> {} sessions saved, {} dropped, {} auto-classified",
        report.samples_scanned,
        report.samples_skipped,
        report.sessions_saved,
        report.sessions_dropped,
        report.sessions_classified
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, RawSample};
    use crate::segmentation::SegmentationConfig;
    use chrono::DateTime;

    async fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        for secs in [0, 10, 20] {
            let at = DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap();
            db.insert_raw_sample(&RawSample::new(at, "Editor", "a.go"))
                .await
                .unwrap();
        }
        db
    }

    fn processor(db: &Database) -> Processor {
        Processor::new(
            SegmentationEngine::new(db.clone(), SegmentationConfig::default()),
            Duration::from_secs(60),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn paused_sampling_suppresses_passes() {
        let db = seeded_db().await;
        let (_mode_tx, mode_rx) = watch::channel(SamplingMode::Paused);
        let mut processor = processor(&db);

        processor.start(mode_rx).unwrap();
        tokio::time::sleep(Duration::from_secs(200)).await;
        processor.stop().await.unwrap();

        assert_eq!(db.count_raw_samples().await.unwrap(), 3);
        assert!(db.list_sessions(10).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn resume_lets_the_next_tick_process_the_backlog() {
        let db = seeded_db().await;
        let (mode_tx, mode_rx) = watch::channel(SamplingMode::Paused);
        let mut processor = processor(&db);

        processor.start(mode_rx).unwrap();
        tokio::time::sleep(Duration::from_secs(130)).await;
        assert_eq!(db.count_raw_samples().await.unwrap(), 3);

        mode_tx.send_replace(SamplingMode::Active);
        tokio::time::sleep(Duration::from_secs(90)).await;
        processor.stop().await.unwrap();

        assert_eq!(db.count_raw_samples().await.unwrap(), 0);
        let sessions = db.list_sessions(10).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].duration_seconds, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_future_ticks() {
        let db = Database::open_in_memory().unwrap();
        let (_mode_tx, mode_rx) = watch::channel(SamplingMode::Active);
        let mut processor = processor(&db);

        processor.start(mode_rx.clone()).unwrap();
        assert!(processor.start(mode_rx).is_err());
        processor.stop().await.unwrap();
        assert!(!processor.is_running());

        for secs in [0, 10] {
            let at = DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap();
            db.insert_raw_sample(&RawSample::new(at, "Editor", "a.go"))
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(db.count_raw_samples().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn run_once_processes_without_a_running_loop() {
        let db = seeded_db().await;
        let report = processor(&db).run_once().await.unwrap();
        assert_eq!(report.samples_scanned, 3);
        assert_eq!(report.sessions_saved, 1);
        assert_eq!(db.count_raw_samples().await.unwrap(), 0);
    }
}
