use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{Duration, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::db::{Database, RawSample};

use super::source::{ActivitySample, ActivitySource, SampleError};
use super::state::{SampleOutcome, SamplingCadence, SamplingMode};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const SAMPLE_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingLoopConfig {
    pub cadence: SamplingCadence,
    pub power_state_log_interval: Duration,
}

impl Default for SamplingLoopConfig {
    fn default() -> Self {
        Self {
            cadence: SamplingCadence::default(),
            power_state_log_interval: Duration::from_secs(300),
        }
    }
}

/// Polls the activity source until cancelled, appending every focused
/// window it sees to the event store.
///
/// The current mode is published on `mode_tx`. Publishing never blocks and
/// only wakes subscribers when the mode actually changes.
pub async fn sensing_loop(
    source: Arc<dyn ActivitySource>,
    db: Database,
    config: SamplingLoopConfig,
    mode_tx: watch::Sender<SamplingMode>,
    cancel_token: CancellationToken,
) {
    let mut mode = *mode_tx.borrow();
    let mut ticker = tokio::time::interval(config.cadence.period(mode));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_power_log: Option<Instant> = None;

    log_info!(
        "sampling loop started in {:?} mode (every {}s)",
        mode,
        config.cadence.period(mode).as_secs()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let result = sample_with_timeout(source.as_ref()).await;

                let next = mode.next(SampleOutcome::of(&result));
                if next != mode {
                    log_transition(next, &result, &config.cadence);
                    mode = next;
                    ticker = cadence_ticker(config.cadence.period(mode));
                    publish_mode(&mode_tx, mode);
                }

                match result {
                    Ok(sample) => record_sample(&db, sample).await,
                    Err(SampleError::PowerStateUnavailable(reason)) => {
                        log_debug!("sampling skipped: {reason}");
                    }
                    Err(err @ SampleError::Transient(_)) => log_warn!("{err}"),
                }

                if power_log_due(last_power_log, config.power_state_log_interval) {
                    last_power_log = Some(Instant::now());
                    if let Some(power) = source.power_state().await {
                        log_info!(
                            "power state - sleeping: {}, locked: {}, display asleep: {}, idle: {}",
                            power.is_sleeping,
                            power.is_locked,
                            power.is_display_sleeping,
                            power.is_idle
                        );
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("sampling loop shutting down");
                break;
            }
        }
    }
}

async fn sample_with_timeout(source: &dyn ActivitySource) -> Result<ActivitySample, SampleError> {
    match tokio::time::timeout(Duration::from_secs(SAMPLE_TIMEOUT_SECS), source.sample()).await {
        Ok(result) => result,
        Err(_) => Err(SampleError::Transient(anyhow!(
            "activity sample timed out after {SAMPLE_TIMEOUT_SECS}s"
        ))),
    }
}

/// Replacement ticker for a new cadence. The first tick lands one full
/// period from now so a mode switch never triggers an immediate extra poll.
fn cadence_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn publish_mode(mode_tx: &watch::Sender<SamplingMode>, mode: SamplingMode) {
    mode_tx.send_if_modified(|current| {
        if *current == mode {
            false
        } else {
            *current = mode;
            true
        }
    });
}

fn power_log_due(last: Option<Instant>, interval: Duration) -> bool {
    last.map_or(true, |at| at.elapsed() >= interval)
}

fn log_transition(
    next: SamplingMode,
    result: &Result<ActivitySample, SampleError>,
    cadence: &SamplingCadence,
) {
    let period = cadence.period(next).as_secs();
    match (next, result) {
        (SamplingMode::Paused, Err(SampleError::PowerStateUnavailable(reason))) => {
            log_info!("sampling paused ({reason}); polling every {period}s");
        }
        _ => log_info!("sampling resumed; polling every {period}s"),
    }
}

async fn record_sample(db: &Database, sample: ActivitySample) {
    if sample.app_name.is_empty() {
        return;
    }

    let raw = RawSample::new(Utc::now(), sample.app_name, sample.window_title);
    match db.insert_raw_sample(&raw).await {
        Ok(_) => log_debug!("recorded sample: {} - {}", raw.app_name, raw.window_title),
        Err(err) => log_error!("failed to record sample for {}: {err:#}", raw.app_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::source::PowerState;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Replays a fixed list of poll results, then reports exhaustion and
    /// keeps returning empty samples.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<ActivitySample, SampleError>>>,
        calls: Mutex<Vec<Duration>>,
        power_calls: AtomicUsize,
        started: Instant,
        exhausted: mpsc::UnboundedSender<()>,
    }

    impl ScriptedSource {
        fn new(
            script: Vec<Result<ActivitySample, SampleError>>,
        ) -> (Arc<Self>, mpsc::UnboundedReceiver<()>) {
            let (exhausted, done_rx) = mpsc::unbounded_channel();
            let source = Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
                power_calls: AtomicUsize::new(0),
                started: Instant::now(),
                exhausted,
            });
            (source, done_rx)
        }

        fn call_offsets(&self) -> Vec<u64> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|offset| offset.as_secs())
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl ActivitySource for ScriptedSource {
        async fn sample(&self) -> Result<ActivitySample, SampleError> {
            self.calls.lock().unwrap().push(self.started.elapsed());
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(result) => result,
                None => {
                    let _ = self.exhausted.send(());
                    Ok(ActivitySample::default())
                }
            }
        }

        async fn power_state(&self) -> Option<PowerState> {
            self.power_calls.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    fn unavailable() -> Result<ActivitySample, SampleError> {
        Err(SampleError::PowerStateUnavailable("screen is locked".into()))
    }

    fn idle_desktop() -> Result<ActivitySample, SampleError> {
        Ok(ActivitySample::default())
    }

    #[tokio::test(start_paused = true)]
    async fn power_loss_slows_cadence_and_recovery_restores_it() {
        let (source, mut done) = ScriptedSource::new(vec![
            idle_desktop(),
            unavailable(),
            unavailable(),
            idle_desktop(),
        ]);
        let db = Database::open_in_memory().unwrap();
        let (mode_tx, mut mode_rx) = watch::channel(SamplingMode::Active);
        let cancel = CancellationToken::new();

        let observer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while mode_rx.changed().await.is_ok() {
                seen.push(*mode_rx.borrow_and_update());
            }
            seen
        });

        let worker = tokio::spawn(sensing_loop(
            source.clone(),
            db,
            SamplingLoopConfig::default(),
            mode_tx,
            cancel.clone(),
        ));

        done.recv().await.unwrap();
        cancel.cancel();
        worker.await.unwrap();

        assert_eq!(source.call_offsets(), vec![0, 5, 35, 65, 70]);
        assert_eq!(
            observer.await.unwrap(),
            vec![SamplingMode::Paused, SamplingMode::Active]
        );
        assert_eq!(source.power_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_keep_fast_cadence() {
        let (source, mut done) = ScriptedSource::new(vec![
            Err(SampleError::Transient(anyhow!("osascript exited 1"))),
            Err(SampleError::Transient(anyhow!("osascript exited 1"))),
        ]);
        let db = Database::open_in_memory().unwrap();
        let (mode_tx, mode_rx) = watch::channel(SamplingMode::Active);
        let cancel = CancellationToken::new();

        let worker = tokio::spawn(sensing_loop(
            source.clone(),
            db,
            SamplingLoopConfig::default(),
            mode_tx,
            cancel.clone(),
        ));

        done.recv().await.unwrap();
        cancel.cancel();
        worker.await.unwrap();

        assert_eq!(source.call_offsets(), vec![0, 5, 10]);
        assert!(!mode_rx.has_changed().unwrap_or(false));
        assert_eq!(*mode_rx.borrow(), SamplingMode::Active);
    }

    #[tokio::test]
    async fn focused_windows_are_appended_and_empty_ones_ignored() {
        let (source, mut done) = ScriptedSource::new(vec![
            Ok(ActivitySample::new("Editor", "a.go")),
            Err(SampleError::Transient(anyhow!("flaky"))),
            Ok(ActivitySample::new("", "")),
            Ok(ActivitySample::new("Browser", "news")),
        ]);
        let db = Database::open_in_memory().unwrap();
        let (mode_tx, _mode_rx) = watch::channel(SamplingMode::Active);
        let cancel = CancellationToken::new();
        let config = SamplingLoopConfig {
            cadence: SamplingCadence {
                active: Duration::from_millis(5),
                paused: Duration::from_millis(20),
            },
            ..SamplingLoopConfig::default()
        };

        let worker = tokio::spawn(sensing_loop(
            source.clone(),
            db.clone(),
            config,
            mode_tx,
            cancel.clone(),
        ));

        done.recv().await.unwrap();
        cancel.cancel();
        worker.await.unwrap();

        let scan = db.scan_raw_samples().await.unwrap();
        let stored: Vec<_> = scan
            .samples
            .iter()
            .map(|s| (s.app_name.as_str(), s.window_title.as_str()))
            .collect();
        assert_eq!(stored, vec![("Editor", "a.go"), ("Browser", "news")]);
    }

    #[test]
    fn publishing_same_mode_twice_wakes_subscribers_once() {
        let (mode_tx, mut mode_rx) = watch::channel(SamplingMode::Active);

        publish_mode(&mode_tx, SamplingMode::Paused);
        publish_mode(&mode_tx, SamplingMode::Paused);
        assert!(mode_rx.has_changed().unwrap());
        assert_eq!(*mode_rx.borrow_and_update(), SamplingMode::Paused);

        publish_mode(&mode_tx, SamplingMode::Paused);
        assert!(!mode_rx.has_changed().unwrap());
    }

    #[test]
    fn power_log_is_due_once_per_interval() {
        let interval = Duration::from_secs(300);
        assert!(power_log_due(None, interval));
        assert!(!power_log_due(Some(Instant::now()), interval));
    }
}
