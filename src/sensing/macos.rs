//! macOS activity source.
//!
//! Reads the frontmost application through System Events and gates every
//! sample on the machine being awake, unlocked and recently used.

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::debug;
use std::sync::Mutex;
use tokio::process::Command;

use super::probe::{
    display_is_asleep, parse_front_window, parse_hid_idle_time, pmset_reports_sleep,
    window_count_means_locked,
};
use super::source::{ActivitySample, ActivitySource, PowerState, SampleError};

const FRONT_WINDOW_SCRIPT: &str = r#"
tell application "System Events"
    set frontApp to first application process whose frontmost is true
    if frontApp is not null then
        set appName to name of frontApp
        try
            set windowTitle to name of front window of frontApp
            return appName & "|||" & windowTitle
        on error
            return appName & "|||" & ""
        end try
    else
        return "|||"
    end if
end tell
"#;

const WINDOW_COUNT_SCRIPT: &str = r#"
tell application "System Events" to try
    tell first process whose frontmost is true
        return count of windows
    end tell
on error
    return -1
end try
"#;

const IDLE_THRESHOLD: Duration = Duration::from_secs(5 * 60);

pub struct MacOSActivitySource {
    idle_threshold: Duration,
    /// Last time a sample saw a focused app; fallback when HID idle time is unreadable.
    last_activity: Mutex<Instant>,
}

impl MacOSActivitySource {
    pub fn new() -> Self {
        Self {
            idle_threshold: IDLE_THRESHOLD,
            last_activity: Mutex::new(Instant::now()),
        }
    }

    fn mark_active(&self) {
        let mut guard = match self.last_activity.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Instant::now();
    }

    fn since_last_activity(&self) -> Duration {
        match self.last_activity.lock() {
            Ok(guard) => guard.elapsed(),
            Err(poisoned) => poisoned.into_inner().elapsed(),
        }
    }

    async fn is_idle(&self) -> bool {
        let idle_for = match run_command("ioreg", &["-c", "IOHIDSystem", "-r", "-d", "1"]).await {
            Ok(output) => parse_hid_idle_time(&output),
            Err(err) => {
                debug!("HID idle lookup failed: {err:#}");
                None
            }
        };
        idle_for.unwrap_or_else(|| self.since_last_activity()) > self.idle_threshold
    }

    async fn read_power_state(&self) -> PowerState {
        let (sleeping, locked, display, idle) = tokio::join!(
            probe("pmset", &["-g", "ps"], pmset_reports_sleep),
            probe("osascript", &["-e", WINDOW_COUNT_SCRIPT], window_count_means_locked),
            probe(
                "ioreg",
                &["-n", "IODisplayConnect", "-r", "-d", "1"],
                display_is_asleep
            ),
            self.is_idle(),
        );

        PowerState {
            is_sleeping: sleeping,
            is_locked: locked,
            is_display_sleeping: display,
            is_idle: idle,
            observed_at: Utc::now(),
        }
    }
}

impl Default for MacOSActivitySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ActivitySource for MacOSActivitySource {
    async fn sample(&self) -> Result<ActivitySample, SampleError> {
        let power = self.read_power_state().await;
        if let Some(reason) = power.unavailable_reason() {
            return Err(SampleError::PowerStateUnavailable(reason.to_string()));
        }

        let output = run_command("osascript", &["-e", FRONT_WINDOW_SCRIPT])
            .await
            .context("frontmost window lookup failed")?;
        let sample = parse_front_window(&output);
        if !sample.app_name.is_empty() {
            self.mark_active();
        }
        Ok(sample)
    }

    async fn power_state(&self) -> Option<PowerState> {
        Some(self.read_power_state().await)
    }
}

/// Runs one detector command; a failed command counts as "not in that state".
async fn probe(program: &str, args: &[&str], detect: fn(&str) -> bool) -> bool {
    match run_command(program, args).await {
        Ok(output) => detect(&output),
        Err(err) => {
            debug!("{program} power probe failed: {err:#}");
            false
        }
    }
}

async fn run_command(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("failed to spawn {program}"))?;

    if !output.status.success() {
        bail!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
