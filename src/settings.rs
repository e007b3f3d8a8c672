use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::segmentation::SegmentationConfig;
use crate::sensing::{SamplingCadence, SamplingLoopConfig};

const APP_DIR: &str = "personalos";
const SETTINGS_FILE: &str = "settings.json";
const DATABASE_FILE: &str = "personal_os.sqlite3";

/// Upper bound for every interval and threshold setting (one week).
pub const MAX_SETTING_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Overrides the per-user data directory location.
    pub database_path: Option<PathBuf>,
    pub active_interval_secs: u64,
    pub paused_interval_secs: u64,
    pub processing_interval_secs: u64,
    pub gap_threshold_secs: u64,
    pub min_session_duration_secs: u64,
    pub power_state_log_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            active_interval_secs: 5,
            paused_interval_secs: 30,
            processing_interval_secs: 60,
            gap_threshold_secs: 30,
            min_session_duration_secs: 5,
            power_state_log_interval_secs: 300,
        }
    }
}

impl Settings {
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("could not determine the user config directory")?;
        Ok(base.join(APP_DIR).join(SETTINGS_FILE))
    }

    /// Reads settings from `path`. A missing file yields defaults, and so
    /// does one that cannot be parsed (with a warning).
    pub fn load(path: &Path) -> Result<Self> {
        let settings = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(err) => {
                    warn!(
                        "Ignoring unreadable settings at {}: {err}; using defaults",
                        path.display()
                    );
                    Settings::default()
                }
            }
        } else {
            Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("active_interval_secs", self.active_interval_secs),
            ("paused_interval_secs", self.paused_interval_secs),
            ("processing_interval_secs", self.processing_interval_secs),
            (
                "power_state_log_interval_secs",
                self.power_state_log_interval_secs,
            ),
        ] {
            if value == 0 {
                bail!("{name} must be greater than zero");
            }
            if value > MAX_SETTING_SECS {
                bail!("{name} must be at most {MAX_SETTING_SECS} seconds");
            }
        }

        for (name, value) in [
            ("gap_threshold_secs", self.gap_threshold_secs),
            ("min_session_duration_secs", self.min_session_duration_secs),
        ] {
            let in_range = i64::try_from(value)
                .ok()
                .and_then(chrono::TimeDelta::try_seconds)
                .is_some();
            if !in_range || value > MAX_SETTING_SECS {
                bail!("{name} must be at most {MAX_SETTING_SECS} seconds");
            }
        }
        Ok(())
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        let base = dirs::data_local_dir()
            .context("could not determine the user data directory")?;
        Ok(base.join(APP_DIR).join(DATABASE_FILE))
    }

    pub fn segmentation(&self) -> SegmentationConfig {
        SegmentationConfig {
            gap_threshold_secs: self.gap_threshold_secs,
            min_session_duration_secs: self.min_session_duration_secs,
        }
    }

    pub fn sampling(&self) -> SamplingLoopConfig {
        SamplingLoopConfig {
            cadence: SamplingCadence {
                active: Duration::from_secs(self.active_interval_secs),
                paused: Duration::from_secs(self.paused_interval_secs),
            },
            power_state_log_interval: Duration::from_secs(self.power_state_log_interval_secs),
        }
    }

    pub fn processing_interval(&self) -> Duration {
        Duration::from_secs(self.processing_interval_secs)
    }
}
