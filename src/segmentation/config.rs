use chrono::Duration;

/// Thresholds that decide where sessions start, end, and whether they are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationConfig {
    /// Silence between consecutive samples longer than this closes a session.
    pub gap_threshold_secs: u64,

    /// Sessions must last strictly longer than this to be persisted.
    pub min_session_duration_secs: u64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            gap_threshold_secs: 30,
            min_session_duration_secs: 5,
        }
    }
}

impl SegmentationConfig {
    pub fn gap_threshold(&self) -> Duration {
        saturating_seconds(self.gap_threshold_secs)
    }

    pub fn min_session_duration(&self) -> Duration {
        saturating_seconds(self.min_session_duration_secs)
    }
}

/// Values past chrono's range clamp to `Duration::MAX`.
fn saturating_seconds(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huge_thresholds_saturate_instead_of_panicking() {
        let config = SegmentationConfig {
            gap_threshold_secs: 1 << 62,
            min_session_duration_secs: u64::MAX,
        };
        assert_eq!(config.gap_threshold(), Duration::MAX);
        assert_eq!(config.min_session_duration(), Duration::MAX);
    }

    #[test]
    fn defaults_convert_exactly() {
        let config = SegmentationConfig::default();
        assert_eq!(config.gap_threshold(), Duration::seconds(30));
        assert_eq!(config.min_session_duration(), Duration::seconds(5));
    }
}
