//! Parsers for the output of the macOS command line tools the activity
//! source shells out to. Kept free of process spawning so they can be
//! exercised on any platform.

use std::time::Duration;

use super::source::ActivitySample;

pub const FIELD_SEPARATOR: &str = "|||";

/// Splits `app|||title` as printed by the frontmost-window AppleScript.
/// Anything that does not have exactly two fields yields an empty sample,
/// which the sampling loop ignores.
pub fn parse_front_window(output: &str) -> ActivitySample {
    let mut parts = output.trim().split(FIELD_SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(app_name), Some(window_title), None) => {
            ActivitySample::new(app_name.trim(), window_title.trim())
        }
        _ => ActivitySample::default(),
    }
}

/// `pmset -g ps` mentions one of these words while the machine is going to
/// or coming out of sleep.
pub fn pmset_reports_sleep(output: &str) -> bool {
    let output = output.to_lowercase();
    ["sleep", "standby", "hibernate", "suspend"]
        .iter()
        .any(|word| output.contains(word))
}

/// A display whose power management reports state 4 is switched off.
pub fn display_is_asleep(ioreg_output: &str) -> bool {
    ioreg_output.contains("IOPowerManagement") && ioreg_output.contains("CurrentPowerState = 4")
}

/// The frontmost process exposes zero windows while the screen is locked.
/// `-1` means the lookup itself failed and says nothing about the lock.
pub fn window_count_means_locked(output: &str) -> bool {
    output.trim() == "0"
}

/// Extracts `HIDIdleTime` (nanoseconds since last input) from `ioreg -c IOHIDSystem`.
pub fn parse_hid_idle_time(ioreg_output: &str) -> Option<Duration> {
    ioreg_output
        .lines()
        .find(|line| line.contains("\"HIDIdleTime\""))
        .and_then(|line| line.split('=').nth(1))
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_nanos)
}
