//! Timing constants and configuration for the acquisition engine.
//!
//! Centralizing these values (rather than inlining them in the controllers)
//! keeps the per-pixel protocol in `controller/camera_sync.rs` readable and
//! lets each constant be documented and unit-tested on its own, following
//! the pattern of `crates/daq-core/src/limits.rs`.

use std::time::Duration;

/// Beam settle time after a translation is set, before triggering detectors
/// (spec §4.3 step 4: "≈10 ms").
pub const BEAM_SETTLE_TIME: Duration = Duration::from_millis(10);

/// Polling granularity while waiting past the initial camera-completion
/// budget (spec §4.3 step 6).
pub const CAMERA_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Extra slack added to `t_pix` for the first (non-polling) camera wait.
pub const CAMERA_WAIT_SLACK: Duration = Duration::from_millis(50);

/// Number of consecutive per-pixel retries allowed before `SyncFailure`
/// (spec §4.3 step 7: "Give up after 3 failures").
pub const MAX_PIXEL_RETRIES: u32 = 3;

/// Sleep between a failed pixel attempt and the retry (spec §4.3 step 7).
pub const RETRY_SLEEP: Duration = Duration::from_secs(1);

/// Elapsed-time fraction below which a camera exposure is considered too
/// fast to be real and is treated as a desync (spec §4.3 step 7, flagged as
/// an open question in spec §9 — preserved as-is).
pub const TOO_FAST_FRACTION: f64 = 0.95;

/// Multiplier and additive constant for the per-pixel hard deadline:
/// `3 * t_pix + 5s` (spec §5).
pub const PIXEL_TIMEOUT_MULTIPLIER: f64 = 3.0;
pub const PIXEL_TIMEOUT_ADDEND: Duration = Duration::from_secs(5);

/// Multiplier and additive constant for the per-primary-detector completion
/// deadline: `1.5 * sem_time + 5s` (spec §4.3 step 8).
pub const PRIMARY_TIMEOUT_MULTIPLIER: f64 = 1.5;
pub const PRIMARY_TIMEOUT_ADDEND: Duration = Duration::from_secs(5);

/// Multiplier and additive constant for the per-block BeamSync deadline:
/// `max(0.1, 10 * frame_time + 5s)` (spec §4.5).
pub const BEAM_BLOCK_TIMEOUT_MULTIPLIER: f64 = 10.0;
pub const BEAM_BLOCK_TIMEOUT_ADDEND: Duration = Duration::from_secs(5);
pub const BEAM_BLOCK_TIMEOUT_FLOOR: Duration = Duration::from_millis(100);

/// Multiplier and additive constant for the per-stream-frame deadline:
/// `3 * frame_time + 1s` (spec §4.6).
pub const STREAM_FRAME_TIMEOUT_MULTIPLIER: f64 = 3.0;
pub const STREAM_FRAME_TIMEOUT_ADDEND: Duration = Duration::from_secs(1);

/// Upper bound on how long cancellation waits for the worker task to exit
/// before giving up (spec §4.8).
pub const CANCEL_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Additive constant and pixel-count-independent term in the progress
/// estimate (spec §4.8): `0.001 * tot + leech_remaining + 0.1s`.
pub const PROGRESS_PER_PIXEL_OVERHEAD_FRACTION: f64 = 0.001;
pub const PROGRESS_ADDEND: Duration = Duration::from_millis(100);

/// Compute a deadline of the form `multiplier * base_secs + addend`.
pub fn scaled_deadline(base_secs: f64, multiplier: f64, addend: Duration) -> Duration {
    Duration::from_secs_f64((base_secs * multiplier).max(0.0)) + addend
}

/// Runtime-overridable acquisition settings, loadable from the application's
/// TOML configuration (`[acquisition]` table) via `config`/`figment`,
/// mirroring `src/config.rs`'s settings structs. Fields default to the
/// constants above when absent from configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AcquisitionSettings {
    /// Beam settle time in milliseconds.
    pub settle_time_ms: u64,
    /// Maximum per-pixel retries before `SyncFailure`.
    pub max_pixel_retries: u32,
    /// Sleep between retries, in milliseconds.
    pub retry_sleep_ms: u64,
    /// Whether fuzzing (sub-grid rastering during exposure) is permitted
    /// when the hardware admits it (spec §4.3).
    pub fuzzing_enabled: bool,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            settle_time_ms: BEAM_SETTLE_TIME.as_millis() as u64,
            max_pixel_retries: MAX_PIXEL_RETRIES,
            retry_sleep_ms: RETRY_SLEEP.as_millis() as u64,
            fuzzing_enabled: true,
        }
    }
}

impl AcquisitionSettings {
    pub fn settle_time(&self) -> Duration {
        Duration::from_millis(self.settle_time_ms)
    }

    pub fn retry_sleep(&self) -> Duration {
        Duration::from_millis(self.retry_sleep_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_deadline_matches_spec_formula() {
        let d = scaled_deadline(0.1, PIXEL_TIMEOUT_MULTIPLIER, PIXEL_TIMEOUT_ADDEND);
        assert!((d.as_secs_f64() - 5.3).abs() < 1e-9);
    }

    #[test]
    fn default_settings_match_named_constants() {
        let settings = AcquisitionSettings::default();
        assert_eq!(settings.settle_time(), BEAM_SETTLE_TIME);
        assert_eq!(settings.max_pixel_retries, MAX_PIXEL_RETRIES);
    }
}
