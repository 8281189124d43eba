//! Error types for the synchronized multi-detector acquisition engine.
//!
//! `AcqError` is the single error type threaded through the grid generator,
//! hardware adapter traits, controllers, assembler and progress core. Each
//! variant documents its recovery policy so callers can match on kind rather
//! than string content, following the convention already used by
//! [`crate::error::DaqError`].

use thiserror::Error;

/// Convenience alias for results produced by the acquisition engine.
pub type AcqResult<T> = std::result::Result<T, AcqError>;

#[derive(Error, Debug)]
pub enum AcqError {
    /// Expected on user cancellation. The worker has already performed full
    /// teardown (unsubscribed dataflows, unsynchronized detectors, parked
    /// the stage) before this is raised to the caller.
    #[error("acquisition cancelled")]
    Cancelled,

    /// Another acquisition is already `RUNNING` on this engine instance.
    /// No state change occurs; the caller may retry once the current
    /// acquisition finishes.
    #[error("engine is busy with another acquisition")]
    Busy,

    /// A computed ROI, stage target, or drift-corrected translation falls
    /// outside a valid hardware range. For beam drift this is recoverable
    /// (the position is clipped and logged); for a scan-stage target
    /// discovered before the run starts it is fatal.
    #[error("{0} is out of range: {detail}", detail = .detail)]
    OutOfRange {
        /// What was out of range (e.g. "stage target", "beam translation").
        what: String,
        detail: String,
    },

    /// Three consecutive per-pixel retries failed. Fatal; the worker tears
    /// down and the future resolves to this error.
    #[error("synchronization failed after {attempts} attempts at pixel {pixel:?}")]
    SyncFailure {
        attempts: u32,
        pixel: (usize, usize),
    },

    /// A completion event, stage move, or stream frame did not arrive
    /// within its deadline. Fatal; the worker tears down.
    #[error("timed out after {0:?} waiting for {1}")]
    Timeout(std::time::Duration, String),

    /// A received sample predates the trigger that should have produced it.
    /// Recoverable: the sample is dropped and the acquisition continues.
    #[error("stale data received (predates trigger start)")]
    StaleData,

    /// Adapter-level I/O or memory-exhaustion style failure. Fatal.
    #[error("adapter I/O error: {0}")]
    IoError(String),

    /// The requested detector/scanner/stage composition does not satisfy
    /// the controller's contract (e.g. "expected exactly two detectors").
    /// Raised before any hardware is touched.
    #[error("validation error: {0}")]
    Validation(String),
}

impl From<anyhow::Error> for AcqError {
    /// Adapter implementations use `anyhow::Result`; exceptions raised by an
    /// adapter are caught at the controller boundary and folded into
    /// `IoError` unless the adapter already raised a typed `AcqError`
    /// (recovered via downcast).
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<AcqError>() {
            Ok(acq_err) => acq_err,
            Err(err) => AcqError::IoError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_display_includes_detail() {
        let err = AcqError::OutOfRange {
            what: "stage target".into(),
            detail: "x=12mm exceeds axis range [-5mm, 5mm]".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("stage target"));
        assert!(msg.contains("exceeds axis range"));
    }

    #[test]
    fn anyhow_error_roundtrips_typed_acq_error() {
        let original = AcqError::Busy;
        let wrapped: anyhow::Error = anyhow::Error::new(original);
        let recovered: AcqError = wrapped.into();
        assert!(matches!(recovered, AcqError::Busy));
    }

    #[test]
    fn anyhow_error_without_typed_source_becomes_io_error() {
        let wrapped = anyhow::anyhow!("driver reset the bus");
        let recovered: AcqError = wrapped.into();
        match recovered {
            AcqError::IoError(msg) => assert!(msg.contains("driver reset the bus")),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
