//! Acquisition Controllers — the three concrete state machines that drive
//! one acquisition to completion (spec §2 item 5): `CameraSync` (SEM +
//! camera, with a scan-stage variant), `BeamSync` (multiple beam-scanned
//! detectors), and `StreamAccumulator` (push-driven time correlator).
//!
//! Each controller is a free async function rather than a class hierarchy
//! overriding an assembly hook (spec §9: "Re-express as a controller
//! generic over an AssemblyStrategy and a SyncStrategy"); the
//! `AssemblyMode` the caller picks in `assembler.rs` plays the role of the
//! orthogonal assembly axis, and the function chosen (camera_sync /
//! beam_sync / stream_accumulator) plays the role of the sync axis.

pub mod beam_sync;
pub mod camera_sync;
pub mod camera_sync_stage;
pub mod stream_accumulator;

use crate::acquisition::capabilities::{is_beam_driving_role, Detector};
use crate::acquisition::error::{AcqError, AcqResult};
use std::sync::Arc;

/// Camera per-pixel readout time in seconds, from its reported readout
/// rate (spec §4.3: `t_pix = exp + ro`). A missing, zero, or non-finite
/// rate means the adapter doesn't report readout overhead; treat it as
/// zero rather than dividing by it, which would otherwise make `t_pix`
/// infinite and poison every downstream deadline.
pub fn readout_time(detector: &dyn Detector) -> f64 {
    detector
        .readout_rate()
        .filter(|r| r.is_finite() && *r > 0.0)
        .map(|r| 1.0 / r)
        .unwrap_or(0.0)
}

/// Validate the `[primary, camera]` composition required by `CameraSync`
/// (spec §6: "expected exactly two detectors", "second detector lacks
/// exposure time", "first detector does not drive the beam").
pub fn validate_camera_sync_detectors(detectors: &[Arc<dyn Detector>]) -> AcqResult<()> {
    if detectors.len() != 2 {
        return Err(AcqError::Validation(format!(
            "expected exactly two detectors, got {}",
            detectors.len()
        )));
    }
    if !is_beam_driving_role(detectors[0].role()) {
        return Err(AcqError::Validation(format!(
            "first detector '{}' does not drive the beam",
            detectors[0].role()
        )));
    }
    if detectors[1].exposure_time().is_none() {
        return Err(AcqError::Validation(format!(
            "second detector '{}' lacks exposure time",
            detectors[1].role()
        )));
    }
    Ok(())
}

/// Validate that every detector in a `BeamSync` acquisition drives off the
/// beam clock (spec §4.5: "All detectors are synchronous with the beam").
pub fn validate_beam_sync_detectors(detectors: &[Arc<dyn Detector>]) -> AcqResult<()> {
    if detectors.is_empty() {
        return Err(AcqError::Validation(
            "expected at least one detector".into(),
        ));
    }
    if !is_beam_driving_role(detectors[0].role()) {
        return Err(AcqError::Validation(format!(
            "first detector '{}' does not drive the beam",
            detectors[0].role()
        )));
    }
    Ok(())
}
