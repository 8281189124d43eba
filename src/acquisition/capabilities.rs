//! Hardware Adapter — the abstract capability traits the acquisition engine
//! is polymorphic over (spec §4.2). Pure interface: no concrete driver
//! implementation lives here, only the contract and the shared trigger/sink
//! plumbing that controllers use to talk to adapters.
//!
//! Every method returns `AcqResult`; adapter implementations that use
//! `anyhow` internally can rely on `AcqError`'s `From<anyhow::Error>` at the
//! controller boundary (spec §4.2: "exceptions thrown by adapters are
//! caught at the controller boundary").

use crate::acquisition::data::DataArray;
use crate::acquisition::error::AcqResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// Detector roles capable of driving the beam (`EBEAM_DETECTORS` in the
/// original implementation). Used by stream-composition validation (spec
/// §6: "first detector does not drive the beam").
pub const BEAM_DRIVING_ROLES: &[&str] = &["se", "bs", "cl", "monochromator", "ebic"];

/// Capability: steer the primary beam. Every setter returns the value the
/// hardware actually applied after clipping to its valid range (spec §4.2:
/// "set scale, resolution, translation, dwell_time, each with a clipping
/// operation to a valid range").
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Sensor/field shape in pixels, `(Sx, Sy)`.
    fn shape(&self) -> (u32, u32);

    /// Current pixel size in meters, `(px, py)`.
    fn pixel_size(&self) -> (f64, f64);

    /// Minimum scale magnitude the scanner admits (used by the fuzzing
    /// sub-grid size computation in spec §4.3).
    fn min_scale(&self) -> f64;

    /// Valid dwell time range, `(min, max)` seconds.
    fn dwell_range(&self) -> (f64, f64);

    async fn set_scale(&self, scale: (f64, f64)) -> AcqResult<(f64, f64)>;
    async fn set_resolution(&self, resolution: (u32, u32)) -> AcqResult<(u32, u32)>;
    async fn set_translation(&self, translation: (f64, f64)) -> AcqResult<(f64, f64)>;
    async fn set_dwell_time(&self, dwell: f64) -> AcqResult<f64>;
}

/// A one-shot software trigger delivered to a detector to initiate one
/// acquisition (spec glossary). Built on `tokio::sync::Notify` so that
/// cancellation can wake a blocked `wait()` without a detector-side
/// reference back into the engine (spec §9: "route all pushed data through
/// a channel owned by the engine").
#[derive(Debug, Default)]
pub struct SoftwareTrigger {
    notify: Notify,
}

impl SoftwareTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        self.notify.notify_one();
    }

    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// Sink a detector pushes produced `DataArray`s into. Subscribing hands the
/// detector a sender; the controller owns the paired receiver. This avoids
/// the cyclic engine <-> detector callback reference the original source
/// has (spec §9).
pub type FrameSink = mpsc::Sender<DataArray>;

/// Capability: a data source with a triggerable push dataflow (spec §4.2).
#[async_trait]
pub trait Detector: Send + Sync {
    /// Detector shape; length 2 for 2-D detectors, longer for spectral
    /// detectors (used by the assembler to pick a mode).
    fn shape(&self) -> Vec<u32>;

    /// Role string used for beam-driving eligibility and human-readable
    /// logging (e.g. "se-detector", "ccd").
    fn role(&self) -> &str;

    fn exposure_time(&self) -> Option<f64> {
        None
    }

    fn readout_rate(&self) -> Option<f64> {
        None
    }

    /// Optional software trigger; cameras and other non-beam-synchronized
    /// detectors expose this so the controller can notify it explicitly.
    fn software_trigger(&self) -> Option<Arc<SoftwareTrigger>> {
        None
    }

    /// Begin pushing produced data into `sink`. Detectors are
    /// single-subscriber while the engine holds them (spec §5).
    async fn subscribe(&self, sink: FrameSink) -> AcqResult<()>;

    async fn unsubscribe(&self) -> AcqResult<()>;

    /// Synchronize this detector's acquisition to `trigger` (beam clock or
    /// software trigger), or `None` to run free-running.
    async fn set_synchronized_on(&self, trigger: Option<Arc<SoftwareTrigger>>) -> AcqResult<()>;
}

/// Whether `role` is eligible to drive the beam (spec §6).
pub fn is_beam_driving_role(role: &str) -> bool {
    BEAM_DRIVING_ROLES.contains(&role)
}

/// Capability: a mechanical positioner used in place of (or in addition
/// to) beam deflection (spec §4.2).
#[async_trait]
pub trait ScanStage: Send + Sync {
    /// Axis name -> `(min, max)` valid range in meters.
    fn axes(&self) -> HashMap<String, (f64, f64)>;

    async fn position(&self) -> AcqResult<HashMap<String, f64>>;

    /// Block until the move completes (spec §4.2: "move_absolute(pos) ->
    /// completion").
    async fn move_absolute(&self, target: HashMap<String, f64>) -> AcqResult<()>;

    fn speed(&self) -> Option<f64> {
        None
    }
}

/// Capability: an opaque periodic task interleaved with the main grid scan
/// (spec §3, §4.4 glossary "Leech").
#[async_trait]
pub trait Leech: Send + Sync {
    /// Estimated extra seconds this leech will add to an acquisition of
    /// the given per-pixel dwell and grid shape. Used by
    /// `estimate_acquisition_time()` without starting a real acquisition.
    fn estimate(&self, dt: f64, shape: (u32, u32)) -> f64;

    /// Called once before the pixel loop starts; returns the number of
    /// pixels until this leech should next fire.
    async fn start(&self, dt: f64, shape: (u32, u32)) -> AcqResult<u64>;

    /// Called when the countdown reaches zero; returns the number of
    /// pixels until the *next* fire.
    async fn next(&self, latest_data: &[DataArray]) -> AcqResult<u64>;

    /// Called exactly once when the acquisition completes (success,
    /// cancellation, or fatal error all still call this so the leech can
    /// release resources).
    async fn complete(&self, all_data: &[DataArray]) -> AcqResult<()>;
}

/// A leech that additionally publishes a cumulative drift vector and the
/// raw anchor images it measured it with (spec §3, §4.3 step 1/11).
#[async_trait]
pub trait DriftCorrector: Leech {
    /// Cumulative drift `(dx, dy)` in beam pixels, monotone in measurement
    /// count but not in magnitude (spec §3 invariants).
    async fn cumulative_drift(&self) -> (f64, f64);

    /// Raw anchor images collected so far, in measurement order.
    async fn anchor_raw(&self) -> Vec<DataArray>;
}
