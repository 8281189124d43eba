//! Shared test doubles for the acquisition engine's unit and scenario
//! tests. Not compiled outside `#[cfg(test)]`.

use crate::acquisition::capabilities::{Detector, DriftCorrector, FrameSink, Leech, ScanStage, Scanner, SoftwareTrigger};
use crate::acquisition::data::{now_secs, DataArray};
use crate::acquisition::error::AcqResult;
use async_trait::async_trait;
use ndarray::{arr0, ArrayD};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A scanner with fixed geometry and a recorded last-applied translation.
pub struct MockScanner {
    pub shape: (u32, u32),
    pub pixel_size: (f64, f64),
    pub dwell_range: (f64, f64),
    pub last_translation: Mutex<(f64, f64)>,
    /// Every translation ever applied, in call order; used by tests that
    /// verify the drift-corrected translation at each grid index (spec §8
    /// "Drift application").
    pub translations: Mutex<Vec<(f64, f64)>>,
}

impl Default for MockScanner {
    fn default() -> Self {
        Self {
            shape: (512, 512),
            pixel_size: (1e-8, 1e-8),
            dwell_range: (1e-6, 1e-3),
            last_translation: Mutex::new((0.0, 0.0)),
            translations: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Scanner for MockScanner {
    fn shape(&self) -> (u32, u32) {
        self.shape
    }
    fn pixel_size(&self) -> (f64, f64) {
        self.pixel_size
    }
    fn min_scale(&self) -> f64 {
        1.0
    }
    fn dwell_range(&self) -> (f64, f64) {
        self.dwell_range
    }
    async fn set_scale(&self, scale: (f64, f64)) -> AcqResult<(f64, f64)> {
        Ok(scale)
    }
    async fn set_resolution(&self, resolution: (u32, u32)) -> AcqResult<(u32, u32)> {
        Ok(resolution)
    }
    async fn set_translation(&self, translation: (f64, f64)) -> AcqResult<(f64, f64)> {
        *self.last_translation.lock().await = translation;
        self.translations.lock().await.push(translation);
        Ok(translation)
    }
    async fn set_dwell_time(&self, dwell: f64) -> AcqResult<f64> {
        Ok(dwell.clamp(self.dwell_range.0, self.dwell_range.1))
    }
}

/// A detector that never produces data; used only to exercise engine-level
/// plumbing (e.g. the `Busy` rejection path) that never waits on it.
#[derive(Default)]
pub struct NullDetector {
    subscribed: Mutex<Option<FrameSink>>,
}

#[async_trait]
impl Detector for NullDetector {
    fn shape(&self) -> Vec<u32> {
        vec![1, 1]
    }
    fn role(&self) -> &str {
        "null"
    }
    async fn subscribe(&self, sink: FrameSink) -> AcqResult<()> {
        *self.subscribed.lock().await = Some(sink);
        Ok(())
    }
    async fn unsubscribe(&self) -> AcqResult<()> {
        *self.subscribed.lock().await = None;
        Ok(())
    }
    async fn set_synchronized_on(&self, _trigger: Option<Arc<SoftwareTrigger>>) -> AcqResult<()> {
        Ok(())
    }
}

/// A beam-driven detector ("primary") that pushes one constant-value
/// sample every time its translation is observed, via an explicit `fire()`
/// the test harness calls after `subscribe()`.
pub struct ConstantDetector {
    pub role: String,
    pub value: f64,
    pub exposure_time: Option<f64>,
    pub readout_rate: Option<f64>,
    pub trigger: Option<Arc<SoftwareTrigger>>,
    sink: Mutex<Option<FrameSink>>,
}

impl ConstantDetector {
    pub fn new(role: &str, value: f64) -> Self {
        Self {
            role: role.to_string(),
            value,
            exposure_time: None,
            readout_rate: None,
            trigger: None,
            sink: Mutex::new(None),
        }
    }

    pub fn with_camera_timing(mut self, exposure: f64, readout: f64) -> Self {
        self.exposure_time = Some(exposure);
        self.readout_rate = Some(readout);
        self.trigger = Some(Arc::new(SoftwareTrigger::new()));
        self
    }

    /// Push one sample immediately, stamped with the current time.
    pub async fn fire(&self, position: (f64, f64)) {
        if let Some(sink) = self.sink.lock().await.as_ref() {
            let mut arr = DataArray::new(arr0(self.value).into_dyn());
            arr.set_position(position);
            arr.set_acquisition_date(now_secs());
            let _ = sink.send(arr).await;
        }
    }

    /// Spawn a background task that waits for this detector's software
    /// trigger and immediately fires a sample, simulating a camera whose
    /// exposure is effectively instantaneous for test purposes.
    pub fn spawn_auto_fire(self: &Arc<Self>, position: (f64, f64)) {
        let this = self.clone();
        if let Some(trigger) = this.trigger.clone() {
            tokio::spawn(async move {
                trigger.notified().await;
                this.fire(position).await;
            });
        }
    }
}

#[async_trait]
impl Detector for ConstantDetector {
    fn shape(&self) -> Vec<u32> {
        vec![1, 1]
    }
    fn role(&self) -> &str {
        &self.role
    }
    fn exposure_time(&self) -> Option<f64> {
        self.exposure_time
    }
    fn readout_rate(&self) -> Option<f64> {
        self.readout_rate
    }
    fn software_trigger(&self) -> Option<Arc<SoftwareTrigger>> {
        self.trigger.clone()
    }
    async fn subscribe(&self, sink: FrameSink) -> AcqResult<()> {
        *self.sink.lock().await = Some(sink);
        Ok(())
    }
    async fn unsubscribe(&self) -> AcqResult<()> {
        *self.sink.lock().await = None;
        Ok(())
    }
    async fn set_synchronized_on(&self, _trigger: Option<Arc<SoftwareTrigger>>) -> AcqResult<()> {
        Ok(())
    }
}

pub struct MockStage {
    pub axes: HashMap<String, (f64, f64)>,
    pub position: Mutex<HashMap<String, f64>>,
}

impl MockStage {
    pub fn new(axes: HashMap<String, (f64, f64)>) -> Self {
        let position = axes.iter().map(|(k, _)| (k.clone(), 0.0)).collect();
        Self {
            axes,
            position: Mutex::new(position),
        }
    }
}

#[async_trait]
impl ScanStage for MockStage {
    fn axes(&self) -> HashMap<String, (f64, f64)> {
        self.axes.clone()
    }
    async fn position(&self) -> AcqResult<HashMap<String, f64>> {
        Ok(self.position.lock().await.clone())
    }
    async fn move_absolute(&self, target: HashMap<String, f64>) -> AcqResult<()> {
        let mut position = self.position.lock().await;
        for (axis, value) in target {
            position.insert(axis, value);
        }
        Ok(())
    }
}

/// When a `ProbeDetector` fires relative to the rest of the protocol.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum FireMode {
    /// Fires shortly after `subscribe()`, simulating a beam-driving
    /// ("primary") detector that samples as soon as the beam settles.
    OnSubscribe,
    /// Fires only once its software trigger is notified, simulating a
    /// camera.
    OnTrigger,
    /// Fires repeatedly at a fixed interval for as long as it is
    /// subscribed, simulating a free-running push-stream detector
    /// (spec §4.6).
    Continuous(std::time::Duration),
}

/// A detector whose reported `position` metadata is derived from the
/// scanner's last-applied translation times its pixel size, matching how a
/// real adapter would report beam position in physical units. Used by the
/// end-to-end scenario tests where the center-of-image rule must hold in
/// consistent units.
pub struct ProbeDetector {
    pub role: String,
    pub scanner: Arc<MockScanner>,
    pub mode: FireMode,
    pub exposure_time: Option<f64>,
    pub readout_rate: Option<f64>,
    pub trigger: Option<Arc<SoftwareTrigger>>,
    pub value_counter: AtomicU64,
    pub misses_remaining: Mutex<u32>,
    /// If set, every fired sample carries this constant value instead of an
    /// incrementing counter (used by the stream-accumulation scenario).
    pub constant_value: Option<f64>,
    sink: Mutex<Option<FrameSink>>,
}

impl ProbeDetector {
    pub fn new(role: &str, scanner: Arc<MockScanner>, mode: FireMode) -> Self {
        let trigger = match mode {
            FireMode::OnTrigger => Some(Arc::new(SoftwareTrigger::new())),
            FireMode::OnSubscribe | FireMode::Continuous(_) => None,
        };
        Self {
            role: role.to_string(),
            scanner,
            mode,
            exposure_time: None,
            readout_rate: None,
            trigger,
            value_counter: AtomicU64::new(0),
            misses_remaining: Mutex::new(0),
            constant_value: None,
            sink: Mutex::new(None),
        }
    }

    pub fn with_camera_timing(mut self, exposure: f64, readout: f64) -> Self {
        self.exposure_time = Some(exposure);
        self.readout_rate = Some(readout);
        self
    }

    pub fn with_constant_value(mut self, value: f64) -> Self {
        self.constant_value = Some(value);
        self
    }

    /// Cause the next `misses` trigger notifications to be silently
    /// dropped (no sample pushed), simulating a detector that misses its
    /// trigger (spec §8 "Retry bound" scenario).
    pub async fn drop_next_triggers(&self, misses: u32) {
        *self.misses_remaining.lock().await = misses;
    }

    async fn current_position_meters(&self) -> (f64, f64) {
        let translation = *self.scanner.last_translation.lock().await;
        let px = self.scanner.pixel_size();
        // Real-world position is Y-inverted relative to the beam
        // translation's image-space convention (spec §4.1: "image-Y grows
        // downward, stage-Y grows upward"), which is the premise the
        // assembler's center rule (spec §4.7) relies on.
        (translation.0 * px.0, -translation.1 * px.1)
    }

    async fn fire_one(self: &Arc<Self>) {
        let position = self.current_position_meters().await;
        let value = match self.constant_value {
            Some(v) => {
                self.value_counter.fetch_add(1, Ordering::SeqCst);
                v
            }
            None => self.value_counter.fetch_add(1, Ordering::SeqCst) as f64,
        };
        if let Some(sink) = self.sink.lock().await.as_ref() {
            let mut arr = DataArray::new(arr0(value).into_dyn());
            arr.set_position(position);
            arr.set_acquisition_date(now_secs());
            let _ = sink.send(arr).await;
        }
    }
}

#[async_trait]
impl Detector for ProbeDetector {
    fn shape(&self) -> Vec<u32> {
        vec![1, 1]
    }
    fn role(&self) -> &str {
        &self.role
    }
    fn exposure_time(&self) -> Option<f64> {
        self.exposure_time
    }
    fn readout_rate(&self) -> Option<f64> {
        self.readout_rate
    }
    fn software_trigger(&self) -> Option<Arc<SoftwareTrigger>> {
        self.trigger.clone()
    }
    async fn subscribe(&self, sink: FrameSink) -> AcqResult<()> {
        *self.sink.lock().await = Some(sink);
        Ok(())
    }
    async fn unsubscribe(&self) -> AcqResult<()> {
        *self.sink.lock().await = None;
        Ok(())
    }
    async fn set_synchronized_on(&self, _trigger: Option<Arc<SoftwareTrigger>>) -> AcqResult<()> {
        Ok(())
    }
}

/// Spawn the background firing task for a `ProbeDetector` right after it
/// has been constructed and wrapped in an `Arc`. Must be called once per
/// detector instance; for `OnSubscribe` detectors this polls for a sink to
/// appear, for `OnTrigger` detectors it waits on the software trigger in a
/// loop (one firing per notification, honoring `drop_next_triggers`).
pub fn spawn_probe_responder(detector: Arc<ProbeDetector>) {
    match detector.mode {
        FireMode::OnSubscribe => {
            tokio::spawn(async move {
                loop {
                    if detector.sink.lock().await.is_some() {
                        detector.fire_one().await;
                        // Wait for unsubscribe before watching for the next
                        // pixel's subscribe.
                        while detector.sink.lock().await.is_some() {
                            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                        }
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                }
            });
        }
        FireMode::OnTrigger => {
            let trigger = detector.trigger.clone().expect("OnTrigger probe needs a trigger");
            tokio::spawn(async move {
                loop {
                    trigger.notified().await;
                    let mut misses = detector.misses_remaining.lock().await;
                    if *misses > 0 {
                        *misses -= 1;
                        continue;
                    }
                    drop(misses);
                    // Model the exposure itself, not just an instantaneous
                    // trigger->data latency, so the controller's "completed
                    // suspiciously fast" guard (spec §4.3 step 7) sees a
                    // realistic elapsed time.
                    if let Some(exposure) = detector.exposure_time {
                        tokio::time::sleep(std::time::Duration::from_secs_f64(exposure)).await;
                    }
                    detector.fire_one().await;
                }
            });
        }
        FireMode::Continuous(interval) => {
            tokio::spawn(async move {
                loop {
                    if detector.sink.lock().await.is_some() {
                        detector.fire_one().await;
                    }
                    tokio::time::sleep(interval).await;
                }
            });
        }
    }
}

/// A leech/drift-corrector that fires every `interval` pixels and reports a
/// fixed drift vector, used for the drift-application and leech-interleave
/// scenario tests.
pub struct FixedDriftLeech {
    pub interval: u64,
    pub drift: (f64, f64),
    pub fire_count: AtomicU64,
    pub complete_count: AtomicU64,
    pub anchors: Mutex<Vec<DataArray>>,
}

impl FixedDriftLeech {
    pub fn new(interval: u64, drift: (f64, f64)) -> Self {
        Self {
            interval,
            drift,
            fire_count: AtomicU64::new(0),
            complete_count: AtomicU64::new(0),
            anchors: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Leech for FixedDriftLeech {
    fn estimate(&self, _dt: f64, _shape: (u32, u32)) -> f64 {
        0.0
    }
    async fn start(&self, _dt: f64, _shape: (u32, u32)) -> AcqResult<u64> {
        Ok(self.interval)
    }
    async fn next(&self, _latest_data: &[DataArray]) -> AcqResult<u64> {
        self.fire_count.fetch_add(1, Ordering::SeqCst);
        let mut anchor = DataArray::new(ArrayD::zeros(ndarray::IxDyn(&[2, 2])));
        anchor.set_acquisition_date(now_secs());
        self.anchors.lock().await.push(anchor);
        Ok(self.interval)
    }
    async fn complete(&self, _all_data: &[DataArray]) -> AcqResult<()> {
        self.complete_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl DriftCorrector for FixedDriftLeech {
    async fn cumulative_drift(&self) -> (f64, f64) {
        self.drift
    }
    async fn anchor_raw(&self) -> Vec<DataArray> {
        self.anchors.lock().await.clone()
    }
}
