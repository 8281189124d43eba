//! Acquisition Engine — the external facade (spec §6): `acquire()`,
//! `estimate_acquisition_time()`, and the `raw` observable. Exactly one
//! acquisition may be `RUNNING` on one engine instance at a time.

use crate::acquisition::capabilities::Detector;
use crate::acquisition::controller::{
    beam_sync::{self, BeamSyncContext},
    camera_sync::{self, CameraSyncContext},
    camera_sync_stage::{self, CameraSyncStageContext},
    stream_accumulator::{self, StreamAccumulatorContext},
};
use crate::acquisition::data::DataArray;
use crate::acquisition::error::{AcqError, AcqResult};
use crate::acquisition::leech::LeechScheduler;
use crate::acquisition::progress::{AcqState, CancellationHandle, ProgressUpdate, ProgressiveFuture};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, watch, RwLock};

/// One fully-parameterized request for `acquire()`. The engine dispatches
/// to the matching controller; composition is validated before any
/// hardware is touched (spec §6 error list).
pub enum AcquisitionRequest {
    CameraSync {
        ctx: CameraSyncContext,
        detectors: Vec<Arc<dyn Detector>>,
    },
    CameraSyncStage {
        ctx: CameraSyncStageContext,
        detectors: Vec<Arc<dyn Detector>>,
    },
    BeamSync { ctx: BeamSyncContext },
    StreamAccumulator { ctx: StreamAccumulatorContext },
}

impl AcquisitionRequest {
    /// Estimate total acquisition time without starting a real run (spec
    /// §6: `estimate_acquisition_time() -> seconds`), using the same leech
    /// `estimate()` hook the real run would drive through `LeechScheduler`.
    pub fn estimate_seconds(&self) -> f64 {
        match self {
            AcquisitionRequest::CameraSync { ctx, .. } => {
                let exposure = ctx.camera.exposure_time().unwrap_or(0.0);
                let readout = crate::acquisition::controller::readout_time(ctx.camera.as_ref());
                let t_pix = exposure + readout;
                let tot = ctx.rep.total() as f64;
                t_pix * tot + LeechScheduler::estimate_total(&ctx.leeches, t_pix, ctx.scanner.shape())
            }
            AcquisitionRequest::CameraSyncStage { ctx, .. } => {
                let exposure = ctx.camera.exposure_time().unwrap_or(0.0);
                let readout = crate::acquisition::controller::readout_time(ctx.camera.as_ref());
                let t_pix = exposure + readout;
                let tot = ctx.rep.total() as f64;
                t_pix * tot + LeechScheduler::estimate_total(&ctx.leeches, t_pix, ctx.scanner.shape())
            }
            AcquisitionRequest::BeamSync { ctx } => {
                let tot = ctx.rep.total() as f64;
                ctx.dwell_time * tot + LeechScheduler::estimate_total(&ctx.leeches, ctx.dwell_time, ctx.scanner.shape())
            }
            AcquisitionRequest::StreamAccumulator { ctx } => ctx.total_dwell,
        }
    }
}

/// Engine instance. Cloneable; clones share the same busy flag and `raw`
/// channel, matching "engine itself is the long-lived object" (spec §9).
#[derive(Clone)]
pub struct AcquisitionEngine {
    busy: Arc<AtomicBool>,
    raw: Arc<RwLock<Vec<DataArray>>>,
}

impl AcquisitionEngine {
    pub fn new() -> Self {
        Self {
            busy: Arc::new(AtomicBool::new(false)),
            raw: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Observable list of assembled `DataArray`s, populated on success only
    /// (spec §6: "raw — observable list of assembled DataArrays, populated
    /// on success only").
    pub async fn raw(&self) -> Vec<DataArray> {
        self.raw.read().await.clone()
    }

    /// Estimate total time for `request` without running it.
    pub fn estimate_acquisition_time(&self, request: &AcquisitionRequest) -> f64 {
        request.estimate_seconds()
    }

    /// Start `request`. Fails with `Busy` if another acquisition is already
    /// running on this engine instance (spec §3: "Exactly one Acquisition
    /// may be RUNNING per engine instance").
    pub async fn acquire(&self, request: AcquisitionRequest) -> AcqResult<ProgressiveFuture<Vec<DataArray>>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AcqError::Busy);
        }

        let cancel = CancellationHandle::new();
        cancel.set_state(AcqState::Running);

        let (progress_tx, progress_rx) = watch::channel(None::<ProgressUpdate>);
        let (result_tx, result_rx) = oneshot::channel();

        let busy = self.busy.clone();
        let raw = self.raw.clone();
        let worker_cancel = cancel.clone();

        tokio::spawn(async move {
            let result = run_request(request, &worker_cancel, &progress_tx).await;

            match &result {
                Ok(data) => {
                    *raw.write().await = data.clone();
                    worker_cancel.set_state(AcqState::Finished);
                }
                Err(_) => {
                    raw.write().await.clear();
                    if worker_cancel.state() != AcqState::Cancelled {
                        worker_cancel.set_state(AcqState::Finished);
                    }
                }
            }

            busy.store(false, Ordering::SeqCst);
            let _ = result_tx.send(result);
        });

        Ok(ProgressiveFuture::new(cancel, progress_rx, result_rx))
    }
}

impl Default for AcquisitionEngine {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_request(
    request: AcquisitionRequest,
    cancel: &CancellationHandle,
    progress_tx: &watch::Sender<Option<ProgressUpdate>>,
) -> AcqResult<Vec<DataArray>> {
    match request {
        AcquisitionRequest::CameraSync { ctx, detectors } => {
            camera_sync::run(&ctx, &detectors, cancel, progress_tx).await
        }
        AcquisitionRequest::CameraSyncStage { ctx, detectors } => {
            camera_sync_stage::run(&ctx, &detectors, cancel, progress_tx).await
        }
        AcquisitionRequest::BeamSync { ctx } => beam_sync::run(&ctx, cancel, progress_tx).await,
        AcquisitionRequest::StreamAccumulator { ctx } => {
            stream_accumulator::run(&ctx, cancel, progress_tx).await.map(|d| vec![d])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_fails_busy_while_first_is_running() {
        let engine = AcquisitionEngine::new();
        engine.busy.store(true, Ordering::SeqCst);

        let request = AcquisitionRequest::StreamAccumulator {
            ctx: StreamAccumulatorContext {
                detector: Arc::new(crate::acquisition::tests_support::NullDetector::default()),
                per_frame_dwell: 0.1,
                total_dwell: 0.1,
            },
        };
        let result = engine.acquire(request).await;
        assert!(matches!(result, Err(AcqError::Busy)));
    }
}
