//! CameraSync-Stage Controller — the mechanical-stage variant of
//! `camera_sync`: the beam is parked at the emitter's optical center and a
//! `ScanStage` is driven across `stage_grid` positions instead (spec §4.4).

use crate::acquisition::capabilities::{DriftCorrector, Leech, ScanStage, Scanner};
use crate::acquisition::controller::validate_camera_sync_detectors;
use crate::acquisition::data::{now_secs, DataArray, Repetition, Roi};
use crate::acquisition::error::{AcqError, AcqResult};
use crate::acquisition::grid::{linear_to_yx, stage_grid, stage_grid_at};
use crate::acquisition::leech::LeechScheduler;
use crate::acquisition::limits::*;
use crate::acquisition::progress::{estimate_end_time, CancellationHandle, ProgressUpdate};
use crate::acquisition::trigger::{recv_fresh_with_deadline, subscribe};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

pub struct CameraSyncStageContext {
    pub scanner: Arc<dyn Scanner>,
    pub stage: Arc<dyn ScanStage>,
    pub primary: Arc<dyn crate::acquisition::capabilities::Detector>,
    pub camera: Arc<dyn crate::acquisition::capabilities::Detector>,
    pub drift: Option<Arc<dyn DriftCorrector>>,
    pub leeches: Vec<Arc<dyn Leech>>,
    pub roi: Roi,
    pub rep: Repetition,
    pub stage_center: (f64, f64),
    pub x_axis: String,
    pub y_axis: String,
    pub settings: crate::acquisition::limits::AcquisitionSettings,
}

/// Run a full `CameraSync` acquisition with the stage driving position
/// instead of the beam. The beam's translation is set to `(0, 0)` once at
/// the start and never touched again (spec §4.4: "beam fixed at origin").
pub async fn run(
    ctx: &CameraSyncStageContext,
    detectors: &[Arc<dyn crate::acquisition::capabilities::Detector>],
    cancel: &CancellationHandle,
    progress_tx: &watch::Sender<Option<ProgressUpdate>>,
) -> AcqResult<Vec<DataArray>> {
    validate_camera_sync_detectors(detectors)?;

    let axes = ctx.stage.axes();
    let grid = stage_grid(
        ctx.roi,
        ctx.rep,
        (
            ctx.scanner.shape().0 as f64 * ctx.scanner.pixel_size().0,
            ctx.scanner.shape().1 as f64 * ctx.scanner.pixel_size().1,
        ),
        ctx.stage_center,
        &axes,
    )?;
    let tot = ctx.rep.total();

    ctx.scanner.set_translation((0.0, 0.0)).await?;

    let exposure = ctx.camera.exposure_time().unwrap_or(0.0);
    let readout = crate::acquisition::controller::readout_time(ctx.camera.as_ref());
    let t_pix = exposure + readout;

    let mut leech_scheduler = LeechScheduler::start(&ctx.leeches, t_pix, ctx.scanner.shape()).await?;

    let pixel_result =
        run_pixels(ctx, cancel, progress_tx, &grid, tot, t_pix, &mut leech_scheduler).await;

    // On final exit, success or failure, the stage returns to the center
    // of its axis range (spec §4.4), not to the acquisition's reference
    // `stage_center` — those coincide only when the stage happens to be
    // centered in its travel.
    let mut park = HashMap::new();
    let park_x = axes.get(&ctx.x_axis).map(|(lo, hi)| (lo + hi) / 2.0).unwrap_or(ctx.stage_center.0);
    let park_y = axes.get(&ctx.y_axis).map(|(lo, hi)| (lo + hi) / 2.0).unwrap_or(ctx.stage_center.1);
    park.insert(ctx.x_axis.clone(), park_x);
    park.insert(ctx.y_axis.clone(), park_y);
    if let Err(err) = ctx.stage.move_absolute(park).await {
        tracing::warn!(error = %err, "failed to park stage back to axis range center");
    }

    let (primary_pixels, camera_pixels) = pixel_result?;

    let mut out = vec![
        crate::acquisition::assembler::assemble_flat(
            &primary_pixels,
            ctx.rep,
            ctx.roi,
            (
                ctx.scanner.shape().0 as f64 * ctx.scanner.pixel_size().0,
                ctx.scanner.shape().1 as f64 * ctx.scanner.pixel_size().1,
            ),
            "Primary detector",
        )?,
        crate::acquisition::assembler::assemble_flat(
            &camera_pixels,
            ctx.rep,
            ctx.roi,
            (
                ctx.scanner.shape().0 as f64 * ctx.scanner.pixel_size().0,
                ctx.scanner.shape().1 as f64 * ctx.scanner.pixel_size().1,
            ),
            "Camera",
        )?,
    ];

    let all_data: Vec<DataArray> = primary_pixels.into_iter().chain(camera_pixels).collect();
    leech_scheduler.complete_all(&all_data).await;

    if let Some(drift) = &ctx.drift {
        let anchor_raw = drift.anchor_raw().await;
        if !anchor_raw.is_empty() {
            out.push(crate::acquisition::assembler::assemble_anchor(&anchor_raw)?);
        }
    }

    Ok(out)
}

/// Drive the per-pixel loop. Split out of `run` so the stage-parking step
/// can run unconditionally afterward, on both the success and error paths
/// (spec §4.4, §7: "On any fatal path the engine guarantees ... stage
/// parked").
#[allow(clippy::too_many_arguments)]
async fn run_pixels(
    ctx: &CameraSyncStageContext,
    cancel: &CancellationHandle,
    progress_tx: &watch::Sender<Option<ProgressUpdate>>,
    grid: &ndarray::Array3<f64>,
    tot: usize,
    t_pix: f64,
    leech_scheduler: &mut LeechScheduler,
) -> AcqResult<(Vec<DataArray>, Vec<DataArray>)> {
    let mut primary_pixels: Vec<DataArray> = Vec::with_capacity(tot);
    let mut camera_pixels: Vec<DataArray> = Vec::with_capacity(tot);
    let mut sum_elapsed = Duration::ZERO;

    let mut last_target: Option<(f64, f64)> = None;

    for n in 0..tot {
        cancel.check()?;
        let (iy, ix) = linear_to_yx(n, ctx.rep);
        let (tx, ty) = stage_grid_at(&grid, iy, ix);

        let drift = match &ctx.drift {
            Some(d) => d.cumulative_drift().await,
            None => (0.0, 0.0),
        };
        // The drift corrector reports drift in beam pixels (spec §3); the
        // stage grid is in meters, so convert before combining (spec §4.4:
        // "moved to stage_grid[i] - drift_in_meters").
        let px = ctx.scanner.pixel_size();
        let drift_m = (drift.0 * px.0, drift.1 * px.1);
        let target = (tx - drift_m.0, ty + drift_m.1);

        // Elide the move entirely if this axis pair is unchanged from the
        // previous pixel (spec §4.4: "unchanged-axis move elision").
        let pixel_start = Instant::now();
        if last_target != Some(target) {
            let mut dest = HashMap::new();
            dest.insert(ctx.x_axis.clone(), target.0);
            dest.insert(ctx.y_axis.clone(), target.1);
            ctx.stage.move_absolute(dest).await?;
            last_target = Some(target);
        }

        let t_start = now_secs();
        let mut primary_sub = subscribe(0, ctx.primary.as_ref()).await?;
        let mut camera_sub = subscribe(1, ctx.camera.as_ref()).await?;

        tokio::time::sleep(ctx.settings.settle_time()).await;

        if let Some(trig) = ctx.camera.software_trigger() {
            trig.notify();
        } else {
            let _ = ctx.primary.unsubscribe().await;
            let _ = ctx.camera.unsubscribe().await;
            return Err(AcqError::Validation(
                "camera detector has no software trigger".into(),
            ));
        }

        let hard_deadline = scaled_deadline(t_pix, PIXEL_TIMEOUT_MULTIPLIER, PIXEL_TIMEOUT_ADDEND);
        let camera_sample =
            recv_fresh_with_deadline(&mut camera_sub.receiver, hard_deadline, t_start, "camera completion", cancel)
                .await;
        let camera_sample = match camera_sample {
            Ok(sample) => sample,
            Err(err) => {
                let _ = ctx.primary.unsubscribe().await;
                let _ = ctx.camera.unsubscribe().await;
                return Err(err);
            }
        };

        let primary_deadline = scaled_deadline(t_pix, PRIMARY_TIMEOUT_MULTIPLIER, PRIMARY_TIMEOUT_ADDEND);
        let primary_sample = match recv_fresh_with_deadline(
            &mut primary_sub.receiver,
            primary_deadline,
            t_start,
            "primary detector completion",
            cancel,
        )
        .await
        {
            Ok(sample) => sample,
            Err(err) => {
                let _ = ctx.primary.unsubscribe().await;
                let _ = ctx.camera.unsubscribe().await;
                return Err(err);
            }
        };

        let _ = ctx.primary.unsubscribe().await;
        let _ = ctx.camera.unsubscribe().await;

        let mut camera_sample = camera_sample;
        camera_sample.set_position(target);

        primary_pixels.push(primary_sample);
        camera_pixels.push(camera_sample);

        sum_elapsed += pixel_start.elapsed();
        if n >= 1 {
            let leech_remaining = Duration::from_secs_f64(
                LeechScheduler::estimate_total(&ctx.leeches, t_pix, ctx.scanner.shape()),
            );
            let end = estimate_end_time(sum_elapsed, n + 1, tot, leech_remaining);
            let _ = progress_tx.send(Some(ProgressUpdate {
                pixels_done: n + 1,
                pixels_total: tot,
                estimated_end: end,
            }));
        }

        let latest = vec![primary_pixels.last().unwrap().clone(), camera_pixels.last().unwrap().clone()];
        leech_scheduler.tick(&latest).await?;
    }

    cancel.check()?;

    Ok((primary_pixels, camera_pixels))
}
