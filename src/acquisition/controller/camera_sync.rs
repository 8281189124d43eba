//! CameraSync Controller — SEM beam + camera detector, per-pixel trigger
//! loop with retry (spec §4.3).

use crate::acquisition::capabilities::{DriftCorrector, Leech, Scanner};
use crate::acquisition::controller::validate_camera_sync_detectors;
use crate::acquisition::data::{now_secs, DataArray, Repetition, Roi};
use crate::acquisition::error::{AcqError, AcqResult};
use crate::acquisition::grid::{beam_grid, beam_grid_at, linear_to_yx};
use crate::acquisition::leech::LeechScheduler;
use crate::acquisition::limits::*;
use crate::acquisition::progress::{estimate_end_time, CancellationHandle, ProgressUpdate};
use crate::acquisition::trigger::{self, recv_fresh_with_deadline, subscribe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Everything `run` needs: hardware handles, grid, settings and the
/// optional drift corrector / preprocessing hook. Built by the engine
/// facade from validated user input.
pub struct CameraSyncContext {
    pub scanner: Arc<dyn Scanner>,
    pub primary: Arc<dyn crate::acquisition::capabilities::Detector>,
    pub camera: Arc<dyn crate::acquisition::capabilities::Detector>,
    pub drift: Option<Arc<dyn DriftCorrector>>,
    pub leeches: Vec<Arc<dyn Leech>>,
    pub roi: Roi,
    pub rep: Repetition,
    pub settings: crate::acquisition::limits::AcquisitionSettings,
    /// Optional per-pixel postprocessing hook invoked after metadata
    /// patching (spec §4.3 step 11, supplemented per SPEC_FULL.md §B).
    pub preprocess: Option<Box<dyn Fn(&mut DataArray) + Send + Sync>>,
}

/// Outcome of driving one grid pixel.
struct PixelResult {
    primary: DataArray,
    camera: DataArray,
}

/// Run a full `CameraSync` acquisition. Returns `[primary_image,
/// camera_image]`, plus an anchor stack appended if a drift corrector is
/// present (spec §4.3 "Completion").
pub async fn run(
    ctx: &CameraSyncContext,
    detectors: &[Arc<dyn crate::acquisition::capabilities::Detector>],
    cancel: &CancellationHandle,
    progress_tx: &watch::Sender<Option<ProgressUpdate>>,
) -> AcqResult<Vec<DataArray>> {
    validate_camera_sync_detectors(detectors)?;

    let exposure = ctx.camera.exposure_time().unwrap_or(0.0);
    let readout = crate::acquisition::controller::readout_time(ctx.camera.as_ref());
    let t_pix = exposure + readout;

    let grid = beam_grid(ctx.roi, ctx.rep, ctx.scanner.shape());
    let tot = ctx.rep.total();

    let fuzz_shape = configure_fuzzing(ctx, t_pix).await?;

    let mut leech_scheduler = LeechScheduler::start(&ctx.leeches, t_pix, ctx.scanner.shape()).await?;

    let mut primary_pixels: Vec<DataArray> = Vec::with_capacity(tot);
    let mut camera_pixels: Vec<DataArray> = Vec::with_capacity(tot);

    let mut sum_elapsed = Duration::ZERO;
    let run_start = Instant::now();

    for n in 0..tot {
        cancel.check()?;
        let (iy, ix) = linear_to_yx(n, ctx.rep);
        let (tx, ty) = beam_grid_at(&grid, iy, ix);

        let drift = match &ctx.drift {
            Some(d) => d.cumulative_drift().await,
            None => (0.0, 0.0),
        };
        let requested = (tx - drift.0, ty - drift.1);

        let pixel_start = Instant::now();
        let result = drive_one_pixel(ctx, requested, t_pix, n, (iy, ix), cancel).await?;

        // Step 11: patch camera position from the primary's reported
        // position plus drift * subpixel-size (Y inverted), then run the
        // preprocess hook.
        let mut camera_sample = result.camera;
        if let Some(primary_pos) = result.primary.position() {
            let px = ctx.scanner.pixel_size();
            camera_sample.set_position((
                primary_pos.0 + drift.0 * px.0,
                primary_pos.1 - drift.1 * px.1,
            ));
        }
        if let Some(preprocess) = &ctx.preprocess {
            preprocess(&mut camera_sample);
        }

        primary_pixels.push(result.primary);
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

        // Step 13: drive leeches after the pixel they elected to fire on.
        let latest = vec![primary_pixels.last().unwrap().clone(), camera_pixels.last().unwrap().clone()];
        leech_scheduler.tick(&latest).await?;
    }

    tracing::info!(elapsed = ?run_start.elapsed(), tot, "camera-sync acquisition finished");

    cancel.check()?;

    let emitter_fov = (
        ctx.scanner.shape().0 as f64 * ctx.scanner.pixel_size().0,
        ctx.scanner.shape().1 as f64 * ctx.scanner.pixel_size().1,
    );

    let primary_image = if fuzz_shape == (1, 1) {
        crate::acquisition::assembler::assemble_flat(&primary_pixels, ctx.rep, ctx.roi, emitter_fov, "Primary detector")?
    } else {
        crate::acquisition::assembler::assemble_tiled(
            &primary_pixels,
            ctx.rep,
            ctx.roi,
            emitter_fov,
            "Primary detector",
        )?
    };

    let mut out = vec![
        primary_image,
        crate::acquisition::assembler::assemble_flat(&camera_pixels, ctx.rep, ctx.roi, emitter_fov, "Camera")?,
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

/// Drive the retry loop for one grid pixel (spec §4.3 steps 1-9): set
/// translation, subscribe primaries, settle, trigger the camera, wait for
/// both, unsubscribe. Retries up to `MAX_PIXEL_RETRIES` times on timeout or
/// an exposure that completed suspiciously fast.
async fn drive_one_pixel(
    ctx: &CameraSyncContext,
    requested_translation: (f64, f64),
    t_pix: f64,
    pixel_index: usize,
    grid_pos: (usize, usize),
    cancel: &CancellationHandle,
) -> AcqResult<PixelResult> {
    let mut attempts = 0u32;

    loop {
        cancel.check()?;
        attempts += 1;

        // Step 1: set translation, logging any clip that isn't the drift
        // correction itself.
        let applied = ctx.scanner.set_translation(requested_translation).await?;
        if (applied.0 - requested_translation.0).abs() > 1e-12
            || (applied.1 - requested_translation.1).abs() > 1e-12
        {
            tracing::debug!(
                ?requested_translation,
                ?applied,
                "scanner clipped translation"
            );
        }

        // Step 2: record t_start, step 3: subscribe primaries.
        let t_start = now_secs();
        let mut primary_sub = subscribe(0, ctx.primary.as_ref()).await?;
        let mut camera_sub = subscribe(1, ctx.camera.as_ref()).await?;

        // Step 4: settle sleep.
        tokio::time::sleep(ctx.settings.settle_time()).await;

        // Step 5: notify the camera's software trigger.
        if let Some(trig) = ctx.camera.software_trigger() {
            trig.notify();
        } else {
            ctx.primary.unsubscribe().await.ok();
            ctx.camera.unsubscribe().await.ok();
            return Err(AcqError::Validation(
                "camera detector has no software trigger".into(),
            ));
        }

        let attempt_start = Instant::now();

        // Step 6: wait for the camera, first against t_pix + slack, then
        // polling up to the hard 3*t_pix + 5s deadline.
        let first_wait = Duration::from_secs_f64(t_pix) + CAMERA_WAIT_SLACK;
        let hard_deadline = scaled_deadline(t_pix, PIXEL_TIMEOUT_MULTIPLIER, PIXEL_TIMEOUT_ADDEND);

        let camera_result = wait_camera(&mut camera_sub.receiver, t_start, first_wait, hard_deadline, cancel).await;

        let (camera_sample, elapsed_ok) = match camera_result {
            Ok(sample) => {
                let elapsed = attempt_start.elapsed().as_secs_f64();
                (Some(sample), elapsed >= TOO_FAST_FRACTION * t_pix)
            }
            Err(AcqError::Cancelled) => {
                unsubscribe_pixel(ctx).await;
                return Err(AcqError::Cancelled);
            }
            Err(_) => (None, false),
        };

        if camera_sample.is_none() || !elapsed_ok {
            // Step 7: failure. Unsubscribe everything, sleep, retry.
            unsubscribe_pixel(ctx).await;
            if attempts >= ctx.settings.max_pixel_retries {
                return Err(AcqError::SyncFailure {
                    attempts,
                    pixel: grid_pos,
                });
            }
            tokio::time::sleep(ctx.settings.retry_sleep()).await;
            continue;
        }

        // Step 8: wait for the primary detector.
        let sem_time = 1.0 / ctx.scanner.shape().0.max(1) as f64;
        let primary_deadline =
            scaled_deadline(sem_time, PRIMARY_TIMEOUT_MULTIPLIER, PRIMARY_TIMEOUT_ADDEND);
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
            Err(AcqError::Cancelled) => {
                unsubscribe_pixel(ctx).await;
                return Err(AcqError::Cancelled);
            }
            Err(err) => {
                unsubscribe_pixel(ctx).await;
                return Err(err);
            }
        };

        // Step 9: unsubscribe primaries (camera was already unsubscribed
        // implicitly once its sample arrived; unsubscribe both explicitly
        // for symmetry with the failure path).
        unsubscribe_pixel(ctx).await;

        // Step 10 is folded into the `cancel.check()?` at loop top of the
        // next pixel and the final check after the loop in `run`.
        let _ = primary_sub.index;
        let _ = camera_sub.index;
        let _ = pixel_index;

        return Ok(PixelResult {
            primary: primary_sample,
            camera: camera_sample.unwrap(),
        });
    }
}

async fn wait_camera(
    receiver: &mut tokio::sync::mpsc::Receiver<DataArray>,
    t_start: f64,
    first_wait: Duration,
    hard_deadline: Duration,
    cancel: &CancellationHandle,
) -> AcqResult<DataArray> {
    match recv_fresh_with_deadline(receiver, first_wait, t_start, "camera completion", cancel).await {
        Ok(sample) => Ok(sample),
        Err(AcqError::Timeout(_, _)) => {
            // Poll at 5ms granularity up to the hard deadline.
            let remaining = hard_deadline.saturating_sub(first_wait);
            let mut waited = Duration::ZERO;
            loop {
                cancel.check()?;
                if waited >= remaining {
                    return Err(AcqError::Timeout(hard_deadline, "camera completion".into()));
                }
                let step = CAMERA_POLL_INTERVAL.min(remaining - waited);
                match tokio::time::timeout(step, receiver.recv()).await {
                    Ok(Some(sample)) if trigger::is_fresh(&sample, t_start) => return Ok(sample),
                    Ok(Some(_)) => continue,
                    Ok(None) => return Err(AcqError::IoError("camera channel closed".into())),
                    Err(_) => waited += step,
                }
            }
        }
        Err(other) => Err(other),
    }
}

async fn unsubscribe_pixel(ctx: &CameraSyncContext) {
    let _ = ctx.primary.unsubscribe().await;
    let _ = ctx.camera.unsubscribe().await;
}

/// Configure the scanner for one macro-pixel's exposure window (spec §4.3
/// "Hardware setup"). When fuzzing is enabled and feasible, rasters a
/// `(ts, ts)` sub-grid during the exposure so the primary detector
/// averages out positioning noise over two full raster passes; `ts` is the
/// largest integer the scanner's dwell range and minimum scale both admit.
/// Otherwise configures spot mode: `scale=1, resolution=1x1,
/// dwell=clip(t_pix)`. Returns the tile shape the primary detector will
/// now produce per macro-pixel, `(1, 1)` in spot mode.
async fn configure_fuzzing(ctx: &CameraSyncContext, t_pix: f64) -> AcqResult<(u32, u32)> {
    if ctx.settings.fuzzing_enabled {
        let (dwell_min, dwell_max) = ctx.scanner.dwell_range();
        let min_scale = ctx.scanner.min_scale();

        let mut best: Option<u32> = None;
        for ts in 2..=32u32 {
            // Two full raster passes over ts*ts sub-positions within t_pix.
            let dwell = t_pix / (2.0 * (ts as f64).powi(2));
            let scale = ts as f64 * min_scale;
            if dwell >= dwell_min && dwell <= dwell_max && scale <= 1.0 {
                best = Some(ts);
            } else if best.is_some() {
                break;
            }
        }

        if let Some(ts) = best {
            let dwell = t_pix / (2.0 * (ts as f64).powi(2));
            ctx.scanner.set_scale((ts as f64 * min_scale, ts as f64 * min_scale)).await?;
            ctx.scanner.set_resolution((ts, ts)).await?;
            ctx.scanner.set_dwell_time(dwell).await?;
            return Ok((ts, ts));
        }
    }

    ctx.scanner.set_scale((1.0, 1.0)).await?;
    ctx.scanner.set_resolution((1, 1)).await?;
    ctx.scanner.set_dwell_time(t_pix).await?;
    Ok((1, 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::tests_support::MockScanner;

    // Scenario 2 (spec §8): ROI=(0.25,0.25,0.75,0.75), rep=(3,3), fuzzing
    // enabled, camera exposure 0.2s, emitter dwell-range [1e-6, 1e-3].
    // Expect scale=(s,s), resolution=(ts,ts) with ts>=2.
    #[tokio::test]
    async fn fuzzing_picks_a_feasible_sub_grid_when_enabled() {
        let scanner = MockScanner {
            dwell_range: (1e-6, 1e-3),
            ..MockScanner::default()
        };
        let ctx = test_ctx(&scanner, 0.2, true);
        let (ts_x, ts_y) = configure_fuzzing(&ctx, 0.2).await.unwrap();
        assert_eq!(ts_x, ts_y);
        assert!(ts_x >= 2, "expected a feasible sub-grid, got {ts_x}");
    }

    #[tokio::test]
    async fn fuzzing_falls_back_to_spot_mode_when_disabled() {
        let scanner = MockScanner::default();
        let ctx = test_ctx(&scanner, 0.0002, false);
        let shape = configure_fuzzing(&ctx, 0.0002).await.unwrap();
        assert_eq!(shape, (1, 1));
    }

    // Spec §8 "Drift application": with a mock drift-corrector reporting a
    // fixed cumulative (d_x, d_y) in pixels, the nth translation applied to
    // the scanner must equal `grid[n] - (d_x, d_y)`.
    #[tokio::test]
    async fn drift_application_shifts_every_translation_by_cumulative_drift() {
        use crate::acquisition::data::{Repetition, Roi};
        use crate::acquisition::grid::{beam_grid, beam_grid_at, linear_to_yx};
        use crate::acquisition::tests_support::{
            spawn_probe_responder, FireMode, FixedDriftLeech, ProbeDetector,
        };
        use crate::acquisition::capabilities::{DriftCorrector, Leech};

        let roi = Roi::new(0.0, 0.0, 1.0, 1.0);
        let rep = Repetition::new(2, 2);
        let scanner = Arc::new(MockScanner {
            shape: (100, 100),
            pixel_size: (1e-8, 1e-8),
            dwell_range: (1e-6, 1e-3),
            last_translation: tokio::sync::Mutex::new((0.0, 0.0)),
            translations: tokio::sync::Mutex::new(Vec::new()),
        });
        let primary = Arc::new(ProbeDetector::new("se", scanner.clone(), FireMode::OnSubscribe));
        let camera = Arc::new(
            ProbeDetector::new("ccd", scanner.clone(), FireMode::OnTrigger)
                .with_camera_timing(0.01, 0.0),
        );
        spawn_probe_responder(primary.clone());
        spawn_probe_responder(camera.clone());

        let drift_leech: Arc<FixedDriftLeech> = Arc::new(FixedDriftLeech::new(100, (2.0, 3.0)));
        let ctx = CameraSyncContext {
            scanner: scanner.clone(),
            primary: primary.clone(),
            camera: camera.clone(),
            drift: Some(drift_leech.clone() as Arc<dyn DriftCorrector>),
            leeches: vec![drift_leech.clone() as Arc<dyn Leech>],
            roi,
            rep,
            settings: crate::acquisition::limits::AcquisitionSettings {
                fuzzing_enabled: false,
                ..Default::default()
            },
            preprocess: None,
        };

        let detectors: Vec<Arc<dyn crate::acquisition::capabilities::Detector>> =
            vec![primary.clone(), camera.clone()];
        let cancel = CancellationHandle::new();
        let (progress_tx, _progress_rx) = tokio::sync::watch::channel(None);
        run(&ctx, &detectors, &cancel, &progress_tx).await.unwrap();

        let expected_grid = beam_grid(roi, rep, scanner.shape());
        let drift = drift_leech.cumulative_drift().await;
        let applied = scanner.translations.lock().await.clone();
        assert_eq!(applied.len(), rep.total());
        for (n, translation) in applied.iter().enumerate() {
            let (iy, ix) = linear_to_yx(n, rep);
            let (gx, gy) = beam_grid_at(&expected_grid, iy, ix);
            assert!((translation.0 - (gx - drift.0)).abs() < 1e-12);
            assert!((translation.1 - (gy - drift.1)).abs() < 1e-12);
        }
    }

    fn test_ctx(scanner: &MockScanner, exposure: f64, fuzzing_enabled: bool) -> CameraSyncContext {
        use crate::acquisition::data::Repetition;
        use crate::acquisition::tests_support::ProbeDetector;
        use crate::acquisition::tests_support::FireMode;
        use std::sync::Arc;

        // `test_ctx` only exercises `configure_fuzzing`, which never
        // touches the detectors; trivial probes are enough to populate the
        // context's required fields.
        let scanner = Arc::new(MockScanner {
            shape: scanner.shape,
            pixel_size: scanner.pixel_size,
            dwell_range: scanner.dwell_range,
            last_translation: tokio::sync::Mutex::new((0.0, 0.0)),
            translations: tokio::sync::Mutex::new(Vec::new()),
        });
        let primary = Arc::new(ProbeDetector::new("se", scanner.clone(), FireMode::OnSubscribe));
        let camera = Arc::new(ProbeDetector::new("ccd", scanner.clone(), FireMode::OnTrigger).with_camera_timing(exposure, 0.0));
        CameraSyncContext {
            scanner,
            primary,
            camera,
            drift: None,
            leeches: Vec::new(),
            roi: Roi::new(0.25, 0.25, 0.75, 0.75),
            rep: Repetition::new(3, 3),
            settings: crate::acquisition::limits::AcquisitionSettings {
                fuzzing_enabled,
                ..Default::default()
            },
            preprocess: None,
        }
    }
}
