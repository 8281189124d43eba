//! BeamSync Controller — one or more detectors that free-run synchronized
//! to the beam's own raster clock, driven in rectangular blocks sized by
//! the leech schedule rather than one pixel at a time (spec §4.5).

use crate::acquisition::capabilities::{Detector, Leech, Scanner};
use crate::acquisition::controller::validate_beam_sync_detectors;
use crate::acquisition::data::{now_secs, DataArray, Repetition, Roi};
use crate::acquisition::error::{AcqError, AcqResult};
use crate::acquisition::leech::LeechScheduler;
use crate::acquisition::limits::*;
use crate::acquisition::progress::{estimate_end_time, CancellationHandle, ProgressUpdate};
use crate::acquisition::trigger::{recv_fresh_with_deadline, subscribe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

pub struct BeamSyncContext {
    pub scanner: Arc<dyn Scanner>,
    pub detectors: Vec<Arc<dyn Detector>>,
    pub leeches: Vec<Arc<dyn Leech>>,
    pub roi: Roi,
    pub rep: Repetition,
    pub dwell_time: f64,
}

/// Drive the whole grid in rectangular blocks whose row-count is capped by
/// the nearest leech's countdown, so a leech never fires mid-block (spec
/// §4.5: "ask each leech for its next-fire distance, take the minimum
/// across all leeches, and never drive a block larger than that many
/// rows"). All detectors share the single beam-driven software trigger;
/// there is no per-pixel retry loop because the beam clock itself is the
/// timing source.
pub async fn run(
    ctx: &BeamSyncContext,
    cancel: &CancellationHandle,
    progress_tx: &watch::Sender<Option<ProgressUpdate>>,
) -> AcqResult<Vec<DataArray>> {
    validate_beam_sync_detectors(&ctx.detectors)?;

    let rows_total = ctx.rep.rep_y as usize;
    let cols = ctx.rep.rep_x;
    let dwell = ctx
        .scanner
        .dwell_range()
        .0
        .max(ctx.dwell_time)
        .min(ctx.scanner.dwell_range().1);
    if (dwell - ctx.dwell_time).abs() > 1e-12 {
        tracing::debug!(requested = ctx.dwell_time, clipped = dwell, "dwell time clipped to scanner range");
    }
    ctx.scanner.set_dwell_time(dwell).await?;

    let mut leech_scheduler =
        LeechScheduler::start(&ctx.leeches, dwell, ctx.scanner.shape()).await?;

    let mut per_detector_blocks: Vec<Vec<DataArray>> = vec![Vec::new(); ctx.detectors.len()];
    let mut rows_done = 0usize;
    let mut sum_elapsed = Duration::ZERO;

    while rows_done < rows_total {
        cancel.check()?;

        let budget = leech_scheduler.min_remaining().unwrap_or(u64::MAX);
        let remaining_rows = (rows_total - rows_done) as u64;
        let block_rows = budget.max(1).min(remaining_rows) as u32;

        let block_roi = Roi::new(
            ctx.roi.left,
            ctx.roi.top + ctx.roi.height() * (rows_done as f64 / rows_total as f64),
            ctx.roi.right,
            ctx.roi.top + ctx.roi.height() * ((rows_done + block_rows as usize) as f64 / rows_total as f64),
        );

        ctx.scanner.set_resolution((cols, block_rows)).await?;
        ctx.scanner.set_scale((block_roi.width(), block_roi.height())).await?;
        let translation = (
            ctx.scanner.shape().0 as f64 * (block_roi.left + block_roi.width() / 2.0 - 0.5),
            ctx.scanner.shape().1 as f64 * (block_roi.top + block_roi.height() / 2.0 - 0.5),
        );
        ctx.scanner.set_translation(translation).await?;

        let t_start = now_secs();
        let mut subscribers = Vec::with_capacity(ctx.detectors.len());
        for (i, detector) in ctx.detectors.iter().enumerate() {
            subscribers.push(subscribe(i, detector.as_ref()).await?);
        }

        tokio::time::sleep(BEAM_SETTLE_TIME).await;

        let trigger = ctx
            .detectors
            .first()
            .and_then(|d| d.software_trigger())
            .ok_or_else(|| AcqError::Validation("no beam-driving detector exposes a software trigger".into()))?;
        trigger.notify();

        let frame_time = dwell * block_rows as f64 * cols as f64;
        let block_deadline = scaled_deadline(frame_time, BEAM_BLOCK_TIMEOUT_MULTIPLIER, BEAM_BLOCK_TIMEOUT_ADDEND)
            .max(BEAM_BLOCK_TIMEOUT_FLOOR);

        let block_start = Instant::now();
        let mut failed = None;
        for (i, sub) in subscribers.iter_mut().enumerate() {
            match recv_fresh_with_deadline(&mut sub.receiver, block_deadline, t_start, "beam-sync block", cancel).await
            {
                Ok(sample) => per_detector_blocks[i].push(sample),
                Err(err) => {
                    failed = Some(err);
                    break;
                }
            }
        }

        for detector in &ctx.detectors {
            let _ = detector.unsubscribe().await;
        }

        if let Some(err) = failed {
            return Err(err);
        }

        sum_elapsed += block_start.elapsed();
        rows_done += block_rows as usize;

        if rows_done > block_rows as usize {
            let leech_remaining =
                Duration::from_secs_f64(LeechScheduler::estimate_total(&ctx.leeches, dwell, ctx.scanner.shape()));
            let end = estimate_end_time(sum_elapsed, rows_done, rows_total, leech_remaining);
            let _ = progress_tx.send(Some(ProgressUpdate {
                pixels_done: rows_done * cols as usize,
                pixels_total: rows_total * cols as usize,
                estimated_end: end,
            }));
        }

        let last_samples: Vec<DataArray> = per_detector_blocks.iter().filter_map(|b| b.last().cloned()).collect();
        leech_scheduler.advance(block_rows as u64, &last_samples).await?;
    }

    cancel.check()?;

    let mut out = Vec::with_capacity(ctx.detectors.len());
    for (i, blocks) in per_detector_blocks.into_iter().enumerate() {
        let description = ctx.detectors[i].role().to_string();
        out.push(crate::acquisition::assembler::concat_leading(blocks).map_err(|e| {
            AcqError::Validation(format!("failed to concatenate blocks for '{description}': {e}"))
        })?);
    }

    let all_data: Vec<DataArray> = out.clone();
    leech_scheduler.complete_all(&all_data).await;

    Ok(out)
}
