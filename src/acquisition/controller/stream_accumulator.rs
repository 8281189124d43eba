//! StreamAccumulator Controller — a push-driven detector that free-runs at
//! its own frame rate while the controller sums incoming frames until the
//! requested total dwell time is covered (spec §4.6).

use crate::acquisition::capabilities::Detector;
use crate::acquisition::data::{now_secs, DataArray};
use crate::acquisition::error::{AcqError, AcqResult};
use crate::acquisition::limits::*;
use crate::acquisition::progress::{estimate_end_time, CancellationHandle, ProgressUpdate};
use crate::acquisition::trigger::{recv_fresh_with_deadline, subscribe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

pub struct StreamAccumulatorContext {
    pub detector: Arc<dyn Detector>,
    /// Dwell time of a single frame the detector pushes, in seconds.
    pub per_frame_dwell: f64,
    /// Total requested integration time, in seconds.
    pub total_dwell: f64,
}

/// Accumulate frames pushed by `ctx.detector` until
/// `N = ceil(total_dwell / per_frame_dwell)` frames have been summed (spec
/// §4.6: "first-frame-init/subsequent-add accumulation"). Returns a single
/// `DataArray` whose values are the elementwise sum and whose metadata is
/// the last frame's, with `dwell-time` patched to the summed total (spec
/// §4.6: "dwell-time metadata is summed").
pub async fn run(
    ctx: &StreamAccumulatorContext,
    cancel: &CancellationHandle,
    progress_tx: &watch::Sender<Option<ProgressUpdate>>,
) -> AcqResult<DataArray> {
    if ctx.per_frame_dwell <= 0.0 {
        return Err(AcqError::Validation(
            "per-frame dwell time must be positive".into(),
        ));
    }
    let frames_needed = (ctx.total_dwell / ctx.per_frame_dwell).ceil().max(1.0) as usize;

    let t_start = now_secs();
    let mut sub = subscribe(0, ctx.detector.as_ref()).await?;

    if let Some(trigger) = ctx.detector.software_trigger() {
        trigger.notify();
    }

    let frame_deadline = scaled_deadline(
        ctx.per_frame_dwell,
        STREAM_FRAME_TIMEOUT_MULTIPLIER,
        STREAM_FRAME_TIMEOUT_ADDEND,
    );

    let mut accumulated: Option<DataArray> = None;
    let run_start = Instant::now();

    for frame_index in 0..frames_needed {
        cancel.check()?;
        let frame = match recv_fresh_with_deadline(&mut sub.receiver, frame_deadline, t_start, "stream frame", cancel)
            .await
        {
            Ok(frame) => frame,
            Err(err) => {
                let _ = ctx.detector.unsubscribe().await;
                return Err(err);
            }
        };

        accumulated = Some(match accumulated.take() {
            None => frame,
            Some(acc) => {
                if acc.values.shape() != frame.values.shape() {
                    tracing::warn!(
                        expected = ?acc.values.shape(),
                        got = ?frame.values.shape(),
                        frame_index,
                        "stream frame shape mismatch, dropping frame"
                    );
                    acc
                } else {
                    let mut acc = acc;
                    acc.values = acc.values + &frame.values;
                    acc.metadata = frame.metadata;
                    acc
                }
            }
        });

        if frame_index >= 1 {
            let per_frame = run_start.elapsed().as_secs_f64() / (frame_index + 1) as f64;
            let end = estimate_end_time(
                Duration::from_secs_f64(per_frame * (frame_index + 1) as f64),
                frame_index + 1,
                frames_needed,
                Duration::ZERO,
            );
            let _ = progress_tx.send(Some(ProgressUpdate {
                pixels_done: frame_index + 1,
                pixels_total: frames_needed,
                estimated_end: end,
            }));
        }
    }

    let _ = ctx.detector.unsubscribe().await;
    cancel.check()?;

    let mut result = accumulated.ok_or_else(|| AcqError::Validation("no frames accumulated".into()))?;
    result.metadata.insert(
        crate::acquisition::data::meta_keys::DWELL_TIME.to_string(),
        serde_json::json!(frames_needed as f64 * ctx.per_frame_dwell),
    );
    Ok(result)
}
