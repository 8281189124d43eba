//! Trigger/Subscription Layer — manages per-detector subscription, software
//! triggers, completion events, and unsubscription on all exit paths
//! (spec §2 item 3).
//!
//! The original source closes over per-detector indices in callback
//! closures; here each detector gets an explicit `Subscriber` record
//! carrying its index, a single-shot completion signal, and the receiving
//! half of its data channel, so state shared with the controller is
//! reached through a handle rather than lexical capture (spec §9).

use crate::acquisition::capabilities::{Detector, FrameSink};
use crate::acquisition::data::DataArray;
use crate::acquisition::error::{AcqError, AcqResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// Single-shot completion signal, set by the receive side when a detector's
/// data for the current pixel has arrived, cleared at the top of every
/// pixel (spec §5: "Per-detector completion events are single-shot, set by
/// the receive callback, cleared at the top of each pixel").
#[derive(Debug, Default)]
pub struct CompletionSignal {
    fired: AtomicBool,
    notify: Notify,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.fired.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn clear(&self) {
        self.fired.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Wait until set or `timeout` elapses. Returns `Ok(())` if set,
    /// `Err(AcqError::Timeout)` otherwise.
    pub async fn wait(&self, timeout: Duration, what: &str) -> AcqResult<()> {
        if self.is_set() {
            return Ok(());
        }
        let notified = self.notify.notified();
        tokio::select! {
            _ = notified => Ok(()),
            _ = tokio::time::sleep(timeout) => {
                if self.is_set() {
                    Ok(())
                } else {
                    Err(AcqError::Timeout(timeout, what.to_string()))
                }
            }
        }
    }
}

/// Per-detector subscription handle: index within the controller's
/// detector list, completion signal, and the receiving half of the channel
/// the detector pushes `DataArray`s into.
pub struct Subscriber {
    pub index: usize,
    pub completion: Arc<CompletionSignal>,
    pub receiver: mpsc::Receiver<DataArray>,
}

/// Subscribe `detector` and return a `Subscriber` wired to a fresh channel.
/// The channel is bounded to one in-flight pixel's worth of data per
/// detector to keep memory pressure bounded on very large grids (spec §1).
pub async fn subscribe(index: usize, detector: &dyn Detector) -> AcqResult<Subscriber> {
    let (tx, rx): (FrameSink, _) = mpsc::channel(4);
    detector.subscribe(tx).await?;
    Ok(Subscriber {
        index,
        completion: Arc::new(CompletionSignal::new()),
        receiver: rx,
    })
}

/// Unsubscribe every detector in `detectors`, logging (not propagating) any
/// individual failure so teardown always runs to completion (spec §5:
/// "unsubscription on all exit paths").
pub async fn unsubscribe_all(detectors: &[Arc<dyn Detector>]) {
    for detector in detectors {
        if let Err(err) = detector.unsubscribe().await {
            tracing::warn!(role = detector.role(), error = %err, "unsubscribe failed during teardown");
        }
    }
}

/// Await the next sample on `receiver`, racing a deadline and cancellation.
/// Stale samples (predating `t_start`) are silently skipped and the wait
/// continues against the same deadline, matching spec §4.3's "Dropping
/// stale data" (no re-notify, per the open question preserved in spec §9).
pub async fn recv_fresh_with_deadline(
    receiver: &mut mpsc::Receiver<DataArray>,
    deadline: Duration,
    t_start: f64,
    what: &str,
    cancel: &crate::acquisition::progress::CancellationHandle,
) -> AcqResult<DataArray> {
    let sleep = tokio::time::sleep(deadline);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AcqError::Cancelled),
            sample = receiver.recv() => {
                match sample {
                    Some(sample) if is_fresh(&sample, t_start) => return Ok(sample),
                    Some(_) => continue,
                    None => return Err(AcqError::IoError(format!("{what} channel closed"))),
                }
            }
            _ = &mut sleep => return Err(AcqError::Timeout(deadline, what.to_string())),
        }
    }
}

/// Drop any sample whose `acquisition-date` predates `t_start` (spec §4.3:
/// "Dropping stale data"). Returns `true` if the sample should be kept.
pub fn is_fresh(sample: &DataArray, t_start: f64) -> bool {
    match sample.acquisition_date() {
        Some(date) if date < t_start => {
            tracing::warn!(date, t_start, "dropping stale sample (predates trigger)");
            false
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completion_signal_wait_returns_immediately_once_set() {
        let signal = CompletionSignal::new();
        signal.set();
        signal.wait(Duration::from_millis(10), "test").await.unwrap();
    }

    #[tokio::test]
    async fn completion_signal_wait_times_out_when_never_set() {
        let signal = CompletionSignal::new();
        let result = signal.wait(Duration::from_millis(20), "test").await;
        assert!(matches!(result, Err(AcqError::Timeout(_, _))));
    }

    #[tokio::test]
    async fn completion_signal_wait_wakes_on_concurrent_set() {
        let signal = Arc::new(CompletionSignal::new());
        let setter = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            setter.set();
        });
        signal
            .wait(Duration::from_secs(1), "test")
            .await
            .expect("should wake before the long timeout");
    }

    #[test]
    fn stale_sample_is_rejected() {
        let mut arr = DataArray::new(ndarray::ArrayD::zeros(ndarray::IxDyn(&[1])));
        arr.set_acquisition_date(10.0);
        assert!(!is_fresh(&arr, 20.0));
        arr.set_acquisition_date(30.0);
        assert!(is_fresh(&arr, 20.0));
    }
}
