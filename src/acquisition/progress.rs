//! Progress/Cancellation Core — a cancellable progressive future exposing
//! estimated-end-time updates (spec §2 item 7, §4.8).

use crate::acquisition::error::{AcqError, AcqResult};
use crate::acquisition::limits::{CANCEL_JOIN_TIMEOUT, PROGRESS_ADDEND, PROGRESS_PER_PIXEL_OVERHEAD_FRACTION};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::sync::{oneshot, watch, Notify};

/// Lifecycle state of one acquisition. Exactly one `Acquisition` may be
/// `Running` per engine instance (spec §3 invariants).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcqState {
    Idle,
    Running,
    Cancelled,
    Finished,
}

/// An estimated completion time, published as the worker progresses
/// through the grid (spec §4.8).
#[derive(Debug, Clone, Copy)]
pub struct ProgressUpdate {
    pub pixels_done: usize,
    pub pixels_total: usize,
    pub estimated_end: SystemTime,
}

/// Compute `t_left` and the resulting estimated end time from elapsed time,
/// pixel counters and remaining leech time (spec §4.8):
/// `t_left = (sum_elapsed / (n-1)) * (tot - n) + 0.001*tot + leech_remaining + 0.1s`.
///
/// The first pixel is skipped in the average (it is always slower) — callers
/// must not invoke this until `n >= 2`.
pub fn estimate_end_time(
    sum_elapsed: Duration,
    n: usize,
    tot: usize,
    leech_remaining: Duration,
) -> SystemTime {
    debug_assert!(n >= 2, "estimate_end_time requires at least 2 pixels done");
    let per_pixel = sum_elapsed.as_secs_f64() / (n - 1) as f64;
    let t_left = per_pixel * (tot.saturating_sub(n)) as f64
        + PROGRESS_PER_PIXEL_OVERHEAD_FRACTION * tot as f64
        + leech_remaining.as_secs_f64()
        + PROGRESS_ADDEND.as_secs_f64();
    SystemTime::now() + Duration::from_secs_f64(t_left.max(0.0))
}

/// Shared handle the worker task checks at every suspension point and
/// before every state transition (spec §5: "Cancellation semantics").
#[derive(Clone)]
pub struct CancellationHandle {
    inner: Arc<CancellationInner>,
}

struct CancellationInner {
    state: Mutex<AcqState>,
    cancelled: AtomicBool,
    wake: Notify,
}

impl CancellationHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationInner {
                state: Mutex::new(AcqState::Idle),
                cancelled: AtomicBool::new(false),
                wake: Notify::new(),
            }),
        }
    }

    pub fn state(&self) -> AcqState {
        *self.inner.state.lock().unwrap()
    }

    pub fn set_state(&self, state: AcqState) {
        *self.inner.state.lock().unwrap() = state;
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Check cancellation and convert it into `AcqError::Cancelled`;
    /// called at every suspension point per spec §5.
    pub fn check(&self) -> AcqResult<()> {
        if self.is_cancelled() {
            Err(AcqError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Request cancellation. Under the acquisition lock: if state is
    /// `Finished` return `false`; else set `Cancelled` and wake every
    /// blocked waiter so the worker cannot block (spec §4.8).
    pub fn cancel(&self) -> bool {
        let mut state = self.inner.state.lock().unwrap();
        if *state == AcqState::Finished {
            return false;
        }
        *state = AcqState::Cancelled;
        drop(state);
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.wake.notify_waiters();
        true
    }

    /// Resolves once cancellation has been requested, or immediately if it
    /// already has. Used by the worker to race against a blocking wait.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.inner.wake.notified().await;
    }
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A cancellable future whose estimated end-time can be updated while it
/// runs (spec §6: `acquire() -> ProgressiveFuture<list<DataArray>>`).
pub struct ProgressiveFuture<T> {
    cancel: CancellationHandle,
    progress_rx: watch::Receiver<Option<ProgressUpdate>>,
    result_rx: Option<oneshot::Receiver<AcqResult<T>>>,
}

impl<T> ProgressiveFuture<T> {
    pub fn new(
        cancel: CancellationHandle,
        progress_rx: watch::Receiver<Option<ProgressUpdate>>,
        result_rx: oneshot::Receiver<AcqResult<T>>,
    ) -> Self {
        Self {
            cancel,
            progress_rx,
            result_rx: Some(result_rx),
        }
    }

    /// Latest published progress, if any pixel has completed yet.
    pub fn progress(&self) -> Option<ProgressUpdate> {
        *self.progress_rx.borrow()
    }

    /// Request cancellation (spec §4.8). Returns `false` if the acquisition
    /// had already finished (cancellation idempotence, spec §8).
    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    /// Await the final result. Waits up to `CANCEL_JOIN_TIMEOUT` for the
    /// worker to exit after cancellation is requested elsewhere.
    pub async fn wait(mut self) -> AcqResult<T> {
        let rx = self
            .result_rx
            .take()
            .expect("ProgressiveFuture::wait called more than once");
        match tokio::time::timeout(CANCEL_JOIN_TIMEOUT * 2, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AcqError::IoError("worker task dropped its result sender".into())),
            Err(_) => Err(AcqError::Timeout(CANCEL_JOIN_TIMEOUT * 2, "worker task join".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_end_time_is_never_in_the_past() {
        let end = estimate_end_time(Duration::from_secs(2), 3, 10, Duration::from_secs(0));
        assert!(end >= SystemTime::now());
    }

    #[test]
    fn cancel_after_finished_returns_false_and_does_not_change_state() {
        let handle = CancellationHandle::new();
        handle.set_state(AcqState::Finished);
        assert!(!handle.cancel());
        assert_eq!(handle.state(), AcqState::Finished);
        assert!(!handle.is_cancelled());
    }

    #[test]
    fn cancel_while_running_transitions_to_cancelled() {
        let handle = CancellationHandle::new();
        handle.set_state(AcqState::Running);
        assert!(handle.cancel());
        assert_eq!(handle.state(), AcqState::Cancelled);
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_wakes_blocked_waiter() {
        let handle = CancellationHandle::new();
        handle.set_state(AcqState::Running);
        let waiter = handle.clone();
        let task = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("cancellation should wake the waiter promptly")
            .unwrap();
    }
}
