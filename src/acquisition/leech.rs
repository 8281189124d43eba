//! Leech Scheduler — interleaves periodic tasks (drift-correction anchor
//! acquisition) into the pixel loop, tracking a "pixels until next fire"
//! counter per leech (spec §2 item 4).

use crate::acquisition::capabilities::Leech;
use crate::acquisition::data::DataArray;
use crate::acquisition::error::AcqResult;
use std::sync::Arc;

/// Countdown state for one leech, paired with its handle.
struct Countdown {
    leech: Arc<dyn Leech>,
    remaining: u64,
}

/// Drives the countdown for every leech attached to an acquisition. Leeches
/// fire *after* the pixel they elected to fire on, never inside it (spec
/// §5: "Ordering guarantees").
pub struct LeechScheduler {
    countdowns: Vec<Countdown>,
}

impl LeechScheduler {
    /// Start every leech, capturing its initial countdown.
    pub async fn start(leeches: &[Arc<dyn Leech>], dt: f64, shape: (u32, u32)) -> AcqResult<Self> {
        let mut countdowns = Vec::with_capacity(leeches.len());
        for leech in leeches {
            let remaining = leech.start(dt, shape).await?;
            countdowns.push(Countdown {
                leech: leech.clone(),
                remaining,
            });
        }
        Ok(Self { countdowns })
    }

    /// Decrement every leech's countdown by one pixel; for every leech that
    /// reaches zero, invoke `next()` with the latest per-detector data and
    /// store the new countdown (spec §4.3 step 13).
    pub async fn tick(&mut self, latest_data: &[DataArray]) -> AcqResult<()> {
        for countdown in &mut self.countdowns {
            if countdown.remaining == 0 {
                countdown.remaining = countdown.leech.next(latest_data).await?;
            } else {
                countdown.remaining -= 1;
            }
        }
        Ok(())
    }

    /// Minimum countdown across every leech, used by `BeamSync` to size
    /// the next rectangular block (spec §4.5: "ask each leech for its
    /// next-fire distance, take the minimum across all leeches").
    pub fn min_remaining(&self) -> Option<u64> {
        self.countdowns.iter().map(|c| c.remaining).min()
    }

    /// Advance every leech's countdown by `n` pixels (used after driving a
    /// multi-pixel `BeamSync` block); any leech whose countdown would drop
    /// to or below zero fires immediately.
    pub async fn advance(&mut self, n: u64, latest_data: &[DataArray]) -> AcqResult<()> {
        for countdown in &mut self.countdowns {
            if countdown.remaining <= n {
                countdown.remaining = countdown.leech.next(latest_data).await?;
            } else {
                countdown.remaining -= n;
            }
        }
        Ok(())
    }

    /// Sum of `estimate()` across every leech, used for
    /// `estimate_acquisition_time()` without starting a real run.
    pub fn estimate_total(leeches: &[Arc<dyn Leech>], dt: f64, shape: (u32, u32)) -> f64 {
        leeches.iter().map(|l| l.estimate(dt, shape)).sum()
    }

    /// Call `complete()` on every leech exactly once (spec §8: "leech.complete
    /// is called exactly once"), regardless of whether the acquisition
    /// succeeded, was cancelled, or failed.
    pub async fn complete_all(&self, all_data: &[DataArray]) {
        for countdown in &self.countdowns {
            if let Err(err) = countdown.leech.complete(all_data).await {
                tracing::warn!(error = %err, "leech.complete failed during teardown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedIntervalLeech {
        interval: u64,
        fire_count: AtomicU32,
        complete_count: AtomicU32,
    }

    #[async_trait]
    impl Leech for FixedIntervalLeech {
        fn estimate(&self, _dt: f64, _shape: (u32, u32)) -> f64 {
            0.05
        }
        async fn start(&self, _dt: f64, _shape: (u32, u32)) -> AcqResult<u64> {
            Ok(self.interval)
        }
        async fn next(&self, _latest_data: &[DataArray]) -> AcqResult<u64> {
            self.fire_count.fetch_add(1, Ordering::SeqCst);
            Ok(self.interval)
        }
        async fn complete(&self, _all_data: &[DataArray]) -> AcqResult<()> {
            self.complete_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn leech_fires_exactly_every_k_pixels() {
        let leech = Arc::new(FixedIntervalLeech {
            interval: 3,
            fire_count: AtomicU32::new(0),
            complete_count: AtomicU32::new(0),
        });
        let leeches: Vec<Arc<dyn Leech>> = vec![leech.clone()];
        let mut scheduler = LeechScheduler::start(&leeches, 0.01, (10, 10)).await.unwrap();

        // 9 pixels with interval 3 should fire exactly 3 times.
        for _ in 0..9 {
            scheduler.tick(&[]).await.unwrap();
        }
        assert_eq!(leech.fire_count.load(Ordering::SeqCst), 3);

        scheduler.complete_all(&[]).await;
        assert_eq!(leech.complete_count.load(Ordering::SeqCst), 1);
    }
}
