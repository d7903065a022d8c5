//! Fixed-interval scheduler with cooperative cancellation.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Runs one cycle per tick, never more.
///
/// A slow cycle delays the following ticks instead of bursting to catch up.
/// Cancellation is observed between cycles only; a cycle in flight always
/// runs to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSchedule {
    interval: Duration,
}

impl TickSchedule {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Drive `cycle` until `cancel` fires. Returns the number of cycles run.
    pub async fn run<F, Fut>(&self, cancel: CancellationToken, mut cycle: F) -> u64
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut cycles = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            cycle().await;
            cycles += 1;
        }
        cycles
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn cancelled_before_start_runs_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let cycles = TickSchedule::new(Duration::from_millis(5))
            .run(cancel, || async {})
            .await;
        assert_eq!(cycles, 0);
    }

    #[tokio::test]
    async fn runs_cycles_until_cancelled() {
        let cancel = CancellationToken::new();
        let count = Arc::new(AtomicU64::new(0));

        let handle = tokio::spawn({
            let cancel = cancel.clone();
            let count = count.clone();
            async move {
                TickSchedule::new(Duration::from_millis(5))
                    .run(cancel, || {
                        let count = count.clone();
                        async move {
                            count.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                    .await
            }
        });

        tokio::time::sleep(Duration::from_millis(60)).await;
        cancel.cancel();
        let cycles = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();

        assert!(cycles >= 2);
        assert_eq!(cycles, count.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn in_flight_cycle_is_not_interrupted() {
        let cancel = CancellationToken::new();
        let finished = Arc::new(AtomicBool::new(false));

        let handle = tokio::spawn({
            let cancel = cancel.clone();
            let finished = finished.clone();
            async move {
                TickSchedule::new(Duration::from_millis(5))
                    .run(cancel, || {
                        let finished = finished.clone();
                        async move {
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            finished.store(true, Ordering::SeqCst);
                        }
                    })
                    .await
            }
        });

        // Cancel while the first cycle is sleeping.
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        let cycles = handle.await.unwrap();

        assert_eq!(cycles, 1);
        assert!(finished.load(Ordering::SeqCst));
    }
}
