use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Reusable work item shared by the scheduler and the acquisition worker
///
/// Submitting while the worker is busy stores at most one pending run, so a
/// burst of submissions collapses into a single follow-up cycle.
#[derive(Debug, Clone, Default)]
pub struct WorkTrigger {
    notify: Arc<Notify>,
    submissions: Arc<AtomicU64>,
}

impl WorkTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&self) {
        self.submissions.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_one();
    }

    pub async fn triggered(&self) {
        self.notify.notified().await;
    }

    pub fn submissions(&self) -> u64 {
        self.submissions.load(Ordering::Relaxed)
    }
}

/// Fixed-rate scheduler driving the acquisition worker
pub struct PollScheduler {
    period: Duration,
    trigger: WorkTrigger,
}

impl PollScheduler {
    pub fn new(poll_rate_hz: NonZeroU32, trigger: WorkTrigger) -> Self {
        let period = Duration::from_secs(1) / poll_rate_hz.get();
        debug!("Poll scheduler at {} Hz ({:?} period)", poll_rate_hz, period);
        Self { period, trigger }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ticks until `shutdown` is cancelled. Each tick only submits; it never
    /// waits on the cycle it started.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Starting poll scheduler with {:?} period", self.period);

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Poll scheduler shutting down after {} submissions", self.trigger.submissions());
                    break;
                }
                _ = ticker.tick() => self.trigger.submit(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::AcquisitionWorker;
    use crate::delivery::DeliveryQueue;
    use crate::report::{RawFrame, ReportPacker};
    use crate::test_support::ScriptedBus;
    use crate::tilt::tilt_cell;
    use tokio::time::sleep;

    fn hz(rate: u32) -> NonZeroU32 {
        NonZeroU32::new(rate).unwrap()
    }

    #[test]
    fn period_follows_rate() {
        assert_eq!(
            PollScheduler::new(hz(100), WorkTrigger::new()).period(),
            Duration::from_millis(10)
        );
        assert_eq!(
            PollScheduler::new(hz(1), WorkTrigger::new()).period(),
            Duration::from_secs(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn submissions_follow_cadence() {
        let trigger = WorkTrigger::new();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(PollScheduler::new(hz(100), trigger.clone()).run(shutdown.clone()));

        sleep(Duration::from_millis(95)).await;
        shutdown.cancel();
        task.await.unwrap();

        // ticks at 0, 10, ..., 90
        assert_eq!(trigger.submissions(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_bus_does_not_delay_ticks() {
        let bus = ScriptedBus::repeating(RawFrame([1, 2, 0, 3, 0, 0]))
            .with_delay(Duration::from_millis(50));
        let reads = bus.reads();
        let (_writer, reader) = tilt_cell();
        let queue = std::sync::Arc::new(DeliveryQueue::default());
        let worker = AcquisitionWorker::new(bus, reader, ReportPacker::default(), queue.clone());

        let trigger = WorkTrigger::new();
        let shutdown = CancellationToken::new();
        let worker_task = tokio::spawn(worker.run(trigger.clone(), shutdown.clone()));
        let scheduler_task =
            tokio::spawn(PollScheduler::new(hz(100), trigger.clone()).run(shutdown.clone()));

        sleep(Duration::from_millis(205)).await;

        // 21 ticks in 205ms while each read takes five periods
        assert!(trigger.submissions() >= 20, "submissions: {}", trigger.submissions());
        let reads_done = reads.load(Ordering::Relaxed);
        assert!((3..=5).contains(&reads_done), "reads: {}", reads_done);

        shutdown.cancel();
        scheduler_task.await.unwrap();
        worker_task.await.unwrap();
    }
}
