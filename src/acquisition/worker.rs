use std::sync::Arc;

use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::bus::{BusError, FrameBus};
use super::poll_scheduler::WorkTrigger;
use crate::delivery::DeliveryQueue;
use crate::report::{GamepadState, Report, ReportPacker};
use crate::tilt::TiltReader;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    pub frames: u64,
    pub read_failures: u64,
}

/// Acquisition work item: bus read → decode → tilt snapshot → pack → enqueue
pub struct AcquisitionWorker<B: FrameBus> {
    bus: B,
    tilt: TiltReader,
    packer: ReportPacker,
    queue: Arc<DeliveryQueue>,
    stats: AcquisitionStats,
}

impl<B: FrameBus> AcquisitionWorker<B> {
    pub fn new(bus: B, tilt: TiltReader, packer: ReportPacker, queue: Arc<DeliveryQueue>) -> Self {
        Self {
            bus,
            tilt,
            packer,
            queue,
            stats: AcquisitionStats::default(),
        }
    }

    pub fn stats(&self) -> &AcquisitionStats {
        &self.stats
    }

    /// Runs one acquisition cycle.
    ///
    /// A failed read ends the cycle with no report and no other side effect;
    /// the next trigger simply tries again.
    pub async fn run_cycle(&mut self) -> Result<Report, BusError> {
        let frame = match self.bus.read_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.read_failures += 1;
                return Err(e);
            }
        };

        let state = GamepadState::decode(&frame);
        let tilt = self.tilt.snapshot();
        let report = self.packer.pack(&state, tilt);
        self.queue.enqueue(report);

        self.stats.frames += 1;
        Ok(report)
    }

    pub async fn run(mut self, trigger: WorkTrigger, shutdown: CancellationToken) {
        info!("Starting acquisition worker");

        let mut last_log_time = Local::now();
        let log_interval = chrono::Duration::seconds(10);
        let mut frames_at_last_log = 0;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Acquisition worker shutting down");
                    break;
                }
                _ = trigger.triggered() => {
                    if let Err(e) = self.run_cycle().await {
                        error!("gamepad fetch error: {}", e);
                    }
                }
            }

            let now = Local::now();
            if now - last_log_time > log_interval {
                let frames = self.stats.frames - frames_at_last_log;
                info!(
                    "Acquisition stats: {} frames in last {} seconds (avg {:.2}/sec), {} read failures total, {} submissions",
                    frames,
                    log_interval.num_seconds(),
                    frames as f64 / log_interval.num_seconds() as f64,
                    self.stats.read_failures,
                    trigger.submissions()
                );
                frames_at_last_log = self.stats.frames;
                last_log_time = now;
            } else {
                debug!("Acquisition cycle done ({} frames)", self.stats.frames);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{buttons, RawFrame};
    use crate::test_support::ScriptedBus;
    use crate::tilt::{tilt_cell, TiltState};

    const PLUS_FRAME: RawFrame = RawFrame([10, 20, 0, 3, 0b0000_0100, 0]);

    #[tokio::test]
    async fn read_failure_produces_nothing() {
        let bus = ScriptedBus::script([None]);
        let (writer, reader) = tilt_cell();
        writer.publish(TiltState::Tilted);
        let queue = Arc::new(DeliveryQueue::default());
        let mut worker = AcquisitionWorker::new(bus, reader.clone(), ReportPacker::default(), queue.clone());

        assert!(worker.run_cycle().await.is_err());
        assert!(queue.is_empty());
        assert_eq!(reader.snapshot(), TiltState::Tilted);
        assert_eq!(worker.stats().read_failures, 1);
        assert_eq!(worker.stats().frames, 0);
    }

    #[tokio::test]
    async fn success_packs_current_tilt_and_enqueues() {
        let bus = ScriptedBus::script([Some(PLUS_FRAME), Some(PLUS_FRAME)]);
        let (writer, reader) = tilt_cell();
        writer.publish(TiltState::Flat);
        let queue = Arc::new(DeliveryQueue::default());
        let mut worker = AcquisitionWorker::new(bus, reader, ReportPacker::default(), queue.clone());

        let flat = worker.run_cycle().await.unwrap();
        writer.publish(TiltState::Tilted);
        let tilted = worker.run_cycle().await.unwrap();

        assert_eq!(flat.buttons, !(buttons::PLUS | buttons::TILT));
        assert_eq!(tilted.buttons, !buttons::PLUS);
        assert_eq!(queue.try_dequeue(), Some(flat));
        assert_eq!(queue.try_dequeue(), Some(tilted));
    }

    #[tokio::test]
    async fn recovers_after_failed_cycle() {
        let bus = ScriptedBus::script([None, Some(PLUS_FRAME)]);
        let (_writer, reader) = tilt_cell();
        let queue = Arc::new(DeliveryQueue::default());
        let mut worker = AcquisitionWorker::new(bus, reader, ReportPacker::default(), queue.clone());

        assert!(worker.run_cycle().await.is_err());
        let report = worker.run_cycle().await.unwrap();

        assert_eq!(report.axes, [10, 20]);
        assert_eq!(queue.len(), 1);
        assert_eq!(
            *worker.stats(),
            AcquisitionStats {
                frames: 1,
                read_failures: 1
            }
        );
    }
}
