//! Test doubles for the hardware-facing traits

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::acquisition::{BusError, FrameBus};
use crate::delivery::{ReportTransport, TransportError};
use crate::report::{RawFrame, Report};
use crate::tilt::{EdgeHandler, SensorError, TiltPin};

/// Frame source replaying a script; `None` entries fail the read
pub struct ScriptedBus {
    script: VecDeque<Option<RawFrame>>,
    fallback: Option<RawFrame>,
    delay: Duration,
    reads: Arc<AtomicUsize>,
}

impl ScriptedBus {
    pub fn script(frames: impl IntoIterator<Item = Option<RawFrame>>) -> Self {
        Self {
            script: frames.into_iter().collect(),
            fallback: None,
            delay: Duration::ZERO,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn repeating(frame: RawFrame) -> Self {
        Self {
            fallback: Some(frame),
            ..Self::script([])
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Counts reads as they start
    pub fn reads(&self) -> Arc<AtomicUsize> {
        self.reads.clone()
    }
}

impl FrameBus for ScriptedBus {
    async fn read_frame(&mut self) -> Result<RawFrame, BusError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.script.pop_front() {
            Some(Some(frame)) => Ok(frame),
            Some(None) => Err(BusError::TransferError("scripted failure".to_string())),
            None => self
                .fallback
                .ok_or_else(|| BusError::TransferError("script exhausted".to_string())),
        }
    }
}

#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<Report>>>,
    attempts: Arc<AtomicUsize>,
    failures_left: Arc<AtomicUsize>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<Report> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::Relaxed);
    }
}

impl ReportTransport for RecordingTransport {
    async fn send(&mut self, report: Report) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let failing = self
            .failures_left
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::WriteError("endpoint stalled".to_string()));
        }

        self.sent.lock().unwrap().push(report);
        Ok(())
    }
}

#[derive(Default)]
struct MockPinState {
    level: AtomicBool,
    handler: Mutex<Option<EdgeHandler>>,
    enables: AtomicUsize,
    fail_trigger: AtomicBool,
}

/// Tilt pin whose level and edges are driven by the test
#[derive(Clone, Default)]
pub struct MockTiltPin {
    state: Arc<MockPinState>,
}

impl MockTiltPin {
    pub fn new(tilted: bool) -> Self {
        let pin = Self::default();
        pin.set_level(tilted);
        pin
    }

    pub fn set_level(&self, tilted: bool) {
        self.state.level.store(tilted, Ordering::SeqCst);
    }

    /// Simulates the edge interrupt, if armed
    pub fn fire(&self) {
        let handler = self.state.handler.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler();
        }
    }

    pub fn fail_trigger(&self, fail: bool) {
        self.state.fail_trigger.store(fail, Ordering::SeqCst);
    }

    pub fn enable_count(&self) -> usize {
        self.state.enables.load(Ordering::SeqCst)
    }

    pub fn is_armed(&self) -> bool {
        self.state.handler.lock().unwrap().is_some()
    }
}

impl TiltPin for MockTiltPin {
    fn is_tilted(&self) -> Result<bool, SensorError> {
        Ok(self.state.level.load(Ordering::SeqCst))
    }

    fn enable_edge_trigger(&mut self, handler: EdgeHandler) -> Result<(), SensorError> {
        if self.state.fail_trigger.load(Ordering::SeqCst) {
            return Err(SensorError::TriggerError("no interrupt line".to_string()));
        }
        self.state.enables.fetch_add(1, Ordering::SeqCst);
        *self.state.handler.lock().unwrap() = Some(handler);
        Ok(())
    }

    fn disable_edge_trigger(&mut self) -> Result<(), SensorError> {
        self.state.handler.lock().unwrap().take();
        Ok(())
    }
}
