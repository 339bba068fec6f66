//! Hold-time debounce for the tilt switch
//!
//! Mechanical tilt switches chatter. An edge only counts once the new level has
//! survived `hold_time`; anything that flips back before the timer fires is
//! dropped without a callback.
//!
//! # State Machine
//!
//! ```text
//!            edge (hold > 0)
//!   Idle ─────────────────────► Holding ── edges absorbed
//!    ▲                              │
//!    │   timer: level == confirmed  │  (bounce, discarded)
//!    ├──────────────────────────────┤
//!    │   timer: level != confirmed  │
//!    └──── on_change(level), re-arm ┘
//! ```
//!
//! With `hold_time == 0` every edge dispatches the current level immediately.
//!
//! # Processing Contexts
//!
//! The interrupt handler never does the work itself. Depending on
//! [`ProcessingContext`] it either adds a permit to a counting semaphore
//! drained by a task of its own, or spawns a short work item on the shared
//! runtime pool.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, trace, warn};

use super::sensor::{EdgeHandler, SensorError, TiltPin};

/// Where debounce work runs once an edge has been signalled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingContext {
    /// One long-lived task woken through a counting semaphore
    #[default]
    Dedicated,
    /// A fresh work item on the runtime's shared worker pool per edge
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebouncePhase {
    Idle,
    Holding,
}

#[derive(Debug, Clone, Copy)]
pub struct DebounceSettings {
    /// Zero disables filtering
    pub hold_time: Duration,
    pub context: ProcessingContext,
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self {
            hold_time: Duration::from_millis(50),
            context: ProcessingContext::Dedicated,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DebounceError {
    #[error("Trigger set failed: {0}")]
    TriggerSetup(#[from] SensorError),

    #[error("Failed to initialize debounce engine: {0}")]
    InitializationError(String),
}

type TiltCallback = Box<dyn Fn(bool) + Send + Sync>;

#[derive(Debug)]
struct DebounceState {
    phase: DebouncePhase,
    confirmed: Option<bool>,
    deadline: Option<Instant>,
}

struct DebounceCore {
    pin: Mutex<Box<dyn TiltPin>>,
    state: Mutex<DebounceState>,
    hold_time: Duration,
    on_change: TiltCallback,
    edge_handler: OnceLock<EdgeHandler>,
}

impl DebounceCore {
    fn lock_state(&self) -> MutexGuard<'_, DebounceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pin(&self) -> MutexGuard<'_, Box<dyn TiltPin>> {
        self.pin.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_level(&self) -> Option<bool> {
        match self.lock_pin().is_tilted() {
            Ok(level) => Some(level),
            Err(e) => {
                warn!("tilt sensor fetch error: {}", e);
                None
            }
        }
    }

    fn pending_deadline(&self) -> Option<Instant> {
        self.lock_state().deadline
    }

    /// Handles one signalled edge. Returns the deadline when the edge opened
    /// a hold window that the caller has to time.
    fn on_edge(&self) -> Option<Instant> {
        if self.hold_time.is_zero() {
            let level = self.read_level()?;
            return self.confirm(level);
        }

        let mut state = self.lock_state();
        if state.phase == DebouncePhase::Holding {
            trace!("Edge absorbed while holding");
            return None;
        }

        let deadline = Instant::now() + self.hold_time;
        state.phase = DebouncePhase::Holding;
        state.deadline = Some(deadline);
        debug!("Tilt edge, holding for {:?}", self.hold_time);
        Some(deadline)
    }

    fn on_hold_expired(&self) -> Option<Instant> {
        let level = self.read_level();

        let mut state = self.lock_state();
        state.phase = DebouncePhase::Idle;
        state.deadline = None;

        let level = level?;
        if state.confirmed == Some(level) {
            debug!("Tilt bounce discarded (level back to {})", level);
            return None;
        }
        drop(state);

        self.confirm(level)
    }

    fn confirm(&self, tilted: bool) -> Option<Instant> {
        self.lock_state().confirmed = Some(tilted);
        info!("Tilt change confirmed: tilted={}", tilted);
        (self.on_change)(tilted);

        self.rearm();

        // Zero hold: the edge that moved the level is already signalled and
        // reads the live level itself
        if self.hold_time.is_zero() {
            return None;
        }

        // Edges that hit while the trigger was down
        match self.read_level() {
            Some(level) if level != tilted => {
                debug!("Level moved during re-arm, treating as fresh edge");
                self.on_edge()
            }
            _ => None,
        }
    }

    fn rearm(&self) {
        let Some(handler) = self.edge_handler.get() else {
            return;
        };

        let mut pin = self.lock_pin();
        if let Err(e) = pin.disable_edge_trigger() {
            warn!("Failed to disable tilt trigger before re-arm: {}", e);
        }
        if let Err(e) = pin.enable_edge_trigger(handler.clone()) {
            error!("Failed to re-arm tilt trigger: {}", e);
        }
    }
}

async fn run_dedicated(core: Arc<DebounceCore>, signal: Arc<Semaphore>) {
    info!("Tilt debounce task started");
    loop {
        let deadline = core.pending_deadline();
        tokio::select! {
            permit = signal.acquire() => match permit {
                Ok(permit) => {
                    permit.forget();
                    core.on_edge();
                }
                Err(_) => break,
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                core.on_hold_expired();
            }
        }
    }
    info!("Tilt debounce task finished");
}

async fn process_shared(core: Arc<DebounceCore>) {
    let mut next = core.on_edge();
    while let Some(deadline) = next {
        sleep_until(deadline).await;
        next = core.on_hold_expired();
    }
}

/// Running debounce engine bound to one tilt pin
pub struct TiltDebouncer {
    core: Arc<DebounceCore>,
    worker: Option<JoinHandle<()>>,
}

impl TiltDebouncer {
    /// Wires the processing context, arms both-edge interrupts and runs one
    /// processing pass so the initial level gets published.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// * [`DebounceError::InitializationError`] - no runtime to process on
    /// * [`DebounceError::TriggerSetup`] - the pin refused the interrupt
    pub fn spawn<F>(
        pin: Box<dyn TiltPin>,
        settings: DebounceSettings,
        on_change: F,
    ) -> Result<Self, DebounceError>
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let runtime =
            Handle::try_current().map_err(|e| DebounceError::InitializationError(e.to_string()))?;

        info!(
            "Starting tilt debounce (hold: {:?}, context: {:?})",
            settings.hold_time, settings.context
        );

        let core = Arc::new(DebounceCore {
            pin: Mutex::new(pin),
            state: Mutex::new(DebounceState {
                phase: DebouncePhase::Idle,
                confirmed: None,
                deadline: None,
            }),
            hold_time: settings.hold_time,
            on_change: Box::new(on_change),
            edge_handler: OnceLock::new(),
        });

        let (handler, worker): (EdgeHandler, Option<JoinHandle<()>>) = match settings.context {
            ProcessingContext::Dedicated => {
                let signal = Arc::new(Semaphore::new(0));
                let isr_signal = signal.clone();
                let handler: EdgeHandler = Arc::new(move || isr_signal.add_permits(1));
                let worker = runtime.spawn(run_dedicated(core.clone(), signal));
                (handler, Some(worker))
            }
            ProcessingContext::Shared => {
                let weak = Arc::downgrade(&core);
                let handler: EdgeHandler = Arc::new(move || {
                    if let Some(core) = weak.upgrade() {
                        runtime.spawn(process_shared(core));
                    }
                });
                (handler, None)
            }
        };

        let _ = core.edge_handler.set(handler.clone());

        let armed = core.lock_pin().enable_edge_trigger(handler.clone());
        if let Err(e) = armed {
            error!("Trigger set failed: {}", e);
            if let Some(worker) = worker {
                worker.abort();
            }
            return Err(e.into());
        }

        handler();

        Ok(Self { core, worker })
    }

    pub fn phase(&self) -> DebouncePhase {
        self.core.lock_state().phase
    }

    /// Last level handed to the callback, `None` until the first confirmation
    pub fn confirmed(&self) -> Option<bool> {
        self.core.lock_state().confirmed
    }

    /// Disarms the pin and stops the dedicated task, if any.
    pub fn shutdown(&mut self) {
        info!("Stopping tilt debounce");
        if let Err(e) = self.core.lock_pin().disable_edge_trigger() {
            warn!("Failed to disable tilt trigger: {}", e);
        }
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

impl Drop for TiltDebouncer {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}
