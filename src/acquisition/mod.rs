//! Acquisition subsystem for the guitar extension
//!
//! 1. [`bus`] - Frame source abstraction and the rppal I2C backend
//! 2. [`poll_scheduler`] - Fixed-rate ticker that only signals work
//! 3. [`worker`] - Reads, decodes, packs and enqueues one report per run
//!
//! # Architecture
//!
//! ```text
//! PollScheduler ──submit──► WorkTrigger ──► AcquisitionWorker ──► DeliveryQueue
//!  (every 1/Hz)           (coalescing)     (bus read + pack)
//!                                                ▲
//!                                          TiltReader snapshot
//! ```
//!
//! The scheduler never waits for the worker. A bus read that outlives the
//! poll period just means the ticks that arrive meanwhile collapse into one
//! follow-up run.

pub mod bus;
pub mod poll_scheduler;
pub mod worker;

pub use bus::{BusError, FrameBus, WiiExtensionBus};
pub use poll_scheduler::{PollScheduler, WorkTrigger};
pub use worker::{AcquisitionStats, AcquisitionWorker};
