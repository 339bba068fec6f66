//! Tilt sensor subsystem
//!
//! 1. [`sensor`] - Pin abstraction and the rppal GPIO backend
//! 2. [`debounce`] - Edge-driven hold-time filter running outside interrupt context
//! 3. [`state`] - Single-writer cell publishing the confirmed tilt state
//!
//! # Architecture
//!
//! ```text
//! GPIO edge ──► EdgeHandler ──► processing context ──► on_tilt_change(bool)
//!  (ISR thread)  (permit/spawn)  (Idle ⇄ Holding)           │
//!                                                            ▼
//!                                      TiltWriter ──► TiltReader (acquisition)
//! ```

pub mod debounce;
pub mod sensor;
pub mod state;

pub use debounce::{DebounceError, DebouncePhase, DebounceSettings, ProcessingContext, TiltDebouncer};
pub use sensor::{EdgeHandler, GpioTiltPin, SensorError, TiltPin};
pub use state::{tilt_cell, TiltReader, TiltState, TiltWriter};
