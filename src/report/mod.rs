//! Report subsystem: from raw peripheral bytes to the outbound HID record
//!
//! Two pure stages, no I/O:
//!
//! 1. [`gamepad`] - Decodes the 6-byte guitar extension frame into logical state
//! 2. [`packer`] - Fuses that state with the tilt snapshot into a 5-byte [`Report`]
//!
//! # Layout
//!
//! ```text
//! RawFrame[6] ──► GamepadState ──┐
//!                                ├──► Report[5] = buttons(le16) | x | y | whammy
//!                TiltState ──────┘
//! ```

pub mod gamepad;
pub mod packer;

pub use gamepad::{buttons, GamepadState, RawFrame, FRAME_LEN};
pub use packer::{Polarity, Report, ReportPacker, REPORT_LEN};
