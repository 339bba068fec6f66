//! Wii guitar + tilt sensor to USB HID gamepad bridge
//!
//! ```text
//! PollScheduler ─► AcquisitionWorker ─► DeliveryQueue ─► TransportSender ─► /dev/hidg0
//!                        ▲
//!   tilt GPIO ─► TiltDebouncer ─► tilt cell
//! ```

pub mod acquisition;
pub mod config;
pub mod delivery;
pub mod pipeline;
pub mod report;
pub mod tilt;

#[cfg(test)]
mod test_support;
