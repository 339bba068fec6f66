//! Delivery subsystem: the producer/consumer boundary
//!
//! 1. [`queue`] - Bounded FIFO that purges stale reports instead of blocking
//! 2. [`sender`] - Single consumer that forwards only reports that changed
//! 3. [`hid`] - USB HID gadget transport and its report descriptor
//!
//! ```text
//! AcquisitionWorker ──enqueue──► DeliveryQueue ──dequeue──► TransportSender ──► /dev/hidg0
//!                    (never blocks)               (waits)     (dedup)
//! ```

pub mod hid;
pub mod queue;
pub mod sender;

pub use hid::{HidGadget, HID_REPORT_DESCRIPTOR};
pub use queue::DeliveryQueue;
pub use sender::{Delivery, ReportTransport, SenderStats, TransportError, TransportSender};
