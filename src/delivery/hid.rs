use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::sender::{ReportTransport, TransportError};
use crate::report::Report;

/// HID report descriptor matching [`Report`]
///
/// Gamepad, 10 one-bit buttons (frets, plus, minus, strum up/down, tilt) plus
/// 6 padding bits, X/Y in 0..=63 and a slider (whammy) in 0..=31. Write it to
/// the gadget function's `report_desc` when configuring the gadget.
pub const HID_REPORT_DESCRIPTOR: [u8; 56] = [
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x05, // Usage (Game Pad)
    0xa1, 0x01, // Collection (Application)
    0xa1, 0x00, //   Collection (Physical)
    0x05, 0x09, //     Usage Page (Button)
    0x19, 0x01, //     Usage Minimum (1)
    0x29, 0x0a, //     Usage Maximum (10)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x95, 0x0a, //     Report Count (10)
    0x75, 0x01, //     Report Size (1)
    0x81, 0x02, //     Input (Data,Var,Abs)
    0x75, 0x06, //     Report Size (6)
    0x95, 0x01, //     Report Count (1)
    0x81, 0x01, //     Input (Cnst,Ary,Abs)
    0x05, 0x01, //     Usage Page (Generic Desktop)
    0x09, 0x30, //     Usage (X)
    0x09, 0x31, //     Usage (Y)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x3f, //     Logical Maximum (63)
    0x75, 0x08, //     Report Size (8)
    0x95, 0x02, //     Report Count (2)
    0x81, 0x02, //     Input (Data,Var,Abs)
    0x09, 0x36, //     Usage (Slider)
    0x25, 0x1f, //     Logical Maximum (31)
    0x95, 0x01, //     Report Count (1)
    0x81, 0x02, //     Input (Data,Var,Abs)
    0xc0, //   End Collection
    0xc0, // End Collection
];

/// Linux USB gadget HID function node (`/dev/hidgN`)
///
/// Enumeration and gadget setup happen outside this crate; this only writes
/// reports to an already bound function.
#[derive(Debug)]
pub struct HidGadget {
    device: File,
    path: PathBuf,
}

impl HidGadget {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let path = path.as_ref().to_path_buf();
        let device = OpenOptions::new()
            .write(true)
            .open(&path)
            .await
            .map_err(|e| TransportError::Unavailable(format!("{}: {}", path.display(), e)))?;

        info!("Opened HID gadget at {}", path.display());
        Ok(Self { device, path })
    }

}

impl ReportTransport for HidGadget {
    async fn send(&mut self, report: Report) -> Result<(), TransportError> {
        let path = &self.path;
        self.device
            .write_all(&report.to_bytes())
            .await
            .map_err(|e| TransportError::WriteError(format!("{}: {}", path.display(), e)))?;
        self.device
            .flush()
            .await
            .map_err(|e| TransportError::WriteError(format!("{}: {}", path.display(), e)))
    }
}
