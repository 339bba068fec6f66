use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use rppal::i2c::I2c;
use tracing::{debug, info};

use crate::config::AcquisitionSettings;
use crate::report::{RawFrame, FRAME_LEN};

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Failed to open bus: {0}")]
    OpenError(String),

    #[error("Bus transfer failed: {0}")]
    TransferError(String),

    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },
}

/// Source of raw peripheral frames
pub trait FrameBus: Send + 'static {
    fn read_frame(&mut self) -> impl Future<Output = Result<RawFrame, BusError>> + Send;
}

/// Register the extension's input report starts at
const FRAME_REGISTER: u8 = 0x00;

/// Unencrypted extension init sequence
const INIT_SEQUENCE: [[u8; 2]; 2] = [[0xf0, 0x55], [0xfb, 0x00]];
const INIT_DELAY: Duration = Duration::from_millis(10);

/// Wii extension controller (guitar) on a Raspberry Pi I2C bus
///
/// Reads are blocking ioctls, so each transfer runs on tokio's blocking pool
/// and the async caller only awaits its completion.
pub struct WiiExtensionBus {
    i2c: Arc<Mutex<I2c>>,
    settle_delay: Duration,
}

impl WiiExtensionBus {
    pub const DEFAULT_ADDRESS: u16 = 0x52;

    /// Binds the I2C bus and runs the extension init handshake.
    pub fn open(settings: &AcquisitionSettings) -> Result<Self, BusError> {
        info!(
            "Opening I2C bus {} for extension at 0x{:02x}",
            settings.i2c_bus, settings.i2c_address
        );

        let mut i2c = I2c::with_bus(settings.i2c_bus)
            .map_err(|e| BusError::OpenError(format!("i2c-{}: {}", settings.i2c_bus, e)))?;
        i2c.set_slave_address(settings.i2c_address)
            .map_err(|e| BusError::OpenError(e.to_string()))?;

        for step in INIT_SEQUENCE {
            i2c.write(&step)
                .map_err(|e| BusError::OpenError(format!("extension init failed: {}", e)))?;
            thread::sleep(INIT_DELAY);
        }

        info!("Extension controller initialized");
        Ok(Self {
            i2c: Arc::new(Mutex::new(i2c)),
            settle_delay: settings.settle_delay(),
        })
    }
}

impl FrameBus for WiiExtensionBus {
    async fn read_frame(&mut self) -> Result<RawFrame, BusError> {
        let i2c = self.i2c.clone();
        let settle_delay = self.settle_delay;

        tokio::task::spawn_blocking(move || {
            let mut i2c = i2c.lock().unwrap_or_else(PoisonError::into_inner);
            i2c.write(&[FRAME_REGISTER])
                .map_err(|e| BusError::TransferError(e.to_string()))?;
            thread::sleep(settle_delay);

            let mut raw = [0u8; FRAME_LEN];
            let actual = i2c
                .read(&mut raw)
                .map_err(|e| BusError::TransferError(e.to_string()))?;
            if actual != FRAME_LEN {
                return Err(BusError::ShortRead {
                    expected: FRAME_LEN,
                    actual,
                });
            }

            debug!("wii raw data: {:02x?}", raw);
            Ok(RawFrame(raw))
        })
        .await
        .map_err(|e| BusError::TransferError(format!("bus task failed: {}", e)))?
    }
}
