//! Tilt pin abstraction
//!
//! The debounce engine only needs three things from the hardware: the current
//! level, and a way to switch the both-edges interrupt on and off. The handler
//! passed to [`TiltPin::enable_edge_trigger`] runs on whatever thread delivers
//! the interrupt and must stay trivial.

use std::sync::Arc;

use rppal::gpio::{Gpio, InputPin, Level, Trigger};
use tracing::{debug, info};

use crate::config::TiltSettings;

/// Interrupt-context callback. Must not block.
pub type EdgeHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("Tilt sensor not available: {0}")]
    BindError(String),

    #[error("Failed to read tilt level: {0}")]
    ReadError(String),

    #[error("Failed to configure edge trigger: {0}")]
    TriggerError(String),
}

pub trait TiltPin: Send + 'static {
    /// Current logical level, `true` meaning tilted
    fn is_tilted(&self) -> Result<bool, SensorError>;

    /// Arms rising and falling edge interrupts
    fn enable_edge_trigger(&mut self, handler: EdgeHandler) -> Result<(), SensorError>;

    fn disable_edge_trigger(&mut self) -> Result<(), SensorError>;
}

/// Mercury/ball tilt switch on a Raspberry Pi GPIO line
pub struct GpioTiltPin {
    pin: InputPin,
    gpio_pin: u8,
    active_low: bool,
}

impl GpioTiltPin {
    pub fn open(settings: &TiltSettings) -> Result<Self, SensorError> {
        let gpio = Gpio::new().map_err(|e| SensorError::BindError(e.to_string()))?;
        let pin = gpio
            .get(settings.gpio_pin)
            .map_err(|e| SensorError::BindError(format!("GPIO {}: {}", settings.gpio_pin, e)))?;

        let pin = if settings.pull_up {
            pin.into_input_pullup()
        } else {
            pin.into_input()
        };

        info!(
            "Tilt sensor bound to GPIO {} (active_low: {}, pull_up: {})",
            settings.gpio_pin, settings.active_low, settings.pull_up
        );
        Ok(Self {
            pin,
            gpio_pin: settings.gpio_pin,
            active_low: settings.active_low,
        })
    }
}

impl TiltPin for GpioTiltPin {
    fn is_tilted(&self) -> Result<bool, SensorError> {
        let high = self.pin.read() == Level::High;
        Ok(high != self.active_low)
    }

    fn enable_edge_trigger(&mut self, handler: EdgeHandler) -> Result<(), SensorError> {
        debug!("Enabling both-edge interrupt on GPIO {}", self.gpio_pin);
        self.pin
            .set_async_interrupt(Trigger::Both, None, move |_event| handler())
            .map_err(|e| SensorError::TriggerError(e.to_string()))
    }

    fn disable_edge_trigger(&mut self) -> Result<(), SensorError> {
        self.pin
            .clear_async_interrupt()
            .map_err(|e| SensorError::TriggerError(e.to_string()))
    }
}
