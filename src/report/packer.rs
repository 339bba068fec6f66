use serde::{Deserialize, Serialize};
use tracing::debug;

use super::gamepad::{buttons, GamepadState};
use crate::tilt::TiltState;

/// Size of one outbound report
pub const REPORT_LEN: usize = 5;

/// Outbound HID record
///
/// Wire layout, little endian:
///
/// ```text
/// 0      2        3        4
/// ┌──────┬────────┬────────┬────────┐
/// │ btns │ axis x │ axis y │ whammy │
/// └──────┴────────┴────────┴────────┘
/// ```
///
/// Field-wise equality is byte-wise equality of [`Report::to_bytes`], which is
/// what duplicate suppression relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Report {
    pub buttons: u16,
    pub axes: [u8; 2],
    pub whammy: u8,
}

impl Report {
    pub fn to_bytes(&self) -> [u8; REPORT_LEN] {
        let [lo, hi] = self.buttons.to_le_bytes();
        [lo, hi, self.axes[0], self.axes[1], self.whammy]
    }

    pub fn from_bytes(bytes: [u8; REPORT_LEN]) -> Self {
        Self {
            buttons: u16::from_le_bytes([bytes[0], bytes[1]]),
            axes: [bytes[2], bytes[3]],
            whammy: bytes[4],
        }
    }
}

/// Logic-level conventions applied while packing
///
/// The reference guitar reports active-low buttons, and the tilt bit is set
/// while the guitar is *not* tilted. Both steps are kept separate so a
/// peripheral with different wiring can flip either one on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Polarity {
    /// Complement the whole composed button word before emission
    pub invert_buttons: bool,
    /// Set the tilt bit when the guitar is flat (or tilt is unknown)
    pub tilt_active_low: bool,
}

impl Default for Polarity {
    fn default() -> Self {
        Self {
            invert_buttons: true,
            tilt_active_low: true,
        }
    }
}

/// Stateless transform `(GamepadState, TiltState) -> Report`
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportPacker {
    polarity: Polarity,
}

impl ReportPacker {
    pub fn new(polarity: Polarity) -> Self {
        Self { polarity }
    }

    /// Composes the button word (fret/strum/plus/minus bits plus the tilt bit)
    /// and applies the configured polarity.
    pub fn pack(&self, state: &GamepadState, tilt: TiltState) -> Report {
        let mut word = state.buttons & !buttons::TILT;
        if tilt.is_tilted() != self.polarity.tilt_active_low {
            word |= buttons::TILT;
        }
        if self.polarity.invert_buttons {
            word = !word;
        }

        let report = Report {
            buttons: word,
            axes: [state.axis_x(), state.axis_y()],
            whammy: state.whammy(),
        };
        debug!(
            "report: x: {} y: {} whammy: {} buttons: {:04x}",
            report.axes[0], report.axes[1], report.whammy, report.buttons
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RawFrame;

    fn golden_state() -> GamepadState {
        GamepadState::decode(&RawFrame([10, 20, 0, 3, 0b0000_0100, 0]))
    }

    #[test]
    fn golden_vector() {
        let report = ReportPacker::default().pack(&golden_state(), TiltState::Flat);

        let composed = buttons::PLUS | buttons::TILT;
        assert_eq!(report.axes, [10, 20]);
        assert_eq!(report.whammy, 3);
        assert_eq!(report.buttons, !composed);
        assert_eq!(report.to_bytes(), [0xdf, 0xfd, 10, 20, 3]);
    }

    #[test]
    fn tilted_clears_tilt_bit_before_inversion() {
        let report = ReportPacker::default().pack(&golden_state(), TiltState::Tilted);

        assert_eq!(report.buttons, !buttons::PLUS);
    }

    #[test]
    fn unknown_tilt_packs_like_flat() {
        let packer = ReportPacker::default();

        assert_eq!(
            packer.pack(&golden_state(), TiltState::Unknown),
            packer.pack(&golden_state(), TiltState::Flat)
        );
    }

    #[test]
    fn polarity_steps_are_independent() {
        let state = golden_state();

        let plain = ReportPacker::new(Polarity {
            invert_buttons: false,
            tilt_active_low: true,
        });
        assert_eq!(
            plain.pack(&state, TiltState::Flat).buttons,
            buttons::PLUS | buttons::TILT
        );

        let active_high_tilt = ReportPacker::new(Polarity {
            invert_buttons: false,
            tilt_active_low: false,
        });
        assert_eq!(
            active_high_tilt.pack(&state, TiltState::Tilted).buttons,
            buttons::PLUS | buttons::TILT
        );
        assert_eq!(
            active_high_tilt.pack(&state, TiltState::Flat).buttons,
            buttons::PLUS
        );
    }

    #[test]
    fn wire_layout_is_little_endian() {
        let report = Report {
            buttons: 0x0201,
            axes: [0x30, 0x3f],
            whammy: 0x1f,
        };

        assert_eq!(report.to_bytes(), [0x01, 0x02, 0x30, 0x3f, 0x1f]);
        assert_eq!(Report::from_bytes(report.to_bytes()), report);
    }
}
