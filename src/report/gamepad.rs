use tracing::trace;

/// Size of one frame read from the guitar extension
pub const FRAME_LEN: usize = 6;

/// Raw data block as returned by the extension controller
///
/// Opaque until decoded. Bit positions of every field are documented on
/// [`GamepadState::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawFrame(pub [u8; FRAME_LEN]);

impl RawFrame {
    pub fn bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }
}

impl From<[u8; FRAME_LEN]> for RawFrame {
    fn from(raw: [u8; FRAME_LEN]) -> Self {
        Self(raw)
    }
}

/// Bit positions inside the composed button word
pub mod buttons {
    /// Five neck frets, bits 0-4
    pub const NECK_MASK: u16 = 0x001f;
    pub const PLUS: u16 = 1 << 5;
    pub const MINUS: u16 = 1 << 6;
    pub const STRUM_UP: u16 = 1 << 7;
    pub const STRUM_DOWN: u16 = 1 << 8;
    /// Filled in by the packer from the tilt sensor, never by decoding
    pub const TILT: u16 = 1 << 9;
}

// Frame offsets (byte, shift, mask)
const AXIS_X: (usize, u8, u8) = (0, 0, 0x3f);
const AXIS_Y: (usize, u8, u8) = (1, 0, 0x3f);
const WHAMMY: (usize, u8, u8) = (3, 0, 0x1f);
const NECK: (usize, u8, u8) = (5, 3, 0x1f);
const PLUS_BIT: (usize, u8) = (4, 2);
const MINUS_BIT: (usize, u8) = (4, 4);
const STRUM_DOWN_BIT: (usize, u8) = (4, 6);
const STRUM_UP_BIT: (usize, u8) = (5, 0);

/// Decoded logical state of the guitar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GamepadState {
    /// Button word as laid out in [`buttons`], without the tilt bit
    pub buttons: u16,
    /// x, y, whammy
    pub axes: [u8; 3],
}

impl GamepadState {
    /// Decodes a raw frame.
    ///
    /// | Byte | Bits | Field |
    /// |------|------|-------|
    /// | 0 | 0-5 | analog x |
    /// | 1 | 0-5 | analog y |
    /// | 2 | 0-4 | touch bar (unused) |
    /// | 3 | 0-4 | whammy |
    /// | 4 | 2 / 4 / 6 | plus / minus / strum down |
    /// | 5 | 0 | strum up |
    /// | 5 | 3-7 | neck frets |
    ///
    /// Levels are taken as-is; polarity is the packer's business.
    pub fn decode(frame: &RawFrame) -> Self {
        let raw = frame.bytes();

        let mut buttons = u16::from(field(raw, NECK));
        buttons |= flag(raw, PLUS_BIT, buttons::PLUS);
        buttons |= flag(raw, MINUS_BIT, buttons::MINUS);
        buttons |= flag(raw, STRUM_UP_BIT, buttons::STRUM_UP);
        buttons |= flag(raw, STRUM_DOWN_BIT, buttons::STRUM_DOWN);

        let state = Self {
            buttons,
            axes: [field(raw, AXIS_X), field(raw, AXIS_Y), field(raw, WHAMMY)],
        };
        trace!("Decoded frame {:02x?} into {:?}", raw, state);
        state
    }

    pub fn axis_x(&self) -> u8 {
        self.axes[0]
    }

    pub fn axis_y(&self) -> u8 {
        self.axes[1]
    }

    pub fn whammy(&self) -> u8 {
        self.axes[2]
    }

    pub fn neck(&self) -> u8 {
        (self.buttons & buttons::NECK_MASK) as u8
    }

    pub fn is_set(&self, mask: u16) -> bool {
        self.buttons & mask == mask
    }
}

fn field(raw: &[u8; FRAME_LEN], (byte, shift, mask): (usize, u8, u8)) -> u8 {
    (raw[byte] >> shift) & mask
}

fn flag(raw: &[u8; FRAME_LEN], (byte, bit): (usize, u8), target: u16) -> u16 {
    if raw[byte] & (1 << bit) != 0 {
        target
    } else {
        0
    }
}
