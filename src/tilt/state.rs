use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Confirmed orientation of the guitar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TiltState {
    /// Nothing confirmed yet
    #[default]
    Unknown = 0,
    Flat = 1,
    Tilted = 2,
}

impl TiltState {
    pub fn is_tilted(self) -> bool {
        self == TiltState::Tilted
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => TiltState::Flat,
            2 => TiltState::Tilted,
            _ => TiltState::Unknown,
        }
    }
}

impl From<bool> for TiltState {
    fn from(tilted: bool) -> Self {
        if tilted {
            TiltState::Tilted
        } else {
            TiltState::Flat
        }
    }
}

/// Creates the process-wide tilt cell.
///
/// The writer is deliberately not `Clone`: whoever owns it (the debounce
/// engine's confirmation callback) is the only component that can change the
/// published state. Readers are cheap to clone and never block.
pub fn tilt_cell() -> (TiltWriter, TiltReader) {
    let cell = Arc::new(AtomicU8::new(TiltState::Unknown as u8));
    (
        TiltWriter { cell: cell.clone() },
        TiltReader { cell },
    )
}

#[derive(Debug)]
pub struct TiltWriter {
    cell: Arc<AtomicU8>,
}

impl TiltWriter {
    pub fn publish(&self, state: TiltState) {
        self.cell.store(state as u8, Ordering::Relaxed);
    }

    pub fn reader(&self) -> TiltReader {
        TiltReader {
            cell: self.cell.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TiltReader {
    cell: Arc<AtomicU8>,
}

impl TiltReader {
    /// Latest confirmed value, no waiting
    pub fn snapshot(&self) -> TiltState {
        TiltState::from_raw(self.cell.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unknown_and_follows_writer() {
        let (writer, reader) = tilt_cell();
        let other = writer.reader();
        assert_eq!(reader.snapshot(), TiltState::Unknown);

        writer.publish(TiltState::from(true));
        assert_eq!(reader.snapshot(), TiltState::Tilted);
        assert_eq!(other.snapshot(), TiltState::Tilted);

        writer.publish(TiltState::from(false));
        assert_eq!(reader.snapshot(), TiltState::Flat);
        assert!(!reader.snapshot().is_tilted());
    }
}
