//! Transport abstraction.
//!
//! The protocol core only ever needs to push complete SysEx frames out. Inbound
//! frames arrive through [`super::channels`] and are fed to the session by
//! whoever drives it, so the core never depends on a particular MIDI backend.

/// Error type for frame transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No output connection is open.
    NotConnected,
    /// The backend refused the frame.
    SendFailed(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::NotConnected => write!(f, "MIDI output not connected"),
            TransportError::SendFailed(s) => write!(f, "MIDI send failed: {}", s),
        }
    }
}

impl std::error::Error for TransportError {}

/// Something that can transmit SysEx frames (0xF0 through 0xF7 inclusive).
pub trait Transport {
    /// Transmit one complete frame.
    fn send_sysex(&mut self, frame: &[u8]) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send_sysex(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        (**self).send_sysex(frame)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send_sysex(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        (**self).send_sysex(frame)
    }
}

/// Transport that keeps every frame instead of sending it.
///
/// Backs the command line `--dry-run` mode and the session tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingTransport {
    /// Frames in transmission order.
    pub frames: Vec<Vec<u8>>,
    /// When set, every send fails with this error.
    pub fail_with: Option<TransportError>,
}

impl RecordingTransport {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all recorded frames.
    pub fn take_frames(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.frames)
    }
}

impl Transport for RecordingTransport {
    fn send_sysex(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        self.frames.push(frame.to_vec());
        Ok(())
    }
}
