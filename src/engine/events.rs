//! Session events.
//!
//! Notifications the editor session raises for its host (command line or UI).
//! They are queued inside the session and drained by the host after each
//! call, the same way UI code polls engine events.

use super::transport::TransportError;
use crate::sysex::FrameError;

/// Events sent from the session to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A requested patch arrived and was stored.
    PatchReceived { patch: usize },
    /// The device echoed back exactly what was uploaded.
    PatchVerified { patch: usize },
    /// The device echoed back something other than what was uploaded.
    VerifyMismatch { patch: usize },
    /// A write touched the patch name; `label` is the new display label.
    PatchRenamed { patch: usize, label: String },
    /// An inbound frame failed validation.
    FrameRejected(FrameError),
    /// A valid bulk dump carried a payload of the wrong size.
    PayloadRejected { len: usize },
    /// A valid bulk dump arrived while nothing was requested.
    UnexpectedData,
    /// A request or verified upload sequence has completed.
    TransferFinished,
    /// The transport refused an outbound frame.
    SendFailed(TransportError),
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::PatchReceived { patch } => write!(f, "Received patch {:02}", patch + 1),
            SessionEvent::PatchVerified { patch } => write!(f, "Verified patch {:02}", patch + 1),
            SessionEvent::VerifyMismatch { patch } => {
                write!(f, "Patch {:02} on device differs from upload", patch + 1)
            }
            SessionEvent::PatchRenamed { label, .. } => write!(f, "Renamed to {}", label),
            SessionEvent::FrameRejected(err) => write!(f, "Rejected frame: {}", err),
            SessionEvent::PayloadRejected { len } => {
                write!(f, "Rejected bulk dump with {} byte payload", len)
            }
            SessionEvent::UnexpectedData => write!(f, "Unexpected data received"),
            SessionEvent::TransferFinished => write!(f, "Transfer finished"),
            SessionEvent::SendFailed(err) => write!(f, "{}", err),
        }
    }
}
