//! Engine module
//!
//! Device I/O and the editor session.
//! Handles midir integration, inbound frame handoff, outbound coalescing and
//! pacing, and the bulk transfer state machine.

pub mod channels;
pub mod coalescer;
pub mod events;
pub mod midi_engine;
pub mod pacing;
pub mod session;
pub mod transfer;
pub mod transport;

pub use channels::{inbound_channel, InboundReceiver, InboundSender, InboundSysEx, DEFAULT_INBOUND_BUFFER_SIZE};
pub use coalescer::{Outbound, OutboundQueue, OutboundRecord};
pub use events::SessionEvent;
pub use midi_engine::{find_port, list_ports, MidiEngine, MidiError, MidiPorts, MidiSettings};
pub use pacing::{PacingTimer, DEFAULT_PACING_INTERVAL};
pub use session::{EditorSession, Focus};
pub use transfer::{BulkTransfer, DumpOutcome, TransferJob, TransferState};
pub use transport::{RecordingTransport, Transport, TransportError};
