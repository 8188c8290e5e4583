//! Inbound Channels
//!
//! Lock-free handoff of received SysEx frames from the MIDI driver thread to
//! the thread that owns the editor session. Uses an rtrb ring buffer as an
//! SPSC (single-producer, single-consumer) queue, so inbound frames keep their
//! arrival order and the session never needs a lock.

use rtrb::{Consumer, Producer, RingBuffer};

/// Default number of frames the inbound buffer can hold.
pub const DEFAULT_INBOUND_BUFFER_SIZE: usize = 256;

/// One complete SysEx frame as delivered by the MIDI backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundSysEx {
    /// Raw frame bytes, 0xF0 through 0xF7.
    pub bytes: Vec<u8>,
    /// Backend timestamp in microseconds.
    pub timestamp_us: u64,
}

/// Create a connected sender/receiver pair.
///
/// # Arguments
/// * `capacity` - Number of frames the buffer can hold
pub fn inbound_channel(capacity: usize) -> (InboundSender, InboundReceiver) {
    let (producer, consumer) = RingBuffer::new(capacity);
    (InboundSender { producer }, InboundReceiver { consumer })
}

/// Driver-side half, moved into the MIDI input callback.
pub struct InboundSender {
    producer: Producer<InboundSysEx>,
}

impl InboundSender {
    /// Queue a frame.
    /// Returns Err(frame) if the buffer is full.
    ///
    /// This is a non-blocking operation - it never waits for space.
    pub fn push(&mut self, frame: InboundSysEx) -> Result<(), InboundSysEx> {
        self.producer
            .push(frame)
            .map_err(|rtrb::PushError::Full(frame)| frame)
    }

    /// Check how many frames can still be queued.
    pub fn slots_available(&self) -> usize {
        self.producer.slots()
    }
}

/// Session-side half.
pub struct InboundReceiver {
    consumer: Consumer<InboundSysEx>,
}

impl InboundReceiver {
    /// Receive the oldest pending frame, if any.
    pub fn recv(&mut self) -> Option<InboundSysEx> {
        self.consumer.pop().ok()
    }

    /// Drain all pending frames in arrival order.
    pub fn drain(&mut self) -> impl Iterator<Item = InboundSysEx> + '_ {
        std::iter::from_fn(|| self.recv())
    }

    /// Number of frames waiting.
    pub fn pending(&self) -> usize {
        self.consumer.slots()
    }
}
