//! Outbound message queue.
//!
//! Every outbound frame waits here until the pacing timer lets it go. Parameter
//! sends are keyed by (section, address): a newer value for the same address
//! replaces the queued one and moves to the back of the queue, so a burst of
//! knob movement collapses to the latest value. Whole frames (bulk dumps and
//! dump requests) have no key and are never replaced; they all belong to the
//! current bulk transfer and are purged together when it is replaced or
//! cancelled. Everything leaves in insertion order.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use crate::sysex::{parameter_send, ParameterAddress};

/// A queued outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Parameter send; the frame is built when it is transmitted.
    Parameter {
        address: ParameterAddress,
        value: Vec<u8>,
    },
    /// A fully encoded frame.
    Frame(Vec<u8>),
}

impl Outbound {
    /// Coalescing key, if this message has one.
    pub fn address(&self) -> Option<ParameterAddress> {
        match self {
            Outbound::Parameter { address, .. } => Some(*address),
            Outbound::Frame(_) => None,
        }
    }

    /// The wire frame for this message.
    pub fn to_frame(&self) -> Vec<u8> {
        match self {
            Outbound::Parameter { address, value } => parameter_send(*address, value),
            Outbound::Frame(frame) => frame.clone(),
        }
    }
}

/// A message plus the time it was (last) enqueued.
#[derive(Debug, Clone)]
pub struct OutboundRecord {
    pub message: Outbound,
    pub enqueued_at: Instant,
}

/// Insertion-ordered queue with last-writer-wins per parameter address.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    next_seq: u64,
    entries: BTreeMap<u64, OutboundRecord>,
    by_address: HashMap<ParameterAddress, u64>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a parameter value. Returns true if it replaced a queued value for
    /// the same address.
    pub fn push_parameter(&mut self, address: ParameterAddress, value: &[u8], now: Instant) -> bool {
        let replaced = match self.by_address.remove(&address) {
            Some(seq) => self.entries.remove(&seq).is_some(),
            None => false,
        };
        let seq = self.insert(Outbound::Parameter {
            address,
            value: value.to_vec(),
        }, now);
        self.by_address.insert(address, seq);
        replaced
    }

    /// Queue a complete frame.
    pub fn push_frame(&mut self, frame: Vec<u8>, now: Instant) {
        self.insert(Outbound::Frame(frame), now);
    }

    fn insert(&mut self, message: Outbound, now: Instant) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            seq,
            OutboundRecord {
                message,
                enqueued_at: now,
            },
        );
        seq
    }

    /// Drop every queued whole frame, keeping parameter sends. Returns how
    /// many were dropped.
    pub fn remove_frames(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, record| matches!(record.message, Outbound::Parameter { .. }));
        before - self.entries.len()
    }

    /// Take the oldest message.
    pub fn pop(&mut self) -> Option<OutboundRecord> {
        let (_, record) = self.entries.pop_first()?;
        if let Some(address) = record.message.address() {
            self.by_address.remove(&address);
        }
        Some(record)
    }

    /// The value currently queued for `address`.
    pub fn queued_value(&self, address: ParameterAddress) -> Option<&[u8]> {
        let seq = self.by_address.get(&address)?;
        match &self.entries.get(seq)?.message {
            Outbound::Parameter { value, .. } => Some(value.as_slice()),
            Outbound::Frame(_) => None,
        }
    }

    /// Queued messages in transmission order.
    pub fn iter(&self) -> impl Iterator<Item = &OutboundRecord> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_address.clear();
    }
}
