//! SysEx frame construction.
//!
//! Builds the three frame kinds the Magicstomp understands: single parameter
//! sends, whole-patch bulk dumps and dump requests. Encoding never fails, every
//! frame has a bounded fixed format.

use std::fmt;

use crate::patch::{PATCH_COMMON_LENGTH, PATCH_TOTAL_LENGTH};

/// Start of exclusive.
pub const SYSEX_START: u8 = 0xF0;

/// End of exclusive.
pub const SYSEX_END: u8 = 0xF7;

/// Header of a bulk dump frame (device to editor and editor to device).
pub const BULK_HEADER: [u8; 8] = [0xF0, 0x43, 0x7D, 0x30, 0x55, 0x42, 0x39, 0x39];

/// Header of a dump request frame.
pub const DUMP_REQUEST_HEADER: [u8; 8] = [0xF0, 0x43, 0x7D, 0x50, 0x55, 0x42, 0x30, 0x01];

/// Header of a parameter send frame, including the 0x20 command byte.
pub const PARAMETER_SEND_HEADER: [u8; 7] = [0xF0, 0x43, 0x7D, 0x40, 0x55, 0x42, 0x20];

/// Bulk frames shorter than this are rejected before any other check.
pub const MIN_BULK_FRAME_LENGTH: usize = 13;

/// Which half of a patch a parameter lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    /// Offsets 0..32: type, knob assignments, name.
    Common,
    /// Offsets 32..159: the effect-specific block.
    Effect,
}

impl Section {
    /// Section byte as sent on the wire.
    pub fn byte(self) -> u8 {
        match self {
            Section::Common => 0x00,
            Section::Effect => 0x01,
        }
    }

    /// Parse a section byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Section::Common),
            0x01 => Some(Section::Effect),
            _ => None,
        }
    }
}

/// A parameter's address as the device sees it: section plus section-relative
/// address. This is the coalescing key of the outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterAddress {
    /// Common or effect section.
    pub section: Section,
    /// Address relative to the start of the section.
    pub address: u8,
}

impl ParameterAddress {
    /// Create an address from its wire components.
    pub fn new(section: Section, address: u8) -> Self {
        Self { section, address }
    }

    /// Map an absolute patch offset (0..159) to section and address.
    pub fn from_offset(offset: usize) -> Self {
        debug_assert!(offset < PATCH_TOTAL_LENGTH, "patch offset {} out of range", offset);
        if offset < PATCH_COMMON_LENGTH {
            Self::new(Section::Common, offset as u8)
        } else {
            Self::new(Section::Effect, (offset - PATCH_COMMON_LENGTH) as u8)
        }
    }

    /// Absolute patch offset of this address.
    pub fn offset(&self) -> usize {
        match self.section {
            Section::Common => self.address as usize,
            Section::Effect => PATCH_COMMON_LENGTH + self.address as usize,
        }
    }
}

/// Compute the 7-bit Yamaha checksum of a bulk payload.
///
/// The bytes are summed as wrapping 8-bit values and the two's complement of
/// the sum is masked to 7 bits, so the result is always in 0..=127.
pub fn checksum(payload: &[u8]) -> u8 {
    let sum = payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    sum.wrapping_neg() & 0x7F
}

/// Build a parameter send frame writing `value` at `address`.
pub fn parameter_send(address: ParameterAddress, value: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(PARAMETER_SEND_HEADER.len() + 3 + value.len());
    frame.extend_from_slice(&PARAMETER_SEND_HEADER);
    frame.push(address.section.byte());
    frame.push(address.address);
    frame.extend_from_slice(value);
    frame.push(SYSEX_END);
    frame
}

/// Build a bulk dump frame carrying `payload`.
pub fn bulk_dump(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(BULK_HEADER.len() + payload.len() + 2);
    frame.extend_from_slice(&BULK_HEADER);
    frame.extend_from_slice(payload);
    frame.push(checksum(payload));
    frame.push(SYSEX_END);
    frame
}

/// Build a dump request for a patch slot (0-based).
///
/// The fixed request header is followed by the patch number and the end of
/// exclusive byte.
pub fn dump_request(patch: u8) -> Vec<u8> {
    let mut frame = Vec::with_capacity(DUMP_REQUEST_HEADER.len() + 2);
    frame.extend_from_slice(&DUMP_REQUEST_HEADER);
    frame.push(patch & 0x7F);
    frame.push(SYSEX_END);
    frame
}

/// Formats a byte slice as space separated upper-case hex for diagnostics.
pub struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}
