//! Inbound frame classification.
//!
//! Raw SysEx bytes are classified once, at the transport boundary, into a
//! closed set of frame kinds. Anything that fails validation comes out as
//! [`InboundFrame::Malformed`] carrying the reason; decoding itself never
//! fails.

use super::frame::{
    checksum, ParameterAddress, Section, BULK_HEADER, DUMP_REQUEST_HEADER, MIN_BULK_FRAME_LENGTH,
    PARAMETER_SEND_HEADER, SYSEX_END,
};

/// Why an inbound frame was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Frame is shorter than its kind allows.
    TooShort { len: usize },
    /// No known header matches.
    UnknownHeader,
    /// Last byte is not 0xF7.
    MissingTerminator,
    /// Checksum byte does not match the payload.
    ChecksumMismatch { expected: u8, found: u8 },
    /// Parameter send frame with a section byte other than 0x00/0x01.
    InvalidSection(u8),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooShort { len } => write!(f, "Frame too short ({} bytes)", len),
            Self::UnknownHeader => write!(f, "Unknown frame header"),
            Self::MissingTerminator => write!(f, "Frame not terminated by F7"),
            Self::ChecksumMismatch { expected, found } => write!(
                f,
                "Checksum error: expected {:02X}, found {:02X}",
                expected, found
            ),
            Self::InvalidSection(byte) => write!(f, "Invalid section byte {:02X}", byte),
        }
    }
}

impl std::error::Error for FrameError {}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// A single parameter write (the device never sends these on its own,
    /// but an echoing MIDI thru can).
    ParameterSend {
        /// Target parameter.
        address: ParameterAddress,
        /// Value bytes.
        value: Vec<u8>,
    },
    /// A checksum-verified bulk dump.
    BulkDump {
        /// Bytes between the header and the checksum.
        payload: Vec<u8>,
    },
    /// A dump request, with the patch number if one was present.
    DumpRequest { patch: Option<u8> },
    /// Anything that failed validation.
    Malformed(FrameError),
}

/// Classify raw SysEx bytes.
pub fn decode(bytes: &[u8]) -> InboundFrame {
    if bytes.starts_with(&PARAMETER_SEND_HEADER) {
        return decode_parameter_send(bytes);
    }
    if bytes.starts_with(&DUMP_REQUEST_HEADER) {
        return decode_dump_request(bytes);
    }
    match validate_bulk_dump(bytes) {
        Ok(payload) => InboundFrame::BulkDump {
            payload: payload.to_vec(),
        },
        Err(e) => InboundFrame::Malformed(e),
    }
}

/// Validate a bulk dump frame and return its payload.
///
/// Checks run in a fixed order: minimum length, header, terminator, checksum.
pub fn validate_bulk_dump(bytes: &[u8]) -> Result<&[u8], FrameError> {
    if bytes.len() < MIN_BULK_FRAME_LENGTH {
        return Err(FrameError::TooShort { len: bytes.len() });
    }
    if !bytes.starts_with(&BULK_HEADER) {
        return Err(FrameError::UnknownHeader);
    }
    if bytes[bytes.len() - 1] != SYSEX_END {
        return Err(FrameError::MissingTerminator);
    }

    let payload = &bytes[BULK_HEADER.len()..bytes.len() - 2];
    let expected = checksum(payload);
    let found = bytes[bytes.len() - 2];
    if expected != found {
        return Err(FrameError::ChecksumMismatch { expected, found });
    }
    Ok(payload)
}

fn decode_parameter_send(bytes: &[u8]) -> InboundFrame {
    // header, section, address, at least one value byte, terminator
    let min_len = PARAMETER_SEND_HEADER.len() + 4;
    if bytes.len() < min_len {
        return InboundFrame::Malformed(FrameError::TooShort { len: bytes.len() });
    }
    if bytes[bytes.len() - 1] != SYSEX_END {
        return InboundFrame::Malformed(FrameError::MissingTerminator);
    }

    let section_byte = bytes[PARAMETER_SEND_HEADER.len()];
    let Some(section) = Section::from_byte(section_byte) else {
        return InboundFrame::Malformed(FrameError::InvalidSection(section_byte));
    };
    let address = ParameterAddress::new(section, bytes[PARAMETER_SEND_HEADER.len() + 1]);
    let value = bytes[PARAMETER_SEND_HEADER.len() + 2..bytes.len() - 1].to_vec();

    InboundFrame::ParameterSend { address, value }
}

fn decode_dump_request(bytes: &[u8]) -> InboundFrame {
    if bytes.len() == DUMP_REQUEST_HEADER.len() {
        return InboundFrame::DumpRequest { patch: None };
    }
    if bytes[bytes.len() - 1] != SYSEX_END {
        return InboundFrame::Malformed(FrameError::MissingTerminator);
    }
    let patch = bytes[DUMP_REQUEST_HEADER.len()..bytes.len() - 1].first().copied();
    InboundFrame::DumpRequest { patch }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysex::frame::{bulk_dump, dump_request, parameter_send};

    fn sample_payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| ((i * 7 + 3) & 0x7F) as u8).collect()
    }

    #[test]
    fn test_valid_bulk_dump_is_accepted() {
        let payload = sample_payload(151);
        let frame = bulk_dump(&payload);
        assert_eq!(validate_bulk_dump(&frame), Ok(&payload[..]));
        assert_eq!(decode(&frame), InboundFrame::BulkDump { payload });
    }

    #[test]
    fn test_single_bit_flips_are_detected() {
        let payload = sample_payload(159);
        let frame = bulk_dump(&payload);

        for position in [0usize, 1, 15, 16, 31, 32, 80, 150, 158] {
            for bit in [0u8, 3, 6] {
                let mut corrupted = frame.clone();
                corrupted[8 + position] ^= 1 << bit;
                assert!(
                    matches!(
                        validate_bulk_dump(&corrupted),
                        Err(FrameError::ChecksumMismatch { .. })
                    ),
                    "flip of bit {} at payload byte {} went unnoticed",
                    bit,
                    position
                );
            }
        }
    }

    #[test]
    fn test_short_frames_are_rejected() {
        let frame = bulk_dump(&[0x01, 0x02]);
        assert_eq!(frame.len(), 12);
        assert_eq!(validate_bulk_dump(&frame), Err(FrameError::TooShort { len: 12 }));

        for len in 0..MIN_BULK_FRAME_LENGTH {
            let bytes = vec![0xF0; len];
            assert!(matches!(
                validate_bulk_dump(&bytes),
                Err(FrameError::TooShort { .. })
            ));
        }
    }

    #[test]
    fn test_wrong_header_is_rejected() {
        let mut frame = bulk_dump(&sample_payload(10));
        frame[3] = 0x31;
        assert_eq!(validate_bulk_dump(&frame), Err(FrameError::UnknownHeader));
        assert_eq!(decode(&frame), InboundFrame::Malformed(FrameError::UnknownHeader));
    }

    #[test]
    fn test_missing_terminator_is_rejected() {
        let mut frame = bulk_dump(&sample_payload(10));
        let last = frame.len() - 1;
        frame[last] = 0x00;
        assert_eq!(validate_bulk_dump(&frame), Err(FrameError::MissingTerminator));
    }

    #[test]
    fn test_decode_parameter_send() {
        let frame = parameter_send(ParameterAddress::from_offset(16), &[b'A']);
        assert_eq!(
            decode(&frame),
            InboundFrame::ParameterSend {
                address: ParameterAddress::new(Section::Common, 16),
                value: vec![b'A'],
            }
        );
    }

    #[test]
    fn test_decode_parameter_send_bad_section() {
        let mut frame = parameter_send(ParameterAddress::from_offset(40), &[0x01]);
        frame[7] = 0x05;
        assert_eq!(
            decode(&frame),
            InboundFrame::Malformed(FrameError::InvalidSection(0x05))
        );
    }

    #[test]
    fn test_decode_dump_request() {
        assert_eq!(
            decode(&dump_request(42)),
            InboundFrame::DumpRequest { patch: Some(42) }
        );
        assert_eq!(
            decode(&DUMP_REQUEST_HEADER),
            InboundFrame::DumpRequest { patch: None }
        );
    }
}
