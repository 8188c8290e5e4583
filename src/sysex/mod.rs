//! SysEx module
//!
//! Binary framing of the Magicstomp protocol: frame builders, the checksum and
//! inbound classification.

pub mod decode;
pub mod frame;

pub use decode::{decode, validate_bulk_dump, FrameError, InboundFrame};
pub use frame::{
    bulk_dump, checksum, dump_request, parameter_send, HexBytes, ParameterAddress, Section,
    BULK_HEADER, DUMP_REQUEST_HEADER, MIN_BULK_FRAME_LENGTH, PARAMETER_SEND_HEADER, SYSEX_END,
    SYSEX_START,
};
