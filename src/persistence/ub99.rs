//! UB99 bank files.
//!
//! The vendor librarian's format: two identical 0x40 byte headers holding
//! `UB99 V1.00`, a block of 12 byte names, and a block of raw 159 byte
//! patches. Both blocks are zero padded to fixed sizes, giving 0x4400 bytes.

use std::path::Path;

use super::bank::BankError;
use crate::patch::{Patch, NUM_PATCHES, PATCH_NAME, PATCH_NAME_LAST, PATCH_TOTAL_LENGTH};

/// File identifier, repeated at the start of both headers.
pub const UB99_IDENTIFIER: &[u8; 10] = b"UB99 V1.00";

const HEADER_LENGTH: usize = 0x40;
const NAMES_BLOCK_OFFSET: usize = HEADER_LENGTH * 2;
const PATCH_DATA_BLOCK_OFFSET: usize = 0x600;
/// Size of a complete UB99 file.
pub const UB99_FILE_LENGTH: usize = 0x4400;

/// Parse a UB99 image into patches.
pub fn from_bytes(bytes: &[u8]) -> Result<Vec<Patch>, BankError> {
    let id_len = UB99_IDENTIFIER.len();
    let header_ok = |at: usize| bytes.get(at..at + id_len) == Some(&UB99_IDENTIFIER[..]);
    if !header_ok(0) || !header_ok(HEADER_LENGTH) {
        return Err(BankError::InvalidUb99Header);
    }

    let data = bytes.get(PATCH_DATA_BLOCK_OFFSET..).unwrap_or_default();
    data.chunks_exact(PATCH_TOTAL_LENGTH)
        .take(NUM_PATCHES)
        .enumerate()
        .map(|(i, chunk)| {
            Patch::from_bytes(chunk).map_err(|source| BankError::InvalidPatch {
                number: i + 1,
                source,
            })
        })
        .collect()
}

/// Render patches as a UB99 image. At most 99 patches are written.
pub fn to_bytes(patches: &[Patch]) -> Vec<u8> {
    let patches = &patches[..patches.len().min(NUM_PATCHES)];
    let mut out = vec![0u8; UB99_FILE_LENGTH];
    out[..UB99_IDENTIFIER.len()].copy_from_slice(UB99_IDENTIFIER);
    out[HEADER_LENGTH..HEADER_LENGTH + UB99_IDENTIFIER.len()].copy_from_slice(UB99_IDENTIFIER);

    for (i, patch) in patches.iter().enumerate() {
        let name = &patch.as_bytes()[PATCH_NAME..PATCH_NAME_LAST];
        let at = NAMES_BLOCK_OFFSET + i * name.len();
        out[at..at + name.len()].copy_from_slice(name);

        let at = PATCH_DATA_BLOCK_OFFSET + i * PATCH_TOTAL_LENGTH;
        out[at..at + PATCH_TOTAL_LENGTH].copy_from_slice(patch.as_bytes());
    }
    out
}

/// Load patches from a UB99 file.
pub fn load_from_file(path: &Path) -> Result<Vec<Patch>, BankError> {
    let bytes = std::fs::read(path)?;
    from_bytes(&bytes)
}

/// Save patches to a UB99 file.
pub fn save_to_file(patches: &[Patch], path: &Path) -> Result<(), BankError> {
    std::fs::write(path, to_bytes(patches))?;
    Ok(())
}
