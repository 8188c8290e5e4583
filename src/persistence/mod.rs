//! Persistence module
//!
//! Bank save/load: JSON via serde, the vendor UB99 binary format, and
//! Standard MIDI Files of bulk dumps.

pub mod bank;
pub mod smf;
pub mod ub99;

use std::path::Path;

use crate::patch::Patch;

pub use bank::{load_from_file, save_to_file, BankError, PatchBank, PatchRecord, BANK_VERSION};

/// On-disk bank formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankFormat {
    Json,
    Ub99,
    Smf,
}

impl BankFormat {
    /// Pick the format from the file extension: `.ub9`/`.ub99` is UB99,
    /// `.mid`/`.midi` is SMF, anything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("ub9") | Some("ub99") => BankFormat::Ub99,
            Some("mid") | Some("midi") => BankFormat::Smf,
            _ => BankFormat::Json,
        }
    }
}

/// Load patches in slot order from any format.
pub fn load_patches(path: &Path) -> Result<Vec<Patch>, BankError> {
    match BankFormat::from_path(path) {
        BankFormat::Json => load_from_file(path)?.to_patches(),
        BankFormat::Ub99 => ub99::load_from_file(path),
        BankFormat::Smf => smf::load_from_file(path),
    }
}

/// Save patches in slot order to any format.
pub fn save_patches(patches: &[Patch], path: &Path) -> Result<(), BankError> {
    match BankFormat::from_path(path) {
        BankFormat::Json => {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Untitled");
            save_to_file(&PatchBank::from_patches(name, patches), path)
        }
        BankFormat::Ub99 => ub99::save_to_file(patches, path),
        BankFormat::Smf => smf::save_to_file(patches, path),
    }
}
