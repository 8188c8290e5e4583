//! Patch bank serialization.
//!
//! This module defines the JSON form of a patch bank. Each record keeps the raw
//! 159 patch bytes alongside the decoded name and effect type, so files stay
//! readable while loading only depends on the bytes.

use serde::{Deserialize, Serialize};

use crate::patch::{Patch, StoreError};

/// Current bank format version.
/// Increment this when making breaking changes to the format.
pub const BANK_VERSION: u32 = 1;

/// A saved bank of patches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchBank {
    /// Human-readable name for the bank.
    pub name: String,
    /// Bank format version for future compatibility.
    pub version: u32,
    /// Patch records, in any order.
    pub patches: Vec<PatchRecord>,
}

impl PatchBank {
    /// Create a new empty bank with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: BANK_VERSION,
            patches: Vec::new(),
        }
    }

    /// Build a bank from patches in slot order.
    pub fn from_patches(name: impl Into<String>, patches: &[Patch]) -> Self {
        let mut bank = Self::new(name);
        bank.patches = patches
            .iter()
            .enumerate()
            .map(|(i, patch)| PatchRecord::new(i + 1, patch))
            .collect();
        bank
    }

    /// Check if this bank version is compatible with the current format.
    pub fn is_compatible(&self) -> bool {
        self.version <= BANK_VERSION
    }

    /// Patches in slot order. Slots without a record are left zeroed.
    pub fn to_patches(&self) -> Result<Vec<Patch>, BankError> {
        let len = self.patches.iter().map(|r| r.number).max().unwrap_or(0);
        let mut patches = vec![Patch::new(); len];
        for record in &self.patches {
            if record.number == 0 {
                return Err(BankError::InvalidPatch {
                    number: 0,
                    source: StoreError::NoSuchPatch(0),
                });
            }
            patches[record.number - 1] =
                Patch::from_bytes(&record.data).map_err(|source| BankError::InvalidPatch {
                    number: record.number,
                    source,
                })?;
        }
        Ok(patches)
    }
}

impl Default for PatchBank {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Serialized data for a single patch slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchRecord {
    /// 1-based slot number.
    pub number: usize,
    /// Patch name, informational.
    pub name: String,
    /// Effect type name, informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_type: Option<String>,
    /// Raw patch bytes.
    pub data: Vec<u8>,
}

impl PatchRecord {
    /// Create a record for slot `number`.
    pub fn new(number: usize, patch: &Patch) -> Self {
        Self {
            number,
            name: patch.name(),
            effect_type: patch.effect_type().map(|t| t.name().to_string()),
            data: patch.as_bytes().to_vec(),
        }
    }
}

/// Error type for bank operations.
#[derive(Debug)]
pub enum BankError {
    /// File I/O error.
    IoError(std::io::Error),
    /// JSON serialization/deserialization error.
    SerializationError(serde_json::Error),
    /// Incompatible bank version.
    IncompatibleVersion { found: u32, expected: u32 },
    /// A record does not hold a usable patch.
    InvalidPatch { number: usize, source: StoreError },
    /// A UB99 file with a missing or damaged header.
    InvalidUb99Header,
    /// Standard MIDI File container error.
    SmfError(midly::Error),
    /// A Standard MIDI File without a single patch dump in it.
    NoPatchesInSmf,
}

impl std::fmt::Display for BankError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "File error: {}", e),
            Self::SerializationError(e) => write!(f, "Serialization error: {}", e),
            Self::IncompatibleVersion { found, expected } => {
                write!(f, "Incompatible bank version: found {}, expected <= {}", found, expected)
            }
            Self::InvalidPatch { number, source } => {
                write!(f, "Invalid patch {}: {}", number, source)
            }
            Self::InvalidUb99Header => write!(f, "Not a UB99 file"),
            Self::SmfError(e) => write!(f, "MIDI file error: {}", e),
            Self::NoPatchesInSmf => write!(f, "No patch dumps in MIDI file"),
        }
    }
}

impl std::error::Error for BankError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(e) => Some(e),
            Self::SerializationError(e) => Some(e),
            Self::InvalidPatch { source, .. } => Some(source),
            Self::SmfError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BankError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err)
    }
}

impl From<midly::Error> for BankError {
    fn from(err: midly::Error) -> Self {
        Self::SmfError(err)
    }
}

impl From<serde_json::Error> for BankError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err)
    }
}

/// Save a bank to a JSON file.
pub fn save_to_file(bank: &PatchBank, path: &std::path::Path) -> Result<(), BankError> {
    let json = serde_json::to_string_pretty(bank)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Load a bank from a JSON file.
pub fn load_from_file(path: &std::path::Path) -> Result<PatchBank, BankError> {
    let json = std::fs::read_to_string(path)?;
    let bank: PatchBank = serde_json::from_str(&json)?;

    // Version check
    if !bank.is_compatible() {
        return Err(BankError::IncompatibleVersion {
            found: bank.version,
            expected: BANK_VERSION,
        });
    }

    Ok(bank)
}
