//! Fixed-layout patch buffer.
//!
//! A Magicstomp patch is exactly 159 bytes: a 32 byte common block followed by
//! a 127 byte effect block whose meaning depends on the effect type.

use super::effect_type::EffectType;

/// Number of user patch slots on the device.
pub const NUM_PATCHES: usize = 99;

/// Offset of the effect type (2 bytes, only the low byte is used).
pub const PATCH_TYPE: usize = 0;
/// Offset of knob 1 assignment (2 bytes).
pub const CONTROL1: usize = 2;
/// Offset of knob 2 assignment (2 bytes).
pub const CONTROL2: usize = 4;
/// Offset of knob 3 assignment (2 bytes).
pub const CONTROL3: usize = 6;
/// Offset of the patch name.
pub const PATCH_NAME: usize = 16;
/// Length of the patch name in bytes.
pub const PATCH_NAME_LENGTH: usize = 12;
/// One past the last name byte.
pub const PATCH_NAME_LAST: usize = PATCH_NAME + PATCH_NAME_LENGTH;
/// Length of the common section.
pub const PATCH_COMMON_LENGTH: usize = 0x20;
/// Length of the effect section.
pub const PATCH_EFFECT_LENGTH: usize = 0x7F;
/// Total patch length.
pub const PATCH_TOTAL_LENGTH: usize = PATCH_COMMON_LENGTH + PATCH_EFFECT_LENGTH;

/// Error type for patch and patch store access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// `offset + len` runs past the end of the patch.
    OutOfRange { offset: usize, len: usize },
    /// Patch index outside the store.
    NoSuchPatch(usize),
    /// A buffer that should hold a whole patch has the wrong size.
    WrongLength(usize),
    /// An edit arrived while no patch is selected.
    NoPatchSelected,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { offset, len } => write!(
                f,
                "Patch access out of range: offset {} + length {} > {}",
                offset, len, PATCH_TOTAL_LENGTH
            ),
            Self::NoSuchPatch(index) => write!(f, "No patch with index {}", index),
            Self::WrongLength(len) => write!(
                f,
                "Patch data has {} bytes, expected {}",
                len, PATCH_TOTAL_LENGTH
            ),
            Self::NoPatchSelected => write!(f, "No patch selected"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Check that `offset..offset + len` lies inside a patch.
pub(crate) fn check_range(offset: usize, len: usize) -> Result<(), StoreError> {
    match offset.checked_add(len) {
        Some(end) if end <= PATCH_TOTAL_LENGTH => Ok(()),
        _ => Err(StoreError::OutOfRange { offset, len }),
    }
}

/// Whether `offset..offset + len` overlaps the patch name.
pub fn touches_name(offset: usize, len: usize) -> bool {
    offset < PATCH_NAME_LAST && offset + len > PATCH_NAME
}

/// One patch worth of raw device data.
#[derive(Clone, PartialEq, Eq)]
pub struct Patch {
    data: [u8; PATCH_TOTAL_LENGTH],
}

impl Patch {
    /// An all-zero patch.
    pub fn new() -> Self {
        Self {
            data: [0; PATCH_TOTAL_LENGTH],
        }
    }

    /// Build a patch from exactly 159 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        let data = bytes
            .try_into()
            .map_err(|_| StoreError::WrongLength(bytes.len()))?;
        Ok(Self { data })
    }

    /// The whole patch.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Read `len` bytes at `offset`.
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&[u8], StoreError> {
        check_range(offset, len)?;
        Ok(&self.data[offset..offset + len])
    }

    /// Overwrite bytes at `offset`.
    pub fn set_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StoreError> {
        check_range(offset, bytes.len())?;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Patch name with trailing padding removed.
    pub fn name(&self) -> String {
        let raw = &self.data[PATCH_NAME..PATCH_NAME_LAST];
        let name: String = raw.iter().map(|&b| b as char).collect();
        name.trim_end_matches(&[' ', '\0'][..]).to_string()
    }

    /// Set the name, truncated to 12 characters and padded with spaces.
    /// Characters outside printable ASCII are replaced by `?`.
    pub fn set_name(&mut self, name: &str) {
        let mut raw = [b' '; PATCH_NAME_LENGTH];
        for (slot, c) in raw.iter_mut().zip(name.chars()) {
            *slot = if c.is_ascii() && !c.is_ascii_control() {
                c as u8
            } else {
                b'?'
            };
        }
        self.data[PATCH_NAME..PATCH_NAME_LAST].copy_from_slice(&raw);
    }

    /// Effect algorithm, if the type byte holds a known id.
    pub fn effect_type(&self) -> Option<EffectType> {
        EffectType::from_id(self.data[PATCH_TYPE + 1])
    }
}

impl Default for Patch {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Patch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Patch")
            .field("name", &self.name())
            .field("effect_type", &self.effect_type())
            .finish()
    }
}
