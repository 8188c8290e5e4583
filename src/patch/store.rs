//! Patch store.
//!
//! Holds two copies of every patch slot: the last state known to be on the
//! device, and the edited working copy. A slot is dirty while the two differ.
//! Edits made while an editor still holds input focus can be parked in a
//! single pending edit and applied once focus is released. Later writes never
//! lose to it: parking another edit applies the earlier one first, and a
//! direct write over its range applies it before writing.

use super::data::{check_range, touches_name, Patch, StoreError, NUM_PATCHES};
use super::effect_type::EffectType;

/// An edit whose store write is deferred until focus is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    /// Patch slot.
    pub patch: usize,
    /// Absolute offset inside the patch.
    pub offset: usize,
    /// Bytes to write.
    pub bytes: Vec<u8>,
}

impl PendingEdit {
    /// Whether this edit writes any byte of `patch` in `offset..offset + len`.
    pub fn overlaps(&self, patch: usize, offset: usize, len: usize) -> bool {
        self.patch == patch && self.offset < offset + len && offset < self.offset + self.bytes.len()
    }
}

/// What a store write changed beyond the bytes themselves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriteOutcome {
    /// Patch slot written.
    pub patch: usize,
    /// New display label when the write touched the patch name.
    pub renamed: Option<String>,
}

/// One line of a patch listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRow {
    /// 1-based patch number as shown on the device.
    pub number: usize,
    /// Patch name.
    pub name: String,
    /// Effect algorithm, if known.
    pub effect_type: Option<EffectType>,
    /// Whether the edited copy differs from the device copy.
    pub dirty: bool,
}

/// Device and edited copies of every patch slot.
#[derive(Debug, Clone)]
pub struct PatchStore {
    device: Vec<Patch>,
    edited: Vec<Patch>,
    current: Option<usize>,
    pending: Option<PendingEdit>,
}

impl PatchStore {
    /// A store with all 99 slots zeroed.
    pub fn new() -> Self {
        Self::with_len(NUM_PATCHES)
    }

    /// A store with `len` zeroed slots.
    pub fn with_len(len: usize) -> Self {
        Self {
            device: vec![Patch::new(); len],
            edited: vec![Patch::new(); len],
            current: None,
            pending: None,
        }
    }

    /// A store whose device and edited copies both start as `patches`.
    pub fn from_patches(patches: Vec<Patch>) -> Self {
        Self {
            device: patches.clone(),
            edited: patches,
            current: None,
            pending: None,
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.edited.len()
    }

    /// Whether the store has no slots.
    pub fn is_empty(&self) -> bool {
        self.edited.is_empty()
    }

    fn check_index(&self, index: usize) -> Result<(), StoreError> {
        if index < self.edited.len() {
            Ok(())
        } else {
            Err(StoreError::NoSuchPatch(index))
        }
    }

    /// Edited copy of a slot.
    pub fn patch(&self, index: usize) -> Option<&Patch> {
        self.edited.get(index)
    }

    /// Last known device copy of a slot.
    pub fn device_patch(&self, index: usize) -> Option<&Patch> {
        self.device.get(index)
    }

    /// All edited copies in slot order.
    pub fn patches(&self) -> &[Patch] {
        &self.edited
    }

    /// Make `index` the patch being edited.
    pub fn select(&mut self, index: usize) -> Result<(), StoreError> {
        self.check_index(index)?;
        self.current = Some(index);
        Ok(())
    }

    /// The patch being edited, if any.
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Read bytes from the edited copy.
    pub fn bytes(&self, index: usize, offset: usize, len: usize) -> Result<&[u8], StoreError> {
        self.check_index(index)?;
        self.edited[index].bytes(offset, len)
    }

    /// Overwrite bytes in the edited copy. A pending edit overlapping the
    /// range is older than this write, so it is applied first and then
    /// overwritten.
    pub fn set_bytes(
        &mut self,
        index: usize,
        offset: usize,
        bytes: &[u8],
    ) -> Result<WriteOutcome, StoreError> {
        self.check_index(index)?;
        check_range(offset, bytes.len())?;

        let mut touched_name = touches_name(offset, bytes.len());
        let stale = self
            .pending
            .as_ref()
            .is_some_and(|p| p.overlaps(index, offset, bytes.len()));
        if stale {
            if let Some(edit) = self.pending.take() {
                self.edited[index].set_bytes(edit.offset, &edit.bytes)?;
                touched_name |= touches_name(edit.offset, edit.bytes.len());
            }
        }
        self.edited[index].set_bytes(offset, bytes)?;

        Ok(WriteOutcome {
            patch: index,
            renamed: touched_name.then(|| self.label_of(index)),
        })
    }

    /// Park an edit until focus is released. An earlier pending edit is
    /// applied first and its outcome returned. The range is validated now so
    /// the later apply cannot fail on it.
    pub fn defer(
        &mut self,
        index: usize,
        offset: usize,
        bytes: &[u8],
    ) -> Result<Option<WriteOutcome>, StoreError> {
        self.check_index(index)?;
        check_range(offset, bytes.len())?;
        let flushed = self.release_focus()?;
        self.pending = Some(PendingEdit {
            patch: index,
            offset,
            bytes: bytes.to_vec(),
        });
        Ok(flushed)
    }

    /// The edit waiting for focus release.
    pub fn pending(&self) -> Option<&PendingEdit> {
        self.pending.as_ref()
    }

    /// Apply the pending edit, if any.
    pub fn release_focus(&mut self) -> Result<Option<WriteOutcome>, StoreError> {
        match self.pending.take() {
            Some(edit) => self
                .set_bytes(edit.patch, edit.offset, &edit.bytes)
                .map(Some),
            None => Ok(None),
        }
    }

    /// Drop the pending edit without applying it.
    pub fn discard_pending(&mut self) {
        self.pending = None;
    }

    /// Store a patch the device reported: both copies take it.
    pub fn store_received(&mut self, index: usize, patch: Patch) -> Result<(), StoreError> {
        self.check_index(index)?;
        self.device[index] = patch.clone();
        self.edited[index] = patch;
        if self.pending.as_ref().is_some_and(|p| p.patch == index) {
            self.pending = None;
        }
        Ok(())
    }

    /// Update only the device copy, keeping local edits.
    pub fn set_device_patch(&mut self, index: usize, patch: Patch) -> Result<(), StoreError> {
        self.check_index(index)?;
        self.device[index] = patch;
        Ok(())
    }

    /// Mark the edited copy as what the device holds.
    pub fn commit(&mut self, index: usize) -> Result<(), StoreError> {
        self.check_index(index)?;
        self.device[index] = self.edited[index].clone();
        Ok(())
    }

    /// Throw away local edits of a slot.
    pub fn revert(&mut self, index: usize) -> Result<(), StoreError> {
        self.check_index(index)?;
        self.edited[index] = self.device[index].clone();
        Ok(())
    }

    /// Whether the edited copy differs from the device copy.
    pub fn is_dirty(&self, index: usize) -> bool {
        match (self.edited.get(index), self.device.get(index)) {
            (Some(edited), Some(device)) => edited != device,
            _ => false,
        }
    }

    /// Indices of all dirty slots.
    pub fn dirty_patches(&self) -> Vec<usize> {
        (0..self.len()).filter(|&i| self.is_dirty(i)).collect()
    }

    /// Swap the edited copies of two slots.
    pub fn swap(&mut self, a: usize, b: usize) -> Result<(), StoreError> {
        self.check_index(a)?;
        self.check_index(b)?;
        self.edited.swap(a, b);
        Ok(())
    }

    /// Copy the edited copy of one slot over another.
    pub fn copy(&mut self, from: usize, to: usize) -> Result<(), StoreError> {
        self.check_index(from)?;
        self.check_index(to)?;
        self.edited[to] = self.edited[from].clone();
        Ok(())
    }

    /// Replace the edited copies with an imported bank. Slots past the end of
    /// `patches` are left untouched; extra patches are ignored.
    pub fn import(&mut self, patches: &[Patch]) -> usize {
        let count = patches.len().min(self.edited.len());
        self.edited[..count].clone_from_slice(&patches[..count]);
        count
    }

    /// Display label of a slot: zero-padded 1-based number and name.
    pub fn display_label(&self, index: usize) -> Option<String> {
        (index < self.len()).then(|| self.label_of(index))
    }

    fn label_of(&self, index: usize) -> String {
        format!("{:02} {}", index + 1, self.edited[index].name())
    }

    /// Listing of every slot.
    pub fn rows(&self) -> Vec<PatchRow> {
        self.edited
            .iter()
            .enumerate()
            .map(|(i, patch)| PatchRow {
                number: i + 1,
                name: patch.name(),
                effect_type: patch.effect_type(),
                dirty: self.is_dirty(i),
            })
            .collect()
    }
}

impl Default for PatchStore {
    fn default() -> Self {
        Self::new()
    }
}
