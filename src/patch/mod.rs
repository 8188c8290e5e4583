//! Patch module
//!
//! The 159 byte patch layout, effect type ids and the two-copy patch store.

pub mod data;
pub mod effect_type;
pub mod store;

pub use data::{
    touches_name, Patch, StoreError, CONTROL1, CONTROL2, CONTROL3, NUM_PATCHES,
    PATCH_COMMON_LENGTH, PATCH_EFFECT_LENGTH, PATCH_NAME, PATCH_NAME_LAST, PATCH_NAME_LENGTH,
    PATCH_TOTAL_LENGTH, PATCH_TYPE,
};
pub use effect_type::EffectType;
pub use store::{PatchRow, PatchStore, PendingEdit, WriteOutcome};
