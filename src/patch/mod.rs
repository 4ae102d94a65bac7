//! Byte-level code patching.
//!
//! [`MemoryPatch`] is the primitive: snapshot the bytes at a target address,
//! overwrite them between protection toggles, and put the exact snapshot back
//! on revert. [`SymbolOverride`] composes it into the standalone-routine
//! mechanism: resolve a name, plant an absolute jump to the replacement over
//! its entry point, undo symmetrically. All raw byte access sits in this
//! module.

mod memory;
mod symbol;

pub use memory::MemoryPatch;
pub use symbol::{absolute_jump, SymbolOverride, JUMP_STUB_LEN};

use thiserror::Error;

use crate::host::HostError;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Patch has no bytes")]
    Empty,

    #[error("Patch is already applied")]
    AlreadyApplied,

    #[error("Patch is not applied")]
    NotApplied,

    #[error("Symbol '{0}' not found")]
    SymbolNotFound(String),

    #[error(transparent)]
    Host(#[from] HostError),
}

pub type Result<T> = std::result::Result<T, PatchError>;
