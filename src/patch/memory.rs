use std::sync::Arc;

use crate::host::{Address, Host};

use super::{PatchError, Result};

/// A reversible byte overwrite at a fixed address.
///
/// The bytes found at construction time are the restore image; revert writes
/// them back verbatim. Writes are bracketed by the host's protection toggles
/// since the target is normally read-only code.
pub struct MemoryPatch {
    host: Arc<dyn Host>,
    target: Address,
    original: Vec<u8>,
    replacement: Vec<u8>,
    applied: bool,
}

impl MemoryPatch {
    /// Snapshot `replacement.len()` bytes at `target` and prepare the patch.
    ///
    /// # Safety
    ///
    /// `target` must be readable for `replacement.len()` bytes, and writable
    /// for that range once the host lifts protection, for the lifetime of
    /// this patch.
    pub unsafe fn new(host: Arc<dyn Host>, target: Address, replacement: Vec<u8>) -> Result<Self> {
        if replacement.is_empty() {
            return Err(PatchError::Empty);
        }

        let mut original = vec![0u8; replacement.len()];
        // Safety: caller guarantees readability of the range.
        unsafe {
            std::ptr::copy_nonoverlapping(
                target as *const u8,
                original.as_mut_ptr(),
                replacement.len(),
            );
        }

        Ok(Self {
            host,
            target,
            original,
            replacement,
            applied: false,
        })
    }

    fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.host.set_memory_rw(self.target, bytes.len())?;
        // Safety: range validity is the construction contract; the host just
        // made it writable.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.target as *mut u8, bytes.len());
        }
        self.host.set_memory_ro(self.target, bytes.len())?;
        Ok(())
    }

    pub fn apply(&mut self) -> Result<()> {
        if self.applied {
            return Err(PatchError::AlreadyApplied);
        }

        self.write_bytes(&self.replacement)?;
        self.applied = true;
        log::debug!(
            "Patched {} bytes at {:#x}",
            self.replacement.len(),
            self.target
        );
        Ok(())
    }

    pub fn revert(&mut self) -> Result<()> {
        if !self.applied {
            return Err(PatchError::NotApplied);
        }

        self.write_bytes(&self.original)?;
        self.applied = false;
        log::debug!(
            "Reverted {} bytes at {:#x}",
            self.original.len(),
            self.target
        );
        Ok(())
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    pub fn target(&self) -> Address {
        self.target
    }
}

impl Drop for MemoryPatch {
    fn drop(&mut self) {
        if self.applied {
            if let Err(err) = self.revert() {
                log::error!("Failed to revert patch at {:#x} on drop: {err}", self.target);
            }
        }
    }
}
