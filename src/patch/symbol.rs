use crate::host::Address;
use crate::resolver::SymbolResolver;

use super::{MemoryPatch, PatchError, Result};

/// Length of the jump stub written over an overridden routine.
pub const JUMP_STUB_LEN: usize = 14;

/// Encode an unconditional absolute jump to `target`.
///
/// `FF 25 00000000` jumps through the 8-byte address stored immediately
/// after the instruction, so the stub works at any address without
/// relocation.
pub fn absolute_jump(target: Address) -> [u8; JUMP_STUB_LEN] {
    let mut stub = [0u8; JUMP_STUB_LEN];
    stub[..6].copy_from_slice(&[0xFF, 0x25, 0x00, 0x00, 0x00, 0x00]);
    stub[6..].copy_from_slice(&(target as u64).to_le_bytes());
    stub
}

/// A standalone routine override: the named routine's entry point is
/// replaced by a jump to ours, and put back on restore.
pub struct SymbolOverride {
    name: String,
    patch: MemoryPatch,
}

impl SymbolOverride {
    /// Resolve `name` and redirect it to `replacement`.
    pub fn install(resolver: &SymbolResolver, name: &str, replacement: Address) -> Result<Self> {
        let target = resolver
            .resolve(name)
            .ok_or_else(|| PatchError::SymbolNotFound(name.to_owned()))?;

        let stub = absolute_jump(replacement);
        // Safety: target is a resolved routine entry point, readable and
        // (once unprotected) writable for the stub's length.
        let mut patch = unsafe {
            MemoryPatch::new(resolver.host().clone(), target, stub.to_vec())?
        };
        patch.apply()?;

        log::info!(
            "Overrode '{}' at {:#x}, now jumps to {:#x}",
            name,
            target,
            replacement
        );
        Ok(Self {
            name: name.to_owned(),
            patch,
        })
    }

    /// Put the original bytes back. Consumes the override; the patch's drop
    /// guard would otherwise revert a second time.
    pub fn restore(mut self) -> Result<()> {
        self.patch.revert()?;
        log::info!("Restored '{}'", self.name);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> Address {
        self.patch.target()
    }
}
