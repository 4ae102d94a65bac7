//! Host introspection boundary.
//!
//! Everything the engine needs from the surrounding privileged environment is
//! expressed through the [`Host`] trait: the reference-counted public-export
//! mechanism, the best-effort "describe address" primitive, the boot-phase
//! indicator, the fault-handling caller copy, caller termination, the
//! dispatch-entry hooking mechanism and memory-protection toggles. Keeping
//! these behind one trait is what lets every higher layer run against an
//! in-process test double.

use thiserror::Error;

/// An address inside the host's memory image.
///
/// The table the patcher rewrites stores plain machine words, so addresses
/// are carried as `usize` and only converted to typed function pointers at
/// the [`crate::ffi::FnPtr`] boundary.
pub type Address = usize;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Copy from calling context faulted")]
    CopyFault,

    #[error("Dispatch hook installation rejected for '{0}'")]
    HookInstall(String),

    #[error("Dispatch hook removal failed for '{0}'")]
    HookRemove(String),

    #[error("Memory protection change failed at {0:#x} (len {1})")]
    ProtectionChange(Address, usize),
}

pub type Result<T> = std::result::Result<T, HostError>;

/// Primitives the surrounding host environment must provide.
///
/// Implementations are expected to be cheap and synchronous; any blocking or
/// fault handling happens inside the host, not in this crate.
pub trait Host: Send + Sync {
    /// Acquire a publicly exported symbol, taking a reference on its
    /// provider. Returns the symbol's address, or `None` if it is not
    /// exported (or its provider is not loaded).
    fn acquire_symbol(&self, name: &str) -> Option<Address>;

    /// Drop the reference taken by [`Host::acquire_symbol`].
    fn release_symbol(&self, name: &str);

    /// Best-effort reverse lookup: a "name+offset" style description of the
    /// routine covering `addr`, or `None` if the address maps to nothing.
    fn describe_address(&self, addr: Address) -> Option<String>;

    /// Address of the always-exported introspection routine backing
    /// [`Host::describe_address`]. Used as the anchor for base-address
    /// estimation by the scanning fallback.
    fn anchor_address(&self) -> Address;

    /// Whether the host is still in its early boot phase.
    fn is_booting(&self) -> bool;

    /// Copy a NUL-terminated path string out of the calling context into
    /// `buf`, copying at most `buf.len()` bytes. Returns the number of bytes
    /// written. Faults surface as [`HostError::CopyFault`].
    fn copy_path_from_caller(&self, src: Address, buf: &mut [u8]) -> Result<usize>;

    /// Terminate the calling context with `status`. On a real host this does
    /// not return to the caller; mock implementations merely record it.
    fn terminate_caller(&self, status: i32);

    /// Install `replacement` at the privileged dispatch entry named `symbol`
    /// and return the address of the original implementation.
    fn install_dispatch_hook(&self, symbol: &str, replacement: Address) -> Result<Address>;

    /// Remove a hook previously installed by
    /// [`Host::install_dispatch_hook`], re-establishing `original`.
    fn remove_dispatch_hook(&self, symbol: &str, original: Address) -> Result<()>;

    /// Make `len` bytes at `addr` writable.
    fn set_memory_rw(&self, addr: Address, len: usize) -> Result<()>;

    /// Restore normal protection on `len` bytes at `addr`.
    fn set_memory_ro(&self, addr: Address, len: usize) -> Result<()>;
}
