//! libretrofit
//!
//! Runtime symbol-resolution and function-interception engine for a
//! privileged host kernel environment that exposes no source and no stable
//! export list. The engine can:
//!
//! - find the in-memory address of internal routines the host does not
//!   officially export ([`resolver`]),
//! - call such routines through cached, fail-safe wrappers ([`shim`]),
//! - intercept the privileged process-launch dispatch entry and suppress
//!   configured executables ([`intercept`]),
//! - live-patch the platform firmware module's hardware dispatch table and
//!   restore it exactly across repeated reload cycles ([`vtable`], [`bios`]),
//! - override standalone foreign-exported routines symmetrically ([`patch`]).
//!
//! All host-specific primitives sit behind the [`host::Host`] trait so the
//! fragile, version-dependent pieces stay swappable. [`engine::Engine`] ties
//! the registration lifecycle together: ordered install with reverse unwind
//! on failure, best-effort reverse cleanup on detach.

pub mod bios;
pub mod config;
pub mod engine;
pub mod ffi;
pub mod host;
pub mod intercept;
pub mod patch;
pub mod resolver;
pub mod shim;
pub mod vtable;
