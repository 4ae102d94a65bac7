//! Typed function-pointer container.
//!
//! Every raw address this crate resolves or records eventually has to be
//! called, and calling it means transmuting an integer into a function
//! pointer. [`FnPtr`] is the single place where that conversion happens: it
//! checks at construction time that `T` really has pointer size, carries the
//! target type in a phantom, and hands back a correctly typed callable on
//! request.

use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr::NonNull;

use thiserror::Error;

use crate::host::Address;

#[derive(Debug, Error)]
pub enum FnPtrError {
    #[error("Function pointer is NULL")]
    Null,

    #[error("Function pointer type has wrong size (does not match *mut c_void)")]
    WrongSize,
}

type Result<T> = std::result::Result<T, FnPtrError>;

/// A non-null routine address tagged with the function type it will be
/// called as.
///
/// `T` must be a function pointer type (`extern "C" fn(...)` or the unsafe
/// variant). Rust has no trait bound for "is a function pointer", so the
/// container settles for `Copy + 'static` plus a size check; constructing one
/// from anything else is rejected at runtime.
#[derive(Debug, Clone, Copy)]
pub struct FnPtr<T: Copy + 'static> {
    raw: NonNull<c_void>,
    _marker: PhantomData<T>,
}

// Safety: the container only holds an address; whether the routine behind it
// is safe to call concurrently is the caller's contract, same as for any
// extern fn pointer.
unsafe impl<T: Copy + 'static> Send for FnPtr<T> {}
unsafe impl<T: Copy + 'static> Sync for FnPtr<T> {}

impl<T: Copy + 'static> FnPtr<T> {
    fn check_size() -> Result<()> {
        if std::mem::size_of::<T>() != std::mem::size_of::<*mut c_void>() {
            return Err(FnPtrError::WrongSize);
        }
        Ok(())
    }

    /// Wrap a resolved address.
    pub fn from_addr(addr: Address) -> Result<Self> {
        Self::check_size()?;
        let raw = NonNull::new(addr as *mut c_void).ok_or(FnPtrError::Null)?;
        Ok(Self {
            raw,
            _marker: PhantomData,
        })
    }

    /// Wrap a live function value (used for replacement routines we define
    /// ourselves).
    pub fn from_fn(function: T) -> Result<Self> {
        Self::check_size()?;

        // Safety: sizes were checked above; a function item coerced to a
        // pointer type round-trips through transmute_copy losslessly.
        let ptr: *mut c_void = unsafe { std::mem::transmute_copy(&function) };
        let raw = NonNull::new(ptr).ok_or(FnPtrError::Null)?;
        Ok(Self {
            raw,
            _marker: PhantomData,
        })
    }

    /// The wrapped address as a typed, callable function pointer.
    pub fn as_fn(&self) -> T {
        let ptr = self.raw.as_ptr();
        // Safety: size was verified at construction and the pointer is
        // non-null; the typed signature is the caller's contract.
        unsafe { std::mem::transmute_copy(&ptr) }
    }

    /// The wrapped address as a plain machine word.
    pub fn as_addr(&self) -> Address {
        self.raw.as_ptr() as Address
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn forty_two() -> i32 {
        42
    }

    #[test]
    fn round_trips_a_real_function() {
        let ptr = FnPtr::<extern "C" fn() -> i32>::from_fn(forty_two).unwrap();
        assert_eq!(ptr.as_fn()(), 42);
        assert_eq!(ptr.as_addr(), forty_two as usize);

        let again = FnPtr::<extern "C" fn() -> i32>::from_addr(ptr.as_addr()).unwrap();
        assert_eq!(again.as_fn()(), 42);
    }

    #[test]
    fn rejects_null_addresses() {
        assert!(matches!(
            FnPtr::<extern "C" fn() -> i32>::from_addr(0),
            Err(FnPtrError::Null)
        ));
    }

    #[test]
    fn rejects_non_pointer_sized_types() {
        assert!(matches!(
            FnPtr::<[usize; 2]>::from_addr(0x1000),
            Err(FnPtrError::WrongSize)
        ));
    }
}
