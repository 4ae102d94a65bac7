//! Fail-safe call wrappers for routines the host does not export.
//!
//! Each wrapper flavor pairs a resolution policy with the same call contract:
//! resolve the target, and on any failure log it and hand back the caller's
//! fail sentinel instead of crashing. The three flavors exist because the
//! targets differ in lifetime, not in calling convention:
//!
//! - [`FixedShim`] for internal routines that exist for the host's whole
//!   lifetime (resolve once, cache forever),
//! - [`BootShim`] for routines that are only meaningful during early boot
//!   (never cached, refused outside the boot phase),
//! - [`DynamicShim`] for routines exported by loadable modules that can come
//!   and go (fresh acquire every call).

use std::sync::OnceLock;

use crate::ffi::FnPtr;
use crate::resolver::SymbolResolver;

/// Wrapper for a permanently present internal routine.
///
/// The first successful call resolves and caches the address; later calls
/// reuse it. A failed resolution is retried on the next call, so a routine
/// that becomes visible later is not lost.
pub struct FixedShim<T: Copy + 'static> {
    name: &'static str,
    cached: OnceLock<FnPtr<T>>,
}

impl<T: Copy + 'static> FixedShim<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            cached: OnceLock::new(),
        }
    }

    fn resolved(&self, resolver: &SymbolResolver) -> Option<FnPtr<T>> {
        if let Some(ptr) = self.cached.get() {
            return Some(*ptr);
        }

        let addr = resolver.resolve(self.name)?;
        let ptr = match FnPtr::from_addr(addr) {
            Ok(ptr) => ptr,
            Err(err) => {
                log::error!("BUG: '{}' resolved to unusable address: {err}", self.name);
                return None;
            }
        };

        // A concurrent first call may have won the race; both wrote the same
        // resolved address, so either value is fine.
        Some(*self.cached.get_or_init(|| ptr))
    }

    /// Invoke the routine, or return `fail` if it cannot be resolved.
    pub fn call<R>(&self, resolver: &SymbolResolver, fail: R, invoke: impl FnOnce(T) -> R) -> R {
        match self.resolved(resolver) {
            Some(ptr) => invoke(ptr.as_fn()),
            None => {
                log::error!("Cannot call '{}': symbol not resolved", self.name);
                fail
            }
        }
    }
}

/// Wrapper for a routine that is only valid during the host's boot phase.
///
/// The boot check runs on every call and nothing is ever cached; once boot
/// ends the routine may be gone entirely, so a stale cached address would be
/// a use-after-free waiting to happen.
pub struct BootShim<T: Copy + 'static> {
    name: &'static str,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Copy + 'static> BootShim<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: std::marker::PhantomData,
        }
    }

    /// Invoke the routine if the host is still booting, else return `fail`.
    pub fn call<R>(&self, resolver: &SymbolResolver, fail: R, invoke: impl FnOnce(T) -> R) -> R {
        if !resolver.host().is_booting() {
            log::warn!("Refusing to call '{}': boot phase is over", self.name);
            return fail;
        }

        let ptr = resolver
            .resolve(self.name)
            .and_then(|addr| FnPtr::<T>::from_addr(addr).ok());
        match ptr {
            Some(ptr) => invoke(ptr.as_fn()),
            None => {
                log::error!("Cannot call '{}': symbol not resolved", self.name);
                fail
            }
        }
    }
}

/// Wrapper for a routine exported by a loadable module.
///
/// Every call re-acquires the export, and the provider reference is dropped
/// *before* the routine runs. Holding it across the call can deadlock when
/// the routine itself waits on module load/unload sequencing; the price is a
/// small window where the provider unloads mid-call. The original behavior
/// accepted the same trade.
pub struct DynamicShim<T: Copy + 'static> {
    name: &'static str,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Copy + 'static> DynamicShim<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: std::marker::PhantomData,
        }
    }

    /// Invoke the routine if its provider is currently loaded, else return
    /// `fail`.
    pub fn call<R>(&self, resolver: &SymbolResolver, fail: R, invoke: impl FnOnce(T) -> R) -> R {
        let host = resolver.host();
        let addr = match host.acquire_symbol(self.name) {
            Some(addr) => addr,
            None => {
                log::warn!("Cannot call '{}': provider module not loaded", self.name);
                return fail;
            }
        };
        host.release_symbol(self.name);

        match FnPtr::<T>::from_addr(addr) {
            Ok(ptr) => invoke(ptr.as_fn()),
            Err(err) => {
                log::error!("BUG: '{}' acquired at unusable address: {err}", self.name);
                fail
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockHost;
    use crate::host::{Address, Host};
    use crate::resolver::ScanStrategy;
    use std::sync::Arc;

    extern "C" fn double_it(x: i32) -> i32 {
        x * 2
    }

    struct NoScan;
    impl ScanStrategy for NoScan {
        fn locate(&self, _host: &dyn Host, _name: &str) -> Option<Address> {
            None
        }
    }

    fn setup() -> (Arc<MockHost>, SymbolResolver) {
        let host = Arc::new(MockHost::new());
        let resolver = SymbolResolver::new(host.clone() as Arc<dyn Host>, Box::new(NoScan));
        (host, resolver)
    }

    type DoubleFn = extern "C" fn(i32) -> i32;

    #[test]
    fn fixed_shim_caches_after_first_success() {
        let (host, resolver) = setup();
        host.export_symbol("double_it", double_it as usize);

        let shim: FixedShim<DoubleFn> = FixedShim::new("double_it");
        assert_eq!(shim.call(&resolver, -1, |f| f(4)), 8);

        // Cached copy keeps working even after the export disappears.
        host.remove_export("double_it");
        assert_eq!(shim.call(&resolver, -1, |f| f(5)), 10);
    }

    #[test]
    fn fixed_shim_returns_sentinel_without_invoking() {
        let (_host, resolver) = setup();

        let shim: FixedShim<DoubleFn> = FixedShim::new("nowhere");
        let mut invoked = false;
        let out = shim.call(&resolver, -4, |f| {
            invoked = true;
            f(1)
        });
        assert_eq!(out, -4);
        assert!(!invoked);
    }

    #[test]
    fn fixed_shim_retries_after_a_failed_resolution() {
        let (host, resolver) = setup();

        let shim: FixedShim<DoubleFn> = FixedShim::new("late_arrival");
        assert_eq!(shim.call(&resolver, -1, |f| f(3)), -1);

        host.export_symbol("late_arrival", double_it as usize);
        assert_eq!(shim.call(&resolver, -1, |f| f(3)), 6);
    }

    #[test]
    fn boot_shim_refuses_after_boot() {
        let (host, resolver) = setup();
        host.export_symbol("early_only", double_it as usize);

        let shim: BootShim<DoubleFn> = BootShim::new("early_only");

        host.set_booting(true);
        assert_eq!(shim.call(&resolver, -1, |f| f(10)), 20);

        host.set_booting(false);
        let mut invoked = false;
        let out = shim.call(&resolver, -1, |f| {
            invoked = true;
            f(10)
        });
        assert_eq!(out, -1);
        assert!(!invoked);
    }

    #[test]
    fn dynamic_shim_releases_provider_before_invoking() {
        let (host, resolver) = setup();
        host.export_symbol("module_routine", double_it as usize);

        let shim: DynamicShim<DoubleFn> = DynamicShim::new("module_routine");
        let host_for_check = host.clone();
        let out = shim.call(&resolver, -1, |f| {
            // The provider reference must already be dropped here.
            assert_eq!(host_for_check.refcount("module_routine"), 0);
            f(6)
        });
        assert_eq!(out, 12);
        assert_eq!(host.refcount("module_routine"), 0);
    }

    #[test]
    fn dynamic_shim_handles_unloaded_provider() {
        let (_host, resolver) = setup();

        let shim: DynamicShim<DoubleFn> = DynamicShim::new("gone_module");
        assert_eq!(shim.call(&resolver, -4, |f| f(1)), -4);
    }
}
