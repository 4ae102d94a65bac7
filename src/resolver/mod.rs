//! Name-to-address resolution for routines the host keeps private.
//!
//! Resolution order: memoized cache, then the public export mechanism (taking
//! and immediately dropping the provider reference, since only the address is
//! wanted), then the host's internal lookup routine. That last routine is
//! itself unexported on current host versions, so it gets bootstrapped once
//! through the configured [`ScanStrategy`] and reused for every later miss.

mod scan;

pub use scan::{ImageScan, ScanStrategy};

use std::collections::HashMap;
use std::ffi::CString;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::ffi::FnPtr;
use crate::host::{Address, Host};

/// Signature of the host's internal name-lookup routine.
type LookupFn = unsafe extern "C" fn(*const std::ffi::c_char) -> usize;

/// Name of the internal lookup routine itself.
const PRIVATE_LOOKUP_SYMBOL: &str = "kallsyms_lookup_name";

/// Resolves routine names to addresses, caching every hit.
pub struct SymbolResolver {
    host: Arc<dyn Host>,
    cache: RwLock<HashMap<String, Address>>,
    lookup: OnceLock<Option<FnPtr<LookupFn>>>,
    strategy: Box<dyn ScanStrategy>,
}

impl SymbolResolver {
    pub fn new(host: Arc<dyn Host>, strategy: Box<dyn ScanStrategy>) -> Self {
        Self {
            host,
            cache: RwLock::new(HashMap::new()),
            lookup: OnceLock::new(),
            strategy,
        }
    }

    /// Resolver with the default linear image scan as its fallback.
    pub fn with_default_scan(host: Arc<dyn Host>) -> Self {
        Self::new(host, Box::new(ImageScan))
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// Resolve `name` to an address.
    ///
    /// Successful resolutions are memoized; failures are not, so a symbol
    /// that appears later (a module loading, say) can still be found.
    pub fn resolve(&self, name: &str) -> Option<Address> {
        if let Some(addr) = self.cache.read().get(name).copied() {
            return Some(addr);
        }

        // The export path bumps the provider's reference count; drop it right
        // away since only the address is of interest here.
        if let Some(addr) = self.host.acquire_symbol(name) {
            self.host.release_symbol(name);
            log::debug!("Resolved '{}' to {:#x} via public exports", name, addr);
            self.cache.write().insert(name.to_owned(), addr);
            return Some(addr);
        }

        let lookup = self.lookup_fn()?;
        let cname = match CString::new(name) {
            Ok(cname) => cname,
            Err(_) => {
                log::error!("Symbol name '{}' contains an interior NUL", name);
                return None;
            }
        };

        // Safety: lookup points at the host's name-lookup routine, which
        // takes a NUL-terminated name and returns 0 or a valid address.
        let addr = unsafe { lookup.as_fn()(cname.as_ptr()) };
        if addr == 0 {
            log::warn!("Symbol '{}' not known to the host", name);
            return None;
        }

        log::debug!("Resolved '{}' to {:#x} via internal lookup", name, addr);
        self.cache.write().insert(name.to_owned(), addr);
        Some(addr)
    }

    /// Whether `name` resolves at all.
    pub fn has_symbol(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// The internal lookup routine, bootstrapped on first use.
    ///
    /// Older hosts export it directly; newer ones force the scan fallback.
    /// Either way the outcome (including a failed bootstrap) is computed
    /// exactly once per resolver.
    fn lookup_fn(&self) -> Option<FnPtr<LookupFn>> {
        *self.lookup.get_or_init(|| {
            let addr = match self.host.acquire_symbol(PRIVATE_LOOKUP_SYMBOL) {
                Some(addr) => {
                    self.host.release_symbol(PRIVATE_LOOKUP_SYMBOL);
                    log::debug!("Internal lookup routine is exported at {:#x}", addr);
                    addr
                }
                None => {
                    let addr = self
                        .strategy
                        .locate(self.host.as_ref(), PRIVATE_LOOKUP_SYMBOL)?;
                    log::info!("Internal lookup routine located at {:#x} by scan", addr);
                    addr
                }
            };

            match FnPtr::from_addr(addr) {
                Ok(ptr) => Some(ptr),
                Err(err) => {
                    log::error!("Internal lookup address unusable: {err}");
                    None
                }
            }
        })
    }
}
