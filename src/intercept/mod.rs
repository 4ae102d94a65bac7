//! Process-launch interception.
//!
//! One hook at the host's process-launch dispatch entry. Every launch request
//! flows through [`exec_trampoline`], which compares the requested executable
//! path against a small blocklist: a match quietly terminates the calling
//! context instead of launching, anything else (including a path we failed to
//! read) forwards to the original dispatch routine untouched.
//!
//! The trampoline is installed into foreign code and therefore cannot carry a
//! `self`; it reads one process-wide slot that [`ExecInterceptor::register`]
//! fills and [`ExecInterceptor::unregister`] clears.

mod blocklist;

pub use blocklist::{BlockedPathSet, BlocklistError, MAX_BLOCKED_PATHS, MAX_PATH_LEN};

use std::ffi::c_char;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::ffi::{FnPtr, FnPtrError};
use crate::host::{Host, HostError};

/// Name of the privileged process-launch dispatch entry.
pub const EXEC_ENTRY_SYMBOL: &str = "__x64_sys_execve";

/// Size of the local copy buffer for the executable path. Longer paths get
/// truncated for comparison, which cannot produce a false positive since
/// blocklist entries are matched whole.
const EXEC_NAME_MAX: usize = 255;

/// Returned when the dispatch path has nowhere sane to go (interrupted-call
/// status code, the same one the fail-safe wrappers hand out).
const FAIL_SENTINEL: i64 = -4;

/// Argument block of a launch request as the dispatch entry receives it.
#[repr(C)]
pub struct ExecFrame {
    pub filename: *const c_char,
    pub argv: *const *const c_char,
    pub envp: *const *const c_char,
}

/// Signature of the dispatch entry and of anything standing in for it.
pub type ExecEntryFn = unsafe extern "C" fn(*const ExecFrame) -> i64;

#[derive(Debug, Error)]
pub enum InterceptError {
    #[error("Failed to hook dispatch entry '{0}': {1}")]
    Install(&'static str, #[source] HostError),

    #[error("Failed to unhook dispatch entry '{0}': {1}")]
    Remove(&'static str, #[source] HostError),

    #[error("Original dispatch routine address is unusable: {0}")]
    BadOriginal(#[from] FnPtrError),
}

type Result<T> = std::result::Result<T, InterceptError>;

/// The interceptor currently wired into the dispatch entry, if any.
static ACTIVE: RwLock<Option<Arc<ExecInterceptor>>> = RwLock::new(None);

/// Serializes every test that swaps [`ACTIVE`]; the trampoline routes
/// through one process-wide slot.
#[cfg(test)]
pub(crate) static HOOK_TEST_LOCK: Mutex<()> = Mutex::new(());

/// Owns the blocklist and the dispatch-entry hook.
pub struct ExecInterceptor {
    host: Arc<dyn Host>,
    blocked: Mutex<BlockedPathSet>,
    original: Mutex<Option<FnPtr<ExecEntryFn>>>,
}

impl ExecInterceptor {
    pub fn new(host: Arc<dyn Host>) -> Arc<Self> {
        Arc::new(Self {
            host,
            blocked: Mutex::new(BlockedPathSet::new()),
            original: Mutex::new(None),
        })
    }

    /// Add `path` to the set of suppressed executables.
    pub fn add_blocked_path(&self, path: &str) -> std::result::Result<(), BlocklistError> {
        self.blocked.lock().add(path)
    }

    pub fn is_registered(&self) -> bool {
        self.original.lock().is_some()
    }

    /// Install the hook at the dispatch entry. Safe to call twice.
    pub fn register(self: &Arc<Self>) -> Result<()> {
        let mut original = self.original.lock();
        if original.is_some() {
            log::debug!("Launch interceptor already registered");
            return Ok(());
        }

        let replacement = exec_trampoline as usize;
        let original_addr = self
            .host
            .install_dispatch_hook(EXEC_ENTRY_SYMBOL, replacement)
            .map_err(|e| InterceptError::Install(EXEC_ENTRY_SYMBOL, e))?;
        let original_fn = FnPtr::from_addr(original_addr)?;

        *ACTIVE.write() = Some(Arc::clone(self));
        *original = Some(original_fn);
        log::info!(
            "Intercepting '{}' (original at {:#x})",
            EXEC_ENTRY_SYMBOL,
            original_addr
        );
        Ok(())
    }

    /// Remove the hook. Safe to call twice; a failed removal leaves the
    /// interceptor registered.
    pub fn unregister(&self) -> Result<()> {
        let mut original = self.original.lock();
        let Some(original_fn) = *original else {
            log::debug!("Launch interceptor not registered");
            return Ok(());
        };

        self.host
            .remove_dispatch_hook(EXEC_ENTRY_SYMBOL, original_fn.as_addr())
            .map_err(|e| InterceptError::Remove(EXEC_ENTRY_SYMBOL, e))?;

        *original = None;
        *ACTIVE.write() = None;
        log::info!("Stopped intercepting '{}'", EXEC_ENTRY_SYMBOL);
        Ok(())
    }

    /// Decide the fate of one launch request.
    fn handle(&self, frame: *const ExecFrame) -> i64 {
        let Some(original) = *self.original.lock() else {
            log::error!("BUG: dispatch arrived with no original routine recorded");
            return FAIL_SENTINEL;
        };

        // Safety: the host hands the dispatch entry a valid frame; we only
        // read the filename pointer out of it.
        let filename = unsafe { (*frame).filename } as usize;

        let mut buf = [0u8; EXEC_NAME_MAX];
        match self.host.copy_path_from_caller(filename, &mut buf) {
            Ok(_) => {
                let path = match buf.iter().position(|&b| b == 0) {
                    Some(nul) => &buf[..nul],
                    None => &buf[..],
                };

                if self.blocked.lock().contains(path) {
                    log::info!(
                        "Suppressed execution of '{}'",
                        String::from_utf8_lossy(path)
                    );
                    // A successful launch never returns to the caller either,
                    // so ending the caller with a success status is the
                    // closest honest imitation.
                    self.host.terminate_caller(0);
                    return 0;
                }
            }
            Err(err) => {
                log::warn!("Could not read launch path ({err}); passing through");
            }
        }

        // Safety: the recorded address came from the host when the hook was
        // installed and stays valid while the hook exists.
        unsafe { original.as_fn()(frame) }
    }
}

/// The routine actually patched into the dispatch entry.
///
/// # Safety
///
/// Must only be invoked by the host's dispatch mechanism with a valid frame.
pub unsafe extern "C" fn exec_trampoline(frame: *const ExecFrame) -> i64 {
    let active = ACTIVE.read().clone();
    match active {
        Some(interceptor) => interceptor.handle(frame),
        None => {
            log::error!("BUG: launch dispatch arrived with no interceptor active");
            FAIL_SENTINEL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockHost;
    use std::ffi::CString;
    use std::ptr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static FORWARDED: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn spy_dispatch(_frame: *const ExecFrame) -> i64 {
        FORWARDED.fetch_add(1, Ordering::SeqCst);
        123
    }

    fn registered_interceptor() -> (Arc<MockHost>, Arc<ExecInterceptor>) {
        let host = Arc::new(MockHost::new());
        host.export_symbol(EXEC_ENTRY_SYMBOL, spy_dispatch as usize);
        let interceptor = ExecInterceptor::new(host.clone() as Arc<dyn Host>);
        interceptor.register().unwrap();
        (host, interceptor)
    }

    fn dispatch(path: &CString) -> i64 {
        let frame = ExecFrame {
            filename: path.as_ptr(),
            argv: ptr::null(),
            envp: ptr::null(),
        };
        unsafe { exec_trampoline(&frame) }
    }

    #[test]
    fn forwards_unblocked_paths_exactly_once() {
        let _serial = HOOK_TEST_LOCK.lock();
        let (host, interceptor) = registered_interceptor();
        interceptor.add_blocked_path("/usr/bin/banned").unwrap();

        let before = FORWARDED.load(Ordering::SeqCst);
        let path = CString::new("/bin/ls").unwrap();
        assert_eq!(dispatch(&path), 123);
        assert_eq!(FORWARDED.load(Ordering::SeqCst), before + 1);
        assert_eq!(host.terminated_with(), None);

        interceptor.unregister().unwrap();
    }

    #[test]
    fn suppresses_blocked_paths_without_forwarding() {
        let _serial = HOOK_TEST_LOCK.lock();
        let (host, interceptor) = registered_interceptor();
        interceptor.add_blocked_path("/usr/bin/banned").unwrap();

        let before = FORWARDED.load(Ordering::SeqCst);
        let path = CString::new("/usr/bin/banned").unwrap();
        assert_eq!(dispatch(&path), 0);
        assert_eq!(FORWARDED.load(Ordering::SeqCst), before);
        assert_eq!(host.terminated_with(), Some(0));

        interceptor.unregister().unwrap();
    }

    #[test]
    fn copy_failure_passes_the_request_through() {
        let _serial = HOOK_TEST_LOCK.lock();
        let (host, interceptor) = registered_interceptor();
        interceptor.add_blocked_path("/usr/bin/banned").unwrap();
        host.fail_copy.store(true, Ordering::Relaxed);

        let before = FORWARDED.load(Ordering::SeqCst);
        let path = CString::new("/usr/bin/banned").unwrap();
        assert_eq!(dispatch(&path), 123);
        assert_eq!(FORWARDED.load(Ordering::SeqCst), before + 1);
        assert_eq!(host.terminated_with(), None);

        interceptor.unregister().unwrap();
    }

    #[test]
    fn register_and_unregister_are_idempotent() {
        let _serial = HOOK_TEST_LOCK.lock();
        let (host, interceptor) = registered_interceptor();

        interceptor.register().unwrap();
        assert_eq!(
            host.installed_hook(EXEC_ENTRY_SYMBOL),
            Some(exec_trampoline as usize)
        );

        interceptor.unregister().unwrap();
        interceptor.unregister().unwrap();
        assert_eq!(host.installed_hook(EXEC_ENTRY_SYMBOL), None);
        assert!(!interceptor.is_registered());

        // With nothing active the trampoline refuses the call.
        let path = CString::new("/bin/ls").unwrap();
        assert_eq!(dispatch(&path), FAIL_SENTINEL);
    }

    #[test]
    fn failed_install_surfaces_an_error() {
        let _serial = HOOK_TEST_LOCK.lock();
        let host = Arc::new(MockHost::new());
        host.export_symbol(EXEC_ENTRY_SYMBOL, spy_dispatch as usize);
        host.fail_hook_install.store(true, Ordering::Relaxed);

        let interceptor = ExecInterceptor::new(host as Arc<dyn Host>);
        assert!(matches!(
            interceptor.register(),
            Err(InterceptError::Install(_, _))
        ));
        assert!(!interceptor.is_registered());
    }
}
