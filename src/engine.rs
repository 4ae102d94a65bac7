//! Attachment lifecycle.
//!
//! [`Engine::attach`] runs the registration sequence in a fixed order and, if
//! any step fails, unwinds the steps that already succeeded in reverse before
//! surfacing the error; a half-attached engine never escapes. Detach runs the
//! same steps backwards best-effort: a failed restore is logged and the rest
//! of the teardown still runs, because aborting an unload midway leaves the
//! host in a worse state than a leaked hook does.
//!
//! The firmware module loads and unloads on its own schedule, so its dispatch
//! table is patched per session through [`Engine::firmware_table_loaded`] and
//! [`Engine::firmware_table_unloading`] rather than during attach.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::bios::{self, StandaloneOverrides};
use crate::config::HwCapabilities;
use crate::host::{Address, Host};
use crate::intercept::{BlocklistError, ExecInterceptor, InterceptError};
use crate::patch::PatchError;
use crate::resolver::SymbolResolver;
use crate::vtable::{TablePatcher, VtableError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Intercept(#[from] InterceptError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Vtable(#[from] VtableError),

    #[error(transparent)]
    Blocklist(#[from] BlocklistError),
}

type Result<T> = std::result::Result<T, EngineError>;

/// An attached instance of the retrofit engine.
pub struct Engine {
    resolver: SymbolResolver,
    hw: HwCapabilities,
    interceptor: Arc<ExecInterceptor>,
    overrides: Mutex<StandaloneOverrides>,
    table: Mutex<Option<TablePatcher>>,
}

impl Engine {
    /// Run the full registration sequence against `host`.
    pub fn attach(host: Arc<dyn Host>, hw: HwCapabilities) -> Result<Self> {
        log::info!("Attaching retrofit engine");

        let resolver = SymbolResolver::with_default_scan(Arc::clone(&host));
        let interceptor = ExecInterceptor::new(host);

        interceptor.register()?;

        let overrides = match StandaloneOverrides::install(&resolver, &hw) {
            Ok(overrides) => overrides,
            Err(err) => {
                // Unwind the step that already succeeded.
                if let Err(unreg) = interceptor.unregister() {
                    log::error!("Unwind after failed attach also failed: {unreg}");
                }
                return Err(err.into());
            }
        };

        log::info!("Retrofit engine attached");
        Ok(Self {
            resolver,
            hw,
            interceptor,
            overrides: Mutex::new(overrides),
            table: Mutex::new(None),
        })
    }

    /// Access to the engine's resolver, for callers wiring up shims.
    pub fn resolver(&self) -> &SymbolResolver {
        &self.resolver
    }

    /// Suppress future launches of the executable at `path`.
    pub fn block_execution(&self, path: &str) -> Result<()> {
        self.interceptor.add_blocked_path(path)?;
        Ok(())
    }

    /// The firmware module finished (a phase of) loading its dispatch table.
    ///
    /// Safe to call once per load phase; re-applying the catalog to an
    /// already-patched table changes nothing.
    ///
    /// # Safety
    ///
    /// `base` must point to the firmware module's live dispatch table of
    /// `len` slots, valid until [`Engine::firmware_table_unloading`] runs.
    pub unsafe fn firmware_table_loaded(&self, base: *mut Address, len: usize) -> Result<()> {
        let mut table = self.table.lock();
        match table.as_mut() {
            Some(patcher) => {
                log::debug!("Firmware table already bound; re-asserting shims");
                bios::apply_table_shims(patcher, &self.hw);
            }
            None => {
                // Safety: forwarded contract from the caller.
                let mut patcher = unsafe { TablePatcher::bind(base, len) }?;
                bios::apply_table_shims(&mut patcher, &self.hw);
                *table = Some(patcher);
                log::info!("Firmware dispatch table shimmed");
            }
        }
        Ok(())
    }

    /// The firmware module is about to unload; put its table back.
    pub fn firmware_table_unloading(&self) {
        let mut table = self.table.lock();
        match table.take() {
            Some(mut patcher) => {
                patcher.restore();
                log::info!("Firmware dispatch table restored");
            }
            None => log::debug!("No firmware table bound; nothing to restore"),
        }
    }

    /// Tear everything down in reverse registration order.
    pub fn detach(self) {
        log::info!("Detaching retrofit engine");

        self.firmware_table_unloading();
        self.overrides.lock().restore();
        if let Err(err) = self.interceptor.unregister() {
            log::error!("Failed to remove launch interceptor: {err}");
        }

        log::info!("Retrofit engine detached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockHost;
    use crate::intercept::{EXEC_ENTRY_SYMBOL, HOOK_TEST_LOCK};
    use crate::vtable::{Slot, TABLE_SLOTS};
    use std::sync::atomic::Ordering;

    unsafe extern "C" fn dispatch_stand_in(_frame: *const crate::intercept::ExecFrame) -> i64 {
        0
    }

    fn host_with_exec_entry() -> Arc<MockHost> {
        let host = Arc::new(MockHost::new());
        host.export_symbol(EXEC_ENTRY_SYMBOL, dispatch_stand_in as usize);
        host
    }

    #[test]
    fn attach_then_detach_is_symmetric() -> anyhow::Result<()> {
        let _serial = HOOK_TEST_LOCK.lock();
        let host = host_with_exec_entry();

        let engine = Engine::attach(host.clone() as Arc<dyn Host>, HwCapabilities::default())?;
        assert!(host.installed_hook(EXEC_ENTRY_SYMBOL).is_some());

        engine.block_execution("/usr/sbin/forbidden")?;

        engine.detach();
        assert!(host.installed_hook(EXEC_ENTRY_SYMBOL).is_none());
        Ok(())
    }

    #[test]
    fn failed_attach_unwinds_the_interceptor() {
        let _serial = HOOK_TEST_LOCK.lock();
        let host = host_with_exec_entry();

        // PSU faking is requested but the symbol does not exist, so the
        // override step fails after the interceptor registered.
        let hw = HwCapabilities {
            fake_psu_status: true,
            ..Default::default()
        };
        let result = Engine::attach(host.clone() as Arc<dyn Host>, hw);
        assert!(matches!(result, Err(EngineError::Patch(_))));
        assert!(host.installed_hook(EXEC_ENTRY_SYMBOL).is_none());
    }

    #[test]
    fn hook_install_failure_surfaces() {
        let _serial = HOOK_TEST_LOCK.lock();
        let host = host_with_exec_entry();
        host.fail_hook_install.store(true, Ordering::Relaxed);

        let result = Engine::attach(host as Arc<dyn Host>, HwCapabilities::default());
        assert!(matches!(result, Err(EngineError::Intercept(_))));
    }

    #[test]
    fn firmware_table_sessions_round_trip() -> anyhow::Result<()> {
        let _serial = HOOK_TEST_LOCK.lock();
        let host = host_with_exec_entry();
        let engine = Engine::attach(host as Arc<dyn Host>, HwCapabilities::default())?;

        let mut table: Vec<usize> = (0..TABLE_SLOTS).map(|i| 0x2000 + i).collect();
        let pristine = table.clone();

        unsafe {
            engine.firmware_table_loaded(table.as_mut_ptr(), table.len())?;
        }
        assert_ne!(table[Slot::SetDiskLed.index()], pristine[Slot::SetDiskLed.index()]);

        // Second load phase re-asserts without disturbing anything.
        let after_first = table.clone();
        unsafe {
            engine.firmware_table_loaded(table.as_mut_ptr(), table.len())?;
        }
        assert_eq!(table, after_first);

        engine.firmware_table_unloading();
        assert_eq!(table, pristine);

        // A second unload notification is a quiet no-op.
        engine.firmware_table_unloading();

        engine.detach();
        Ok(())
    }

    #[test]
    fn short_firmware_table_is_rejected() {
        let _serial = HOOK_TEST_LOCK.lock();
        let host = host_with_exec_entry();
        let engine = Engine::attach(host as Arc<dyn Host>, HwCapabilities::default()).unwrap();

        let mut table = vec![0usize; TABLE_SLOTS / 2];
        let result = unsafe { engine.firmware_table_loaded(table.as_mut_ptr(), table.len()) };
        assert!(matches!(result, Err(EngineError::Vtable(_))));

        engine.detach();
    }
}
