//! Standalone routine overrides tied to firmware behavior but living outside
//! the dispatch table.

use crate::config::HwCapabilities;
use crate::patch::{PatchError, SymbolOverride};
use crate::resolver::SymbolResolver;

/// Disk-LED control routines the OS kernel may export, depending on build.
const DISK_LED_SYMBOLS: [&str; 3] = [
    "funcSYNOSATADiskLedCtrl",
    "syno_ahci_disk_led_enable",
    "syno_ahci_disk_led_enable_by_port",
];

const PSU_STATUS_SYMBOL: &str = "HWMONGetPSUStatusByI2C";

extern "C" fn disk_led_ctrl_shim(host_num: i32, led: i32) -> i32 {
    log::debug!("Disk LED control swallowed (host={host_num} led={led})");
    0
}

extern "C" fn ahci_disk_led_shim(host_num: u16, value: i32) -> i32 {
    log::debug!("AHCI disk LED enable swallowed (host={host_num} val={value})");
    0
}

extern "C" fn ahci_disk_led_by_port_shim(port: u16, value: i32) -> i32 {
    log::debug!("AHCI disk LED enable swallowed (port={port} val={value})");
    0
}

/// The PSU status query cannot work over this platform's I2C wiring; answer
/// "present and well" outright.
extern "C" fn psu_status_shim() -> i32 {
    1
}

fn disk_led_replacement(symbol: &str) -> usize {
    match symbol {
        "funcSYNOSATADiskLedCtrl" => disk_led_ctrl_shim as usize,
        "syno_ahci_disk_led_enable" => ahci_disk_led_shim as usize,
        _ => ahci_disk_led_by_port_shim as usize,
    }
}

/// Overrides installed for the current capability set, restored in reverse.
#[derive(Default)]
pub struct StandaloneOverrides {
    installed: Vec<SymbolOverride>,
}

impl StandaloneOverrides {
    /// Install every override the capability flags ask for.
    ///
    /// Disk-LED symbols are presence-checked first; the OS kernel only
    /// exports them on some builds and an absent one is not an error. A
    /// failure mid-way rolls back what was already installed.
    pub fn install(
        resolver: &SymbolResolver,
        hw: &HwCapabilities,
    ) -> Result<Self, PatchError> {
        let mut this = Self::default();

        if hw.fix_disk_led_ctrl {
            log::debug!("Overriding disk LED control routines");
            for symbol in DISK_LED_SYMBOLS {
                if !resolver.has_symbol(symbol) {
                    log::info!("'{}' not present on this build, skipping", symbol);
                    continue;
                }
                if let Err(err) = this.push(resolver, symbol, disk_led_replacement(symbol)) {
                    this.restore();
                    return Err(err);
                }
            }
        }

        if hw.fake_psu_status {
            // Unlike the LED routines this symbol must exist when the flag
            // is set; a miss means the platform profile is wrong.
            if let Err(err) = this.push(resolver, PSU_STATUS_SYMBOL, psu_status_shim as usize) {
                this.restore();
                return Err(err);
            }
        }

        Ok(this)
    }

    fn push(
        &mut self,
        resolver: &SymbolResolver,
        symbol: &str,
        replacement: usize,
    ) -> Result<(), PatchError> {
        let ov = SymbolOverride::install(resolver, symbol, replacement)?;
        self.installed.push(ov);
        Ok(())
    }

    /// Undo all overrides in reverse install order. Failures are logged and
    /// the rest of the teardown continues.
    pub fn restore(&mut self) {
        while let Some(ov) = self.installed.pop() {
            let name = ov.name().to_owned();
            if let Err(err) = ov.restore() {
                log::error!("Failed to restore '{}': {err}", name);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.installed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
    }
}
