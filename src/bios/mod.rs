//! The fixed shim catalog for the firmware module.
//!
//! [`apply_table_shims`] is the one place that knows which dispatch slots get
//! which replacement. It is safe to run on every phase of the firmware
//! module's multi-phase load; re-applying an already-shimmed table is a no-op
//! thanks to the patcher's bookkeeping.

mod overrides;
pub mod stubs;

pub use overrides::StandaloneOverrides;

use crate::config::HwCapabilities;
use crate::vtable::{Slot, TablePatcher};

/// Patch the fixed catalog into a bound dispatch table.
///
/// Hardware-touching setters become acknowledge-and-ignore stubs, the
/// status getters fabricate healthy answers, and the RTC group is proxied
/// only on platforms without a usable hardware clock.
pub fn apply_table_shims(patcher: &mut TablePatcher, hw: &HwCapabilities) {
    patcher.patch(Slot::SetFanState, stubs::set_fan_state as usize);
    patcher.patch(Slot::SetDiskLed, stubs::set_disk_led as usize);
    patcher.patch(Slot::SetPowerLed, stubs::set_power_led as usize);
    patcher.patch(Slot::GetGpioPin, stubs::get_gpio_pin_usable as usize);
    patcher.patch(Slot::SetGpioPin, stubs::set_gpio_pin_usable as usize);
    patcher.patch(Slot::SetGpioPinBlink, stubs::set_gpio_pin_blink as usize);
    patcher.patch(Slot::SetAlarmLed, stubs::set_alarm_led as usize);
    patcher.patch(Slot::GetBuzzerCleared, stubs::get_buzzer_cleared as usize);
    patcher.patch(Slot::SetBuzzerCleared, stubs::set_buzzer_cleared as usize);
    patcher.patch(Slot::GetPowerStatus, stubs::get_power_status as usize);
    patcher.patch(Slot::SetCpuFanStatus, stubs::set_cpu_fan_status as usize);
    patcher.patch(Slot::SetPhyLed, stubs::set_phy_led as usize);
    patcher.patch(Slot::SetHddActLed, stubs::set_hdd_act_led as usize);
    patcher.patch(Slot::GetMicropId, stubs::get_microp_id as usize);
    patcher.patch(Slot::SetMicropId, stubs::set_microp_id as usize);

    if hw.emulate_rtc {
        log::debug!("No usable hardware clock; proxying RTC dispatch slots");
        patcher.patch(Slot::RtcGetTime, stubs::rtc_get_time as usize);
        patcher.patch(Slot::RtcSetTime, stubs::rtc_set_time as usize);
        patcher.patch(Slot::RtcInitAutoPowerOn, stubs::rtc_init_auto_power_on as usize);
        patcher.patch(Slot::RtcGetAutoPowerOn, stubs::rtc_get_auto_power_on as usize);
        patcher.patch(Slot::RtcSetAutoPowerOn, stubs::rtc_set_auto_power_on as usize);
        patcher.patch(
            Slot::RtcUninitAutoPowerOn,
            stubs::rtc_uninit_auto_power_on as usize,
        );
    } else {
        log::debug!("Native RTC usable; leaving RTC dispatch slots alone");
    }
}
