//! Canned replacement routines for firmware dispatch slots.
//!
//! Everything here answers hardware questions the platform cannot actually
//! answer: setters acknowledge and do nothing, getters fabricate the most
//! plausible healthy value. Bodies are intentionally trivial; the machinery
//! that installs them lives in the parent module.
//!
//! All routines use the C calling convention because their addresses go into
//! a table owned by foreign code.

pub const POWER_STATUS_GOOD: i32 = 1;

/// Dual-PSU health report as the firmware module lays it out.
#[repr(C)]
pub struct PowerInfo {
    pub power_1: i32,
    pub power_2: i32,
}

/// Calendar time as the firmware module lays it out.
#[repr(C)]
pub struct RtcTime {
    pub second: i32,
    pub minute: i32,
    pub hours: i32,
    pub weekday: i32,
    pub day: i32,
    pub month: i32,
    pub year: i32,
}

macro_rules! zero_int_stub {
    ($name:ident, $label:literal) => {
        pub extern "C" fn $name(_a: usize, _b: usize) -> i32 {
            log::debug!(concat!("Firmware stub '", $label, "' called"));
            0
        }
    };
}

zero_int_stub!(set_fan_state, "set_fan_state");
zero_int_stub!(set_disk_led, "set_disk_led");
zero_int_stub!(set_power_led, "set_power_led");
zero_int_stub!(set_gpio_pin_blink, "set_gpio_pin_blink");
zero_int_stub!(set_alarm_led, "set_alarm_led");
zero_int_stub!(set_buzzer_cleared, "set_buzzer_cleared");
zero_int_stub!(set_cpu_fan_status, "set_cpu_fan_status");
zero_int_stub!(set_phy_led, "set_phy_led");
zero_int_stub!(set_hdd_act_led, "set_hdd_act_led");
zero_int_stub!(get_microp_id, "get_microp_id");
zero_int_stub!(set_microp_id, "set_microp_id");

/// Report every GPIO pin as usable (second word of the pin block is the
/// error/unusable flag).
pub extern "C" fn get_gpio_pin_usable(pin: *mut i32) -> i32 {
    if pin.is_null() {
        log::error!("BUG: GPIO query with NULL pin block");
        return 0;
    }
    // Safety: the firmware module passes a pin block of at least two words.
    unsafe { *pin.add(1) = 0 };
    0
}

/// Accept any GPIO write, log what would have been set.
pub extern "C" fn set_gpio_pin_usable(pin: *const i32) -> i32 {
    if pin.is_null() {
        log::error!("BUG: GPIO write with NULL pin block");
        return 0;
    }
    for i in 0..4 {
        // Safety: the firmware module passes a pin block of four words.
        log::debug!("GPIO write word {i}: {}", unsafe { *pin.add(i) });
    }
    0
}

/// There is no buzzer; report it permanently cleared.
pub extern "C" fn get_buzzer_cleared(state: *mut u8) -> i32 {
    if state.is_null() {
        log::error!("BUG: buzzer query with NULL state");
        return 0;
    }
    // Safety: single-byte out-parameter.
    unsafe { *state = 0 };
    0
}

/// Report both power supplies healthy.
pub extern "C" fn get_power_status(power: *mut PowerInfo) -> i32 {
    if power.is_null() {
        log::error!("BUG: power query with NULL report block");
        return 0;
    }
    // Safety: out-parameter owned by the caller.
    unsafe {
        (*power).power_1 = POWER_STATUS_GOOD;
        (*power).power_2 = POWER_STATUS_GOOD;
    }
    0
}

/// RTC emulation for platforms without a usable hardware clock. The firmware
/// module only needs the calls to succeed; time itself is kept by the OS.
pub extern "C" fn rtc_get_time(time: *mut RtcTime) -> i32 {
    if time.is_null() {
        log::error!("BUG: RTC read with NULL time block");
        return 0;
    }
    // Safety: out-parameter owned by the caller.
    unsafe {
        std::ptr::write(
            time,
            RtcTime {
                second: 0,
                minute: 0,
                hours: 0,
                weekday: 0,
                day: 1,
                month: 0,
                year: 70,
            },
        );
    }
    log::debug!("Emulated RTC read");
    0
}

pub extern "C" fn rtc_set_time(_time: *const RtcTime) -> i32 {
    log::debug!("Emulated RTC write ignored");
    0
}

zero_int_stub!(rtc_set_auto_power_on, "rtc_set_auto_power_on");
zero_int_stub!(rtc_get_auto_power_on, "rtc_get_auto_power_on");
zero_int_stub!(rtc_init_auto_power_on, "rtc_init_auto_power_on");
zero_int_stub!(rtc_uninit_auto_power_on, "rtc_uninit_auto_power_on");
