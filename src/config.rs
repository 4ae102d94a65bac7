//! Hardware-capability descriptor.
//!
//! Filled in by the configuration collaborator (command-line parsing lives
//! outside this crate). The flags only decide *which* optional shims get
//! installed; none of the mechanisms below ever read configuration sources
//! themselves.

/// Capabilities and quirks of the platform the engine is retrofitting.
#[derive(Debug, Clone, Copy, Default)]
pub struct HwCapabilities {
    /// Platform has no usable hardware clock; proxy the firmware table's RTC
    /// slots instead of letting them touch the device.
    pub emulate_rtc: bool,

    /// Override the kernel's disk-activity LED control routines with no-ops.
    pub fix_disk_led_ctrl: bool,

    /// Fake a healthy PSU status for platforms whose I2C query cannot work.
    pub fake_psu_status: bool,
}
