/// Known slots of the firmware module's hardware dispatch table.
///
/// Slot meaning is positional; the numbering matches the current firmware
/// generation's layout (the hwmon group sits before the safe-remove LED and
/// system-current entries). Using an enum instead of raw indices keeps patch
/// sites honest about which operation they touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Slot {
    /// Table ownership marker; never patched.
    StructOwner = 0,
    GetBrand = 1,
    GetModel = 2,
    GetCpldVersion = 3,
    RtcGetTime = 4,
    RtcSetTime = 5,
    GetFanState = 6,
    SetFanState = 7,
    GetSysTemp = 8,
    GetCpuTemp = 9,
    SetDiskLed = 10,
    SetPowerLed = 11,
    GetCpldReg = 12,
    SetPmuMemByte = 13,
    GetPmuMemByte = 14,
    SetGpioPin = 15,
    GetGpioPin = 16,
    SetGpioPinBlink = 17,
    RtcSetAutoPowerOn = 18,
    RtcGetAutoPowerOn = 19,
    RtcInitAutoPowerOn = 20,
    RtcUninitAutoPowerOn = 21,
    SetAlarmLed = 22,
    GetBuzzerCleared = 23,
    SetBuzzerCleared = 24,
    GetPowerStatus = 25,
    GetBackplaneStatus = 26,
    InitModuleType = 27,
    Uninit = 28,
    SetCpuFanStatus = 29,
    SetPhyLed = 30,
    SetHddActLed = 31,
    SetPwm = 32,
    GetMicropId = 33,
    SetMicropId = 34,
    GetSuperIoMem = 35,
    SetSuperIoMem = 36,
    SendLcdPacket = 37,
    GetMemUint = 38,
    SetMemUint = 39,
    GetCpuInfo = 40,
    SetHaLed = 41,
    GetCopyButton = 42,
    GetHwmonFanRpm = 43,
    GetHwmonPsuStatus = 44,
    GetHwmonVoltage = 45,
    GetHwmonHddBackplane = 46,
    GetHwmonThermal = 47,
    GetHwmonCurrent = 48,
    SetSafeRemoveLed = 49,
    GetSysCurrent = 50,
    GetHddIface = 51,
}

impl Slot {
    /// Total number of table slots.
    pub const COUNT: usize = 52;

    pub const fn index(self) -> usize {
        self as usize
    }
}
