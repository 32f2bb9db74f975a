//! Shutdown controller
//!
//! Backup mode is entered by writing the shutdown command; the core loses
//! power and the next wake-up is a cold boot. Returning from
//! [`Shdwc::shutdown`] therefore means the request did not take effect.

use crate::bus::RegisterBus;

/// SHDWC base address
pub const SHDWC_BASE: u32 = 0xF804_8010;

/// Control Register
pub const SHDW_CR: u32 = SHDWC_BASE;
/// Mode Register
pub const SHDW_MR: u32 = SHDWC_BASE + 0x04;
/// Status Register (cleared on read)
pub const SHDW_SR: u32 = SHDWC_BASE + 0x08;
/// Wake-up Inputs Register
pub const SHDW_WUIR: u32 = SHDWC_BASE + 0x0C;

/// `SHDW_CR.SHDW`: shutdown command
pub const CR_SHDW: u32 = 1 << 0;
/// `SHDW_CR.KEY`
pub const CR_KEY: u32 = 0xA5 << 24;

/// RTC alarm wake-up enable
pub const MR_RTCWKEN: u32 = 1 << 17;
/// WKUP debounce: 3 slow-clock cycles
pub const MR_WKUPDBC_3: u32 = 1 << 24;
const MR_WKUPDBC_MASK: u32 = 0x7 << 24;

/// WKUP0 input enable
pub const WUIR_WKUPEN0: u32 = 1 << 0;
/// WKUP0 polarity: 1 = active high
pub const WUIR_WKUPT0: u32 = 1 << 16;

/// Shutdown controller driver.
pub struct Shdwc<B> {
    bus: B,
}

impl<B: RegisterBus> Shdwc<B> {
    /// Wrap a register bus.
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Wake from backup on WKUP0 (low level, debounced) or the RTC alarm.
    pub fn configure_wakeup(&mut self) {
        self.bus
            .modify(SHDW_MR, |v| (v & !MR_WKUPDBC_MASK) | MR_WKUPDBC_3 | MR_RTCWKEN);
        self.bus
            .modify(SHDW_WUIR, |v| (v | WUIR_WKUPEN0) & !WUIR_WKUPT0);
    }

    /// Read (and thereby clear) the wake-up status.
    pub fn status(&mut self) -> u32 {
        self.bus.read(SHDW_SR)
    }

    /// Request backup mode.
    pub fn shutdown(&mut self) {
        #[cfg(feature = "defmt")]
        defmt::info!("SHDWC: shutdown requested");
        self.bus.write(SHDW_CR, CR_KEY | CR_SHDW);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockBus;

    #[test]
    fn test_wakeup_inputs_low_level_with_rtc() {
        let mut bus = MockBus::new();
        bus.preset(SHDW_WUIR, WUIR_WKUPT0);
        Shdwc::new(&mut bus).configure_wakeup();
        assert_eq!(bus.value(SHDW_WUIR), WUIR_WKUPEN0);
        assert_eq!(bus.value(SHDW_MR), MR_WKUPDBC_3 | MR_RTCWKEN);
    }

    #[test]
    fn test_shutdown_carries_key() {
        let mut bus = MockBus::new();
        Shdwc::new(&mut bus).shutdown();
        assert_eq!(bus.last_write(SHDW_CR), Some(0xA500_0001));
    }
}
