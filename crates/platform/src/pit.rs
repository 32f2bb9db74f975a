//! Periodic interval timer as a busy-wait delay source
//!
//! With `PIV` at its maximum the timer period is exactly 2^20 ticks, so
//! `PIT_PIIR` (`PICNT << 20 | CPIV`) reads as a free-running 32-bit counter
//! clocked at MCK / 16. [`Pit`] implements [`embedded_hal::delay::DelayNs`]
//! on top of it; the tick rate must be updated after every clock change.

use embedded_hal::delay::DelayNs;

use crate::bus::{RegisterBus, DEFAULT_POLL_BUDGET};
use crate::pmc::{Pmc, PmcError};

/// PIT base address
pub const PIT_BASE: u32 = 0xF804_8030;
/// Mode Register
pub const PIT_MR: u32 = PIT_BASE;
/// Status Register
pub const PIT_SR: u32 = PIT_BASE + 0x04;
/// Value Register (reading clears PICNT)
pub const PIT_PIVR: u32 = PIT_BASE + 0x08;
/// Image Register (no side effect)
pub const PIT_PIIR: u32 = PIT_BASE + 0x0C;

/// Largest period value
pub const MR_PIV_MAX: u32 = 0x000F_FFFF;
/// Timer enable
pub const MR_PITEN: u32 = 1 << 24;

/// Peripheral ID of the PIT
pub const ID_PIT: u8 = 3;

/// PIT-backed delay.
pub struct Pit<B> {
    bus: B,
    tick_hz: u32,
}

impl<B: RegisterBus> Pit<B> {
    /// Wrap a register bus; `mck_hz` is the current master clock.
    pub fn new(bus: B, mck_hz: u32) -> Self {
        Self { bus, tick_hz: mck_hz / 16 }
    }

    /// Enable the PIT peripheral clock and start free-running at the
    /// maximum period.
    pub fn start(&mut self) -> Result<(), PmcError> {
        Pmc::new(&mut self.bus).enable_peripheral(ID_PIT)?;
        self.bus.write(PIT_MR, MR_PIV_MAX | MR_PITEN);
        let _ = self.bus.read(PIT_PIVR);
        Ok(())
    }

    /// Stop the timer.
    pub fn stop(&mut self) {
        self.bus.clear_bits(PIT_MR, MR_PITEN);
    }

    /// Follow a master clock change.
    pub fn set_mck_hz(&mut self, mck_hz: u32) {
        self.tick_hz = mck_hz / 16;
    }

    /// Counter frequency.
    pub fn tick_hz(&self) -> u32 {
        self.tick_hz
    }

    /// Current counter value.
    pub fn now(&self) -> u32 {
        self.bus.read(PIT_PIIR)
    }

    /// Ticks covering `ns` nanoseconds, rounded up.
    #[allow(clippy::arithmetic_side_effects)]
    pub fn ns_to_ticks(&self, ns: u32) -> u32 {
        let ticks = (u64::from(ns) * u64::from(self.tick_hz)).div_ceil(1_000_000_000);
        u32::try_from(ticks).unwrap_or(u32::MAX)
    }
}

impl<B: RegisterBus> DelayNs for Pit<B> {
    fn delay_ns(&mut self, ns: u32) {
        let ticks = self.ns_to_ticks(ns);
        let start = self.now();
        let mut last = start;
        let mut stalled = 0u32;
        while self.now().wrapping_sub(start) < ticks {
            let now = self.now();
            if now == last {
                // A stopped timer would otherwise spin forever.
                stalled = stalled.saturating_add(1);
                if stalled >= DEFAULT_POLL_BUDGET {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("PIT not counting, delay abandoned");
                    return;
                }
            } else {
                stalled = 0;
                last = now;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::MockBus;
    use crate::pmc::PMC_PCER0;

    #[test]
    fn test_tick_conversion_rounds_up() {
        let mut bus = MockBus::new();
        let pit = Pit::new(&mut bus, 166_000_000);
        assert_eq!(pit.tick_hz(), 10_375_000);
        assert_eq!(pit.ns_to_ticks(1_000), 11);
        assert_eq!(pit.ns_to_ticks(0), 0);
    }

    #[test]
    fn test_start_enables_timer() {
        let mut bus = MockBus::new();
        assert_eq!(Pit::new(&mut bus, 12_000_000).start(), Ok(()));
        assert_eq!(bus.last_write(PIT_MR), Some(MR_PIV_MAX | MR_PITEN));
        assert_eq!(bus.last_write(PMC_PCER0), Some(1 << ID_PIT));
        let pcer = bus.first_write(PMC_PCER0).unwrap();
        let mr = bus.first_write(PIT_MR).unwrap();
        assert!(pcer < mr, "clock before the timer is enabled");
    }

    #[test]
    fn test_stop_and_reclock() {
        let mut bus = MockBus::new();
        let mut pit = Pit::new(&mut bus, 12_000_000);
        assert_eq!(pit.start(), Ok(()));
        pit.stop();
        pit.set_mck_hz(166_000_000);
        assert_eq!(pit.tick_hz(), 10_375_000);
        assert_eq!(bus.value(PIT_MR) & MR_PITEN, 0);
    }

    #[test]
    fn test_delay_waits_for_enough_ticks() {
        let mut bus = MockBus::new();
        bus.preset(PIT_PIIR, 5_000);
        bus.script_reads(PIT_PIIR, &[100, 100, 300, 300, 800, 800]);
        // 16 MHz MCK -> 1 MHz ticks -> 1 us per tick.
        Pit::new(&mut bus, 16_000_000).delay_us(1_000);
        // Every scripted sample was consumed before the delay ended.
        assert_eq!(bus.read(PIT_PIIR), 5_000);
    }

    #[test]
    fn test_delay_gives_up_on_stopped_timer() {
        let mut bus = MockBus::new();
        Pit::new(&mut bus, 16_000_000).delay_us(1);
    }
}
