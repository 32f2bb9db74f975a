//! Advanced interrupt controller
//!
//! Sources are addressed by selecting them in `AIC_SSR` first. IRQs stay
//! masked in CPSR, so an enabled and pending line only serves to end `WFI`.

use crate::bus::RegisterBus;

/// AIC base address
pub const AIC_BASE: u32 = 0xFC02_0000;
/// Source Select Register
pub const AIC_SSR: u32 = AIC_BASE;
/// Source Mode Register
pub const AIC_SMR: u32 = AIC_BASE + 0x04;
/// End of Interrupt Command Register
pub const AIC_EOICR: u32 = AIC_BASE + 0x38;
/// Interrupt Enable Command Register
pub const AIC_IECR: u32 = AIC_BASE + 0x40;
/// Interrupt Disable Command Register
pub const AIC_IDCR: u32 = AIC_BASE + 0x44;
/// Interrupt Clear Command Register
pub const AIC_ICCR: u32 = AIC_BASE + 0x48;

/// Number of interrupt sources
pub const AIC_SOURCES: u8 = 128;

/// Peripheral ID of the RTC interrupt (shared system controller line)
pub const ID_RTC: u8 = 74;

/// AIC driver.
pub struct Aic<B> {
    bus: B,
}

impl<B: RegisterBus> Aic<B> {
    /// Wrap a register bus.
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    fn select(&mut self, id: u8) {
        self.bus.write(AIC_SSR, u32::from(id & 0x7F));
    }

    /// Enable source `id`.
    pub fn enable(&mut self, id: u8) {
        self.select(id);
        self.bus.write(AIC_IECR, 1);
    }

    /// Disable source `id`.
    pub fn disable(&mut self, id: u8) {
        self.select(id);
        self.bus.write(AIC_IDCR, 1);
    }

    /// Clear a pending edge on source `id`.
    pub fn clear(&mut self, id: u8) {
        self.select(id);
        self.bus.write(AIC_ICCR, 1);
    }

    /// Disable and clear every source.
    pub fn disable_all(&mut self) {
        for id in 0..AIC_SOURCES {
            self.disable(id);
            self.bus.write(AIC_ICCR, 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockBus;

    #[test]
    fn test_enable_selects_source_first() {
        let mut bus = MockBus::new();
        Aic::new(&mut bus).enable(68);
        assert_eq!(bus.first_write(AIC_SSR), Some(0));
        assert_eq!(bus.first_write(AIC_IECR), Some(1));
        assert_eq!(bus.value(AIC_SSR), 68);
    }

    #[test]
    fn test_disable_all_covers_every_source() {
        let mut bus = MockBus::new();
        Aic::new(&mut bus).disable_all();
        assert_eq!(bus.writes_to(AIC_IDCR).count(), 128);
        assert_eq!(bus.last_write(AIC_SSR), Some(127));
    }
}
