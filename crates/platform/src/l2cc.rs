//! L2 cache controller (PL310)
//!
//! The demo keeps the L2 cache off. Clock gating and standby mode are still
//! enabled so the idle controller draws as little as possible.

use crate::bus::RegisterBus;

/// L2CC base address
pub const L2CC_BASE: u32 = 0x00A0_0000;
/// Control Register
pub const L2CC_CR: u32 = L2CC_BASE + 0x100;
/// Power Control Register
pub const L2CC_POWCR: u32 = L2CC_BASE + 0xF80;

/// `L2CC_CR.L2CEN`
pub const CR_L2CEN: u32 = 1 << 0;
/// Standby mode enable
pub const POWCR_STBYEN: u32 = 1 << 0;
/// Dynamic clock gating enable
pub const POWCR_DCKGATEN: u32 = 1 << 1;

/// L2CC driver.
pub struct L2cc<B> {
    bus: B,
}

impl<B: RegisterBus> L2cc<B> {
    /// Wrap a register bus.
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Enable dynamic clock gating and standby mode.
    pub fn enable_clock_gating(&mut self) {
        self.bus
            .set_bits(L2CC_POWCR, POWCR_STBYEN | POWCR_DCKGATEN);
    }

    /// Turn the cache off.
    pub fn disable(&mut self) {
        self.bus.clear_bits(L2CC_CR, CR_L2CEN);
    }

    /// `true` while the cache is on.
    pub fn is_enabled(&self) -> bool {
        self.bus.read(L2CC_CR) & CR_L2CEN != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockBus;

    #[test]
    fn test_gating_then_disable() {
        let mut bus = MockBus::new();
        bus.preset(L2CC_CR, CR_L2CEN);
        let mut l2 = L2cc::new(&mut bus);
        l2.enable_clock_gating();
        l2.disable();
        assert!(!l2.is_enabled());
        assert_eq!(bus.value(L2CC_POWCR), POWCR_STBYEN | POWCR_DCKGATEN);
    }
}
