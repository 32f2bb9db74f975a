//! Special function registers: DDR pad isolation

use crate::bus::RegisterBus;

/// SFR base address
pub const SFR_BASE: u32 = 0xF803_0000;
/// DDR Configuration Register
pub const SFR_DDRCFG: u32 = SFR_BASE + 0x04;

/// Force the DQ input buffers into their isolated state
pub const DDRCFG_FDQIEN: u32 = 1 << 16;
/// Force the DQS input buffers into their isolated state
pub const DDRCFG_FDQSIEN: u32 = 1 << 17;

const DDRCFG_PAD_MASK: u32 = DDRCFG_FDQIEN | DDRCFG_FDQSIEN;

/// SFR driver.
pub struct Sfr<B> {
    bus: B,
}

impl<B: RegisterBus> Sfr<B> {
    /// Wrap a register bus.
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Isolate the DDR data pads while the device is in self-refresh.
    pub fn isolate_ddr_pads(&mut self) {
        self.bus.set_bits(SFR_DDRCFG, DDRCFG_PAD_MASK);
    }

    /// Release the DDR data pads.
    pub fn connect_ddr_pads(&mut self) {
        self.bus.clear_bits(SFR_DDRCFG, DDRCFG_PAD_MASK);
    }

    /// `true` while the pads are isolated.
    pub fn ddr_pads_isolated(&self) -> bool {
        self.bus.read(SFR_DDRCFG) & DDRCFG_PAD_MASK != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockBus;

    #[test]
    fn test_pad_isolation_round_trip() {
        let mut bus = MockBus::new();
        bus.preset(SFR_DDRCFG, 1);
        let mut sfr = Sfr::new(&mut bus);
        sfr.isolate_ddr_pads();
        assert!(sfr.ddr_pads_isolated());
        sfr.connect_ddr_pads();
        assert!(!sfr.ddr_pads_isolated());
        assert_eq!(bus.value(SFR_DDRCFG), 1);
    }
}
