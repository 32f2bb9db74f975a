//! Register bus abstraction
//!
//! Every driver in this crate talks to the SAMA5D2 through [`RegisterBus`]
//! instead of dereferencing raw pointers. On hardware the bus is [`Mmio`]
//! (volatile 32-bit accesses); in host tests it is
//! [`MockBus`](crate::mocks::MockBus), which records every write and serves
//! preset or scripted reads so that register *ordering* can be asserted.

/// 32-bit register access.
pub trait RegisterBus {
    /// Read the register at absolute address `addr`.
    fn read(&self, addr: u32) -> u32;

    /// Write `value` to the register at absolute address `addr`.
    fn write(&mut self, addr: u32, value: u32);

    /// Read-modify-write.
    fn modify<F>(&mut self, addr: u32, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read(addr);
        self.write(addr, f(value));
    }

    /// Set the bits of `mask` with a read-modify-write.
    fn set_bits(&mut self, addr: u32, mask: u32) {
        self.modify(addr, |v| v | mask);
    }

    /// Clear the bits of `mask` with a read-modify-write.
    fn clear_bits(&mut self, addr: u32, mask: u32) {
        self.modify(addr, |v| v & !mask);
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    fn read(&self, addr: u32) -> u32 {
        (**self).read(addr)
    }

    fn write(&mut self, addr: u32, value: u32) {
        (**self).write(addr, value);
    }
}

/// Number of status reads before a poll gives up.
///
/// At the slowest table entry (MCK = 512 Hz) a single `MCKRDY` transition
/// takes a handful of slow-clock cycles, while one bus read costs one MCK
/// cycle, so the budget is sized for the slow end of the table rather than
/// for run mode.
pub const DEFAULT_POLL_BUDGET: u32 = 2_000_000;

/// A status bit did not reach the expected state within the poll budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("register {addr:#010x} did not reach mask {mask:#x}")]
pub struct PollTimeout {
    /// Register that was polled.
    pub addr: u32,
    /// Bits that were expected to be set.
    pub mask: u32,
}

/// Busy-poll `addr` until every bit of `mask` reads as set.
pub fn wait_for_bits<B: RegisterBus + ?Sized>(
    bus: &B,
    addr: u32,
    mask: u32,
    budget: u32,
) -> Result<(), PollTimeout> {
    for _ in 0..budget {
        if bus.read(addr) & mask == mask {
            return Ok(());
        }
        core::hint::spin_loop();
    }
    Err(PollTimeout { addr, mask })
}

/// Busy-poll `addr` until every bit of `mask` reads as clear.
pub fn wait_for_clear<B: RegisterBus + ?Sized>(
    bus: &B,
    addr: u32,
    mask: u32,
    budget: u32,
) -> Result<(), PollTimeout> {
    for _ in 0..budget {
        if bus.read(addr) & mask == 0 {
            return Ok(());
        }
        core::hint::spin_loop();
    }
    Err(PollTimeout { addr, mask })
}

/// Volatile memory-mapped register bus.
///
/// Zero-sized: every driver can hold its own copy.
#[cfg(feature = "hardware")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Mmio;

#[cfg(feature = "hardware")]
impl Mmio {
    /// Create the MMIO bus handle.
    ///
    /// # Safety
    ///
    /// The caller must be running on a SAMA5D2 with the peripheral address
    /// space mapped (MMU off or identity-mapped as strongly-ordered memory).
    pub const unsafe fn new() -> Self {
        Self
    }
}

#[cfg(feature = "hardware")]
impl RegisterBus for Mmio {
    #[inline(always)]
    fn read(&self, addr: u32) -> u32 {
        // SAFETY: `Mmio` is only constructible through `Mmio::new`, whose
        // contract guarantees that peripheral addresses are mapped. All
        // register addresses used by this crate are 4-byte aligned.
        unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
    }

    #[inline(always)]
    fn write(&mut self, addr: u32, value: u32) {
        // SAFETY: see `read`.
        unsafe { core::ptr::write_volatile(addr as usize as *mut u32, value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockBus;

    #[test]
    fn modify_preserves_other_bits() {
        let mut bus = MockBus::new();
        bus.preset(0x1000, 0b1010);
        bus.set_bits(0x1000, 0b0001);
        assert_eq!(bus.value(0x1000), 0b1011);
        bus.clear_bits(0x1000, 0b1000);
        assert_eq!(bus.value(0x1000), 0b0011);
    }

    #[test]
    fn wait_for_bits_succeeds_once_bit_appears() {
        let bus = MockBus::new();
        bus.script_reads(0x2000, &[0, 0, 0b100]);
        assert_eq!(wait_for_bits(&bus, 0x2000, 0b100, 10), Ok(()));
    }

    #[test]
    fn wait_for_bits_reports_timeout() {
        let bus = MockBus::new();
        let err = wait_for_bits(&bus, 0x2000, 0b100, 5).unwrap_err();
        assert_eq!(err, PollTimeout { addr: 0x2000, mask: 0b100 });
    }

    #[test]
    fn wait_for_clear_succeeds_on_zero() {
        let bus = MockBus::new();
        bus.script_reads(0x3000, &[1, 1]);
        assert_eq!(wait_for_clear(&bus, 0x3000, 1, 10), Ok(()));
    }
}
