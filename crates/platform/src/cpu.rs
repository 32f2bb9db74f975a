//! CPU sleep and barrier primitives
//!
//! The low-power sequencer needs three instructions besides register
//! accesses: `DSB` before `WFI` so that the last clock write has reached the
//! PMC, `WFI` for idle / ULP0 and `WFE` for ULP1. They sit behind [`Cpu`] so
//! the sequencer can run against [`MockBus`](crate::mocks::MockBus), which
//! journals them together with register writes.

use crate::bus::RegisterBus;

/// Barrier and sleep instructions.
pub trait Cpu {
    /// Data synchronisation barrier.
    fn data_sync_barrier(&mut self);

    /// Wait for interrupt. Returns when an interrupt line is pending, even
    /// with IRQs masked in CPSR.
    fn wait_for_interrupt(&mut self);

    /// Wait for event.
    fn wait_for_event(&mut self);
}

impl<C: Cpu + ?Sized> Cpu for &mut C {
    fn data_sync_barrier(&mut self) {
        (**self).data_sync_barrier();
    }

    fn wait_for_interrupt(&mut self) {
        (**self).wait_for_interrupt();
    }

    fn wait_for_event(&mut self) {
        (**self).wait_for_event();
    }
}

/// A register bus paired with a CPU, for code that needs both through one
/// handle.
#[derive(Debug, Default)]
pub struct WithCpu<B, C> {
    /// Register bus
    pub bus: B,
    /// CPU primitives
    pub cpu: C,
}

impl<B, C> WithCpu<B, C> {
    /// Pair `bus` with `cpu`.
    pub const fn new(bus: B, cpu: C) -> Self {
        Self { bus, cpu }
    }
}

impl<B: RegisterBus, C> RegisterBus for WithCpu<B, C> {
    fn read(&self, addr: u32) -> u32 {
        self.bus.read(addr)
    }

    fn write(&mut self, addr: u32, value: u32) {
        self.bus.write(addr, value);
    }
}

impl<B, C: Cpu> Cpu for WithCpu<B, C> {
    fn data_sync_barrier(&mut self) {
        self.cpu.data_sync_barrier();
    }

    fn wait_for_interrupt(&mut self) {
        self.cpu.wait_for_interrupt();
    }

    fn wait_for_event(&mut self) {
        self.cpu.wait_for_event();
    }
}

/// The Cortex-A5 core.
#[cfg(all(feature = "hardware", target_arch = "arm"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct CortexA5;

#[cfg(all(feature = "hardware", target_arch = "arm"))]
impl Cpu for CortexA5 {
    #[inline(always)]
    fn data_sync_barrier(&mut self) {
        // SAFETY: DSB has no memory-safety preconditions.
        unsafe { core::arch::asm!("dsb", options(nostack, preserves_flags)) }
    }

    #[inline(always)]
    fn wait_for_interrupt(&mut self) {
        // SAFETY: WFI only suspends execution until an interrupt is pending.
        unsafe { core::arch::asm!("wfi", options(nomem, nostack, preserves_flags)) }
    }

    #[inline(always)]
    fn wait_for_event(&mut self) {
        // SAFETY: WFE only suspends execution until an event is signalled.
        unsafe { core::arch::asm!("wfe", options(nomem, nostack, preserves_flags)) }
    }
}
