//! Whole-chip handle
//!
//! Owns the register bus and hands out short-lived drivers that borrow it.
//! Drivers never outlive the call that created them, so two of them can't
//! disagree about register state.

use crate::aic::Aic;
use crate::bus::RegisterBus;
use crate::cpu::Cpu;
use crate::ddr::Ddr;
use crate::l2cc::L2cc;
use crate::pio::Pio;
use crate::pmc::Pmc;
use crate::power::{self, PowerError, SleepRequest, WakeReport};
use crate::rtc::Rtc;
use crate::sfr::Sfr;
use crate::shdwc::Shdwc;

/// SAMA5D2 peripherals behind one bus.
pub struct Chip<S> {
    sys: S,
}

impl<S: RegisterBus> Chip<S> {
    /// Take ownership of the bus.
    pub const fn new(sys: S) -> Self {
        Self { sys }
    }

    /// Give back the bus.
    pub fn release(self) -> S {
        self.sys
    }

    /// Direct register access.
    pub fn bus(&mut self) -> &mut S {
        &mut self.sys
    }

    /// Power management controller
    pub fn pmc(&mut self) -> Pmc<&mut S> {
        Pmc::new(&mut self.sys)
    }

    /// Real-time clock
    pub fn rtc(&mut self) -> Rtc<&mut S> {
        Rtc::new(&mut self.sys)
    }

    /// Shutdown controller
    pub fn shdwc(&mut self) -> Shdwc<&mut S> {
        Shdwc::new(&mut self.sys)
    }

    /// PIO controller
    pub fn pio(&mut self) -> Pio<&mut S> {
        Pio::new(&mut self.sys)
    }

    /// Interrupt controller
    pub fn aic(&mut self) -> Aic<&mut S> {
        Aic::new(&mut self.sys)
    }

    /// L2 cache controller
    pub fn l2cc(&mut self) -> L2cc<&mut S> {
        L2cc::new(&mut self.sys)
    }

    /// Special function registers
    pub fn sfr(&mut self) -> Sfr<&mut S> {
        Sfr::new(&mut self.sys)
    }

    /// DDR controller
    pub fn ddr(&mut self) -> Ddr<&mut S> {
        Ddr::new(&mut self.sys)
    }
}

impl<S: RegisterBus + Cpu> Chip<S> {
    /// Run one low-power round trip.
    pub fn low_power_run(&mut self, request: SleepRequest) -> Result<WakeReport, PowerError> {
        power::low_power_run(&mut self.sys, request)
    }
}
