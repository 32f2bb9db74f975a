//! Low-power sequencer typestate tests.
//!
//! The sequencer only exposes `reclock` → `sleep` → `restore` → `finish`,
//! in that order. These tests walk the chain step by step against a small
//! PMC model and check what each step did to the hardware.

// Integration test file -- intentional test patterns permitted.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
)]

use std::collections::HashMap;

use platform::clock_config::{MckSource, CLOCK_SETTINGS};
use platform::cpu::Cpu;
use platform::pmc::{
    CKGR_PLLAR, CKGR_UCKR, PMC_MCKR, PMC_SR, SCKC_CR, SCKC_CR_OSCSEL, SR_LOCKA, SR_LOCKU,
    SR_MCKRDY, SR_MOSCRCS, SR_MOSCSELS, SR_MOSCXTS, SR_OSCSELS, UCKR_UPLLEN,
};
use platform::power::{
    LowPowerMode, LowPowerSequencer, PowerError, Reclocked, Restored, Running, SleepRequest,
    Woken,
};
use platform::RegisterBus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Write(u32, u32),
    Wfi,
    Wfe,
    Dsb,
}

#[derive(Default)]
struct PmcModel {
    regs: HashMap<u32, u32>,
    events: Vec<Event>,
}

impl PmcModel {
    fn reg(&self, addr: u32) -> u32 {
        self.regs.get(&addr).copied().unwrap_or(0)
    }

    fn sleeps(&self) -> usize {
        self.events.iter().filter(|e| !matches!(e, Event::Write(..))).count()
    }

    fn css(&self) -> u32 {
        self.reg(PMC_MCKR) & 0x3
    }
}

impl RegisterBus for PmcModel {
    fn read(&self, addr: u32) -> u32 {
        if addr != PMC_SR {
            return self.reg(addr);
        }
        let mut sr = SR_MCKRDY | SR_MOSCXTS | SR_MOSCRCS | SR_MOSCSELS;
        if self.reg(CKGR_PLLAR) & (0x7F << 18) != 0 {
            sr |= SR_LOCKA;
        }
        if self.reg(CKGR_UCKR) & UCKR_UPLLEN != 0 {
            sr |= SR_LOCKU;
        }
        if self.reg(SCKC_CR) & SCKC_CR_OSCSEL != 0 {
            sr |= SR_OSCSELS;
        }
        sr
    }

    fn write(&mut self, addr: u32, value: u32) {
        self.regs.insert(addr, value);
        self.events.push(Event::Write(addr, value));
    }
}

impl Cpu for PmcModel {
    fn data_sync_barrier(&mut self) {
        self.events.push(Event::Dsb);
    }

    fn wait_for_interrupt(&mut self) {
        self.events.push(Event::Wfi);
    }

    fn wait_for_event(&mut self) {
        self.events.push(Event::Wfe);
    }
}

#[test]
fn test_begin_only_copies_settings() {
    let mut sys = PmcModel::default();
    let seq: LowPowerSequencer<'_, PmcModel, Running> =
        LowPowerSequencer::begin(&mut sys, SleepRequest::new(LowPowerMode::Ulp0, 4)).unwrap();
    assert_eq!(seq.request().setting, 4);
    drop(seq);
    assert!(sys.events.is_empty());
}

#[test]
fn test_reclock_switches_to_sleep_setting_without_sleeping() {
    let mut sys = PmcModel::default();
    let seq = LowPowerSequencer::begin(&mut sys, SleepRequest::new(LowPowerMode::Ulp0, 4)).unwrap();
    let reclocked: LowPowerSequencer<'_, PmcModel, Reclocked> = seq.reclock().unwrap();
    drop(reclocked);
    assert_eq!(sys.css(), MckSource::Slow.css());
    assert_eq!(sys.sleeps(), 0);
}

#[test]
fn test_sleep_keeps_sleep_clocks_until_restore() {
    let mut sys = PmcModel::default();
    let seq = LowPowerSequencer::begin(&mut sys, SleepRequest::new(LowPowerMode::Idle, 1)).unwrap();
    let woken: LowPowerSequencer<'_, PmcModel, Woken> = seq.reclock().unwrap().sleep().unwrap();
    drop(woken);
    assert_eq!(sys.css(), MckSource::Main.css());
    assert_eq!(&sys.events[sys.events.len() - 2..], &[Event::Dsb, Event::Wfi]);
}

#[test]
fn test_full_chain_restores_run_clocks() {
    let mut sys = PmcModel::default();
    let seq = LowPowerSequencer::begin(&mut sys, SleepRequest::new(LowPowerMode::Ulp1, 6)).unwrap();
    let restored: LowPowerSequencer<'_, PmcModel, Restored> =
        seq.reclock().unwrap().sleep().unwrap().restore().unwrap();
    let report = restored.finish();

    assert_eq!(report.mode, LowPowerMode::Ulp1);
    assert_eq!(report.asleep, CLOCK_SETTINGS[6].summary());
    assert_eq!(sys.css(), CLOCK_SETTINGS[0].mck_source.css());
    assert_eq!(
        sys.events.iter().filter(|e| **e == Event::Wfe).count(),
        2,
        "ULP1 sleeps with two WFE"
    );
    assert!(!sys.events.contains(&Event::Wfi));
}

#[test]
fn test_out_of_table_setting_fails_at_begin() {
    let mut sys = PmcModel::default();
    let result = LowPowerSequencer::begin(&mut sys, SleepRequest::new(LowPowerMode::Idle, 99));
    assert!(matches!(result, Err(PowerError::Clock(_))));
}
