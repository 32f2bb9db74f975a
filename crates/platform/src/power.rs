//! Low-power sequencing
//!
//! A low-power entry is a fixed chain of steps:
//!
//! ```text
//! [Running] --reclock()--> [Reclocked] --sleep()--> [Woken] --restore()--> [Restored]
//! ```
//!
//! `reclock` optionally parks the DDR in self-refresh and applies the
//! requested PCK/MCK setting. `sleep` executes `DSB; WFI` (idle, ULP0) or
//! `WFE; WFE` (ULP1), waits for `MCKRDY` and toggles the wake indicator.
//! `restore` puts back the run-mode clock setting and, if needed, brings the
//! DDR out of self-refresh. Each state only exposes its own transition, so
//! sleeping without reclocking or skipping the clock restore does not
//! compile.
//!
//! [`with_peripherals_saved`] is the bracket around it used by the ULP
//! modes: peripheral clock snapshot, PIO reset state, then the caller's work,
//! then the snapshot written back.

use core::marker::PhantomData;

use crate::aic::{Aic, ID_RTC};
use crate::bus::RegisterBus;
use crate::clock_config::{self, ClockConfig, ClockConfigError, ClockSummary};
use crate::config::RUN_CLOCK_SETTING;
use crate::cpu::Cpu;
use crate::ddr::{Ddr, DdrError};
use crate::pio::{Pin, Pio, JTAG_EXCLUDED_MASKS};
use crate::pmc::{Pmc, PmcError, FSMR_FSTT0, FSMR_FSTT2, FSMR_LPM, FSMR_RTCAL, FSPR_FSTP0};
use crate::rtc::{Rtc, RtcError};
use crate::shdwc::Shdwc;

/// Sleep depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LowPowerMode {
    /// Core clock stopped, peripherals keep running.
    Idle,
    /// Ultra low power 0: clocks slowed, core in `WFI`.
    Ulp0,
    /// Ultra low power 1: clocks stopped until a fast start-up input.
    Ulp1,
}

impl LowPowerMode {
    /// `true` for the modes that sleep with `WFI`.
    pub const fn waits_for_interrupt(self) -> bool {
        matches!(self, Self::Idle | Self::Ulp0)
    }
}

/// What to run while asleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepRequest {
    /// Sleep depth
    pub mode: LowPowerMode,
    /// Index into [`clock_config::CLOCK_SETTINGS`]
    pub setting: usize,
    /// LED toggled on wake-up
    pub wake_led: Option<Pin>,
    /// Put the DDR into self-refresh around the sleep
    pub ddr_self_refresh: bool,
}

impl SleepRequest {
    /// Request `mode` at clock `setting`, no indicator, DDR untouched.
    pub const fn new(mode: LowPowerMode, setting: usize) -> Self {
        Self { mode, setting, wake_led: None, ddr_self_refresh: false }
    }

    /// Toggle `pin` once the core is awake again.
    #[must_use]
    pub const fn with_wake_led(mut self, pin: Pin) -> Self {
        self.wake_led = Some(pin);
        self
    }

    /// Keep DDR contents through the sleep.
    #[must_use]
    pub const fn with_ddr_self_refresh(mut self) -> Self {
        self.ddr_self_refresh = true;
        self
    }
}

/// Outcome of one low-power round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WakeReport {
    /// Mode that was entered
    pub mode: LowPowerMode,
    /// Clock setting used while asleep
    pub setting: usize,
    /// Frequencies used while asleep
    pub asleep: ClockSummary,
    /// `true` if the DDR had to be brought out of self-refresh
    pub ddr_resumed: bool,
}

/// Low-power failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerError {
    /// Clock reconfiguration failed.
    #[error("clock control: {0}")]
    Pmc(#[from] PmcError),
    /// Unknown or invalid clock setting.
    #[error("clock setting: {0}")]
    Clock(#[from] ClockConfigError),
    /// DDR self-refresh entry or exit failed.
    #[error("DDR: {0}")]
    Ddr(#[from] DdrError),
    /// The wake-up alarm could not be armed.
    #[error("RTC: {0}")]
    Rtc(#[from] RtcError),
    /// The shutdown request returned instead of removing core power.
    #[error("backup mode entry failed")]
    BackupFailed,
}

// ── State types (zero-sized) ──────────────────────────────────────────────────

/// Run-mode clocks, sleep not yet prepared.
pub struct Running;

/// Sleep clock setting applied.
pub struct Reclocked;

/// Core resumed, still on the sleep clock setting.
pub struct Woken;

/// Run-mode clocks back.
pub struct Restored;

// ── Sequencer ────────────────────────────────────────────────────────────────

/// Typestate machine for one low-power round trip.
///
/// The scratch and backup clock records are copied out of the table when the
/// sequence starts, so nothing the sequence reads lives in memory that may
/// be in self-refresh.
pub struct LowPowerSequencer<'a, S, State> {
    sys: &'a mut S,
    request: SleepRequest,
    scratch: ClockConfig,
    backup: ClockConfig,
    ddr_resumed: bool,
    _state: PhantomData<State>,
}

impl<'a, S, State> LowPowerSequencer<'a, S, State> {
    fn into_state<Next>(self) -> LowPowerSequencer<'a, S, Next> {
        LowPowerSequencer {
            sys: self.sys,
            request: self.request,
            scratch: self.scratch,
            backup: self.backup,
            ddr_resumed: self.ddr_resumed,
            _state: PhantomData,
        }
    }

    /// The request being executed.
    pub fn request(&self) -> &SleepRequest {
        &self.request
    }
}

impl<'a, S: RegisterBus + Cpu> LowPowerSequencer<'a, S, Running> {
    /// Copy the requested and the run-mode clock settings.
    pub fn begin(sys: &'a mut S, request: SleepRequest) -> Result<Self, PowerError> {
        let scratch = *clock_config::clock_setting(request.setting)?;
        let backup = *clock_config::clock_setting(RUN_CLOCK_SETTING)?;
        Ok(Self {
            sys,
            request,
            scratch,
            backup,
            ddr_resumed: false,
            _state: PhantomData,
        })
    }

    /// Park the DDR if requested and switch to the sleep clock setting.
    pub fn reclock(self) -> Result<LowPowerSequencer<'a, S, Reclocked>, PowerError> {
        if self.request.ddr_self_refresh {
            Ddr::new(&mut *self.sys).self_refresh()?;
        }
        Pmc::new(&mut *self.sys).set_custom_pck_mck(&self.scratch)?;
        Ok(self.into_state())
    }
}

impl<'a, S: RegisterBus + Cpu> LowPowerSequencer<'a, S, Reclocked> {
    /// Sleep until a wake-up source fires, then wait for MCK.
    pub fn sleep(self) -> Result<LowPowerSequencer<'a, S, Woken>, PowerError> {
        if self.request.mode.waits_for_interrupt() {
            self.sys.data_sync_barrier();
            self.sys.wait_for_interrupt();
        } else {
            self.sys.wait_for_event();
            self.sys.wait_for_event();
        }
        Pmc::new(&mut *self.sys).wait_mck_ready()?;

        if let Some(led) = self.request.wake_led {
            Pio::new(&mut *self.sys).toggle(led);
        }
        Ok(self.into_state())
    }
}

impl<'a, S: RegisterBus + Cpu> LowPowerSequencer<'a, S, Woken> {
    /// Put the run-mode clocks back and resume the DDR.
    pub fn restore(mut self) -> Result<LowPowerSequencer<'a, S, Restored>, PowerError> {
        Pmc::new(&mut *self.sys).set_custom_pck_mck(&self.backup)?;
        if self.request.ddr_self_refresh {
            self.ddr_resumed = Ddr::new(&mut *self.sys).check_ready()?;
        }
        Ok(self.into_state())
    }
}

impl<S> LowPowerSequencer<'_, S, Restored> {
    /// Summarise the round trip.
    pub fn finish(self) -> WakeReport {
        WakeReport {
            mode: self.request.mode,
            setting: self.request.setting,
            asleep: self.scratch.summary(),
            ddr_resumed: self.ddr_resumed,
        }
    }
}

/// Run a complete low-power round trip.
pub fn low_power_run<S: RegisterBus + Cpu>(
    sys: &mut S,
    request: SleepRequest,
) -> Result<WakeReport, PowerError> {
    #[cfg(feature = "defmt")]
    defmt::debug!("low power: {} at setting {=usize}", request.mode, request.setting);

    let report = LowPowerSequencer::begin(sys, request)?
        .reclock()?
        .sleep()?
        .restore()?
        .finish();

    #[cfg(feature = "defmt")]
    defmt::debug!("low power: woke from {}", report.mode);
    Ok(report)
}

/// Snapshot the peripheral clocks, drive every PIO line to its reset state,
/// run `f`, then write the snapshot back.
///
/// Anything that must come back before the peripheral clocks (the console)
/// belongs at the end of `f`. The snapshot is restored whether or not `f`
/// succeeds.
pub fn with_peripherals_saved<S, T, E, F>(sys: &mut S, f: F) -> Result<T, E>
where
    S: RegisterBus,
    F: FnOnce(&mut S) -> Result<T, E>,
{
    let snapshot = Pmc::new(&mut *sys).snapshot();
    Pio::new(&mut *sys).restore_reset_state(&JTAG_EXCLUDED_MASKS);

    let result = f(sys);

    Pmc::new(&mut *sys).restore(&snapshot);
    result
}

/// Arm the ULP1 wake-up sources: RTC alarm `seconds` from now, and the
/// fast start-up inputs WKUP0 (active low), WKUP2 and the RTC alarm.
/// The RTC line is also unmasked in the AIC so the alarm stays pending
/// until the caller acknowledges it.
pub fn arm_ulp1_wakeup<S: RegisterBus>(sys: &mut S, seconds: u32) -> Result<(), PowerError> {
    Rtc::new(&mut *sys).configure_wakeup_alarm(seconds)?;
    Aic::new(&mut *sys).enable(ID_RTC);
    let mut pmc = Pmc::new(&mut *sys);
    pmc.set_fast_startup_polarity(0, FSPR_FSTP0);
    pmc.set_fast_startup_mode(FSMR_FSTT0 | FSMR_FSTT2 | FSMR_RTCAL | FSMR_LPM);
    Ok(())
}

/// Request backup mode, waking on WKUP0 or the RTC alarm.
///
/// On hardware this does not return. If it does, the shutdown was refused
/// and [`PowerError::BackupFailed`] is returned.
pub fn enter_backup<S: RegisterBus>(sys: &mut S) -> PowerError {
    let mut shdwc = Shdwc::new(&mut *sys);
    shdwc.configure_wakeup();
    let _ = shdwc.status();
    shdwc.shutdown();
    PowerError::BackupFailed
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use crate::clock_config::CLOCK_SETTINGS;
    use crate::config::ULP1_CLOCK_SETTING;
    use crate::ddr::{ID_MPDDRC, MPDDRC_LPR};
    use crate::mocks::{Access, MockBus};
    use crate::pio::{Port, PIO_CODR, PIO_ODSR, PIO_SODR};
    use crate::pmc::{
        CKGR_PLLAR, CKGR_UCKR, PMC_FSMR, PMC_FSPR, PMC_MCKR, PMC_PCER0, PMC_PCER1, PMC_PCSR0,
        PLLAR_ONE, PMC_SCER, PMC_SR, SR_MCKRDY,
    };
    use crate::rtc::{RTC_IER, RTC_TIMALR, SR_ALARM};
    use crate::shdwc::{CR_KEY, CR_SHDW, SHDW_CR};

    const LED: Pin = Pin::new(Port::B, 6);

    #[test]
    fn test_idle_reclocks_before_wfi_and_restores_after() {
        let mut bus = MockBus::with_pmc_model();
        let request = SleepRequest::new(LowPowerMode::Idle, 3);
        let report = low_power_run(&mut bus, request).unwrap();

        let dsb = bus.position(|a| *a == Access::Dsb).unwrap();
        let wfi = bus.position(|a| *a == Access::Wfi).unwrap();
        let first_mckr = bus.first_write(PMC_MCKR).unwrap();
        let last_mckr = bus.last_write_index(PMC_MCKR).unwrap();
        assert!(first_mckr < dsb);
        assert_eq!(wfi, dsb + 1);
        assert!(last_mckr > wfi);
        assert!(!bus.journal().contains(&Access::Wfe));

        assert_eq!(report.mode, LowPowerMode::Idle);
        assert_eq!(report.setting, 3);
        assert_eq!(report.asleep, CLOCK_SETTINGS[3].summary());
        assert!(!report.ddr_resumed);
    }

    #[test]
    fn test_ulp1_uses_two_wfe() {
        let mut bus = MockBus::with_pmc_model();
        let request = SleepRequest::new(LowPowerMode::Ulp1, ULP1_CLOCK_SETTING);
        low_power_run(&mut bus, request).unwrap();

        let wfe: heapless::Vec<usize, 4> = bus
            .journal()
            .iter()
            .enumerate()
            .filter(|(_, a)| **a == Access::Wfe)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(wfe.len(), 2);
        assert_eq!(wfe[1], wfe[0] + 1);
        assert!(!bus.journal().contains(&Access::Wfi));
    }

    #[test]
    fn test_run_setting_is_restored_after_wake() {
        let mut bus = MockBus::with_pmc_model();
        low_power_run(&mut bus, SleepRequest::new(LowPowerMode::Ulp0, 5)).unwrap();

        let wfi = bus.position(|a| *a == Access::Wfi).unwrap();
        let pllar = bus.last_write_index(CKGR_PLLAR).unwrap();
        assert!(pllar > wfi, "PLLA is only relocked after wake-up");
        assert_eq!(
            bus.last_write(CKGR_PLLAR),
            Some(PLLAR_ONE | (82 << 18) | (0x3F << 8) | 1)
        );
        assert_eq!(bus.value(PMC_MCKR) & 0x3, CLOCK_SETTINGS[0].mck_source.css());
    }

    #[test]
    fn test_wake_led_toggles_between_wake_and_restore() {
        let mut bus = MockBus::with_pmc_model();
        bus.preset(Port::B.reg(PIO_ODSR), 0);
        let request = SleepRequest::new(LowPowerMode::Idle, 1).with_wake_led(LED);
        low_power_run(&mut bus, request).unwrap();

        let wfi = bus.position(|a| *a == Access::Wfi).unwrap();
        let led = bus.first_write(Port::B.reg(PIO_SODR)).unwrap();
        let restore = bus.last_write_index(PMC_MCKR).unwrap();
        assert!(wfi < led && led < restore);
        assert!(bus.first_write(Port::B.reg(PIO_CODR)).is_none());
    }

    #[test]
    fn test_ddr_self_refresh_wraps_the_sleep() {
        let mut bus = MockBus::with_pmc_model();
        bus.write(PMC_PCER0, 1 << ID_MPDDRC);
        bus.clear_journal();

        let request = SleepRequest::new(LowPowerMode::Ulp0, 2).with_ddr_self_refresh();
        let report = low_power_run(&mut bus, request).unwrap();

        let lpr_enter = bus.first_write(MPDDRC_LPR).unwrap();
        let first_mckr = bus.first_write(PMC_MCKR).unwrap();
        let last_mckr = bus.last_write_index(PMC_MCKR).unwrap();
        let lpr_exit = bus.last_write_index(MPDDRC_LPR).unwrap();
        assert!(lpr_enter < first_mckr);
        assert!(last_mckr < lpr_exit);
        assert!(report.ddr_resumed);
        assert_ne!(bus.value(PMC_PCSR0) & (1 << ID_MPDDRC), 0);
    }

    #[test]
    fn test_unknown_setting_touches_nothing() {
        let mut bus = MockBus::with_pmc_model();
        let err = low_power_run(&mut bus, SleepRequest::new(LowPowerMode::Idle, 8));
        assert_eq!(err, Err(PowerError::Clock(ClockConfigError::UnknownSetting(8))));
        assert!(bus.journal().is_empty());
    }

    #[test]
    fn test_missing_mckrdy_after_wake_is_reported() {
        let mut bus = MockBus::with_pmc_model();
        bus.preset(PMC_SR, 0);
        let err = low_power_run(&mut bus, SleepRequest::new(LowPowerMode::Idle, 1));
        assert!(matches!(
            err,
            Err(PowerError::Pmc(PmcError::Timeout(t))) if t.mask & SR_MCKRDY != 0
        ));
    }

    #[test]
    fn test_bracket_restores_snapshot_after_work() {
        let mut bus = MockBus::with_pmc_model();
        bus.preset(PMC_PCSR0, 0x0200_0000);
        bus.preset(CKGR_UCKR, 0x1234);

        let out = with_peripherals_saved(&mut bus, |sys| {
            Pmc::new(&mut *sys).disable_all_peripherals_except(&[]);
            Ok::<_, PowerError>(7)
        });
        assert_eq!(out, Ok(7));
        assert_eq!(bus.last_write(PMC_PCER0), Some(0x0200_0000));
        assert_eq!(bus.last_write(CKGR_UCKR), Some(0x1234));
        let pcer0 = bus.last_write_index(PMC_PCER0).unwrap();
        let pcer1 = bus.last_write_index(PMC_PCER1).unwrap();
        let scer = bus.last_write_index(PMC_SCER).unwrap();
        assert!(pcer0 < pcer1 && pcer1 < scer);
    }

    #[test]
    fn test_bracket_restores_on_error() {
        let mut bus = MockBus::with_pmc_model();
        bus.preset(PMC_PCSR0, 0x40);
        let out: Result<(), _> =
            with_peripherals_saved(&mut bus, |_| Err(PowerError::BackupFailed));
        assert_eq!(out, Err(PowerError::BackupFailed));
        assert_eq!(bus.last_write(PMC_PCER0), Some(0x40));
    }

    #[test]
    fn test_ulp1_wakeup_sources() {
        let mut bus = MockBus::with_pmc_model();
        bus.preset(PMC_FSPR, FSPR_FSTP0);
        bus.preset(crate::rtc::RTC_SR, crate::rtc::SR_ACKUPD);
        assert_eq!(arm_ulp1_wakeup(&mut bus, 30), Ok(()));

        assert_eq!(bus.value(PMC_FSPR) & FSPR_FSTP0, 0);
        assert_eq!(
            bus.value(PMC_FSMR),
            FSMR_FSTT0 | FSMR_FSTT2 | FSMR_RTCAL | FSMR_LPM
        );
        assert!(bus.wrote(RTC_IER, SR_ALARM));
        assert_eq!(bus.last_write(crate::aic::AIC_SSR), Some(u32::from(ID_RTC)));
        assert_eq!(bus.last_write(crate::aic::AIC_IECR), Some(1));
        let alarm = bus.first_write(RTC_TIMALR).unwrap();
        let fsmr = bus.first_write(PMC_FSMR).unwrap();
        assert!(alarm < fsmr);
    }

    #[test]
    fn test_backup_returning_is_failure() {
        let mut bus = MockBus::new();
        assert_eq!(enter_backup(&mut bus), PowerError::BackupFailed);
        assert_eq!(bus.last_write(SHDW_CR), Some(CR_KEY | CR_SHDW));
    }
}
