//! Low-power demo application
//!
//! Owns the chip, the console, a delay source and the DDR window, and runs
//! one menu command per received key. Every command ends with the menu
//! printed again; a failing command prints its error first.

use core::fmt::Write as _;

use embedded_hal::delay::DelayNs;
use platform::bus::RegisterBus;
use platform::clock_config::{self, ClockConfigError};
use platform::config::{
    self, APP_VERSION, BOARD_NAME, CHIP_NAME, RUN_CLOCK_SETTING, ULP1_CLOCK_SETTING,
    WAKEUP_DELAY_SECS,
};
use platform::cpu::Cpu;
use platform::ddr::{self, DdrConfig, DdrError, WordMemory};
use platform::pio::JTAG_EXCLUDED_MASKS;
use platform::pmc::PmcError;
use platform::power::{self, LowPowerMode, PowerError, SleepRequest, WakeReport};
use platform::uart::UartError;
use platform::Chip;

use crate::board::{self, BoardError, Console, LED};
use crate::menu::{Mailbox, MenuCommand, MENU_TEXT};

/// Command failures. All of them are reported on the console and the menu
/// carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AppError {
    /// Unknown clock setting.
    #[error("clock setting: {0}")]
    Clock(#[from] ClockConfigError),
    /// Clock tree reprogramming failed.
    #[error("clock control: {0}")]
    Pmc(#[from] PmcError),
    /// A low-power round trip failed.
    #[error("low power: {0}")]
    Power(#[from] PowerError),
    /// DDR controller failure.
    #[error("DDR: {0}")]
    Ddr(#[from] DdrError),
    /// Console or pin set-up failed.
    #[error("board: {0}")]
    Board(#[from] BoardError),
    /// The console stopped draining.
    #[error("console: {0}")]
    Console(#[from] UartError),
    /// Pattern access before the power-up sequence ran.
    #[error("DDR not initialised, run 'A' first")]
    DdrNotInitialised,
}

const ULP_LEAVE: &str = "\n\r  | | | | | | Leave Ultra Low Power mode | | | | | |\n\r";

/// The menu application.
pub struct LowPowerApp<S, C, D, M> {
    chip: Chip<S>,
    console: C,
    delay: D,
    ddr_window: M,
    setting: usize,
    ddr_initialised: bool,
}

impl<S, C, D, M> LowPowerApp<S, C, D, M>
where
    S: RegisterBus + Cpu,
    C: Console,
    D: DelayNs,
    M: WordMemory,
{
    /// Assemble the application. Nothing is touched until [`Self::start`].
    pub fn new(sys: S, console: C, delay: D, ddr_window: M) -> Self {
        Self {
            chip: Chip::new(sys),
            console,
            delay,
            ddr_window,
            setting: RUN_CLOCK_SETTING,
            ddr_initialised: false,
        }
    }

    /// Clock setting used by the next idle or ULP0 entry.
    pub fn setting(&self) -> usize {
        self.setting
    }

    /// Chip handle.
    pub fn chip(&mut self) -> &mut Chip<S> {
        &mut self.chip
    }

    /// Console handle.
    pub fn console(&mut self) -> &mut C {
        &mut self.console
    }

    /// DDR window used by the pattern commands.
    pub fn ddr_window(&mut self) -> &mut M {
        &mut self.ddr_window
    }

    /// Take the application apart.
    pub fn into_parts(self) -> (S, C, D, M) {
        (self.chip.release(), self.console, self.delay, self.ddr_window)
    }

    fn say(&mut self, text: &str) {
        // Nothing useful can be done when the console itself is stuck.
        let _ = self.console.write_str(text);
    }

    fn restore_console(&mut self) -> Result<(), AppError> {
        let run = clock_config::clock_setting(RUN_CLOCK_SETTING)?;
        board::restore_console(self.chip.bus(), &mut self.console, run)?;
        Ok(())
    }

    /// Board bring-up: run clock setting, console, banner, cache and pin
    /// power-down, misc power save, interrupts masked, menu.
    pub fn start(&mut self) -> Result<(), AppError> {
        let run = clock_config::clock_setting(RUN_CLOCK_SETTING)?;
        self.chip.pmc().set_custom_pck_mck(run)?;
        self.restore_console()?;

        let _ = write!(
            self.console,
            "\n\r{}\n\r-- {} {} --\n\r-- {} ({}) --\n\r-- {} --\n\r",
            config::banner(),
            config::APP_NAME,
            APP_VERSION,
            BOARD_NAME,
            CHIP_NAME,
            run.summary(),
        );
        self.console.flush()?;

        let mut l2cc = self.chip.l2cc();
        l2cc.enable_clock_gating();
        l2cc.disable();
        self.chip.pio().restore_reset_state(&JTAG_EXCLUDED_MASKS);
        board::save_misc_power(self.chip.bus());
        self.chip.aic().disable_all();
        self.restore_console()?;

        #[cfg(feature = "defmt")]
        defmt::info!("{=str} ready", config::APP_NAME);

        self.say(MENU_TEXT);
        Ok(())
    }

    /// Poll the console into `mailbox` and run the pending command, if any.
    pub fn poll(&mut self, mailbox: &Mailbox) -> Option<Result<(), AppError>> {
        if let Some(byte) = self.console.poll_byte() {
            mailbox.post(byte);
        }
        let byte = mailbox.take()?;
        self.handle_key(byte)
    }

    /// Run the command bound to `byte`. Unknown bytes are ignored and
    /// return `None`.
    pub fn handle_key(&mut self, byte: u8) -> Option<Result<(), AppError>> {
        let command = MenuCommand::from_key(byte)?;
        let _ = self.console.write_char(command.echo());

        let result = self.execute(command);
        if let Err(e) = &result {
            #[cfg(feature = "defmt")]
            defmt::error!("{} failed: {}", command, e);
            let _ = write!(self.console, "\n\r-E- {e}\n\r");
        }
        self.say(MENU_TEXT);
        Some(result)
    }

    /// Run one command.
    pub fn execute(&mut self, command: MenuCommand) -> Result<(), AppError> {
        if command.touches_ddr_contents() && !self.ddr_initialised {
            return Err(AppError::DdrNotInitialised);
        }
        match command {
            MenuCommand::NextClockSetting => self.next_clock_setting(),
            MenuCommand::Backup => self.backup(),
            MenuCommand::Ulp0 => self.ulp0().map(|_| ()),
            MenuCommand::Ulp1 => self.ulp1().map(|_| ()),
            MenuCommand::Idle => self.idle().map(|_| ()),
            MenuCommand::DdrInit => self.ddr_init(),
            MenuCommand::DdrWrite => self.ddr_write(),
            MenuCommand::DdrCheck => self.ddr_check().map(|_| ()),
            MenuCommand::DdrSelfRefresh => self.ddr_self_refresh(),
            MenuCommand::DdrNormal => self.ddr_normal(),
        }
    }

    fn next_clock_setting(&mut self) -> Result<(), AppError> {
        self.setting = clock_config::next_setting(self.setting);
        let summary = clock_config::clock_setting(self.setting)?.summary();
        let _ = write!(
            self.console,
            "\n\r\n\rWill use clock setting for test: {summary}\n\r"
        );
        Ok(())
    }

    fn backup(&mut self) -> Result<(), AppError> {
        self.say("\n\r\n\r  =========== Enter Backup mode ===========\n\r");
        self.console.flush()?;
        let failure = power::enter_backup(self.chip.bus());

        #[cfg(feature = "defmt")]
        defmt::error!("{}", failure);
        #[cfg(not(feature = "defmt"))]
        let _ = failure;

        self.say("\n\r ! ! ! ! ! ! ! Enter Backup FAILED ! ! ! ! ! ! ! !");
        Ok(())
    }

    /// ULP0: clocks slowed to the selected setting, PIO lines parked,
    /// woken by the button.
    pub fn ulp0(&mut self) -> Result<WakeReport, AppError> {
        self.say("\n\r\n\r  =========== Enter Ultra Low Power mode 0 ===========\n\r");
        self.say(" =========== Use PB_USER button to wake up ==========\n\r");
        self.console.flush()?;

        let request = SleepRequest::new(LowPowerMode::Ulp0, self.setting).with_wake_led(LED);
        let run = clock_config::clock_setting(RUN_CLOCK_SETTING)?;
        let console = &mut self.console;
        let report = power::with_peripherals_saved(self.chip.bus(), |sys| {
            board::save_misc_power(sys);
            board::configure_button(sys);
            board::configure_led(sys);
            let report = power::low_power_run(sys, request)?;
            let _button = board::acknowledge_button(sys);
            board::restore_console(sys, console, run)?;
            Ok::<_, AppError>(report)
        })?;

        #[cfg(feature = "defmt")]
        defmt::info!("{}", report);

        self.say(ULP_LEAVE);
        Ok(report)
    }

    /// ULP1: clocks stopped, woken by WKUP0 or the RTC alarm.
    pub fn ulp1(&mut self) -> Result<WakeReport, AppError> {
        self.say("\n\r\n\r  =========== Enter Ultra Low Power mode 1 ===========\n\r");
        self.say("  =========== USE WKUP0 button to wake up  ===========\n\r");
        let _ = write!(
            self.console,
            "  === Auto wakeup from RTC alarm after {WAKEUP_DELAY_SECS} second =====\n\r"
        );
        self.console.flush()?;

        let request =
            SleepRequest::new(LowPowerMode::Ulp1, ULP1_CLOCK_SETTING).with_wake_led(LED);
        let run = clock_config::clock_setting(RUN_CLOCK_SETTING)?;
        let console = &mut self.console;
        let report = power::with_peripherals_saved(self.chip.bus(), |sys| {
            board::save_misc_power(sys);
            board::configure_led(sys);
            power::arm_ulp1_wakeup(sys, u32::from(WAKEUP_DELAY_SECS))?;
            let report = power::low_power_run(sys, request)?;
            let _alarm = board::acknowledge_rtc_alarm(sys);
            board::restore_console(sys, console, run)?;
            Ok::<_, AppError>(report)
        })?;

        #[cfg(feature = "defmt")]
        defmt::info!("{}", report);

        self.say(ULP_LEAVE);
        Ok(report)
    }

    /// Idle: `WFI` at the selected clock setting, woken by the button.
    pub fn idle(&mut self) -> Result<WakeReport, AppError> {
        self.say("\n\r\n\rConfigure button with debouncing.\n\r");
        board::configure_button(self.chip.bus());
        self.say("Configure led for wakeup indicator.\n\r");
        board::configure_led(self.chip.bus());
        self.say("=========== Enter Idle mode ===========\n\r");
        self.console.flush()?;

        let request = SleepRequest::new(LowPowerMode::Idle, self.setting).with_wake_led(LED);
        let report = self.chip.low_power_run(request)?;
        let _button = board::acknowledge_button(self.chip.bus());

        self.say("| | | | | | Leave Idle mode | | | | | |\n\r");
        Ok(report)
    }

    fn ddr_init(&mut self) -> Result<(), AppError> {
        self.say("\n\r\n\r  =========== Init DDR ===========\n\r");
        let mck_hz = clock_config::clock_setting(RUN_CLOCK_SETTING)?.mck_hz();
        let ddr_config = DdrConfig::mt41k128m16_x2(mck_hz).map_err(DdrError::from)?;
        self.chip.ddr().init(&ddr_config, &mut self.delay)?;
        self.ddr_initialised = true;
        Ok(())
    }

    fn ddr_write(&mut self) -> Result<(), AppError> {
        self.say("\n\r\n\r=========== Write data into DDR ===========\n\r");
        self.chip.ddr().check_ready()?;
        ddr::write_pattern(&mut self.ddr_window);
        self.say("end of init\n\r");
        Ok(())
    }

    /// Verify the DDR pattern and print the result.
    pub fn ddr_check(&mut self) -> Result<ddr::PatternReport, AppError> {
        self.say("\n\r\n\r=========== Verify data in DDR ===========\n\r");
        self.chip.ddr().check_ready()?;
        let report = ddr::check_pattern(&self.ddr_window);

        for m in &report.first {
            let _ = write!(
                self.console,
                "-E- Expected:{:x}, read {:x} @ {:x}\n\r",
                m.expected, m.read, m.address
            );
        }
        let unlisted = report.mismatches.saturating_sub(report.first.len());
        if unlisted > 0 {
            let _ = write!(self.console, "-E- ... {unlisted} more\n\r");
        }
        self.say(if report.is_ok() { "data OK\n\r" } else { "data KO\n\r" });
        Ok(report)
    }

    fn ddr_self_refresh(&mut self) -> Result<(), AppError> {
        self.say("\n\r\n\r=========== Set DDR into self-refresh ===========\n\r");
        self.chip.ddr().self_refresh()?;
        Ok(())
    }

    fn ddr_normal(&mut self) -> Result<(), AppError> {
        self.say("\n\r\n\r=========== Out of DDR Self refresh state  ===========\n\r");
        self.chip.ddr().check_ready()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_render_for_the_console() {
        assert_eq!(
            AppError::DdrNotInitialised.to_string(),
            "DDR not initialised, run 'A' first"
        );
        let e = AppError::from(PowerError::BackupFailed);
        assert_eq!(e.to_string(), "low power: backup mode entry failed");
    }
}
