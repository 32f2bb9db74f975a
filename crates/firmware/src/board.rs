//! SAMA5D2-XULT board wiring
//!
//! Pin assignments, the console seam and the power-saving helpers the menu
//! commands share.

use core::fmt;

use platform::aic::{Aic, ID_RTC};
use platform::bus::RegisterBus;
use platform::clock_config::ClockConfig;
use platform::config::{BUTTON_DEBOUNCE_HZ, CONSOLE_BAUD};
use platform::pio::{Pin, PinConfig, PinFunction, Pio, Port, Pull, ID_PIOA};
use platform::pit::ID_PIT;
use platform::pmc::{
    Pmc, PmcError, SYSCLK_DDRCK, SYSCLK_ISCCK, SYSCLK_LCDCK, SYSCLK_PCK_MASK, SYSCLK_UDP,
    SYSCLK_UHP,
};
use platform::rtc::Rtc;
use platform::uart::{Uart, UartError, ID_UART1};

/// `PB_USER` push-button, active low.
pub const BUTTON: Pin = Pin::new(Port::B, 9);

/// Wake-up indicator LED.
pub const LED: Pin = Pin::new(Port::B, 6);

/// UART1 receive line (PD2, function A).
pub const CONSOLE_RX: Pin = Pin::new(Port::D, 2);

/// UART1 transmit line (PD3, function A).
pub const CONSOLE_TX: Pin = Pin::new(Port::D, 3);

/// Peripheral clocks left running by [`save_misc_power`]. The PIOA clock
/// gates every PIO group; the PIT times the DDR power-up delays.
pub const KEEP_PERIPHERALS: [u8; 3] = [ID_PIOA, ID_UART1, ID_PIT];

/// System clocks stopped by [`save_misc_power`].
pub const MISC_SYSTEM_CLOCKS: u32 =
    SYSCLK_DDRCK | SYSCLK_LCDCK | SYSCLK_UHP | SYSCLK_UDP | SYSCLK_PCK_MASK | SYSCLK_ISCCK;

const CONSOLE_PINS: PinConfig = PinConfig {
    function: PinFunction::A,
    pull: Pull::None,
    ..PinConfig::INPUT_PULL_UP
};

/// Menu console: text output plus the controls the low-power commands need.
pub trait Console: fmt::Write {
    /// Re-derive the baud divisor from `peripheral_hz` and re-enable the
    /// line.
    fn reconfigure(&mut self, peripheral_hz: u32) -> Result<(), UartError>;

    /// Block until every queued byte has been shifted out.
    fn flush(&mut self) -> Result<(), UartError>;

    /// Non-blocking receive.
    fn poll_byte(&mut self) -> Option<u8>;
}

impl<B: RegisterBus> Console for Uart<B> {
    fn reconfigure(&mut self, peripheral_hz: u32) -> Result<(), UartError> {
        self.configure(peripheral_hz, CONSOLE_BAUD)
    }

    fn flush(&mut self) -> Result<(), UartError> {
        self.wait_tx_empty()
    }

    fn poll_byte(&mut self) -> Option<u8> {
        self.read_byte()
    }
}

/// Route the console pins and clock the UART.
pub fn configure_console_pins<S: RegisterBus>(sys: &mut S) -> Result<(), PmcError> {
    let mut pio = Pio::new(&mut *sys);
    pio.configure(CONSOLE_RX, &CONSOLE_PINS);
    pio.configure(CONSOLE_TX, &CONSOLE_PINS);
    Pmc::new(&mut *sys).enable_peripheral(ID_UART1)
}

/// Bring the console back after the PIO lines were forced to their reset
/// state or the peripheral clock changed.
pub fn restore_console<S, C>(
    sys: &mut S,
    console: &mut C,
    clock: &ClockConfig,
) -> Result<(), BoardError>
where
    S: RegisterBus,
    C: Console + ?Sized,
{
    configure_console_pins(sys)?;
    console.reconfigure(clock.peripheral_hz())?;
    Ok(())
}

/// Stop the USB PLL and its bias, the system clocks nothing here uses, and
/// every peripheral clock except the PIO and console.
pub fn save_misc_power<S: RegisterBus>(sys: &mut S) {
    let mut pmc = Pmc::new(sys);
    pmc.disable_upll();
    pmc.disable_upll_bias();
    pmc.disable_system_clock(MISC_SYSTEM_CLOCKS);
    pmc.disable_all_peripherals_except(&KEEP_PERIPHERALS);
}

/// Debounced button input with its edge interrupt unmasked at the PIO and
/// the AIC, so a press ends `WFI`.
pub fn configure_button<S: RegisterBus>(sys: &mut S) {
    let mut pio = Pio::new(&mut *sys);
    pio.set_debounce_filter(BUTTON_DEBOUNCE_HZ);
    pio.configure(BUTTON, &PinConfig::BUTTON);
    // Drop any edge latched before the interrupt was unmasked.
    let _ = pio.take_interrupt_status(BUTTON.port);
    pio.enable_interrupt(BUTTON);
    Aic::new(&mut *sys).enable(BUTTON.port.irq_id());
}

/// Wake indicator output, initially off.
pub fn configure_led<S: RegisterBus>(sys: &mut S) {
    let mut pio = Pio::new(sys);
    pio.configure(LED, &PinConfig::OUTPUT);
    pio.set_low(LED);
}

/// Acknowledge the button edge that ended a sleep and mask it again.
/// Returns `true` if the button was the wake source.
pub fn acknowledge_button<S: RegisterBus>(sys: &mut S) -> bool {
    let mut pio = Pio::new(&mut *sys);
    let pressed = pio.take_interrupt_status(BUTTON.port) & BUTTON.mask() != 0;
    pio.disable_interrupt(BUTTON);
    let mut aic = Aic::new(&mut *sys);
    aic.disable(BUTTON.port.irq_id());
    aic.clear(BUTTON.port.irq_id());
    pressed
}

/// Acknowledge the RTC alarm that ended a ULP1 sleep and mask its line.
/// Returns `true` if the alarm had fired.
pub fn acknowledge_rtc_alarm<S: RegisterBus>(sys: &mut S) -> bool {
    let fired = Rtc::new(&mut *sys).acknowledge_alarm();
    let mut aic = Aic::new(&mut *sys);
    aic.disable(ID_RTC);
    aic.clear(ID_RTC);
    fired
}

/// Board bring-up failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BoardError {
    /// Peripheral clock control failed.
    #[error("clock control failed: {0}")]
    Pmc(#[from] PmcError),
    /// The console could not be reprogrammed.
    #[error("console: {0}")]
    Console(#[from] UartError),
}
