//! Polled UART console
//!
//! The baud divisor is derived from the peripheral clock, so the console
//! must be reconfigured after every PCK/MCK change. Transmission is polled
//! and bounded; reception is a non-blocking poll of `RXRDY`.

use core::fmt;

use crate::bus::{self, PollTimeout, RegisterBus, DEFAULT_POLL_BUDGET};

/// UART1 base address (console on SAMA5D2-XULT)
pub const UART1_BASE: u32 = 0xF802_0000;
/// Peripheral ID of UART1
pub const ID_UART1: u8 = 25;

/// Control Register
pub const UART_CR: u32 = 0x00;
/// Mode Register
pub const UART_MR: u32 = 0x04;
/// Status Register
pub const UART_SR: u32 = 0x14;
/// Receive Holding Register
pub const UART_RHR: u32 = 0x18;
/// Transmit Holding Register
pub const UART_THR: u32 = 0x1C;
/// Baud Rate Generator Register
pub const UART_BRGR: u32 = 0x20;

const CR_RSTRX: u32 = 1 << 2;
const CR_RSTTX: u32 = 1 << 3;
const CR_RXEN: u32 = 1 << 4;
const CR_RXDIS: u32 = 1 << 5;
const CR_TXEN: u32 = 1 << 6;
const CR_TXDIS: u32 = 1 << 7;
const CR_RSTSTA: u32 = 1 << 8;

const MR_PAR_NO: u32 = 4 << 9;

/// Receiver ready
pub const SR_RXRDY: u32 = 1 << 0;
/// Transmitter ready
pub const SR_TXRDY: u32 = 1 << 1;
/// Overrun error
pub const SR_OVRE: u32 = 1 << 5;
/// Framing error
pub const SR_FRAME: u32 = 1 << 6;
/// Transmitter empty
pub const SR_TXEMPTY: u32 = 1 << 9;

/// Console errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartError {
    /// The transmitter never became ready.
    #[error("UART transmit timed out")]
    Timeout(#[from] PollTimeout),
    /// The requested baud rate cannot be derived from the clock.
    #[error("baud rate {baud} unreachable from {clock_hz} Hz")]
    BaudRate {
        /// Peripheral clock
        clock_hz: u32,
        /// Requested rate
        baud: u32,
    },
}

impl embedded_io::Error for UartError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Self::Timeout(_) => embedded_io::ErrorKind::TimedOut,
            Self::BaudRate { .. } => embedded_io::ErrorKind::InvalidInput,
        }
    }
}

/// Baud rate generator divisor, rounded to nearest.
pub fn baud_divisor(clock_hz: u32, baud: u32) -> Result<u32, UartError> {
    let err = UartError::BaudRate { clock_hz, baud };
    let denom = baud.checked_mul(16).ok_or(err)?;
    if denom == 0 {
        return Err(err);
    }
    let cd = clock_hz.saturating_add(denom / 2) / denom;
    if cd == 0 || cd > 0xFFFF {
        return Err(err);
    }
    Ok(cd)
}

/// Polled UART.
pub struct Uart<B> {
    bus: B,
    base: u32,
    budget: u32,
}

// Register offsets are added to a fixed peripheral base.
#[allow(clippy::arithmetic_side_effects)]
impl<B: RegisterBus> Uart<B> {
    /// UART at `base`.
    pub fn new(bus: B, base: u32) -> Self {
        Self { bus, base, budget: DEFAULT_POLL_BUDGET }
    }

    /// Override the number of status reads per poll.
    #[must_use]
    pub fn with_poll_budget(mut self, budget: u32) -> Self {
        self.budget = budget;
        self
    }

    fn reg(&self, offset: u32) -> u32 {
        self.base + offset
    }

    /// Reset and (re)program for 8N1 at `baud` from `clock_hz`.
    pub fn configure(&mut self, clock_hz: u32, baud: u32) -> Result<(), UartError> {
        let cd = baud_divisor(clock_hz, baud)?;
        self.bus.write(
            self.reg(UART_CR),
            CR_RSTRX | CR_RSTTX | CR_RXDIS | CR_TXDIS | CR_RSTSTA,
        );
        self.bus.write(self.reg(UART_MR), MR_PAR_NO);
        self.bus.write(self.reg(UART_BRGR), cd);
        self.bus.write(self.reg(UART_CR), CR_RXEN | CR_TXEN);
        Ok(())
    }

    /// Queue one byte once the holding register is free.
    pub fn write_byte(&mut self, byte: u8) -> Result<(), UartError> {
        bus::wait_for_bits(&self.bus, self.reg(UART_SR), SR_TXRDY, self.budget)?;
        self.bus.write(self.reg(UART_THR), u32::from(byte));
        Ok(())
    }

    /// `true` once the shift register has drained.
    pub fn is_tx_empty(&self) -> bool {
        self.bus.read(self.reg(UART_SR)) & SR_TXEMPTY != 0
    }

    /// Wait until every queued byte has left the pin.
    pub fn wait_tx_empty(&self) -> Result<(), UartError> {
        bus::wait_for_bits(&self.bus, self.reg(UART_SR), SR_TXEMPTY, self.budget)?;
        Ok(())
    }

    /// Non-blocking receive. Line errors are cleared and the byte dropped.
    pub fn read_byte(&mut self) -> Option<u8> {
        let sr = self.bus.read(self.reg(UART_SR));
        if sr & (SR_OVRE | SR_FRAME) != 0 {
            self.bus.write(self.reg(UART_CR), CR_RSTSTA);
        }
        if sr & SR_RXRDY == 0 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        let byte = (self.bus.read(self.reg(UART_RHR)) & 0xFF) as u8;
        Some(byte)
    }
}

impl<B: RegisterBus> embedded_io::ErrorType for Uart<B> {
    type Error = UartError;
}

impl<B: RegisterBus> embedded_io::Write for Uart<B> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        for &b in buf {
            self.write_byte(b)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.wait_tx_empty()
    }
}

impl<B: RegisterBus> fmt::Write for Uart<B> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            self.write_byte(b).map_err(|_| fmt::Error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use crate::mocks::MockBus;
    use core::fmt::Write as _;

    const THR: u32 = UART1_BASE + UART_THR;
    const SR: u32 = UART1_BASE + UART_SR;

    #[test]
    fn test_baud_divisor() {
        // 83 MHz / (16 * 115200) = 45.03
        assert_eq!(baud_divisor(83_000_000, 115_200), Ok(45));
        // 12 MHz / (16 * 115200) = 6.51 -> 7
        assert_eq!(baud_divisor(12_000_000, 115_200), Ok(7));
        assert!(baud_divisor(32_768, 115_200).is_err());
        assert!(baud_divisor(12_000_000, 0).is_err());
    }

    #[test]
    fn test_configure_enables_after_reset() {
        let mut bus = MockBus::new();
        assert_eq!(Uart::new(&mut bus, UART1_BASE).configure(12_000_000, 115_200), Ok(()));
        let cr: heapless::Vec<u32, 4> = bus.writes_to(UART1_BASE + UART_CR).collect();
        assert_eq!(cr.last(), Some(&(CR_RXEN | CR_TXEN)));
        assert_eq!(bus.value(UART1_BASE + UART_BRGR), 7);
    }

    #[test]
    fn test_fmt_write_goes_to_thr() {
        let mut bus = MockBus::new();
        bus.preset(SR, SR_TXRDY | SR_TXEMPTY);
        write!(Uart::new(&mut bus, UART1_BASE), "ok").unwrap();
        let sent: heapless::Vec<u32, 4> = bus.writes_to(THR).collect();
        assert_eq!(sent.as_slice(), &[u32::from(b'o'), u32::from(b'k')]);
    }

    #[test]
    fn test_write_times_out_when_tx_stuck() {
        let mut bus = MockBus::new();
        let mut uart = Uart::new(&mut bus, UART1_BASE).with_poll_budget(3);
        assert!(matches!(uart.write_byte(b'x'), Err(UartError::Timeout(_))));
    }

    #[test]
    fn test_read_byte_polls_rxrdy() {
        let mut bus = MockBus::new();
        bus.preset(UART1_BASE + UART_RHR, u32::from(b'3'));
        let mut uart = Uart::new(&mut bus, UART1_BASE);
        assert_eq!(uart.read_byte(), None);
        bus.preset(SR, SR_RXRDY);
        let mut uart = Uart::new(&mut bus, UART1_BASE);
        assert_eq!(uart.read_byte(), Some(b'3'));
    }
}
