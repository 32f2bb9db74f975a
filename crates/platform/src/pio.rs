//! PIO4 controller (GPIO)
//!
//! Lines are configured a group at a time: the mask register selects which
//! lines the following `CFGR` write applies to.

use crate::bus::RegisterBus;
use crate::config::SLOW_CLOCK_HZ;

/// PIO base address (non-secure view)
pub const PIO_BASE: u32 = 0xFC03_8000;
/// Distance between two I/O groups
pub const PIO_GROUP_STRIDE: u32 = 0x40;
/// Secure PIO slow clock divider (debounce filter clock)
pub const S_PIO_SCDR: u32 = 0xFC03_9500;

/// Mask Register
pub const PIO_MSKR: u32 = 0x00;
/// Configuration Register
pub const PIO_CFGR: u32 = 0x04;
/// Pin Data Status Register
pub const PIO_PDSR: u32 = 0x08;
/// Set Output Data Register
pub const PIO_SODR: u32 = 0x10;
/// Clear Output Data Register
pub const PIO_CODR: u32 = 0x14;
/// Output Data Status Register
pub const PIO_ODSR: u32 = 0x18;
/// Interrupt Enable Register
pub const PIO_IER: u32 = 0x20;
/// Interrupt Disable Register
pub const PIO_IDR: u32 = 0x24;
/// Interrupt Status Register (cleared on read)
pub const PIO_ISR: u32 = 0x2C;

const CFGR_DIR: u32 = 1 << 8;
const CFGR_PUEN: u32 = 1 << 9;
const CFGR_PDEN: u32 = 1 << 10;
const CFGR_IFEN: u32 = 1 << 12;
const CFGR_IFSCEN: u32 = 1 << 13;
const CFGR_OPD: u32 = 1 << 14;
const CFGR_SCHMITT: u32 = 1 << 15;
const CFGR_EVTSEL_SHIFT: u32 = 24;

/// Peripheral ID of PIOA; also the clock of every group.
pub const ID_PIOA: u8 = 18;

/// I/O group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    /// PA0-PA31
    A,
    /// PB0-PB31
    B,
    /// PC0-PC31
    C,
    /// PD0-PD31
    D,
}

impl Port {
    /// All groups, in register order.
    pub const ALL: [Self; 4] = [Self::A, Self::B, Self::C, Self::D];

    const fn index(self) -> u32 {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
        }
    }

    /// Absolute address of register `offset` in this group.
    #[allow(clippy::arithmetic_side_effects)]
    pub const fn reg(self, offset: u32) -> u32 {
        PIO_BASE + self.index() * PIO_GROUP_STRIDE + offset
    }

    /// AIC interrupt line of the group.
    pub const fn irq_id(self) -> u8 {
        match self {
            Self::A => ID_PIOA,
            Self::B => 68,
            Self::C => 69,
            Self::D => 70,
        }
    }
}

/// A single I/O line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pin {
    /// Group
    pub port: Port,
    /// Line within the group, 0-31
    pub line: u8,
}

impl Pin {
    /// Line `line` of `port`.
    pub const fn new(port: Port, line: u8) -> Self {
        Self { port, line }
    }

    /// Bit mask of the line in group registers.
    #[allow(clippy::arithmetic_side_effects)]
    pub const fn mask(&self) -> u32 {
        1 << (self.line & 0x1F)
    }
}

/// Line function (`CFGR.FUNC`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinFunction {
    /// GPIO
    Gpio,
    /// Peripheral A
    A,
    /// Peripheral B
    B,
    /// Peripheral C
    C,
    /// Peripheral D
    D,
    /// Peripheral E
    E,
    /// Peripheral F
    F,
}

impl PinFunction {
    const fn field(self) -> u32 {
        match self {
            Self::Gpio => 0,
            Self::A => 1,
            Self::B => 2,
            Self::C => 3,
            Self::D => 4,
            Self::E => 5,
            Self::F => 6,
        }
    }
}

/// Pull resistor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    /// None
    None,
    /// Pull-up
    Up,
    /// Pull-down
    Down,
}

/// Input event that raises the line interrupt (`CFGR.EVTSEL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Falling edge
    FallingEdge,
    /// Rising edge
    RisingEdge,
    /// Both edges
    BothEdges,
    /// Low level
    LowLevel,
    /// High level
    HighLevel,
}

impl Event {
    const fn field(self) -> u32 {
        match self {
            Self::FallingEdge => 0,
            Self::RisingEdge => 1,
            Self::BothEdges => 2,
            Self::LowLevel => 3,
            Self::HighLevel => 4,
        }
    }
}

/// Line configuration, encoded into one `CFGR` write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinConfig {
    /// Function
    pub function: PinFunction,
    /// `true` for an output
    pub output: bool,
    /// Pull resistor
    pub pull: Pull,
    /// Slow-clock debounce filter
    pub debounce: bool,
    /// Open drain
    pub open_drain: bool,
    /// Schmitt trigger disabled
    pub schmitt_off: bool,
    /// Interrupt event
    pub event: Event,
}

impl PinConfig {
    /// GPIO input with pull-up; the reset state used for power saving.
    pub const INPUT_PULL_UP: Self = Self {
        function: PinFunction::Gpio,
        output: false,
        pull: Pull::Up,
        debounce: false,
        open_drain: false,
        schmitt_off: false,
        event: Event::FallingEdge,
    };

    /// Push-pull GPIO output.
    pub const OUTPUT: Self = Self {
        output: true,
        pull: Pull::None,
        ..Self::INPUT_PULL_UP
    };

    /// Debounced input with pull-up, interrupting on the falling edge.
    pub const BUTTON: Self = Self {
        debounce: true,
        ..Self::INPUT_PULL_UP
    };

    /// `CFGR` value.
    #[allow(clippy::arithmetic_side_effects)]
    pub const fn cfgr(&self) -> u32 {
        let mut v = self.function.field() | (self.event.field() << CFGR_EVTSEL_SHIFT);
        if self.output {
            v |= CFGR_DIR;
        }
        match self.pull {
            Pull::None => {}
            Pull::Up => v |= CFGR_PUEN,
            Pull::Down => v |= CFGR_PDEN,
        }
        if self.debounce {
            v |= CFGR_IFEN | CFGR_IFSCEN;
        }
        if self.open_drain {
            v |= CFGR_OPD;
        }
        if self.schmitt_off {
            v |= CFGR_SCHMITT;
        }
        v
    }
}

/// Lines left alone when forcing the reset state, per group A-D.
/// PD14-PD18 carry JTAG.
pub const JTAG_EXCLUDED_MASKS: [u32; 4] = [0xFFFF_FFFF, 0xFFFF_FFFF, 0xFFFF_FFFF, 0xFFF8_3FFF];

/// Debounce divider for `hz`: `DIV = SLCK / (2 * hz) - 1`, saturating at
/// the 14-bit field.
pub fn debounce_divider(hz: u32) -> u32 {
    let div = SLOW_CLOCK_HZ
        .checked_div(hz.saturating_mul(2))
        .unwrap_or(0)
        .saturating_sub(1);
    div.min(0x3FFF)
}

/// PIO driver.
pub struct Pio<B> {
    bus: B,
}

impl<B: RegisterBus> Pio<B> {
    /// Wrap a register bus.
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Apply `config` to the lines of `mask` in `port`.
    pub fn configure_mask(&mut self, port: Port, mask: u32, config: &PinConfig) {
        self.bus.write(port.reg(PIO_MSKR), mask);
        self.bus.write(port.reg(PIO_CFGR), config.cfgr());
    }

    /// Apply `config` to one line.
    pub fn configure(&mut self, pin: Pin, config: &PinConfig) {
        self.configure_mask(pin.port, pin.mask(), config);
    }

    /// Set the debounce filter clock.
    pub fn set_debounce_filter(&mut self, hz: u32) {
        self.bus.write(S_PIO_SCDR, debounce_divider(hz));
    }

    /// Unmask the line interrupt.
    pub fn enable_interrupt(&mut self, pin: Pin) {
        self.bus.write(pin.port.reg(PIO_IER), pin.mask());
    }

    /// Mask the line interrupt.
    pub fn disable_interrupt(&mut self, pin: Pin) {
        self.bus.write(pin.port.reg(PIO_IDR), pin.mask());
    }

    /// Read and clear the group interrupt status.
    pub fn take_interrupt_status(&mut self, port: Port) -> u32 {
        self.bus.read(port.reg(PIO_ISR))
    }

    /// Input level.
    pub fn is_high(&self, pin: Pin) -> bool {
        self.bus.read(pin.port.reg(PIO_PDSR)) & pin.mask() != 0
    }

    /// Drive the output high.
    pub fn set_high(&mut self, pin: Pin) {
        self.bus.write(pin.port.reg(PIO_SODR), pin.mask());
    }

    /// Drive the output low.
    pub fn set_low(&mut self, pin: Pin) {
        self.bus.write(pin.port.reg(PIO_CODR), pin.mask());
    }

    /// Invert the output.
    pub fn toggle(&mut self, pin: Pin) {
        if self.bus.read(pin.port.reg(PIO_ODSR)) & pin.mask() != 0 {
            self.set_low(pin);
        } else {
            self.set_high(pin);
        }
    }

    /// Put every line of each group in `masks` into the input/pull-up reset
    /// state, with interrupts masked.
    pub fn restore_reset_state(&mut self, masks: &[u32; 4]) {
        for (port, &mask) in Port::ALL.iter().zip(masks) {
            self.bus.write(port.reg(PIO_IDR), mask);
            self.configure_mask(*port, mask, &PinConfig::INPUT_PULL_UP);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockBus;

    const PB9: Pin = Pin::new(Port::B, 9);

    #[test]
    fn test_group_addresses() {
        assert_eq!(Port::A.reg(PIO_CFGR), 0xFC03_8004);
        assert_eq!(Port::B.reg(PIO_MSKR), 0xFC03_8040);
        assert_eq!(Port::D.reg(PIO_ISR), 0xFC03_80EC);
    }

    #[test]
    fn test_button_cfgr() {
        let v = PinConfig::BUTTON.cfgr();
        assert_eq!(v & 0x7, 0);
        assert_ne!(v & CFGR_PUEN, 0);
        assert_ne!(v & CFGR_IFEN, 0);
        assert_ne!(v & CFGR_IFSCEN, 0);
        assert_eq!(v & CFGR_DIR, 0);
        assert_eq!(v >> CFGR_EVTSEL_SHIFT, 0);
    }

    #[test]
    fn test_debounce_divider() {
        assert_eq!(debounce_divider(10), 1637);
        assert_eq!(debounce_divider(0), 0);
        assert_eq!(debounce_divider(1), 0x3FFF);
    }

    #[test]
    fn test_configure_writes_mask_then_cfgr() {
        let mut bus = MockBus::new();
        Pio::new(&mut bus).configure(PB9, &PinConfig::OUTPUT);
        let j = bus.journal();
        assert_eq!(j.len(), 2);
        assert_eq!(bus.first_write(Port::B.reg(PIO_MSKR)), Some(0));
        assert_eq!(bus.first_write(Port::B.reg(PIO_CFGR)), Some(1));
        assert_eq!(bus.value(Port::B.reg(PIO_MSKR)), 1 << 9);
    }

    #[test]
    fn test_toggle_follows_odsr() {
        let mut bus = MockBus::new();
        bus.preset(Port::B.reg(PIO_ODSR), 1 << 9);
        Pio::new(&mut bus).toggle(PB9);
        assert_eq!(bus.last_write(Port::B.reg(PIO_CODR)), Some(1 << 9));
    }

    #[test]
    fn test_is_high_reads_pdsr() {
        let mut bus = MockBus::new();
        bus.preset(Port::B.reg(PIO_PDSR), 1 << 9);
        let pio = Pio::new(&mut bus);
        assert!(pio.is_high(PB9));
        assert!(!pio.is_high(Pin::new(Port::B, 6)));
    }

    #[test]
    fn test_reset_state_skips_jtag() {
        let mut bus = MockBus::new();
        Pio::new(&mut bus).restore_reset_state(&JTAG_EXCLUDED_MASKS);
        assert_eq!(bus.last_write(Port::D.reg(PIO_MSKR)), Some(0xFFF8_3FFF));
        assert_eq!(
            bus.last_write(Port::A.reg(PIO_CFGR)),
            Some(PinConfig::INPUT_PULL_UP.cfgr())
        );
    }
}
