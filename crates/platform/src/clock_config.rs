//! Clock configuration table for the SAMA5D2 PMC.
//!
//! A [`ClockConfig`] describes one complete PCK/MCK setting: which oscillator
//! drives MAINCK and SLCK, how PLLA is programmed, which source feeds the
//! master clock and the three divider stages below it. The demo switches
//! between the eight entries of [`CLOCK_SETTINGS`].
//!
//! # Clock tree
//!
//! ```text
//!  SLCK (32 kHz) ─────────────────────┐
//!  MAINCK (12 MHz) ───────────────────┤
//!  PLLA = MAINCK * (MUL+1) [/2] ──────┼─ CSS ─ PRES ─ PCK ─ MDIV ─ MCK ─ [/2] ─ H32MX
//!  UPLL (480 MHz) ────────────────────┘
//! ```
//!
//! # Sources
//! - SAMA5D2 datasheet (DS60001476), §33 "Power Management Controller",
//!   §33.14 "Programming Sequence" and table 66-3 (electrical limits).

use core::fmt;

use crate::config::{MAIN_RC_HZ, MAIN_XTAL_HZ, SLOW_CLOCK_HZ, UPLL_HZ};

/// Maximum processor clock.
pub const PCK_MAX_HZ: u32 = 500_000_000;
/// Maximum master clock.
pub const MCK_MAX_HZ: u32 = 166_000_000;
/// Maximum H32MX matrix clock.
pub const H32MX_MAX_HZ: u32 = 83_000_000;
/// Lower bound of the PLLA output range.
pub const PLLA_MIN_HZ: u32 = 600_000_000;
/// Upper bound of the PLLA output range.
pub const PLLA_MAX_HZ: u32 = 1_200_000_000;
/// Largest value of the 7-bit `MULA` field.
pub const PLLA_MUL_MAX: u8 = 127;

/// Master clock source (`PMC_MCKR.CSS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MckSource {
    /// Slow clock (32 kHz)
    Slow,
    /// Main clock (12 MHz crystal or RC)
    Main,
    /// PLLA output
    PllA,
    /// UTMI PLL output
    Upll,
}

impl MckSource {
    /// `CSS` field encoding.
    pub const fn css(self) -> u32 {
        match self {
            Self::Slow => 0,
            Self::Main => 1,
            Self::PllA => 2,
            Self::Upll => 3,
        }
    }
}

/// Oscillator behind MAINCK or SLCK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OscSource {
    /// External crystal
    Crystal,
    /// Internal RC oscillator
    Rc,
}

/// PLLA programming. `mul == 0` keeps PLLA off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllaConfig {
    /// `MULA`: output = MAINCK * (mul + 1)
    pub mul: u8,
    /// `DIVA`: 1 bypasses the divider
    pub div: u8,
    /// `PLLACOUNT`: lock time in slow-clock cycles * 8
    pub count: u8,
}

impl PllaConfig {
    /// PLLA disabled.
    pub const OFF: Self = Self { mul: 0, div: 0, count: 0 };

    /// `true` when the configuration turns PLLA on.
    pub const fn is_enabled(&self) -> bool {
        self.mul > 0
    }
}

/// Processor clock prescaler (`PMC_MCKR.PRES`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Prescaler {
    /// /1
    Div1,
    /// /2
    Div2,
    /// /4
    Div4,
    /// /8
    Div8,
    /// /16
    Div16,
    /// /32
    Div32,
    /// /64
    Div64,
}

// Shift amount is at most 6.
#[allow(clippy::arithmetic_side_effects)]
impl Prescaler {
    /// `PRES` field encoding.
    pub const fn field(self) -> u32 {
        match self {
            Self::Div1 => 0,
            Self::Div2 => 1,
            Self::Div4 => 2,
            Self::Div8 => 3,
            Self::Div16 => 4,
            Self::Div32 => 5,
            Self::Div64 => 6,
        }
    }

    /// Division ratio.
    pub const fn divisor(self) -> u32 {
        1 << self.field()
    }
}

/// Master clock divider (`PMC_MCKR.MDIV`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MckDivider {
    /// MCK = PCK
    Div1,
    /// MCK = PCK / 2
    Div2,
    /// MCK = PCK / 3
    Div3,
    /// MCK = PCK / 4
    Div4,
}

impl MckDivider {
    /// `MDIV` field encoding. Note /3 and /4 are swapped relative to their
    /// ratios.
    pub const fn field(self) -> u32 {
        match self {
            Self::Div1 => 0,
            Self::Div2 => 1,
            Self::Div4 => 2,
            Self::Div3 => 3,
        }
    }

    /// Division ratio.
    pub const fn divisor(self) -> u32 {
        match self {
            Self::Div1 => 1,
            Self::Div2 => 2,
            Self::Div3 => 3,
            Self::Div4 => 4,
        }
    }
}

/// Reasons a [`ClockConfig`] cannot be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockConfigError {
    /// PLLA is selected as master clock source but `mul` is 0.
    #[error("PLLA selected as MCK source while PLLA is disabled")]
    PllaDisabled,
    /// `mul` does not fit the 7-bit `MULA` field.
    #[error("PLLA multiplier {0} exceeds 127")]
    MultiplierTooLarge(u8),
    /// PLLA output outside 600-1200 MHz.
    #[error("PLLA output {0} Hz outside 600-1200 MHz")]
    PllaOutOfRange(u32),
    /// PLLA needs the external crystal as reference.
    #[error("PLLA requires the main crystal oscillator")]
    PllaNeedsCrystal,
    /// Processor clock above 500 MHz.
    #[error("PCK {0} Hz exceeds 500 MHz")]
    PckTooFast(u32),
    /// Master clock above 166 MHz.
    #[error("MCK {0} Hz exceeds 166 MHz")]
    MckTooFast(u32),
    /// Matrix clock above 83 MHz.
    #[error("H32MX {0} Hz exceeds 83 MHz")]
    H32mxTooFast(u32),
    /// Index past the end of [`CLOCK_SETTINGS`].
    #[error("no clock setting {0}")]
    UnknownSetting(usize),
}

/// One complete PCK/MCK configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    /// Master clock source
    pub mck_source: MckSource,
    /// Oscillator behind MAINCK
    pub main_source: OscSource,
    /// Oscillator behind SLCK
    pub slow_source: OscSource,
    /// PLLA programming
    pub plla: PllaConfig,
    /// Divide PLLA output by two before CSS
    pub plla_div2: bool,
    /// Keep the UTMI PLL running
    pub upll: bool,
    /// Processor clock prescaler
    pub prescaler: Prescaler,
    /// Master clock divider
    pub divider: MckDivider,
    /// H32MX = MCK / 2
    pub h32mx_div2: bool,
}

// Divisors are non-zero enum ratios; the PLLA product is computed in u64.
#[allow(clippy::arithmetic_side_effects)]
impl ClockConfig {
    /// Clocked straight from a low-frequency source: no PLL, MCK = PCK,
    /// everything derived from the crystals unless overridden.
    const fn direct(mck_source: MckSource, prescaler: Prescaler) -> Self {
        Self {
            mck_source,
            main_source: OscSource::Crystal,
            slow_source: OscSource::Crystal,
            plla: PllaConfig::OFF,
            plla_div2: false,
            upll: false,
            prescaler,
            divider: MckDivider::Div1,
            h32mx_div2: false,
        }
    }

    /// Frequency of MAINCK.
    pub const fn main_hz(&self) -> u32 {
        match self.main_source {
            OscSource::Crystal => MAIN_XTAL_HZ,
            OscSource::Rc => MAIN_RC_HZ,
        }
    }

    /// PLLA output before `PLLADIV2`, or 0 when PLLA is off.
    pub fn plla_hz(&self) -> u32 {
        if !self.plla.is_enabled() {
            return 0;
        }
        let mut hz = u64::from(self.main_hz()) * (u64::from(self.plla.mul) + 1);
        if self.plla.div > 1 {
            hz /= u64::from(self.plla.div);
        }
        u32::try_from(hz).unwrap_or(u32::MAX)
    }

    /// Frequency entering the prescaler.
    pub fn source_hz(&self) -> u32 {
        match self.mck_source {
            MckSource::Slow => SLOW_CLOCK_HZ,
            MckSource::Main => self.main_hz(),
            MckSource::PllA if self.plla_div2 => self.plla_hz() / 2,
            MckSource::PllA => self.plla_hz(),
            MckSource::Upll => UPLL_HZ,
        }
    }

    /// Processor clock.
    pub fn pck_hz(&self) -> u32 {
        self.source_hz() / self.prescaler.divisor()
    }

    /// Master clock.
    pub fn mck_hz(&self) -> u32 {
        self.pck_hz() / self.divider.divisor()
    }

    /// AHB matrix clock.
    pub fn h32mx_hz(&self) -> u32 {
        if self.h32mx_div2 {
            self.mck_hz() / 2
        } else {
            self.mck_hz()
        }
    }

    /// Peripheral clock seen by the console UART.
    pub fn peripheral_hz(&self) -> u32 {
        self.h32mx_hz()
    }

    /// Check every electrical and encoding constraint.
    pub fn validate(&self) -> Result<(), ClockConfigError> {
        if self.plla.mul > PLLA_MUL_MAX {
            return Err(ClockConfigError::MultiplierTooLarge(self.plla.mul));
        }
        if self.mck_source == MckSource::PllA {
            if !self.plla.is_enabled() {
                return Err(ClockConfigError::PllaDisabled);
            }
            if self.main_source != OscSource::Crystal {
                return Err(ClockConfigError::PllaNeedsCrystal);
            }
        }
        if self.plla.is_enabled() {
            let plla = self.plla_hz();
            if !(PLLA_MIN_HZ..=PLLA_MAX_HZ).contains(&plla) {
                return Err(ClockConfigError::PllaOutOfRange(plla));
            }
        }
        let pck = self.pck_hz();
        if pck > PCK_MAX_HZ {
            return Err(ClockConfigError::PckTooFast(pck));
        }
        let mck = self.mck_hz();
        if mck > MCK_MAX_HZ {
            return Err(ClockConfigError::MckTooFast(mck));
        }
        let h32mx = self.h32mx_hz();
        if h32mx > H32MX_MAX_HZ {
            return Err(ClockConfigError::H32mxTooFast(h32mx));
        }
        Ok(())
    }

    /// Console-friendly description.
    pub fn summary(&self) -> ClockSummary {
        ClockSummary {
            pck_hz: self.pck_hz(),
            mck_hz: self.mck_hz(),
        }
    }
}

/// PCK / MCK pair rendered as `PCK = 498 MHz, MCK = 166 MHz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockSummary {
    /// Processor clock
    pub pck_hz: u32,
    /// Master clock
    pub mck_hz: u32,
}

struct Hz(u32);

#[allow(clippy::arithmetic_side_effects)]
impl fmt::Display for Hz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hz = self.0;
        if hz >= 1_000_000 && hz % 1_000_000 == 0 {
            write!(f, "{} MHz", hz / 1_000_000)
        } else if hz >= 1_000 {
            let tenths = (hz % 1_000) / 100;
            if tenths == 0 {
                write!(f, "{} kHz", hz / 1_000)
            } else {
                write!(f, "{}.{} kHz", hz / 1_000, tenths)
            }
        } else {
            write!(f, "{hz} Hz")
        }
    }
}

impl fmt::Display for ClockSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pck_hz == self.mck_hz {
            write!(f, "PCK = MCK = {}", Hz(self.pck_hz))
        } else {
            write!(f, "PCK = {}, MCK = {}", Hz(self.pck_hz), Hz(self.mck_hz))
        }
    }
}

/// The eight PCK/MCK settings offered by the demo.
///
/// | # | Configuration |
/// |---|---------------|
/// | 0 | PLLA 996 MHz /2 → PCK 498 MHz, MCK 166 MHz, H32MX 83 MHz (run mode) |
/// | 1 | PCK = MCK = 12 MHz crystal |
/// | 2 | PCK = MCK = 12 MHz / 16 = 750 kHz |
/// | 3 | PCK = MCK = 12 MHz / 64 = 187.5 kHz |
/// | 4 | PCK = MCK = 32 kHz crystal |
/// | 5 | PCK = MCK = 32 kHz / 64 = 512 Hz |
/// | 6 | PCK = MCK = 12 MHz RC (ULP1) |
/// | 7 | PLLA 792 MHz /2 → PCK 396 MHz, MCK 132 MHz |
pub const CLOCK_SETTINGS: [ClockConfig; 8] = [
    ClockConfig {
        mck_source: MckSource::PllA,
        main_source: OscSource::Crystal,
        slow_source: OscSource::Crystal,
        plla: PllaConfig { mul: 82, div: 1, count: 0x3F },
        plla_div2: true,
        upll: false,
        prescaler: Prescaler::Div1,
        divider: MckDivider::Div3,
        h32mx_div2: true,
    },
    ClockConfig::direct(MckSource::Main, Prescaler::Div1),
    ClockConfig::direct(MckSource::Main, Prescaler::Div16),
    ClockConfig::direct(MckSource::Main, Prescaler::Div64),
    ClockConfig::direct(MckSource::Slow, Prescaler::Div1),
    ClockConfig::direct(MckSource::Slow, Prescaler::Div64),
    ClockConfig {
        main_source: OscSource::Rc,
        ..ClockConfig::direct(MckSource::Main, Prescaler::Div1)
    },
    ClockConfig {
        mck_source: MckSource::PllA,
        main_source: OscSource::Crystal,
        slow_source: OscSource::Crystal,
        plla: PllaConfig { mul: 65, div: 1, count: 0x3F },
        plla_div2: true,
        upll: false,
        prescaler: Prescaler::Div1,
        divider: MckDivider::Div3,
        h32mx_div2: true,
    },
];

/// Look up a table entry.
pub fn clock_setting(index: usize) -> Result<&'static ClockConfig, ClockConfigError> {
    CLOCK_SETTINGS
        .get(index)
        .ok_or(ClockConfigError::UnknownSetting(index))
}

/// Index following `index`, wrapping to 0 after the last entry.
pub fn next_setting(index: usize) -> usize {
    match index.checked_add(1) {
        Some(next) if next < CLOCK_SETTINGS.len() => next,
        _ => 0,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::{RUN_CLOCK_SETTING, ULP1_CLOCK_SETTING};

    #[test]
    fn test_every_table_entry_is_valid() {
        for (i, cfg) in CLOCK_SETTINGS.iter().enumerate() {
            assert_eq!(cfg.validate(), Ok(()), "setting {i} must validate");
        }
    }

    #[test]
    fn test_run_setting_frequencies() {
        let run = &CLOCK_SETTINGS[RUN_CLOCK_SETTING];
        assert_eq!(run.plla_hz(), 996_000_000);
        assert_eq!(run.pck_hz(), 498_000_000);
        assert_eq!(run.mck_hz(), 166_000_000);
        assert_eq!(run.h32mx_hz(), 83_000_000);
    }

    #[test]
    fn test_low_frequency_settings() {
        assert_eq!(CLOCK_SETTINGS[1].mck_hz(), 12_000_000);
        assert_eq!(CLOCK_SETTINGS[2].mck_hz(), 750_000);
        assert_eq!(CLOCK_SETTINGS[3].mck_hz(), 187_500);
        assert_eq!(CLOCK_SETTINGS[4].mck_hz(), 32_768);
        assert_eq!(CLOCK_SETTINGS[5].mck_hz(), 512);
        assert_eq!(CLOCK_SETTINGS[7].pck_hz(), 396_000_000);
        assert_eq!(CLOCK_SETTINGS[7].mck_hz(), 132_000_000);
    }

    #[test]
    fn test_ulp1_setting_runs_from_rc() {
        let ulp1 = &CLOCK_SETTINGS[ULP1_CLOCK_SETTING];
        assert_eq!(ulp1.main_source, OscSource::Rc);
        assert_eq!(ulp1.mck_source, MckSource::Main);
        assert!(!ulp1.plla.is_enabled());
    }

    #[test]
    fn test_pll_without_multiplier_is_rejected() {
        let cfg = ClockConfig { plla: PllaConfig::OFF, ..CLOCK_SETTINGS[0] };
        assert_eq!(cfg.validate(), Err(ClockConfigError::PllaDisabled));
    }

    #[test]
    fn test_pll_on_rc_is_rejected() {
        let cfg = ClockConfig { main_source: OscSource::Rc, ..CLOCK_SETTINGS[0] };
        assert_eq!(cfg.validate(), Err(ClockConfigError::PllaNeedsCrystal));
    }

    #[test]
    fn test_mck_limit_is_enforced() {
        let cfg = ClockConfig { divider: MckDivider::Div2, ..CLOCK_SETTINGS[0] };
        assert_eq!(cfg.validate(), Err(ClockConfigError::MckTooFast(249_000_000)));
    }

    #[test]
    fn test_mdiv_encoding_swaps_three_and_four() {
        assert_eq!(MckDivider::Div3.field(), 3);
        assert_eq!(MckDivider::Div4.field(), 2);
    }

    #[test]
    fn test_summary_formatting() {
        let mut s: heapless::String<48> = heapless::String::new();
        core::fmt::write(&mut s, format_args!("{}", CLOCK_SETTINGS[0].summary())).unwrap();
        assert_eq!(s.as_str(), "PCK = 498 MHz, MCK = 166 MHz");

        s.clear();
        core::fmt::write(&mut s, format_args!("{}", CLOCK_SETTINGS[3].summary())).unwrap();
        assert_eq!(s.as_str(), "PCK = MCK = 187.5 kHz");

        s.clear();
        core::fmt::write(&mut s, format_args!("{}", CLOCK_SETTINGS[5].summary())).unwrap();
        assert_eq!(s.as_str(), "PCK = MCK = 512 Hz");
    }

    #[test]
    fn test_next_setting_wraps() {
        assert_eq!(next_setting(0), 1);
        assert_eq!(next_setting(7), 0);
        assert_eq!(next_setting(usize::MAX), 0);
        assert_eq!(clock_setting(8), Err(ClockConfigError::UnknownSetting(8)));
    }
}
