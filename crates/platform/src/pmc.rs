//! Power Management Controller driver
//!
//! Every change of a `PMC_MCKR` field must be followed by a wait on
//! `PMC_SR.MCKRDY` before the next one; [`Pmc`] never issues two MCKR writes
//! back to back. All polls are bounded by the driver's poll budget and return
//! [`PmcError::Timeout`] instead of hanging.

use crate::bus::{self, PollTimeout, RegisterBus, DEFAULT_POLL_BUDGET};
use crate::clock_config::{
    ClockConfig, ClockConfigError, MckDivider, MckSource, OscSource, PllaConfig, Prescaler,
};

/// PMC base address
pub const PMC_BASE: u32 = 0xF001_4000;

/// System Clock Enable Register
pub const PMC_SCER: u32 = PMC_BASE;
/// System Clock Disable Register
pub const PMC_SCDR: u32 = PMC_BASE + 0x04;
/// System Clock Status Register
pub const PMC_SCSR: u32 = PMC_BASE + 0x08;
/// Peripheral Clock Enable Register 0 (IDs 0-31)
pub const PMC_PCER0: u32 = PMC_BASE + 0x10;
/// Peripheral Clock Disable Register 0
pub const PMC_PCDR0: u32 = PMC_BASE + 0x14;
/// Peripheral Clock Status Register 0
pub const PMC_PCSR0: u32 = PMC_BASE + 0x18;
/// UTMI Clock Register
pub const CKGR_UCKR: u32 = PMC_BASE + 0x1C;
/// Main Oscillator Register
pub const CKGR_MOR: u32 = PMC_BASE + 0x20;
/// PLLA Register
pub const CKGR_PLLAR: u32 = PMC_BASE + 0x28;
/// Master Clock Register
pub const PMC_MCKR: u32 = PMC_BASE + 0x30;
/// Status Register
pub const PMC_SR: u32 = PMC_BASE + 0x68;
/// Fast Startup Mode Register
pub const PMC_FSMR: u32 = PMC_BASE + 0x70;
/// Fast Startup Polarity Register
pub const PMC_FSPR: u32 = PMC_BASE + 0x74;
/// Peripheral Clock Enable Register 1 (IDs 32-63)
pub const PMC_PCER1: u32 = PMC_BASE + 0x100;
/// Peripheral Clock Disable Register 1
pub const PMC_PCDR1: u32 = PMC_BASE + 0x104;
/// Peripheral Clock Status Register 1
pub const PMC_PCSR1: u32 = PMC_BASE + 0x108;

/// Slow Clock Controller configuration register
pub const SCKC_CR: u32 = 0xF804_8050;
/// `SCKC_CR.OSCSEL`: 1 selects the 32 kHz crystal
pub const SCKC_CR_OSCSEL: u32 = 1 << 3;

// CKGR_UCKR
/// UTMI PLL enable
pub const UCKR_UPLLEN: u32 = 1 << 16;
/// UTMI PLL start-up time field (maximum)
pub const UCKR_UPLLCOUNT_MAX: u32 = 0xF << 20;
/// UTMI bias enable
pub const UCKR_BIASEN: u32 = 1 << 24;

// CKGR_MOR
/// Main crystal oscillator enable
pub const MOR_MOSCXTEN: u32 = 1 << 0;
/// Main crystal oscillator bypass
pub const MOR_MOSCXTBY: u32 = 1 << 1;
/// Main RC oscillator enable
pub const MOR_MOSCRCEN: u32 = 1 << 3;
/// Main crystal start-up time field
pub const MOR_MOSCXTST_MASK: u32 = 0xFF << 8;
/// Write key, required on every MOR write
pub const MOR_KEY: u32 = 0x37 << 16;
const MOR_KEY_MASK: u32 = 0xFF << 16;
/// Main oscillator selection: 1 = crystal
pub const MOR_MOSCSEL: u32 = 1 << 24;

// CKGR_PLLAR
/// Must be written to 1
pub const PLLAR_ONE: u32 = 1 << 29;

// PMC_MCKR
const MCKR_CSS_MASK: u32 = 0x3;
const MCKR_PRES_SHIFT: u32 = 4;
const MCKR_PRES_MASK: u32 = 0x7 << MCKR_PRES_SHIFT;
const MCKR_MDIV_SHIFT: u32 = 8;
const MCKR_MDIV_MASK: u32 = 0x3 << MCKR_MDIV_SHIFT;
/// PLLA output divided by two
pub const MCKR_PLLADIV2: u32 = 1 << 12;
/// H32MX = MCK / 2
pub const MCKR_H32MXDIV: u32 = 1 << 24;

// PMC_SR
/// Main crystal stabilised
pub const SR_MOSCXTS: u32 = 1 << 0;
/// PLLA locked
pub const SR_LOCKA: u32 = 1 << 1;
/// Master clock ready
pub const SR_MCKRDY: u32 = 1 << 3;
/// UTMI PLL locked
pub const SR_LOCKU: u32 = 1 << 6;
/// Slow clock source is the crystal
pub const SR_OSCSELS: u32 = 1 << 7;
/// Main oscillator selection done
pub const SR_MOSCSELS: u32 = 1 << 16;
/// Main RC oscillator stabilised
pub const SR_MOSCRCS: u32 = 1 << 17;

// PMC_FSMR / PMC_FSPR
/// Fast start-up from WKUP0
pub const FSMR_FSTT0: u32 = 1 << 0;
/// Fast start-up from WKUP2 / PIOBU
pub const FSMR_FSTT2: u32 = 1 << 2;
/// Fast start-up from the RTC alarm
pub const FSMR_RTCAL: u32 = 1 << 17;
/// Fast start-up from the USB alarm
pub const FSMR_USBAL: u32 = 1 << 18;
/// Low-power mode: `WFE` enters ULP1
pub const FSMR_LPM: u32 = 1 << 20;
/// WKUP0 polarity: 1 = active high
pub const FSPR_FSTP0: u32 = 1 << 0;

// System clocks (PMC_SCER/SCDR/SCSR)
/// DDR clock
pub const SYSCLK_DDRCK: u32 = 1 << 2;
/// LCD clock
pub const SYSCLK_LCDCK: u32 = 1 << 3;
/// USB host OHCI clock
pub const SYSCLK_UHP: u32 = 1 << 6;
/// USB device clock
pub const SYSCLK_UDP: u32 = 1 << 7;
/// Programmable clock outputs PCK0-PCK2
pub const SYSCLK_PCK_MASK: u32 = 0x7 << 8;
/// ISC clock
pub const SYSCLK_ISCCK: u32 = 1 << 18;

/// Highest peripheral identifier handled through PCER0/PCER1.
pub const PERIPHERAL_ID_MAX: u8 = 63;

/// Register contents saved around a ULP transition and written back to the
/// matching enable registers on wake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeripheralSnapshot {
    /// `PMC_PCSR0`
    pub pcsr0: u32,
    /// `PMC_PCSR1`
    pub pcsr1: u32,
    /// `PMC_SCSR`
    pub scsr: u32,
    /// `CKGR_UCKR`
    pub uckr: u32,
}

/// PMC failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PmcError {
    /// A status flag never reached the expected state.
    #[error("PMC status poll timed out (SR mask {:#x})", .0.mask)]
    Timeout(#[from] PollTimeout),
    /// The requested configuration is invalid.
    #[error("invalid clock configuration: {0}")]
    Config(#[from] ClockConfigError),
    /// Peripheral identifier above 63.
    #[error("peripheral ID {0} out of range")]
    InvalidPeripheral(u8),
}

/// PMC driver.
pub struct Pmc<B> {
    bus: B,
    budget: u32,
}

// Register offsets and field shifts are compile-time constants.
#[allow(clippy::arithmetic_side_effects)]
impl<B: RegisterBus> Pmc<B> {
    /// Wrap a register bus.
    pub fn new(bus: B) -> Self {
        Self { bus, budget: DEFAULT_POLL_BUDGET }
    }

    /// Override the number of status reads per poll.
    #[must_use]
    pub fn with_poll_budget(mut self, budget: u32) -> Self {
        self.budget = budget;
        self
    }

    /// Give back the bus.
    pub fn release(self) -> B {
        self.bus
    }

    fn wait_sr(&self, mask: u32) -> Result<(), PmcError> {
        bus::wait_for_bits(&self.bus, PMC_SR, mask, self.budget)?;
        Ok(())
    }

    fn wait_sr_clear(&self, mask: u32) -> Result<(), PmcError> {
        bus::wait_for_clear(&self.bus, PMC_SR, mask, self.budget)?;
        Ok(())
    }

    fn write_mor(&mut self, set: u32, clear: u32) {
        self.bus
            .modify(CKGR_MOR, |v| ((v & !MOR_KEY_MASK & !clear) | set) | MOR_KEY);
    }

    fn write_mckr_field(&mut self, mask: u32, value: u32) -> Result<(), PmcError> {
        self.bus.modify(PMC_MCKR, |v| (v & !mask) | (value & mask));
        self.wait_sr(SR_MCKRDY)
    }

    // ── Master clock source ────────────────────────────────────────────────

    /// Poll until `MCKRDY` is set, e.g. after the core resumes from a sleep
    /// that stopped the master clock.
    pub fn wait_mck_ready(&self) -> Result<(), PmcError> {
        self.wait_sr(SR_MCKRDY)
    }

    /// Current `CSS` field.
    pub fn mck_source(&self) -> u32 {
        self.bus.read(PMC_MCKR) & MCKR_CSS_MASK
    }

    /// Switch MCK to the slow clock.
    pub fn switch_mck_to_slck(&mut self) -> Result<(), PmcError> {
        self.write_mckr_field(MCKR_CSS_MASK, MckSource::Slow.css())
    }

    /// Switch MCK to the main clock.
    pub fn switch_mck_to_main(&mut self) -> Result<(), PmcError> {
        self.write_mckr_field(MCKR_CSS_MASK, MckSource::Main.css())
    }

    /// Switch MCK to PLLA. PLLA must be locked.
    pub fn switch_mck_to_plla(&mut self) -> Result<(), PmcError> {
        self.write_mckr_field(MCKR_CSS_MASK, MckSource::PllA.css())
    }

    /// Switch MCK to the UTMI PLL. UPLL must be locked.
    pub fn switch_mck_to_upll(&mut self) -> Result<(), PmcError> {
        self.write_mckr_field(MCKR_CSS_MASK, MckSource::Upll.css())
    }

    fn switch_mck_to(&mut self, source: MckSource) -> Result<(), PmcError> {
        match source {
            MckSource::Slow => self.switch_mck_to_slck(),
            MckSource::Main => self.switch_mck_to_main(),
            MckSource::PllA => self.switch_mck_to_plla(),
            MckSource::Upll => self.switch_mck_to_upll(),
        }
    }

    // ── MCKR dividers ──────────────────────────────────────────────────────

    /// Program the processor clock prescaler.
    pub fn set_mck_prescaler(&mut self, prescaler: Prescaler) -> Result<(), PmcError> {
        self.write_mckr_field(MCKR_PRES_MASK, prescaler.field() << MCKR_PRES_SHIFT)
    }

    /// Program the master clock divider.
    pub fn set_mck_divider(&mut self, divider: MckDivider) -> Result<(), PmcError> {
        self.write_mckr_field(MCKR_MDIV_MASK, divider.field() << MCKR_MDIV_SHIFT)
    }

    /// Enable or bypass the PLLA /2 stage.
    pub fn set_plla_div2(&mut self, enable: bool) -> Result<(), PmcError> {
        self.write_mckr_field(MCKR_PLLADIV2, if enable { MCKR_PLLADIV2 } else { 0 })
    }

    /// Run H32MX at MCK / 2 (required when MCK > 83 MHz).
    pub fn set_h32mx_div2(&mut self, enable: bool) -> Result<(), PmcError> {
        self.write_mckr_field(MCKR_H32MXDIV, if enable { MCKR_H32MXDIV } else { 0 })
    }

    // ── Oscillators ────────────────────────────────────────────────────────

    /// Select the slow clock oscillator.
    pub fn select_slow_clock(&mut self, source: OscSource) -> Result<(), PmcError> {
        match source {
            OscSource::Crystal => {
                self.bus.set_bits(SCKC_CR, SCKC_CR_OSCSEL);
                self.wait_sr(SR_OSCSELS)
            }
            OscSource::Rc => {
                self.bus.clear_bits(SCKC_CR, SCKC_CR_OSCSEL);
                self.wait_sr_clear(SR_OSCSELS)
            }
        }
    }

    /// Start the 12 MHz crystal oscillator and wait for it to stabilise.
    pub fn enable_external_osc(&mut self) -> Result<(), PmcError> {
        self.write_mor(MOR_MOSCXTEN | MOR_MOSCXTST_MASK, MOR_MOSCXTBY);
        self.wait_sr(SR_MOSCXTS)
    }

    /// Stop the 12 MHz crystal oscillator.
    pub fn disable_external_osc(&mut self) {
        self.write_mor(0, MOR_MOSCXTEN | MOR_MOSCXTBY);
    }

    /// Start the 12 MHz RC oscillator and wait for it to stabilise.
    pub fn enable_internal_osc(&mut self) -> Result<(), PmcError> {
        self.write_mor(MOR_MOSCRCEN, 0);
        self.wait_sr(SR_MOSCRCS)
    }

    /// Select the main clock oscillator. Switching to the RC also stops the
    /// crystal.
    pub fn select_main_clock(&mut self, source: OscSource) -> Result<(), PmcError> {
        match source {
            OscSource::Crystal => {
                self.enable_external_osc()?;
                self.write_mor(MOR_MOSCSEL, 0);
                self.wait_sr(SR_MOSCSELS)
            }
            OscSource::Rc => {
                self.enable_internal_osc()?;
                self.write_mor(0, MOR_MOSCSEL);
                self.wait_sr(SR_MOSCSELS)?;
                self.disable_external_osc();
                Ok(())
            }
        }
    }

    // ── PLLs ───────────────────────────────────────────────────────────────

    /// Program PLLA and wait for lock. `mul == 0` is treated as
    /// [`Pmc::disable_plla`].
    pub fn configure_plla(&mut self, plla: &PllaConfig) -> Result<(), PmcError> {
        if !plla.is_enabled() {
            return self.disable_plla();
        }
        let value = PLLAR_ONE
            | ((u32::from(plla.mul) & 0x7F) << 18)
            | ((u32::from(plla.count) & 0x3F) << 8)
            | (u32::from(plla.div) & 0xFF);
        self.bus.write(CKGR_PLLAR, value);
        self.wait_sr(SR_LOCKA)
    }

    /// Stop PLLA and wait for `LOCKA` to drop.
    pub fn disable_plla(&mut self) -> Result<(), PmcError> {
        self.bus.write(CKGR_PLLAR, PLLAR_ONE);
        self.wait_sr_clear(SR_LOCKA)
    }

    /// Start the UTMI PLL and wait for lock.
    pub fn enable_upll(&mut self) -> Result<(), PmcError> {
        self.bus
            .set_bits(CKGR_UCKR, UCKR_UPLLEN | UCKR_UPLLCOUNT_MAX | UCKR_BIASEN);
        self.wait_sr(SR_LOCKU)
    }

    /// Stop the UTMI PLL.
    pub fn disable_upll(&mut self) {
        self.bus.clear_bits(CKGR_UCKR, UCKR_UPLLEN);
    }

    /// Turn off the UTMI bias.
    pub fn disable_upll_bias(&mut self) {
        self.bus.clear_bits(CKGR_UCKR, UCKR_BIASEN);
    }

    // ── Full reconfiguration ───────────────────────────────────────────────

    /// Apply a complete PCK/MCK configuration.
    ///
    /// MCK is parked on the slow clock first so that every oscillator and PLL
    /// change happens while nothing depends on them.
    pub fn set_custom_pck_mck(&mut self, cfg: &ClockConfig) -> Result<(), PmcError> {
        cfg.validate()?;

        self.switch_mck_to_slck()?;
        self.select_slow_clock(cfg.slow_source)?;
        self.select_main_clock(cfg.main_source)?;
        self.disable_plla()?;
        if cfg.plla.is_enabled() {
            self.configure_plla(&cfg.plla)?;
        }
        if cfg.upll {
            self.enable_upll()?;
        } else {
            self.disable_upll();
        }
        self.set_h32mx_div2(cfg.h32mx_div2)?;
        self.set_plla_div2(cfg.plla_div2)?;
        self.set_mck_prescaler(cfg.prescaler)?;
        self.set_mck_divider(cfg.divider)?;
        self.switch_mck_to(cfg.mck_source)?;

        #[cfg(feature = "defmt")]
        defmt::debug!("PMC: PCK {=u32} Hz, MCK {=u32} Hz", cfg.pck_hz(), cfg.mck_hz());
        Ok(())
    }

    // ── Peripheral and system clocks ───────────────────────────────────────

    fn peripheral_regs(id: u8) -> Result<(u32, u32, u32, u32), PmcError> {
        match id {
            0..=31 => Ok((PMC_PCER0, PMC_PCDR0, PMC_PCSR0, 1 << id)),
            32..=PERIPHERAL_ID_MAX => Ok((PMC_PCER1, PMC_PCDR1, PMC_PCSR1, 1 << (id - 32))),
            _ => Err(PmcError::InvalidPeripheral(id)),
        }
    }

    /// Enable the clock of peripheral `id`.
    pub fn enable_peripheral(&mut self, id: u8) -> Result<(), PmcError> {
        let (pcer, _, _, bit) = Self::peripheral_regs(id)?;
        self.bus.write(pcer, bit);
        Ok(())
    }

    /// Disable the clock of peripheral `id`.
    pub fn disable_peripheral(&mut self, id: u8) -> Result<(), PmcError> {
        let (_, pcdr, _, bit) = Self::peripheral_regs(id)?;
        self.bus.write(pcdr, bit);
        Ok(())
    }

    /// `true` if the clock of peripheral `id` is running.
    pub fn is_peripheral_enabled(&self, id: u8) -> Result<bool, PmcError> {
        let (_, _, pcsr, bit) = Self::peripheral_regs(id)?;
        Ok(self.bus.read(pcsr) & bit != 0)
    }

    /// Disable every running peripheral clock except those in `keep`.
    pub fn disable_all_peripherals_except(&mut self, keep: &[u8]) {
        for id in 0..=PERIPHERAL_ID_MAX {
            if keep.contains(&id) {
                continue;
            }
            if matches!(self.is_peripheral_enabled(id), Ok(true)) {
                let _ = self.disable_peripheral(id);
            }
        }
    }

    /// Enable the system clocks in `mask`.
    pub fn enable_system_clock(&mut self, mask: u32) {
        self.bus.write(PMC_SCER, mask);
    }

    /// Disable the system clocks in `mask`.
    pub fn disable_system_clock(&mut self, mask: u32) {
        self.bus.write(PMC_SCDR, mask);
    }

    /// `true` if every system clock in `mask` is running.
    pub fn is_system_clock_enabled(&self, mask: u32) -> bool {
        self.bus.read(PMC_SCSR) & mask == mask
    }

    // ── Snapshot ───────────────────────────────────────────────────────────

    /// Capture peripheral, system and UTMI clock state.
    pub fn snapshot(&self) -> PeripheralSnapshot {
        PeripheralSnapshot {
            pcsr0: self.bus.read(PMC_PCSR0),
            pcsr1: self.bus.read(PMC_PCSR1),
            scsr: self.bus.read(PMC_SCSR),
            uckr: self.bus.read(CKGR_UCKR),
        }
    }

    /// Write a snapshot back to `PCER0`, `PCER1`, `SCER` and `UCKR`, in
    /// that order.
    pub fn restore(&mut self, snapshot: &PeripheralSnapshot) {
        self.bus.write(PMC_PCER0, snapshot.pcsr0);
        self.bus.write(PMC_PCER1, snapshot.pcsr1);
        self.bus.write(PMC_SCER, snapshot.scsr);
        self.bus.write(CKGR_UCKR, snapshot.uckr);
    }

    // ── Fast start-up ──────────────────────────────────────────────────────

    /// Program `PMC_FSMR`.
    pub fn set_fast_startup_mode(&mut self, mask: u32) {
        self.bus.write(PMC_FSMR, mask);
    }

    /// Set the inputs in `active_high` to active-high and those in
    /// `active_low` to active-low.
    pub fn set_fast_startup_polarity(&mut self, active_high: u32, active_low: u32) {
        self.bus
            .modify(PMC_FSPR, |v| (v | active_high) & !active_low);
    }
}
