//! DDR3L through the MPDDRC
//!
//! Covers the parts of the controller the low-power demo uses: the DDR3
//! power-up sequence, self-refresh with pad isolation, the way back to
//! normal mode, and a word pattern test over the whole device.
//!
//! # Hardware
//!
//! SAMA5D2-XULT: 2x MT41K128M16 (Micron, DDR3L, 16 Mx16x8 banks) on a 32-bit
//! bus, 512 MB at `0x2000_0000`, clocked from MCK (166 MHz in run mode).
//!
//! # Memory map of the chip-select window
//!
//! ```text
//! 0x2000_0000  ┌──────────────────────────┐
//!              │ bank 0                   │  A[1:0] byte lane, A[11:2] column,
//!              │ ...                      │  A[25:12] row
//! 0x2C00_0000  │ bank 3 (EMR3 target)     │  A[28:26] bank
//! 0x3FFF_FFFF  └──────────────────────────┘
//! ```
//!
//! Mode-register commands are issued by writing any word in the window with
//! `MPDDRC_MR` set to the command; the bank address bits of that write
//! select which (E)MR is loaded.

use embedded_hal::delay::DelayNs;

use crate::bus::RegisterBus;
use crate::config::{DDR_CS_ADDR, DDR_MISMATCH_REPORT_LIMIT};
use crate::pmc::{Pmc, PmcError, SYSCLK_DDRCK};
use crate::sfr::Sfr;

/// MPDDRC base address
pub const MPDDRC_BASE: u32 = 0xF000_C000;
/// Mode Register
pub const MPDDRC_MR: u32 = MPDDRC_BASE;
/// Refresh Timer Register
pub const MPDDRC_RTR: u32 = MPDDRC_BASE + 0x04;
/// Configuration Register
pub const MPDDRC_CR: u32 = MPDDRC_BASE + 0x08;
/// Timing Parameter 0 Register
pub const MPDDRC_TPR0: u32 = MPDDRC_BASE + 0x0C;
/// Timing Parameter 1 Register
pub const MPDDRC_TPR1: u32 = MPDDRC_BASE + 0x10;
/// Timing Parameter 2 Register
pub const MPDDRC_TPR2: u32 = MPDDRC_BASE + 0x14;
/// Low-power Register
pub const MPDDRC_LPR: u32 = MPDDRC_BASE + 0x1C;
/// Memory Device Register
pub const MPDDRC_MD: u32 = MPDDRC_BASE + 0x20;

/// Peripheral ID of the MPDDRC
pub const ID_MPDDRC: u8 = 13;

/// `MPDDRC_MR.MODE` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DdrCommand {
    /// Normal operation
    Normal,
    /// NOP
    Nop,
    /// Precharge all banks
    PrechargeAll,
    /// Load mode register
    LoadModeRegister,
    /// Auto-refresh
    AutoRefresh,
    /// Load extended mode register
    ExtendedLoadModeRegister,
    /// ZQ calibration
    DeepCalibration,
}

impl DdrCommand {
    /// `MODE` field encoding.
    pub const fn mode(self) -> u32 {
        match self {
            Self::Normal => 0,
            Self::Nop => 1,
            Self::PrechargeAll => 2,
            Self::LoadModeRegister => 3,
            Self::AutoRefresh => 4,
            Self::ExtendedLoadModeRegister => 5,
            Self::DeepCalibration => 6,
        }
    }
}

// MPDDRC_CR
const CR_DLL_RESET: u32 = 1 << 7;
const CR_DIC_DS_WEAK: u32 = 1 << 8;
const CR_ZQ_SHORT: u32 = 2 << 10;
const CR_NB_8_BANKS: u32 = 1 << 20;
const CR_DECOD_INTERLEAVED: u32 = 1 << 22;
const CR_UNAL: u32 = 1 << 23;

// MPDDRC_LPR
const LPR_LPCB_MASK: u32 = 0x3;
/// `LPCB` value selecting self-refresh
pub const LPR_LPCB_SELF_REFRESH: u32 = 0x1;

// MPDDRC_MD
const MD_DDR3: u32 = 0x4;
const MD_DBW_16: u32 = 1 << 4;

/// DDR timing parameters in nanoseconds, or in clocks where the datasheet
/// gives a clock count (`*_ck` fields).
///
/// # Sources
/// - MT41K128M16 datasheet, DDR3L-1600 speed bin (-125): tRAS 35 ns,
///   tRCD/tRP 13.75 ns, tRC 48.75 ns, tWR 15 ns, tRFC 160 ns, tFAW 40 ns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DdrTimingNs {
    /// tRAS, ACTIVATE to PRECHARGE
    pub t_ras_ns: u32,
    /// tRCD, ACTIVATE to READ/WRITE
    pub t_rcd_ns: u32,
    /// tWR, write recovery
    pub t_wr_ns: u32,
    /// tRC, ACTIVATE to ACTIVATE same bank
    pub t_rc_ns: u32,
    /// tRP, PRECHARGE period
    pub t_rp_ns: u32,
    /// tRRD, ACTIVATE to ACTIVATE different bank
    pub t_rrd_ns: u32,
    /// tWTR, internal write to read
    pub t_wtr_ns: u32,
    /// tMRD, mode register set cycle
    pub t_mrd_ck: u32,
    /// tRFC, refresh to ACTIVATE
    pub t_rfc_ns: u32,
    /// tXS, exit self-refresh to non-read command
    pub t_xs_ns: u32,
    /// tXSDLL, exit self-refresh to read command
    pub t_xsrd_ck: u32,
    /// tXP, exit power-down
    pub t_xp_ck: u32,
    /// tRTP, READ to PRECHARGE
    pub t_rtp_ns: u32,
    /// tFAW, four-activate window
    pub t_faw_ns: u32,
}

/// DDR timing validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DdrTimingError {
    /// A mandatory timing was zero.
    #[error("{field} must be non-zero")]
    TooSmall {
        /// Name of the timing field that was zero.
        field: &'static str,
    },
}

/// DDR timing converted to MCK cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DdrTiming {
    /// tRAS
    pub t_ras: u32,
    /// tRCD
    pub t_rcd: u32,
    /// tWR
    pub t_wr: u32,
    /// tRC
    pub t_rc: u32,
    /// tRP
    pub t_rp: u32,
    /// tRRD
    pub t_rrd: u32,
    /// tWTR
    pub t_wtr: u32,
    /// tMRD
    pub t_mrd: u32,
    /// tRFC
    pub t_rfc: u32,
    /// tXSNR
    pub t_xsnr: u32,
    /// tXSRD
    pub t_xsrd: u32,
    /// tXP
    pub t_xp: u32,
    /// tRTP
    pub t_rtp: u32,
    /// tFAW
    pub t_faw: u32,
}

/// Clamp a cycle count into a `width`-bit register field.
const fn field(cycles: u32, width: u32) -> u32 {
    let max = (1 << width) - 1;
    if cycles > max {
        max
    } else {
        cycles
    }
}

// Shifts and the u64 product cannot overflow for u32 inputs.
#[allow(clippy::arithmetic_side_effects)]
impl DdrTiming {
    /// Convert nanoseconds to MCK cycles (ceiling division).
    ///
    /// `cycles = ceil(ns * mck_hz / 1_000_000_000)`, integer only.
    pub fn ns_to_cycles(ns: u32, mck_hz: u32) -> u32 {
        let cycles = (u64::from(ns) * u64::from(mck_hz)).div_ceil(1_000_000_000);
        u32::try_from(cycles).unwrap_or(u32::MAX)
    }

    /// Convert a nanosecond table at `mck_hz`.
    pub fn new(ns: DdrTimingNs, mck_hz: u32) -> Result<Self, DdrTimingError> {
        for (value, name) in [
            (ns.t_ras_ns, "t_ras"),
            (ns.t_rcd_ns, "t_rcd"),
            (ns.t_rc_ns, "t_rc"),
            (ns.t_rp_ns, "t_rp"),
            (ns.t_rfc_ns, "t_rfc"),
        ] {
            if value == 0 {
                return Err(DdrTimingError::TooSmall { field: name });
            }
        }
        let c = |v| Self::ns_to_cycles(v, mck_hz);
        Ok(Self {
            t_ras: c(ns.t_ras_ns),
            t_rcd: c(ns.t_rcd_ns),
            t_wr: c(ns.t_wr_ns),
            t_rc: c(ns.t_rc_ns),
            t_rp: c(ns.t_rp_ns),
            // DDR3 floors tRRD, tWTR and tRTP at 4 clocks.
            t_rrd: c(ns.t_rrd_ns).max(4),
            t_wtr: c(ns.t_wtr_ns).max(4),
            t_mrd: ns.t_mrd_ck,
            t_rfc: c(ns.t_rfc_ns),
            t_xsnr: c(ns.t_xs_ns),
            t_xsrd: ns.t_xsrd_ck,
            t_xp: ns.t_xp_ck,
            t_rtp: c(ns.t_rtp_ns).max(4),
            t_faw: c(ns.t_faw_ns),
        })
    }

    /// `MPDDRC_TPR0` value.
    pub const fn tpr0(&self) -> u32 {
        field(self.t_ras, 4)
            | (field(self.t_rcd, 4) << 4)
            | (field(self.t_wr, 4) << 8)
            | (field(self.t_rc, 4) << 12)
            | (field(self.t_rp, 4) << 16)
            | (field(self.t_rrd, 4) << 20)
            | (field(self.t_wtr, 3) << 24)
            | (field(self.t_mrd, 4) << 28)
    }

    /// `MPDDRC_TPR1` value.
    pub const fn tpr1(&self) -> u32 {
        field(self.t_rfc, 7)
            | (field(self.t_xsnr, 8) << 8)
            | (field(self.t_xsrd, 8) << 16)
            | (field(self.t_xp, 4) << 24)
    }

    /// `MPDDRC_TPR2` value. `TXARD`/`TXARDS`/`TRPA` are DDR2-only and left
    /// at zero.
    pub const fn tpr2(&self) -> u32 {
        (field(self.t_rtp, 3) << 12) | (field(self.t_faw, 4) << 16)
    }
}

/// Device geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DdrGeometry {
    /// Row address bits (11-14)
    pub row_bits: u8,
    /// Column address bits (9-12)
    pub column_bits: u8,
    /// Internal banks (4 or 8)
    pub banks: u8,
    /// Data bus width, 16 or 32
    pub bus_width: u8,
}

// Field widths are validated by construction of the board presets.
#[allow(clippy::arithmetic_side_effects)]
impl DdrGeometry {
    /// Bit position of the bank address in the chip-select window.
    pub const fn bank_shift(&self) -> u32 {
        let byte_lanes = if self.bus_width == 32 { 2 } else { 1 };
        self.column_bits as u32 + self.row_bits as u32 + byte_lanes
    }

    /// Device size in bytes.
    pub const fn size_bytes(&self) -> u64 {
        (self.banks as u64) << self.bank_shift()
    }
}

/// Complete controller configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DdrConfig {
    /// Geometry
    pub geometry: DdrGeometry,
    /// CAS latency in clocks
    pub cas_latency: u8,
    /// Timing in MCK cycles
    pub timing: DdrTiming,
    /// `MPDDRC_RTR.COUNT`: MCK cycles between refreshes
    pub refresh_count: u32,
}

/// MT41K128M16 at DDR3L-1600 timings.
pub const MT41K128M16_TIMING_NS: DdrTimingNs = DdrTimingNs {
    t_ras_ns: 35,
    t_rcd_ns: 14,
    t_wr_ns: 15,
    t_rc_ns: 49,
    t_rp_ns: 14,
    t_rrd_ns: 8,
    t_wtr_ns: 8,
    t_mrd_ck: 4,
    t_rfc_ns: 160,
    t_xs_ns: 170,
    t_xsrd_ck: 255,
    t_xp_ck: 3,
    t_rtp_ns: 8,
    t_faw_ns: 40,
};

// The refresh product is computed in u64.
#[allow(clippy::arithmetic_side_effects)]
impl DdrConfig {
    /// Board preset: 2x MT41K128M16 on a 32-bit bus.
    pub fn mt41k128m16_x2(mck_hz: u32) -> Result<Self, DdrTimingError> {
        Ok(Self {
            geometry: DdrGeometry {
                row_bits: 14,
                column_bits: 10,
                banks: 8,
                bus_width: 32,
            },
            cas_latency: 5,
            timing: DdrTiming::new(MT41K128M16_TIMING_NS, mck_hz)?,
            refresh_count: Self::refresh_count_for(mck_hz, 64, 8192),
        })
    }

    /// Cycles between two refresh commands so that `rows` refreshes fit in
    /// `period_ms`, saturated to the 12-bit `RTR.COUNT` field.
    pub fn refresh_count_for(mck_hz: u32, period_ms: u32, rows: u32) -> u32 {
        let count = u64::from(mck_hz) * u64::from(period_ms) / u64::from(rows.max(1)) / 1000;
        u32::try_from(count).unwrap_or(u32::MAX).min(0xFFF)
    }

    /// `MPDDRC_CR` value, without the DLL reset bit.
    pub fn cr(&self) -> u32 {
        let g = &self.geometry;
        let nc = u32::from(g.column_bits.saturating_sub(9)) & 0x3;
        let nr = u32::from(g.row_bits.saturating_sub(11)) & 0x3;
        let nb = if g.banks == 8 { CR_NB_8_BANKS } else { 0 };
        nc | (nr << 2)
            | ((u32::from(self.cas_latency) & 0x7) << 4)
            | CR_DIC_DS_WEAK
            | CR_ZQ_SHORT
            | nb
            | CR_DECOD_INTERLEAVED
            | CR_UNAL
    }

    /// `MPDDRC_MD` value.
    pub fn md(&self) -> u32 {
        if self.geometry.bus_width == 16 {
            MD_DDR3 | MD_DBW_16
        } else {
            MD_DDR3
        }
    }

    /// Address whose write loads mode register `index` (0 = MR0, 1 = EMR1...).
    pub fn mode_register_address(&self, index: u32) -> u32 {
        DDR_CS_ADDR.wrapping_add(index << self.geometry.bank_shift())
    }
}

/// DDR failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DdrError {
    /// Clock gating failed.
    #[error("DDR clock control failed: {0}")]
    Pmc(#[from] PmcError),
    /// The timing table does not fit the current master clock.
    #[error("invalid DDR timing: {0}")]
    Timing(#[from] DdrTimingError),
}

/// MPDDRC driver.
pub struct Ddr<B> {
    bus: B,
}

impl<B: RegisterBus> Ddr<B> {
    /// Wrap a register bus.
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    fn command(&mut self, command: DdrCommand, address: u32) {
        self.bus.write(MPDDRC_MR, command.mode());
        // Any access to the window issues the command.
        self.bus.write(address, 0);
    }

    /// Clock the controller and run the DDR3 power-up sequence.
    pub fn init<D: DelayNs>(&mut self, config: &DdrConfig, delay: &mut D) -> Result<(), DdrError> {
        {
            let mut pmc = Pmc::new(&mut self.bus);
            pmc.enable_peripheral(ID_MPDDRC)?;
            pmc.enable_system_clock(SYSCLK_DDRCK);
        }
        Sfr::new(&mut self.bus).connect_ddr_pads();

        self.bus.write(MPDDRC_MD, config.md());
        self.bus.write(MPDDRC_CR, config.cr());
        self.bus.write(MPDDRC_TPR0, config.timing.tpr0());
        self.bus.write(MPDDRC_TPR1, config.timing.tpr1());
        self.bus.write(MPDDRC_TPR2, config.timing.tpr2());

        // CKE high after at least 500 us of stable power.
        self.command(DdrCommand::Nop, DDR_CS_ADDR);
        delay.delay_us(500);
        self.command(DdrCommand::Nop, DDR_CS_ADDR);
        delay.delay_us(1);

        for emr in [2, 3, 1] {
            self.command(
                DdrCommand::ExtendedLoadModeRegister,
                config.mode_register_address(emr),
            );
            delay.delay_us(1);
        }

        self.bus.set_bits(MPDDRC_CR, CR_DLL_RESET);
        self.command(DdrCommand::LoadModeRegister, config.mode_register_address(0));
        delay.delay_us(1);
        self.bus.clear_bits(MPDDRC_CR, CR_DLL_RESET);

        self.command(DdrCommand::DeepCalibration, DDR_CS_ADDR);
        delay.delay_us(1);

        self.command(DdrCommand::Normal, DDR_CS_ADDR);
        self.bus.write(MPDDRC_RTR, config.refresh_count);

        #[cfg(feature = "defmt")]
        defmt::info!("DDR3 initialised, refresh count {=u32}", config.refresh_count);
        Ok(())
    }

    /// Put the device into self-refresh, isolate the pads and stop the
    /// controller clocks.
    pub fn self_refresh(&mut self) -> Result<(), DdrError> {
        self.bus.modify(MPDDRC_LPR, |v| {
            (v & !LPR_LPCB_MASK) | LPR_LPCB_SELF_REFRESH
        });
        Sfr::new(&mut self.bus).isolate_ddr_pads();

        let mut pmc = Pmc::new(&mut self.bus);
        pmc.disable_system_clock(SYSCLK_DDRCK);
        pmc.disable_peripheral(ID_MPDDRC)?;
        Ok(())
    }

    /// `true` while the controller clock is gated.
    pub fn is_clock_gated(&mut self) -> Result<bool, DdrError> {
        Ok(!Pmc::new(&mut self.bus).is_peripheral_enabled(ID_MPDDRC)?)
    }

    /// Bring the device back to normal mode if [`Ddr::self_refresh`] left it
    /// clock-gated. Returns `true` if anything had to be done.
    pub fn check_ready(&mut self) -> Result<bool, DdrError> {
        if !self.is_clock_gated()? {
            return Ok(false);
        }
        {
            let mut pmc = Pmc::new(&mut self.bus);
            pmc.enable_peripheral(ID_MPDDRC)?;
            pmc.enable_system_clock(SYSCLK_DDRCK);
        }
        self.bus.clear_bits(MPDDRC_LPR, LPR_LPCB_MASK);
        Sfr::new(&mut self.bus).connect_ddr_pads();
        Ok(true)
    }
}

/// Word-addressed view of the DDR window.
pub trait WordMemory {
    /// Address of word 0, for reporting.
    fn base_address(&self) -> u32;
    /// Number of 32-bit words.
    fn len_words(&self) -> usize;
    /// Store `value` at word `index`.
    fn write_word(&mut self, index: usize, value: u32);
    /// Load word `index`.
    fn read_word(&self, index: usize) -> u32;
}

/// One word that did not hold its pattern value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Mismatch {
    /// Value written
    pub expected: u32,
    /// Value read back
    pub read: u32,
    /// Byte address of the word
    pub address: u32,
}

/// Outcome of [`check_pattern`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternReport {
    /// Words compared
    pub checked: usize,
    /// Total mismatching words
    pub mismatches: usize,
    /// The first few mismatches
    pub first: heapless::Vec<Mismatch, DDR_MISMATCH_REPORT_LIMIT>,
}

impl PatternReport {
    /// `true` if every word matched.
    pub fn is_ok(&self) -> bool {
        self.mismatches == 0
    }
}

/// Pattern value of word `index`: the index itself.
#[allow(clippy::cast_possible_truncation)]
pub const fn pattern_word(index: usize) -> u32 {
    index as u32
}

/// Fill every word with its own index.
pub fn write_pattern<M: WordMemory + ?Sized>(mem: &mut M) {
    for i in 0..mem.len_words() {
        mem.write_word(i, pattern_word(i));
    }
}

/// Compare every word with its index.
pub fn check_pattern<M: WordMemory + ?Sized>(mem: &M) -> PatternReport {
    let mut report = PatternReport::default();
    for i in 0..mem.len_words() {
        let expected = pattern_word(i);
        let read = mem.read_word(i);
        report.checked = report.checked.saturating_add(1);
        if read != expected {
            report.mismatches = report.mismatches.saturating_add(1);
            let offset = u32::try_from(i).unwrap_or(u32::MAX).wrapping_mul(4);
            let _ = report.first.push(Mismatch {
                expected,
                read,
                address: mem.base_address().wrapping_add(offset),
            });
        }
    }
    report
}

/// The DDR chip-select window accessed with volatile word loads and stores.
#[cfg(feature = "hardware")]
pub struct DdrWindow {
    base: *mut u32,
    words: usize,
}

#[cfg(feature = "hardware")]
impl DdrWindow {
    /// # Safety
    ///
    /// The controller must be initialised and out of self-refresh for as long
    /// as the window is accessed, and nothing else may hold references into
    /// `[base, base + words * 4)`.
    pub const unsafe fn new(base: u32, words: usize) -> Self {
        Self { base: base as usize as *mut u32, words }
    }
}

#[cfg(feature = "hardware")]
impl WordMemory for DdrWindow {
    fn base_address(&self) -> u32 {
        self.base as usize as u32
    }

    fn len_words(&self) -> usize {
        self.words
    }

    fn write_word(&mut self, index: usize, value: u32) {
        if index < self.words {
            // SAFETY: `index` is in bounds of the window handed to `new`.
            unsafe { self.base.add(index).write_volatile(value) }
        }
    }

    fn read_word(&self, index: usize) -> u32 {
        if index < self.words {
            // SAFETY: see `write_word`.
            unsafe { self.base.add(index).read_volatile() }
        } else {
            0
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
