//! Board configuration and constants
//!
//! Central values shared by the drivers and the demo application. Everything
//! that depends on the board (oscillator frequencies, DDR population, console
//! wiring) lives here rather than in the drivers.

/// Board name printed in the console banner
pub const BOARD_NAME: &str = "SAMA5D2-XULT";

/// Chip name
pub const CHIP_NAME: &str = "SAMA5D27";

/// Application name
pub const APP_NAME: &str = "Low Power Mode Example";

/// Application version (synchronized with Cargo.toml)
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Frequency of the external main crystal (MAINCK when the crystal is used).
pub const MAIN_XTAL_HZ: u32 = 12_000_000;

/// Frequency of the internal 12 MHz RC oscillator.
pub const MAIN_RC_HZ: u32 = 12_000_000;

/// Frequency of the slow clock (crystal or RC).
pub const SLOW_CLOCK_HZ: u32 = 32_768;

/// UTMI PLL output. Fixed x40 multiplier on the 12 MHz main clock.
pub const UPLL_HZ: u32 = 480_000_000;

/// Console baud rate
pub const CONSOLE_BAUD: u32 = 115_200;

/// Delay before the RTC alarm wakes the chip from ULP1 / backup.
pub const WAKEUP_DELAY_SECS: u8 = 30;

/// Clock table entry used in ULP1 (12 MHz RC).
pub const ULP1_CLOCK_SETTING: usize = 6;

/// Clock table entry that holds the run-mode configuration.
pub const RUN_CLOCK_SETTING: usize = 0;

/// Debounce filter frequency of the wake-up push-button, in Hz.
pub const BUTTON_DEBOUNCE_HZ: u32 = 10;

/// DDR chip-select window base address.
pub const DDR_CS_ADDR: u32 = 0x2000_0000;

/// Populated DDR size in bytes (2x MT41K128M16, 32-bit bus).
pub const DDR_SIZE_BYTES: u32 = 512 * 1024 * 1024;

/// Internal SRAM0 base. The image runs from here.
pub const SRAM0_ADDR: u32 = 0x0020_0000;

/// Internal SRAM0 size in bytes.
pub const SRAM0_SIZE_BYTES: u32 = 128 * 1024;

/// Maximum DDR pattern mismatches reported individually.
pub const DDR_MISMATCH_REPORT_LIMIT: usize = 8;

/// Development banner printed at start-up.
pub const fn banner() -> &'static str {
    "-- Low Power mode --"
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn test_ddr_window_fits_address_space() {
        assert!(DDR_CS_ADDR.checked_add(DDR_SIZE_BYTES - 1).is_some());
    }

    #[test]
    fn test_ulp1_setting_is_not_run_setting() {
        assert_ne!(ULP1_CLOCK_SETTING, RUN_CLOCK_SETTING);
    }

    #[test]
    fn test_debounce_divider_is_representable() {
        // S_PIO_SCDR.DIV = SLCK / (2 * f) - 1 must fit in 14 bits.
        let div = SLOW_CLOCK_HZ / (2 * BUTTON_DEBOUNCE_HZ) - 1;
        assert!(div < (1 << 14));
    }
}
