//! SAMA5D2 low-power demo - main entry point
//!
//! Hardware-only entry point, called from the reset path in `firmware::boot`.

#![no_std]
#![no_main]

use defmt_rtt as _;

use firmware::{LowPowerApp, Mailbox};
use platform::bus::Mmio;
use platform::clock_config::{self, ClockConfig};
use platform::config::{DDR_CS_ADDR, DDR_SIZE_BYTES, RUN_CLOCK_SETTING};
use platform::cpu::{CortexA5, WithCpu};
use platform::ddr::DdrWindow;
use platform::pit::Pit;
use platform::uart::{Uart, UART1_BASE};

/// Console bytes waiting for the main loop.
static MAILBOX: Mailbox = Mailbox::new();

#[no_mangle]
extern "C" fn main() -> ! {
    defmt::info!("{=str} v{=str}", platform::config::APP_NAME, platform::config::APP_VERSION);

    let run_mck_hz = clock_config::clock_setting(RUN_CLOCK_SETTING).map_or(0, ClockConfig::mck_hz);
    let ddr_words = usize::try_from(DDR_SIZE_BYTES / 4).unwrap_or(0);

    // SAFETY: single core with IRQs masked. Each handle drives its own
    // peripheral block (system controller, UART1, PIT) from this loop only,
    // and the DDR window is only dereferenced by the pattern commands, which
    // refuse to run before the controller is initialised.
    let (sys, console, mut pit, ddr_window) = unsafe {
        (
            WithCpu::new(Mmio::new(), CortexA5),
            Uart::new(Mmio::new(), UART1_BASE),
            Pit::new(Mmio::new(), run_mck_hz),
            DdrWindow::new(DDR_CS_ADDR, ddr_words),
        )
    };
    if let Err(e) = pit.start() {
        defmt::error!("PIT start failed: {}", e);
    }

    let mut app = LowPowerApp::new(sys, console, pit, ddr_window);
    if let Err(e) = app.start() {
        defmt::error!("start-up failed: {}", e);
    }

    loop {
        // Errors were already printed on the console.
        let _ = app.poll(&MAILBOX);
    }
}
