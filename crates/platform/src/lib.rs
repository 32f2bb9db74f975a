//! Board support for the SAMA5D2 low-power demo
//!
//! Register-level drivers for the blocks the demo touches, written against a
//! [`RegisterBus`] so they run unchanged on the chip ([`bus::Mmio`]) and on
//! the host ([`mocks::MockBus`]).
//!
//! # Layers
//!
//! ```text
//! Application (firmware crate: menu, board wiring)
//!         ↓
//! power       - low-power sequencer, save/restore bracket, wake-up arming
//!         ↓
//! pmc rtc shdwc pio pit aic l2cc sfr ddr uart   - peripheral drivers
//!         ↓
//! bus / cpu   - register access, barriers and sleep instructions
//! ```
//!
//! # Features
//!
//! - `std`: expose [`mocks`] to other crates' tests
//! - `hardware`: volatile MMIO bus and Cortex-A5 instructions
//! - `defmt`: enable defmt logging
//!
//! # Example
//!
//! ```no_run
//! use platform::power::{LowPowerMode, SleepRequest};
//! use platform::{Chip, Cpu, RegisterBus};
//!
//! fn nap<S: RegisterBus + Cpu>(chip: &mut Chip<S>) -> Result<(), platform::PowerError> {
//!     let report = chip.low_power_run(SleepRequest::new(LowPowerMode::Ulp0, 3))?;
//!     assert_eq!(report.asleep.to_string(), "PCK = MCK = 187.5 kHz");
//!     Ok(())
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors, callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod aic;
pub mod bus;
pub mod chip;
pub mod clock_config;
pub mod config;
pub mod cpu;
pub mod ddr;
pub mod l2cc;
pub mod mocks;
pub mod pio;
pub mod pit;
pub mod pmc;
pub mod power;
pub mod rtc;
pub mod sfr;
pub mod shdwc;
pub mod uart;

pub use bus::{PollTimeout, RegisterBus};
pub use chip::Chip;
pub use clock_config::{ClockConfig, ClockConfigError, ClockSummary, CLOCK_SETTINGS};
pub use cpu::{Cpu, WithCpu};
pub use ddr::{DdrConfig, DdrError, PatternReport, WordMemory};
pub use pio::{Pin, PinConfig, Port};
pub use pmc::{PeripheralSnapshot, PmcError};
pub use power::{LowPowerMode, PowerError, SleepRequest, WakeReport};
pub use rtc::RtcError;
pub use uart::{Uart, UartError};
