//! SAMA5D2 low-power demo firmware
//!
//! Serial-menu application that walks the SAMA5D2 through its power modes
//! (idle, ULP0, ULP1, backup) and exercises the DDR3 controller around them.
//!
//! # Architecture
//!
//! ```text
//! main.rs (polled loop)
//!         ↓
//! app  (menu commands)  ←  menu (keys, text, mailbox)
//!         ↓
//! board (pins, console, misc power)
//!         ↓
//! platform (PMC, sequencer, RTC, SHDWC, DDR, ...)
//! ```
//!
//! # Features
//!
//! - `hardware` - Build for the SAMA5D2-XULT (`armv7a-none-eabi`, image in SRAM0)
//! - `std` - Expose the platform mocks to host builds
//!
//! # Examples
//!
//! ```bash
//! cargo build --release --target armv7a-none-eabi --features hardware
//! cargo xtask flash
//! ```

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
// Upgrade relevant warns to deny; keep pedantic as warn (too noisy for firmware)
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
// Logging discipline
#![warn(clippy::print_stdout)] // the console is for the menu; logs go through defmt
#![warn(clippy::dbg_macro)]
// Intentional allows for this codebase:
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::doc_markdown)]

pub mod app;
pub mod board;
pub mod menu;

#[cfg(all(feature = "hardware", target_arch = "arm"))]
pub mod boot;
#[cfg(all(feature = "hardware", target_arch = "arm"))]
pub mod exception_handlers;

// Re-export key types
pub use app::{AppError, LowPowerApp};
pub use board::{BoardError, Console};
pub use menu::{Mailbox, MenuCommand, MENU_TEXT};
