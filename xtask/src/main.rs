// Desktop/tooling crate: unwrap/expect/panic acceptable in non-embedded code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod check;
mod flash;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Cross-compilation target of the firmware image.
pub const TARGET: &str = "armv7a-none-eabi";

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "SAMA5D2 low-power demo development tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the firmware into SRAM0 and start it through SAM-BA
    Flash {
        /// Build and load the release version
        #[arg(short, long)]
        release: bool,
        /// SAM-BA connection (`serial`, `serial:ttyACM0`, `j-link`, ...)
        #[arg(long, default_value = "serial")]
        port: String,
    },
    /// Check the firmware and platform build for the hardware target, then lint
    Check,
    /// Run all host tests (unit, integration, doc)
    Test {
        /// Run only unit tests
        #[arg(long)]
        unit: bool,
        /// Run only integration tests
        #[arg(long)]
        integration: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Flash { release, port } => flash::run(release, &port),
        Commands::Check => check::run(),
        Commands::Test { unit, integration } => test::run(unit, integration),
    }
}
