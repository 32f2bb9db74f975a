use anyhow::{Context, Result};
use colored::Colorize;
use platform::config::{SRAM0_ADDR, SRAM0_SIZE_BYTES};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use crate::TARGET;

pub fn run(release: bool, port: &str) -> Result<()> {
    let mode = if release { "release" } else { "debug" };

    println!();
    println!(
        "{}",
        format!("🔨 Building firmware ({} mode)...", mode)
            .cyan()
            .bold()
    );
    println!();

    // Build firmware for the SAMA5D2 target
    let build_start = Instant::now();
    let mut build_cmd = Command::new("cargo");
    build_cmd
        .arg("build")
        .arg("-p")
        .arg("low-power-firmware")
        .arg("--target")
        .arg(TARGET)
        .arg("--features")
        .arg("hardware");

    if release {
        build_cmd.arg("--release");
    }

    let build_output = build_cmd.output().context("Failed to run cargo build")?;

    if !build_output.status.success() {
        eprintln!("{}", "✗ Build failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&build_output.stderr));
        anyhow::bail!("Build failed");
    }

    println!(
        "{}",
        format!(
            "✓ Build successful in {:.2}s",
            build_start.elapsed().as_secs_f64()
        )
        .green()
    );
    println!();

    // SAM-BA loads a raw image, not an ELF
    let elf = elf_path(mode);
    let bin = elf.with_extension("bin");
    let objcopy = Command::new("rust-objcopy")
        .arg("-O")
        .arg("binary")
        .arg(&elf)
        .arg(&bin)
        .output()
        .context("Failed to run rust-objcopy. Is cargo-binutils installed? (cargo install cargo-binutils)")?;
    if !objcopy.status.success() {
        eprintln!("{}", String::from_utf8_lossy(&objcopy.stderr));
        anyhow::bail!("objcopy failed");
    }

    let size = std::fs::metadata(&bin)
        .with_context(|| format!("Cannot stat {}", bin.display()))?
        .len();
    check_fits_sram(size)?;
    println!(
        "{}",
        format!(
            "📊 Image: {} bytes of {} KiB SRAM0",
            size,
            SRAM0_SIZE_BYTES / 1024
        )
        .cyan()
    );
    println!();

    // Load and start with SAM-BA
    println!("{}", "📡 Loading into SRAM0 via SAM-BA...".cyan().bold());
    println!("   {}", format!("Port: {port}").dimmed());

    let flash_start = Instant::now();
    let flash_output = Command::new("sam-ba")
        .args(sam_ba_args(port, &bin))
        .output()
        .context("Failed to run sam-ba. Is SAM-BA 3.x on PATH?")?;

    if !flash_output.status.success() {
        eprintln!("{}", "✗ Load failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&flash_output.stderr));
        anyhow::bail!("Load failed - check that the board is in SAM-BA monitor mode (BOOT_DIS open, reset)");
    }

    println!(
        "{}",
        format!(
            "✓ Loaded in {:.2}s",
            flash_start.elapsed().as_secs_f64()
        )
        .green()
    );
    println!();
    println!("{}", "🔋 Low-power demo is running; open the console at 115200 8N1".bold());
    println!(
        "   {}",
        "Attach a J-Link RTT viewer to read defmt logs".dimmed()
    );
    println!();

    Ok(())
}

fn elf_path(mode: &str) -> PathBuf {
    Path::new("target").join(TARGET).join(mode).join("firmware")
}

fn check_fits_sram(size: u64) -> Result<()> {
    if size > u64::from(SRAM0_SIZE_BYTES) {
        anyhow::bail!(
            "Image is {} bytes but SRAM0 holds {} bytes; build with --release",
            size,
            SRAM0_SIZE_BYTES
        );
    }
    Ok(())
}

fn sam_ba_args(port: &str, bin: &Path) -> Vec<String> {
    let load = format!("0x{SRAM0_ADDR:08x}");
    vec![
        "-p".to_string(),
        port.to_string(),
        "-d".to_string(),
        "sama5d2".to_string(),
        "-m".to_string(),
        format!("write:{}:{load}", bin.display()),
        "-m".to_string(),
        format!("execute:{load}"),
    ]
}
