//! ARMv7-A exception and panic handlers.
//!
//! The vector table in [`crate::boot`] routes undefined instructions and
//! aborts here with the faulting return address in `r0`. Each handler logs
//! the fault over RTT and halts the core in `WFI`. There is no recovery: a
//! fault usually means the clock tree or the DDR was left half-configured.
//!
//! IRQ and FIQ stay masked for the whole run, so their vectors just return.

#![allow(clippy::doc_markdown)]
#![allow(non_snake_case)] // symbol names referenced from the vector table

fn halt() -> ! {
    loop {
        // SAFETY: WFI only suspends the core.
        unsafe { core::arch::asm!("wfi", options(nomem, nostack, preserves_flags)) }
    }
}

/// Data fault status and address (`DFSR`, `DFAR`).
fn data_fault_registers() -> (u32, u32) {
    let dfsr: u32;
    let dfar: u32;
    // SAFETY: CP15 reads with no side effects.
    unsafe {
        core::arch::asm!(
            "mrc p15, 0, {0}, c5, c0, 0",
            "mrc p15, 0, {1}, c6, c0, 0",
            out(reg) dfsr,
            out(reg) dfar,
            options(nomem, nostack, preserves_flags),
        );
    }
    (dfsr, dfar)
}

/// Undefined instruction (also taken for SVC, which nothing issues).
#[no_mangle]
extern "C" fn UndefinedInstruction(lr: u32) -> ! {
    defmt::error!("undefined instruction near 0x{=u32:08X}", lr);
    halt()
}

/// Instruction fetch abort.
#[no_mangle]
extern "C" fn PrefetchAbort(lr: u32) -> ! {
    defmt::error!("prefetch abort near 0x{=u32:08X}", lr);
    halt()
}

/// Data abort. Accessing the DDR window before `A` or while in self-refresh
/// ends up here.
#[no_mangle]
extern "C" fn DataAbort(lr: u32) -> ! {
    let (dfsr, dfar) = data_fault_registers();
    defmt::error!(
        "data abort at 0x{=u32:08X} (DFSR 0x{=u32:08X}), PC near 0x{=u32:08X}",
        dfar,
        dfsr,
        lr
    );
    halt()
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    defmt::error!("{}", defmt::Display2Format(info));
    halt()
}

#[defmt::panic_handler]
fn defmt_panic() -> ! {
    halt()
}
