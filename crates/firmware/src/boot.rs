//! Reset path for the SRAM image.
//!
//! The ROM code (or SAM-BA) loads the image at `0x0020_0000` and jumps to
//! its first word. Start-up order:
//!   1. Mask IRQ and FIQ; they stay masked for the whole run
//!   2. Point VBAR at the vector table
//!   3. Abort/undefined stacks, then the SVC stack
//!   4. Zero `.bss` (`.data` is loaded in place)
//!   5. Jump to `main`
//!
//! # Safety
//! Runs before any Rust code; nothing here may touch the stack until step 3.

use core::arch::global_asm;

global_asm!(
    r#"
    .section .vectors, "ax"
    .arm
    .global _vectors
_vectors:
    ldr pc, =_reset
    ldr pc, =_undefined_entry
    ldr pc, =_undefined_entry
    ldr pc, =_prefetch_abort_entry
    ldr pc, =_data_abort_entry
    nop
    ldr pc, =_spurious_irq
    ldr pc, =_spurious_irq
    .ltorg

    .section .text._reset, "ax"
    .arm
    .global _reset
_reset:
    cpsid if
    ldr r0, =_vectors
    mcr p15, 0, r0, c12, c0, 0
    isb

    cps #0x17
    ldr sp, =_abort_stack_top
    cps #0x1B
    ldr sp, =_abort_stack_top
    cps #0x13
    ldr sp, =_stack_top

    ldr r0, =__sbss
    ldr r1, =__ebss
    mov r2, #0
1:
    cmp r0, r1
    strlo r2, [r0], #4
    blo 1b

    bl main
2:
    wfi
    b 2b

_undefined_entry:
    mov r0, lr
    b UndefinedInstruction

_prefetch_abort_entry:
    mov r0, lr
    b PrefetchAbort

_data_abort_entry:
    mov r0, lr
    b DataAbort

_spurious_irq:
    subs pc, lr, #4
    .ltorg
"#
);

/// `critical-section` implementation: the IRQ mask bit of CPSR.
struct CpsrCriticalSection;

critical_section::set_impl!(CpsrCriticalSection);

const CPSR_I: u32 = 1 << 7;

// SAFETY: single core; masking IRQ in CPSR excludes every other context
// that could run on it. FIQ is never unmasked.
unsafe impl critical_section::Impl for CpsrCriticalSection {
    unsafe fn acquire() -> critical_section::RawRestoreState {
        let cpsr: u32;
        // SAFETY: reads CPSR and sets the I bit; no memory is touched.
        unsafe {
            core::arch::asm!("mrs {}, cpsr", "cpsid i", out(reg) cpsr, options(nomem, nostack));
        }
        cpsr
    }

    unsafe fn release(cpsr: critical_section::RawRestoreState) {
        if cpsr & CPSR_I == 0 {
            // SAFETY: IRQs were enabled when the section was entered.
            unsafe { core::arch::asm!("cpsie i", options(nomem, nostack)) }
        }
    }
}
