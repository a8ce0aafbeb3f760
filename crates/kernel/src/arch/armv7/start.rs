//! Start-up and trap shim
//!
//! Materialises the context record the Rust handlers consume. Each entry
//! point carves a 68-byte frame on its mode stack laid out exactly like
//! [`Context`](super::Context): cpsr, pc, r0-r12, then the banked user
//! sp/lr. `_ctx_restore` reverses the store and drops to user mode with
//! `movs pc, lr`, so a handler that rewrote the record dispatches a
//! different process.
//!
//! IRQs stay masked for the whole handler body: the core masks them on
//! exception entry and they come back only with the restored user cpsr.

core::arch::global_asm!(
    r#"
    .section .text.startup
    .arm

    .global _start
_start:
    ldr   r0, =_vectors
    mcr   p15, 0, r0, c12, c0, 0    @ VBAR

    cps   #0x12                     @ IRQ mode stack
    ldr   sp, =_irq_stack_top
    cps   #0x13                     @ SVC mode stack
    ldr   sp, =_svc_stack_top

    ldr   r0, =__bss_start          @ zero .bss
    ldr   r1, =__bss_end
    mov   r2, #0
1:  cmp   r0, r1
    bge   2f
    str   r2, [r0], #4
    b     1b
2:
    sub   sp, sp, #68               @ scratch context record for reset
    mov   r0, sp
    bl    kernel_reset
    b     _ctx_restore

    .align 5
_vectors:
    b     _start                    @ reset
    b     .                         @ undefined instruction
    b     _svc_entry                @ supervisor call
    b     .                         @ prefetch abort
    b     .                         @ data abort
    b     .                         @ reserved
    b     _irq_entry                @ irq
    b     .                         @ fiq

_svc_entry:
    sub   sp, sp, #68
    str   lr, [sp, #4]              @ pc (lr_svc points past the svc)
    mrs   lr, spsr
    str   lr, [sp, #0]              @ cpsr
    add   lr, sp, #8
    stmia lr, {{r0-r12}}            @ gpr
    add   r0, sp, #60
    stmia r0, {{sp, lr}}^           @ banked user sp/lr
    nop
    mov   r0, sp
    bl    kernel_svc
    b     _ctx_restore

_irq_entry:
    sub   lr, lr, #4                @ lr_irq points one past the return point
    sub   sp, sp, #68
    str   lr, [sp, #4]
    mrs   lr, spsr
    str   lr, [sp, #0]
    add   lr, sp, #8
    stmia lr, {{r0-r12}}
    add   r0, sp, #60
    stmia r0, {{sp, lr}}^
    nop
    mov   r0, sp
    bl    kernel_irq

_ctx_restore:
    add   r0, sp, #60
    ldmia r0, {{sp, lr}}^           @ banked user sp/lr
    nop
    ldr   lr, [sp, #0]
    msr   spsr_cxsf, lr
    ldr   lr, [sp, #4]
    str   lr, [sp, #64]             @ park return pc in the consumed lr slot
    add   sp, sp, #8
    ldmia sp!, {{r0-r12}}
    add   sp, sp, #4
    ldmia sp!, {{lr}}
    movs  pc, lr                    @ cpsr <- spsr, enter the process

    .ltorg
"#
);
