#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

// Required for heap allocation (pipe buffers, stack arena)
extern crate alloc;

// Core library (error handling, logging, panic plumbing)
#[allow(special_module_name)]
pub mod lib;
// PL011 UART driver module
pub mod uart;
// Heap allocator module
pub mod heap;
// Architecture support (context record, GIC, SP804 timer, trap shim)
pub mod arch;
// Bounded byte FIFO backing anonymous pipes
pub mod pipe;
// Open-file table and per-process descriptor tables
pub mod fd;
// Process control blocks and life-cycle (fork/exec/exit/kill/nice)
pub mod process;
// Tick-driven scheduler and context dispatch
pub mod sched;
// Kernel state owner and boot sequence
pub mod kernel;
// Supervisor-call decoding and dispatch
pub mod syscall;
// User-mode library and programs (console, philosophers)
pub mod user;

#[cfg(target_os = "none")]
use arch::Context;

/// Reset handler. Entered once from the start-up shim with IRQs masked and a
/// scratch context record on the supervisor stack; when it returns the shim
/// restores that record and drops into user mode.
#[cfg(target_os = "none")]
#[no_mangle]
pub extern "C" fn kernel_reset(ctx: &mut Context) {
    unsafe {
        uart::init();
        heap::init();
    }

    arch::armv7::timer::init_periodic(arch::armv7::timer::TICK_RELOAD);
    arch::armv7::gic::init();

    kernel::KERNEL
        .lock()
        .boot(ctx, user::console::console_main as usize);

    arch::armv7::irq_unmask();
}

/// IRQ handler. The only wired source is the SP804 tick, which drives
/// preemption; anything else is acknowledged and dropped.
#[cfg(target_os = "none")]
#[no_mangle]
pub extern "C" fn kernel_irq(ctx: &mut Context) {
    let id = arch::armv7::gic::ack();

    if id == arch::armv7::gic::IRQ_TIMER01 {
        arch::armv7::timer::clear_interrupt();
        kernel::KERNEL.lock().schedule(ctx);
    }

    arch::armv7::gic::eoi(id);
}

/// Supervisor-call handler. The immediate operand selects the service; the
/// argument registers travel in the saved context record.
#[cfg(target_os = "none")]
#[no_mangle]
pub extern "C" fn kernel_svc(ctx: &mut Context) {
    let imm = arch::armv7::svc_immediate(ctx);
    kernel::KERNEL.lock().handle_svc(imm, ctx);
}

// Hosted builds compile the same kernel sources against the host target so
// the core stays architecture-independent and unit-testable.
#[cfg(not(target_os = "none"))]
fn main() {}
