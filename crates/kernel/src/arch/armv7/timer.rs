//! ARM SP804 dual-timer: the preemption tick
//!
//! Timer1 of the first block runs in 32-bit periodic mode with its interrupt
//! enabled; each wrap of the load value raises interrupt 36 and drives one
//! scheduling decision.

use core::ptr;

/// Timer0/1 register block; Timer1 is the first timer in the block.
const TIMER0_BASE: usize = 0x1001_1000;

const TIMER1_LOAD: usize = TIMER0_BASE + 0x000;
const TIMER1_CTRL: usize = TIMER0_BASE + 0x008;
const TIMER1_INTCLR: usize = TIMER0_BASE + 0x00C;

/// Reload value: ~1s of ticks at the board's reference clock.
pub const TICK_RELOAD: u32 = 0x0010_0000;

bitflags::bitflags! {
    /// Timer1Ctrl fields
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TimerCtrl: u32 {
        const ONESHOT    = 1 << 0;
        const SIZE_32BIT = 1 << 1;
        const INT_ENABLE = 1 << 5;
        const PERIODIC   = 1 << 6;
        const ENABLE     = 1 << 7;
    }
}

/// Program the tick: periodic 32-bit counter, interrupt on wrap.
pub fn init_periodic(reload: u32) {
    let ctrl = TimerCtrl::SIZE_32BIT | TimerCtrl::INT_ENABLE | TimerCtrl::PERIODIC | TimerCtrl::ENABLE;
    unsafe {
        ptr::write_volatile(TIMER1_LOAD as *mut u32, reload);
        ptr::write_volatile(TIMER1_CTRL as *mut u32, ctrl.bits());
    }
}

/// Drop the pending interrupt; the periodic reload continues on its own.
pub fn clear_interrupt() {
    unsafe {
        ptr::write_volatile(TIMER1_INTCLR as *mut u32, 1);
    }
}
