//! ARM PL011 UART driver
//!
//! Byte sink and non-blocking byte source for UART0 on the RealView
//! Platform Baseboard as emulated by QEMU. All kernel diagnostics and the
//! scheduler trace stream leave through here.
//!
//! Hosted builds swap the register block for a thread-local capture buffer so
//! tests can assert on the exact byte stream.

#[cfg(target_os = "none")]
use core::ptr;

/// UART0 register block
#[cfg(target_os = "none")]
const UART0_BASE: usize = 0x1000_9000;

#[cfg(target_os = "none")]
const UARTDR: usize = UART0_BASE + 0x000; // Data Register
#[cfg(target_os = "none")]
const UARTFR: usize = UART0_BASE + 0x018; // Flag Register
#[cfg(target_os = "none")]
const UARTIBRD: usize = UART0_BASE + 0x024; // Integer Baud Rate Divisor
#[cfg(target_os = "none")]
const UARTFBRD: usize = UART0_BASE + 0x028; // Fractional Baud Rate Divisor
#[cfg(target_os = "none")]
const UARTLCR_H: usize = UART0_BASE + 0x02C; // Line Control Register
#[cfg(target_os = "none")]
const UARTCR: usize = UART0_BASE + 0x030; // Control Register

/// Flag Register bits
#[cfg(target_os = "none")]
const FR_TXFF: u32 = 1 << 5; // Transmit FIFO Full
#[cfg(target_os = "none")]
const FR_RXFE: u32 = 1 << 4; // Receive FIFO Empty

/// Control Register bits
#[cfg(target_os = "none")]
const CR_RXE: u32 = 1 << 9; // Receive Enable
#[cfg(target_os = "none")]
const CR_TXE: u32 = 1 << 8; // Transmit Enable
#[cfg(target_os = "none")]
const CR_UARTEN: u32 = 1 << 0; // UART Enable

/// Line Control Register bits
#[cfg(target_os = "none")]
const LCR_H_WLEN_8: u32 = 3 << 5; // Word Length 8 bits
#[cfg(target_os = "none")]
const LCR_H_FEN: u32 = 1 << 4; // Enable FIFOs

/// Reference clock feeding UART0 on the board
#[cfg(target_os = "none")]
const UART_CLOCK_HZ: u32 = 24_000_000;

/// Initialize UART0: 115200 8N1, FIFOs on.
///
/// # Safety
/// Touches the UART register block; call once, before interrupts are live.
#[cfg(target_os = "none")]
pub unsafe fn init() {
    // Disable while reprogramming
    ptr::write_volatile(UARTCR as *mut u32, 0);

    // Baud rate divisor = UARTCLK / (16 * baud_rate), fractional part in
    // 1/64ths
    let baud: u32 = 115_200;
    let div_times_64: u32 =
        (UART_CLOCK_HZ / (16 * baud)) * 64 + ((UART_CLOCK_HZ % (16 * baud)) * 64) / (16 * baud);
    ptr::write_volatile(UARTIBRD as *mut u32, (div_times_64 / 64).max(1));
    ptr::write_volatile(UARTFBRD as *mut u32, div_times_64 % 64);

    ptr::write_volatile(UARTLCR_H as *mut u32, LCR_H_WLEN_8 | LCR_H_FEN);
    ptr::write_volatile(UARTCR as *mut u32, CR_UARTEN | CR_TXE | CR_RXE);
}

/// Blocking single-byte transmit.
#[cfg(target_os = "none")]
pub fn putc(byte: u8) {
    unsafe {
        while ptr::read_volatile(UARTFR as *const u32) & FR_TXFF != 0 {
            core::hint::spin_loop();
        }
        ptr::write_volatile(UARTDR as *mut u32, byte as u32);
    }
}

/// Non-blocking single-byte receive; None when the FIFO is empty.
#[cfg(target_os = "none")]
pub fn getc() -> Option<u8> {
    unsafe {
        if ptr::read_volatile(UARTFR as *const u32) & FR_RXFE != 0 {
            return None;
        }
        Some((ptr::read_volatile(UARTDR as *const u32) & 0xFF) as u8)
    }
}

/// Transmit a byte slice in order.
pub fn puts(bytes: &[u8]) {
    for &byte in bytes {
        putc(byte);
    }
}

#[cfg(not(target_os = "none"))]
pub fn putc(byte: u8) {
    capture::push(byte);
}

#[cfg(not(target_os = "none"))]
pub fn getc() -> Option<u8> {
    None
}

/// Hosted UART sink. Thread-local so concurrently running tests each see
/// their own byte stream.
#[cfg(not(target_os = "none"))]
pub mod capture {
    use std::cell::RefCell;

    std::thread_local! {
        static SINK: RefCell<Vec<u8>> = const { RefCell::new(Vec::new()) };
    }

    pub(super) fn push(byte: u8) {
        SINK.with(|sink| sink.borrow_mut().push(byte));
    }

    /// Drain and return everything emitted on this thread so far.
    pub fn take() -> Vec<u8> {
        SINK.with(|sink| core::mem::take(&mut *sink.borrow_mut()))
    }

    /// Drained output as a lossy string, for assertions on the trace stream.
    pub fn take_string() -> String {
        String::from_utf8_lossy(&take()).into_owned()
    }
}
