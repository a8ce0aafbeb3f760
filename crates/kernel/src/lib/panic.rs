// Kernel panic handling
//
// A panic inside a handler means corrupted kernel state; print what we know
// and park the core. Hosted builds use the host runtime's panic machinery.

#[cfg(target_os = "none")]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    crate::error!("kernel panic: {}", info);
    loop {
        crate::arch::armv7::wait_for_interrupt();
    }
}
