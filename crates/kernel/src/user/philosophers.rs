//! Dining philosophers over pipes
//!
//! Each chopstick is a pipe holding a single token byte; picking one up is
//! reading the token, putting it down is writing it back. Reads never
//! block, so a philosopher whose chopstick is taken just yields and tries
//! again. The last seat reaches for its chopsticks in the opposite order,
//! which breaks the circular wait.

use heapless::Vec;

use super::fmt;
use super::syscall;

pub const PHILOSOPHERS: usize = 5;

pub extern "C" fn philosophers_main() -> ! {
    // Lay the table: one pipe per chopstick, one token on each
    let mut chopsticks = [[0i32; 2]; PHILOSOPHERS];
    for chopstick in chopsticks.iter_mut() {
        if syscall::pipe(chopstick) < 0 {
            syscall::write(1, b"philosophers: no pipes\n");
            syscall::exit(1);
        }
        syscall::write(chopstick[1], b"*");
    }

    // Seat the philosophers; the children inherit every chopstick fd
    let mut seat = None;
    for index in 0..PHILOSOPHERS {
        match syscall::fork() {
            0 => {
                seat = Some(index);
                break;
            }
            -1 => {
                syscall::write(1, b"philosophers: fork failed\n");
                syscall::exit(1);
            }
            _ => {}
        }
    }

    match seat {
        Some(index) => dine(index, &chopsticks),
        // The table keeps its descriptors (and so the pipes) alive
        None => loop {
            syscall::yield_now();
        },
    }
}

fn dine(seat: usize, chopsticks: &[[i32; 2]; PHILOSOPHERS]) -> ! {
    let left = chopsticks[seat];
    let right = chopsticks[(seat + 1) % PHILOSOPHERS];
    let (first, second) = if seat == PHILOSOPHERS - 1 {
        (right, left)
    } else {
        (left, right)
    };

    loop {
        take(first[0]);
        take(second[0]);

        announce(seat);

        syscall::write(first[1], b"*");
        syscall::write(second[1], b"*");
        syscall::yield_now();
    }
}

/// Spin on the chopstick's pipe until its token turns up.
fn take(fd: i32) {
    let mut token = [0u8; 1];
    while syscall::read(fd, &mut token) == 0 {
        syscall::yield_now();
    }
}

fn announce(seat: usize) {
    let mut digits = [0u8; 12];
    let mut message: Vec<u8, 32> = Vec::new();
    let _ = message.extend_from_slice(b"philosopher ");
    let _ = message.extend_from_slice(fmt::itoa(seat as i32, &mut digits));
    let _ = message.extend_from_slice(b" eats\n");
    syscall::write(1, &message);
}
