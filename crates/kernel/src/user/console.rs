//! Interactive console
//!
//! The program PCB 0 boots into. Output goes through the write supervisor
//! call; input is polled straight off the UART receive FIFO, yielding the
//! CPU between polls, because reading descriptor 0 deliberately returns
//! nothing.

use heapless::Vec;

use super::fmt;
use super::philosophers;
use super::syscall;

const LINE_LEN: usize = 64;

pub extern "C" fn console_main() -> ! {
    syscall::write(1, b"\nconsole ready\n");
    loop {
        syscall::write(1, b"$ ");
        let line = read_line();
        if let Ok(text) = core::str::from_utf8(&line) {
            run_command(text);
        }
    }
}

/// Polled line input with echo and rubout handling.
fn read_line() -> Vec<u8, LINE_LEN> {
    let mut line = Vec::new();
    loop {
        let Some(byte) = crate::uart::getc() else {
            syscall::yield_now();
            continue;
        };
        match byte {
            b'\r' | b'\n' => {
                syscall::write(1, b"\n");
                return line;
            }
            0x08 | 0x7f => {
                if line.pop().is_some() {
                    syscall::write(1, b"\x08 \x08");
                }
            }
            byte if (0x20..0x7f).contains(&byte) => {
                if line.push(byte).is_ok() {
                    syscall::write(1, &[byte]);
                }
            }
            _ => {}
        }
    }
}

fn run_command(line: &str) {
    let mut words = line.split_whitespace();
    match words.next() {
        None => {}
        Some("philosophers") => launch(philosophers::philosophers_main),
        Some("kill") => match words.next().and_then(fmt::atoi) {
            Some(pid) => {
                syscall::kill(pid, 0);
            }
            None => usage(),
        },
        Some("nice") => {
            let pid = words.next().and_then(fmt::atoi);
            let value = words.next().and_then(fmt::atoi);
            match (pid, value) {
                (Some(pid), Some(value)) => {
                    syscall::nice(pid, value);
                }
                _ => usage(),
            }
        }
        Some("help") => usage(),
        Some(_) => {
            syscall::write(1, b"unknown command\n");
            usage();
        }
    }
}

fn usage() {
    syscall::write(1, b"commands: philosophers | kill <pid> | nice <pid> <value> | help\n");
}

/// Fork and exec a program, reporting the child pid.
fn launch(entry: extern "C" fn() -> !) {
    match syscall::fork() {
        0 => syscall::exec(entry),
        -1 => {
            syscall::write(1, b"launch failed\n");
        }
        pid => {
            let mut digits = [0u8; 12];
            let mut message: Vec<u8, 32> = Vec::new();
            let _ = message.extend_from_slice(b"started pid ");
            let _ = message.extend_from_slice(fmt::itoa(pid as i32, &mut digits));
            let _ = message.push(b'\n');
            syscall::write(1, &message);
        }
    }
}
