//! Supervisor-call interface
//!
//! The trap shim hands over the SVC immediate and the saved context; the
//! immediate picks the service and r0-r3 carry the arguments. Decoding
//! turns that raw register state into a typed [`Syscall`] before any
//! handler code runs; the result, where one exists, is written back into
//! `gpr[0]`. An unknown immediate is a silent no-op.
//!
//! With no memory protection, user buffers arrive as raw addresses into the
//! flat address space; the kernel trusts them after a null check.

use alloc::sync::Arc;
use spin::Mutex;

use crate::arch::Context;
use crate::fd::OpenFlags;
use crate::kernel::Kernel;
use crate::lib::error::{KernelError, Result};
use crate::pipe::Pipe;
use crate::uart;

pub const SYS_YIELD: u32 = 0x00;
pub const SYS_WRITE: u32 = 0x01;
pub const SYS_READ: u32 = 0x02;
pub const SYS_FORK: u32 = 0x03;
pub const SYS_EXIT: u32 = 0x04;
pub const SYS_EXEC: u32 = 0x05;
pub const SYS_KILL: u32 = 0x06;
pub const SYS_NICE: u32 = 0x07;
pub const SYS_PIPE: u32 = 0x08;
pub const SYS_CLOSE: u32 = 0x09;

/// A decoded supervisor call with typed arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Yield,
    Write { fd: i32, buf: usize, len: usize },
    Read { fd: i32, buf: usize, len: usize },
    Fork,
    Exit { status: i32 },
    Exec { entry: usize },
    Kill { pid: i32, signal: i32 },
    Nice { pid: i32, value: i32 },
    Pipe { out: usize },
    Close { fd: i32 },
}

impl Syscall {
    /// Lift immediate + argument registers into a call; None for operands
    /// the kernel does not know.
    pub fn decode(imm: u32, ctx: &Context) -> Option<Self> {
        let arg = |idx: usize| ctx.gpr[idx];
        Some(match imm {
            SYS_YIELD => Syscall::Yield,
            SYS_WRITE => Syscall::Write {
                fd: arg(0) as i32,
                buf: arg(1),
                len: arg(2),
            },
            SYS_READ => Syscall::Read {
                fd: arg(0) as i32,
                buf: arg(1),
                len: arg(2),
            },
            SYS_FORK => Syscall::Fork,
            SYS_EXIT => Syscall::Exit {
                status: arg(0) as i32,
            },
            SYS_EXEC => Syscall::Exec { entry: arg(0) },
            SYS_KILL => Syscall::Kill {
                pid: arg(0) as i32,
                signal: arg(1) as i32,
            },
            SYS_NICE => Syscall::Nice {
                pid: arg(0) as i32,
                value: arg(1) as i32,
            },
            SYS_PIPE => Syscall::Pipe { out: arg(0) },
            SYS_CLOSE => Syscall::Close { fd: arg(0) as i32 },
            _ => return None,
        })
    }
}

/// Borrow `len` user bytes at `buf`.
fn user_bytes<'a>(buf: usize, len: usize) -> Result<&'a [u8]> {
    if buf == 0 {
        return Err(KernelError::BadAddress);
    }
    Ok(unsafe { core::slice::from_raw_parts(buf as *const u8, len) })
}

fn user_bytes_mut<'a>(buf: usize, len: usize) -> Result<&'a mut [u8]> {
    if buf == 0 {
        return Err(KernelError::BadAddress);
    }
    Ok(unsafe { core::slice::from_raw_parts_mut(buf as *mut u8, len) })
}

impl Kernel {
    /// Dispatch one supervisor call against the saved context.
    pub fn handle_svc(&mut self, imm: u32, ctx: &mut Context) {
        let Some(call) = Syscall::decode(imm, ctx) else {
            // Unknown operand: silent no-op
            return;
        };

        match call {
            Syscall::Yield => self.schedule(ctx),
            Syscall::Write { fd, buf, len } => {
                ctx.gpr[0] = self.sys_write(fd, buf, len) as usize;
            }
            Syscall::Read { fd, buf, len } => {
                ctx.gpr[0] = self.sys_read(fd, buf, len) as usize;
            }
            Syscall::Fork => {
                ctx.gpr[0] = self.sys_fork(&*ctx) as usize;
            }
            Syscall::Exit { status } => self.sys_exit(ctx, status),
            Syscall::Exec { entry } => self.sys_exec(ctx, entry),
            Syscall::Kill { pid, signal } => {
                ctx.gpr[0] = self.sys_kill(pid, signal) as usize;
            }
            Syscall::Nice { pid, value } => {
                ctx.gpr[0] = self.sys_nice(pid, value) as usize;
            }
            Syscall::Pipe { out } => {
                ctx.gpr[0] = self.sys_pipe(out) as usize;
            }
            Syscall::Close { fd } => {
                ctx.gpr[0] = self.sys_close(fd) as usize;
            }
        }

        #[cfg(debug_assertions)]
        self.check_invariants();
    }

    /// Write policy by descriptor: stdin swallows, stdout is the UART,
    /// stderr is reserved and refuses, anything above is a pipe enqueue
    /// with a short count on full.
    fn sys_write(&mut self, fd: i32, buf: usize, len: usize) -> isize {
        match fd {
            fd if fd < 0 => {
                crate::warn!("write: negative descriptor {}", fd);
                -1
            }
            0 => 0,
            1 => match user_bytes(buf, len) {
                Ok(bytes) => {
                    uart::puts(bytes);
                    len as isize
                }
                Err(err) => {
                    crate::warn!("write: {}", err.as_str());
                    -1
                }
            },
            2 => {
                uart::puts(b"write error");
                -1
            }
            fd => {
                let Some(pipe) = self.open_files.pipe(fd) else {
                    crate::warn!("write: {} {}", KernelError::BadDescriptor.as_str(), fd);
                    return -1;
                };
                match user_bytes(buf, len) {
                    Ok(bytes) => pipe.lock().write(bytes) as isize,
                    Err(err) => {
                        crate::warn!("write: {}", err.as_str());
                        -1
                    }
                }
            }
        }
    }

    /// Read policy, symmetric to write. Reads never block: an empty pipe is
    /// a zero count and the caller is expected to yield.
    fn sys_read(&mut self, fd: i32, buf: usize, len: usize) -> isize {
        match fd {
            fd if fd < 0 => {
                crate::warn!("read: negative descriptor {}", fd);
                -1
            }
            0 | 1 => {
                crate::warn!("read: unsupported descriptor {}", fd);
                0
            }
            2 => {
                uart::puts(b"read error");
                -1
            }
            fd => {
                let Some(pipe) = self.open_files.pipe(fd) else {
                    crate::warn!("read: {} {}", KernelError::BadDescriptor.as_str(), fd);
                    return -1;
                };
                match user_bytes_mut(buf, len) {
                    Ok(bytes) => pipe.lock().read(bytes) as isize,
                    Err(err) => {
                        crate::warn!("read: {}", err.as_str());
                        -1
                    }
                }
            }
        }
    }

    /// Allocate a pipe and its two descriptors, read end first, and store
    /// the pair through `out`. Either open failing unwinds the other so a
    /// refused pipe leaves no trace.
    fn sys_pipe(&mut self, out: usize) -> isize {
        let Some(pid) = self.executing else {
            return -1;
        };
        if out == 0 {
            crate::warn!("pipe: {}", KernelError::BadAddress.as_str());
            return -1;
        }

        let pipe: Arc<Mutex<Pipe>> = Arc::new(Mutex::new(Pipe::new()));
        let fd_read = match self.open_fd(pid, pipe.clone(), OpenFlags::RDONLY) {
            Ok(fd) => fd,
            Err(err) => {
                crate::warn!("pipe: {}", err.as_str());
                return -1;
            }
        };
        let fd_write = match self.open_fd(pid, pipe, OpenFlags::WRONLY) {
            Ok(fd) => fd,
            Err(err) => {
                let _ = self.close_fd(pid, fd_read);
                crate::warn!("pipe: {}", err.as_str());
                return -1;
            }
        };

        unsafe {
            let fds = out as *mut i32;
            fds.write(fd_read);
            fds.add(1).write(fd_write);
        }
        0
    }

    /// Close a descriptor of the calling process.
    fn sys_close(&mut self, fd: i32) -> isize {
        let Some(pid) = self.executing else {
            return -1;
        };
        match self.close_fd(pid, fd) {
            Ok(()) => 0,
            Err(err) => {
                crate::warn!("close: {} {}", err.as_str(), fd);
                -1
            }
        }
    }
}
