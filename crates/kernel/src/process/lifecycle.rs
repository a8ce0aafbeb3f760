//! Process life-cycle: fork, exec, exit, kill, nice
//!
//! Each handler announces itself with a single trace letter before touching
//! the tables, mirroring the scheduler's switch records on the UART.

use crate::arch::Context;
use crate::kernel::Kernel;
use crate::lib::error::{KernelError, Result};
use crate::process::{clamp_niceness, ProcStatus, MAX_PROCS};
use crate::uart;

impl Kernel {
    /// Slot for a new child: the lowest TERMINATED slot above 0, or the
    /// next never-used one. Slot 0 belongs to the console forever.
    fn alloc_proc_slot(&self) -> Result<usize> {
        if self.current_processes >= MAX_PROCS {
            return Err(KernelError::NoProcessSlot);
        }
        Ok((1..MAX_PROCS)
            .find(|&idx| self.proc_tab[idx].status == ProcStatus::Terminated)
            .unwrap_or(self.current_processes))
    }

    /// Duplicate the calling process: context, live stack image, descriptor
    /// table and niceness. The parent's return value is the child pid; the
    /// child wakes up from the same trap seeing 0.
    pub fn sys_fork(&mut self, ctx: &Context) -> isize {
        uart::putc(b'F');

        let Some(parent) = self.executing else {
            return -1;
        };
        let child = match self.alloc_proc_slot() {
            Ok(idx) => idx,
            Err(err) => {
                crate::warn!("fork: {}", err.as_str());
                return -1;
            }
        };
        self.current_processes += 1;

        let parent_tos = self.proc_tab[parent].tos;
        let parent_niceness = self.proc_tab[parent].niceness;
        let child_tos = self.stacks.tos(child);
        // Same stack depth in the child's own region
        let used = parent_tos - ctx.sp;

        let pcb = &mut self.proc_tab[child];
        pcb.reset(child, child_tos);
        pcb.ctx = *ctx;
        pcb.ctx.sp = child_tos - used;
        pcb.ctx.gpr[0] = 0;
        pcb.niceness = parent_niceness;
        pcb.status = ProcStatus::Ready;

        self.stacks.copy_image(parent_tos, child_tos, used);
        self.dup_fds(parent, child);

        child as isize
    }

    /// Replace the running program: jump to `entry` on a reset stack. The
    /// descriptor table and niceness survive the exec.
    pub fn sys_exec(&mut self, ctx: &mut Context, entry: usize) {
        uart::putc(b'E');

        let Some(idx) = self.executing else {
            return;
        };
        ctx.pc = entry;
        ctx.sp = self.proc_tab[idx].tos;
    }

    /// Terminate the calling process and hand the CPU to a successor
    /// immediately.
    pub fn sys_exit(&mut self, ctx: &mut Context, _status: i32) {
        uart::putc(b'X');

        if let Some(idx) = self.executing {
            self.terminate(idx);
        }
        self.schedule(ctx);
    }

    /// Unconditionally terminate `pid`. The signal argument is accepted for
    /// ABI shape only. The caller keeps the CPU; a victim that killed
    /// itself runs on until the next tick or yield takes it off.
    pub fn sys_kill(&mut self, pid: i32, _signal: i32) -> isize {
        uart::putc(b'K');

        if (0..MAX_PROCS as i32).contains(&pid) {
            self.terminate(pid as usize);
        }
        0
    }

    /// Set `pid`'s niceness to the clamped value and return what was
    /// stored.
    pub fn sys_nice(&mut self, pid: i32, value: i32) -> isize {
        uart::putc(b'N');

        let clamped = clamp_niceness(value);
        if (0..MAX_PROCS as i32).contains(&pid) {
            let idx = pid as usize;
            if self.proc_tab[idx].is_live() {
                self.proc_tab[idx].niceness = clamped;
            }
        }
        clamped as isize
    }

    /// Common tail of exit and kill: give back the descriptors, then the
    /// slot. Only live processes die, so a second kill of the same pid (or
    /// an exit after a self-kill) changes nothing.
    fn terminate(&mut self, idx: usize) {
        if !self.proc_tab[idx].is_live() {
            return;
        }
        self.close_all_fds(idx);
        self.proc_tab[idx].status = ProcStatus::Terminated;
        self.current_processes -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fd::{OpenFlags, FD_NONE};
    use crate::pipe::Pipe;
    use crate::process::{NICE_MAX, NICE_MIN};
    use crate::uart::capture;
    use alloc::sync::Arc;
    use proptest::prelude::*;
    use spin::Mutex;

    fn booted() -> (Kernel, Context) {
        let mut kernel = Kernel::new();
        let mut ctx = Context::zeroed();
        kernel.boot(&mut ctx, 0);
        capture::take();
        (kernel, ctx)
    }

    #[test]
    fn fork_duplicates_context_stack_and_descriptors() {
        let (mut kernel, mut ctx) = booted();

        let pipe = Arc::new(Mutex::new(Pipe::new()));
        let fd_r = kernel.open_fd(0, pipe.clone(), OpenFlags::RDONLY).unwrap();
        let fd_w = kernel.open_fd(0, pipe, OpenFlags::WRONLY).unwrap();

        // Push a recognisable stack image under the parent's sp
        ctx.sp -= 8;
        ctx.gpr[4] = 0x1234;
        let parent_tos = kernel.proc_tab[0].tos;
        kernel
            .stacks
            .stack_slice_mut(parent_tos, 8)
            .copy_from_slice(b"stackimg");

        let child_pid = kernel.sys_fork(&ctx);
        assert_eq!(child_pid, 1);
        kernel.check_invariants();

        let child = &kernel.proc_tab[1];
        assert_eq!(child.status, ProcStatus::Ready);
        // Child context matches the parent's except for sp and the fork
        // return value
        assert_eq!(child.ctx.gpr[0], 0);
        assert_eq!(child.ctx.gpr[4], 0x1234);
        assert_eq!(child.ctx.pc, ctx.pc);
        assert_eq!(child.tos - child.ctx.sp, parent_tos - ctx.sp);
        assert_eq!(kernel.stacks.stack_slice(child.tos, 8), b"stackimg");

        // Same descriptors at the same indices, one extra reference each
        assert_eq!(child.fd_tab, kernel.proc_tab[0].fd_tab);
        assert_eq!(kernel.open_files.ref_count(fd_r), 2);
        assert_eq!(kernel.open_files.ref_count(fd_w), 2);
    }

    #[test]
    fn fork_rejects_a_full_table() {
        let (mut kernel, ctx) = booted();
        for slot in 1..MAX_PROCS {
            let tos = kernel.stacks.tos(slot);
            kernel.proc_tab[slot].reset(slot, tos);
            kernel.proc_tab[slot].status = ProcStatus::Ready;
            kernel.current_processes += 1;
        }

        assert_eq!(kernel.sys_fork(&ctx), -1);
        assert_eq!(kernel.current_processes, MAX_PROCS);
        kernel.check_invariants();
    }

    #[test]
    fn exit_reclaims_descriptors_and_slot() {
        let (mut kernel, mut ctx) = booted();

        let pipe = Arc::new(Mutex::new(Pipe::new()));
        let fd = kernel.open_fd(0, pipe, OpenFlags::RDONLY).unwrap();
        assert_eq!(kernel.sys_fork(&ctx), 1);
        assert_eq!(kernel.open_files.ref_count(fd), 2);

        // Run the child, then let it exit
        kernel.schedule(&mut ctx);
        assert_eq!(kernel.executing, Some(1));
        kernel.sys_exit(&mut ctx, 0);
        kernel.check_invariants();

        assert_eq!(kernel.proc_tab[1].status, ProcStatus::Terminated);
        assert_eq!(kernel.proc_tab[1].fd_tab, [FD_NONE; crate::process::FD_TAB_LEN]);
        assert_eq!(kernel.current_processes, 1);
        // The parent's reference survives alone
        assert_eq!(kernel.open_files.ref_count(fd), 1);
        // Exit dispatched a successor at once
        assert_eq!(kernel.executing, Some(0));

        // The TERMINATED slot is the next fork's first choice
        assert_eq!(kernel.sys_fork(&ctx), 1);
        kernel.check_invariants();
    }

    #[test]
    fn kill_terminates_without_rescheduling() {
        let (mut kernel, ctx) = booted();
        assert_eq!(kernel.sys_fork(&ctx), 1);

        assert_eq!(kernel.sys_kill(1, 9), 0);
        assert_eq!(kernel.proc_tab[1].status, ProcStatus::Terminated);
        // The caller keeps running
        assert_eq!(kernel.executing, Some(0));
        assert_eq!(kernel.proc_tab[0].status, ProcStatus::Executing);
        kernel.check_invariants();
    }

    #[test]
    fn kill_of_a_dead_or_bogus_pid_is_a_no_op() {
        let (mut kernel, ctx) = booted();
        assert_eq!(kernel.sys_fork(&ctx), 1);
        assert_eq!(kernel.sys_kill(1, 0), 0);
        let processes = kernel.current_processes;

        assert_eq!(kernel.sys_kill(1, 0), 0);
        assert_eq!(kernel.sys_kill(-3, 0), 0);
        assert_eq!(kernel.sys_kill(MAX_PROCS as i32, 0), 0);
        assert_eq!(kernel.current_processes, processes);
        kernel.check_invariants();
    }

    #[test]
    fn exec_resets_the_stack_and_keeps_descriptors() {
        let (mut kernel, mut ctx) = booted();
        let pipe = Arc::new(Mutex::new(Pipe::new()));
        let fd = kernel.open_fd(0, pipe, OpenFlags::RDONLY).unwrap();
        kernel.proc_tab[0].niceness = 7;

        ctx.sp -= 64;
        kernel.sys_exec(&mut ctx, 0xC0DE);

        assert_eq!(ctx.pc, 0xC0DE);
        assert_eq!(ctx.sp, kernel.proc_tab[0].tos);
        assert!(kernel.proc_tab[0].fd_tab.contains(&fd));
        assert_eq!(kernel.proc_tab[0].niceness, 7);
        kernel.check_invariants();
    }

    #[test]
    fn lifecycle_letters_reach_the_trace() {
        let (mut kernel, mut ctx) = booted();
        assert_eq!(kernel.sys_fork(&ctx), 1);
        kernel.sys_nice(1, 3);
        kernel.sys_kill(1, 0);
        kernel.sys_exec(&mut ctx, 0x1000);
        assert_eq!(capture::take_string(), "FNKE");
    }

    proptest! {
        #[test]
        fn nice_always_returns_the_clamped_value(value in any::<i32>()) {
            let (mut kernel, _ctx) = booted();
            let stored = kernel.sys_nice(0, value);
            prop_assert_eq!(stored, value.clamp(NICE_MIN, NICE_MAX) as isize);
            prop_assert_eq!(kernel.proc_tab[0].niceness as isize, stored);
        }
    }
}
