//! Kernel state
//!
//! All mutable tables live in one owning structure handed by reference to
//! every handler: the process table, the open-file table, the stack arena,
//! the tick counter and the executing index. Handlers run to completion with
//! IRQs masked, so the spin mutex around the global instance is only ever
//! contended by nobody; it exists to hand out the single &mut.

use spin::Mutex;

use crate::arch::armv7::PSR_USER_INIT;
use crate::arch::Context;
use crate::fd::{OpenFileTable, FIRST_PIPE_FD, MAX_FDS};
use crate::process::{Pcb, ProcStatus, StackArena, MAX_PROCS};

pub struct Kernel {
    pub proc_tab: [Pcb; MAX_PROCS],
    pub open_files: OpenFileTable,
    pub stacks: StackArena,
    /// Tick counter; advances once per dispatch.
    pub time: u64,
    /// PCBs with status READY or EXECUTING.
    pub current_processes: usize,
    /// Index of the EXECUTING PCB; None only before boot.
    pub executing: Option<usize>,
}

impl Kernel {
    pub fn new() -> Self {
        Self {
            proc_tab: core::array::from_fn(|_| Pcb::invalid()),
            open_files: OpenFileTable::new(),
            stacks: StackArena::new(),
            time: 0,
            current_processes: 0,
            executing: None,
        }
    }

    /// Boot: announce reset, build PCB 0 around the console program and
    /// dispatch it. The open-file table already carries its reserved
    /// entries; every other PCB slot stays INVALID until fork claims it.
    pub fn boot(&mut self, ctx: &mut Context, console_entry: usize) {
        crate::uart::putc(b'R');

        let tos = self.stacks.tos(0);
        let pcb = &mut self.proc_tab[0];
        pcb.reset(0, tos);
        pcb.ctx.cpsr = PSR_USER_INIT;
        pcb.ctx.pc = console_entry;
        pcb.ctx.sp = tos;
        pcb.status = ProcStatus::Ready;
        self.current_processes = 1;

        self.dispatch(ctx, None, 0);
    }

    pub fn executing_pcb(&self) -> Option<&Pcb> {
        self.executing.map(|idx| &self.proc_tab[idx])
    }

    /// Cross-table consistency, checked at handler-exit points in debug
    /// builds and throughout the test suite.
    pub fn check_invariants(&self) {
        // Every pipe descriptor's reference count matches its appearances
        // across the descriptor tables, and only in-use entries hold a
        // buffer
        for fd in FIRST_PIPE_FD..MAX_FDS as i32 {
            let references: usize = self
                .proc_tab
                .iter()
                .map(|pcb| pcb.fd_tab.iter().filter(|&&slot| slot == fd).count())
                .sum();
            assert_eq!(
                self.open_files.ref_count(fd),
                references,
                "open-file entry {} out of sync",
                fd
            );

            let entry = self.open_files.entry(fd).unwrap();
            assert_eq!(entry.in_use(), entry.pipe.is_some());
            if let Some(pipe) = &entry.pipe {
                assert!(pipe.lock().invariants_hold());
            }
        }

        // Exactly one PCB is executing and `executing` names it. The one
        // exception: an incumbent that terminated itself stays named until
        // the pending reschedule.
        let executing_count = self
            .proc_tab
            .iter()
            .filter(|pcb| pcb.status == ProcStatus::Executing)
            .count();
        match self.executing {
            Some(idx) if self.proc_tab[idx].status == ProcStatus::Executing => {
                assert_eq!(executing_count, 1);
            }
            Some(idx) => {
                assert_eq!(self.proc_tab[idx].status, ProcStatus::Terminated);
                assert_eq!(executing_count, 0);
            }
            None => assert_eq!(executing_count, 0),
        }

        let live = self.proc_tab.iter().filter(|pcb| pcb.is_live()).count();
        assert_eq!(self.current_processes, live);
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static::lazy_static! {
    /// The kernel instance the trap handlers operate on. Constructed on
    /// first touch, which the reset handler performs after the heap is up.
    pub static ref KERNEL: Mutex<Kernel> = Mutex::new(Kernel::new());
}
