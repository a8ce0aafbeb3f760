//! Scheduler and context dispatch
//!
//! Selection is an aging contest over the READY processes: a candidate's
//! score is the number of ticks since it last ran, minus its niceness, so
//! long waits and low niceness both raise standing. The incumbent enters
//! the contest only as the seed, at `niceness - 1`; any READY peer at or
//! above that displaces it, which keeps a lone busy process from shutting
//! out an equally eligible one. The scan takes the winner on `>=`, so equal
//! scores resolve to the highest index.

use core::fmt;

use crate::arch::Context;
use crate::kernel::Kernel;
use crate::process::ProcStatus;

/// A pid, or `?` when there is no process on that side of a switch.
struct PidLabel(Option<usize>);

impl fmt::Display for PidLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(pid) => write!(f, "{}", pid),
            None => f.write_str("?"),
        }
    }
}

impl Kernel {
    /// Pick the next process and swap it in. Runs on every tick and on
    /// every voluntary yield.
    pub fn schedule(&mut self, ctx: &mut Context) {
        let prev = self.executing;
        let next = self.select_next();
        self.dispatch(ctx, prev, next);
    }

    fn select_next(&self) -> usize {
        let (mut next, mut best) = match self.executing {
            Some(idx) => (idx, self.proc_tab[idx].niceness as i64 - 1),
            None => (0, i64::MIN),
        };

        for (idx, pcb) in self.proc_tab.iter().enumerate() {
            if pcb.status != ProcStatus::Ready {
                continue;
            }
            let score = (self.time - pcb.last_exec) as i64 - pcb.niceness as i64;
            if score >= best {
                best = score;
                next = idx;
            }
        }

        next
    }

    /// Swap `next` onto the CPU through the handler's context record. The
    /// outgoing process keeps TERMINATED/INVALID if it died; otherwise it
    /// returns to READY.
    pub(crate) fn dispatch(&mut self, ctx: &mut Context, prev: Option<usize>, next: usize) {
        if let Some(idx) = prev {
            let outgoing = &mut self.proc_tab[idx];
            outgoing.ctx = *ctx;
            if outgoing.status == ProcStatus::Executing {
                outgoing.status = ProcStatus::Ready;
            }
        }

        let incoming = &mut self.proc_tab[next];
        *ctx = incoming.ctx;
        incoming.status = ProcStatus::Executing;
        incoming.last_exec = self.time;
        self.time += 1;
        self.executing = Some(next);

        crate::kprint!("[{}→{}]", PidLabel(prev), PidLabel(Some(next)));
    }
}
