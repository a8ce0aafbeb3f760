//! File-descriptor layer
//!
//! One system-wide open-file table plus a small descriptor table in each
//! process control block. Descriptor tables hold indices into the open-file
//! table, never pointers; the open-file entries hold the pipe handles and
//! the reference counts that decide when a pipe buffer dies.
//!
//! Entries 0, 1 and 2 are the reserved stdin/stdout/stderr descriptors.
//! They are born with a reference and are never allocated or released.

use alloc::sync::Arc;
use spin::Mutex;

use crate::kernel::Kernel;
use crate::lib::error::{KernelError, Result};
use crate::pipe::Pipe;

/// Size of the open-file table.
pub const MAX_FDS: usize = 32;

/// First descriptor handed out for pipes; 0-2 are reserved.
pub const FIRST_PIPE_FD: i32 = 3;

/// Free slot marker in per-process descriptor tables.
pub const FD_NONE: i32 = -1;

bitflags::bitflags! {
    /// Access mode recorded in an open-file entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const RDONLY = 1 << 0;
        const WRONLY = 1 << 1;
    }
}

/// Both ends of a pipe share the buffer through this handle; the last
/// open-file entry to let go frees it.
pub type PipeHandle = Arc<Mutex<Pipe>>;

pub struct OpenFile {
    pub ref_count: usize,
    pub flags: OpenFlags,
    /// Backing pipe; None for the reserved console descriptors.
    pub pipe: Option<PipeHandle>,
}

impl OpenFile {
    const fn unused() -> Self {
        Self {
            ref_count: 0,
            flags: OpenFlags::empty(),
            pipe: None,
        }
    }

    const fn reserved(flags: OpenFlags) -> Self {
        Self {
            ref_count: 1,
            flags,
            pipe: None,
        }
    }

    pub fn in_use(&self) -> bool {
        self.ref_count > 0
    }
}

pub struct OpenFileTable {
    entries: [OpenFile; MAX_FDS],
}

impl OpenFileTable {
    pub fn new() -> Self {
        let mut entries = core::array::from_fn(|_| OpenFile::unused());
        entries[0] = OpenFile::reserved(OpenFlags::RDONLY); // stdin
        entries[1] = OpenFile::reserved(OpenFlags::WRONLY); // stdout
        entries[2] = OpenFile::reserved(OpenFlags::WRONLY); // stderr
        Self { entries }
    }

    pub fn entry(&self, fd: i32) -> Option<&OpenFile> {
        if (0..MAX_FDS as i32).contains(&fd) {
            Some(&self.entries[fd as usize])
        } else {
            None
        }
    }

    /// Pipe handle behind an active descriptor, if any.
    pub fn pipe(&self, fd: i32) -> Option<PipeHandle> {
        self.entry(fd)
            .filter(|entry| entry.in_use())
            .and_then(|entry| entry.pipe.clone())
    }

    pub fn ref_count(&self, fd: i32) -> usize {
        self.entry(fd).map_or(0, |entry| entry.ref_count)
    }

    /// Install a pipe in the first free entry at or above
    /// [`FIRST_PIPE_FD`].
    pub fn alloc(&mut self, pipe: PipeHandle, flags: OpenFlags) -> Result<i32> {
        for fd in FIRST_PIPE_FD as usize..MAX_FDS {
            if !self.entries[fd].in_use() {
                self.entries[fd] = OpenFile {
                    ref_count: 1,
                    flags,
                    pipe: Some(pipe),
                };
                return Ok(fd as i32);
            }
        }
        Err(KernelError::OpenFileTableFull)
    }

    /// Account one more descriptor-table reference to `fd`.
    pub fn incref(&mut self, fd: i32) {
        if (0..MAX_FDS as i32).contains(&fd) {
            self.entries[fd as usize].ref_count += 1;
        }
    }

    /// Drop one reference; the entry's pipe handle goes with the last one.
    /// The reserved console entries are never released.
    pub fn release(&mut self, fd: i32) {
        if !(FIRST_PIPE_FD..MAX_FDS as i32).contains(&fd) {
            return;
        }
        let entry = &mut self.entries[fd as usize];
        if entry.ref_count == 0 {
            return;
        }
        entry.ref_count -= 1;
        if entry.ref_count == 0 {
            entry.pipe = None;
            entry.flags = OpenFlags::empty();
        }
    }
}

impl Default for OpenFileTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// Install `pipe` in the open-file table and record the descriptor in
    /// the process's table. A half-done open (entry allocated, descriptor
    /// table full) is unwound before the error surfaces.
    pub fn open_fd(&mut self, pid: usize, pipe: PipeHandle, flags: OpenFlags) -> Result<i32> {
        let fd = self.open_files.alloc(pipe, flags)?;
        match self.proc_tab[pid].fd_tab.iter_mut().find(|slot| **slot == FD_NONE) {
            Some(slot) => {
                *slot = fd;
                Ok(fd)
            }
            None => {
                self.open_files.release(fd);
                Err(KernelError::FdTableFull)
            }
        }
    }

    /// Close `fd` on behalf of `pid`: clear every matching descriptor-table
    /// slot, then drop one open-file reference. The reference drops even
    /// when the process held no matching slot; a numerically valid fd the
    /// caller never owned is a successful close.
    pub fn close_fd(&mut self, pid: usize, fd: i32) -> Result<()> {
        if !(0..MAX_FDS as i32).contains(&fd) {
            return Err(KernelError::BadDescriptor);
        }
        for slot in self.proc_tab[pid].fd_tab.iter_mut() {
            if *slot == fd {
                *slot = FD_NONE;
            }
        }
        self.open_files.release(fd);
        Ok(())
    }

    /// Mirror the parent's descriptor table into the child, adding one
    /// open-file reference per inherited descriptor.
    pub fn dup_fds(&mut self, parent: usize, child: usize) {
        let fd_tab = self.proc_tab[parent].fd_tab;
        self.proc_tab[child].fd_tab = fd_tab;
        for fd in fd_tab {
            if fd >= 0 {
                self.open_files.incref(fd);
            }
        }
    }

    /// Release every descriptor a dying process still holds.
    pub fn close_all_fds(&mut self, pid: usize) {
        let fd_tab = self.proc_tab[pid].fd_tab;
        for fd in fd_tab {
            if fd >= 0 {
                let _ = self.close_fd(pid, fd);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Kernel;

    fn new_pipe() -> PipeHandle {
        Arc::new(Mutex::new(Pipe::new()))
    }

    #[test]
    fn reserved_entries_are_preinstalled() {
        let table = OpenFileTable::new();
        assert_eq!(table.ref_count(0), 1);
        assert_eq!(table.ref_count(1), 1);
        assert_eq!(table.ref_count(2), 1);
        assert_eq!(table.entry(0).unwrap().flags, OpenFlags::RDONLY);
        assert_eq!(table.entry(1).unwrap().flags, OpenFlags::WRONLY);
        assert_eq!(table.entry(2).unwrap().flags, OpenFlags::WRONLY);
        for fd in FIRST_PIPE_FD..MAX_FDS as i32 {
            assert!(!table.entry(fd).unwrap().in_use());
        }
    }

    #[test]
    fn alloc_skips_reserved_entries() {
        let mut table = OpenFileTable::new();
        assert_eq!(table.alloc(new_pipe(), OpenFlags::RDONLY), Ok(3));
        assert_eq!(table.alloc(new_pipe(), OpenFlags::WRONLY), Ok(4));
    }

    #[test]
    fn release_of_reserved_entries_is_refused() {
        let mut table = OpenFileTable::new();
        table.release(1);
        table.release(1);
        assert_eq!(table.ref_count(1), 1);
    }

    #[test]
    fn last_release_frees_the_backing_pipe() {
        let mut table = OpenFileTable::new();
        let pipe = new_pipe();
        let fd = table.alloc(pipe.clone(), OpenFlags::RDONLY).unwrap();
        table.incref(fd);
        assert_eq!(Arc::strong_count(&pipe), 2);

        table.release(fd);
        assert_eq!(table.ref_count(fd), 1);
        assert_eq!(Arc::strong_count(&pipe), 2);

        table.release(fd);
        assert_eq!(table.ref_count(fd), 0);
        assert_eq!(Arc::strong_count(&pipe), 1);
    }

    #[test]
    fn open_then_close_restores_the_table() {
        let mut kernel = Kernel::new();
        let pipe = new_pipe();

        let fd_r = kernel.open_fd(0, pipe.clone(), OpenFlags::RDONLY).unwrap();
        let fd_w = kernel.open_fd(0, pipe.clone(), OpenFlags::WRONLY).unwrap();
        assert_eq!((fd_r, fd_w), (3, 4));
        assert!(kernel.proc_tab[0].fd_tab.contains(&fd_r));
        assert!(kernel.proc_tab[0].fd_tab.contains(&fd_w));

        kernel.close_fd(0, fd_r).unwrap();
        kernel.close_fd(0, fd_w).unwrap();

        // Indistinguishable from the pre-open state
        assert_eq!(kernel.open_files.ref_count(fd_r), 0);
        assert_eq!(kernel.open_files.ref_count(fd_w), 0);
        assert!(!kernel.proc_tab[0].fd_tab.contains(&fd_r));
        assert!(!kernel.proc_tab[0].fd_tab.contains(&fd_w));
        assert_eq!(Arc::strong_count(&pipe), 1);
    }

    #[test]
    fn open_unwinds_when_descriptor_table_is_full() {
        let mut kernel = Kernel::new();
        kernel.proc_tab[0].fd_tab.fill(99);

        let pipe = new_pipe();
        let err = kernel.open_fd(0, pipe.clone(), OpenFlags::RDONLY);
        assert_eq!(err, Err(KernelError::FdTableFull));
        assert_eq!(kernel.open_files.ref_count(3), 0);
        assert_eq!(Arc::strong_count(&pipe), 1);
    }

    #[test]
    fn out_of_range_close_is_rejected() {
        let mut kernel = Kernel::new();
        assert_eq!(kernel.close_fd(0, -7), Err(KernelError::BadDescriptor));
        assert_eq!(
            kernel.close_fd(0, MAX_FDS as i32),
            Err(KernelError::BadDescriptor)
        );
    }

    #[test]
    fn unowned_close_still_drops_the_reference() {
        let mut kernel = Kernel::new();
        let fd = kernel.open_fd(0, new_pipe(), OpenFlags::RDONLY).unwrap();

        // Process 1 holds no slot for fd but the close still succeeds and
        // the global count drops
        kernel.close_fd(1, fd).unwrap();
        assert_eq!(kernel.open_files.ref_count(fd), 0);
    }
}
