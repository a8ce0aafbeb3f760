// Kernel error handling
//
// There is no errno: every supervisor call folds failure into a -1 return in
// register 0. Internal routines still use Result so partial allocations can
// be unwound before the boundary flattens the error.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Process table is at capacity.
    NoProcessSlot,
    /// The caller's descriptor table has no free slot.
    FdTableFull,
    /// No open-file entry with a zero reference count remains.
    OpenFileTableFull,
    /// Descriptor is out of range or names no active open file.
    BadDescriptor,
    /// User-supplied pointer is null.
    BadAddress,
}

impl KernelError {
    /// Short description used in UART diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            KernelError::NoProcessSlot => "process table full",
            KernelError::FdTableFull => "descriptor table full",
            KernelError::OpenFileTableFull => "open-file table full",
            KernelError::BadDescriptor => "bad descriptor",
            KernelError::BadAddress => "bad address",
        }
    }
}

pub type Result<T> = core::result::Result<T, KernelError>;
