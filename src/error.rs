//! Error types shared by the kernel core and its collaborators.

use thiserror::Error;

use crate::io::DeviceId;
use crate::kernel::{IrqKind, Pid};

/// Failure of a word-addressed memory access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("address {0} is outside of memory")]
    OutOfBounds(usize),
}

/// Failure of a device register access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("device {0:?} does not exist")]
    NoSuchDevice(DeviceId),

    #[error("device {0:?} is offline")]
    Offline(DeviceId),

    #[error("device {0:?} has no data")]
    NoData(DeviceId),

    #[error("device {0:?} does not support this access")]
    InvalidAccess(DeviceId),
}

/// Failure to resolve or place an executable image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("program '{0}' not found")]
    NotFound(String),

    #[error("program '{name}' could not be copied into memory: {source}")]
    Memory {
        name: String,
        #[source]
        source: MemoryError,
    },
}

/// Locally recoverable kernel failures. Callers decide what the
/// affected process sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    #[error("process table is full")]
    TableFull,

    #[error("no process with id {0}")]
    NotFound(Pid),

    #[error("history of process {0} was already finalized")]
    AlreadyFinalized(Pid),

    #[error("history of process {0} already exists")]
    DuplicateId(Pid),

    #[error("invalid program name in process memory")]
    InvalidName,

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Cause of the sticky internal-error flag. There is no recovery once
/// one of these is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    #[error("failed to save CPU registers: {0}")]
    RegisterRead(MemoryError),

    #[error("failed to restore CPU registers of process {pid}: {source}")]
    RegisterWrite {
        pid: Pid,
        #[source]
        source: MemoryError,
    },

    #[error("trap handler loaded at {actual}, expected {expected}")]
    TrapHandlerMisplaced { expected: i32, actual: i32 },

    #[error("failed to load boot program: {0}")]
    BootLoad(LoadError),

    #[error("process table has no room for init")]
    InitAllocation,

    #[error("failed to program the timer: {0}")]
    Timer(DeviceError),

    #[error("{0:?} interrupt without a current process")]
    NoCurrentProcess(IrqKind),
}

pub type KernelResult<T> = Result<T, KernelError>;

/// Failure while reading a program file.
#[derive(Debug, Error)]
pub enum ProgramFileError {
    #[error("failed to read program file: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// Failure while reading or replaying a trap script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("register save area: {0}")]
    Memory(#[from] MemoryError),
}
