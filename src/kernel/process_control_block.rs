use crate::io::{Word, TERMINAL_COUNT};

/// Process identifier. Assigned monotonically, never reused.
pub type Pid = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState {
    Ready,
    Blocked,
    Dead,
}

impl ProcessState {
    pub const ALL: [ProcessState; 3] = [ProcessState::Ready, ProcessState::Blocked, ProcessState::Dead];

    pub fn index(&self) -> usize {
        match self {
            ProcessState::Ready => 0,
            ProcessState::Blocked => 1,
            ProcessState::Dead => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProcessState::Ready => "ready",
            ProcessState::Blocked => "blocked",
            ProcessState::Dead => "dead",
        }
    }
}

/// Terminal operation a process is waiting to complete, or has
/// completed without having claimed the terminal yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOp {
    None,
    Read,
    Write,
}

/// CPU-visible registers saved across traps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub pc: Word,
    pub a: Word,
    pub x: Word,
    pub error: Word,
}

#[derive(Debug, Clone)]
pub struct ProcessControlBlock {
    pub registers: Registers,
    pub state: ProcessState,
    pub priority: f32,
    pub quantum: u32,
    pub pending: PendingOp,
    /// Process this one is blocked on through WaitProcess.
    pub awaited: Option<Pid>,
    pub cpu_time: i64,
    pub exec_count: u32,

    id: Pid,
    terminal: usize,
    mem_start_address: usize,
    mem_size: usize,
}

impl ProcessControlBlock {
    pub fn new(id: Pid, entry_point: usize, mem_size: usize, quantum: u32) -> ProcessControlBlock {
        ProcessControlBlock {
            registers: Registers {
                pc: entry_point as Word,
                ..Registers::default()
            },
            state: ProcessState::Ready,
            priority: 0.0,
            quantum,
            pending: PendingOp::None,
            awaited: None,
            cpu_time: 0,
            exec_count: 0,
            id,
            terminal: id as usize % TERMINAL_COUNT,
            mem_start_address: entry_point,
            mem_size,
        }
    }

    /// Slot placeholder; a dead PCB marks a free table entry.
    pub fn vacant() -> ProcessControlBlock {
        ProcessControlBlock {
            state: ProcessState::Dead,
            ..ProcessControlBlock::new(0, 0, 0, 0)
        }
    }

    pub fn get_id(&self) -> Pid {
        self.id
    }

    pub fn get_terminal(&self) -> usize {
        self.terminal
    }

    pub fn get_mem_start_address(&self) -> usize {
        self.mem_start_address
    }

    pub fn get_mem_end_address(&self) -> usize {
        self.mem_start_address + self.mem_size
    }

    pub fn get_mem_size(&self) -> usize {
        self.mem_size
    }

    pub fn is_alive(&self) -> bool {
        self.state != ProcessState::Dead
    }

    pub fn owns_address(&self, address: usize) -> bool {
        (self.mem_start_address..self.get_mem_end_address()).contains(&address)
    }
}
