//! System calls, selected by the number a process leaves in its
//! accumulator before trapping.

use super::*;

use crate::error::{InternalError, KernelError, KernelResult};
use crate::io::{DeviceId, Devices, Memory, ProgramLoader, Word};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Read,
    Write,
    CreateProcess,
    KillProcess,
    WaitProcess,
}

impl Syscall {
    pub fn from_code(code: Word) -> Option<Syscall> {
        match code {
            1 => Some(Syscall::Read),
            2 => Some(Syscall::Write),
            7 => Some(Syscall::CreateProcess),
            8 => Some(Syscall::KillProcess),
            9 => Some(Syscall::WaitProcess),
            _ => None,
        }
    }

    pub fn code(&self) -> Word {
        match self {
            Syscall::Read => 1,
            Syscall::Write => 2,
            Syscall::CreateProcess => 7,
            Syscall::KillProcess => 8,
            Syscall::WaitProcess => 9,
        }
    }
}

impl<M: Memory, D: Devices, L: ProgramLoader> Driver<M, D, L> {
    pub(super) fn handle_syscall(&mut self) {
        let pid = match self.current {
            Some(pid) => pid,
            None => return self.raise(InternalError::NoCurrentProcess(IrqKind::SystemCall)),
        };
        let code = match self.table.lookup(pid) {
            Some(pcb) => pcb.registers.a,
            None => return,
        };

        log::trace!("Process {} system call {}", pid, code);

        match Syscall::from_code(code) {
            Some(Syscall::Read) => self.sys_read(pid),
            Some(Syscall::Write) => self.sys_write(pid),
            Some(Syscall::CreateProcess) => self.sys_create_process(pid),
            Some(Syscall::KillProcess) => self.sys_kill_process(pid),
            Some(Syscall::WaitProcess) => self.sys_wait_process(pid),
            None => {
                log::warn!("Process {} made unknown system call {}, killing it", pid, code);
                if let Err(err) = self.kill_process(pid) {
                    log::warn!("Could not kill process {}: {}", pid, err);
                }
            }
        }
    }

    /// Reads one value from the caller's keyboard into its accumulator,
    /// or blocks the caller until the keyboard can deliver.
    fn sys_read(&mut self, pid: Pid) {
        let terminal = match self.table.lookup(pid) {
            Some(pcb) => pcb.get_terminal(),
            None => return,
        };

        if let Some(value) = self.try_read(pid, terminal) {
            self.set_accumulator(pid, value);
        } else {
            self.block_on_terminal(pid, PendingOp::Read);
        }
    }

    /// Writes the caller's index register to its screen, or blocks the
    /// caller until the screen accepts output.
    fn sys_write(&mut self, pid: Pid) {
        let (terminal, value) = match self.table.lookup(pid) {
            Some(pcb) => (pcb.get_terminal(), pcb.registers.x),
            None => return,
        };

        if self.try_write(pid, terminal, value) {
            self.set_accumulator(pid, 0);
        } else {
            self.block_on_terminal(pid, PendingOp::Write);
        }
    }

    fn sys_create_process(&mut self, pid: Pid) {
        let result = match self.spawn_from_memory(pid) {
            Ok(child) => child as Word,
            Err(err) => {
                log::warn!("Process {} failed to create a process: {}", pid, err);
                -1
            }
        };

        self.set_accumulator(pid, result);
    }

    fn sys_kill_process(&mut self, pid: Pid) {
        if let Err(err) = self.kill_process(pid) {
            log::warn!("Could not kill process {}: {}", pid, err);
        }
    }

    /// Blocks the caller until the process named in its index register
    /// dies. A target that is already gone returns 0 at once; waiting on
    /// oneself returns -1.
    fn sys_wait_process(&mut self, pid: Pid) {
        let target = match self.table.lookup(pid) {
            Some(pcb) => pcb.registers.x,
            None => return,
        };

        let target = match Pid::try_from(target) {
            Ok(target) if target != pid => target,
            _ => {
                log::warn!("Process {} cannot wait for {}", pid, target);
                return self.set_accumulator(pid, -1);
            }
        };

        if !self.table.is_alive(target) {
            return self.set_accumulator(pid, 0);
        }

        if let Some(pcb) = self.table.lookup_mut(pid) {
            pcb.awaited = Some(target);
        }
        log::debug!("Process {} waits for process {}", pid, target);
        self.change_state_or_warn(pid, ProcessState::Blocked);
    }

    /// Copies the program name the caller points at, loads that program
    /// and creates a process for it.
    fn spawn_from_memory(&mut self, parent: Pid) -> KernelResult<Pid> {
        let pcb = self.table.lookup(parent).ok_or(KernelError::NotFound(parent))?;

        let address = usize::try_from(pcb.registers.x).map_err(|_| KernelError::InvalidName)?;
        if !pcb.owns_address(address) {
            return Err(KernelError::InvalidName);
        }
        let max_len = self.config.max_name_len.min(pcb.get_mem_end_address() - address);

        let name = self
            .memory
            .read_str(address, max_len)
            .ok_or(KernelError::InvalidName)?;

        if !self.table.has_free_slot() {
            return Err(KernelError::TableFull);
        }

        let program = self.load_program(&name)?;
        self.create_process(&program)
    }

    /// Pending-work step for one blocked process: finishes its deferred
    /// transfer, or notices that the process it waits for is gone.
    pub(super) fn try_unblock(&mut self, pid: Pid) {
        let (pending, awaited, terminal, x) = match self.table.lookup(pid) {
            Some(pcb) => (pcb.pending, pcb.awaited, pcb.get_terminal(), pcb.registers.x),
            None => return,
        };

        let done = match pending {
            PendingOp::Read => match self.try_read(pid, terminal) {
                Some(value) => {
                    self.set_accumulator(pid, value);
                    true
                }
                None => false,
            },
            PendingOp::Write => {
                let written = self.try_write(pid, terminal, x);
                if written {
                    self.set_accumulator(pid, 0);
                }
                written
            }
            PendingOp::None => match awaited {
                Some(target) if !self.table.is_alive(target) => {
                    if let Some(pcb) = self.table.lookup_mut(pid) {
                        pcb.awaited = None;
                    }
                    self.set_accumulator(pid, 0);
                    true
                }
                _ => false,
            },
        };

        if done {
            log::debug!("Process {} unblocked", pid);
            self.change_state_or_warn(pid, ProcessState::Ready);
        }
    }

    fn try_read(&mut self, pid: Pid, terminal: usize) -> Option<Word> {
        if !self.terminal_available(pid, terminal) || !self.device_ready(DeviceId::KeyboardReady(terminal)) {
            return None;
        }

        match self.devices.read(DeviceId::Keyboard(terminal)) {
            Ok(value) => Some(value),
            Err(err) => {
                log::debug!("Keyboard {} read failed: {}", terminal, err);
                None
            }
        }
    }

    fn try_write(&mut self, pid: Pid, terminal: usize, value: Word) -> bool {
        if !self.terminal_available(pid, terminal) || !self.device_ready(DeviceId::ScreenReady(terminal)) {
            return false;
        }

        match self.devices.write(DeviceId::Screen(terminal), value) {
            Ok(()) => true,
            Err(err) => {
                log::debug!("Screen {} write failed: {}", terminal, err);
                false
            }
        }
    }

    fn block_on_terminal(&mut self, pid: Pid, op: PendingOp) {
        if let Some(pcb) = self.table.lookup_mut(pid) {
            pcb.pending = op;
        }
        log::debug!("Process {} blocked on {:?}", pid, op);
        self.change_state_or_warn(pid, ProcessState::Blocked);
    }

    fn set_accumulator(&mut self, pid: Pid, value: Word) {
        if let Some(pcb) = self.table.lookup_mut(pid) {
            pcb.registers.a = value;
        }
    }
}
