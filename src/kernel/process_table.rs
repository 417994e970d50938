use super::{Pid, ProcessControlBlock, ProcessState};

use crate::error::{KernelError, KernelResult};

/// Fixed-capacity process table. A slot is free while its PCB is dead;
/// slots are reused, ids are not.
///
/// Lookup and allocation are linear scans, which is fine at this table size.
pub struct ProcessTable {
    slots: Vec<ProcessControlBlock>,
    next_id: Pid,
    quantum: u32,
}

impl ProcessTable {
    pub fn new(capacity: usize, quantum: u32) -> ProcessTable {
        ProcessTable {
            slots: (0..capacity).map(|_| ProcessControlBlock::vacant()).collect(),
            next_id: 0,
            quantum,
        }
    }

    /// Takes a free slot for a new process starting at `entry_point`.
    /// A full table fails without consuming an id.
    pub fn allocate(&mut self, entry_point: usize, size: usize) -> KernelResult<&mut ProcessControlBlock> {
        let slot = self
            .slots
            .iter()
            .position(|pcb| !pcb.is_alive())
            .ok_or(KernelError::TableFull)?;

        let id = self.next_id;
        self.next_id += 1;

        self.slots[slot] = ProcessControlBlock::new(id, entry_point, size, self.quantum);
        Ok(&mut self.slots[slot])
    }

    pub fn has_free_slot(&self) -> bool {
        self.slots.iter().any(|pcb| !pcb.is_alive())
    }

    pub fn lookup(&self, id: Pid) -> Option<&ProcessControlBlock> {
        self.slots.iter().find(|pcb| pcb.is_alive() && pcb.get_id() == id)
    }

    pub fn lookup_mut(&mut self, id: Pid) -> Option<&mut ProcessControlBlock> {
        self.slots.iter_mut().find(|pcb| pcb.is_alive() && pcb.get_id() == id)
    }

    /// Updates the authoritative state only. Queue membership is kept in
    /// step by the caller.
    pub fn set_state(&mut self, id: Pid, state: ProcessState) -> KernelResult<()> {
        let pcb = self.lookup_mut(id).ok_or(KernelError::NotFound(id))?;
        pcb.state = state;
        Ok(())
    }

    pub fn is_alive(&self, id: Pid) -> bool {
        self.lookup(id).is_some()
    }

    pub fn live(&self) -> impl Iterator<Item = &ProcessControlBlock> {
        self.slots.iter().filter(|pcb| pcb.is_alive())
    }

    pub fn live_mut(&mut self) -> impl Iterator<Item = &mut ProcessControlBlock> {
        self.slots.iter_mut().filter(|pcb| pcb.is_alive())
    }

    pub fn occupancy(&self) -> usize {
        self.live().count()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of ids handed out so far.
    pub fn created_count(&self) -> u32 {
        self.next_id
    }
}
