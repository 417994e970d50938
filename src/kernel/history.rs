//! Per-process accounting that outlives the process table slot, plus the
//! run-wide counters reported at the end of a run.

use std::collections::BTreeMap;
use std::fmt;

use super::{Pid, ProcessState};

use crate::error::{KernelError, KernelResult};

/// Reason the kernel was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrqKind {
    Reset,
    CpuError,
    SystemCall,
    ClockTick,
    Unknown,
}

impl IrqKind {
    pub const ALL: [IrqKind; 5] = [
        IrqKind::Reset,
        IrqKind::CpuError,
        IrqKind::SystemCall,
        IrqKind::ClockTick,
        IrqKind::Unknown,
    ];

    pub fn from_code(code: i32) -> IrqKind {
        match code {
            0 => IrqKind::Reset,
            1 => IrqKind::CpuError,
            2 => IrqKind::SystemCall,
            3 => IrqKind::ClockTick,
            _ => IrqKind::Unknown,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            IrqKind::Reset => 0,
            IrqKind::CpuError => 1,
            IrqKind::SystemCall => 2,
            IrqKind::ClockTick => 3,
            IrqKind::Unknown => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IrqKind::Reset => "reset",
            IrqKind::CpuError => "cpu error",
            IrqKind::SystemCall => "system call",
            IrqKind::ClockTick => "clock",
            IrqKind::Unknown => "unknown",
        }
    }
}

const IRQ_KINDS: usize = 5;
const STATES: usize = 3;

/// Creation time while alive, total lifetime once finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    Alive { created_at: i64 },
    Finished(i64),
}

#[derive(Debug, Clone)]
pub struct ProcessHistory {
    pub lifetime: Lifetime,
    pub preemptions: u32,
    pub wait_time: i64,
    pub ready_entries: u32,
    pub irq_counts: [u32; IRQ_KINDS],
    pub state_time: [i64; STATES],
    pub state_entries: [u32; STATES],
    pub last_transition: i64,
    state: ProcessState,
    queued_since: Option<i64>,
}

impl ProcessHistory {
    fn new(now: i64) -> ProcessHistory {
        ProcessHistory {
            lifetime: Lifetime::Alive { created_at: now },
            preemptions: 0,
            wait_time: 0,
            ready_entries: 0,
            irq_counts: [0; IRQ_KINDS],
            state_time: [0; STATES],
            state_entries: [0; STATES],
            last_transition: now,
            state: ProcessState::Ready,
            queued_since: None,
        }
    }

    /// Mean time between entering the ready queue and getting the CPU.
    pub fn mean_response_time(&self) -> f64 {
        if self.ready_entries == 0 {
            return 0.0;
        }
        self.wait_time as f64 / self.ready_entries as f64
    }
}

/// Run-wide counters.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub started_at: i64,
    pub idle_time: i64,
    pub preemptions: u32,
    pub irq_counts: [u32; IRQ_KINDS],
}

/// One entry per process ever created, kept after the process dies.
#[derive(Debug, Default)]
pub struct HistoryLedger {
    entries: BTreeMap<Pid, ProcessHistory>,
    stats: RunStats,
}

impl HistoryLedger {
    pub fn new(started_at: i64) -> HistoryLedger {
        HistoryLedger {
            entries: BTreeMap::new(),
            stats: RunStats {
                started_at,
                ..RunStats::default()
            },
        }
    }

    pub fn create(&mut self, id: Pid, now: i64) -> KernelResult<()> {
        if self.entries.contains_key(&id) {
            return Err(KernelError::DuplicateId(id));
        }
        self.entries.insert(id, ProcessHistory::new(now));
        Ok(())
    }

    pub fn get(&self, id: Pid) -> Option<&ProcessHistory> {
        self.entries.get(&id)
    }

    /// Charges the time since the last transition to the state being
    /// left and counts an entry into `new_state`.
    pub fn record_transition(&mut self, id: Pid, new_state: ProcessState, now: i64) -> KernelResult<()> {
        let entry = self.entries.get_mut(&id).ok_or(KernelError::NotFound(id))?;

        entry.state_time[entry.state.index()] += now - entry.last_transition;
        entry.state_entries[new_state.index()] += 1;
        entry.last_transition = now;
        entry.state = new_state;

        if new_state != ProcessState::Ready {
            entry.queued_since = None;
        }
        Ok(())
    }

    /// The process joined the ready queue and starts waiting for the CPU.
    pub fn record_enqueued(&mut self, id: Pid, now: i64) -> KernelResult<()> {
        let entry = self.entries.get_mut(&id).ok_or(KernelError::NotFound(id))?;
        entry.ready_entries += 1;
        entry.queued_since = Some(now);
        Ok(())
    }

    /// The process got the CPU; closes the current wait, if any.
    pub fn record_dispatched(&mut self, id: Pid, now: i64) -> KernelResult<()> {
        let entry = self.entries.get_mut(&id).ok_or(KernelError::NotFound(id))?;
        if let Some(since) = entry.queued_since.take() {
            entry.wait_time += now - since;
        }
        Ok(())
    }

    /// Only for involuntary displacement, never for blocking or death.
    pub fn record_preemption(&mut self, id: Pid) -> KernelResult<()> {
        let entry = self.entries.get_mut(&id).ok_or(KernelError::NotFound(id))?;
        entry.preemptions += 1;
        self.stats.preemptions += 1;
        Ok(())
    }

    /// Counts an interrupt against `id` (when a process was running) and
    /// against the run.
    pub fn record_irq(&mut self, id: Option<Pid>, kind: IrqKind) {
        if let Some(entry) = id.and_then(|id| self.entries.get_mut(&id)) {
            entry.irq_counts[kind.index()] += 1;
        }
        self.stats.irq_counts[kind.index()] += 1;
    }

    pub fn record_idle(&mut self, duration: i64) {
        self.stats.idle_time += duration;
    }

    /// Turns the creation timestamp into the final lifetime. A second
    /// call is rejected.
    pub fn finalize(&mut self, id: Pid, now: i64) -> KernelResult<i64> {
        let entry = self.entries.get_mut(&id).ok_or(KernelError::NotFound(id))?;

        match entry.lifetime {
            Lifetime::Alive { created_at } => {
                let lifetime = now - created_at;
                entry.lifetime = Lifetime::Finished(lifetime);
                Ok(lifetime)
            }
            Lifetime::Finished(_) => Err(KernelError::AlreadyFinalized(id)),
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn report(&self, now: i64) -> MetricsReport {
        let processes = self
            .entries
            .iter()
            .map(|(id, entry)| ProcessReport {
                id: *id,
                lifetime: match entry.lifetime {
                    Lifetime::Finished(lifetime) => lifetime,
                    Lifetime::Alive { created_at } => now - created_at,
                },
                finished: matches!(entry.lifetime, Lifetime::Finished(_)),
                preemptions: entry.preemptions,
                mean_response_time: entry.mean_response_time(),
                irq_counts: entry.irq_counts,
                state_time: entry.state_time,
                state_entries: entry.state_entries,
            })
            .collect();

        MetricsReport {
            processes_created: self.entries.len(),
            total_time: now - self.stats.started_at,
            idle_time: self.stats.idle_time,
            preemptions: self.stats.preemptions,
            irq_counts: self.stats.irq_counts,
            processes,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessReport {
    pub id: Pid,
    pub lifetime: i64,
    pub finished: bool,
    pub preemptions: u32,
    pub mean_response_time: f64,
    pub irq_counts: [u32; IRQ_KINDS],
    pub state_time: [i64; STATES],
    pub state_entries: [u32; STATES],
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsReport {
    pub processes_created: usize,
    pub total_time: i64,
    pub idle_time: i64,
    pub preemptions: u32,
    pub irq_counts: [u32; IRQ_KINDS],
    pub processes: Vec<ProcessReport>,
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Processes created: {}", self.processes_created)?;
        writeln!(f, "Total run time: {}", self.total_time)?;
        writeln!(f, "Idle time: {}", self.idle_time)?;
        writeln!(f, "Preemptions: {}", self.preemptions)?;
        for kind in IrqKind::ALL {
            writeln!(f, "IRQ {} ({}): {}", kind.index(), kind.name(), self.irq_counts[kind.index()])?;
        }

        writeln!(f, "ID | Lifetime | Preemptions | Mean Response")?;
        writeln!(f, "---|----------|-------------|--------------")?;
        for process in &self.processes {
            writeln!(
                f,
                "{:02} | {:8} | {:11} | {:12.2}",
                process.id, process.lifetime, process.preemptions, process.mean_response_time
            )?;
            for state in ProcessState::ALL {
                writeln!(
                    f,
                    "     {:7}: entered {} times, {} time units",
                    state.name(),
                    process.state_entries[state.index()],
                    process.state_time[state.index()]
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_create_zeroed() {
        let mut ledger = HistoryLedger::new(0);
        ledger.create(3, 10).unwrap();

        let entry = ledger.get(3).unwrap();
        assert_eq!(entry.lifetime, Lifetime::Alive { created_at: 10 });
        assert_eq!(entry.preemptions, 0);
        assert_eq!(entry.state_entries, [0; 3]);
        assert_eq!(entry.last_transition, 10);
    }

    #[test]
    fn test_history_create_duplicate() {
        let mut ledger = HistoryLedger::new(0);
        ledger.create(1, 0).unwrap();
        assert_eq!(ledger.create(1, 5), Err(KernelError::DuplicateId(1)));
    }

    #[test]
    fn test_history_transition_charges_state_left() {
        let mut ledger = HistoryLedger::new(0);
        ledger.create(0, 10).unwrap();

        ledger.record_transition(0, ProcessState::Blocked, 25).unwrap();
        ledger.record_transition(0, ProcessState::Ready, 40).unwrap();

        let entry = ledger.get(0).unwrap();
        assert_eq!(entry.state_time, [15, 15, 0]);
        assert_eq!(entry.state_entries, [1, 1, 0]);
        assert_eq!(entry.last_transition, 40);
    }

    #[test]
    fn test_history_finalize_once() {
        let mut ledger = HistoryLedger::new(0);
        ledger.create(2, 100).unwrap();

        assert_eq!(ledger.finalize(2, 130), Ok(30));
        assert_eq!(ledger.finalize(2, 500), Err(KernelError::AlreadyFinalized(2)));
        assert_eq!(ledger.get(2).unwrap().lifetime, Lifetime::Finished(30));
    }

    #[test]
    fn test_history_finalize_missing() {
        let mut ledger = HistoryLedger::new(0);
        assert_eq!(ledger.finalize(9, 10), Err(KernelError::NotFound(9)));
    }

    #[test]
    fn test_history_response_time() {
        let mut ledger = HistoryLedger::new(0);
        ledger.create(0, 0).unwrap();

        ledger.record_enqueued(0, 0).unwrap();
        ledger.record_dispatched(0, 4).unwrap();
        ledger.record_enqueued(0, 10).unwrap();
        ledger.record_dispatched(0, 12).unwrap();
        ledger.record_dispatched(0, 20).unwrap();

        let entry = ledger.get(0).unwrap();
        assert_eq!(entry.wait_time, 6);
        assert_eq!(entry.mean_response_time(), 3.0);
    }

    #[test]
    fn test_history_response_time_never_queued() {
        let mut ledger = HistoryLedger::new(0);
        ledger.create(0, 0).unwrap();
        assert_eq!(ledger.get(0).unwrap().mean_response_time(), 0.0);
    }

    #[test]
    fn test_history_irq_and_preemption_aggregates() {
        let mut ledger = HistoryLedger::new(0);
        ledger.create(0, 0).unwrap();

        ledger.record_irq(Some(0), IrqKind::ClockTick);
        ledger.record_irq(None, IrqKind::ClockTick);
        ledger.record_irq(Some(7), IrqKind::Unknown);
        ledger.record_preemption(0).unwrap();

        assert_eq!(ledger.get(0).unwrap().irq_counts[IrqKind::ClockTick.index()], 1);
        assert_eq!(ledger.stats().irq_counts[IrqKind::ClockTick.index()], 2);
        assert_eq!(ledger.stats().irq_counts[IrqKind::Unknown.index()], 1);
        assert_eq!(ledger.stats().preemptions, 1);
    }

    #[test]
    fn test_history_report_uses_stored_ids() {
        let mut ledger = HistoryLedger::new(5);
        ledger.create(0, 5).unwrap();
        ledger.create(4, 20).unwrap();
        ledger.finalize(4, 30).unwrap();

        let report = ledger.report(50);
        let ids: Vec<Pid> = report.processes.iter().map(|p| p.id).collect();

        assert_eq!(ids, vec![0, 4]);
        assert_eq!(report.total_time, 45);
        assert_eq!(report.processes[0].lifetime, 45);
        assert!(!report.processes[0].finished);
        assert_eq!(report.processes[1].lifetime, 10);
        assert!(report.to_string().contains("Processes created: 2"));
    }

    #[test]
    fn test_irq_kind_from_code() {
        assert_eq!(IrqKind::from_code(0), IrqKind::Reset);
        assert_eq!(IrqKind::from_code(3), IrqKind::ClockTick);
        assert_eq!(IrqKind::from_code(42), IrqKind::Unknown);
    }
}
