use super::{Pid, ProcessControlBlock, ProcessQueue, ProcessState, ProcessTable};

use crate::config::SchedulerMode;

/// Owns the ready queue and applies the active policy to it.
///
/// The queue holds every Ready process, including the one currently
/// selected to run. Simple and round-robin keep it FIFO; priority keeps
/// it sorted by descending priority.
pub struct ShortTermScheduler {
    ready_queue: ProcessQueue,
    mode: SchedulerMode,
    initial_quantum: u32,
}

impl ShortTermScheduler {
    pub fn new(mode: SchedulerMode, initial_quantum: u32) -> ShortTermScheduler {
        ShortTermScheduler {
            ready_queue: ProcessQueue::new(),
            mode,
            initial_quantum,
        }
    }

    pub fn mode(&self) -> SchedulerMode {
        self.mode
    }

    pub fn ready_queue(&self) -> &ProcessQueue {
        &self.ready_queue
    }

    /// Adds a Ready process to the queue with a fresh quantum. Under the
    /// priority policy its priority is recomputed first, from the quantum
    /// it used up.
    pub fn schedule_process(&mut self, pcb: &mut ProcessControlBlock) -> bool {
        let id = pcb.get_id();

        let inserted = match self.mode {
            SchedulerMode::Simple | SchedulerMode::RoundRobin => {
                self.ready_queue.insert_at_end(id, pcb.priority, ProcessState::Ready)
            }
            SchedulerMode::Priority => {
                pcb.priority = effective_priority(pcb.priority, pcb.quantum, self.initial_quantum);
                self.ready_queue.insert_sorted(id, pcb.priority, ProcessState::Ready)
            }
        };

        pcb.quantum = self.initial_quantum;
        inserted
    }

    pub fn unschedule(&mut self, id: Pid) -> bool {
        self.ready_queue.remove(id).is_some()
    }

    /// Moves a process to the position the policy gives a newcomer.
    pub fn requeue(&mut self, pcb: &mut ProcessControlBlock) -> bool {
        self.unschedule(pcb.get_id());
        self.schedule_process(pcb)
    }

    pub fn tick(&self, pcb: &mut ProcessControlBlock) {
        if self.mode.uses_quantum() {
            pcb.quantum = pcb.quantum.saturating_sub(1);
        }
    }

    pub fn quantum_expired(&self, pcb: &ProcessControlBlock) -> bool {
        self.mode.uses_quantum() && pcb.quantum == 0
    }

    pub fn next_ready(&self) -> Option<Pid> {
        self.ready_queue.front().map(|node| node.id)
    }

    /// Priority policy only: the best waiting process strictly outranks
    /// the running one.
    pub fn should_preempt(&self, current: Pid) -> bool {
        if self.mode != SchedulerMode::Priority {
            return false;
        }

        let running = match self.ready_queue.search(current) {
            Some(node) => node.priority,
            None => return false,
        };

        self.ready_queue
            .iter()
            .find(|node| node.id != current)
            .map_or(false, |head| head.priority > running)
    }

    /// Ready queue holds exactly the Ready processes of `table`, once each.
    pub fn is_consistent_with(&self, table: &ProcessTable) -> bool {
        let queued = self.ready_queue.ids();
        let mut unique = queued.clone();
        unique.sort_unstable();
        unique.dedup();

        let ready = table.live().filter(|pcb| pcb.state == ProcessState::Ready).count();

        unique.len() == queued.len()
            && queued.len() == ready
            && queued
                .iter()
                .all(|id| table.lookup(*id).map_or(false, |pcb| pcb.state == ProcessState::Ready))
    }

    #[cfg(test)]
    pub(crate) fn insert_node(&mut self, id: Pid, priority: f32) {
        self.ready_queue.insert_sorted(id, priority, ProcessState::Ready);
    }
}

/// Average of the static priority and the fraction of the quantum
/// consumed; processes that used more CPU rank higher next time.
pub fn effective_priority(priority: f32, remaining_quantum: u32, initial_quantum: u32) -> f32 {
    if initial_quantum == 0 {
        return priority;
    }

    let used = initial_quantum.saturating_sub(remaining_quantum) as f32;
    (priority + used / initial_quantum as f32) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcb(id: Pid, quantum: u32) -> ProcessControlBlock {
        ProcessControlBlock::new(id, 0, 1, quantum)
    }

    #[test]
    fn test_sts_fifo_order() {
        let mut sts = ShortTermScheduler::new(SchedulerMode::RoundRobin, 5);
        let mut first = pcb(0, 5);
        let mut second = pcb(1, 5);

        sts.schedule_process(&mut first);
        sts.schedule_process(&mut second);

        assert_eq!(sts.ready_queue().ids(), vec![0, 1]);
        assert_eq!(sts.next_ready(), Some(0));
    }

    #[test]
    fn test_sts_requeue_moves_to_tail_with_fresh_quantum() {
        let mut sts = ShortTermScheduler::new(SchedulerMode::RoundRobin, 5);
        let mut first = pcb(0, 5);
        let mut second = pcb(1, 5);
        sts.schedule_process(&mut first);
        sts.schedule_process(&mut second);

        first.quantum = 0;
        sts.requeue(&mut first);

        assert_eq!(sts.ready_queue().ids(), vec![1, 0]);
        assert_eq!(first.quantum, 5);
    }

    #[test]
    fn test_sts_tick_only_with_quantum() {
        let simple = ShortTermScheduler::new(SchedulerMode::Simple, 5);
        let round_robin = ShortTermScheduler::new(SchedulerMode::RoundRobin, 5);
        let mut process = pcb(0, 1);

        simple.tick(&mut process);
        assert_eq!(process.quantum, 1);
        assert!(!simple.quantum_expired(&process));

        round_robin.tick(&mut process);
        assert_eq!(process.quantum, 0);
        assert!(round_robin.quantum_expired(&process));

        round_robin.tick(&mut process);
        assert_eq!(process.quantum, 0);
    }

    #[test]
    fn test_effective_priority() {
        assert_eq!(effective_priority(0.0, 5, 5), 0.0);
        assert_eq!(effective_priority(0.0, 0, 5), 0.5);
        assert_eq!(effective_priority(0.5, 0, 4), 0.75);
        assert_eq!(effective_priority(1.0, 3, 4), 0.625);
    }

    #[test]
    fn test_sts_priority_recomputes_on_schedule() {
        let mut sts = ShortTermScheduler::new(SchedulerMode::Priority, 4);
        let mut busy = pcb(0, 0);
        let mut idle = pcb(1, 4);

        sts.schedule_process(&mut idle);
        sts.schedule_process(&mut busy);

        assert_eq!(busy.priority, 0.5);
        assert_eq!(busy.quantum, 4);
        assert_eq!(sts.ready_queue().ids(), vec![0, 1]);
    }

    #[test]
    fn test_sts_priority_preempts_on_higher_head() {
        let mut sts = ShortTermScheduler::new(SchedulerMode::Priority, 5);
        sts.insert_node(1, 0.8);
        sts.insert_node(0, 0.5);

        assert!(sts.should_preempt(0));
    }

    #[test]
    fn test_sts_priority_keeps_higher_running() {
        let mut sts = ShortTermScheduler::new(SchedulerMode::Priority, 5);
        sts.insert_node(0, 0.9);
        sts.insert_node(1, 0.8);

        assert!(!sts.should_preempt(0));
    }

    #[test]
    fn test_sts_priority_equal_does_not_preempt() {
        let mut sts = ShortTermScheduler::new(SchedulerMode::Priority, 5);
        sts.insert_node(0, 0.5);
        sts.insert_node(1, 0.5);

        assert!(!sts.should_preempt(0));
    }

    #[test]
    fn test_sts_round_robin_never_preempts_by_priority() {
        let mut sts = ShortTermScheduler::new(SchedulerMode::RoundRobin, 5);
        sts.insert_node(1, 0.8);
        sts.insert_node(0, 0.5);

        assert!(!sts.should_preempt(0));
    }

    #[test]
    fn test_sts_consistency_check() {
        let mut table = ProcessTable::new(3, 5);
        let mut sts = ShortTermScheduler::new(SchedulerMode::Simple, 5);

        let pcb = table.allocate(0, 1).unwrap();
        sts.schedule_process(pcb);
        table.allocate(0, 1).unwrap();

        assert!(!sts.is_consistent_with(&table));

        table.set_state(1, ProcessState::Blocked).unwrap();
        assert!(sts.is_consistent_with(&table));

        table.set_state(0, ProcessState::Blocked).unwrap();
        assert!(!sts.is_consistent_with(&table));
    }
}
