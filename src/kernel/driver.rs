use super::*;

use crate::config::{KernelConfig, RegisterLayout};
use crate::error::{InternalError, KernelError, KernelResult, LoadError, MemoryError};
use crate::io::{DeviceId, Devices, Memory, Program, ProgramLoader, Word};

/// What the trap handler does once the kernel returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Return from the interrupt into the restored process.
    Resume,
    /// Stop the CPU until the next interrupt.
    Halt,
}

impl Dispatch {
    /// Value handed back to the trap handler code.
    pub fn code(&self) -> Word {
        match self {
            Dispatch::Resume => 0,
            Dispatch::Halt => 1,
        }
    }
}

/// The kernel instance. Owns its collaborators and all kernel state; every
/// trap runs through [`Driver::handle_trap`] to completion.
pub struct Driver<M: Memory, D: Devices, L: ProgramLoader> {
    pub(super) memory: M,
    pub(super) devices: D,
    pub(super) loader: L,
    pub(super) config: KernelConfig,

    pub(super) table: ProcessTable,
    pub(super) all_processes: ProcessQueue,
    pub(super) sts: ShortTermScheduler,
    pub(super) terminals: DeviceTable,
    pub(super) ledger: HistoryLedger,

    pub(super) current: Option<Pid>,
    pub(super) booted: bool,
    pub(super) internal_error: Option<InternalError>,
    pub(super) report: Option<MetricsReport>,

    clock: i64,
    idle_since: Option<i64>,
    running_since: Option<i64>,
    last_dispatched: Option<Pid>,
}

impl<M: Memory, D: Devices, L: ProgramLoader> Driver<M, D, L> {
    pub fn new(config: KernelConfig, memory: M, devices: D, loader: L) -> Driver<M, D, L> {
        let mut driver = Driver {
            table: ProcessTable::new(config.max_processes, config.initial_quantum),
            all_processes: ProcessQueue::new(),
            sts: ShortTermScheduler::new(config.scheduler, config.initial_quantum),
            terminals: DeviceTable::new(),
            ledger: HistoryLedger::new(0),
            memory,
            devices,
            loader,
            config,
            current: None,
            booted: false,
            internal_error: None,
            report: None,
            clock: 0,
            idle_since: None,
            running_since: None,
            last_dispatched: None,
        };

        let started_at = driver.now();
        driver.ledger = HistoryLedger::new(started_at);
        driver
    }

    /// Kernel entry point, called with the interrupt identifier. Runs
    /// SaveState, HandleIrq, HandlePending, Schedule and Dispatch in order.
    pub fn handle_trap(&mut self, irq_code: Word) -> Dispatch {
        let irq = IrqKind::from_code(irq_code);
        log::trace!("Received IRQ {} ({})", irq_code, irq.name());

        if let Some(err) = &self.internal_error {
            log::error!("Kernel halted after internal error: {}", err);
            return Dispatch::Halt;
        }

        self.save_state();
        if self.internal_error.is_some() {
            return Dispatch::Halt;
        }

        self.handle_irq(irq, irq_code);
        self.handle_pending();
        self.schedule();
        let dispatch = self.dispatch();

        debug_assert!(self.is_consistent(), "ready queue out of step with the process table");
        dispatch
    }

    fn save_state(&mut self) {
        let pid = match self.current {
            Some(pid) => pid,
            None => return,
        };

        let registers = match self.read_registers() {
            Ok(registers) => registers,
            Err(err) => {
                self.raise(InternalError::RegisterRead(err));
                return;
            }
        };

        let now = self.now();
        let running_since = self.running_since.take();

        if let Some(pcb) = self.table.lookup_mut(pid) {
            pcb.registers = registers;
            if let Some(since) = running_since {
                pcb.cpu_time += now - since;
            }
        }
    }

    fn handle_irq(&mut self, irq: IrqKind, irq_code: Word) {
        self.ledger.record_irq(self.current, irq);

        match irq {
            IrqKind::Reset => self.handle_reset(),
            IrqKind::SystemCall => self.handle_syscall(),
            IrqKind::CpuError => self.handle_cpu_error(),
            IrqKind::ClockTick => self.handle_clock(),
            IrqKind::Unknown => self.handle_unknown(irq_code),
        }
    }

    fn handle_pending(&mut self) {
        if let Some(pid) = self.current {
            if let Some(pcb) = self.table.lookup(pid) {
                if pcb.pending == PendingOp::None && self.terminals.release(pcb.get_terminal(), pid) {
                    log::debug!("Process {} released terminal {}", pid, pcb.get_terminal());
                }
            }
        }

        let evicted = self.all_processes.evict_dead(&self.table);
        if !evicted.is_empty() {
            log::warn!("Evicted stale process list entries {:?}", evicted);
        }

        let blocked: Vec<Pid> = self
            .all_processes
            .iter()
            .filter(|node| {
                self.table
                    .lookup(node.id)
                    .map_or(false, |pcb| pcb.state == ProcessState::Blocked)
            })
            .map(|node| node.id)
            .collect();

        for pid in blocked {
            self.try_unblock(pid);
        }

        if let Some(pid) = self.current {
            let expired = self
                .table
                .lookup(pid)
                .map_or(false, |pcb| pcb.state == ProcessState::Ready && self.sts.quantum_expired(pcb));

            if expired {
                self.preempt(pid, "quantum expired");
            }
        }
    }

    /// Picks the process to run. The running process keeps the CPU while
    /// it is Ready, unless the priority policy finds a better one waiting.
    fn schedule(&mut self) {
        if let Some(pid) = self.current {
            let running = self.table.lookup(pid).map_or(false, |pcb| pcb.state == ProcessState::Ready);
            if running && self.sts.should_preempt(pid) {
                self.preempt(pid, "outranked by a ready process");
            }
        }

        let keep = self
            .current
            .and_then(|pid| self.table.lookup(pid))
            .map_or(false, |pcb| pcb.state == ProcessState::Ready);

        if !keep {
            self.current = self.sts.next_ready();
            match self.current {
                Some(pid) => log::debug!("Scheduled process {}", pid),
                None => log::debug!("No process ready to run"),
            }
        }

        if let Some(pid) = self.current {
            self.claim_pending_terminal(pid);
        }
    }

    fn dispatch(&mut self) -> Dispatch {
        let now = self.now();

        match self.current {
            None => {
                if self.idle_since.is_none() {
                    self.idle_since = Some(now);
                }
                self.last_dispatched = None;
            }
            Some(_) => {
                if let Some(since) = self.idle_since.take() {
                    self.ledger.record_idle(now - since);
                }
            }
        }

        if self.internal_error.is_some() {
            return Dispatch::Halt;
        }

        let pid = match self.current {
            Some(pid) => pid,
            None => return Dispatch::Halt,
        };
        let registers = match self.table.lookup(pid) {
            Some(pcb) => pcb.registers,
            None => return Dispatch::Halt,
        };

        if let Err(source) = self.write_registers(&registers) {
            self.raise(InternalError::RegisterWrite { pid, source });
            return Dispatch::Halt;
        }

        if self.last_dispatched != Some(pid) {
            if let Some(pcb) = self.table.lookup_mut(pid) {
                pcb.exec_count += 1;
            }
            self.last_dispatched = Some(pid);
        }
        if let Err(err) = self.ledger.record_dispatched(pid, now) {
            log::warn!("No history for dispatched process {}: {}", pid, err);
        }
        self.running_since = Some(now);

        Dispatch::Resume
    }

    fn handle_reset(&mut self) {
        if self.booted {
            log::warn!("Ignoring reset after boot");
            return;
        }
        self.booted = true;

        let handler_name = self.config.trap_handler_program.clone();
        match self.load_program(&handler_name) {
            Ok(program) if program.load_address as Word != self.config.trap_handler_address => {
                self.raise(InternalError::TrapHandlerMisplaced {
                    expected: self.config.trap_handler_address,
                    actual: program.load_address as Word,
                });
            }
            Ok(_) => {}
            Err(err) => self.raise(InternalError::BootLoad(err)),
        }

        if let Err(err) = self.devices.write(DeviceId::Timer, self.config.timer_interval) {
            self.raise(InternalError::Timer(err));
        }

        let init_name = self.config.init_program.clone();
        let init = match self.load_program(&init_name) {
            Ok(program) => program,
            Err(err) => {
                self.raise(InternalError::BootLoad(err));
                return;
            }
        };

        match self.create_process(&init) {
            Ok(pid) => {
                log::info!("Init process {} loaded at {}", pid, init.load_address);
                self.current = Some(pid);
            }
            Err(_) => self.raise(InternalError::InitAllocation),
        }
    }

    fn handle_cpu_error(&mut self) {
        let pid = match self.current {
            Some(pid) => pid,
            None => return self.raise(InternalError::NoCurrentProcess(IrqKind::CpuError)),
        };

        let code = self.table.lookup(pid).map_or(0, |pcb| pcb.registers.error);
        log::warn!("Process {} faulted with CPU error {}, killing it", pid, code);
        self.kill_or_warn(pid);
    }

    fn handle_clock(&mut self) {
        let rearm = self
            .devices
            .write(DeviceId::TimerInterrupt, 0)
            .and_then(|_| self.devices.write(DeviceId::Timer, self.config.timer_interval));

        if let Err(err) = rearm {
            self.raise(InternalError::Timer(err));
        }

        if let Some(pcb) = self.current.and_then(|pid| self.table.lookup_mut(pid)) {
            self.sts.tick(pcb);
        }
    }

    fn handle_unknown(&mut self, irq_code: Word) {
        match self.current {
            Some(pid) => {
                log::warn!("Unknown IRQ {} raised by process {}, killing it", irq_code, pid);
                self.kill_or_warn(pid);
            }
            None => self.raise(InternalError::NoCurrentProcess(IrqKind::Unknown)),
        }
    }

    /// Allocates, queues and starts accounting for a process running
    /// `program`, which must already be in memory.
    pub(super) fn create_process(&mut self, program: &Program) -> KernelResult<Pid> {
        let now = self.now();

        let pcb = self.table.allocate(program.load_address, program.size())?;
        let pid = pcb.get_id();

        self.sts.schedule_process(pcb);
        self.all_processes.insert_at_end(pid, pcb.priority, ProcessState::Ready);
        self.ledger.create(pid, now)?;
        self.ledger.record_enqueued(pid, now)?;

        log::info!(
            "Created process {} from '{}' at {} ({} words)",
            pid,
            program.name,
            program.load_address,
            program.size()
        );
        Ok(pid)
    }

    /// Terminates `pid` at once: out of every queue, slot freed, terminal
    /// released, waiters woken. Killing process 0 produces the report.
    pub(super) fn kill_process(&mut self, pid: Pid) -> KernelResult<()> {
        if !self.table.is_alive(pid) {
            return Err(KernelError::NotFound(pid));
        }

        let now = self.now();
        self.change_state(pid, ProcessState::Dead)?;

        match self.ledger.finalize(pid, now) {
            Ok(lifetime) => log::info!("Process {} terminated after {}", pid, lifetime),
            Err(err) => log::error!("Could not finalize process {}: {}", pid, err),
        }

        self.terminals.release_all(pid);
        if self.current == Some(pid) {
            self.current = None;
        }
        self.wake_waiters(pid);

        if pid == 0 {
            let report = self.ledger.report(now);
            log::info!("Metrics:\n{}", report);
            self.report = Some(report);
        }
        Ok(())
    }

    fn kill_or_warn(&mut self, pid: Pid) {
        if let Err(err) = self.kill_process(pid) {
            log::warn!("Could not kill process {}: {}", pid, err);
        }
    }

    fn wake_waiters(&mut self, dead: Pid) {
        let waiters: Vec<Pid> = self
            .table
            .live()
            .filter(|pcb| pcb.state == ProcessState::Blocked && pcb.awaited == Some(dead))
            .map(|pcb| pcb.get_id())
            .collect();

        for pid in waiters {
            if let Some(pcb) = self.table.lookup_mut(pid) {
                pcb.awaited = None;
                pcb.registers.a = 0;
            }
            log::debug!("Process {} stops waiting for {}", pid, dead);
            self.change_state_or_warn(pid, ProcessState::Ready);
        }
    }

    /// Moves `pid` to `state`, keeping the ready queue, the process list
    /// and the history in step with the table.
    pub(super) fn change_state(&mut self, pid: Pid, state: ProcessState) -> KernelResult<()> {
        let previous = self.table.lookup(pid).ok_or(KernelError::NotFound(pid))?.state;
        if previous == state {
            return Ok(());
        }

        let now = self.now();
        self.table.set_state(pid, state)?;
        self.all_processes.set_cached_state(pid, state);
        self.ledger.record_transition(pid, state, now)?;

        match state {
            ProcessState::Ready => {
                if let Some(pcb) = self.table.lookup_mut(pid) {
                    self.sts.schedule_process(pcb);
                }
                self.ledger.record_enqueued(pid, now)?;
            }
            ProcessState::Blocked => {
                self.sts.unschedule(pid);
            }
            ProcessState::Dead => {
                self.sts.unschedule(pid);
                self.all_processes.remove(pid);
            }
        }

        log::debug!("Process {}: {} -> {}", pid, previous.name(), state.name());
        Ok(())
    }

    pub(super) fn change_state_or_warn(&mut self, pid: Pid, state: ProcessState) {
        if let Err(err) = self.change_state(pid, state) {
            log::warn!("Could not move process {} to {}: {}", pid, state.name(), err);
        }
    }

    /// Requeues the running process with a fresh quantum and gives up the
    /// CPU. A process alone in the queue is counted as preempted too and
    /// gets picked again.
    fn preempt(&mut self, pid: Pid, reason: &str) {
        let now = self.now();
        if let Some(pcb) = self.table.lookup_mut(pid) {
            self.sts.requeue(pcb);
        }
        if let Err(err) = self
            .ledger
            .record_preemption(pid)
            .and_then(|_| self.ledger.record_enqueued(pid, now))
        {
            log::warn!("No history for preempted process {}: {}", pid, err);
        }

        self.current = None;
        log::debug!("Preempted process {}: {}", pid, reason);
    }

    fn claim_pending_terminal(&mut self, pid: Pid) {
        let pcb = match self.table.lookup_mut(pid) {
            Some(pcb) => pcb,
            None => return,
        };
        if pcb.pending == PendingOp::None {
            return;
        }

        let terminal = pcb.get_terminal();
        if self.terminals.claim(terminal, pid) {
            pcb.pending = PendingOp::None;
            log::debug!("Process {} claimed terminal {}", pid, terminal);
        } else {
            log::warn!(
                "Process {} cannot claim terminal {}, held by {:?}",
                pid,
                terminal,
                self.terminals.holder(terminal)
            );
        }
    }

    /// A terminal can serve `pid` when it is free or already held by it,
    /// and no other Ready process is still waiting to claim it.
    pub(super) fn terminal_available(&self, pid: Pid, terminal: usize) -> bool {
        let reserved = self.table.live().any(|pcb| {
            pcb.get_id() != pid
                && pcb.get_terminal() == terminal
                && pcb.state == ProcessState::Ready
                && pcb.pending != PendingOp::None
        });

        !reserved && self.terminals.is_available_to(terminal, pid)
    }

    /// Reads a device status register. An access error counts as not
    /// ready, the same as a zero status.
    pub(super) fn device_ready(&mut self, device: DeviceId) -> bool {
        match self.devices.read(device) {
            Ok(status) => status != 0,
            Err(err) => {
                log::debug!("Device status read failed: {}", err);
                false
            }
        }
    }

    pub(super) fn load_program(&mut self, name: &str) -> Result<Program, LoadError> {
        let program = self.loader.load(name)?;
        program.write_into(&mut self.memory)?;
        Ok(program)
    }

    fn read_registers(&self) -> Result<Registers, MemoryError> {
        let layout: RegisterLayout = self.config.registers;

        Ok(Registers {
            pc: self.memory.read(layout.pc)?,
            a: self.memory.read(layout.a)?,
            x: self.memory.read(layout.x)?,
            error: self.memory.read(layout.error)?,
        })
    }

    fn write_registers(&mut self, registers: &Registers) -> Result<(), MemoryError> {
        let layout: RegisterLayout = self.config.registers;

        self.memory.write(layout.a, registers.a)?;
        self.memory.write(layout.pc, registers.pc)?;
        self.memory.write(layout.error, registers.error)?;
        self.memory.write(layout.x, registers.x)
    }

    pub(super) fn raise(&mut self, err: InternalError) {
        log::error!("Internal error: {}", err);
        if self.internal_error.is_none() {
            self.internal_error = Some(err);
        }
    }

    pub(super) fn now(&mut self) -> i64 {
        match self.devices.read(DeviceId::RealTimeClock) {
            Ok(time) => self.clock = i64::from(time),
            Err(err) => log::warn!("Clock read failed, reusing last time: {}", err),
        }
        self.clock
    }

    /// Ready queue matches the table and the process list holds exactly
    /// the live processes.
    pub fn is_consistent(&self) -> bool {
        let listed = self.all_processes.len() == self.table.occupancy()
            && self.all_processes.iter().all(|node| {
                self.table
                    .lookup(node.id)
                    .map_or(false, |pcb| pcb.state == node.cached_state)
            });

        listed && self.sts.is_consistent_with(&self.table)
    }

    pub fn current(&self) -> Option<Pid> {
        self.current
    }

    pub fn process(&self, pid: Pid) -> Option<&ProcessControlBlock> {
        self.table.lookup(pid)
    }

    pub fn process_table(&self) -> &ProcessTable {
        &self.table
    }

    pub fn ready_queue(&self) -> &ProcessQueue {
        self.sts.ready_queue()
    }

    pub fn all_processes(&self) -> &ProcessQueue {
        &self.all_processes
    }

    pub fn terminals(&self) -> &DeviceTable {
        &self.terminals
    }

    pub fn history(&self) -> &HistoryLedger {
        &self.ledger
    }

    pub fn internal_error(&self) -> Option<&InternalError> {
        self.internal_error.as_ref()
    }

    /// Metrics produced when process 0 was killed.
    pub fn report(&self) -> Option<&MetricsReport> {
        self.report.as_ref()
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    pub fn devices(&self) -> &D {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut D {
        &mut self.devices
    }
}
