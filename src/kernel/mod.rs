mod devices;
mod driver;
mod history;
mod process_control_block;
mod process_table;
mod queue;
mod short_term_scheduler;
mod syscall;

pub use devices::DeviceTable;
pub use driver::{Dispatch, Driver};
pub use history::{HistoryLedger, IrqKind, Lifetime, MetricsReport, ProcessHistory, ProcessReport, RunStats};
pub use process_control_block::{PendingOp, Pid, ProcessControlBlock, ProcessState, Registers};
pub use process_table::ProcessTable;
pub use queue::{ProcessQueue, QueueNode};
pub use short_term_scheduler::{effective_priority, ShortTermScheduler};
pub use syscall::Syscall;
