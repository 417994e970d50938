//! Kernel configuration.
//!
//! Every field has a default, so a configuration file only needs the
//! values it wants to change.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scheduling policy, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulerMode {
    #[default]
    Simple,
    RoundRobin,
    Priority,
}

impl SchedulerMode {
    /// Whether the policy runs processes on a clock-tick quantum.
    pub fn uses_quantum(&self) -> bool {
        !matches!(self, SchedulerMode::Simple)
    }
}

impl std::str::FromStr for SchedulerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" => Ok(SchedulerMode::Simple),
            "round-robin" | "rr" => Ok(SchedulerMode::RoundRobin),
            "priority" => Ok(SchedulerMode::Priority),
            other => Err(format!("unknown scheduler '{}'", other)),
        }
    }
}

/// Memory addresses where the trap handler leaves the interrupted CPU
/// registers and picks them up again on return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterLayout {
    pub pc: usize,
    pub a: usize,
    pub error: usize,
    pub x: usize,
}

impl Default for RegisterLayout {
    fn default() -> Self {
        Self {
            pc: 0,
            a: 1,
            error: 3,
            x: 59,
        }
    }
}

impl RegisterLayout {
    fn highest(&self) -> usize {
        self.pc.max(self.a).max(self.error).max(self.x)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub scheduler: SchedulerMode,

    /// Capacity of the process table.
    pub max_processes: usize,

    /// Clock ticks granted per quantum.
    pub initial_quantum: u32,

    /// Instructions between clock interrupts.
    pub timer_interval: i32,

    /// Words of memory in the hosted machine.
    pub memory_size: usize,

    pub trap_handler_address: i32,
    pub trap_handler_program: String,
    pub init_program: String,

    /// Upper bound on program names copied out of process memory.
    pub max_name_len: usize,

    pub registers: RegisterLayout,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerMode::Simple,
            max_processes: 4,
            initial_quantum: 5,
            timer_interval: 50,
            memory_size: 10_000,
            trap_handler_address: 10,
            trap_handler_program: "trap_handler.maq".into(),
            init_program: "init.maq".into(),
            max_name_len: 100,
            registers: RegisterLayout::default(),
        }
    }
}

impl KernelConfig {
    /// Load configuration from a JSON file and validate it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: KernelConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_processes == 0 {
            return Err(ConfigError::Invalid("max_processes must be at least 1".into()));
        }
        if self.initial_quantum == 0 {
            return Err(ConfigError::Invalid("initial_quantum must be at least 1".into()));
        }
        if self.timer_interval <= 0 {
            return Err(ConfigError::Invalid("timer_interval must be positive".into()));
        }
        if self.registers.highest() >= self.memory_size {
            return Err(ConfigError::Invalid(format!(
                "register save area ends at {} but memory has {} words",
                self.registers.highest(),
                self.memory_size
            )));
        }
        if self.max_name_len == 0 {
            return Err(ConfigError::Invalid("max_name_len must be at least 1".into()));
        }
        Ok(())
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerMode) -> Self {
        self.scheduler = scheduler;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
