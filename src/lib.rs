//! Kernel core of a single-processor machine simulator.
//!
//! [`kernel::Driver`] is entered once per interrupt and decides which
//! process the CPU runs next. The [`io`] module defines what the kernel
//! needs from the machine and provides hosted stand-ins, and [`machine`]
//! replays scripted interrupts against them.

pub mod config;
pub mod error;
pub mod io;
pub mod kernel;
pub mod machine;
