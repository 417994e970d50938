//! Collaborator interfaces consumed by the kernel core, together with
//! hosted implementations used by the binary and the tests.

pub mod disk;
pub mod loader;
pub mod memory;
pub mod program;
pub mod terminal;

pub use disk::ProgramStore;
pub use loader::load_program_file;
pub use memory::WordMemory;
pub use program::Program;
pub use terminal::Terminals;

use crate::error::{DeviceError, LoadError, MemoryError};

/// Machine word of the simulated CPU.
pub type Word = i32;

/// Number of terminals attached to the machine.
pub const TERMINAL_COUNT: usize = 4;

/// Device registers reachable through [`Devices`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceId {
    Keyboard(usize),
    KeyboardReady(usize),
    Screen(usize),
    ScreenReady(usize),
    RealTimeClock,
    Timer,
    TimerInterrupt,
}

/// Word-addressed main memory.
pub trait Memory {
    fn read(&self, address: usize) -> Result<Word, MemoryError>;

    fn write(&mut self, address: usize, value: Word) -> Result<(), MemoryError>;

    /// Copies a null-terminated string starting at `address`.
    ///
    /// Fails on a read error, on a word that is not a byte, or when no
    /// terminator shows up within `max_len` words.
    fn read_str(&self, address: usize, max_len: usize) -> Option<String> {
        let mut result = String::new();

        for offset in 0..max_len {
            let word = self.read(address.checked_add(offset)?).ok()?;
            let byte = u8::try_from(word).ok()?;

            if byte == 0 {
                return Some(result);
            }
            result.push(byte as char);
        }

        None
    }
}

/// Device register bank: terminals, real-time clock and timer.
pub trait Devices {
    fn read(&mut self, device: DeviceId) -> Result<Word, DeviceError>;

    fn write(&mut self, device: DeviceId, value: Word) -> Result<(), DeviceError>;
}

/// Resolves program names to executable images.
pub trait ProgramLoader {
    fn load(&self, name: &str) -> Result<Program, LoadError>;
}
