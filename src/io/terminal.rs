use std::collections::VecDeque;

use super::{DeviceId, Devices, Word, TERMINAL_COUNT};

use crate::error::DeviceError;

#[derive(Default)]
struct Terminal {
    input: VecDeque<Word>,
    output: Vec<Word>,
    screen_ready: bool,
    offline: bool,
}

/// Hosted device bank: four keyboard/screen terminals plus the real-time
/// clock and the interval timer.
pub struct Terminals {
    terminals: Vec<Terminal>,
    clock: Word,
    timer: Word,
    timer_interrupt: Word,
}

impl Default for Terminals {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminals {
    pub fn new() -> Terminals {
        let terminals = (0..TERMINAL_COUNT)
            .map(|_| Terminal {
                screen_ready: true,
                ..Terminal::default()
            })
            .collect();

        Terminals {
            terminals,
            clock: 0,
            timer: 0,
            timer_interrupt: 0,
        }
    }

    /// Queues a key press on the terminal's keyboard.
    pub fn push_input(&mut self, terminal: usize, value: Word) {
        if let Some(term) = self.terminals.get_mut(terminal) {
            term.input.push_back(value);
        }
    }

    pub fn set_screen_ready(&mut self, terminal: usize, ready: bool) {
        if let Some(term) = self.terminals.get_mut(terminal) {
            term.screen_ready = ready;
        }
    }

    /// An offline terminal fails every register access.
    pub fn set_offline(&mut self, terminal: usize, offline: bool) {
        if let Some(term) = self.terminals.get_mut(terminal) {
            term.offline = offline;
        }
    }

    pub fn output(&self, terminal: usize) -> &[Word] {
        self.terminals
            .get(terminal)
            .map(|term| term.output.as_slice())
            .unwrap_or(&[])
    }

    pub fn advance_clock(&mut self, amount: Word) {
        self.clock += amount;
    }

    pub fn clock(&self) -> Word {
        self.clock
    }

    pub fn timer(&self) -> Word {
        self.timer
    }

    fn terminal_mut(&mut self, device: DeviceId, terminal: usize) -> Result<&mut Terminal, DeviceError> {
        let term = self
            .terminals
            .get_mut(terminal)
            .ok_or(DeviceError::NoSuchDevice(device))?;

        if term.offline {
            return Err(DeviceError::Offline(device));
        }
        Ok(term)
    }
}

impl Devices for Terminals {
    fn read(&mut self, device: DeviceId) -> Result<Word, DeviceError> {
        match device {
            DeviceId::Keyboard(t) => self
                .terminal_mut(device, t)?
                .input
                .pop_front()
                .ok_or(DeviceError::NoData(device)),
            DeviceId::KeyboardReady(t) => Ok(Word::from(!self.terminal_mut(device, t)?.input.is_empty())),
            DeviceId::ScreenReady(t) => Ok(Word::from(self.terminal_mut(device, t)?.screen_ready)),
            DeviceId::Screen(_) => Err(DeviceError::InvalidAccess(device)),
            DeviceId::RealTimeClock => Ok(self.clock),
            DeviceId::Timer => Ok(self.timer),
            DeviceId::TimerInterrupt => Ok(self.timer_interrupt),
        }
    }

    fn write(&mut self, device: DeviceId, value: Word) -> Result<(), DeviceError> {
        match device {
            DeviceId::Screen(t) => {
                let term = self.terminal_mut(device, t)?;
                if !term.screen_ready {
                    return Err(DeviceError::NoData(device));
                }
                term.output.push(value);
                Ok(())
            }
            DeviceId::Timer => {
                self.timer = value;
                Ok(())
            }
            DeviceId::TimerInterrupt => {
                self.timer_interrupt = value;
                Ok(())
            }
            DeviceId::Keyboard(_)
            | DeviceId::KeyboardReady(_)
            | DeviceId::ScreenReady(_)
            | DeviceId::RealTimeClock => Err(DeviceError::InvalidAccess(device)),
        }
    }
}
