//! Scripted machine: the kernel wired to hosted memory, terminals and a
//! program store, driven by a list of interrupt events instead of a CPU.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::config::KernelConfig;
use crate::error::ScriptError;
use crate::io::{Memory, ProgramStore, Terminals, Word, WordMemory, TERMINAL_COUNT};
use crate::kernel::{Dispatch, Driver, IrqKind};

const RESET: Word = 0;
const CPU_ERROR: Word = 1;
const SYSTEM_CALL: Word = 2;
const CLOCK_TICK: Word = 3;

/// One line of a trap script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptEvent {
    Reset,
    Tick(u32),
    Syscall { number: Word, x: Option<Word> },
    Fault(Word),
    Irq(Word),
    Key { terminal: usize, value: Word },
    Screen { terminal: usize, ready: bool },
    Offline(usize),
    Online(usize),
    Advance(Word),
    Text { address: usize, text: String },
}

pub type HostedDriver = Driver<WordMemory, Terminals, ProgramStore>;

pub struct Machine {
    driver: HostedDriver,
    signals: Vec<Dispatch>,
}

impl Machine {
    pub fn new(config: KernelConfig, programs: ProgramStore) -> Machine {
        let memory = WordMemory::new(config.memory_size);

        Machine {
            driver: Driver::new(config, memory, Terminals::new(), programs),
            signals: Vec::new(),
        }
    }

    pub fn driver(&self) -> &HostedDriver {
        &self.driver
    }

    /// Dispatch signal returned by every trap so far.
    pub fn signals(&self) -> &[Dispatch] {
        &self.signals
    }

    pub fn last_signal(&self) -> Option<Dispatch> {
        self.signals.last().copied()
    }

    pub fn output(&self, terminal: usize) -> &[Word] {
        self.driver.devices().output(terminal)
    }

    pub fn run(&mut self, events: &[ScriptEvent]) -> Result<(), ScriptError> {
        for event in events {
            self.step(event)?;
        }
        Ok(())
    }

    pub fn step(&mut self, event: &ScriptEvent) -> Result<(), ScriptError> {
        match event {
            ScriptEvent::Reset => self.trap(RESET),
            ScriptEvent::Tick(count) => {
                for _ in 0..*count {
                    self.driver.devices_mut().advance_clock(1);
                    self.trap(CLOCK_TICK);
                }
            }
            ScriptEvent::Syscall { number, x } => {
                let layout = self.driver.config().registers;
                self.driver.memory_mut().write(layout.a, *number)?;
                if let Some(x) = x {
                    self.driver.memory_mut().write(layout.x, *x)?;
                }
                self.trap(SYSTEM_CALL);
            }
            ScriptEvent::Fault(code) => {
                let layout = self.driver.config().registers;
                self.driver.memory_mut().write(layout.error, *code)?;
                self.trap(CPU_ERROR);
            }
            ScriptEvent::Irq(code) => self.trap(*code),
            ScriptEvent::Key { terminal, value } => self.driver.devices_mut().push_input(*terminal, *value),
            ScriptEvent::Screen { terminal, ready } => self.driver.devices_mut().set_screen_ready(*terminal, *ready),
            ScriptEvent::Offline(terminal) => self.driver.devices_mut().set_offline(*terminal, true),
            ScriptEvent::Online(terminal) => self.driver.devices_mut().set_offline(*terminal, false),
            ScriptEvent::Advance(amount) => self.driver.devices_mut().advance_clock(*amount),
            ScriptEvent::Text { address, text } => self.driver.memory_mut().write_str(*address, text)?,
        }
        Ok(())
    }

    fn trap(&mut self, irq: Word) {
        let signal = self.driver.handle_trap(irq);
        log::trace!("{} trap returned {:?}", IrqKind::from_code(irq).name(), signal);
        self.signals.push(signal);
    }
}

pub fn load_script(path: &Path) -> Result<Vec<ScriptEvent>, ScriptError> {
    let file = File::open(path)?;
    parse_script(BufReader::new(file))
}

/// Parses one event per line. Blank lines and lines starting with `#`
/// are skipped.
pub fn parse_script<R: BufRead>(reader: R) -> Result<Vec<ScriptEvent>, ScriptError> {
    let mut events = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        events.push(parse_event(idx + 1, line)?);
    }

    Ok(events)
}

fn parse_event(line_num: usize, line: &str) -> Result<ScriptEvent, ScriptError> {
    let mut inputs = line.split_whitespace();
    let command = inputs.next().unwrap_or_default();

    let event = match command {
        "reset" => ScriptEvent::Reset,
        "tick" => ScriptEvent::Tick(optional(line_num, inputs.next())?.unwrap_or(1)),
        "syscall" => ScriptEvent::Syscall {
            number: required(line_num, inputs.next(), "system call number")?,
            x: optional(line_num, inputs.next())?,
        },
        "fault" => ScriptEvent::Fault(required(line_num, inputs.next(), "error code")?),
        "irq" => ScriptEvent::Irq(required(line_num, inputs.next(), "interrupt code")?),
        "key" => ScriptEvent::Key {
            terminal: terminal(line_num, inputs.next())?,
            value: required(line_num, inputs.next(), "key value")?,
        },
        "screen" => {
            let terminal = terminal(line_num, inputs.next())?;
            let ready = match inputs.next() {
                Some("on") => true,
                Some("off") => false,
                _ => return Err(parse_error(line_num, "screen expects 'on' or 'off'")),
            };
            ScriptEvent::Screen { terminal, ready }
        }
        "offline" => ScriptEvent::Offline(terminal(line_num, inputs.next())?),
        "online" => ScriptEvent::Online(terminal(line_num, inputs.next())?),
        "advance" => ScriptEvent::Advance(required(line_num, inputs.next(), "time amount")?),
        "string" => {
            let address = required(line_num, inputs.next(), "address")?;
            let text = inputs.next().ok_or_else(|| parse_error(line_num, "missing text"))?;
            ScriptEvent::Text {
                address,
                text: text.to_string(),
            }
        }
        other => return Err(parse_error(line_num, &format!("unknown event '{}'", other))),
    };

    if inputs.next().is_some() {
        return Err(parse_error(line_num, "trailing input"));
    }
    Ok(event)
}

fn required<T: std::str::FromStr>(line_num: usize, input: Option<&str>, what: &str) -> Result<T, ScriptError> {
    optional(line_num, input)?.ok_or_else(|| parse_error(line_num, &format!("missing {}", what)))
}

fn optional<T: std::str::FromStr>(line_num: usize, input: Option<&str>) -> Result<Option<T>, ScriptError> {
    input
        .map(|text| {
            text.parse::<T>()
                .map_err(|_| parse_error(line_num, &format!("bad number '{}'", text)))
        })
        .transpose()
}

fn terminal(line_num: usize, input: Option<&str>) -> Result<usize, ScriptError> {
    let terminal = required(line_num, input, "terminal")?;
    if terminal >= TERMINAL_COUNT {
        return Err(parse_error(line_num, &format!("no terminal {}", terminal)));
    }
    Ok(terminal)
}

fn parse_error(line: usize, reason: &str) -> ScriptError {
    ScriptError::Parse {
        line,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Program;

    fn machine() -> Machine {
        let mut store = ProgramStore::new();
        store.write_program(Program::new("trap_handler.maq", 10, vec![0; 4]));
        store.write_program(Program::new("init.maq", 100, vec![0; 20]));
        Machine::new(KernelConfig::default(), store)
    }

    #[test]
    fn test_parse_script_events() {
        let script = "\
# boot and echo one key
reset
key 0 65
syscall 1
syscall 2 65
tick 3
screen 1 off
string 110 child.maq
";
        let events = parse_script(script.as_bytes()).unwrap();

        assert_eq!(
            events,
            vec![
                ScriptEvent::Reset,
                ScriptEvent::Key { terminal: 0, value: 65 },
                ScriptEvent::Syscall { number: 1, x: None },
                ScriptEvent::Syscall { number: 2, x: Some(65) },
                ScriptEvent::Tick(3),
                ScriptEvent::Screen {
                    terminal: 1,
                    ready: false
                },
                ScriptEvent::Text {
                    address: 110,
                    text: "child.maq".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parse_script_reports_line() {
        let result = parse_script("reset\n\nkey 9 1\n".as_bytes());

        match result {
            Err(ScriptError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_script_unknown_event() {
        assert!(parse_script("jump 4\n".as_bytes()).is_err());
        assert!(parse_script("tick 1 2\n".as_bytes()).is_err());
    }

    #[test]
    fn test_machine_echo() {
        let mut machine = machine();
        let events = parse_script("reset\nkey 0 42\nsyscall 1\nsyscall 2 42\n".as_bytes()).unwrap();

        machine.run(&events).unwrap();

        assert_eq!(machine.output(0), &[42]);
        assert_eq!(machine.signals(), &[Dispatch::Resume; 3]);
        assert_eq!(machine.driver().process(0).unwrap().registers.a, 0);
    }

    #[test]
    fn test_machine_tick_advances_clock() {
        let mut machine = machine();
        machine.run(&[ScriptEvent::Reset, ScriptEvent::Tick(4)]).unwrap();

        assert_eq!(machine.driver().devices().clock(), 4);
        assert_eq!(machine.signals().len(), 5);
    }
}
