use std::collections::HashMap;

use super::{Program, ProgramLoader};

use crate::error::LoadError;

/// In-memory program storage, keyed by executable name.
#[derive(Default)]
pub struct ProgramStore {
    program_map: HashMap<String, Program>,
}

impl ProgramStore {
    pub fn new() -> ProgramStore {
        ProgramStore {
            program_map: HashMap::new(),
        }
    }

    pub fn write_program(&mut self, program: Program) {
        self.program_map.insert(program.name.clone(), program);
    }

    pub fn len(&self) -> usize {
        self.program_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.program_map.is_empty()
    }
}

impl ProgramLoader for ProgramStore {
    fn load(&self, name: &str) -> Result<Program, LoadError> {
        self.program_map
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(name.to_string()))
    }
}
