use super::{Memory, Word};

use crate::error::LoadError;

/// Executable image: words placed at a fixed load address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub name: String,
    pub load_address: usize,
    pub data: Vec<Word>,
}

impl Program {
    pub fn new(name: &str, load_address: usize, data: Vec<Word>) -> Program {
        Program {
            name: name.to_string(),
            load_address,
            data,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Copies the image into memory, word by word.
    pub fn write_into<M: Memory>(&self, memory: &mut M) -> Result<(), LoadError> {
        for (offset, word) in self.data.iter().enumerate() {
            memory
                .write(self.load_address + offset, *word)
                .map_err(|source| LoadError::Memory {
                    name: self.name.clone(),
                    source,
                })?;
        }

        log::debug!(
            "Loaded '{}' at {}-{}",
            self.name,
            self.load_address,
            self.load_address + self.size()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::WordMemory;

    #[test]
    fn test_program_write_into() {
        let mut memory = WordMemory::new(16);
        let program = Program::new("p.maq", 4, vec![7, 8, 9]);

        program.write_into(&mut memory).unwrap();

        assert_eq!(memory.read_block_from(4, 7).unwrap(), &[7, 8, 9]);
    }

    #[test]
    fn test_program_write_into_past_end() {
        let mut memory = WordMemory::new(4);
        let program = Program::new("big.maq", 2, vec![1, 2, 3]);

        let result = program.write_into(&mut memory);

        assert!(matches!(result, Err(LoadError::Memory { .. })));
    }
}
