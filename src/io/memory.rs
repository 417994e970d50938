use super::{Memory, Word};

use crate::error::MemoryError;

/// Flat, bounds-checked word memory.
pub struct WordMemory {
    data: Vec<Word>,
}

impl WordMemory {
    pub fn new(size: usize) -> WordMemory {
        WordMemory {
            data: vec![0; size],
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn read_block_from(&self, start_address: usize, end_address: usize) -> Result<&[Word], MemoryError> {
        if start_address > end_address {
            return Err(MemoryError::OutOfBounds(start_address));
        } else if end_address > self.data.len() {
            return Err(MemoryError::OutOfBounds(end_address));
        }

        Ok(&self.data[start_address..end_address])
    }

    pub fn write_block_to(&mut self, address: usize, data: &[Word]) -> Result<(), MemoryError> {
        let end_address = address + data.len();

        if end_address > self.data.len() {
            return Err(MemoryError::OutOfBounds(end_address));
        }

        self.data[address..end_address].copy_from_slice(data);
        Ok(())
    }

    /// Stores `text` as a null-terminated string.
    pub fn write_str(&mut self, address: usize, text: &str) -> Result<(), MemoryError> {
        let words: Vec<Word> = text.bytes().map(Word::from).chain(std::iter::once(0)).collect();
        self.write_block_to(address, &words)
    }
}

impl Memory for WordMemory {
    fn read(&self, address: usize) -> Result<Word, MemoryError> {
        self.data.get(address).copied().ok_or(MemoryError::OutOfBounds(address))
    }

    fn write(&mut self, address: usize, value: Word) -> Result<(), MemoryError> {
        let slot = self.data.get_mut(address).ok_or(MemoryError::OutOfBounds(address))?;
        *slot = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_from() {
        let memory = WordMemory::new(16);
        assert_eq!(memory.read(0), Ok(0));
    }

    #[test]
    fn test_memory_out_of_bounds_read_from() {
        let memory = WordMemory::new(16);
        assert_eq!(memory.read(16), Err(MemoryError::OutOfBounds(16)));
    }

    #[test]
    fn test_memory_write_to() {
        let mut memory = WordMemory::new(16);
        memory.write(0, 10).unwrap();
        assert_eq!(memory.read(0), Ok(10));
    }

    #[test]
    fn test_memory_out_of_bounds_write_to() {
        let mut memory = WordMemory::new(16);
        assert!(memory.write(16, 10).is_err());
    }

    #[test]
    fn test_memory_write_block_to() {
        let mut memory = WordMemory::new(16);
        memory.write_block_to(3, &[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(memory.read_block_from(3, 8).unwrap(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_memory_out_of_bounds_write_block_to() {
        let mut memory = WordMemory::new(16);
        assert!(memory.write_block_to(12, &[1, 2, 3, 4, 5]).is_err());
    }

    #[test]
    fn test_memory_invalid_range_read_block_from() {
        let memory = WordMemory::new(16);
        assert!(memory.read_block_from(5, 0).is_err());
    }

    #[test]
    fn test_memory_read_str() {
        let mut memory = WordMemory::new(32);
        memory.write_str(4, "init.maq").unwrap();
        assert_eq!(memory.read_str(4, 20), Some("init.maq".to_string()));
    }

    #[test]
    fn test_memory_read_str_missing_terminator() {
        let mut memory = WordMemory::new(32);
        memory.write_str(0, "abcdef").unwrap();
        assert_eq!(memory.read_str(0, 4), None);
    }

    #[test]
    fn test_memory_read_str_rejects_non_byte_word() {
        let mut memory = WordMemory::new(32);
        memory.write_block_to(0, &[104, 300, 0]).unwrap();
        assert_eq!(memory.read_str(0, 10), None);
    }

    #[test]
    fn test_memory_read_str_past_end() {
        let mut memory = WordMemory::new(4);
        memory.write_block_to(0, &[97, 98, 99, 100]).unwrap();
        assert_eq!(memory.read_str(0, 10), None);
    }
}
