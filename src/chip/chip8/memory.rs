use crate::chip::{
    chip8::constants::{CHIP8_CHARSET, CHIP8_CHARSET_OFFSET, CHIP8_MEMORY_SIZE},
    ChipError,
};

// NB. addresses are u16 as per the chip-8; lengths are usize to stop endless casting

/// The flat 4096 byte address space of the CHIP-8. Every access is bounds
/// checked and reports `ChipError::AddressOutOfRange` instead of touching
/// anything outside of the buffer.
#[derive(Clone)]
pub struct Memory {
    bytes: Box<[u8; CHIP8_MEMORY_SIZE]>,
}

impl Memory {
    /// Creates zeroed memory with the charset installed at `CHIP8_CHARSET_OFFSET`.
    pub fn new() -> Self {
        let mut memory = Memory {
            bytes: Box::new([0; CHIP8_MEMORY_SIZE]),
        };
        memory.install_charset();
        memory
    }

    /// Writes the charset to `CHIP8_CHARSET_OFFSET`, replacing whatever a
    /// program may have stored there.
    pub fn install_charset(&mut self) {
        let offset = CHIP8_CHARSET_OFFSET as usize;
        self.bytes[offset..offset + CHIP8_CHARSET.len()].copy_from_slice(&CHIP8_CHARSET);
    }

    /// Reads the byte stored at `address`.
    pub fn read(&self, address: u16) -> Result<u8, ChipError> {
        self.bytes
            .get(address as usize)
            .copied()
            .ok_or(ChipError::AddressOutOfRange {
                address: address as usize,
            })
    }

    /// Returns the `len` bytes starting at `start`. Fails without reading
    /// anything if the block does not fit into memory.
    pub fn read_block(&self, start: u16, len: usize) -> Result<&[u8], ChipError> {
        let range = Self::checked_range(start, len)?;
        Ok(&self.bytes[range])
    }

    /// Stores `value` at `address`.
    pub fn write_byte(&mut self, address: u16, value: u8) -> Result<(), ChipError> {
        let cell = self
            .bytes
            .get_mut(address as usize)
            .ok_or(ChipError::AddressOutOfRange {
                address: address as usize,
            })?;
        *cell = value;
        Ok(())
    }

    /// Copies `values` into memory starting at `start`. Fails without writing
    /// anything if the block would exceed the address space.
    pub fn write_block(&mut self, values: &[u8], start: u16) -> Result<(), ChipError> {
        let range = Self::checked_range(start, values.len())?;
        self.bytes[range].copy_from_slice(values);
        Ok(())
    }

    /// Zeroes the bytes in `start..end`. The range is clipped to the address space.
    pub fn clear_range(&mut self, start: usize, end: usize) {
        let end = end.min(CHIP8_MEMORY_SIZE);
        if start < end {
            self.bytes[start..end].iter_mut().for_each(|byte| *byte = 0);
        }
    }

    /// Zeroes the whole address space, including the charset.
    pub fn clear_all(&mut self) {
        self.bytes.iter_mut().for_each(|byte| *byte = 0);
    }

    fn checked_range(start: u16, len: usize) -> Result<std::ops::Range<usize>, ChipError> {
        let start = start as usize;
        let end = start + len;
        if end > CHIP8_MEMORY_SIZE {
            return Err(ChipError::AddressOutOfRange {
                address: CHIP8_MEMORY_SIZE.max(start),
            });
        }
        Ok(start..end)
    }
}

impl Default for Memory {
    fn default() -> Self {
        Memory::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charset_installed() {
        let m = Memory::new();
        assert_eq!(m.read_block(0, 5).unwrap(), &[0xF0, 0x90, 0x90, 0x90, 0xF0]);
        assert_eq!(m.read_block(75, 5).unwrap(), &[0xF0, 0x80, 0xF0, 0x80, 0x80]);
        // NB. memory is zeroed from the end of the charset onwards
        assert!(m.read_block(80, CHIP8_MEMORY_SIZE - 80).unwrap().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_install_charset_restores_glyphs() {
        let mut m = Memory::new();
        m.write_block(&[0xFF; 8], 0).unwrap();
        m.install_charset();
        assert_eq!(m.read_block(0, CHIP8_CHARSET.len()).unwrap(), &CHIP8_CHARSET[..]);

        m.clear_all();
        m.install_charset();
        assert_eq!(m.read_block(75, 5).unwrap(), &[0xF0, 0x80, 0xF0, 0x80, 0x80]);
    }

    #[test]
    fn test_read_write_byte() {
        let mut m = Memory::new();
        m.write_byte(0x300, 0xAB).unwrap();
        assert_eq!(m.read(0x300), Ok(0xAB));
        assert_eq!(m.read(0xFFF), Ok(0));
    }

    #[test]
    fn test_read_out_of_range() {
        let m = Memory::new();
        assert_eq!(
            m.read(0x1000),
            Err(ChipError::AddressOutOfRange { address: 0x1000 })
        );
    }

    #[test]
    fn test_write_byte_out_of_range() {
        let mut m = Memory::new();
        assert!(m.write_byte(0x1000, 1).is_err());
    }

    #[test]
    fn test_write_block_ok() {
        let mut m = Memory::new();
        m.write_block(&[0, 1, 2, 3, 4, 5, 6, 7], 0x208).unwrap();
        assert_eq!(
            m.read_block(0x200, 16).unwrap(),
            &[0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7]
        );
    }

    #[test]
    fn test_write_block_up_to_last_address() {
        let mut m = Memory::new();
        m.write_block(&[9, 9], 0xFFE).unwrap();
        assert_eq!(m.read(0xFFF), Ok(9));
    }

    #[test]
    fn test_write_block_too_long_leaves_memory_untouched() {
        let mut m = Memory::new();
        let result = m.write_block(&[1; 8], 4089);
        assert_eq!(result, Err(ChipError::AddressOutOfRange { address: 4096 }));
        assert!(m.read_block(4089, 7).unwrap().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_clear_range() {
        let mut m = Memory::new();
        m.write_block(&[1; 16], 0x200).unwrap();
        m.clear_range(0x204, 0x208);
        assert_eq!(
            m.read_block(0x200, 10).unwrap(),
            &[1, 1, 1, 1, 0, 0, 0, 0, 1, 1]
        );
        m.write_byte(0xFFF, 1).unwrap();
        m.clear_range(0x200, 0x2000);
        assert_eq!(m.read(0xFFF), Ok(0));
        assert_eq!(m.read(0x4F), Ok(0x80));
    }

    #[test]
    fn test_clear_all() {
        let mut m = Memory::new();
        m.write_byte(0xFFF, 1).unwrap();
        m.clear_all();
        assert_eq!(m.read(0), Ok(0));
        assert_eq!(m.read(0xFFF), Ok(0));
    }
}
