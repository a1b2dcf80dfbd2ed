use crate::chip::{chip8::constants::CHIP8_STACK_SIZE, ChipError};

/// The call stack. It only ever holds return addresses and there are no
/// instructions to modify it other than call and return.
#[derive(Clone, Default)]
pub struct Stack {
    frames: [u16; CHIP8_STACK_SIZE],

    /// Points to the next free frame, i.e., equals the number of stored frames.
    pointer: usize,
}

impl Stack {
    pub fn new() -> Self {
        Stack::default()
    }

    pub fn push(&mut self, address: u16) -> Result<(), ChipError> {
        let frame = self
            .frames
            .get_mut(self.pointer)
            .ok_or(ChipError::StackOverflow)?;
        *frame = address;
        self.pointer += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<u16, ChipError> {
        if self.pointer == 0 {
            return Err(ChipError::StackUnderflow);
        }
        self.pointer -= 1;
        Ok(self.frames[self.pointer])
    }

    #[cfg(test)]
    pub(crate) fn peek(&self) -> Option<u16> {
        self.pointer.checked_sub(1).map(|top| self.frames[top])
    }

    pub fn clear(&mut self) {
        self.frames = [0; CHIP8_STACK_SIZE];
        self.pointer = 0;
    }

    pub fn depth(&self) -> usize {
        self.pointer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_order() {
        let mut s = Stack::new();
        s.push(0x202).unwrap();
        s.push(0x304).unwrap();
        assert_eq!(s.depth(), 2);
        assert_eq!(s.peek(), Some(0x304));
        assert_eq!(s.pop(), Ok(0x304));
        assert_eq!(s.pop(), Ok(0x202));
        assert_eq!(s.depth(), 0);
    }

    #[test]
    fn test_overflow() {
        let mut s = Stack::new();
        for i in 0..16 {
            s.push(i).unwrap();
        }
        assert_eq!(s.push(16), Err(ChipError::StackOverflow));
        assert_eq!(s.depth(), 16);
        assert_eq!(s.peek(), Some(15));
    }

    #[test]
    fn test_underflow() {
        let mut s = Stack::new();
        assert_eq!(s.pop(), Err(ChipError::StackUnderflow));
        assert_eq!(s.peek(), None);
    }

    #[test]
    fn test_clear() {
        let mut s = Stack::new();
        s.push(0x400).unwrap();
        s.clear();
        assert_eq!(s.depth(), 0);
        assert_eq!(s.pop(), Err(ChipError::StackUnderflow));
    }
}
