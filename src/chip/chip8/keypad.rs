use crate::chip::{chip8::constants::CHIP8_KEY_COUNT, ChipError};

/// Live state of the 16 keys 0x0 - 0xF. There is no queuing, the CPU polls
/// whatever is pressed at the time it executes an instruction.
#[derive(Clone, Default)]
pub struct Keypad {
    keys: [bool; CHIP8_KEY_COUNT],
}

impl Keypad {
    pub fn new() -> Self {
        Keypad::default()
    }

    /// Returns whether `key` is pressed. Keys outside 0x0 - 0xF are never pressed.
    pub fn is_pressed(&self, key: u8) -> bool {
        self.keys.get(key as usize).copied().unwrap_or(false)
    }

    pub fn set_pressed(&mut self, key: u8, pressed: bool) -> Result<(), ChipError> {
        let state = self
            .keys
            .get_mut(key as usize)
            .ok_or(ChipError::KeyOutOfRange(key))?;
        *state = pressed;
        Ok(())
    }

    pub fn release_all(&mut self) {
        self.keys = [false; CHIP8_KEY_COUNT];
    }

    /// The lowest pressed key, if any.
    pub fn first_pressed(&self) -> Option<u8> {
        self.keys.iter().position(|pressed| *pressed).map(|key| key as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_and_release() {
        let mut k = Keypad::new();
        assert!(!k.is_pressed(0xA));
        k.set_pressed(0xA, true).unwrap();
        assert!(k.is_pressed(0xA));
        k.set_pressed(0xA, false).unwrap();
        assert!(!k.is_pressed(0xA));
    }

    #[test]
    fn test_key_out_of_range() {
        let mut k = Keypad::new();
        assert_eq!(k.set_pressed(0x10, true), Err(ChipError::KeyOutOfRange(0x10)));
        assert!(!k.is_pressed(0x10));
    }

    #[test]
    fn test_first_pressed_and_release_all() {
        let mut k = Keypad::new();
        assert_eq!(k.first_pressed(), None);
        k.set_pressed(0xE, true).unwrap();
        k.set_pressed(0x3, true).unwrap();
        assert_eq!(k.first_pressed(), Some(0x3));
        k.release_all();
        assert_eq!(k.first_pressed(), None);
    }
}
