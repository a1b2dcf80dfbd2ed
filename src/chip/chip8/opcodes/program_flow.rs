use log::trace;

use crate::chip::{
    chip8::{util, Chip8},
    ChipError, CycleOutcome,
};

/// Instructions that decide where execution continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    /// 00EE
    Return,
    /// 1nnn
    Jump(u16),
    /// 2nnn
    Call(u16),
    /// Bnnn, jumps to nnn + V0.
    JumpOffset(u16),
    /// 3xnn
    SkipIfEqual { x: usize, nn: u8 },
    /// 4xnn
    SkipIfNotEqual { x: usize, nn: u8 },
    /// 5xy0
    SkipIfRegistersEqual { x: usize, y: usize },
    /// 9xy0
    SkipIfRegistersNotEqual { x: usize, y: usize },
    /// Ex9E
    SkipIfKeyPressed { x: usize },
    /// ExA1
    SkipIfKeyNotPressed { x: usize },
    /// Fx0A, repeats itself until a key is pressed.
    WaitForKey { x: usize },
}

impl Flow {
    pub(super) fn execute(self, state: &mut Chip8) -> Result<CycleOutcome, ChipError> {
        let outcome = match self {
            Flow::Return => {
                state.program_counter = state.stack.pop()?;
                state.draw = true;
                CycleOutcome::Executed
            }
            Flow::Jump(address) => {
                state.program_counter = address;
                CycleOutcome::Executed
            }
            Flow::Call(address) => {
                state.stack.push(state.program_counter)?;
                state.program_counter = address;
                CycleOutcome::Executed
            }
            Flow::JumpOffset(address) => {
                state.program_counter = address.wrapping_add(state.registers[0] as u16);
                CycleOutcome::Executed
            }
            Flow::SkipIfEqual { x, nn } => {
                let condition = state.registers[x] == nn;
                util::conditional_skip(state, condition)
            }
            Flow::SkipIfNotEqual { x, nn } => {
                let condition = state.registers[x] != nn;
                util::conditional_skip(state, condition)
            }
            Flow::SkipIfRegistersEqual { x, y } => {
                let condition = state.registers[x] == state.registers[y];
                util::conditional_skip(state, condition)
            }
            Flow::SkipIfRegistersNotEqual { x, y } => {
                let condition = state.registers[x] != state.registers[y];
                util::conditional_skip(state, condition)
            }
            Flow::SkipIfKeyPressed { x } => {
                let condition = state.keypad.is_pressed(state.registers[x] & 0xF);
                util::conditional_skip(state, condition)
            }
            Flow::SkipIfKeyNotPressed { x } => {
                let condition = !state.keypad.is_pressed(state.registers[x] & 0xF);
                util::conditional_skip(state, condition)
            }
            Flow::WaitForKey { x } => match state.keypad.first_pressed() {
                Some(key) => {
                    trace!("consumed key {:X}", key);
                    state.registers[x] = key;
                    state.keypad.set_pressed(key, false)?;
                    CycleOutcome::Executed
                }
                None => {
                    util::rewind_program_counter(state);
                    CycleOutcome::WaitingForKey
                }
            },
        };
        Ok(outcome)
    }
}
