use crate::chip::{
    chip8::{
        constants::{CHIP8_FLAG_REGISTER, CHIP8_INSTRUCTION_SIZE},
        Chip8,
    },
    CycleOutcome,
};

/// Skips the next instruction if `condition` holds.
pub fn conditional_skip(state: &mut Chip8, condition: bool) -> CycleOutcome {
    if condition {
        increment_program_counter(state);
    }
    CycleOutcome::Executed
}

pub fn increment_program_counter(state: &mut Chip8) {
    state.program_counter = state.program_counter.wrapping_add(CHIP8_INSTRUCTION_SIZE);
}

/// Moves the program counter back onto the instruction that was just fetched.
pub fn rewind_program_counter(state: &mut Chip8) {
    state.program_counter = state.program_counter.wrapping_sub(CHIP8_INSTRUCTION_SIZE);
}

/// Writes 1 or 0 into VF.
pub fn set_flag(state: &mut Chip8, flag: bool) {
    state.registers[CHIP8_FLAG_REGISTER] = flag as u8;
}
