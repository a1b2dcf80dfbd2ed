use rand::Rng;

use crate::chip::{
    chip8::{util, Chip8},
    ChipError, CycleOutcome,
};

/// Instructions operating on the registers, the index register and the
/// memory behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Alu {
    /// 6xnn
    Load { x: usize, nn: u8 },
    /// 7xnn, wraps without touching VF.
    Add { x: usize, nn: u8 },
    /// 8xy0
    Copy { x: usize, y: usize },
    /// 8xy1
    Or { x: usize, y: usize },
    /// 8xy2
    And { x: usize, y: usize },
    /// 8xy3
    Xor { x: usize, y: usize },
    /// 8xy4, VF is the carry.
    AddRegisters { x: usize, y: usize },
    /// 8xy5, VF is 1 if there is no borrow.
    Sub { x: usize, y: usize },
    /// 8xy6, VF is the bit shifted out.
    ShiftRight { x: usize },
    /// 8xy7, VF is 1 if there is no borrow.
    SubReversed { x: usize, y: usize },
    /// 8xyE, VF is the bit shifted out.
    ShiftLeft { x: usize },
    /// Annn
    LoadIndex(u16),
    /// Fx1E
    AddIndex { x: usize },
    /// Cxnn
    Random { x: usize, nn: u8 },
    /// Fx33
    StoreBcd { x: usize },
    /// Fx55
    StoreRegisters { x: usize },
    /// Fx65
    LoadRegisters { x: usize },
}

impl Alu {
    pub(super) fn execute(self, state: &mut Chip8) -> Result<CycleOutcome, ChipError> {
        match self {
            Alu::Load { x, nn } => state.registers[x] = nn,
            Alu::Add { x, nn } => state.registers[x] = state.registers[x].wrapping_add(nn),
            Alu::Copy { x, y } => state.registers[x] = state.registers[y],
            Alu::Or { x, y } => state.registers[x] |= state.registers[y],
            Alu::And { x, y } => state.registers[x] &= state.registers[y],
            Alu::Xor { x, y } => state.registers[x] ^= state.registers[y],
            Alu::AddRegisters { x, y } => {
                let (sum, carry) = state.registers[x].overflowing_add(state.registers[y]);
                state.registers[x] = sum;
                util::set_flag(state, carry);
            }
            // NB. the flag is written first, so Vx is computed from the updated
            // register file if x or y is F
            Alu::Sub { x, y } => {
                let no_borrow = state.registers[x] > state.registers[y];
                util::set_flag(state, no_borrow);
                state.registers[x] = state.registers[x].wrapping_sub(state.registers[y]);
            }
            Alu::ShiftRight { x } => {
                let shifted_out = state.registers[x] & 0x1 != 0;
                util::set_flag(state, shifted_out);
                state.registers[x] >>= 1;
            }
            Alu::SubReversed { x, y } => {
                let no_borrow = state.registers[y] > state.registers[x];
                util::set_flag(state, no_borrow);
                state.registers[x] = state.registers[y].wrapping_sub(state.registers[x]);
            }
            Alu::ShiftLeft { x } => {
                let shifted_out = state.registers[x] & 0x80 != 0;
                util::set_flag(state, shifted_out);
                state.registers[x] <<= 1;
            }
            Alu::LoadIndex(address) => state.index = address,
            Alu::AddIndex { x } => {
                state.index = state.index.wrapping_add(state.registers[x] as u16);
            }
            Alu::Random { x, nn } => {
                let sample: u8 = state.rng.gen();
                state.registers[x] = sample & nn;
            }
            Alu::StoreBcd { x } => {
                let value = state.registers[x];
                let digits = [value / 100, (value / 10) % 10, value % 10];
                state.memory.write_block(&digits, state.index)?;
            }
            Alu::StoreRegisters { x } => {
                state
                    .memory
                    .write_block(&state.registers[..=x], state.index)?;
            }
            Alu::LoadRegisters { x } => {
                let values = state.memory.read_block(state.index, x + 1)?;
                state.registers[..=x].copy_from_slice(values);
            }
        }
        Ok(CycleOutcome::Executed)
    }
}
