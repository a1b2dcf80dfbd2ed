mod arithmetic_and_logic;
mod program_flow;
mod system;

use core::convert::TryFrom;

use thiserror::Error;

use crate::chip::chip8::opcodes::{
    arithmetic_and_logic::Alu, program_flow::Flow, system::System,
};
use crate::chip::{chip8::Chip8, ChipError, CycleOutcome};

/// Represents a CHIP-8 opcode, i.e., the raw two byte instruction word as
/// fetched from memory (big-endian).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Opcode(u16);

impl Opcode {
    /// Constructs a new `Opcode` given its byte representation.
    pub(super) fn new(bytes: [u8; 2]) -> Opcode {
        Opcode(u16::from_be_bytes(bytes))
    }

    pub(super) fn word(self) -> u16 {
        self.0
    }

    /// The most significant nibble.
    fn instruction_class(self) -> u8 {
        (self.0 >> 12) as u8
    }

    /// Register operand in bits 8 - 11.
    fn x(self) -> usize {
        ((self.0 >> 8) & 0xF) as usize
    }

    /// Register operand in bits 4 - 7.
    fn y(self) -> usize {
        ((self.0 >> 4) & 0xF) as usize
    }

    /// 4 bit immediate.
    fn n(self) -> u8 {
        (self.0 & 0xF) as u8
    }

    /// 8 bit immediate.
    fn nn(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// 12 bit address.
    fn nnn(self) -> u16 {
        self.0 & 0xFFF
    }
}

impl From<u16> for Opcode {
    fn from(word: u16) -> Self {
        Opcode(word)
    }
}

/// A decoded instruction carrying its operands. Instructions are grouped in
/// the same families in which they are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Instruction {
    /// Display, timer and font instructions.
    System(System),

    /// Jumps, calls, returns and conditional skips.
    Flow(Flow),

    /// Register, index and memory transfer instructions.
    Alu(Alu),
}

/// Captures errors when converting opcodes to their respective instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub(super) enum InstructionParsingError {
    #[error("unknown opcode {0:#06X}")]
    UnknownOpcode(u16),
}

impl TryFrom<Opcode> for Instruction {
    type Error = InstructionParsingError;

    fn try_from(opcode: Opcode) -> Result<Self, Self::Error> {
        let (x, y, n, nn, nnn) = (opcode.x(), opcode.y(), opcode.n(), opcode.nn(), opcode.nnn());

        let instruction = match (opcode.instruction_class(), n) {
            (0x0, _) => match nnn {
                0x0E0 => Instruction::System(System::ClearScreen),
                0x0EE => Instruction::Flow(Flow::Return),
                _ => return Err(InstructionParsingError::UnknownOpcode(opcode.word())),
            },
            (0x1, _) => Instruction::Flow(Flow::Jump(nnn)),
            (0x2, _) => Instruction::Flow(Flow::Call(nnn)),
            (0x3, _) => Instruction::Flow(Flow::SkipIfEqual { x, nn }),
            (0x4, _) => Instruction::Flow(Flow::SkipIfNotEqual { x, nn }),
            (0x5, 0x0) => Instruction::Flow(Flow::SkipIfRegistersEqual { x, y }),
            (0x6, _) => Instruction::Alu(Alu::Load { x, nn }),
            (0x7, _) => Instruction::Alu(Alu::Add { x, nn }),
            (0x8, 0x0) => Instruction::Alu(Alu::Copy { x, y }),
            (0x8, 0x1) => Instruction::Alu(Alu::Or { x, y }),
            (0x8, 0x2) => Instruction::Alu(Alu::And { x, y }),
            (0x8, 0x3) => Instruction::Alu(Alu::Xor { x, y }),
            (0x8, 0x4) => Instruction::Alu(Alu::AddRegisters { x, y }),
            (0x8, 0x5) => Instruction::Alu(Alu::Sub { x, y }),
            (0x8, 0x6) => Instruction::Alu(Alu::ShiftRight { x }),
            (0x8, 0x7) => Instruction::Alu(Alu::SubReversed { x, y }),
            (0x8, 0xE) => Instruction::Alu(Alu::ShiftLeft { x }),
            (0x9, 0x0) => Instruction::Flow(Flow::SkipIfRegistersNotEqual { x, y }),
            (0xA, _) => Instruction::Alu(Alu::LoadIndex(nnn)),
            (0xB, _) => Instruction::Flow(Flow::JumpOffset(nnn)),
            (0xC, _) => Instruction::Alu(Alu::Random { x, nn }),
            (0xD, _) => Instruction::System(System::Draw { x, y, n }),
            (0xE, _) => match nn {
                0x9E => Instruction::Flow(Flow::SkipIfKeyPressed { x }),
                0xA1 => Instruction::Flow(Flow::SkipIfKeyNotPressed { x }),
                _ => return Err(InstructionParsingError::UnknownOpcode(opcode.word())),
            },
            (0xF, _) => match nn {
                0x07 => Instruction::System(System::ReadDelay { x }),
                0x0A => Instruction::Flow(Flow::WaitForKey { x }),
                0x15 => Instruction::System(System::SetDelay { x }),
                0x18 => Instruction::System(System::SetSound { x }),
                0x1E => Instruction::Alu(Alu::AddIndex { x }),
                0x29 => Instruction::System(System::FontSprite { x }),
                0x30 => Instruction::System(System::LargeFontSprite { x }),
                0x33 => Instruction::Alu(Alu::StoreBcd { x }),
                0x55 => Instruction::Alu(Alu::StoreRegisters { x }),
                0x65 => Instruction::Alu(Alu::LoadRegisters { x }),
                _ => return Err(InstructionParsingError::UnknownOpcode(opcode.word())),
            },
            _ => return Err(InstructionParsingError::UnknownOpcode(opcode.word())),
        };

        Ok(instruction)
    }
}

impl Instruction {
    /// Executes `self` relative to the given state. The program counter has
    /// already been advanced past the instruction when this is called.
    pub(super) fn execute(self, state: &mut Chip8) -> Result<CycleOutcome, ChipError> {
        match self {
            Instruction::System(instruction) => instruction.execute(state),
            Instruction::Flow(instruction) => instruction.execute(state),
            Instruction::Alu(instruction) => instruction.execute(state),
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(word: u16) -> Result<Instruction, InstructionParsingError> {
        Instruction::try_from(Opcode::from(word))
    }

    #[test]
    fn test_operand_fields() {
        let opcode = Opcode::new([0xD1, 0x2F]);
        assert_eq!(opcode.word(), 0xD12F);
        assert_eq!(opcode.instruction_class(), 0xD);
        assert_eq!(opcode.x(), 0x1);
        assert_eq!(opcode.y(), 0x2);
        assert_eq!(opcode.n(), 0xF);
        assert_eq!(opcode.nn(), 0x2F);
        assert_eq!(opcode.nnn(), 0x12F);
    }

    #[test]
    fn test_decode_system() {
        assert_eq!(decode(0x00E0), Ok(Instruction::System(System::ClearScreen)));
        assert_eq!(
            decode(0xD345),
            Ok(Instruction::System(System::Draw { x: 3, y: 4, n: 5 }))
        );
        assert_eq!(
            decode(0xF730),
            Ok(Instruction::System(System::LargeFontSprite { x: 7 }))
        );
        assert_eq!(
            decode(0xF218),
            Ok(Instruction::System(System::SetSound { x: 2 }))
        );
    }

    #[test]
    fn test_decode_flow() {
        assert_eq!(decode(0x00EE), Ok(Instruction::Flow(Flow::Return)));
        assert_eq!(decode(0x1CAF), Ok(Instruction::Flow(Flow::Jump(0xCAF))));
        assert_eq!(decode(0x2300), Ok(Instruction::Flow(Flow::Call(0x300))));
        assert_eq!(decode(0xB123), Ok(Instruction::Flow(Flow::JumpOffset(0x123))));
        assert_eq!(
            decode(0x5AB0),
            Ok(Instruction::Flow(Flow::SkipIfRegistersEqual { x: 0xA, y: 0xB }))
        );
        assert_eq!(
            decode(0xE5A1),
            Ok(Instruction::Flow(Flow::SkipIfKeyNotPressed { x: 5 }))
        );
        assert_eq!(decode(0xF10A), Ok(Instruction::Flow(Flow::WaitForKey { x: 1 })));
    }

    #[test]
    fn test_decode_alu() {
        assert_eq!(decode(0x6A05), Ok(Instruction::Alu(Alu::Load { x: 0xA, nn: 5 })));
        assert_eq!(
            decode(0x8124),
            Ok(Instruction::Alu(Alu::AddRegisters { x: 1, y: 2 }))
        );
        assert_eq!(decode(0x83AE), Ok(Instruction::Alu(Alu::ShiftLeft { x: 3 })));
        assert_eq!(decode(0xA2F0), Ok(Instruction::Alu(Alu::LoadIndex(0x2F0))));
        assert_eq!(decode(0xFA1E), Ok(Instruction::Alu(Alu::AddIndex { x: 0xA })));
        assert_eq!(decode(0xF465), Ok(Instruction::Alu(Alu::LoadRegisters { x: 4 })));
    }

    #[test]
    fn test_decode_unknown() {
        for word in &[0x0000, 0x0123, 0x5121, 0x8008, 0x800F, 0x9AB1, 0xE19F, 0xF0FF] {
            assert_eq!(
                decode(*word),
                Err(InstructionParsingError::UnknownOpcode(*word))
            );
        }
    }
}
