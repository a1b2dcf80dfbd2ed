/// The CHIP-8 virtual machine.
pub mod chip8;
/// Driver configuration.
pub mod config;
/// Instruction and timer drivers running a chip on two threads.
pub mod machine;

use std::fs::File;
use std::io::{self, Read};

use thiserror::Error;

/// Represents a chip that can be driven by the instruction and timer drivers
/// of a [`machine::Machine`]. The chip itself knows nothing about threads or
/// real time; it only exposes one instruction cycle and one timer tick as
/// atomic operations.
pub trait Chip {
    /// The type used to address the input pins (keys) of the chip.
    type PinAddress;

    /// Reads the program stored at `path` and loads it via
    /// [`Chip::load_program_bytes`]. Returns the size of the program.
    fn load_program(&mut self, path: &str) -> Result<usize, LoadProgramError> {
        let mut file = File::open(path).map_err(|source| LoadProgramError::CouldNotOpenFile {
            path: path.to_string(),
            source,
        })?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)
            .map_err(|source| LoadProgramError::CouldNotReadFile {
                path: path.to_string(),
                source,
            })?;
        self.load_program_bytes(&buffer)
    }

    /// Resets the chip, loads `program` into its program region and starts
    /// execution. Returns the size of the program.
    fn load_program_bytes(&mut self, program: &[u8]) -> Result<usize, LoadProgramError>;

    /// Executes exactly one fetch-decode-execute cycle.
    fn cycle(&mut self) -> Result<CycleOutcome, ChipError>;

    /// Advances the delay and sound timers by one tick. Returns `true` if the
    /// tick should produce a beep.
    fn tick_timers(&mut self) -> bool;

    /// Clears registers, stack, timers and display but keeps memory.
    fn soft_reset(&mut self);

    /// Clears the program memory, restores the charset, performs a soft reset
    /// and halts the chip.
    fn hard_reset(&mut self);

    /// Returns whether the chip currently accepts cycles and timer ticks.
    fn is_running(&self) -> bool;

    /// The output pins, i.e., the pixels of the display in row-major order.
    fn read_output_pins(&self) -> &[bool];

    /// Sets the input pin (key) `pin` to `value`.
    fn set_input_pin(&mut self, pin: Self::PinAddress, value: bool) -> Result<(), ChipError>;

    /// Releases all input pins.
    fn reset_input_pins(&mut self);

    /// Returns whether the output pins changed since the flag was last cleared.
    fn draw_flag(&self) -> bool;

    /// Sets or clears the redraw flag.
    fn set_draw_flag(&mut self, draw: bool);

    /// Makes words that do not decode to an instruction fatal instead of
    /// skipping them.
    fn set_strict_opcodes(&mut self, strict_opcodes: bool);
}

/// The result of a successful instruction cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// An instruction was executed.
    Executed,

    /// The wait-for-key instruction found no pressed key and will be
    /// executed again on the next cycle.
    WaitingForKey,

    /// The fetched word did not decode to an instruction and was skipped.
    UnknownOpcode(u16),

    /// The chip is halted and did not execute anything.
    Halted,
}

/// Faults raised while executing instructions or accessing chip components.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChipError {
    #[error("memory address {address:#06X} is out of range")]
    AddressOutOfRange { address: usize },

    #[error("pixel ({x}, {y}) is outside of the display")]
    PixelOutOfRange { x: usize, y: usize },

    #[error("key {0:#X} does not exist")]
    KeyOutOfRange(u8),

    #[error("call stack overflow")]
    StackOverflow,

    #[error("return from subroutine with an empty call stack")]
    StackUnderflow,

    #[error("unknown opcode {0:#06X}")]
    UnknownOpcode(u16),
}

/// Error type for errors that occur when loading a program.
#[derive(Debug, Error)]
pub enum LoadProgramError {
    #[error("could not open file {path}")]
    CouldNotOpenFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("could not read file {path}")]
    CouldNotReadFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("program too large: {0} bytes")]
    ProgramTooLarge(usize),

    #[error("could not copy program into memory")]
    Memory(#[from] ChipError),
}
