/// CHIP-8 constants.
pub mod constants;
/// Cursive display output.
pub mod cursive_display;
/// The framebuffer.
pub mod display;
/// The key state.
pub mod keypad;
/// The address space.
pub mod memory;
/// Decoding of opcodes and their execution.
mod opcodes;
/// The call stack.
pub mod stack;
/// Convenience functions for modification of the CHIP-8 state.
mod util;


use core::convert::TryFrom;

use log::{error, info, trace, warn};
use rand::{rngs::StdRng, SeedableRng};

use crate::chip::{
    chip8::{
        constants::{
            CHIP8_INSTRUCTION_SIZE, CHIP8_MAX_PROGRAM_SIZE, CHIP8_MEMORY_SIZE, CHIP8_PROGRAM_END,
            CHIP8_PROGRAM_START, CHIP8_REGISTER_COUNT,
        },
        display::Display,
        keypad::Keypad,
        memory::Memory,
        opcodes::{Instruction, InstructionParsingError, Opcode},
        stack::Stack,
    },
    Chip, ChipError, CycleOutcome, LoadProgramError,
};

/// Whether the CHIP-8 accepts instruction cycles and timer ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Initial state, and the state after a hard reset or a fatal fault.
    Halted,
    Running,
}

/// Represents the state of the CHIP-8.
pub struct Chip8 {
    /// 4096 bytes of main memory with the charset at its beginning.
    memory: Memory,

    /// 16 registers where each can store one byte. VF doubles as flag register.
    registers: [u8; CHIP8_REGISTER_COUNT],

    /// The index register. It holds 16 bits, but only addresses up to 0xFFF
    /// can be accessed through it.
    index: u16,

    /// The address of the next instruction to fetch.
    program_counter: u16,

    /// The framebuffer the output pins are wired up to.
    display: Display,

    /// Counts down at the timer rate of the driver.
    delay_timer: u8,

    /// Counts down at the timer rate of the driver and beeps when it runs out.
    sound_timer: u8,

    /// The keys wired up to the input pins.
    keypad: Keypad,

    /// Return addresses of subroutine calls.
    stack: Stack,

    /// A flag that indicates whether the output pins changed since it
    /// was last set to false.
    draw: bool,

    state: RunState,

    /// Whether unknown opcodes are fatal instead of being skipped.
    strict_opcodes: bool,

    rng: StdRng,
}

impl Chip for Chip8 {
    /// The CHIP-8's pins can actually be addressed by using just half a byte.
    /// However, we use a whole byte here and check whether it is in the right
    /// range, because it is more convenient to handle.
    type PinAddress = u8;

    fn load_program_bytes(&mut self, program: &[u8]) -> Result<usize, LoadProgramError> {
        if program.len() > CHIP8_MAX_PROGRAM_SIZE {
            return Err(LoadProgramError::ProgramTooLarge(program.len()));
        }

        self.hard_reset();
        self.memory.clear_range(
            CHIP8_PROGRAM_START as usize,
            CHIP8_PROGRAM_END as usize + 1,
        );
        self.memory.write_block(program, CHIP8_PROGRAM_START)?;
        self.state = RunState::Running;
        self.draw = true;

        info!("loaded program of {} bytes", program.len());
        Ok(program.len())
    }

    fn cycle(&mut self) -> Result<CycleOutcome, ChipError> {
        if self.state == RunState::Halted {
            return Ok(CycleOutcome::Halted);
        }

        let address = self.program_counter;
        self.step().map_err(|fault| {
            self.program_counter = address;
            self.state = RunState::Halted;
            error!("halted at {:#06X}: {}", address, fault);
            fault
        })
    }

    fn tick_timers(&mut self) -> bool {
        if self.state == RunState::Halted {
            return false;
        }

        if self.delay_timer > 0 {
            self.delay_timer -= 1;
        }

        let beep = self.sound_timer == 1;
        if self.sound_timer > 0 {
            self.sound_timer -= 1;
        }
        if beep {
            trace!("beep");
        }
        beep
    }

    fn soft_reset(&mut self) {
        self.display.clear();
        self.draw = true;
        self.program_counter = CHIP8_PROGRAM_START;
        self.stack.clear();
        self.index = 0;
        self.registers = [0; CHIP8_REGISTER_COUNT];
        self.delay_timer = 0;
        self.sound_timer = 0;
    }

    fn hard_reset(&mut self) {
        self.memory
            .clear_range(CHIP8_PROGRAM_START as usize, CHIP8_MEMORY_SIZE);
        self.memory.install_charset();
        self.soft_reset();
        self.state = RunState::Halted;
        info!("reset");
    }

    fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    fn read_output_pins(&self) -> &[bool] {
        self.display.pixels()
    }

    fn set_input_pin(&mut self, pin: u8, value: bool) -> Result<(), ChipError> {
        self.keypad.set_pressed(pin, value)
    }

    fn reset_input_pins(&mut self) {
        self.keypad.release_all();
    }

    fn draw_flag(&self) -> bool {
        self.draw
    }

    fn set_draw_flag(&mut self, draw: bool) {
        self.draw = draw;
    }

    fn set_strict_opcodes(&mut self, strict_opcodes: bool) {
        self.strict_opcodes = strict_opcodes;
    }
}

impl Chip8 {
    /// Constructs a new, halted CHIP-8 with the default charset loaded at
    /// `CHIP8_CHARSET_OFFSET` and the program counter at 0x200. Note that no
    /// program is loaded upon initialization.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Like [`Chip8::new`], but with a deterministic random source.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Chip8 {
            memory: Memory::new(),
            registers: [0; CHIP8_REGISTER_COUNT],
            index: 0,
            program_counter: CHIP8_PROGRAM_START,
            display: Display::new(),
            delay_timer: 0,
            sound_timer: 0,
            keypad: Keypad::new(),
            stack: Stack::new(),
            draw: false,
            state: RunState::Halted,
            strict_opcodes: false,
            rng,
        }
    }

    pub fn registers(&self) -> &[u8; CHIP8_REGISTER_COUNT] {
        &self.registers
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn program_counter(&self) -> u16 {
        self.program_counter
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn run_state(&self) -> RunState {
        self.state
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn keypad(&self) -> &Keypad {
        &self.keypad
    }

    /// Fetches, decodes and executes the instruction at the program counter.
    fn step(&mut self) -> Result<CycleOutcome, ChipError> {
        let opcode = self.next_instruction()?;

        match Instruction::try_from(opcode) {
            Ok(instruction) => {
                trace!("{} {:?}", opcode, instruction);
                instruction.execute(self)
            }
            Err(InstructionParsingError::UnknownOpcode(word)) if self.strict_opcodes => {
                Err(ChipError::UnknownOpcode(word))
            }
            Err(InstructionParsingError::UnknownOpcode(word)) => {
                warn!(
                    "skipping unknown opcode {:#06X} at {:#06X}",
                    word,
                    self.program_counter.wrapping_sub(CHIP8_INSTRUCTION_SIZE)
                );
                Ok(CycleOutcome::UnknownOpcode(word))
            }
        }
    }

    /// Fetches the instruction at the program counter and advances the
    /// program counter past it.
    fn next_instruction(&mut self) -> Result<Opcode, ChipError> {
        let bytes = self
            .memory
            .read_block(self.program_counter, CHIP8_INSTRUCTION_SIZE as usize)?;
        let opcode = Opcode::new([bytes[0], bytes[1]]);
        util::increment_program_counter(self);
        Ok(opcode)
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Chip8::new()
    }
}
