//! A CHIP-8 virtual machine. The instruction set follows the table
//! described [here](https://en.wikipedia.org/wiki/CHIP-8#Opcode_table).
//!
//! [`chip::chip8::Chip8`] executes one instruction per [`chip::Chip::cycle`]
//! and counts its timers down once per [`chip::Chip::tick_timers`]. A
//! [`chip::machine::Machine`] drives both on their own threads at the rates
//! of a [`chip::config::Config`]. For graphical output the
//! `emulator_text_ui` binary relies on the cursive text user interface library.
pub mod chip;
