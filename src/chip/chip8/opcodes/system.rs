use log::debug;

use crate::chip::{
    chip8::{
        constants::{CHIP8_CHARSET_GLYPH_LEN, CHIP8_CHARSET_OFFSET},
        util, Chip8,
    },
    ChipError, CycleOutcome,
};

/// Instructions driving the display, the timers and the font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum System {
    /// 00E0
    ClearScreen,
    /// Dxyn
    Draw { x: usize, y: usize, n: u8 },
    /// Fx07
    ReadDelay { x: usize },
    /// Fx15
    SetDelay { x: usize },
    /// Fx18
    SetSound { x: usize },
    /// Fx29
    FontSprite { x: usize },
    /// Fx30, reserved for the 10 byte glyphs of extended interpreters.
    LargeFontSprite { x: usize },
}

impl System {
    pub(super) fn execute(self, state: &mut Chip8) -> Result<CycleOutcome, ChipError> {
        match self {
            System::ClearScreen => {
                state.display.clear();
                state.draw = true;
            }
            System::Draw { x, y, n } => {
                let sprite = state.memory.read_block(state.index, n as usize)?;
                let (x, y) = (state.registers[x] as usize, state.registers[y] as usize);

                let mut collision = false;
                for (row, bits) in sprite.iter().enumerate() {
                    collision |= state.display.draw_sprite_row(x, y + row, *bits);
                }
                util::set_flag(state, collision);
                state.draw = true;
            }
            System::ReadDelay { x } => state.registers[x] = state.delay_timer,
            System::SetDelay { x } => state.delay_timer = state.registers[x],
            System::SetSound { x } => state.sound_timer = state.registers[x],
            System::FontSprite { x } => {
                state.index =
                    CHIP8_CHARSET_OFFSET + state.registers[x] as u16 * CHIP8_CHARSET_GLYPH_LEN;
                state.draw = true;
            }
            System::LargeFontSprite { x } => {
                debug!("ignoring large font sprite for V{:X}", x);
            }
        }
        Ok(CycleOutcome::Executed)
    }
}
