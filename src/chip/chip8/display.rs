use crate::chip::{
    chip8::constants::{CHIP8_DISPLAY_HEIGHT, CHIP8_DISPLAY_WIDTH},
    ChipError,
};

/// The monochrome 64x32 framebuffer of the CHIP-8. Pixels are stored in
/// row-major order, i.e., pixel (x, y) lives at `x + 64 * y`.
#[derive(Clone)]
pub struct Display {
    pixels: [bool; CHIP8_DISPLAY_WIDTH * CHIP8_DISPLAY_HEIGHT],
}

impl Display {
    pub fn new() -> Self {
        Display {
            pixels: [false; CHIP8_DISPLAY_WIDTH * CHIP8_DISPLAY_HEIGHT],
        }
    }

    /// Turns every pixel off.
    pub fn clear(&mut self) {
        self.pixels = [false; CHIP8_DISPLAY_WIDTH * CHIP8_DISPLAY_HEIGHT];
    }

    /// Returns 1 if the pixel at (x, y) is set and 0 otherwise. Coordinates
    /// are not wrapped.
    pub fn get_pixel(&self, x: usize, y: usize) -> Result<u8, ChipError> {
        let position = Self::position(x, y)?;
        Ok(self.pixels[position] as u8)
    }

    /// Flips the pixel at (x, y). Coordinates are not wrapped.
    pub fn set_pixel(&mut self, x: usize, y: usize) -> Result<(), ChipError> {
        let position = Self::position(x, y)?;
        self.pixels[position] ^= true;
        Ok(())
    }

    /// XORs the 8 bits of `row` onto the display, starting at (x, y) with the
    /// most significant bit. Coordinates wrap around the display edges.
    ///
    /// Returns `true` if any set pixel was turned off.
    pub fn draw_sprite_row(&mut self, x: usize, y: usize, row: u8) -> bool {
        let y = y % CHIP8_DISPLAY_HEIGHT;
        let mut collision = false;
        for bit in 0..8 {
            if row & (0x80 >> bit) == 0 {
                continue;
            }
            let position = (x + bit) % CHIP8_DISPLAY_WIDTH + CHIP8_DISPLAY_WIDTH * y;
            // the collision is decided on the pixel before it is flipped
            collision |= self.pixels[position];
            self.pixels[position] ^= true;
        }
        collision
    }

    /// The pixels in row-major order.
    pub fn pixels(&self) -> &[bool] {
        &self.pixels
    }

    fn position(x: usize, y: usize) -> Result<usize, ChipError> {
        if x >= CHIP8_DISPLAY_WIDTH || y >= CHIP8_DISPLAY_HEIGHT {
            return Err(ChipError::PixelOutOfRange { x, y });
        }
        Ok(x + CHIP8_DISPLAY_WIDTH * y)
    }
}

impl Default for Display {
    fn default() -> Self {
        Display::new()
    }
}
