use crate::chip::{
    chip8::constants::{CHIP8_DISPLAY_HEIGHT, CHIP8_DISPLAY_WIDTH},
    machine::Machine,
    Chip,
};

use cursive::{
    theme::{BaseColor, Color, ColorStyle},
    view::View,
    CbSink, Cursive, Printer, Vec2,
};
use log::warn;

/// Name under which the [`Screen`] is registered in the cursive tree.
pub const SCREEN_NAME: &str = "chip8-screen";

/// Renders the CHIP-8 framebuffer, one terminal cell per pixel.
pub struct Screen {
    pixels: Vec<bool>,
}

impl Screen {
    pub fn set_pixels(&mut self, pixels: Vec<bool>) {
        if pixels.len() == self.pixels.len() {
            self.pixels = pixels;
        } else {
            warn!("dropping frame of {} pixels", pixels.len());
        }
    }
}

impl Default for Screen {
    fn default() -> Self {
        Screen {
            pixels: vec![false; CHIP8_DISPLAY_WIDTH * CHIP8_DISPLAY_HEIGHT],
        }
    }
}

/// Implements cursive::view::View for Screen to enable drawing it
/// as a View out of the box.
impl View for Screen {
    fn draw(&self, printer: &Printer) {
        printer.with_color(
            ColorStyle::new(Color::Dark(BaseColor::Black), Color::Light(BaseColor::Green)),
            |printer| {
                for y in 0..CHIP8_DISPLAY_HEIGHT {
                    for x in 0..CHIP8_DISPLAY_WIDTH {
                        if self.pixels[x + CHIP8_DISPLAY_WIDTH * y] {
                            printer.print((x, y), " ");
                        }
                    }
                }
            },
        );
    }

    fn required_size(&mut self, _: Vec2) -> Vec2 {
        Vec2::new(CHIP8_DISPLAY_WIDTH, CHIP8_DISPLAY_HEIGHT)
    }
}

/// A chip whose output pins can be pushed to a cursive [`Screen`].
pub trait ChipWithCursiveDisplay {
    /// Sends the current frame to the UI thread if it changed. Returns
    /// `false` once the UI is gone.
    fn update_ui(&self, gfx_sink: &CbSink) -> bool;
}

impl<C> ChipWithCursiveDisplay for Machine<C>
where
    C: Chip + Send + 'static,
{
    fn update_ui(&self, gfx_sink: &CbSink) -> bool {
        let frame = match self.take_frame() {
            Some(frame) => frame,
            None => return true,
        };

        gfx_sink
            .send(Box::new(move |s: &mut Cursive| {
                s.call_on_name(SCREEN_NAME, |screen: &mut Screen| screen.set_pixels(frame));
            }))
            .is_ok()
    }
}
