//! SSD1306 OLED over I2C.

use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::{MonoTextStyle, MonoTextStyleBuilder};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::{I2CDisplayInterface, Ssd1306};
use ticker_core::display::{DisplayError, Position, TextDisplay};

pub type Panel<I2C> =
    Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

fn driver(e: impl core::fmt::Debug) -> DisplayError {
    DisplayError::Driver(format!("{:?}", e))
}

/// 128x64 monochrome panel drawing 6x10 text.
pub struct OledDisplay<I2C> {
    panel: Panel<I2C>,
    style: MonoTextStyle<'static, BinaryColor>,
}

impl<I2C> OledDisplay<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    /// Initialise the panel and blank it.
    pub fn new(i2c: I2C) -> Result<Self, DisplayError> {
        let interface = I2CDisplayInterface::new(i2c);
        let mut panel = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        panel.init().map_err(driver)?;
        panel.clear_buffer();
        panel.flush().map_err(driver)?;

        let style = MonoTextStyleBuilder::new()
            .font(&FONT_6X10)
            .text_color(BinaryColor::On)
            .build();
        Ok(Self { panel, style })
    }
}

impl<I2C> TextDisplay for OledDisplay<I2C>
where
    I2C: embedded_hal::i2c::I2c + Send,
{
    fn clear(&mut self) -> Result<(), DisplayError> {
        self.panel.clear_buffer();
        Ok(())
    }

    fn write_line(&mut self, at: Position, text: &str) -> Result<(), DisplayError> {
        Text::with_baseline(text, Point::new(at.x, at.y), self.style, Baseline::Top)
            .draw(&mut self.panel)
            .map_err(driver)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        self.panel.flush().map_err(driver)
    }
}
