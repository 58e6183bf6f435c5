//! Text display abstraction and quote rendering.

use core::fmt::Write;

use crate::quote::Quote;

/// Longest line the quote screen renders, in bytes.
pub const LINE_CAPACITY: usize = 32;

pub type Line = heapless::String<LINE_CAPACITY>;

/// Pixel position of a line's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Where the price line goes.
pub const PRICE_LINE: Position = Position::new(0, 0);

/// Where the 24h change line goes.
pub const CHANGE_LINE: Position = Position::new(0, 16);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DisplayError {
    #[error("Line exceeds {capacity} bytes")]
    LineOverflow { capacity: usize },

    #[error("Display driver error: {0}")]
    Driver(String),
}

/// Minimal text output used by the poller.
///
/// Writes go to a frame buffer; nothing is visible until [`flush`](TextDisplay::flush).
pub trait TextDisplay: Send {
    fn clear(&mut self) -> Result<(), DisplayError>;

    fn write_line(&mut self, at: Position, text: &str) -> Result<(), DisplayError>;

    fn flush(&mut self) -> Result<(), DisplayError>;
}

/// Format the two quote lines.
pub fn format_quote(quote: &Quote, currency: &str) -> Result<(Line, Line), DisplayError> {
    let overflow = |_| DisplayError::LineOverflow {
        capacity: LINE_CAPACITY,
    };

    let mut price = Line::new();
    write!(price, "{}: {:.2} {}", quote.symbol, quote.price, currency).map_err(overflow)?;

    let mut change = Line::new();
    write!(change, "24h: {:.2}%", quote.change_24h_percent).map_err(overflow)?;

    Ok((price, change))
}

/// Replace the screen contents with a quote.
///
/// Lines are formatted before the screen is touched, so an overflow leaves
/// the previous reading visible.
pub fn render_quote<D: TextDisplay + ?Sized>(
    display: &mut D,
    quote: &Quote,
    currency: &str,
) -> Result<(), DisplayError> {
    let (price, change) = format_quote(quote, currency)?;

    display.clear()?;
    display.write_line(PRICE_LINE, &price)?;
    display.write_line(CHANGE_LINE, &change)?;
    display.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::bounded;
    use crate::sim::{DisplayOp, RecordingDisplay};
    use pretty_assertions::assert_eq;

    fn quote(symbol: &str, price: f64, change: f64) -> Quote {
        Quote {
            symbol: bounded(symbol).unwrap(),
            price,
            change_24h_percent: change,
        }
    }

    #[test]
    fn test_quote_lines() {
        let (price, change) = format_quote(&quote("ETH", 2500.5, -1.3), "EUR").unwrap();
        assert_eq!(price.as_str(), "ETH: 2500.50 EUR");
        assert_eq!(change.as_str(), "24h: -1.30%");
    }

    #[test]
    fn test_render_sequence() {
        let mut display = RecordingDisplay::new();
        render_quote(&mut display, &quote("BTC", 67012.0, 2.251), "USD").unwrap();

        assert_eq!(
            display.ops(),
            vec![
                DisplayOp::Clear,
                DisplayOp::Line(PRICE_LINE, "BTC: 67012.00 USD".to_string()),
                DisplayOp::Line(CHANGE_LINE, "24h: 2.25%".to_string()),
                DisplayOp::Flush,
            ]
        );
    }

    #[test]
    fn test_overflow_leaves_screen_untouched() {
        let mut display = RecordingDisplay::new();
        let result = render_quote(&mut display, &quote("DOGE", 1.0e30, 0.0), "USD");

        assert_eq!(result, Err(DisplayError::LineOverflow { capacity: 32 }));
        assert!(display.ops().is_empty());
    }
}
