//! The quote screen, drawn as a framed box on a terminal.

use std::io::{self, Write};

use ticker_core::display::{DisplayError, Position, TextDisplay, LINE_CAPACITY};

/// Pixel height of one text row on the panel.
const ROW_HEIGHT: i32 = 16;

/// [`TextDisplay`] that prints each flushed frame.
pub struct TerminalDisplay<W> {
    out: W,
    frame: Vec<(Position, String)>,
}

impl TerminalDisplay<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            frame: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(&self) -> Vec<String> {
        let rows = self
            .frame
            .iter()
            .map(|(at, _)| at.y / ROW_HEIGHT + 1)
            .max()
            .unwrap_or(0)
            .max(0) as usize;

        let mut lines = vec![String::new(); rows];
        for (at, text) in &self.frame {
            let Ok(row) = usize::try_from(at.y / ROW_HEIGHT) else {
                continue;
            };
            let indent = usize::try_from(at.x / 6).unwrap_or(0);
            lines[row] = format!("{:indent$}{}", "", text, indent = indent);
        }
        lines
    }
}

impl<W: Write + Send> TextDisplay for TerminalDisplay<W> {
    fn clear(&mut self) -> Result<(), DisplayError> {
        self.frame.clear();
        Ok(())
    }

    fn write_line(&mut self, at: Position, text: &str) -> Result<(), DisplayError> {
        self.frame.push((at, text.to_string()));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        let border = "─".repeat(LINE_CAPACITY);
        let mut screen = format!("┌{}┐\n", border);
        for line in self.render() {
            let line: String = line.chars().take(LINE_CAPACITY).collect();
            screen.push_str(&format!("│{:<width$}│\n", line, width = LINE_CAPACITY));
        }
        screen.push_str(&format!("└{}┘\n", border));

        self.out
            .write_all(screen.as_bytes())
            .and_then(|_| self.out.flush())
            .map_err(|e| DisplayError::Driver(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ticker_core::display::{CHANGE_LINE, PRICE_LINE};

    #[test]
    fn test_frame_drawn_on_flush_only() {
        let mut display = TerminalDisplay::new(Vec::new());
        display.clear().unwrap();
        display.write_line(PRICE_LINE, "ETH: 2500.50 EUR").unwrap();
        display.write_line(CHANGE_LINE, "24h: -1.30%").unwrap();
        assert!(display.out.is_empty());

        display.flush().unwrap();
        let text = String::from_utf8(display.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], format!("│{:<32}│", "ETH: 2500.50 EUR"));
        assert_eq!(lines[2], format!("│{:<32}│", "24h: -1.30%"));
    }

    #[test]
    fn test_clear_drops_previous_lines() {
        let mut display = TerminalDisplay::new(Vec::new());
        display.write_line(PRICE_LINE, "old").unwrap();
        display.clear().unwrap();
        display.flush().unwrap();

        let text = String::from_utf8(display.into_inner()).unwrap();
        assert!(!text.contains("old"));
    }
}
