use std::sync::{Arc, Mutex};

use super::lock;
use crate::display::{DisplayError, Position, TextDisplay};

/// One call made on a [`RecordingDisplay`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayOp {
    Clear,
    Line(Position, String),
    Flush,
}

/// Display that records calls instead of drawing.
#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay {
    ops: Arc<Mutex<Vec<DisplayOp>>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> Vec<DisplayOp> {
        lock(&self.ops).clone()
    }

    /// Text of the lines written since the last clear.
    pub fn screen(&self) -> Vec<String> {
        let ops = lock(&self.ops);
        let start = ops
            .iter()
            .rposition(|op| *op == DisplayOp::Clear)
            .map_or(0, |i| i + 1);
        ops[start..]
            .iter()
            .filter_map(|op| match op {
                DisplayOp::Line(_, text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, op: DisplayOp) -> Result<(), DisplayError> {
        lock(&self.ops).push(op);
        Ok(())
    }
}

impl TextDisplay for RecordingDisplay {
    fn clear(&mut self) -> Result<(), DisplayError> {
        self.record(DisplayOp::Clear)
    }

    fn write_line(&mut self, at: Position, text: &str) -> Result<(), DisplayError> {
        self.record(DisplayOp::Line(at, text.to_string()))
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        self.record(DisplayOp::Flush)
    }
}
