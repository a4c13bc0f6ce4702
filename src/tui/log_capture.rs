//! Log capture for TUI mode
//!
//! A bounded queue of formatted log lines that implements `MakeWriter`, so the
//! tracing fmt layer writes here instead of stderr while the alternate screen
//! is active.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// Lines held between two drains by the debug pane.
const CAPACITY: usize = 500;

/// One captured line with its level, when one could be recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: Option<Level>,
    pub text: String,
}

impl LogLine {
    fn parse(text: String) -> Self {
        // fmt output: "<timestamp>  INFO message"; level is the first
        // level-shaped token.
        let level = text
            .split_whitespace()
            .take(3)
            .find_map(|tok| tok.trim_end_matches(':').parse::<Level>().ok());
        Self { level, text }
    }
}

/// Shared, cloneable handle to the captured lines.
#[derive(Clone, Default)]
pub struct LogBuffer {
    lines: Arc<Mutex<VecDeque<LogLine>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line, evicting the oldest one when full.
    pub fn push(&self, line: String) {
        let mut guard = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        if guard.len() >= CAPACITY {
            guard.pop_front();
        }
        guard.push_back(LogLine::parse(line));
    }

    /// Take every pending line, oldest first.
    pub fn drain(&self) -> Vec<LogLine> {
        let mut guard = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        guard.drain(..).collect()
    }
}

/// Accumulates bytes and hands complete lines to the buffer.
pub struct LineWriter {
    buffer: LogBuffer,
    pending: Vec<u8>,
}

impl LineWriter {
    fn push_complete_lines(&mut self) {
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            self.buffer.push(text);
        }
    }
}

impl Write for LineWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.push_complete_lines();
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if !self.pending.is_empty() {
            let text = String::from_utf8_lossy(&self.pending).into_owned();
            self.buffer.push(text);
            self.pending.clear();
        }
        Ok(())
    }
}

impl Drop for LineWriter {
    fn drop(&mut self) {
        let _ = Write::flush(self);
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LineWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LineWriter {
            buffer: self.clone(),
            pending: Vec::new(),
        }
    }
}
