//! Debug log pane: captured tracing output, newest at the bottom.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};
use tracing::Level;

use super::log_capture::{LogBuffer, LogLine};

/// Scroll-back kept by the pane.
const HISTORY: usize = 1000;

/// Height of the pane when shown.
pub const DEBUG_LOG_HEIGHT: u16 = 10;

pub struct DebugLogState {
    buffer: LogBuffer,
    lines: Vec<LogLine>,
    pub visible: bool,
    /// Lines scrolled back from the newest (0 = following).
    scroll_back: usize,
}

impl DebugLogState {
    pub fn new(buffer: LogBuffer) -> Self {
        Self {
            buffer,
            lines: Vec::new(),
            visible: false,
            scroll_back: 0,
        }
    }

    /// Pull newly captured lines. Call once per frame.
    pub fn refresh(&mut self) {
        self.lines.extend(self.buffer.drain());
        if self.lines.len() > HISTORY {
            let excess = self.lines.len() - HISTORY;
            self.lines.drain(..excess);
            self.scroll_back = self.scroll_back.saturating_sub(excess);
        }
    }

    /// Show or hide the pane. Opening it jumps to the newest line.
    pub fn toggle(&mut self) {
        self.visible = !self.visible;
        if self.visible {
            self.scroll_back = 0;
        }
    }

    pub fn scroll_up(&mut self, n: usize) {
        let max = self.lines.len().saturating_sub(1);
        self.scroll_back = (self.scroll_back + n).min(max);
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.scroll_back = self.scroll_back.saturating_sub(n);
    }

    /// Lines to show in a pane `height` lines tall.
    fn window(&self, height: usize) -> &[LogLine] {
        let end = self.lines.len().saturating_sub(self.scroll_back);
        let start = end.saturating_sub(height);
        &self.lines[start..end]
    }
}

fn level_color(level: Option<Level>) -> Color {
    match level {
        Some(Level::ERROR) => Color::Red,
        Some(Level::WARN) => Color::Yellow,
        Some(Level::INFO) => Color::Green,
        Some(_) => Color::DarkGray,
        None => Color::White,
    }
}

pub fn render(area: Rect, buf: &mut Buffer, state: &DebugLogState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " Debug Log ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let lines: Vec<Line> = state
        .window(inner.height as usize)
        .iter()
        .map(|l| {
            Line::from(Span::styled(
                l.text.clone(),
                Style::default().fg(level_color(l.level)),
            ))
        })
        .collect();
    Paragraph::new(lines).render(inner, buf);
}
