//! Compose box: the draft text (or image path) and its action hints.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// What the compose box is currently collecting.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Message,
    /// Stand-in for a file picker: the user types a path.
    ImagePath,
}

/// Editable single-line buffer with a char-based cursor.
#[derive(Debug, Default)]
pub struct ComposeState {
    pub input: String,
    /// Cursor position (character offset into `input`).
    pub cursor_pos: usize,
    pub mode: InputMode,
}

impl ComposeState {
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = self.char_to_byte(self.cursor_pos);
        self.input.insert(byte_pos, c);
        self.cursor_pos += 1;
    }

    /// Delete the character before the cursor.
    pub fn backspace(&mut self) {
        if self.cursor_pos > 0 {
            let end = self.char_to_byte(self.cursor_pos);
            let start = self.char_to_byte(self.cursor_pos - 1);
            self.input.drain(start..end);
            self.cursor_pos -= 1;
        }
    }

    /// Delete the character under the cursor.
    pub fn delete(&mut self) {
        if self.cursor_pos < self.input.chars().count() {
            let start = self.char_to_byte(self.cursor_pos);
            let end = self.char_to_byte(self.cursor_pos + 1);
            self.input.drain(start..end);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor_pos = self.cursor_pos.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor_pos = (self.cursor_pos + 1).min(self.input.chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor_pos = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_pos = self.input.chars().count();
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor_pos = 0;
    }

    /// Switch to collecting an image path. The draft message is kept.
    pub fn begin_image_path(&mut self, draft: &mut String) {
        *draft = std::mem::take(&mut self.input);
        self.cursor_pos = 0;
        self.mode = InputMode::ImagePath;
    }

    /// Leave image-path mode, restoring the saved draft.
    pub fn end_image_path(&mut self, draft: String) {
        self.input = draft;
        self.mode = InputMode::Message;
        self.move_end();
    }

    /// Take the trimmed text and clear the box.
    /// Returns None if the input is empty or whitespace-only.
    pub fn take(&mut self) -> Option<String> {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return None;
        }
        self.clear();
        Some(text)
    }

    fn char_to_byte(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// 1 border + 1 hint line + 1 input line + 1 border.
pub const COMPOSE_HEIGHT: u16 = 4;

/// Render the compose box. While a request is in flight `busy` holds its
/// text, which replaces the input and greys the box out.
pub fn render(
    area: Rect,
    frame: &mut Frame,
    state: &ComposeState,
    speaker: &str,
    busy: Option<&str>,
) {
    let disabled = busy.is_some();
    let border_style = if disabled {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Yellow)
    };

    let title = match state.mode {
        InputMode::Message => format!(" {} ", speaker),
        InputMode::ImagePath => " 📷 image ".to_string(),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(border_style)
        .title(Span::styled(title, border_style));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let hints_area = Rect::new(inner.x, inner.y, inner.width, 1);
    render_hints(hints_area, frame.buffer_mut(), state.mode, disabled);

    if inner.height >= 2 {
        let input_area = Rect::new(inner.x, inner.y + 1, inner.width, 1);
        let display = display_text(&state.input, state.cursor_pos, input_area.width as usize);
        render_input(input_area, frame.buffer_mut(), state, &display, speaker, busy);

        if !disabled {
            let x = input_area.x + 1 + display.cursor_offset as u16;
            frame.set_cursor_position((x, input_area.y));
        }
    }
}

fn render_hints(area: Rect, buf: &mut Buffer, mode: InputMode, disabled: bool) {
    let key = if disabled {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    };
    let text = Style::default().fg(Color::Gray);

    let spans = match mode {
        InputMode::Message => vec![
            Span::styled(" Enter", key),
            Span::styled(" 送出訊息  ", text),
            Span::styled("Ctrl+A", key),
            Span::styled(" 送給 AI  ", text),
            Span::styled("Ctrl+O", key),
            Span::styled(" 📷", text),
        ],
        InputMode::ImagePath => vec![
            Span::styled(" Enter", key),
            Span::styled(" upload  ", text),
            Span::styled("Esc", key),
            Span::styled(" cancel", text),
        ],
    };
    Paragraph::new(Line::from(spans)).render(area, buf);
}

fn render_input(
    area: Rect,
    buf: &mut Buffer,
    state: &ComposeState,
    display: &DisplayText,
    speaker: &str,
    busy: Option<&str>,
) {
    let line = if let Some(text) = busy {
        Line::from(Span::styled(
            format!(" {}", text),
            Style::default().fg(Color::DarkGray),
        ))
    } else if state.input.is_empty() {
        let placeholder = match state.mode {
            InputMode::Message => format!(" 以 {} 的身分說點什麼", speaker),
            InputMode::ImagePath => " Path to an image file".to_string(),
        };
        Line::from(Span::styled(placeholder, Style::default().fg(Color::DarkGray)))
    } else {
        Line::from(Span::styled(
            format!(" {}", display.visible),
            Style::default().fg(Color::White),
        ))
    };
    Paragraph::new(line).render(area, buf);
}

/// Visible slice of the input and where the cursor lands in it (in columns).
struct DisplayText {
    visible: String,
    cursor_offset: usize,
}

/// Horizontally scroll the input so the cursor stays visible.
///
/// Works in display columns so wide (CJK) characters are accounted for.
fn display_text(input: &str, cursor_pos: usize, width: usize) -> DisplayText {
    let avail = width.saturating_sub(2);
    let chars: Vec<char> = input.chars().collect();
    let cursor_pos = cursor_pos.min(chars.len());

    // Walk left from the cursor until the window is full.
    let mut start = cursor_pos;
    let mut used = 0usize;
    while start > 0 {
        let w = chars[start - 1].width().unwrap_or(0);
        if used + w > avail {
            break;
        }
        used += w;
        start -= 1;
    }

    let mut visible = String::new();
    let mut visible_width = 0usize;
    for &c in &chars[start..] {
        let w = c.width().unwrap_or(0);
        if visible_width + w > avail {
            break;
        }
        visible.push(c);
        visible_width += w;
    }

    let cursor_offset = chars[start..cursor_pos]
        .iter()
        .collect::<String>()
        .width();

    DisplayText {
        visible,
        cursor_offset,
    }
}
