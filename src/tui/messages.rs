//! Messages pane: the live feed rendered as cards.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::scroll::ScrollTracker;
use crate::models::{format_timestamp, Message, AI_SPEAKER};

pub const LOADING_TEXT: &str = "AI 正在回應中...";
pub const UPLOADING_TEXT: &str = "圖片上傳中...";
pub const JUMP_HINT: &str = " ⬇ 查看最新訊息 (Ctrl+G) ";

/// Everything the pane needs from the app for one frame.
pub struct FeedView<'a> {
    pub messages: &'a [Message],
    /// Current speaker; their cards are right-aligned.
    pub me: &'a str,
    pub speakers: &'a [String],
    /// Text for the in-flight request, shown after the last card.
    pub busy: Option<&'a str>,
    pub synced: bool,
}

/// Render the feed and record the resulting layout in `scroll`.
pub fn render(area: Rect, buf: &mut Buffer, view: &FeedView, scroll: &mut ScrollTracker) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::DarkGray));

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    if view.messages.is_empty() && view.busy.is_none() {
        let text = if view.synced {
            " 還沒有訊息，說點什麼吧"
        } else {
            " 正在連線..."
        };
        Paragraph::new(Line::from(Span::styled(
            text,
            Style::default().fg(Color::DarkGray),
        )))
        .render(inner, buf);
        scroll.update_layout(0, inner.height as usize);
        return;
    }

    let lines = build_lines(view, inner.width as usize);
    let visible_height = inner.height as usize;
    scroll.update_layout(lines.len(), visible_height);

    let visible: Vec<Line> = lines
        .into_iter()
        .skip(scroll.offset())
        .take(visible_height)
        .collect();
    Paragraph::new(visible).render(inner, buf);

    if scroll.show_jump_button() {
        render_jump_hint(inner, buf);
    }
}

/// Overlay the jump-to-latest hint on the bottom-right of the pane.
fn render_jump_hint(area: Rect, buf: &mut Buffer) {
    let width = (JUMP_HINT.width() as u16).min(area.width);
    let hint_area = Rect::new(
        area.x + area.width - width,
        area.y + area.height.saturating_sub(1),
        width,
        1,
    );
    Paragraph::new(Line::from(Span::styled(
        JUMP_HINT,
        Style::default()
            .fg(Color::Black)
            .bg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )))
    .render(hint_area, buf);
}

/// AI yellow, first speaker blue, second green, anyone else gray.
fn speaker_color(msg: &Message, speakers: &[String]) -> Color {
    if msg.is_assistant() {
        return Color::Yellow;
    }
    match speakers.iter().position(|s| *s == msg.speaker) {
        Some(0) => Color::Blue,
        Some(1) => Color::Green,
        _ => Color::Gray,
    }
}

/// Flatten the feed into display lines, one card per message.
fn build_lines(view: &FeedView, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for msg in view.messages {
        render_card(&mut lines, msg, view, width);
        lines.push(Line::from(""));
    }
    if let Some(text) = view.busy {
        lines.push(Line::from(Span::styled(
            format!(" {}", text),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        )));
    }
    lines
}

fn render_card(lines: &mut Vec<Line<'static>>, msg: &Message, view: &FeedView, width: usize) {
    let own = !msg.is_assistant() && msg.speaker == view.me;

    // Cards take at most three quarters of the pane, less one column of margin.
    let avail = width.saturating_sub(2);
    let max_inner = (avail * 3 / 4).max(16).min(avail).saturating_sub(4);
    if max_inner < 6 {
        return;
    }

    let label = if own {
        String::new()
    } else if msg.is_assistant() {
        AI_SPEAKER.to_string()
    } else {
        msg.speaker.clone()
    };
    let ts = format_timestamp(msg.timestamp);

    let text_style = Style::default().fg(Color::White);
    let link_style = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::UNDERLINED);
    let mut body: Vec<(String, Style)> = wrap_text(&msg.content, max_inner)
        .into_iter()
        .map(|l| (l, text_style))
        .collect();
    if let Some(ref url) = msg.image_url {
        body.extend(
            wrap_text(&format!("[image] {}", url), max_inner)
                .into_iter()
                .map(|l| (l, link_style)),
        );
    }

    // Two columns between label and timestamp when both are shown.
    let gap = if label.is_empty() || ts.is_empty() { 0 } else { 2 };
    let header_width = label.width() + gap + ts.width();
    let inner = body
        .iter()
        .map(|(l, _)| l.width())
        .chain(std::iter::once(header_width))
        .max()
        .unwrap_or(0)
        .min(max_inner);
    let card_width = inner + 4;

    let indent = if own {
        " ".repeat(width.saturating_sub(card_width + 1))
    } else {
        " ".to_string()
    };

    let border = Style::default().fg(speaker_color(msg, view.speakers));
    let edge = format!("+{}+", "-".repeat(inner + 2));

    lines.push(Line::from(vec![
        Span::raw(indent.clone()),
        Span::styled(edge.clone(), border),
    ]));

    let pad = inner.saturating_sub(header_width);
    lines.push(Line::from(vec![
        Span::raw(indent.clone()),
        Span::styled("| ", border),
        Span::styled(label, border.add_modifier(Modifier::BOLD)),
        Span::raw(" ".repeat(pad + gap)),
        Span::styled(ts, Style::default().fg(Color::DarkGray)),
        Span::styled(" |", border),
    ]));

    for (text, style) in body {
        let pad = inner.saturating_sub(text.width());
        lines.push(Line::from(vec![
            Span::raw(indent.clone()),
            Span::styled("| ", border),
            Span::styled(text, style),
            Span::raw(" ".repeat(pad)),
            Span::styled(" |", border),
        ]));
    }

    lines.push(Line::from(vec![Span::raw(indent), Span::styled(edge, border)]));
}

/// Word-wrap by display width. Words wider than a line are split by character.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![];
    }
    let mut result = Vec::new();
    for line in text.lines() {
        if line.width() <= max_width {
            result.push(line.to_string());
            continue;
        }
        let mut current = String::new();
        for word in line.split_whitespace() {
            let sep = usize::from(!current.is_empty());
            if current.width() + sep + word.width() <= max_width {
                if sep == 1 {
                    current.push(' ');
                }
                current.push_str(word);
                continue;
            }
            if !current.is_empty() {
                result.push(std::mem::take(&mut current));
            }
            for c in word.chars() {
                let w = c.width().unwrap_or(0);
                if !current.is_empty() && current.width() + w > max_width {
                    result.push(std::mem::take(&mut current));
                }
                current.push(c);
            }
        }
        if !current.is_empty() {
            result.push(current);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn msg(role: Role, speaker: &str, content: &str) -> Message {
        Message {
            id: format!("{}-{}", speaker, content),
            role,
            speaker: speaker.to_string(),
            content: content.to_string(),
            image_url: None,
            timestamp: None,
        }
    }

    fn text_of(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn speakers() -> Vec<String> {
        vec!["阿庭".to_string(), "阿金".to_string()]
    }

    #[test]
    fn test_wrap_text_by_words() {
        let lines = wrap_text("the quick brown fox jumps", 10);
        assert_eq!(lines, vec!["the quick", "brown fox", "jumps"]);
    }

    #[test]
    fn test_wrap_text_splits_cjk_by_width() {
        // Each character is two columns wide.
        let lines = wrap_text("一二三四五六七", 6);
        assert_eq!(lines, vec!["一二三", "四五六", "七"]);
    }

    #[test]
    fn test_wrap_text_keeps_blank_lines() {
        assert_eq!(wrap_text("a\n\nb", 10), vec!["a", "", "b"]);
        assert!(wrap_text("", 10).is_empty());
    }

    #[test]
    fn test_own_card_is_right_aligned_without_label() {
        let speakers = speakers();
        let messages = vec![msg(Role::User, "阿庭", "Hello")];
        let view = FeedView {
            messages: &messages,
            me: "阿庭",
            speakers: &speakers,
            busy: None,
            synced: true,
        };
        let lines = build_lines(&view, 60);
        let top = text_of(&lines[0]);
        assert!(top.starts_with("          "), "{:?}", top);
        assert!(top.trim_start().starts_with('+'));
        assert!(!text_of(&lines[1]).contains("阿庭"));
        assert!(text_of(&lines[2]).contains("Hello"));
    }

    #[test]
    fn test_other_cards_are_left_aligned_and_labelled() {
        let speakers = speakers();
        let messages = vec![
            msg(Role::User, "阿金", "hi there"),
            msg(Role::Assistant, AI_SPEAKER, "你好"),
        ];
        let view = FeedView {
            messages: &messages,
            me: "阿庭",
            speakers: &speakers,
            busy: None,
            synced: true,
        };
        let lines = build_lines(&view, 60);
        assert_eq!(text_of(&lines[0]), format!(" +{}+", "-".repeat(10)));
        assert!(text_of(&lines[1]).contains("阿金"));

        // Second card starts after 4 card lines and a blank separator.
        assert!(text_of(&lines[6]).contains("AI"));
        assert_eq!(lines[6].spans[2].style.fg, Some(Color::Yellow));
        assert_eq!(lines[1].spans[2].style.fg, Some(Color::Green));
    }

    #[test]
    fn test_image_card_shows_url() {
        let speakers = speakers();
        let mut image = msg(Role::User, "阿金", "");
        image.image_url = Some("https://img/1.png".to_string());
        let messages = vec![image];
        let view = FeedView {
            messages: &messages,
            me: "阿庭",
            speakers: &speakers,
            busy: None,
            synced: true,
        };
        let lines = build_lines(&view, 60);
        assert!(lines
            .iter()
            .any(|l| text_of(l).contains("[image] https://img/1.png")));
    }

    #[test]
    fn test_busy_line_is_last() {
        let speakers = speakers();
        let messages = vec![msg(Role::User, "阿庭", "q")];
        let view = FeedView {
            messages: &messages,
            me: "阿庭",
            speakers: &speakers,
            busy: Some(LOADING_TEXT),
            synced: true,
        };
        let lines = build_lines(&view, 60);
        assert!(text_of(lines.last().unwrap()).contains(LOADING_TEXT));

        let view = FeedView {
            busy: Some(UPLOADING_TEXT),
            ..view
        };
        let lines = build_lines(&view, 60);
        let last = text_of(lines.last().unwrap());
        assert!(last.contains(UPLOADING_TEXT));
        assert!(!last.contains(LOADING_TEXT));
    }

    #[test]
    fn test_render_shows_jump_hint_when_scrolled_up() {
        let speakers = speakers();
        let messages: Vec<Message> = (0..10)
            .map(|i| msg(Role::User, "阿金", &format!("message {}", i)))
            .collect();
        let view = FeedView {
            messages: &messages,
            me: "阿庭",
            speakers: &speakers,
            busy: None,
            synced: true,
        };
        let area = Rect::new(0, 0, 50, 12);
        let mut buf = Buffer::empty(area);
        let mut scroll = ScrollTracker::default();

        render(area, &mut buf, &view, &mut scroll);
        assert!(!scroll.show_jump_button());

        scroll.scroll_up(10);
        let mut buf = Buffer::empty(area);
        render(area, &mut buf, &view, &mut scroll);
        assert!(scroll.show_jump_button());
        let bottom: String = (0..area.width)
            .map(|x| buf[(x, area.height - 2)].symbol().to_string())
            .collect();
        assert!(bottom.contains("查"), "{:?}", bottom);
    }
}
