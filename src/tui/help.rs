//! Help popup overlay: the chat room's keyboard shortcuts.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
    Frame,
};

const POPUP_WIDTH: u16 = 52;

/// (section title, [(key, description)])
type Section = (&'static str, &'static [(&'static str, &'static str)]);

const SECTIONS: &[Section] = &[
    (
        "聊天",
        &[
            ("Enter", "送出訊息"),
            ("Ctrl+A", "送出並請 AI 回應"),
            ("Ctrl+O", "上傳圖片 (輸入檔案路徑)"),
            ("Esc", "取消圖片上傳"),
            ("Ctrl+U", "清除輸入"),
            ("F2", "切換說話的人"),
        ],
    ),
    (
        "瀏覽",
        &[
            ("Up/Down", "捲動訊息"),
            ("PgUp/PgDn", "整頁捲動"),
            ("Ctrl+Home", "跳到最舊訊息"),
            ("Ctrl+G", "跳到最新訊息"),
            ("Shift+Up/Down", "捲動除錯紀錄"),
        ],
    ),
    (
        "其他",
        &[
            ("Ctrl+D", "顯示/隱藏除錯紀錄"),
            ("F1", "顯示這個說明"),
            ("Ctrl+C / Ctrl+Q", "離開"),
        ],
    ),
];

/// Width of the key column.
const KEY_WIDTH: usize = 18;

pub fn render_help_popup(frame: &mut Frame) {
    let lines = build_lines();
    let area = frame.area();

    let popup_w = POPUP_WIDTH.min(area.width.saturating_sub(2));
    let popup_h = (lines.len() as u16 + 2).min(area.height.saturating_sub(2));
    let popup_area = centered_rect(popup_w, popup_h, area);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            " 說明 ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))
        .title_bottom(Line::from(Span::styled(
            " 按任意鍵關閉 ",
            Style::default().fg(Color::Gray),
        )));

    frame.render_widget(Paragraph::new(lines).block(block), popup_area);
}

fn build_lines() -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (i, (title, shortcuts)) in SECTIONS.iter().enumerate() {
        if i > 0 {
            lines.push(Line::from(""));
        }
        lines.push(Line::from(Span::styled(
            format!(" {}", title),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )));
        for (key, desc) in shortcuts.iter() {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("  {:<width$}", key, width = KEY_WIDTH),
                    Style::default().fg(Color::Yellow),
                ),
                Span::styled(*desc, Style::default().fg(Color::Gray)),
            ]));
        }
    }
    lines
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}
