//! UI rendering for the TUI

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::app::App;
use super::compose;
use super::debug_log;
use super::help;
use super::messages::{self, FeedView};

/// Main render function
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    let debug_height = if app.debug_log.visible {
        debug_log::DEBUG_LOG_HEIGHT
    } else {
        0
    };

    // header, feed, optional debug pane, compose box, status bar
    let [header_area, messages_area, debug_area, compose_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(debug_height),
        Constraint::Length(compose::COMPOSE_HEIGHT),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(header_area, frame.buffer_mut(), app);

    let view = FeedView {
        messages: app.feed.messages(),
        me: &app.speakers[app.speaker_idx],
        speakers: &app.speakers,
        busy: app.busy,
        synced: app.feed.is_synced(),
    };
    messages::render(messages_area, frame.buffer_mut(), &view, &mut app.scroll);

    if app.debug_log.visible {
        debug_log::render(debug_area, frame.buffer_mut(), &app.debug_log);
    }

    compose::render(
        compose_area,
        frame,
        &app.compose,
        &app.speakers[app.speaker_idx],
        app.busy,
    );

    render_status(status_area, frame.buffer_mut(), app);

    if app.show_help {
        help::render_help_popup(frame);
    }
}

/// "阿庭與阿金聊天室 🤖", or a generic title for other speaker counts.
fn room_title(speakers: &[String]) -> String {
    match speakers {
        [a, b, ..] => format!("{}與{}聊天室 🤖", a, b),
        [a] => format!("{}的聊天室 🤖", a),
        [] => "聊天室 🤖".to_string(),
    }
}

/// Render the header bar
fn render_header(area: Rect, buf: &mut Buffer, app: &App) {
    let title = format!(" {}", room_title(&app.speakers));
    let speaker = app.speaker();

    let right_width = "你是誰？ ".width() + speaker.width() + " [F2]  F1 說明 ".width();
    let padding_width = (area.width as usize).saturating_sub(title.width() + right_width);

    let header_line = Line::from(vec![
        Span::styled(
            title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding_width)),
        Span::styled("你是誰？ ", Style::default().fg(Color::Gray)),
        Span::styled(
            speaker.to_string(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(" [F2]", Style::default().fg(Color::DarkGray)),
        Span::styled("  F1 說明 ", Style::default().fg(Color::Gray)),
    ]);

    Paragraph::new(header_line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

/// Render the status bar
fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    if let Some(ref msg) = app.status_message {
        let style = if app.status_is_error {
            Style::default().fg(Color::Red).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green).bg(Color::DarkGray)
        };
        let line = Line::from(Span::styled(format!(" {} ", msg), style));
        Paragraph::new(line)
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
        return;
    }

    let conn_color = if app.feed.is_synced() {
        Color::Green
    } else {
        Color::Yellow
    };
    let sep_style = Style::default().fg(Color::Gray);

    let status_line = Line::from(vec![
        Span::styled(
            format!(" * {} ", app.connection_state),
            Style::default().fg(conn_color),
        ),
        Span::styled(" | ", sep_style),
        Span::styled(
            format!("{} 則訊息", app.feed.messages().len()),
            Style::default().fg(Color::Yellow),
        ),
        Span::styled(" | ", sep_style),
        Span::styled("C-d: debug", Style::default().fg(Color::Gray)),
        Span::styled(" | ", sep_style),
        Span::styled("C-q: quit", Style::default().fg(Color::Gray)),
    ]);

    Paragraph::new(status_line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}
