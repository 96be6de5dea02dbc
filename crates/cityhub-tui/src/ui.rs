use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, InputMode};
use cityhub_core::{Role, Turn};

const TITLE: &str = " Ask CityHub anything ";

/// Style `**bold**` runs in one line of an answer. An unmatched marker is
/// kept as literal text.
fn answer_line(text: &str) -> Line<'static> {
    let parts: Vec<&str> = text.split("**").collect();
    let unmatched_tail = parts.len() % 2 == 0;
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let spans: Vec<Span<'static>> = parts
        .iter()
        .enumerate()
        .filter_map(|(i, part)| {
            if unmatched_tail && i == parts.len() - 1 {
                Some(Span::raw(format!("**{}", part)))
            } else if part.is_empty() {
                None
            } else if i % 2 == 1 {
                Some(Span::styled(part.to_string(), bold))
            } else {
                Some(Span::raw(part.to_string()))
            }
        })
        .collect();

    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let backend = match &app.model {
        Some(model) => format!("{}: {}", app.backend_name(), model),
        None => app.backend_name().to_string(),
    };

    let title = Line::from(vec![
        Span::styled(TITLE, Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!("[{}]", backend), Style::default().fg(Color::White)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn turn_lines(app: &App, turn: &Turn, lines: &mut Vec<Line<'static>>) {
    match turn.role {
        Role::User => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            for line in turn.text.lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        Role::Bot => {
            lines.push(Line::from(Span::styled(
                "CityHub:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            if turn.is_placeholder() && app.is_awaiting(&turn.id) {
                lines.push(Line::from(Span::styled(
                    app.dots.glyphs(),
                    Style::default().fg(Color::DarkGray),
                )));
            } else if turn.is_error {
                for line in turn.text.lines() {
                    lines.push(Line::from(Span::styled(
                        line.to_string(),
                        Style::default().fg(Color::Red),
                    )));
                }
                if app.conversation.last_failed_turn_id() == Some(&turn.id) {
                    lines.push(Line::from(Span::styled(
                        "Press r to regenerate response",
                        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                    )));
                } else {
                    lines.push(Line::default());
                }
            } else {
                for line in turn.text.lines() {
                    lines.push(answer_line(line));
                }
            }
        }
    }
    lines.push(Line::default());
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);
    if app.follow_bottom {
        app.scroll_to_bottom();
    }

    let border_color = if app.input_mode == InputMode::Normal {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Conversation ");

    let chat_text = if app.conversation.turns().is_empty() {
        Text::from(Span::styled(
            "Ask a question about your city...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line<'static>> = Vec::new();
        for turn in app.conversation.turns() {
            turn_lines(app, turn, &mut lines);
        }
        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if app.is_pending() {
        Color::DarkGray
    } else if editing {
        Color::Yellow
    } else {
        Color::Gray
    };

    let title = if app.is_pending() {
        " Waiting for an answer... "
    } else {
        " Type a message... "
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    // Show cursor when editing
    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " EDIT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints: Vec<(&str, &str)> = match app.input_mode {
        InputMode::Editing => vec![("Enter", "send"), ("Esc", "normal mode"), ("PgUp/PgDn", "scroll")],
        InputMode::Normal => {
            let mut hints = vec![("i", "type")];
            if app.is_pending() {
                hints.push(("Esc", "cancel"));
            }
            if app.conversation.can_retry() {
                hints.push(("r", "retry"));
            }
            hints.extend([("j/k", "scroll"), ("c", "clear"), ("q", "quit")]);
            hints
        }
    };

    let mut spans = vec![Span::styled(mode_text, mode_style)];
    for (key, label) in hints {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {}", label), label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::settings;
    use async_trait::async_trait;
    use cityhub_core::{BackendError, CompletionBackend};
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    struct Never;

    #[async_trait]
    impl CompletionBackend for Never {
        fn name(&self) -> &str {
            "Never"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, BackendError> {
            std::future::pending().await
        }
    }

    fn screen(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(60, 16)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_answer_line_bold() {
        let line = answer_line("the **library** opens");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "library");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_answer_line_unclosed_is_literal() {
        for (raw, shown) in [("2 ** 3", "2 ** 3"), ("**open", "**open"), ("a **b** c **d", "a b c **d")] {
            let line = answer_line(raw);
            let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
            assert_eq!(text, shown);
        }
    }

    #[tokio::test]
    async fn test_pending_exchange_shows_dots() {
        let mut app = App::new(Arc::new(Never), &settings());
        app.input = "hello".to_string();
        app.submit_input().unwrap();
        app.tick();

        let screen = screen(&mut app);
        assert!(screen.contains("You:"));
        assert!(screen.contains("hello"));
        assert!(screen.contains("CityHub:"));
        assert!(screen.contains("• •"));
        assert!(screen.contains("Waiting for an answer"));
        app.shutdown();
    }

    #[tokio::test]
    async fn test_failed_exchange_shows_retry_hint() {
        let mut app = App::new(Arc::new(Never), &settings());
        app.input = "hello".to_string();
        app.submit_input().unwrap();
        app.cancel_request();
        app.input_mode = InputMode::Normal;

        let screen = screen(&mut app);
        assert!(screen.contains("Error: request cancelled"));
        assert!(screen.contains("Press r to regenerate response"));
        assert!(screen.contains(" r  retry"));
    }

    #[test]
    fn test_multi_line_error_gets_one_row_per_line() {
        let mut app = App::new(Arc::new(Never), &settings());
        let request = app.conversation.submit("hello").unwrap();
        app.conversation.resolve(
            &request.turn_id,
            Err(BackendError::Task("worker stopped\nsee server log".to_string())),
        );

        let screen = screen(&mut app);
        assert!(screen.contains("\u{2502}Error: request task failed: worker stopped"));
        assert!(screen.contains("\u{2502}see server log"));
        // You: hello, blank, CityHub:, two error lines, hint, blank
        assert_eq!(app.chat_line_count(), 8);
    }

    #[test]
    fn test_empty_conversation_placeholder() {
        let mut app = App::new(Arc::new(Never), &settings());
        let screen = screen(&mut app);
        assert!(screen.contains("Ask a question about your city"));
        assert!(screen.contains("[Never]"));
    }
}
