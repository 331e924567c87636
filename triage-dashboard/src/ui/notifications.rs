//! Notification rendering for user-visible feedback

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, NotificationLevel};

/// Render up to three active notifications stacked in the bottom-right corner
pub fn render_notifications(f: &mut Frame, app: &App, area: Rect) {
    let notifications = app.notifications.get_active();

    if notifications.is_empty() {
        return;
    }

    let visible = notifications.len().min(3);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(area.width.min(60))])
        .split(area);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length((visible * 4) as u16),
            Constraint::Length(3),
        ])
        .split(columns[1]);

    let notification_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            (0..visible)
                .map(|_| Constraint::Length(4))
                .collect::<Vec<_>>(),
        )
        .split(rows[1]);

    for (idx, notification) in notifications.iter().take(visible).enumerate() {
        let (color, icon) = match notification.level {
            NotificationLevel::Error => (Color::Red, "✗"),
            NotificationLevel::Warning => (Color::Yellow, "⚠"),
            NotificationLevel::Info => (Color::Blue, "ℹ"),
            NotificationLevel::Success => (Color::Green, "✓"),
        };

        let text = vec![
            Line::from(Span::styled(
                format!("{} {}", icon, notification.title),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )),
            Line::from(notification.message.clone()),
        ];

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color));
        let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });

        f.render_widget(Clear, notification_chunks[idx]);
        f.render_widget(paragraph, notification_chunks[idx]);
    }
}
