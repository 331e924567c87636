//! Header and footer rendering functions

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::components::key_hint;
use crate::app::{App, InputMode, SearchFocus, View};

pub fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![Span::styled(
        "Triage Dashboard",
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )];

    for (idx, view) in View::ALL.iter().enumerate() {
        let style = if *view == app.current_view {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::raw("  "));
        spans.push(Span::styled(format!(" {} {} ", idx + 1, view.title()), style));
    }

    let (run_label, run_color) = if app.run.in_progress {
        ("● running", Color::Yellow)
    } else {
        ("○ idle", Color::Gray)
    };
    spans.push(Span::raw("    "));
    spans.push(Span::styled(run_label, Style::default().fg(run_color)));
    spans.push(Span::styled(
        format!("  {}", app.config.backend_url),
        Style::default().fg(Color::DarkGray),
    ));

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

pub fn render_footer(f: &mut Frame, area: Rect, app: &App) {
    let mut spans: Vec<Span> = Vec::new();

    match (app.input_mode, app.current_view) {
        (InputMode::EditingTicket, _) | (InputMode::EditingQuery, _) => {
            spans.push(Span::styled(
                "TYPE",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::raw(" to edit  "));
            spans.extend(key_hint("[Alt+Enter]", " Submit  "));
            spans.extend(key_hint("[Esc]", " Done  "));
            spans.extend(key_hint("[Backspace]", " Delete"));
        }
        (InputMode::Normal, View::Workflow) => {
            spans.extend(key_hint("[E]", " Edit  "));
            spans.extend(key_hint("[Enter]", " Submit  "));
            spans.extend(key_hint("[S]", " Sample  "));
            spans.extend(key_hint("[C]", " Cancel  "));
            spans.extend(key_hint("[↑↓/jk]", " Stage  "));
            spans.extend(key_hint("[PgUp/PgDn]", " Scroll  "));
            spans.extend(key_hint("[O]", " Output  "));
            spans.extend(key_hint("[X]", " Export  "));
            spans.extend(key_hint("[D]", " CSV  "));
        }
        (InputMode::Normal, View::Search) => {
            spans.extend(key_hint("[/]", " Query  "));
            spans.extend(key_hint("[P]", " Preview  "));
            if app.search_focus == SearchFocus::Fields {
                spans.extend(key_hint("[↑↓]", " Field  "));
                spans.extend(key_hint("[←→]", " Adjust  "));
            } else {
                spans.extend(key_hint("[↑↓]", " Result  "));
                spans.extend(key_hint("[Enter]", " Expand  "));
            }
            spans.extend(key_hint("[F]", " Focus  "));
            spans.extend(key_hint("[Shift+L]", " Load  "));
            spans.extend(key_hint("[W]", " Save  "));
            spans.extend(key_hint("[R]", " Reset  "));
            spans.extend(key_hint("[X]", " Export  "));
        }
        (InputMode::Normal, View::Prompts) => {
            spans.extend(key_hint("[↑↓]", " Scroll  "));
            spans.extend(key_hint("[R]", " Reload  "));
        }
    }

    if app.input_mode == InputMode::Normal {
        spans.extend(key_hint("[Tab]", " View  "));
        spans.extend(key_hint("[Q]", " Quit"));
    }

    let footer = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, area);
}
