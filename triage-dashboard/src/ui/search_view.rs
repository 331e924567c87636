//! Search-tuning panel and preview results

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, FetchKind, InputMode, SearchField, SearchFocus};
use crate::format::{percent, truncate};
use crate::taxonomy;

pub fn render_search_view(f: &mut Frame, area: Rect, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(12), Constraint::Min(0)])
        .split(columns[0]);

    render_config_fields(f, left[0], app);
    render_query(f, left[1], app);
    render_results(f, columns[1], app);
}

fn field_row(app: &App, field: SearchField) -> (String, String) {
    let config = &app.search.config;
    match field {
        SearchField::TopK => ("Top K".to_string(), config.top_k.to_string()),
        SearchField::VectorWeight => (
            "Vector / metadata".to_string(),
            format!("{:.2} / {:.2}", config.vector_weight, config.metadata_weight),
        ),
        SearchField::PriorityWeight(priority) => (
            format!("Weight {}", priority.as_str()),
            format!("{:.1}", config.priority_weights.get(priority)),
        ),
        SearchField::TimeNormalization => (
            "Time normalization".to_string(),
            format!("{:.0} h", config.time_normalization_hours),
        ),
        SearchField::Domain => (
            "Domain filter".to_string(),
            app.search.domain_filter().label().to_string(),
        ),
    }
}

fn render_config_fields(f: &mut Frame, area: Rect, app: &App) {
    let focused = app.search_focus == SearchFocus::Fields && app.input_mode == InputMode::Normal;

    let items: Vec<ListItem> = SearchField::ALL
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            let (label, value) = field_row(app, *field);
            let selected = focused && idx == app.search_field;
            let style = if selected {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<20}", label), style),
                Span::styled(format!(" ◀ {} ▶", value), Style::default().fg(Color::Cyan)),
            ]))
        })
        .collect();

    let title = if app.search.dirty {
        " Search config (unsaved) "
    } else {
        " Search config "
    };
    let border = if focused { Color::Yellow } else { Color::White };
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(title),
    );
    f.render_widget(list, area);
}

fn render_query(f: &mut Frame, area: Rect, app: &App) {
    let editing = app.input_mode == InputMode::EditingQuery;
    let text = if app.search.query.is_empty() && !editing {
        Paragraph::new(Span::styled(
            "Press [/] to enter a query",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut query = app.search.query.clone();
        if editing {
            query.push('█');
        }
        Paragraph::new(query).wrap(Wrap { trim: false })
    };

    let border = if editing { Color::Yellow } else { Color::White };
    f.render_widget(
        text.block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .title(" Query "),
        ),
        area,
    );
}

fn render_results(f: &mut Frame, area: Rect, app: &App) {
    let focused = app.search_focus == SearchFocus::Results;
    let mut lines: Vec<Line> = Vec::new();

    if let Some(error) = &app.search.last_error {
        lines.push(Line::from(Span::styled(
            format!("✗ {}", error),
            Style::default().fg(Color::Red),
        )));
        lines.push(Line::from(""));
    }

    if let Some(meta) = &app.search.metadata {
        let domain = taxonomy::domain(&meta.query_domain);
        let mut spans = vec![
            Span::styled("Domain ", Style::default().fg(Color::Gray)),
            Span::styled(
                domain.key,
                Style::default().fg(domain.color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  found {}  avg {}  top {}", meta.total_found, percent(meta.avg_similarity), percent(meta.top_similarity)),
                Style::default().fg(Color::Gray),
            ),
        ];
        if let Some(confidence) = meta.classification_confidence {
            spans.push(Span::styled(
                format!("  confidence {}", percent(confidence)),
                Style::default().fg(Color::Gray),
            ));
        }
        lines.push(Line::from(spans));
        lines.push(Line::from(""));
    }

    for (idx, ticket) in app.search.results.iter().enumerate() {
        let selected = focused && idx == app.search.selected_result;
        let expanded = app.search.is_expanded(&ticket.ticket_id);
        let title_style = if selected {
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD | Modifier::REVERSED)
        } else {
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
        };

        lines.push(Line::from(vec![
            Span::styled(format!("{:>2}. ", idx + 1), Style::default().fg(Color::DarkGray)),
            Span::styled(if expanded { "▼ " } else { "▶ " }, Style::default().fg(Color::White)),
            Span::styled(format!("{} ", ticket.ticket_id), Style::default().fg(Color::Cyan)),
            Span::styled(truncate(&ticket.title, 48), title_style),
            Span::styled(
                format!("  {}", percent(ticket.similarity_score)),
                Style::default().fg(Color::Green),
            ),
        ]));

        if expanded {
            let domain = taxonomy::domain(&ticket.domain);
            lines.push(Line::from(vec![
                Span::raw("      "),
                Span::styled(domain.key, Style::default().fg(domain.color)),
                Span::raw("  "),
                Span::styled(
                    ticket.priority.clone(),
                    Style::default().fg(taxonomy::priority_color(&ticket.priority)),
                ),
                Span::styled(
                    format!(
                        "  vector {}  metadata {}  {:.0}h to resolve",
                        percent(ticket.vector_similarity),
                        percent(ticket.metadata_score),
                        ticket.resolution_time_hours
                    ),
                    Style::default().fg(Color::Gray),
                ),
            ]));
            if !ticket.labels.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("      Labels: {}", ticket.labels.join(", ")),
                    Style::default().fg(Color::Magenta),
                )));
            }
            lines.push(Line::from(format!("      {}", ticket.description)));
            if let Some(resolution) = &ticket.resolution {
                lines.push(Line::from(Span::styled(
                    format!("      Resolution: {}", resolution),
                    Style::default().fg(Color::Green),
                )));
            }
        }
    }

    if app.search.results.is_empty() && app.search.last_error.is_none() {
        lines.push(Line::from(Span::styled(
            "No results yet. Press [P] to preview the search.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    // Keep the selected result near the top of the view
    let scroll = if focused {
        app.search.selected_result.saturating_sub(3) as u16
    } else {
        0
    };

    let border = if focused { Color::Yellow } else { Color::White };
    let results = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .title(results_title(app)),
        );
    f.render_widget(results, area);
}

fn results_title(app: &App) -> String {
    if app.tasks.is_running(FetchKind::Preview) {
        format!(" Similar tickets ({}) searching... ", app.search.results.len())
    } else {
        format!(" Similar tickets ({}) ", app.search.results.len())
    }
}
