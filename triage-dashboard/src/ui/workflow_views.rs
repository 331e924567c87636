//! Ticket submission, sequence bar and per-stage cards

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Wrap},
    Frame,
};
use serde_json::Value;
use triage_dashboard_sdk::{RunOutcome, StageEntry, StageStatus};

use super::components::{status_color, status_icon};
use crate::app::{App, InputMode};
use crate::artifact::{ResolutionOutput, ResolutionPlan};
use crate::format::{display_json, percent, truncate};

pub fn render_workflow_view(f: &mut Frame, area: Rect, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8), // Ticket input
            Constraint::Length(3), // Sequence bar
            Constraint::Min(0),    // Stages
            Constraint::Length(3), // Run status
        ])
        .split(area);

    render_ticket_input(f, rows[0], app);
    render_sequence_bar(f, rows[1], app);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(rows[2]);

    render_stage_list(f, columns[0], app);
    let artifact = app.run.final_artifact.as_ref().filter(|_| app.show_artifact);
    match (artifact, app.run.stages.iter().nth(app.selected_stage)) {
        (Some(artifact), _) => render_artifact_pane(f, columns[1], app, artifact),
        (None, Some(entry)) => render_stage_card(f, columns[1], app, entry),
        (None, None) => {
            let empty = Paragraph::new("No stages")
                .block(Block::default().borders(Borders::ALL).title(" Stage "));
            f.render_widget(empty, columns[1]);
        }
    }

    render_run_status(f, rows[3], app);
}

fn render_ticket_input(f: &mut Frame, area: Rect, app: &App) {
    let editing = app.input_mode == InputMode::EditingTicket;
    let border = if editing {
        Style::default().fg(Color::Yellow)
    } else if app.run.in_progress {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::White)
    };

    let content = if app.ticket_input.is_empty() && !editing {
        Paragraph::new(Span::styled(
            "Press [E] to describe a ticket, or [S] to load a sample",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut text = app.ticket_input.clone();
        if editing {
            text.push('█');
        }
        Paragraph::new(text).wrap(Wrap { trim: false })
    };

    let title = if app.run.in_progress {
        " Ticket (submission disabled while running) "
    } else {
        " Ticket "
    };

    // Keep the cursor line in view
    let inner_height = area.height.saturating_sub(2);
    let lines = app.ticket_input.lines().count() as u16 + 1;
    let scroll = lines.saturating_sub(inner_height);

    f.render_widget(
        content
            .scroll((scroll, 0))
            .block(Block::default().borders(Borders::ALL).border_style(border).title(title)),
        area,
    );
}

/// Linear step indicator. The highlighted step is the first active stage,
/// else the first stage not yet complete.
fn render_sequence_bar(f: &mut Frame, area: Rect, app: &App) {
    let entries: Vec<&StageEntry> = app.run.stages.iter().collect();
    let current = entries
        .iter()
        .position(|e| e.state.status.is_active())
        .or_else(|| {
            if app.run.in_progress {
                entries
                    .iter()
                    .position(|e| e.state.status != StageStatus::Complete)
            } else {
                None
            }
        });

    let mut spans = Vec::new();
    for (idx, entry) in entries.iter().enumerate() {
        if idx > 0 {
            let connector_color = if entry.state.status == StageStatus::Idle {
                Color::DarkGray
            } else {
                Color::Gray
            };
            spans.push(Span::styled(" ─ ", Style::default().fg(connector_color)));
        }
        let mut style = Style::default().fg(status_color(entry.state.status));
        if Some(idx) == current {
            style = style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
        }
        spans.push(Span::styled(
            format!("{} {}", status_icon(entry.state.status), entry.key.display_name()),
            style,
        ));
    }

    let bar = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(" Pipeline "));
    f.render_widget(bar, area);
}

fn render_stage_list(f: &mut Frame, area: Rect, app: &App) {
    let items: Vec<ListItem> = app
        .run
        .stages
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let state = &entry.state;
            let selected = idx == app.selected_stage;
            let name_style = if selected {
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD | Modifier::REVERSED)
            } else {
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
            };

            let mut lines = vec![Line::from(vec![
                Span::styled(
                    format!("{} ", status_icon(state.status)),
                    Style::default().fg(status_color(state.status)),
                ),
                Span::styled(entry.key.display_name().to_string(), name_style),
                Span::styled(
                    format!("  {}%", state.progress),
                    Style::default().fg(Color::DarkGray),
                ),
            ])];

            // Last streamed line as a preview
            let preview = state
                .error_detail
                .as_deref()
                .or_else(|| state.accumulated_text.lines().last())
                .unwrap_or(entry.key.description());
            lines.push(Line::from(Span::styled(
                format!("  {}", truncate(preview, area.width.saturating_sub(6) as usize)),
                Style::default().fg(if state.status == StageStatus::Error {
                    Color::Red
                } else {
                    Color::DarkGray
                }),
            )));
            ListItem::new(lines)
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(" Stages "));
    f.render_widget(list, area);
}

fn render_stage_card(f: &mut Frame, area: Rect, app: &App, entry: &StageEntry) {
    let state = &entry.state;
    let color = status_color(state.status);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(format!(
            " {} {} [{}] ",
            status_icon(state.status),
            entry.key.display_name(),
            state.status.label()
        ));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(inner);

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(color).bg(Color::Black))
        .percent(state.progress.min(100) as u16)
        .label(format!("{}%", state.progress));
    f.render_widget(gauge, rows[0]);

    let mut lines: Vec<Line> = Vec::new();

    if let Some(error) = &state.error_detail {
        lines.push(Line::from(Span::styled(
            "Error",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
        lines.push(Line::from(""));
    }

    if !state.accumulated_text.is_empty() {
        lines.push(section_title("Streaming"));
        for line in state.accumulated_text.lines() {
            lines.push(Line::from(line.to_string()));
        }
        lines.push(Line::from(""));
    }

    if !state.tool_calls.is_empty() {
        lines.push(section_title("Tool calls"));
        for call in &state.tool_calls {
            lines.push(Line::from(vec![
                Span::styled(format!("  {} ", call.name), Style::default().fg(Color::Cyan)),
                Span::raw(call.description.clone()),
            ]));
        }
        lines.push(Line::from(""));
    }

    if !state.tool_outputs.is_empty() {
        lines.push(section_title("Tool outputs"));
        for output in &state.tool_outputs {
            lines.push(Line::from(Span::styled(
                format!("  {}", output.name),
                Style::default().fg(Color::Cyan),
            )));
            for line in output.content.lines() {
                lines.push(Line::from(format!("    {}", line)));
            }
        }
        lines.push(Line::from(""));
    }

    if let Some(output) = &state.final_output {
        lines.push(section_title("Output"));
        for line in output.lines() {
            lines.push(Line::from(line.to_string()));
        }
    }

    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            entry.key.description().to_string(),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let body = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((app.stage_scroll, 0));
    f.render_widget(body, rows[1]);
}

/// Final output of the run: the resolution plan when the artifact has one,
/// pretty JSON otherwise
fn render_artifact_pane(f: &mut Frame, area: Rect, app: &App, artifact: &Value) {
    let lines = match ResolutionOutput::from_artifact(artifact) {
        Some(output) => resolution_lines(&output),
        None => display_json(artifact)
            .lines()
            .map(|line| Line::from(line.to_string()))
            .collect(),
    };

    let title = match artifact.get("ticket_id").and_then(Value::as_str) {
        Some(id) => format!(" Final Resolution Output: {} ", id),
        None => " Final Resolution Output ".to_string(),
    };
    let body = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((app.stage_scroll, 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Green))
                .title(title),
        );
    f.render_widget(body, area);
}

fn risk_color(risk: &str) -> Color {
    match risk {
        "high" => Color::Red,
        "medium" => Color::Yellow,
        "low" => Color::Green,
        _ => Color::Gray,
    }
}

fn resolution_lines(output: &ResolutionOutput) -> Vec<Line<'static>> {
    let plan: &ResolutionPlan = &output.plan;
    let mut lines = vec![
        section_title("Summary"),
        Line::from(plan.summary.clone()),
        Line::from(Span::styled(
            format!(
                "~{}h total, {} confidence",
                plan.total_estimated_time_hours,
                percent(plan.confidence)
            ),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(""),
    ];

    if output.novelty_detected {
        let recommendation = output.novelty_recommendation.as_deref().unwrap_or("review");
        lines.push(Line::from(Span::styled(
            format!("⚠ Novel ticket, recommendation: {}", recommendation),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(""));
    }
    for warning in &plan.warnings {
        lines.push(Line::from(Span::styled(
            format!("⚠ [{}] {}", warning.severity, warning.message),
            Style::default().fg(risk_color(&warning.severity)),
        )));
        if !warning.recommendation.is_empty() {
            lines.push(Line::from(format!("  {}", warning.recommendation)));
        }
    }

    if !plan.resolution_steps.is_empty() {
        lines.push(section_title("Resolution steps"));
        for step in &plan.resolution_steps {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{}. ", step.step_number),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw(step.description.clone()),
                Span::styled(
                    format!("  [{}]", step.risk_level.to_uppercase()),
                    Style::default().fg(risk_color(&step.risk_level)),
                ),
                Span::styled(
                    format!("  ~{} min", step.estimated_time_minutes),
                    Style::default().fg(Color::DarkGray),
                ),
            ]));
            for command in &step.commands {
                lines.push(Line::from(Span::styled(
                    format!("   $ {}", command),
                    Style::default().fg(Color::Cyan),
                )));
            }
            if !step.validation.is_empty() {
                lines.push(Line::from(format!("   ✓ {}", step.validation)));
            }
            if !step.rollback_procedure.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("   ↺ {}", step.rollback_procedure),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            if let Some(source) = &step.source_ticket {
                lines.push(Line::from(Span::styled(
                    format!("   from {}", source),
                    Style::default().fg(Color::DarkGray),
                )));
            }
        }
        lines.push(Line::from(""));
    }

    let bullets = [
        ("Additional considerations", &plan.additional_considerations),
        ("Alternative approaches", &plan.alternative_approaches),
    ];
    for (title, items) in bullets {
        if items.is_empty() {
            continue;
        }
        lines.push(section_title(title));
        for item in items.iter() {
            lines.push(Line::from(format!("  • {}", item)));
        }
        lines.push(Line::from(""));
    }

    if !plan.references.is_empty() {
        lines.push(section_title("References"));
        for reference in &plan.references {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("  {} ", reference.ticket_id),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(
                    format!("{} ", percent(reference.similarity)),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(reference.note.clone()),
            ]));
        }
    }

    lines
}

fn section_title(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        title.to_string(),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
    ))
}

fn render_run_status(f: &mut Frame, area: Rect, app: &App) {
    let run = &app.run;
    let mut spans = Vec::new();

    match (&run.outcome, run.in_progress) {
        (_, true) => spans.push(Span::styled("Running", Style::default().fg(Color::Yellow))),
        (Some(RunOutcome::Completed { .. }), _) => {
            spans.push(Span::styled("Complete", Style::default().fg(Color::Green)))
        }
        (Some(RunOutcome::Failed { message }), _) => spans.push(Span::styled(
            format!("Failed: {}", message),
            Style::default().fg(Color::Red),
        )),
        (Some(RunOutcome::Cancelled), _) => {
            spans.push(Span::styled("Cancelled", Style::default().fg(Color::Yellow)))
        }
        (None, false) if run.started_at.is_some() => spans.push(Span::styled(
            "Stream ended without completion",
            Style::default().fg(Color::Yellow),
        )),
        (None, false) => spans.push(Span::styled("Idle", Style::default().fg(Color::Gray))),
    }

    if let Some(ticket) = &run.ticket {
        spans.push(Span::styled(
            format!("  {}", ticket.ticket_id),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if let Some(started) = run.started_at {
        let end = run.finished_at.unwrap_or_else(chrono::Local::now);
        let elapsed = (end - started).num_seconds().max(0);
        spans.push(Span::styled(
            format!("  {}s", elapsed),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if run.final_artifact.is_some() {
        let hint = if app.show_artifact { "[O] hide" } else { "[O] show" };
        spans.push(Span::styled(
            format!("  ✓ final output {}", hint),
            Style::default().fg(Color::Green),
        ));
    }
    if run.dropped_records > 0 {
        spans.push(Span::styled(
            format!("  ⚠ {} malformed records dropped", run.dropped_records),
            Style::default().fg(Color::Yellow),
        ));
    }

    let status = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(" Run "));
    f.render_widget(status, area);
}
