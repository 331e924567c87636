use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use triage_dashboard_sdk::{PromptGroup, PromptTemplate};

use crate::app::App;

pub fn render_prompts_view(f: &mut Frame, area: Rect, app: &App) {
    let mut lines: Vec<Line> = Vec::new();

    match &app.prompts {
        None => lines.push(Line::from(Span::styled(
            "Loading prompts... press [R] to retry",
            Style::default().fg(Color::DarkGray),
        ))),
        Some(prompts) if prompts.is_empty() => {
            lines.push(Line::from("The backend returned no prompts"));
        }
        Some(prompts) => {
            for (stage, group) in prompts {
                lines.push(Line::from(Span::styled(
                    stage.clone(),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
                )));
                match group {
                    PromptGroup::Single(template) => push_template(&mut lines, None, template),
                    PromptGroup::Named(named) => {
                        for (name, template) in named {
                            push_template(&mut lines, Some(name.as_str()), template);
                        }
                    }
                }
                lines.push(Line::from(""));
            }
        }
    }

    let view = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((app.prompts_scroll, 0))
        .block(Block::default().borders(Borders::ALL).title(" Prompt templates "));
    f.render_widget(view, area);
}

fn push_template(lines: &mut Vec<Line<'static>>, name: Option<&str>, template: &PromptTemplate) {
    if let Some(name) = name {
        lines.push(Line::from(Span::styled(
            format!("  {}", name),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )));
    }
    if !template.description.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("  {}", template.description),
            Style::default().fg(Color::Gray),
        )));
    }
    for line in template.template.lines() {
        lines.push(Line::from(format!("    {}", line)));
    }
    for (label, criteria) in &template.label_criteria {
        lines.push(Line::from(vec![
            Span::styled(format!("    • {}: ", label), Style::default().fg(Color::Magenta)),
            Span::raw(criteria.clone()),
        ]));
    }
}
