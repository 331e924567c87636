//! Text helpers shared by the TUI and the headless commands

use serde_json::Value;
use triage_dashboard_sdk::Ticket;

/// Pretty JSON for display. No stable format is promised.
pub fn display_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Render a ticket as the editable text shown in the submission input
pub fn ticket_as_text(ticket: &Ticket) -> String {
    fn or_na(value: &str) -> &str {
        if value.trim().is_empty() {
            "N/A"
        } else {
            value
        }
    }

    format!(
        "{}\n\n{}\n\nPriority: {}\nReported by: {}\nEnvironment: {}\nAffected users: {}",
        ticket.title,
        ticket.description,
        or_na(&ticket.priority),
        or_na(&ticket.metadata.reported_by),
        or_na(&ticket.metadata.environment),
        ticket.metadata.affected_users,
    )
}

/// First line of `text`, or `fallback` when that line is blank
pub fn first_line_or<'a>(text: &'a str, fallback: &'a str) -> &'a str {
    text.lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .unwrap_or(fallback)
}

/// Truncate on a char boundary, appending "..." when shortened
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Similarity score as a percentage, e.g. `87.5%`
pub fn percent(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}
