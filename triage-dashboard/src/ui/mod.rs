//! UI rendering functions for the triage dashboard TUI
//!
//! One module per view plus shared header, footer and overlay components.

use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

use crate::app::{App, View};

// Module declarations
mod components;
mod header_footer;
mod notifications;
mod prompts_view;
mod search_view;
mod workflow_views;

// Re-export public functions
pub use components::{centered_rect, render_cancel_confirmation, status_color, status_icon};
pub use header_footer::{render_footer, render_header};
pub use notifications::render_notifications;
pub use prompts_view::render_prompts_view;
pub use search_view::render_search_view;
pub use workflow_views::render_workflow_view;

/// Main UI rendering function - orchestrates all view rendering
pub fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    // Header
    render_header(f, chunks[0], app);

    // Main content
    match app.current_view {
        View::Workflow => render_workflow_view(f, chunks[1], app),
        View::Search => render_search_view(f, chunks[1], app),
        View::Prompts => render_prompts_view(f, chunks[1], app),
    }

    // Footer
    render_footer(f, chunks[2], app);

    // Notifications overlay
    render_notifications(f, app, f.area());

    // Cancel confirmation overlay
    if app.show_cancel_confirmation {
        render_cancel_confirmation(f, f.area());
    }
}
