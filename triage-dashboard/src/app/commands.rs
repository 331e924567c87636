//! Command pattern for App communication
//!
//! Background fetches never touch the App directly. They report back with an
//! [`AppCommand`] that the UI thread applies on its next tick.

use std::path::PathBuf;
use triage_dashboard_sdk::{PromptTemplates, SearchConfig, SearchPreviewResponse, Ticket, UiConfig};

/// Results of background tasks, delivered to the App
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// `/api/config` answered
    UiConfigLoaded(UiConfig),

    /// Sample ticket to place in the submission input
    SampleLoaded(Ticket),

    SearchConfigLoaded(SearchConfig),

    SearchConfigSaved(SearchConfig),

    PreviewLoaded(SearchPreviewResponse),

    PreviewFailed(String),

    PromptsLoaded(PromptTemplates),

    /// CSV written to disk
    CsvSaved(PathBuf),

    /// Show a notification to the user
    ShowNotification {
        level: NotificationLevel,
        title: String,
        message: String,
    },

    /// Quit the application
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}
