//! Data models for the application

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use triage_dashboard_sdk::{Priority, PromptTemplates, TriageBackend, WorkflowRun};

use super::commands::AppCommand;
use super::notifications::NotificationManager;
use super::task_registry::TaskRegistry;
use crate::config::DashboardConfig;
use crate::runtime::{RunManager, RunUpdate};
use crate::search::SearchTuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Workflow,
    Search,
    Prompts,
}

impl View {
    pub const ALL: [View; 3] = [View::Workflow, View::Search, View::Prompts];

    pub fn title(self) -> &'static str {
        match self {
            View::Workflow => "Pattern Recognition",
            View::Search => "Retrieval Tuning",
            View::Prompts => "Prompts",
        }
    }

    pub fn next(self) -> Self {
        match self {
            View::Workflow => View::Search,
            View::Search => View::Prompts,
            View::Prompts => View::Workflow,
        }
    }
}

/// Which text buffer receives typed characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    EditingTicket,
    EditingQuery,
}

/// Editable rows of the search-tuning panel, top to bottom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    TopK,
    VectorWeight,
    PriorityWeight(Priority),
    TimeNormalization,
    Domain,
}

impl SearchField {
    pub const ALL: [SearchField; 8] = [
        SearchField::TopK,
        SearchField::VectorWeight,
        SearchField::PriorityWeight(Priority::Critical),
        SearchField::PriorityWeight(Priority::High),
        SearchField::PriorityWeight(Priority::Medium),
        SearchField::PriorityWeight(Priority::Low),
        SearchField::TimeNormalization,
        SearchField::Domain,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFocus {
    Fields,
    Results,
}

/// Main application state
pub struct App {
    pub config: DashboardConfig,
    pub current_view: View,
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Ticket submission
    pub ticket_input: String,

    // Run state, refreshed from the manager every tick
    pub runs: RunManager,
    pub run: WorkflowRun,
    pub run_updates: broadcast::Receiver<RunUpdate>,
    pub selected_stage: usize,
    pub stage_scroll: u16,
    pub show_cancel_confirmation: bool,
    /// The output pane replaces the stage card
    pub show_artifact: bool,

    // Search tuning
    pub search: SearchTuning,
    pub search_field: usize,
    pub search_focus: SearchFocus,

    // Prompt viewer
    pub prompts: Option<PromptTemplates>,
    pub prompts_scroll: u16,

    pub notifications: NotificationManager,

    // Background fetches report back through the command channel
    pub backend: Arc<dyn TriageBackend>,
    pub tasks: TaskRegistry,
    pub command_tx: mpsc::UnboundedSender<AppCommand>,
    pub command_rx: mpsc::UnboundedReceiver<AppCommand>,

    // Tokio runtime for async operations; dropped last
    pub tokio_runtime: tokio::runtime::Runtime,
}
