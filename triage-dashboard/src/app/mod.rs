//! Application state and module organization
//!
//! This module contains the main App struct and re-exports all functionality
//! organized by domain.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use triage_dashboard_sdk::{RunOutcome, StageStatus, TriageBackend};

use crate::client::BackendClient;
use crate::config::DashboardConfig;
use crate::runtime::{RunManager, RunUpdate};
use crate::search::SearchTuning;

mod models;
pub use models::*;

pub mod commands;
pub mod notifications;
pub mod task_registry;

pub use commands::{AppCommand, NotificationLevel};
pub use notifications::{Notification, NotificationManager};
pub use task_registry::{FetchKind, TaskRegistry};

// Declare submodules
mod command_handlers;
mod navigation;
mod workflow_ops;

impl App {
    /// App talking HTTP to the configured backend
    pub fn new(config: DashboardConfig) -> Result<Self> {
        let client = BackendClient::from_config(&config).context("Failed to build HTTP client")?;
        Self::with_backend(config, Arc::new(client))
    }

    pub fn with_backend(config: DashboardConfig, backend: Arc<dyn TriageBackend>) -> Result<Self> {
        // Create tokio runtime for async operations
        let tokio_runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

        let runs = RunManager::new(backend.clone(), tokio_runtime.handle().clone())
            .with_stream_idle_timeout(config.stream_idle_timeout());
        let run = runs.snapshot();
        let run_updates = runs.subscribe();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let mut app = Self {
            config,
            current_view: View::Workflow,
            should_quit: false,
            input_mode: InputMode::Normal,
            ticket_input: String::new(),
            runs,
            run,
            run_updates,
            selected_stage: 0,
            stage_scroll: 0,
            show_cancel_confirmation: false,
            show_artifact: false,
            search: SearchTuning::new(),
            search_field: 0,
            search_focus: SearchFocus::Fields,
            prompts: None,
            prompts_scroll: 0,
            notifications: NotificationManager::new(),
            backend,
            tasks: TaskRegistry::new(),
            command_tx,
            command_rx,
            tokio_runtime,
        };

        // Stage order and search config come from the backend
        app.request_ui_config();
        app.load_search_config();

        Ok(app)
    }

    /// Apply everything that arrived since the last frame
    pub fn tick(&mut self) {
        while let Ok(cmd) = self.command_rx.try_recv() {
            self.handle_command(cmd);
        }

        loop {
            match self.run_updates.try_recv() {
                Ok(update) => self.handle_run_update(update),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "UI lagged behind run updates");
                }
                Err(_) => break,
            }
        }

        self.run = self.runs.snapshot();
        if self.selected_stage >= self.run.stages.len() {
            self.selected_stage = self.run.stages.len().saturating_sub(1);
        }
        self.notifications.cleanup_expired();
    }

    fn handle_run_update(&mut self, update: RunUpdate) {
        match update {
            RunUpdate::StageChanged {
                stage,
                status: StageStatus::Error,
                ..
            } => {
                self.notifications
                    .error("Stage failed", format!("{} reported an error", stage.display_name()));
            }
            RunUpdate::Started { .. } | RunUpdate::StageChanged { .. } => {}
            RunUpdate::Finished { outcome, .. } => match outcome {
                Some(RunOutcome::Completed { output_available }) => {
                    let detail = if output_available {
                        "Loading final output..."
                    } else {
                        "No final output was produced"
                    };
                    self.notifications.success("Workflow complete", detail);
                }
                Some(RunOutcome::Failed { message }) => {
                    self.notifications.error("Workflow failed", message);
                }
                Some(RunOutcome::Cancelled) => {
                    self.notifications.warning("Workflow cancelled", "The event stream was closed");
                }
                None => {
                    self.notifications.warning(
                        "Stream ended early",
                        "The backend closed the stream before the workflow completed",
                    );
                }
            },
            RunUpdate::ArtifactLoaded { .. } => {
                self.notifications
                    .info("Final output ready", "Press [O] to view it or [X] to export it");
            }
            RunUpdate::ArtifactFailed { message, .. } => {
                self.notifications.error("Failed to load final output", message);
            }
        }
    }

    /// Stop background work before the runtime goes away
    pub fn shutdown(&mut self) {
        self.runs.cancel();
        self.tasks.cancel_everything();
    }
}
