//! Workflow, search and prompt operations triggered from the UI

use std::future::Future;
use std::sync::Arc;
use triage_dashboard_sdk::{DashboardError, DashboardResult, Ticket, TriageBackend};

use super::*;
use crate::export;

/// Turn a failed fetch into an error notification
fn or_notify(title: &str, result: DashboardResult<AppCommand>) -> AppCommand {
    result.unwrap_or_else(|err| AppCommand::ShowNotification {
        level: NotificationLevel::Error,
        title: title.to_string(),
        message: err.to_string(),
    })
}

impl App {
    /// Run `make` on the tokio runtime and deliver its command to the UI
    fn spawn_fetch<F, Fut>(&self, kind: FetchKind, make: F)
    where
        F: FnOnce(Arc<dyn TriageBackend>) -> Fut,
        Fut: Future<Output = AppCommand> + Send + 'static,
    {
        let tx = self.command_tx.clone();
        let fetch = make(self.backend.clone());
        let handle = self.tokio_runtime.spawn(async move {
            let _ = tx.send(fetch.await);
        });
        self.tasks.register(kind, handle);
    }

    // ------------------------------------------------------------------
    // Workflow
    // ------------------------------------------------------------------

    pub fn submit_ticket(&mut self) {
        if self.runs.is_running() {
            self.notifications
                .warning("Run in progress", "Wait for the current run or cancel it first");
            return;
        }

        let ticket = match Ticket::from_free_text(&self.ticket_input) {
            Some(ticket) => ticket,
            None => {
                self.notifications
                    .warning("Nothing to submit", "Enter a ticket description first");
                return;
            }
        };

        match self.runs.start(ticket) {
            Ok(run_id) => {
                tracing::info!(%run_id, "ticket submitted from TUI");
                self.selected_stage = 0;
                self.stage_scroll = 0;
                self.show_artifact = false;
                self.input_mode = InputMode::Normal;
                self.run = self.runs.snapshot();
            }
            Err(DashboardError::RunInProgress) => {
                self.notifications
                    .warning("Run in progress", "Wait for the current run or cancel it first");
            }
            Err(err) => {
                self.notifications.error("Failed to start run", err.to_string());
            }
        }
    }

    pub fn request_cancel(&mut self) {
        if self.runs.is_running() {
            self.show_cancel_confirmation = true;
        }
    }

    pub fn cancel_confirmed(&mut self) {
        self.show_cancel_confirmation = false;
        self.runs.cancel();
    }

    pub fn load_sample(&mut self) {
        self.spawn_fetch(FetchKind::Sample, |backend| async move {
            or_notify(
                "Failed to load sample",
                backend.load_sample().await.map(AppCommand::SampleLoaded),
            )
        });
    }

    pub fn request_ui_config(&mut self) {
        self.spawn_fetch(FetchKind::UiConfig, |backend| async move {
            match backend.fetch_ui_config().await {
                Ok(config) => AppCommand::UiConfigLoaded(config),
                Err(err) => AppCommand::ShowNotification {
                    level: NotificationLevel::Warning,
                    title: "Backend config unavailable".to_string(),
                    message: format!("Using the full stage list ({})", err),
                },
            }
        });
    }

    pub fn export_artifact(&mut self) {
        let dir = self.config.export_dir();
        match export::export_artifact(&self.run, &dir) {
            Ok(path) => {
                self.notifications.success("Exported", path.display().to_string());
            }
            Err(err) => {
                self.notifications.error("Export failed", format!("{:#}", err));
            }
        }
    }

    /// Show or hide the final output pane
    pub fn toggle_artifact(&mut self) {
        if self.show_artifact {
            self.show_artifact = false;
        } else if self.run.final_artifact.is_some() {
            self.show_artifact = true;
            self.stage_scroll = 0;
        } else {
            self.notifications
                .info("No final output yet", "It appears once a run completes");
        }
    }

    pub fn download_csv(&mut self) {
        let path = self.config.export_dir().join("tickets.csv");
        self.spawn_fetch(FetchKind::Csv, move |backend| async move {
            let bytes = match backend.download_csv().await {
                Ok(bytes) => bytes,
                Err(err) => return or_notify("CSV download failed", Err(err)),
            };
            match export::write_csv(&bytes, &path) {
                Ok(()) => AppCommand::CsvSaved(path),
                Err(err) => AppCommand::ShowNotification {
                    level: NotificationLevel::Error,
                    title: "CSV download failed".to_string(),
                    message: format!("{:#}", err),
                },
            }
        });
    }

    // ------------------------------------------------------------------
    // Search tuning
    // ------------------------------------------------------------------

    pub fn load_search_config(&mut self) {
        self.spawn_fetch(FetchKind::SearchConfig, |backend| async move {
            or_notify(
                "Failed to load search config",
                backend
                    .load_search_config()
                    .await
                    .map(AppCommand::SearchConfigLoaded),
            )
        });
    }

    pub fn save_search_config(&mut self) {
        let config = self.search.config.clone();
        self.spawn_fetch(FetchKind::SaveSearchConfig, move |backend| async move {
            or_notify(
                "Failed to save search config",
                backend
                    .save_search_config(&config)
                    .await
                    .map(|_| AppCommand::SearchConfigSaved(config)),
            )
        });
    }

    pub fn reset_search_config(&mut self) {
        self.search.reset_to_defaults();
        self.notifications
            .info("Defaults restored", "Press [W] to save them to the backend");
    }

    pub fn run_preview(&mut self) {
        let request = match self.search.preview_request() {
            Some(request) => request,
            None => {
                self.notifications
                    .warning("Empty query", "Press [/] and describe a ticket to search for");
                return;
            }
        };

        self.spawn_fetch(FetchKind::Preview, move |backend| async move {
            match backend.preview_search(&request).await {
                Ok(response) => AppCommand::PreviewLoaded(response),
                Err(err) => AppCommand::PreviewFailed(err.to_string()),
            }
        });
    }

    pub fn export_preview(&mut self) {
        if self.search.results.is_empty() {
            self.notifications
                .warning("Nothing to export", "Run a preview search first");
            return;
        }
        let dir = self.config.export_dir();
        match export::export_preview(
            &self.search.query,
            &self.search.config,
            self.search.metadata.as_ref(),
            &self.search.results,
            &dir,
        ) {
            Ok(path) => {
                self.notifications.success("Exported", path.display().to_string());
            }
            Err(err) => {
                self.notifications.error("Export failed", format!("{:#}", err));
            }
        }
    }

    // ------------------------------------------------------------------
    // Prompts
    // ------------------------------------------------------------------

    pub fn load_prompts(&mut self) {
        self.spawn_fetch(FetchKind::Prompts, |backend| async move {
            or_notify(
                "Failed to load prompts",
                backend.fetch_prompts().await.map(AppCommand::PromptsLoaded),
            )
        });
    }
}
