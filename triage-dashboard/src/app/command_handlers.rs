//! Command handler implementations for App

use super::{App, AppCommand};
use crate::format::ticket_as_text;

impl App {
    /// Process a single command
    pub fn handle_command(&mut self, cmd: AppCommand) {
        match cmd {
            AppCommand::UiConfigLoaded(config) => {
                self.runs.set_stage_order(config.stage_order());
                self.run = self.runs.snapshot();
            }

            AppCommand::SampleLoaded(ticket) => {
                self.ticket_input = ticket_as_text(&ticket);
                self.notifications
                    .info("Sample loaded", format!("Ticket {}", ticket.ticket_id));
            }

            AppCommand::SearchConfigLoaded(config) => {
                self.search.load_config(config);
            }

            AppCommand::SearchConfigSaved(config) => {
                self.search.mark_saved(&config);
                self.notifications
                    .success("Search config saved", "The backend will use the new weights");
            }

            AppCommand::PreviewLoaded(response) => {
                let found = response.similar_tickets.len();
                self.search.apply_preview(response);
                self.notifications
                    .info("Preview ready", format!("{} similar tickets", found));
            }

            AppCommand::PreviewFailed(message) => {
                self.search.preview_failed(message.clone());
                self.notifications.error("Preview search failed", message);
            }

            AppCommand::PromptsLoaded(prompts) => {
                self.prompts = Some(prompts);
                self.prompts_scroll = 0;
            }

            AppCommand::CsvSaved(path) => {
                self.notifications
                    .success("CSV downloaded", path.display().to_string());
            }

            AppCommand::ShowNotification {
                level,
                title,
                message,
            } => {
                self.notifications.push(level, title, message);
            }

            AppCommand::Quit => {
                self.should_quit = true;
            }
        }
    }
}
