//! Keyboard handling

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::*;

impl App {
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        // Cancel confirmation dialog
        if self.show_cancel_confirmation {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => self.cancel_confirmed(),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    self.show_cancel_confirmation = false;
                }
                _ => {}
            }
            return;
        }

        match self.input_mode {
            InputMode::EditingTicket => self.edit_buffer_key(key, true),
            InputMode::EditingQuery => self.edit_buffer_key(key, false),
            InputMode::Normal => self.normal_key(key),
        }
    }

    fn edit_buffer_key(&mut self, key: KeyEvent, ticket: bool) {
        let buffer = if ticket {
            &mut self.ticket_input
        } else {
            &mut self.search.query
        };

        match key.code {
            KeyCode::Esc => self.input_mode = InputMode::Normal,
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => {
                self.input_mode = InputMode::Normal;
                if ticket {
                    self.submit_ticket();
                } else {
                    self.run_preview();
                }
            }
            KeyCode::Enter => buffer.push('\n'),
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Char(c) => buffer.push(c),
            _ => {}
        }
    }

    fn normal_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
                return;
            }
            KeyCode::Tab => {
                self.current_view = self.current_view.next();
                if self.current_view == View::Prompts && self.prompts.is_none() {
                    self.load_prompts();
                }
                return;
            }
            KeyCode::Char('1') => {
                self.current_view = View::Workflow;
                return;
            }
            KeyCode::Char('2') => {
                self.current_view = View::Search;
                return;
            }
            KeyCode::Char('3') => {
                self.current_view = View::Prompts;
                if self.prompts.is_none() {
                    self.load_prompts();
                }
                return;
            }
            KeyCode::Esc => {
                self.notifications.dismiss_latest();
                return;
            }
            _ => {}
        }

        match self.current_view {
            View::Workflow => self.workflow_key(key),
            View::Search => self.search_key(key),
            View::Prompts => self.prompts_key(key),
        }
    }

    fn workflow_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('e') | KeyCode::Char('i') => {
                if self.runs.is_running() {
                    self.notifications
                        .warning("Run in progress", "The ticket cannot be edited while it runs");
                } else {
                    self.input_mode = InputMode::EditingTicket;
                }
            }
            KeyCode::Enter => self.submit_ticket(),
            KeyCode::Char('s') => self.load_sample(),
            KeyCode::Char('c') => self.request_cancel(),
            KeyCode::Char('x') | KeyCode::Char('X') => self.export_artifact(),
            KeyCode::Char('o') | KeyCode::Char('O') => self.toggle_artifact(),
            KeyCode::Char('d') => self.download_csv(),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected_stage + 1 < self.run.stages.len() {
                    self.selected_stage += 1;
                    self.stage_scroll = 0;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                if self.selected_stage > 0 {
                    self.selected_stage -= 1;
                    self.stage_scroll = 0;
                }
            }
            KeyCode::PageDown | KeyCode::Char('l') => {
                self.stage_scroll = self.stage_scroll.saturating_add(5);
            }
            KeyCode::PageUp | KeyCode::Char('h') => {
                self.stage_scroll = self.stage_scroll.saturating_sub(5);
            }
            _ => {}
        }
    }

    fn search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('/') => {
                self.input_mode = InputMode::EditingQuery;
                return;
            }
            KeyCode::Char('f') => {
                self.search_focus = match self.search_focus {
                    SearchFocus::Fields => SearchFocus::Results,
                    SearchFocus::Results => SearchFocus::Fields,
                };
                return;
            }
            KeyCode::Char('p') => {
                self.run_preview();
                return;
            }
            KeyCode::Char('L') => {
                self.load_search_config();
                return;
            }
            KeyCode::Char('w') | KeyCode::Char('W') => {
                self.save_search_config();
                return;
            }
            KeyCode::Char('r') => {
                self.reset_search_config();
                return;
            }
            KeyCode::Char('x') | KeyCode::Char('X') => {
                self.export_preview();
                return;
            }
            _ => {}
        }

        match self.search_focus {
            SearchFocus::Fields => self.search_field_key(key),
            SearchFocus::Results => match key.code {
                KeyCode::Down | KeyCode::Char('j') => self.search.select_next(),
                KeyCode::Up | KeyCode::Char('k') => self.search.select_previous(),
                KeyCode::Enter | KeyCode::Char(' ') => {
                    if let Some(id) = self.search.selected().map(|t| t.ticket_id.clone()) {
                        self.search.toggle_expanded(&id);
                    }
                }
                _ => {}
            },
        }
    }

    fn search_field_key(&mut self, key: KeyEvent) {
        let steps = match key.code {
            KeyCode::Down | KeyCode::Char('j') => {
                self.search_field = (self.search_field + 1).min(SearchField::ALL.len() - 1);
                return;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.search_field = self.search_field.saturating_sub(1);
                return;
            }
            KeyCode::Right | KeyCode::Char('l') => 1,
            KeyCode::Left | KeyCode::Char('h') => -1,
            _ => return,
        };

        match SearchField::ALL[self.search_field] {
            SearchField::TopK => self.search.adjust_top_k(steps as i64),
            SearchField::VectorWeight => self.search.adjust_vector_weight(steps),
            SearchField::PriorityWeight(priority) => {
                self.search.adjust_priority_weight(priority, steps)
            }
            SearchField::TimeNormalization => self.search.adjust_time_normalization(steps),
            SearchField::Domain => self.search.cycle_domain(steps > 0),
        }
    }

    fn prompts_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('r') => self.load_prompts(),
            KeyCode::Down | KeyCode::Char('j') => {
                self.prompts_scroll = self.prompts_scroll.saturating_add(1);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.prompts_scroll = self.prompts_scroll.saturating_sub(1);
            }
            KeyCode::PageDown => self.prompts_scroll = self.prompts_scroll.saturating_add(10),
            KeyCode::PageUp => self.prompts_scroll = self.prompts_scroll.saturating_sub(10),
            _ => {}
        }
    }
}
