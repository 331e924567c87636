//! Tests for the TUI state machine driven by key events
//!
//! App owns its own tokio runtime, so these are plain #[test]s that tick the
//! app until the background work lands.

use super::common::*;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::backend::TestBackend;
use ratatui::Terminal;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use triage_dashboard::app::{App, FetchKind, InputMode, View};
use triage_dashboard::config::DashboardConfig;
use triage_dashboard::ui::ui;
use triage_dashboard_sdk::*;

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn type_text(app: &mut App, text: &str) {
    for c in text.chars() {
        app.handle_key(key(KeyCode::Char(c)));
    }
}

fn tick_until(app: &mut App, done: impl Fn(&App) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        app.tick();
        if done(app) {
            return;
        }
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// Wait for the fetches issued at startup
fn settled(backend: impl TriageBackend + 'static) -> App {
    let mut app = App::with_backend(DashboardConfig::default(), Arc::new(backend)).unwrap();
    tick_until(&mut app, |app| {
        !app.tasks.is_running(FetchKind::UiConfig) && !app.tasks.is_running(FetchKind::SearchConfig)
    });
    app.tick();
    app
}

/// Draw one frame and return the screen text
fn screen(app: &App) -> String {
    let mut terminal = Terminal::new(TestBackend::new(140, 50)).unwrap();
    terminal.draw(|f| ui(f, app)).unwrap();
    terminal
        .backend()
        .buffer()
        .content
        .iter()
        .map(|cell| cell.symbol())
        .collect()
}

fn has_notification(app: &App, title: &str) -> bool {
    app.notifications
        .get_active()
        .iter()
        .any(|n| n.title == title)
}

// ============================================================================
// Workflow view
// ============================================================================

#[test]
fn test_typed_ticket_runs_to_completion() {
    let mut app = settled(ScriptedBackend::from_events(&classification_scenario()));

    app.handle_key(key(KeyCode::Char('e')));
    assert_eq!(app.input_mode, InputMode::EditingTicket);
    type_text(&mut app, "Payments timing out");
    app.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::ALT));

    assert_eq!(app.input_mode, InputMode::Normal);
    tick_until(&mut app, |app| app.run.is_terminal() && app.run.final_artifact.is_some());

    assert_eq!(app.run.ticket.as_ref().unwrap().title, "Payments timing out");
    assert_eq!(
        app.run.stage(&StageKey::Classification).unwrap().status,
        StageStatus::Complete
    );
    assert!(has_notification(&app, "Workflow complete"));
    app.shutdown();
}

#[test]
fn test_empty_ticket_is_not_submitted() {
    let mut app = settled(ScriptedBackend::from_events(&classification_scenario()));

    app.handle_key(key(KeyCode::Enter));
    app.tick();

    assert!(app.run.started_at.is_none());
    assert!(has_notification(&app, "Nothing to submit"));
    app.shutdown();
}

#[test]
fn test_sample_fills_ticket_input() {
    let mut app = settled(ScriptedBackend::from_events(&classification_scenario()));

    app.handle_key(key(KeyCode::Char('s')));
    tick_until(&mut app, |app| !app.ticket_input.is_empty());

    assert!(app.ticket_input.starts_with("Sample ticket"));
    assert!(app.ticket_input.contains("Priority: High"));
    app.shutdown();
}

#[test]
fn test_sample_failure_is_a_notification() {
    let mut app = settled(UnreachableBackend);
    assert!(has_notification(&app, "Backend config unavailable"));

    app.handle_key(key(KeyCode::Char('s')));
    tick_until(&mut app, |app| has_notification(app, "Failed to load sample"));

    assert!(app.ticket_input.is_empty());
    assert!(!app.should_quit);
    app.shutdown();
}

#[test]
fn test_cancel_requires_confirmation() {
    let backend = ScriptedBackend::from_events(&[StreamEvent::processing(
        StageKey::Classification,
        "Starting...",
    )])
    .stalling();
    let mut app = settled(backend);
    app.ticket_input = "Stalled ticket".to_string();

    app.handle_key(key(KeyCode::Enter));
    tick_until(&mut app, |app| {
        app.run
            .stage(&StageKey::Classification)
            .map_or(false, |s| s.status == StageStatus::Processing)
    });

    app.handle_key(key(KeyCode::Char('c')));
    assert!(app.show_cancel_confirmation);
    app.handle_key(key(KeyCode::Char('n')));
    assert!(!app.show_cancel_confirmation);
    assert!(app.run.in_progress);

    app.handle_key(key(KeyCode::Char('c')));
    app.handle_key(key(KeyCode::Char('y')));
    tick_until(&mut app, |app| app.run.outcome == Some(RunOutcome::Cancelled));
    assert!(has_notification(&app, "Workflow cancelled"));
    app.shutdown();
}

#[test]
fn test_output_pane_shows_resolution_plan() {
    let mut backend = ScriptedBackend::from_events(&classification_scenario());
    backend.output = Some(json!({
        "ticket_id": "JIRA-MM-2187",
        "resolution_plan": {
            "summary": "Raise the pool size",
            "resolution_steps": [{
                "step_number": 1,
                "description": "Restart MM_ALDER",
                "risk_level": "low"
            }]
        }
    }));
    let mut app = settled(backend);

    app.handle_key(key(KeyCode::Char('o')));
    assert!(!app.show_artifact);
    assert!(has_notification(&app, "No final output yet"));

    app.ticket_input = "Payments timing out".to_string();
    app.handle_key(key(KeyCode::Enter));
    tick_until(&mut app, |app| app.run.final_artifact.is_some());

    app.handle_key(key(KeyCode::Char('o')));
    assert!(app.show_artifact);
    let text = screen(&app);
    assert!(text.contains("Final Resolution Output: JIRA-MM-2187"));
    assert!(text.contains("Raise the pool size"));
    assert!(text.contains("Restart MM_ALDER"));

    app.handle_key(key(KeyCode::Char('o')));
    assert!(!app.show_artifact);
    assert!(!screen(&app).contains("Raise the pool size"));
    app.shutdown();
}

#[test]
fn test_output_pane_falls_back_to_json() {
    let mut app = settled(ScriptedBackend::from_events(&classification_scenario()));
    app.ticket_input = "Payments timing out".to_string();
    app.handle_key(key(KeyCode::Enter));
    tick_until(&mut app, |app| app.run.final_artifact.is_some());

    app.handle_key(key(KeyCode::Char('o')));
    assert!(screen(&app).contains("\"resolution\": \"Increase pool size\""));
    app.shutdown();
}

// ============================================================================
// Search and prompts views
// ============================================================================

#[test]
fn test_saved_search_config_clears_dirty_flag() {
    let mut app = settled(ScriptedBackend::from_events(&classification_scenario()));

    app.handle_key(key(KeyCode::Char('2')));
    app.handle_key(key(KeyCode::Right));
    assert!(app.search.dirty);

    app.handle_key(key(KeyCode::Char('w')));
    tick_until(&mut app, |app| has_notification(app, "Search config saved"));
    assert!(!app.search.dirty);
    assert_eq!(app.search.config.top_k, 21);
    app.shutdown();
}

#[test]
fn test_search_fields_adjust_config() {
    let mut app = settled(ScriptedBackend::from_events(&classification_scenario()));

    app.handle_key(key(KeyCode::Char('2')));
    assert_eq!(app.current_view, View::Search);

    // Top K
    app.handle_key(key(KeyCode::Right));
    assert_eq!(app.search.config.top_k, 21);
    assert!(app.search.dirty);

    // Vector weight
    app.handle_key(key(KeyCode::Down));
    app.handle_key(key(KeyCode::Left));
    assert_eq!(app.search.config.vector_weight, 0.65);
    assert_eq!(app.search.config.metadata_weight, 0.35);

    app.handle_key(key(KeyCode::Char('r')));
    assert_eq!(app.search.config, SearchConfig::default());
    app.shutdown();
}

#[test]
fn test_preview_failure_sets_error() {
    let mut app = settled(ScriptedBackend::from_events(&classification_scenario()));

    app.handle_key(key(KeyCode::Char('2')));
    app.handle_key(key(KeyCode::Char('/')));
    type_text(&mut app, "Claims stuck");
    app.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::ALT));

    tick_until(&mut app, |app| app.search.last_error.is_some());
    assert!(has_notification(&app, "Preview search failed"));
    app.shutdown();
}

#[test]
fn test_prompts_view_loads_on_first_visit() {
    let mut app = settled(ScriptedBackend::from_events(&classification_scenario()));
    assert!(app.prompts.is_none());

    app.handle_key(key(KeyCode::Char('3')));
    tick_until(&mut app, |app| app.prompts.is_some());
    assert_eq!(app.current_view, View::Prompts);
    app.shutdown();
}
