//! Tests for the RunManager lifecycle
//!
//! Uses scripted backends so each scenario controls exactly what the
//! event stream delivers.

use super::common::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use triage_dashboard::runtime::{RunManager, RunUpdate};
use triage_dashboard_sdk::*;

fn manager(backend: Arc<dyn TriageBackend>) -> RunManager {
    RunManager::new(backend, Handle::current())
}

// ============================================================================
// Completed runs
// ============================================================================

#[tokio::test]
async fn test_scenario_run_fetches_final_output() {
    let backend = Arc::new(ScriptedBackend::from_events(&classification_scenario()));
    let runs = manager(backend.clone());

    runs.start(ticket("Payments timing out")).unwrap();
    runs.wait().await;

    let run = runs.snapshot();
    assert!(!run.in_progress);
    assert_eq!(
        run.outcome,
        Some(RunOutcome::Completed {
            output_available: true
        })
    );
    assert_eq!(
        run.stage(&StageKey::Classification).unwrap().status,
        StageStatus::Complete
    );
    assert_eq!(backend.output_requests(), 1);
    assert_eq!(run.final_artifact, Some(json!({"resolution": "Increase pool size"})));
    assert_eq!(backend.submitted.lock().unwrap()[0].title, "Payments timing out");
}

#[tokio::test]
async fn test_output_not_fetched_when_unavailable() {
    let backend = Arc::new(ScriptedBackend::from_events(&[
        StreamEvent::processing(StageKey::Classification, "Starting..."),
        StreamEvent::workflow_complete(false),
    ]));
    let runs = manager(backend.clone());

    runs.start(ticket("No output")).unwrap();
    runs.wait().await;

    assert_eq!(backend.output_requests(), 0);
    assert!(runs.snapshot().final_artifact.is_none());
}

#[tokio::test]
async fn test_output_failure_leaves_run_complete() {
    let backend =
        Arc::new(ScriptedBackend::from_events(&classification_scenario()).without_output());
    let runs = manager(backend.clone());
    let mut updates = runs.subscribe();

    let run_id = runs.start(ticket("Output fails")).unwrap();
    runs.wait().await;

    let run = runs.snapshot();
    assert!(matches!(run.outcome, Some(RunOutcome::Completed { .. })));
    assert!(run.final_artifact.is_none());

    let mut saw_failure = false;
    while let Ok(update) = updates.try_recv() {
        if let RunUpdate::ArtifactFailed { run_id: id, message } = update {
            assert_eq!(id, run_id);
            assert!(message.contains("500"));
            saw_failure = true;
        }
    }
    assert!(saw_failure);
}

#[tokio::test]
async fn test_updates_follow_stream_order() {
    let backend = Arc::new(ScriptedBackend::from_events(&full_run()));
    let runs = manager(backend);
    let mut updates = runs.subscribe();

    let run_id = runs.start(ticket("Ordering")).unwrap();
    runs.wait().await;

    let mut received = Vec::new();
    while let Ok(update) = updates.try_recv() {
        received.push(update);
    }

    assert_eq!(received.first(), Some(&RunUpdate::Started { run_id }));
    let completed: Vec<StageKey> = received
        .iter()
        .filter_map(|update| match update {
            RunUpdate::StageChanged {
                stage,
                status: StageStatus::Complete,
                ..
            } => Some(stage.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(completed, StageKey::pipeline());
    assert!(received.contains(&RunUpdate::ArtifactLoaded { run_id }));
}

#[tokio::test]
async fn test_transitions_within_one_chunk_keep_their_status() {
    // Every record of the scenario arrives in a single chunk
    let backend = Arc::new(ScriptedBackend::from_events(&classification_scenario()));
    let runs = manager(backend);
    let mut updates = runs.subscribe();

    runs.start(ticket("One chunk")).unwrap();
    runs.wait().await;

    let mut statuses = Vec::new();
    while let Ok(update) = updates.try_recv() {
        if let RunUpdate::StageChanged { stage, status, .. } = update {
            assert_eq!(stage, StageKey::Classification);
            statuses.push(status);
        }
    }
    assert_eq!(
        statuses,
        vec![
            StageStatus::Processing,
            StageStatus::Streaming,
            StageStatus::Complete
        ]
    );
}

// ============================================================================
// Partial and failed runs
// ============================================================================

#[tokio::test]
async fn test_stream_closed_without_terminal_record() {
    let backend = Arc::new(ScriptedBackend::from_events(&[
        StreamEvent::processing(StageKey::Classification, "Starting..."),
        StreamEvent::streaming(StageKey::Classification, "Half way"),
    ]));
    let runs = manager(backend.clone());

    runs.start(ticket("Cut short")).unwrap();
    runs.wait().await;

    let run = runs.snapshot();
    assert!(!run.in_progress);
    assert_eq!(run.outcome, None);
    assert_eq!(
        run.stage(&StageKey::Classification).unwrap().status,
        StageStatus::Streaming
    );
    assert_eq!(backend.output_requests(), 0);
}

#[tokio::test]
async fn test_transport_failure_fails_run_and_first_stage() {
    let runs = manager(Arc::new(UnreachableBackend));

    runs.start(ticket("Offline")).unwrap();
    runs.wait().await;

    let run = runs.snapshot();
    assert!(matches!(run.outcome, Some(RunOutcome::Failed { .. })));
    assert!(run.run_error.as_deref().unwrap().contains("connection refused"));

    let first = run.stage(&StageKey::Classification).unwrap();
    assert_eq!(first.status, StageStatus::Error);
    assert!(first.error_detail.is_some());
}

#[tokio::test]
async fn test_read_failure_mid_stream_keeps_applied_stages() {
    let backend = Arc::new(
        ScriptedBackend::from_events(&[
            StreamEvent::processing(StageKey::Classification, "Starting..."),
            StreamEvent::complete(StageKey::Classification, json!({"classified_domain": "MM"})),
            StreamEvent::streaming(StageKey::HistoricalMatch, "Searching"),
        ])
        .failing_after("connection reset"),
    );
    let runs = manager(backend.clone());

    runs.start(ticket("Reset mid run")).unwrap();
    runs.wait().await;

    let run = runs.snapshot();
    assert!(!run.in_progress);
    match &run.outcome {
        Some(RunOutcome::Failed { message }) => assert!(message.contains("connection reset")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(run.run_error.as_deref().unwrap().contains("connection reset"));

    let first = run.stage(&StageKey::Classification).unwrap();
    assert_eq!(first.status, StageStatus::Error);
    assert!(first.error_detail.as_deref().unwrap().contains("connection reset"));
    assert!(first.final_output.is_some());

    let matching = run.stage(&StageKey::HistoricalMatch).unwrap();
    assert_eq!(matching.status, StageStatus::Streaming);
    assert_eq!(matching.accumulated_text, "Searching");
    assert_eq!(backend.output_requests(), 0);
}

#[tokio::test]
async fn test_idle_timeout_fails_stalled_stream() {
    let backend = Arc::new(
        ScriptedBackend::from_events(&[StreamEvent::processing(
            StageKey::Classification,
            "Starting...",
        )])
        .stalling(),
    );
    let runs = manager(backend).with_stream_idle_timeout(Some(Duration::from_millis(50)));

    runs.start(ticket("Stalls")).unwrap();
    tokio::time::timeout(Duration::from_secs(5), runs.wait())
        .await
        .expect("idle timeout should end the run");

    let run = runs.snapshot();
    match run.outcome {
        Some(RunOutcome::Failed { message }) => assert!(message.contains("stalled")),
        other => panic!("unexpected outcome: {:?}", other),
    }
}

// ============================================================================
// Single flight and cancellation
// ============================================================================

#[tokio::test]
async fn test_second_start_while_running_is_rejected() {
    let backend = Arc::new(
        ScriptedBackend::from_events(&[StreamEvent::processing(
            StageKey::Classification,
            "Starting...",
        )])
        .stalling(),
    );
    let runs = manager(backend);

    let first = runs.start(ticket("First")).unwrap();
    let second = runs.start(ticket("Second"));

    assert!(matches!(second, Err(DashboardError::RunInProgress)));
    assert_eq!(runs.snapshot().id, first);
    assert_eq!(runs.snapshot().ticket.unwrap().title, "First");

    runs.cancel();
    runs.wait().await;
}

#[tokio::test]
async fn test_cancel_ends_stream_task() {
    let backend = Arc::new(
        ScriptedBackend::from_events(&[
            StreamEvent::processing(StageKey::Classification, "Starting..."),
            StreamEvent::streaming(StageKey::Classification, "Still going"),
        ])
        .stalling(),
    );
    let runs = manager(backend.clone());

    runs.start(ticket("Cancel me")).unwrap();
    // Let the task consume the scripted chunks
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(runs.is_running());

    runs.cancel();
    tokio::time::timeout(Duration::from_secs(5), runs.wait())
        .await
        .expect("cancelled task should finish");

    let run = runs.snapshot();
    assert!(!run.in_progress);
    assert_eq!(run.outcome, Some(RunOutcome::Cancelled));
    assert_eq!(
        run.stage(&StageKey::Classification).unwrap().status,
        StageStatus::Streaming
    );
    assert_eq!(backend.output_requests(), 0);
}

#[tokio::test]
async fn test_wait_after_abandoned_wait_sees_cancellation() {
    let backend = Arc::new(
        ScriptedBackend::from_events(&[StreamEvent::processing(
            StageKey::Classification,
            "Starting...",
        )])
        .stalling(),
    );
    let runs = manager(backend);
    runs.start(ticket("Interrupted")).unwrap();

    // Same shape as the submit command's Ctrl-C handling
    tokio::select! {
        _ = runs.wait() => panic!("stalled run finished on its own"),
        _ = tokio::time::sleep(Duration::from_millis(50)) => {
            runs.cancel();
            tokio::time::timeout(Duration::from_secs(5), runs.wait())
                .await
                .expect("cancelled task should finish");
        }
    }

    let run = runs.snapshot();
    assert!(!run.in_progress);
    assert_eq!(run.outcome, Some(RunOutcome::Cancelled));
}

#[tokio::test]
async fn test_new_run_allowed_after_completion() {
    let backend = Arc::new(ScriptedBackend::from_events(&classification_scenario()));
    let runs = manager(backend.clone());

    let first = runs.start(ticket("First")).unwrap();
    runs.wait().await;
    let second = runs.start(ticket("Second")).unwrap();
    runs.wait().await;

    assert_ne!(first, second);
    let run = runs.snapshot();
    assert_eq!(run.id, second);
    assert_eq!(run.ticket.unwrap().title, "Second");
    assert_eq!(backend.output_requests(), 2);
}

// ============================================================================
// Stage order
// ============================================================================

#[tokio::test]
async fn test_skip_classification_removes_stage_from_order() {
    let mut backend = ScriptedBackend::from_events(&classification_scenario());
    backend.ui_config = UiConfig {
        skip_domain_classification: true,
    };
    let runs = manager(Arc::new(backend));

    runs.configure_from_backend().await.unwrap();

    assert!(!runs.stage_order().contains(&StageKey::Classification));
    assert!(!runs.snapshot().stages.contains(&StageKey::Classification));
}
