//! Tests for folding SSE bodies into stage state
//!
//! Drives StreamReducer with whole bodies and arbitrary chunkings.

use super::common::*;
use proptest::prelude::*;
use serde_json::json;
use triage_dashboard::reducer::{Applied, StreamReducer, FINAL_OUTPUT_DIVIDER};
use triage_dashboard_sdk::*;

fn fresh_run() -> WorkflowRun {
    WorkflowRun::start(&StageKey::pipeline(), ticket("Payments timing out"))
}

fn fold_chunks(chunks: &[&[u8]]) -> WorkflowRun {
    let mut run = fresh_run();
    let mut reducer = StreamReducer::new();
    for chunk in chunks {
        reducer.feed(&mut run, chunk);
    }
    reducer.close(&mut run);
    run
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_classification_scenario_completes_run() {
    let body = records(&classification_scenario());
    let run = fold_chunks(&[&body[..]]);

    let stage = run.stage(&StageKey::Classification).unwrap();
    assert_eq!(stage.status, StageStatus::Complete);
    assert_eq!(stage.progress, 100);
    assert!(stage.accumulated_text.is_empty());

    let output = stage.final_output.as_deref().unwrap();
    assert!(output.starts_with("Starting domain classification...\nLooking at MM_ALDER"));
    assert!(output.contains(FINAL_OUTPUT_DIVIDER));
    assert!(output.contains("\"classified_domain\": \"MM\""));
    assert!(output.contains("0.9"));

    assert!(!run.in_progress);
    assert_eq!(
        run.outcome,
        Some(RunOutcome::Completed {
            output_available: true
        })
    );
}

#[test]
fn test_close_without_terminal_keeps_partial_state() {
    let events = vec![
        StreamEvent::processing(StageKey::Classification, "Starting..."),
        StreamEvent::complete(StageKey::Classification, json!({"classified_domain": "CIW"})),
        StreamEvent::processing(StageKey::HistoricalMatch, "Searching..."),
        StreamEvent::streaming(StageKey::HistoricalMatch, "Found 12 candidates").with_progress(40.0),
    ];
    let run = fold_chunks(&[&records(&events)[..]]);

    assert!(!run.in_progress);
    assert_eq!(run.outcome, None);
    assert!(run.finished_at.is_some());

    let matched = run.stage(&StageKey::HistoricalMatch).unwrap();
    assert_eq!(matched.status, StageStatus::Streaming);
    assert_eq!(matched.progress, 40);
    assert_eq!(matched.accumulated_text, "Searching...\nFound 12 candidates");
    assert_eq!(
        run.stage(&StageKey::LabelAssignment).unwrap().status,
        StageStatus::Idle
    );
}

#[test]
fn test_stage_error_does_not_end_run() {
    let events = vec![
        StreamEvent::processing(StageKey::LabelAssignment, "Assigning labels..."),
        StreamEvent::stage_error(StageKey::LabelAssignment, "Label model unavailable"),
        StreamEvent::processing(StageKey::NoveltyDetection, "Checking novelty..."),
    ];
    let mut run = fresh_run();
    let mut reducer = StreamReducer::new();
    reducer.feed(&mut run, &records(&events));

    assert!(run.in_progress);
    assert!(!reducer.is_terminal());

    let labels = run.stage(&StageKey::LabelAssignment).unwrap();
    assert_eq!(labels.status, StageStatus::Error);
    assert_eq!(labels.error_detail.as_deref(), Some("Label model unavailable"));

    let errored: Vec<_> = run
        .stages
        .iter()
        .filter(|entry| entry.state.status == StageStatus::Error)
        .collect();
    assert_eq!(errored.len(), 1);
    assert_eq!(
        run.stage(&StageKey::NoveltyDetection).unwrap().status,
        StageStatus::Processing
    );
}

#[test]
fn test_run_error_is_terminal() {
    let events = vec![
        StreamEvent::processing(StageKey::Classification, "Starting..."),
        StreamEvent::run_error("Backend overloaded"),
        StreamEvent::processing(StageKey::HistoricalMatch, "Never applied"),
    ];
    let run = fold_chunks(&[&records(&events)[..]]);

    assert_eq!(run.run_error.as_deref(), Some("Backend overloaded"));
    assert_eq!(
        run.outcome,
        Some(RunOutcome::Failed {
            message: "Backend overloaded".to_string()
        })
    );
    assert_eq!(
        run.stage(&StageKey::HistoricalMatch).unwrap().status,
        StageStatus::Idle
    );
}

#[test]
fn test_records_after_workflow_complete_are_ignored() {
    let mut events = classification_scenario();
    events.push(StreamEvent::processing(StageKey::NoveltyDetection, "Late record"));

    let mut run = fresh_run();
    let mut reducer = StreamReducer::new();
    let applied = reducer.feed(&mut run, &records(&events));

    assert_eq!(
        applied.last(),
        Some(&Applied::WorkflowComplete {
            output_available: true
        })
    );
    assert_eq!(
        run.stage(&StageKey::NoveltyDetection).unwrap().status,
        StageStatus::Idle
    );
}

// ============================================================================
// Malformed and unknown records
// ============================================================================

#[test]
fn test_malformed_records_between_valid_ones() {
    let mut body = records(&[StreamEvent::processing(StageKey::Classification, "Starting...")]);
    body.extend_from_slice(b"data: {not json\n\n");
    body.extend_from_slice(b"data: \"plain text\"\n\n");
    body.extend(records(&[StreamEvent::complete(
        StageKey::Classification,
        json!({"classified_domain": "MM"}),
    )]));

    let run = fold_chunks(&[&body[..]]);

    assert_eq!(
        run.stage(&StageKey::Classification).unwrap().status,
        StageStatus::Complete
    );
    assert_eq!(run.dropped_records, 2);
}

#[test]
fn test_unknown_agent_gets_a_stage_entry() {
    let events = vec![
        StreamEvent::processing(StageKey::from("sentimentAnalysis"), "Reading tone..."),
        StreamEvent::complete(StageKey::from("sentimentAnalysis"), json!({"sentiment": "negative"})),
    ];
    let run = fold_chunks(&[&records(&events)[..]]);

    let key = StageKey::Other("sentimentAnalysis".to_string());
    let stage = run.stage(&key).unwrap();
    assert_eq!(stage.status, StageStatus::Complete);
    assert_eq!(run.stages.len(), StageKey::pipeline().len() + 1);
    assert_eq!(run.stages.keys().last(), Some(&key));
}

#[test]
fn test_crlf_line_endings_are_accepted() {
    let body = records(&classification_scenario());
    let crlf = String::from_utf8(body).unwrap().replace('\n', "\r\n");
    let run = fold_chunks(&[crlf.as_bytes()]);

    assert_eq!(
        run.outcome,
        Some(RunOutcome::Completed {
            output_available: true
        })
    );
}

#[test]
fn test_trailing_record_without_separator_is_applied_on_close() {
    let mut body = records(&[StreamEvent::processing(StageKey::Classification, "Starting...")]);
    body.extend_from_slice(br#"data: {"status":"workflow_complete","output_available":false}"#);

    let run = fold_chunks(&[&body[..]]);
    assert_eq!(
        run.outcome,
        Some(RunOutcome::Completed {
            output_available: false
        })
    );
}

// ============================================================================
// Chunking invariance
// ============================================================================

fn split_at_points(body: &[u8], mut points: Vec<usize>) -> Vec<&[u8]> {
    points.retain(|p| *p > 0 && *p < body.len());
    points.sort_unstable();
    points.dedup();

    let mut chunks = Vec::new();
    let mut start = 0;
    for point in points {
        chunks.push(&body[start..point]);
        start = point;
    }
    chunks.push(&body[start..]);
    chunks
}

/// Everything the reducer reported, in order, across all chunks
fn applied_over(chunks: &[&[u8]]) -> Vec<Applied> {
    let mut run = fresh_run();
    let mut reducer = StreamReducer::new();
    let mut applied = Vec::new();
    for chunk in chunks {
        applied.extend(reducer.feed(&mut run, chunk));
    }
    applied.extend(reducer.close(&mut run));
    applied
}

#[test]
fn test_single_chunk_reports_each_transition() {
    let body = records(&classification_scenario());
    let applied = applied_over(&[&body[..]]);

    assert_eq!(
        applied,
        vec![
            Applied::Stage(StageKey::Classification, StageStatus::Processing),
            Applied::Stage(StageKey::Classification, StageStatus::Streaming),
            Applied::Stage(StageKey::Classification, StageStatus::Complete),
            Applied::WorkflowComplete {
                output_available: true
            },
        ]
    );
}

proptest! {
    #[test]
    fn prop_any_chunking_yields_same_stages(points in proptest::collection::vec(0usize..4096, 0..24)) {
        let mut events = full_run();
        events.insert(4, StreamEvent::streaming(StageKey::HistoricalMatch, "Ünïcödé fragment ✓"));
        let body = records(&events);
        let points: Vec<usize> = points.into_iter().map(|p| p % (body.len() + 1)).collect();

        let whole = fold_chunks(&[&body[..]]);
        let chunked = fold_chunks(&split_at_points(&body, points));

        prop_assert_eq!(&whole.stages, &chunked.stages);
        prop_assert_eq!(&whole.outcome, &chunked.outcome);
        prop_assert_eq!(whole.dropped_records, chunked.dropped_records);
    }

    #[test]
    fn prop_any_chunking_reports_same_transitions(points in proptest::collection::vec(0usize..4096, 0..24)) {
        let body = records(&full_run());
        let points: Vec<usize> = points.into_iter().map(|p| p % (body.len() + 1)).collect();

        let whole = applied_over(&[&body[..]]);
        let chunked = applied_over(&split_at_points(&body, points));
        prop_assert_eq!(whole, chunked);
    }

    #[test]
    fn prop_one_byte_chunks_match_whole_body(extra in 0usize..3) {
        let mut events = classification_scenario();
        for i in 0..extra {
            events.insert(1, StreamEvent::streaming(StageKey::Classification, format!("fragment {}", i)));
        }
        let body = records(&events);
        let bytes: Vec<&[u8]> = body.chunks(1).collect();

        let whole = fold_chunks(&[&body[..]]);
        let chunked = fold_chunks(&bytes);
        prop_assert_eq!(whole.stages, chunked.stages);
    }
}
