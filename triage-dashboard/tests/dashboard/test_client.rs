//! End-to-end tests of BackendClient against the in-process mock backend

use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use triage_dashboard::client::BackendClient;
use triage_dashboard::mock_backend::{sample_ticket, MockOptions, MockRecord, MockServer};
use triage_dashboard::runtime::RunManager;
use triage_dashboard::search::{DomainFilter, SearchTuning};
use triage_dashboard_sdk::*;

async fn start_mock(options: MockOptions) -> (MockServer, BackendClient) {
    let server = MockServer::spawn("127.0.0.1:0", options.with_delay(Duration::ZERO))
        .await
        .unwrap();
    let client = BackendClient::new(server.base_url(), Duration::from_secs(5)).unwrap();
    (server, client)
}

// ============================================================================
// Workflow stream
// ============================================================================

#[tokio::test]
async fn test_full_run_against_mock_backend() {
    let (server, client) = start_mock(MockOptions::default()).await;
    let runs = RunManager::new(Arc::new(client), Handle::current());

    runs.start(sample_ticket()).unwrap();
    runs.wait().await;

    let run = runs.snapshot();
    assert_eq!(
        run.outcome,
        Some(RunOutcome::Completed {
            output_available: true
        })
    );
    for stage in StageKey::pipeline() {
        assert_eq!(run.stage(&stage).unwrap().status, StageStatus::Complete, "{}", stage);
    }

    let matched = run.stage(&StageKey::HistoricalMatch).unwrap();
    assert_eq!(matched.tool_calls[0].name, "vector_search");

    let artifact = run.final_artifact.unwrap();
    assert_eq!(artifact["ticket_id"], "JIRA-MM-2187");
    assert_eq!(server.state.output_requests(), 1);
    assert_eq!(server.state.last_ticket().unwrap(), sample_ticket());
}

#[tokio::test]
async fn test_malformed_and_unknown_records_over_http() {
    let script = vec![
        MockRecord::Event(StreamEvent::processing(StageKey::Classification, "Starting...")),
        MockRecord::Raw("{broken".to_string()),
        MockRecord::Event(StreamEvent::processing(StageKey::from("auditTrail"), "Auditing...")),
        MockRecord::Event(StreamEvent::workflow_complete(false)),
    ];
    let (_server, client) = start_mock(MockOptions::default().with_script(script)).await;
    let runs = RunManager::new(Arc::new(client), Handle::current());

    runs.start(sample_ticket()).unwrap();
    runs.wait().await;

    let run = runs.snapshot();
    assert_eq!(run.dropped_records, 1);
    assert_eq!(
        run.stage(&StageKey::from("auditTrail")).unwrap().status,
        StageStatus::Processing
    );
    assert!(run.is_terminal());
}

#[tokio::test]
async fn test_output_endpoint_failure_is_reported() {
    let options = MockOptions {
        fail_output: true,
        ..MockOptions::default()
    };
    let (_server, client) = start_mock(options).await;

    match client.fetch_output().await {
        Err(DashboardError::Status { endpoint, status }) => {
            assert_eq!(endpoint, "/api/output");
            assert_eq!(status, 500);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_process_ticket_server_error_fails_run() {
    let options = MockOptions {
        fail_process_ticket: true,
        ..MockOptions::default()
    };
    let (server, client) = start_mock(options).await;

    match client.process_ticket(&sample_ticket()).await {
        Err(DashboardError::Status { endpoint, status }) => {
            assert_eq!(endpoint, "/api/process-ticket");
            assert_eq!(status, 500);
        }
        Err(other) => panic!("unexpected error: {:?}", other),
        Ok(_) => panic!("stream opened despite the server error"),
    }

    let runs = RunManager::new(Arc::new(client), Handle::current());
    runs.start(sample_ticket()).unwrap();
    runs.wait().await;

    let run = runs.snapshot();
    assert!(matches!(run.outcome, Some(RunOutcome::Failed { .. })));
    assert!(run.run_error.as_deref().unwrap().contains("500"));
    assert_eq!(
        run.stage(&StageKey::Classification).unwrap().status,
        StageStatus::Error
    );
    assert_eq!(server.state.output_requests(), 0);
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = BackendClient::new(format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    assert!(matches!(
        client.load_sample().await,
        Err(DashboardError::Transport(_))
    ));
}

// ============================================================================
// Secondary endpoints
// ============================================================================

#[tokio::test]
async fn test_sample_and_ui_config() {
    let options = MockOptions {
        skip_domain_classification: true,
        ..MockOptions::default()
    };
    let (_server, client) = start_mock(options).await;

    assert_eq!(client.load_sample().await.unwrap(), sample_ticket());
    let config = client.fetch_ui_config().await.unwrap();
    assert!(config.skip_domain_classification);
    assert_eq!(config.stage_order().len(), 4);
}

#[tokio::test]
async fn test_search_config_round_trip() {
    let (server, client) = start_mock(MockOptions::default()).await;

    let mut tuning = SearchTuning::new();
    tuning.load_config(client.load_search_config().await.unwrap());
    tuning.set_top_k(35);
    tuning.set_vector_weight(0.55);
    tuning.set_domain_filter(DomainFilter::Ciw);

    client.save_search_config(&tuning.config).await.unwrap();

    let stored = server.state.search_config();
    assert_eq!(stored.top_k, 35);
    assert_eq!(stored.vector_weight, 0.55);
    assert_eq!(stored.metadata_weight, 0.45);
    assert_eq!(stored.domain_filter.as_deref(), Some("CIW"));
    assert_eq!(client.load_search_config().await.unwrap(), stored);
}

#[tokio::test]
async fn test_preview_search_ranks_results() {
    let (_server, client) = start_mock(MockOptions::default()).await;

    let mut tuning = SearchTuning::new();
    tuning.query = "Connection pool exhausted\nMM_ALDER under batch load".to_string();
    let request = tuning.preview_request().unwrap();
    assert_eq!(request.title, "Connection pool exhausted");

    let response = client.preview_search(&request).await.unwrap();
    assert!(!response.similar_tickets.is_empty());
    let scores: Vec<f64> = response
        .similar_tickets
        .iter()
        .map(|t| t.similarity_score)
        .collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));

    tuning.apply_preview(response);
    assert!(tuning.metadata.is_some());
    assert_eq!(tuning.selected_result, 0);
}

#[tokio::test]
async fn test_prompts_and_csv() {
    let (_server, client) = start_mock(MockOptions::default()).await;

    let prompts = client.fetch_prompts().await.unwrap();
    assert!(matches!(
        prompts.get("resolution_generation"),
        Some(PromptGroup::Single(_))
    ));
    match prompts.get("label_assignment") {
        Some(PromptGroup::Named(named)) => {
            assert_eq!(named.len(), 3);
            assert_eq!(named["business"].label_criteria.len(), 2);
        }
        other => panic!("unexpected prompt group: {:?}", other),
    }

    let csv = client.download_csv().await.unwrap();
    let text = String::from_utf8(csv).unwrap();
    assert!(text.starts_with("ticket_id,title"));
}
