//! In-process stand-in for the triage backend
//!
//! Serves every endpoint the dashboard calls with canned data. The ticket
//! stream is scripted, so demos and tests can replay any record sequence.

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::sse::{Event, Sse},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::Stream;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use triage_dashboard_sdk::{
    SearchConfig, SearchMetadata, SearchPreviewRequest, SearchPreviewResponse,
    SimilarTicketPreview, StageKey, StreamEvent, Ticket, TicketMetadata, ToolCall, ToolOutput,
    UiConfig,
};

/// One scripted entry of the ticket stream
#[derive(Debug, Clone)]
pub enum MockRecord {
    Event(StreamEvent),
    /// Sent verbatim as the data payload, e.g. to simulate malformed JSON
    Raw(String),
    /// Stop sending and hold the connection open
    Stall,
}

#[derive(Debug, Clone)]
pub struct MockOptions {
    pub event_delay: Duration,
    pub script: Vec<MockRecord>,
    pub skip_domain_classification: bool,
    /// Make `/api/output` answer 500
    pub fail_output: bool,
    /// Make `/api/process-ticket` answer 500 instead of streaming
    pub fail_process_ticket: bool,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            event_delay: Duration::from_millis(300),
            script: default_script(),
            skip_domain_classification: false,
            fail_output: false,
            fail_process_ticket: false,
        }
    }
}

impl MockOptions {
    pub fn with_script(mut self, script: Vec<MockRecord>) -> Self {
        self.script = script;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.event_delay = delay;
        self
    }
}

#[derive(Clone)]
pub struct MockState {
    options: Arc<MockOptions>,
    search_config: Arc<Mutex<SearchConfig>>,
    last_ticket: Arc<Mutex<Option<Ticket>>>,
    output_requests: Arc<AtomicUsize>,
}

impl MockState {
    pub fn new(options: MockOptions) -> Self {
        Self {
            options: Arc::new(options),
            search_config: Arc::new(Mutex::new(SearchConfig::default())),
            last_ticket: Arc::new(Mutex::new(None)),
            output_requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn search_config(&self) -> SearchConfig {
        self.search_config
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    pub fn last_ticket(&self) -> Option<Ticket> {
        self.last_ticket.lock().ok().and_then(|t| t.clone())
    }

    /// How many times `/api/output` was requested
    pub fn output_requests(&self) -> usize {
        self.output_requests.load(Ordering::SeqCst)
    }
}

/// A running mock server
pub struct MockServer {
    pub addr: SocketAddr,
    pub state: MockState,
    handle: Option<JoinHandle<()>>,
}

impl MockServer {
    /// Bind `addr` (port 0 picks a free port) and serve in the background
    pub async fn spawn(addr: &str, options: MockOptions) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let state = MockState::new(options);
        let app = router(state.clone());

        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                tracing::warn!(%err, "mock backend exited");
            }
        });
        tracing::info!("mock backend listening on http://{}", addr);

        Ok(Self {
            addr,
            state,
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Serve until the task ends
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

pub fn router(state: MockState) -> Router {
    Router::new()
        .route("/api/process-ticket", post(process_ticket))
        .route("/api/output", get(output))
        .route("/api/load-sample", get(load_sample))
        .route("/api/config", get(ui_config))
        .route("/api/preview-search", post(preview_search))
        .route("/api/load-search-config", get(load_search_config))
        .route("/api/save-search-config", post(save_search_config))
        .route("/api/prompts", get(prompts))
        .route("/api/download-csv", get(download_csv))
        .with_state(state)
}

async fn process_ticket(
    State(state): State<MockState>,
    Json(ticket): Json<Ticket>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    tracing::info!(ticket_id = %ticket.ticket_id, "mock backend received ticket");
    if let Ok(mut last) = state.last_ticket.lock() {
        *last = Some(ticket);
    }
    if state.options.fail_process_ticket {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let options = state.options.clone();
    let stream = async_stream::stream! {
        for record in options.script.iter() {
            if !options.event_delay.is_zero() {
                tokio::time::sleep(options.event_delay).await;
            }
            match record {
                MockRecord::Event(event) => match Event::default().json_data(event) {
                    Ok(event) => yield Ok(event),
                    Err(err) => tracing::warn!(%err, "failed to encode mock record"),
                },
                MockRecord::Raw(payload) => yield Ok(Event::default().data(payload.replace('\r', ""))),
                MockRecord::Stall => std::future::pending::<()>().await,
            }
        }
    };
    Ok(Sse::new(stream))
}

async fn output(State(state): State<MockState>) -> Result<Json<Value>, StatusCode> {
    state.output_requests.fetch_add(1, Ordering::SeqCst);
    if state.options.fail_output {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let ticket = state.last_ticket().ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(resolution_artifact(&ticket)))
}

async fn load_sample() -> Json<Ticket> {
    Json(sample_ticket())
}

async fn ui_config(State(state): State<MockState>) -> Json<UiConfig> {
    Json(UiConfig {
        skip_domain_classification: state.options.skip_domain_classification,
    })
}

async fn preview_search(Json(request): Json<SearchPreviewRequest>) -> Json<SearchPreviewResponse> {
    Json(rank_preview(&request))
}

async fn load_search_config(State(state): State<MockState>) -> Json<SearchConfig> {
    Json(state.search_config())
}

async fn save_search_config(
    State(state): State<MockState>,
    Json(config): Json<SearchConfig>,
) -> Json<Value> {
    if let Ok(mut current) = state.search_config.lock() {
        *current = config;
    }
    Json(json!({"status": "saved"}))
}

async fn prompts() -> Json<Value> {
    Json(json!({
        "label_assignment": {
            "historical": {
                "template": "Given similar tickets {similar_tickets}, pick labels seen on at least two of them.",
                "description": "Labels inherited from historical matches"
            },
            "business": {
                "template": "Classify the business impact of: {ticket}",
                "description": "Business impact labels",
                "label_criteria": {
                    "Revenue Impact": "Billing or premium amounts are wrong",
                    "Member Impact": "Members cannot enroll or see coverage"
                }
            },
            "technical": {
                "template": "Identify the technical failure category of: {ticket}",
                "description": "Technical root-cause labels",
                "label_criteria": {
                    "Configuration Fix": "Resolved by a config change",
                    "Performance": "Latency or throughput regression"
                }
            }
        },
        "resolution_generation": {
            "template": "Using {similar_tickets} and {labels}, write a resolution plan and test plan for {ticket}.",
            "description": "Chain-of-thought resolution and test plan"
        }
    }))
}

async fn download_csv() -> impl IntoResponse {
    let body = "ticket_id,title,domain,priority,labels\n\
                JIRA-MM-1042,Connection pool exhausted on MM_ALDER,MM,High,Configuration Fix;Performance\n\
                JIRA-CIW-311,EDI 837 batch rejected,CIW,Medium,Data Fix\n";
    ([(header::CONTENT_TYPE, "text/csv")], body)
}

// ============================================================================
// Canned data
// ============================================================================

pub fn sample_ticket() -> Ticket {
    Ticket {
        ticket_id: "JIRA-MM-2187".to_string(),
        title: "MM_ALDER service timing out during AWD payment processing".to_string(),
        description: "Members enrolling in family plans see a timeout when AWD payments are \
                      processed. Connection pool usage on MM_ALDER reaches 100% under batch load."
            .to_string(),
        priority: "High".to_string(),
        metadata: TicketMetadata {
            reported_by: "billing-ops@example.com".to_string(),
            affected_users: 140,
            environment: "production".to_string(),
        },
    }
}

/// Five-stage run ending with `workflow_complete`
pub fn default_script() -> Vec<MockRecord> {
    let mut script = Vec::new();
    let mut push = |event: StreamEvent| script.push(MockRecord::Event(event));

    push(StreamEvent::processing(StageKey::Classification, "Starting domain classification..."));
    push(StreamEvent::streaming(StageKey::Classification, "Ticket references MM_ALDER").with_progress(60.0));
    push(StreamEvent::complete(
        StageKey::Classification,
        json!({
            "classified_domain": "MM",
            "confidence": 0.92,
            "reasoning": "Ticket contains MM_ALDER service references"
        }),
    ));

    push(StreamEvent::processing(StageKey::HistoricalMatch, "Searching for similar tickets..."));
    push(
        StreamEvent::streaming(StageKey::HistoricalMatch, "Vector search returned 20 candidates")
            .with_tools(
                vec![ToolCall {
                    name: "vector_search".to_string(),
                    description: "FAISS top-k over historical tickets".to_string(),
                }],
                vec![ToolOutput {
                    name: "vector_search".to_string(),
                    content: "20 candidates, top similarity 0.87".to_string(),
                }],
            ),
    );
    push(StreamEvent::complete(
        StageKey::HistoricalMatch,
        json!({"similar_tickets_count": 20, "top_similarity": 0.87}),
    ));

    push(StreamEvent::processing(StageKey::LabelAssignment, "Assigning labels based on patterns..."));
    push(StreamEvent::complete(
        StageKey::LabelAssignment,
        json!({"assigned_labels": ["Configuration Fix", "#MM_ALDER", "Performance"]}),
    ));

    push(StreamEvent::processing(StageKey::NoveltyDetection, "Checking for novel patterns..."));
    push(StreamEvent::complete(
        StageKey::NoveltyDetection,
        json!({"is_novel": false, "novelty_score": 0.12}),
    ));

    push(StreamEvent::processing(StageKey::ResolutionGeneration, "Generating resolution plan..."));
    push(StreamEvent::streaming(StageKey::ResolutionGeneration, "Drafting remediation steps"));
    push(StreamEvent::streaming(StageKey::ResolutionGeneration, "Drafting test plan").with_progress(80.0));
    push(StreamEvent::complete(
        StageKey::ResolutionGeneration,
        json!({
            "summary": "Increase database connection pool size and add monitoring",
            "estimated_hours": 2,
            "confidence": 0.88
        }),
    ));

    push(StreamEvent::workflow_complete(true));
    script
}

fn resolution_artifact(ticket: &Ticket) -> Value {
    json!({
        "ticket_id": ticket.ticket_id,
        "title": ticket.title,
        "classification": {"domain": "MM", "confidence": 0.92},
        "labels": ["Configuration Fix", "#MM_ALDER", "Performance"],
        "novelty": {"is_novel": false, "novelty_score": 0.12},
        "novelty_detected": false,
        "novelty_recommendation": "proceed",
        "resolution_plan": {
            "summary": "Increase database connection pool size and add monitoring",
            "resolution_steps": [
                {
                    "step_number": 1,
                    "description": "Raise MM_ALDER pool size from 50 to 120",
                    "commands": ["kubectl set env deploy/mm-alder DB_POOL_SIZE=120"],
                    "validation": "Pool usage stays below 70% under batch load",
                    "estimated_time_minutes": 30,
                    "risk_level": "medium",
                    "rollback_procedure": "Set DB_POOL_SIZE back to 50",
                    "source_ticket": "JIRA-MM-1042"
                },
                {
                    "step_number": 2,
                    "description": "Add pool saturation alert at 80%",
                    "commands": [],
                    "validation": "Alert fires in the staging drill",
                    "estimated_time_minutes": 45,
                    "risk_level": "low",
                    "rollback_procedure": "Remove the alert rule"
                },
                {
                    "step_number": 3,
                    "description": "Replay the AWD batch in staging",
                    "commands": ["./scripts/replay-batch.sh awd --env staging"],
                    "validation": "No duplicate charges in the replay report",
                    "estimated_time_minutes": 45,
                    "risk_level": "low",
                    "rollback_procedure": "None needed"
                }
            ],
            "references": [
                {"ticket_id": "JIRA-MM-1042", "similarity": 0.91, "note": "Same pool exhaustion"}
            ],
            "total_estimated_time_hours": 2,
            "confidence": 0.87,
            "alternative_approaches": ["Split the AWD batch into smaller chunks"]
        },
        "test_plan": [
            "Verify AWD payment for a family plan with two dependents",
            "Load test batch processing at 2x peak volume"
        ]
    })
}

fn historical_tickets() -> Vec<SimilarTicketPreview> {
    let ticket = |id: &str, title: &str, domain: &str, priority: &str, vector: f64, meta: f64, hours: f64| {
        SimilarTicketPreview {
            ticket_id: id.to_string(),
            title: title.to_string(),
            description: format!("{} (historical ticket)", title),
            similarity_score: 0.0,
            vector_similarity: vector,
            metadata_score: meta,
            priority: priority.to_string(),
            labels: vec!["Configuration Fix".to_string()],
            resolution_time_hours: hours,
            domain: domain.to_string(),
            resolution: Some("Resolved by configuration change".to_string()),
        }
    };

    vec![
        ticket("JIRA-MM-1042", "Connection pool exhausted on MM_ALDER", "MM", "High", 0.91, 0.80, 6.0),
        ticket("JIRA-MM-0977", "AWD payment retries duplicate charges", "MM", "Critical", 0.84, 0.95, 12.0),
        ticket("JIRA-MM-0815", "Family plan premium mismatch", "MM", "Medium", 0.72, 0.55, 30.0),
        ticket("JIRA-CIW-0311", "EDI 837 batch rejected by gateway", "CIW", "Medium", 0.66, 0.50, 18.0),
        ticket("JIRA-CIW-0290", "Claims adjudication timeout", "CIW", "High", 0.79, 0.70, 8.0),
        ticket("JIRA-SP-0054", "Specialty pharmacy eligibility lag", "Specialty", "Low", 0.58, 0.30, 48.0),
        ticket("JIRA-SP-0061", "Specialty referral form crash", "Specialty", "High", 0.61, 0.65, 4.0),
    ]
}

fn rank_preview(request: &SearchPreviewRequest) -> SearchPreviewResponse {
    let config = &request.config;
    let domain = config.domain_filter.clone();

    let mut results: Vec<SimilarTicketPreview> = historical_tickets()
        .into_iter()
        .filter(|t| domain.as_deref().map_or(true, |d| t.domain == d))
        .map(|mut t| {
            t.similarity_score =
                config.vector_weight * t.vector_similarity + config.metadata_weight * t.metadata_score;
            t
        })
        .collect();
    results.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
    results.truncate(config.top_k as usize);

    let total = results.len();
    let avg = if total == 0 {
        0.0
    } else {
        results.iter().map(|t| t.similarity_score).sum::<f64>() / total as f64
    };
    let top = results.first().map(|t| t.similarity_score).unwrap_or(0.0);

    SearchPreviewResponse {
        similar_tickets: results,
        search_metadata: SearchMetadata {
            query_domain: domain.clone().unwrap_or_else(|| "MM".to_string()),
            total_found: total as u32,
            avg_similarity: avg,
            top_similarity: top,
            classification_confidence: if domain.is_none() { Some(0.9) } else { None },
        },
        config_used: Some(config.clone()),
    }
}
