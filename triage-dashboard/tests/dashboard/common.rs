//! Common test utilities for dashboard tests

use futures::stream;
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use triage_dashboard::sse::encode_event;
use triage_dashboard_sdk::*;

/// Backend whose event stream replays fixed chunks
pub struct ScriptedBackend {
    pub chunks: Vec<Vec<u8>>,
    /// Never end the stream after the last chunk
    pub stall: bool,
    /// Fail the read with a transport error after the last chunk
    pub fail_after: Option<String>,
    pub chunk_delay: Duration,
    pub output: Option<Value>,
    pub ui_config: UiConfig,
    pub output_requests: AtomicUsize,
    pub submitted: Mutex<Vec<Ticket>>,
}

impl ScriptedBackend {
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks,
            stall: false,
            fail_after: None,
            chunk_delay: Duration::ZERO,
            output: Some(json!({"resolution": "Increase pool size"})),
            ui_config: UiConfig::default(),
            output_requests: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn from_events(events: &[StreamEvent]) -> Self {
        Self::new(vec![records(events)])
    }

    pub fn stalling(mut self) -> Self {
        self.stall = true;
        self
    }

    pub fn failing_after(mut self, message: &str) -> Self {
        self.fail_after = Some(message.to_string());
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn without_output(mut self) -> Self {
        self.output = None;
        self
    }

    pub fn output_requests(&self) -> usize {
        self.output_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TriageBackend for ScriptedBackend {
    async fn process_ticket(&self, ticket: &Ticket) -> DashboardResult<ByteChunkStream> {
        self.submitted.lock().unwrap().push(ticket.clone());

        let delay = self.chunk_delay;
        let chunks = stream::iter(self.chunks.clone()).then(move |chunk| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(chunk)
        });

        if let Some(message) = &self.fail_after {
            let failure = stream::iter(vec![Err(DashboardError::Transport(message.clone()))]);
            Ok(Box::pin(chunks.chain(failure)))
        } else if self.stall {
            Ok(Box::pin(chunks.chain(stream::pending())))
        } else {
            Ok(Box::pin(chunks))
        }
    }

    async fn fetch_output(&self) -> DashboardResult<Value> {
        self.output_requests.fetch_add(1, Ordering::SeqCst);
        self.output.clone().ok_or(DashboardError::Status {
            endpoint: "/api/output".to_string(),
            status: 500,
        })
    }

    async fn load_sample(&self) -> DashboardResult<Ticket> {
        Ok(ticket("Sample ticket"))
    }

    async fn fetch_ui_config(&self) -> DashboardResult<UiConfig> {
        Ok(self.ui_config.clone())
    }

    async fn preview_search(&self, _request: &SearchPreviewRequest) -> DashboardResult<SearchPreviewResponse> {
        Err(DashboardError::Transport("not scripted".to_string()))
    }

    async fn load_search_config(&self) -> DashboardResult<SearchConfig> {
        Ok(SearchConfig::default())
    }

    async fn save_search_config(&self, _config: &SearchConfig) -> DashboardResult<()> {
        Ok(())
    }

    async fn fetch_prompts(&self) -> DashboardResult<PromptTemplates> {
        Ok(PromptTemplates::new())
    }

    async fn download_csv(&self) -> DashboardResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Backend whose event stream cannot be opened
pub struct UnreachableBackend;

#[async_trait]
impl TriageBackend for UnreachableBackend {
    async fn process_ticket(&self, _ticket: &Ticket) -> DashboardResult<ByteChunkStream> {
        Err(DashboardError::Transport("connection refused".to_string()))
    }

    async fn fetch_output(&self) -> DashboardResult<Value> {
        Err(DashboardError::Transport("connection refused".to_string()))
    }

    async fn load_sample(&self) -> DashboardResult<Ticket> {
        Err(DashboardError::Transport("connection refused".to_string()))
    }

    async fn fetch_ui_config(&self) -> DashboardResult<UiConfig> {
        Err(DashboardError::Transport("connection refused".to_string()))
    }

    async fn preview_search(&self, _request: &SearchPreviewRequest) -> DashboardResult<SearchPreviewResponse> {
        Err(DashboardError::Transport("connection refused".to_string()))
    }

    async fn load_search_config(&self) -> DashboardResult<SearchConfig> {
        Err(DashboardError::Transport("connection refused".to_string()))
    }

    async fn save_search_config(&self, _config: &SearchConfig) -> DashboardResult<()> {
        Err(DashboardError::Transport("connection refused".to_string()))
    }

    async fn fetch_prompts(&self) -> DashboardResult<PromptTemplates> {
        Err(DashboardError::Transport("connection refused".to_string()))
    }

    async fn download_csv(&self) -> DashboardResult<Vec<u8>> {
        Err(DashboardError::Transport("connection refused".to_string()))
    }
}

pub fn ticket(title: &str) -> Ticket {
    Ticket::from_free_text_at(&format!("{}\nDetails about {}", title, title), 1_700_000_000_000)
        .unwrap()
}

/// Encode events as one SSE body
pub fn records(events: &[StreamEvent]) -> Vec<u8> {
    events
        .iter()
        .map(|event| encode_event(event).unwrap())
        .collect::<String>()
        .into_bytes()
}

/// processing, streaming, complete for classification, then workflow_complete
pub fn classification_scenario() -> Vec<StreamEvent> {
    vec![
        StreamEvent::processing(StageKey::Classification, "Starting domain classification..."),
        StreamEvent::streaming(StageKey::Classification, "Looking at MM_ALDER"),
        StreamEvent::complete(
            StageKey::Classification,
            json!({"classified_domain": "MM", "confidence": 0.9}),
        ),
        StreamEvent::workflow_complete(true),
    ]
}

/// A full run across every known stage
pub fn full_run() -> Vec<StreamEvent> {
    let mut events = Vec::new();
    for stage in StageKey::pipeline() {
        events.push(StreamEvent::processing(stage.clone(), format!("Starting {}", stage)));
        events.push(StreamEvent::streaming(stage.clone(), format!("Working on {}", stage)));
        events.push(StreamEvent::complete(stage.clone(), json!({"stage": stage.as_str()})));
    }
    events.push(StreamEvent::workflow_complete(true));
    events
}
