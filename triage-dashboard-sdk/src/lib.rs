use chrono::{DateTime, Local};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::pin::Pin;
use std::time::Duration;
use uuid::Uuid;

// Re-export async trait for convenience
pub use async_trait::async_trait;

// ============================================================================
// Stages
// ============================================================================

/// Identifier of one stage of the backend pipeline.
///
/// The backend's stage set has changed between versions, so names that are
/// not in the known set are kept as [`StageKey::Other`] instead of rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StageKey {
    Classification,
    HistoricalMatch,
    LabelAssignment,
    NoveltyDetection,
    ResolutionGeneration,
    Other(String),
}

impl StageKey {
    /// Fixed processing order of the known stages
    pub fn pipeline() -> Vec<StageKey> {
        vec![
            StageKey::Classification,
            StageKey::HistoricalMatch,
            StageKey::LabelAssignment,
            StageKey::NoveltyDetection,
            StageKey::ResolutionGeneration,
        ]
    }

    /// Wire name used by the backend
    pub fn as_str(&self) -> &str {
        match self {
            StageKey::Classification => "classification",
            StageKey::HistoricalMatch => "historicalMatch",
            StageKey::LabelAssignment => "labelAssignment",
            StageKey::NoveltyDetection => "noveltyDetection",
            StageKey::ResolutionGeneration => "resolutionGeneration",
            StageKey::Other(name) => name,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            StageKey::Classification => "Domain Classification",
            StageKey::HistoricalMatch => "Historical Match",
            StageKey::LabelAssignment => "Label Assignment",
            StageKey::NoveltyDetection => "Novelty Detection",
            StageKey::ResolutionGeneration => "Resolution Generation",
            StageKey::Other(name) => name,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            StageKey::Classification => "Classifies the ticket into a business domain",
            StageKey::HistoricalMatch => "Retrieves similar historical tickets",
            StageKey::LabelAssignment => "Assigns category, business and technical labels",
            StageKey::NoveltyDetection => "Flags tickets that fit no known category",
            StageKey::ResolutionGeneration => "Generates a resolution and test plan",
            StageKey::Other(_) => "Stage reported by the backend",
        }
    }
}

impl From<&str> for StageKey {
    fn from(value: &str) -> Self {
        match value {
            "classification" => StageKey::Classification,
            "historicalMatch" => StageKey::HistoricalMatch,
            "labelAssignment" => StageKey::LabelAssignment,
            "noveltyDetection" => StageKey::NoveltyDetection,
            "resolutionGeneration" => StageKey::ResolutionGeneration,
            other => StageKey::Other(other.to_string()),
        }
    }
}

impl From<String> for StageKey {
    fn from(value: String) -> Self {
        StageKey::from(value.as_str())
    }
}

impl From<StageKey> for String {
    fn from(key: StageKey) -> Self {
        match key {
            StageKey::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    #[default]
    Idle,
    Processing,
    Streaming,
    Complete,
    Error,
}

impl StageStatus {
    /// True while the backend is working on the stage
    pub fn is_active(self) -> bool {
        matches!(self, StageStatus::Processing | StageStatus::Streaming)
    }

    pub fn label(self) -> &'static str {
        match self {
            StageStatus::Idle => "Idle",
            StageStatus::Processing => "Processing",
            StageStatus::Streaming => "Streaming",
            StageStatus::Complete => "Complete",
            StageStatus::Error => "Error",
        }
    }
}

/// Side-channel tool invocation reported while a stage streams
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Output of a tool invocation reported while a stage streams
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolOutput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content: String,
}

/// Client-side view of one stage
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StageState {
    pub status: StageStatus,
    /// Advisory, 0..=100
    pub progress: u8,
    /// Streaming fragments received during the current phase
    pub accumulated_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_outputs: Vec<ToolOutput>,
}

/// A stage and its state, as stored in a [`StageMap`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEntry {
    pub key: StageKey,
    #[serde(flatten)]
    pub state: StageState,
}

/// Ordered stage collection: the processing order first, then stages the
/// backend introduced during the run in arrival order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageMap {
    entries: Vec<StageEntry>,
}

impl StageMap {
    /// Idle entries for every key in `order`
    pub fn with_order(order: &[StageKey]) -> Self {
        let mut map = Self::default();
        for key in order {
            map.entry(key.clone());
        }
        map
    }

    pub fn get(&self, key: &StageKey) -> Option<&StageState> {
        self.entries.iter().find(|e| &e.key == key).map(|e| &e.state)
    }

    pub fn get_mut(&mut self, key: &StageKey) -> Option<&mut StageState> {
        self.entries
            .iter_mut()
            .find(|e| &e.key == key)
            .map(|e| &mut e.state)
    }

    /// Find or create the state for `key`
    pub fn entry(&mut self, key: StageKey) -> &mut StageState {
        let idx = match self.entries.iter().position(|e| e.key == key) {
            Some(idx) => idx,
            None => {
                self.entries.push(StageEntry {
                    key,
                    state: StageState::default(),
                });
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].state
    }

    pub fn contains(&self, key: &StageKey) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageEntry> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &StageKey> {
        self.entries.iter().map(|e| &e.key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Runs
// ============================================================================

/// How a run ended. A run whose stream closed without a terminal record has
/// no outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed { output_available: bool },
    Failed { message: String },
    Cancelled,
}

/// Client-side record of one ticket submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<Ticket>,
    pub stages: StageMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_artifact: Option<serde_json::Value>,
    pub in_progress: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RunOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_error: Option<String>,
    /// Records dropped because they could not be decoded
    pub dropped_records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Local>>,
}

impl WorkflowRun {
    /// A run that has not been submitted: every stage idle
    pub fn idle(order: &[StageKey]) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket: None,
            stages: StageMap::with_order(order),
            final_artifact: None,
            in_progress: false,
            outcome: None,
            run_error: None,
            dropped_records: 0,
            started_at: None,
            finished_at: None,
        }
    }

    /// A fresh in-progress run for `ticket`
    pub fn start(order: &[StageKey], ticket: Ticket) -> Self {
        Self {
            ticket: Some(ticket),
            in_progress: true,
            started_at: Some(Local::now()),
            ..Self::idle(order)
        }
    }

    pub fn stage(&self, key: &StageKey) -> Option<&StageState> {
        self.stages.get(key)
    }

    /// True once a terminal record, a failure, or a cancellation ended the run
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }

    /// Mark the run as no longer consuming the stream
    pub fn finish(&mut self, outcome: Option<RunOutcome>) {
        self.in_progress = false;
        if outcome.is_some() {
            self.outcome = outcome;
        }
        self.finished_at = Some(Local::now());
    }
}

// ============================================================================
// Stream records
// ============================================================================

/// Status value of the terminal success record
pub const WORKFLOW_COMPLETE: &str = "workflow_complete";

/// Status value shared by stage errors and the terminal run error
pub const STATUS_ERROR: &str = "error";

pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_STREAMING: &str = "streaming";
pub const STATUS_COMPLETE: &str = "complete";

/// One JSON record carried by the `/api/process-ticket` event stream.
///
/// Stage records carry `agent`; terminal records carry only `status`
/// (`workflow_complete` or `error`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<StageKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_outputs: Option<Vec<ToolOutput>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_available: Option<bool>,
}

impl StreamEvent {
    fn stage(agent: StageKey, status: &str) -> Self {
        Self {
            agent: Some(agent),
            status: Some(status.to_string()),
            ..Self::default()
        }
    }

    pub fn processing(agent: StageKey, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::stage(agent, STATUS_PROCESSING)
        }
    }

    pub fn streaming(agent: StageKey, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::stage(agent, STATUS_STREAMING)
        }
    }

    pub fn complete(agent: StageKey, data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            ..Self::stage(agent, STATUS_COMPLETE)
        }
    }

    pub fn stage_error(agent: StageKey, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::stage(agent, STATUS_ERROR)
        }
    }

    pub fn workflow_complete(output_available: bool) -> Self {
        Self {
            status: Some(WORKFLOW_COMPLETE.to_string()),
            output_available: Some(output_available),
            ..Self::default()
        }
    }

    pub fn run_error(message: impl Into<String>) -> Self {
        Self {
            status: Some(STATUS_ERROR.to_string()),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_tools(mut self, calls: Vec<ToolCall>, outputs: Vec<ToolOutput>) -> Self {
        self.tool_calls = Some(calls);
        self.tool_outputs = Some(outputs);
        self
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}

// ============================================================================
// Tickets
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TicketMetadata {
    #[serde(default)]
    pub reported_by: String,
    #[serde(default)]
    pub affected_users: u64,
    #[serde(default)]
    pub environment: String,
}

/// Ticket submitted to `/api/process-ticket`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Ticket {
    #[serde(default)]
    pub ticket_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub metadata: TicketMetadata,
}

impl Ticket {
    /// Build a ticket from free text entered by the user.
    ///
    /// Returns `None` for blank input. The first line becomes the title and
    /// the whole text the description.
    pub fn from_free_text(text: &str) -> Option<Self> {
        Self::from_free_text_at(text, Local::now().timestamp_millis())
    }

    pub fn from_free_text_at(text: &str, unix_millis: i64) -> Option<Self> {
        if text.trim().is_empty() {
            return None;
        }
        let title = text
            .lines()
            .next()
            .filter(|line| !line.is_empty())
            .unwrap_or("New Ticket");

        Some(Self {
            ticket_id: format!("JIRA-NEW-{}", unix_millis),
            title: title.to_string(),
            description: text.to_string(),
            priority: "High".to_string(),
            metadata: TicketMetadata {
                reported_by: "user@example.com".to_string(),
                affected_users: 0,
                environment: "production".to_string(),
            },
        })
    }
}

/// Response of `/api/config`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default)]
    pub skip_domain_classification: bool,
}

impl UiConfig {
    /// Processing order the dashboard should render
    pub fn stage_order(&self) -> Vec<StageKey> {
        StageKey::pipeline()
            .into_iter()
            .filter(|key| !(self.skip_domain_classification && *key == StageKey::Classification))
            .collect()
    }
}

// ============================================================================
// Search configuration
// ============================================================================

/// Ticket priorities, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Critical => "Critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityWeights {
    #[serde(rename = "Critical")]
    pub critical: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Medium")]
    pub medium: f64,
    #[serde(rename = "Low")]
    pub low: f64,
}

impl PriorityWeights {
    pub fn get(&self, priority: Priority) -> f64 {
        match priority {
            Priority::Critical => self.critical,
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }

    pub fn set(&mut self, priority: Priority, value: f64) {
        match priority {
            Priority::Critical => self.critical = value,
            Priority::High => self.high = value,
            Priority::Medium => self.medium = value,
            Priority::Low => self.low = value,
        }
    }
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            critical: 1.0,
            high: 0.8,
            medium: 0.5,
            low: 0.3,
        }
    }
}

/// Retrieval/ranking parameters of the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub top_k: u32,
    pub vector_weight: f64,
    pub metadata_weight: f64,
    pub priority_weights: PriorityWeights,
    pub time_normalization_hours: f64,
    /// `None` lets the backend detect the domain
    pub domain_filter: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 20,
            vector_weight: 0.7,
            metadata_weight: 0.3,
            priority_weights: PriorityWeights::default(),
            time_normalization_hours: 100.0,
            domain_filter: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarTicketPreview {
    pub ticket_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub similarity_score: f64,
    #[serde(default)]
    pub vector_similarity: f64,
    #[serde(default)]
    pub metadata_score: f64,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub resolution_time_hours: f64,
    #[serde(default)]
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchMetadata {
    #[serde(default)]
    pub query_domain: String,
    #[serde(default)]
    pub total_found: u32,
    #[serde(default)]
    pub avg_similarity: f64,
    #[serde(default)]
    pub top_similarity: f64,
    #[serde(default)]
    pub classification_confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPreviewRequest {
    pub title: String,
    pub description: String,
    pub config: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPreviewResponse {
    #[serde(default)]
    pub similar_tickets: Vec<SimilarTicketPreview>,
    #[serde(default)]
    pub search_metadata: SearchMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_used: Option<SearchConfig>,
}

// ============================================================================
// Prompts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub template: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub label_criteria: BTreeMap<String, String>,
}

/// Prompts of one stage: a single template, or several named ones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptGroup {
    Single(PromptTemplate),
    Named(BTreeMap<String, PromptTemplate>),
}

/// Response of `/api/prompts`, keyed by stage name
pub type PromptTemplates = BTreeMap<String, PromptGroup>;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("failed to decode {endpoint} response: {message}")]
    Decode { endpoint: String, message: String },

    #[error("a workflow run is already in progress")]
    RunInProgress,

    #[error("workflow run was cancelled")]
    Cancelled,

    #[error("event stream stalled: no data for {0:?}")]
    StreamTimeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for dashboard operations
pub type DashboardResult<T> = Result<T, DashboardError>;

// ============================================================================
// Backend contract
// ============================================================================

/// Raw body chunks of the event stream, in arrival order
pub type ByteChunkStream = Pin<Box<dyn Stream<Item = DashboardResult<Vec<u8>>> + Send>>;

/// Everything the dashboard asks of the triage backend.
///
/// The HTTP client implements this; tests substitute scripted backends.
#[async_trait]
pub trait TriageBackend: Send + Sync {
    /// Submit a ticket and open its event stream
    async fn process_ticket(&self, ticket: &Ticket) -> DashboardResult<ByteChunkStream>;

    /// Final artifact of the last completed run
    async fn fetch_output(&self) -> DashboardResult<serde_json::Value>;

    async fn load_sample(&self) -> DashboardResult<Ticket>;

    async fn fetch_ui_config(&self) -> DashboardResult<UiConfig>;

    async fn preview_search(
        &self,
        request: &SearchPreviewRequest,
    ) -> DashboardResult<SearchPreviewResponse>;

    async fn load_search_config(&self) -> DashboardResult<SearchConfig>;

    async fn save_search_config(&self, config: &SearchConfig) -> DashboardResult<()>;

    async fn fetch_prompts(&self) -> DashboardResult<PromptTemplates>;

    async fn download_csv(&self) -> DashboardResult<Vec<u8>>;
}
