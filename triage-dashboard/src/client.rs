//! HTTP client for the triage backend

use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use triage_dashboard_sdk::{
    async_trait, ByteChunkStream, DashboardError, DashboardResult, PromptTemplates, SearchConfig,
    SearchPreviewRequest, SearchPreviewResponse, Ticket, TriageBackend, UiConfig,
};

use crate::config::DashboardConfig;

pub const PROCESS_TICKET: &str = "/api/process-ticket";
pub const OUTPUT: &str = "/api/output";
pub const LOAD_SAMPLE: &str = "/api/load-sample";
pub const UI_CONFIG: &str = "/api/config";
pub const PREVIEW_SEARCH: &str = "/api/preview-search";
pub const LOAD_SEARCH_CONFIG: &str = "/api/load-search-config";
pub const SAVE_SEARCH_CONFIG: &str = "/api/save-search-config";
pub const PROMPTS: &str = "/api/prompts";
pub const DOWNLOAD_CSV: &str = "/api/download-csv";

/// [`TriageBackend`] over HTTP. Every endpoint is resolved against the single
/// base URL given at construction.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    request_timeout: Duration,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> DashboardResult<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| DashboardError::Transport(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            http,
            base_url,
            request_timeout,
        })
    }

    pub fn from_config(config: &DashboardConfig) -> DashboardResult<Self> {
        Self::new(config.backend_url.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a non-streaming request with the per-request timeout applied
    async fn send(&self, path: &str, request: RequestBuilder) -> DashboardResult<Response> {
        let response = request
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| transport(path, e))?;
        check_status(path, response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> DashboardResult<T> {
        let response = self.send(path, self.http.get(self.endpoint(path))).await?;
        decode_body(path, response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> DashboardResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .send(path, self.http.post(self.endpoint(path)).json(body))
            .await?;
        decode_body(path, response).await
    }
}

fn transport(path: &str, err: reqwest::Error) -> DashboardError {
    tracing::debug!(endpoint = path, error = %err, "request failed");
    DashboardError::Transport(format!("{}: {}", path, err))
}

fn check_status(path: &str, response: Response) -> DashboardResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(DashboardError::Status {
            endpoint: path.to_string(),
            status: status.as_u16(),
        })
    }
}

async fn decode_body<T: DeserializeOwned>(path: &str, response: Response) -> DashboardResult<T> {
    let bytes = response.bytes().await.map_err(|e| transport(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| DashboardError::Decode {
        endpoint: path.to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl TriageBackend for BackendClient {
    async fn process_ticket(&self, ticket: &Ticket) -> DashboardResult<ByteChunkStream> {
        tracing::info!(ticket_id = %ticket.ticket_id, "submitting ticket");

        // No timeout: the stream stays open for the whole run
        let response = self
            .http
            .post(self.endpoint(PROCESS_TICKET))
            .header(ACCEPT, "text/event-stream")
            .json(ticket)
            .send()
            .await
            .map_err(|e| transport(PROCESS_TICKET, e))?;
        let response = check_status(PROCESS_TICKET, response)?;

        let chunks = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| transport(PROCESS_TICKET, e))
        });
        Ok(Box::pin(chunks))
    }

    async fn fetch_output(&self) -> DashboardResult<serde_json::Value> {
        self.get_json(OUTPUT).await
    }

    async fn load_sample(&self) -> DashboardResult<Ticket> {
        self.get_json(LOAD_SAMPLE).await
    }

    async fn fetch_ui_config(&self) -> DashboardResult<UiConfig> {
        self.get_json(UI_CONFIG).await
    }

    async fn preview_search(
        &self,
        request: &SearchPreviewRequest,
    ) -> DashboardResult<SearchPreviewResponse> {
        self.post_json(PREVIEW_SEARCH, request).await
    }

    async fn load_search_config(&self) -> DashboardResult<SearchConfig> {
        self.get_json(LOAD_SEARCH_CONFIG).await
    }

    async fn save_search_config(&self, config: &SearchConfig) -> DashboardResult<()> {
        self.send(
            SAVE_SEARCH_CONFIG,
            self.http.post(self.endpoint(SAVE_SEARCH_CONFIG)).json(config),
        )
        .await?;
        tracing::info!("search config saved");
        Ok(())
    }

    async fn fetch_prompts(&self) -> DashboardResult<PromptTemplates> {
        self.get_json(PROMPTS).await
    }

    async fn download_csv(&self) -> DashboardResult<Vec<u8>> {
        let response = self
            .send(DOWNLOAD_CSV, self.http.get(self.endpoint(DOWNLOAD_CSV)))
            .await?;
        let bytes = response.bytes().await.map_err(|e| transport(DOWNLOAD_CSV, e))?;
        Ok(bytes.to_vec())
    }
}
