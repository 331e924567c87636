//! JSON exports of run artifacts and preview results

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use triage_dashboard_sdk::{SearchConfig, SearchMetadata, SimilarTicketPreview, WorkflowRun};

/// Document written by [`export_preview`]
#[derive(Debug, Serialize)]
pub struct RetrievalExport<'a> {
    pub query: &'a str,
    pub config: &'a SearchConfig,
    pub search_metadata: Option<&'a SearchMetadata>,
    pub similar_tickets: &'a [SimilarTicketPreview],
    pub exported_at: DateTime<Local>,
}

/// `ticket_resolution_<ticket id>.json`. The id comes from the artifact's
/// `ticket_id`, then the submitted ticket, then `output`.
pub fn artifact_file_name(run: &WorkflowRun) -> String {
    let from_artifact = run
        .final_artifact
        .as_ref()
        .and_then(|artifact| artifact.get("ticket_id"))
        .and_then(|id| id.as_str());
    let from_ticket = run.ticket.as_ref().map(|t| t.ticket_id.as_str());
    let id = from_artifact
        .filter(|id| !id.is_empty())
        .or(from_ticket.filter(|id| !id.is_empty()))
        .unwrap_or("output");
    format!("ticket_resolution_{}.json", sanitize(id))
}

pub fn preview_file_name(at: DateTime<Local>) -> String {
    format!("retrieval_results_{}.json", at.format("%Y-%m-%d"))
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write the run's final artifact into `dir`. Returns the written path.
pub fn export_artifact(run: &WorkflowRun, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(artifact_file_name(run));
    export_artifact_to(run, &path)?;
    Ok(path)
}

pub fn export_artifact_to(run: &WorkflowRun, path: &Path) -> Result<()> {
    let artifact = run
        .final_artifact
        .as_ref()
        .context("The run has no final output to export")?;
    write_json(path, artifact)?;
    tracing::info!(path = %path.display(), "exported final output");
    Ok(())
}

/// Write the preview results into `dir`. Returns the written path.
pub fn export_preview(
    query: &str,
    config: &SearchConfig,
    metadata: Option<&SearchMetadata>,
    results: &[SimilarTicketPreview],
    dir: &Path,
) -> Result<PathBuf> {
    let now = Local::now();
    let path = dir.join(preview_file_name(now));
    export_preview_to(query, config, metadata, results, now, &path)?;
    Ok(path)
}

pub fn export_preview_to(
    query: &str,
    config: &SearchConfig,
    metadata: Option<&SearchMetadata>,
    results: &[SimilarTicketPreview],
    exported_at: DateTime<Local>,
    path: &Path,
) -> Result<()> {
    let document = RetrievalExport {
        query,
        config,
        search_metadata: metadata,
        similar_tickets: results,
        exported_at,
    };
    write_json(path, &document)?;
    tracing::info!(path = %path.display(), results = results.len(), "exported retrieval results");
    Ok(())
}

/// Save CSV bytes as-is
pub fn write_csv(bytes: &[u8], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
