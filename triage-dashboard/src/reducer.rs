//! Folds decoded stream records into a [`WorkflowRun`]
//!
//! Records apply strictly in arrival order. Once a terminal record
//! (`workflow_complete` or a run-level `error`) has been applied, the
//! [`StreamReducer`] ignores everything after it, so the final state does not
//! depend on how the body was chunked.

use triage_dashboard_sdk::{
    RunOutcome, StageKey, StageState, StageStatus, StreamEvent, WorkflowRun, STATUS_COMPLETE,
    STATUS_ERROR, STATUS_PROCESSING, STATUS_STREAMING, WORKFLOW_COMPLETE,
};

use crate::format::display_json;
use crate::sse::SseDecoder;

/// Separator between the streamed text and the final payload of a stage
pub const FINAL_OUTPUT_DIVIDER: &str = "\n\n--- Final Output ---\n";

pub const NO_DATA: &str = "No data available";

const STREAMING_DEFAULT_PROGRESS: f64 = 50.0;

/// What applying one record did to the run
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// The stage and the status it was left in by this record
    Stage(StageKey, StageStatus),
    WorkflowComplete { output_available: bool },
    RunFailed(String),
    Ignored,
}

impl Applied {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Applied::WorkflowComplete { .. } | Applied::RunFailed(_))
    }
}

/// Apply one record to `run`
pub fn apply_event(run: &mut WorkflowRun, event: StreamEvent) -> Applied {
    let StreamEvent {
        agent,
        status,
        message,
        progress,
        data,
        tool_calls,
        tool_outputs,
        output_available,
    } = event;
    let status = status.unwrap_or_default();

    if status == WORKFLOW_COMPLETE {
        let output_available = output_available.unwrap_or(false);
        run.finish(Some(RunOutcome::Completed { output_available }));
        return Applied::WorkflowComplete { output_available };
    }

    if let Some(key) = agent {
        // Unknown stages get an entry even when the status is not understood
        let stage = run.stages.entry(key.clone());
        return match status.as_str() {
            STATUS_PROCESSING => {
                stage.status = StageStatus::Processing;
                stage.progress = clamp_progress(progress.unwrap_or(0.0));
                stage.accumulated_text = message.unwrap_or_default();
                stage.error_detail = None;
                Applied::Stage(key, StageStatus::Processing)
            }
            STATUS_STREAMING => {
                stage.status = StageStatus::Streaming;
                stage.progress = clamp_progress(
                    progress
                        .filter(|p| *p > 0.0)
                        .unwrap_or(STREAMING_DEFAULT_PROGRESS),
                );
                stage.error_detail = None;
                append_fragment(stage, message.as_deref().unwrap_or_default());
                if let Some(calls) = tool_calls.filter(|calls| !calls.is_empty()) {
                    stage.tool_calls = calls;
                }
                if let Some(outputs) = tool_outputs.filter(|outputs| !outputs.is_empty()) {
                    stage.tool_outputs = outputs;
                }
                Applied::Stage(key, StageStatus::Streaming)
            }
            STATUS_COMPLETE => {
                complete_stage(stage, data);
                Applied::Stage(key, StageStatus::Complete)
            }
            STATUS_ERROR => {
                stage.status = StageStatus::Error;
                stage.error_detail = Some(message.unwrap_or_else(|| "Stage failed".to_string()));
                Applied::Stage(key, StageStatus::Error)
            }
            other => {
                tracing::debug!(stage = %key, status = other, "ignoring unknown stage status");
                Applied::Ignored
            }
        };
    }

    if status == STATUS_ERROR {
        let message = message.unwrap_or_else(|| "Workflow failed".to_string());
        run.run_error = Some(message.clone());
        run.finish(Some(RunOutcome::Failed {
            message: message.clone(),
        }));
        return Applied::RunFailed(message);
    }

    Applied::Ignored
}

fn append_fragment(stage: &mut StageState, fragment: &str) {
    if fragment.is_empty() || stage.accumulated_text.contains(fragment) {
        return;
    }
    if stage.accumulated_text.is_empty() {
        stage.accumulated_text.push_str(fragment);
    } else {
        stage.accumulated_text.push('\n');
        stage.accumulated_text.push_str(fragment);
    }
}

fn complete_stage(stage: &mut StageState, data: Option<serde_json::Value>) {
    let display = match data {
        Some(value) if !value.is_null() => display_json(&value),
        _ => NO_DATA.to_string(),
    };

    if stage.final_output.is_none() {
        let streamed = std::mem::take(&mut stage.accumulated_text);
        stage.final_output = Some(if streamed.is_empty() {
            display
        } else {
            format!("{}{}{}", streamed, FINAL_OUTPUT_DIVIDER, display)
        });
    }

    stage.status = StageStatus::Complete;
    stage.progress = 100;
    stage.accumulated_text.clear();
    stage.error_detail = None;
}

fn clamp_progress(progress: f64) -> u8 {
    if progress.is_nan() {
        return 0;
    }
    progress.clamp(0.0, 100.0).round() as u8
}

/// Fail the run after a transport error.
///
/// The error is also shown on the first stage of the processing order so the
/// stage cards reflect it.
pub fn fail_transport(run: &mut WorkflowRun, message: &str) {
    let first = run.stages.keys().next().cloned();
    if let Some(first) = first {
        let stage = run.stages.entry(first);
        stage.status = StageStatus::Error;
        stage.error_detail = Some(message.to_string());
    }
    run.run_error = Some(message.to_string());
    run.finish(Some(RunOutcome::Failed {
        message: message.to_string(),
    }));
}

/// The stream closed without a terminal record: keep partial state, no outcome
pub fn finish_without_terminal(run: &mut WorkflowRun) {
    run.finish(None);
}

pub fn mark_cancelled(run: &mut WorkflowRun) {
    if !run.is_terminal() {
        run.finish(Some(RunOutcome::Cancelled));
    } else {
        run.in_progress = false;
    }
}

/// Decoder plus fold for one run's stream
#[derive(Debug, Default)]
pub struct StreamReducer {
    decoder: SseDecoder,
    terminal: Option<Applied>,
}

impl StreamReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk` and apply its records until a terminal record
    pub fn feed(&mut self, run: &mut WorkflowRun, chunk: &[u8]) -> Vec<Applied> {
        if self.terminal.is_some() {
            return Vec::new();
        }
        let events = self.decoder.push(chunk);
        let applied = self.apply_all(run, events);
        run.dropped_records = self.decoder.malformed_count();
        applied
    }

    /// The body ended. Applies a trailing record and, when no terminal record
    /// was seen, marks the run finished without an outcome.
    pub fn close(&mut self, run: &mut WorkflowRun) -> Vec<Applied> {
        let mut applied = Vec::new();
        if self.terminal.is_none() {
            let trailing = self.decoder.finish();
            applied = self.apply_all(run, trailing.into_iter().collect());
            run.dropped_records = self.decoder.malformed_count();
        }
        if self.terminal.is_none() {
            finish_without_terminal(run);
        }
        applied
    }

    pub fn terminal(&self) -> Option<&Applied> {
        self.terminal.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    pub fn malformed_count(&self) -> usize {
        self.decoder.malformed_count()
    }

    fn apply_all(&mut self, run: &mut WorkflowRun, events: Vec<StreamEvent>) -> Vec<Applied> {
        let mut applied = Vec::with_capacity(events.len());
        for event in events {
            let result = apply_event(run, event);
            if result.is_terminal() {
                self.terminal = Some(result.clone());
                applied.push(result);
                break;
            }
            applied.push(result);
        }
        applied
    }
}
