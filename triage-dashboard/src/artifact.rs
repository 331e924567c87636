//! Typed view of the final artifact's resolution plan
//!
//! The artifact from `/api/output` is kept as raw JSON on the run. When it
//! carries a `resolution_plan`, this module reads the parts the output pane
//! shows. Missing or unexpected fields fall back to defaults; anything that
//! does not parse at all is shown as pretty JSON instead.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResolutionStep {
    pub step_number: u32,
    pub description: String,
    pub commands: Vec<String>,
    pub validation: String,
    pub estimated_time_minutes: f64,
    pub risk_level: String,
    pub rollback_procedure: String,
    pub source_ticket: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlanReference {
    pub ticket_id: String,
    pub similarity: f64,
    pub note: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlanWarning {
    pub severity: String,
    pub message: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResolutionPlan {
    pub summary: String,
    pub resolution_steps: Vec<ResolutionStep>,
    pub additional_considerations: Vec<String>,
    pub references: Vec<PlanReference>,
    pub total_estimated_time_hours: f64,
    pub confidence: f64,
    pub alternative_approaches: Vec<String>,
    pub warnings: Vec<PlanWarning>,
}

/// The artifact fields the output pane shows next to the plan
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionOutput {
    pub ticket_id: Option<String>,
    pub plan: ResolutionPlan,
    pub novelty_detected: bool,
    pub novelty_recommendation: Option<String>,
}

impl ResolutionOutput {
    /// `None` when the artifact has no usable `resolution_plan`
    pub fn from_artifact(artifact: &Value) -> Option<Self> {
        let raw = artifact.get("resolution_plan")?;
        let plan = match ResolutionPlan::deserialize(raw) {
            Ok(plan) => plan,
            Err(err) => {
                tracing::debug!(error = %err, "resolution_plan has an unexpected shape");
                return None;
            }
        };

        Some(Self {
            ticket_id: artifact
                .get("ticket_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            plan,
            novelty_detected: artifact
                .get("novelty_detected")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            novelty_recommendation: artifact
                .get("novelty_recommendation")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}
