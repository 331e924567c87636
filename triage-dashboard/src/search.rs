//! Search-tuning state: edits to the backend's [`SearchConfig`] and the
//! results of the last preview search.

use std::collections::HashSet;
use triage_dashboard_sdk::{
    Priority, SearchConfig, SearchMetadata, SearchPreviewRequest, SearchPreviewResponse,
    SimilarTicketPreview,
};

use crate::format::first_line_or;

pub const TOP_K_RANGE: (u32, u32) = (5, 50);
pub const VECTOR_WEIGHT_STEP: f64 = 0.05;
pub const PRIORITY_WEIGHT_STEP: f64 = 0.1;
pub const TIME_NORMALIZATION_RANGE: (f64, f64) = (10.0, 500.0);
pub const TIME_NORMALIZATION_STEP: f64 = 10.0;

/// Domain filter choices offered by the tuning panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainFilter {
    Auto,
    Mm,
    Ciw,
    Specialty,
}

impl DomainFilter {
    pub const ALL: [DomainFilter; 4] = [
        DomainFilter::Auto,
        DomainFilter::Mm,
        DomainFilter::Ciw,
        DomainFilter::Specialty,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DomainFilter::Auto => "Auto-detect",
            DomainFilter::Mm => "MM",
            DomainFilter::Ciw => "CIW",
            DomainFilter::Specialty => "Specialty",
        }
    }

    /// Value sent to the backend. Auto means "let the backend decide".
    pub fn wire_value(self) -> Option<String> {
        match self {
            DomainFilter::Auto => None,
            other => Some(other.label().to_string()),
        }
    }

    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("MM") => DomainFilter::Mm,
            Some("CIW") => DomainFilter::Ciw,
            Some("Specialty") => DomainFilter::Specialty,
            _ => DomainFilter::Auto,
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|d| *d == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Self {
        let idx = Self::ALL.iter().position(|d| *d == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Parse a domain name given on the command line
pub fn parse_domain(value: &str) -> Option<DomainFilter> {
    match value.to_ascii_lowercase().as_str() {
        "auto" | "" => Some(DomainFilter::Auto),
        "mm" => Some(DomainFilter::Mm),
        "ciw" => Some(DomainFilter::Ciw),
        "specialty" => Some(DomainFilter::Specialty),
        _ => None,
    }
}

/// Round to two decimals, as the weights are displayed
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Editable search configuration plus the last preview
#[derive(Debug, Clone, Default)]
pub struct SearchTuning {
    pub config: SearchConfig,
    pub query: String,
    pub results: Vec<SimilarTicketPreview>,
    pub metadata: Option<SearchMetadata>,
    pub expanded: HashSet<String>,
    pub selected_result: usize,
    pub last_error: Option<String>,
    /// Unsaved edits since the last load or save
    pub dirty: bool,
}

impl SearchTuning {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_top_k(&mut self, top_k: u32) {
        self.config.top_k = top_k.clamp(TOP_K_RANGE.0, TOP_K_RANGE.1);
        self.dirty = true;
    }

    pub fn adjust_top_k(&mut self, delta: i64) {
        let next = (self.config.top_k as i64 + delta).max(0) as u32;
        self.set_top_k(next);
    }

    /// Set the vector weight. The metadata weight follows as the complement.
    pub fn set_vector_weight(&mut self, weight: f64) {
        if !weight.is_finite() {
            tracing::warn!(weight, "ignoring non-finite vector weight");
            return;
        }
        let snapped = (weight.clamp(0.0, 1.0) / VECTOR_WEIGHT_STEP).round() * VECTOR_WEIGHT_STEP;
        let vector = round2(snapped);
        self.config.vector_weight = vector;
        self.config.metadata_weight = round2(1.0 - vector);
        self.dirty = true;
    }

    pub fn adjust_vector_weight(&mut self, steps: i32) {
        let weight = self.config.vector_weight + steps as f64 * VECTOR_WEIGHT_STEP;
        self.set_vector_weight(weight);
    }

    pub fn set_priority_weight(&mut self, priority: Priority, weight: f64) {
        if !weight.is_finite() {
            tracing::warn!(weight, ?priority, "ignoring non-finite priority weight");
            return;
        }
        let snapped = (weight.clamp(0.0, 1.0) / PRIORITY_WEIGHT_STEP).round() * PRIORITY_WEIGHT_STEP;
        self.config.priority_weights.set(priority, round2(snapped));
        self.dirty = true;
    }

    pub fn adjust_priority_weight(&mut self, priority: Priority, steps: i32) {
        let weight = self.config.priority_weights.get(priority) + steps as f64 * PRIORITY_WEIGHT_STEP;
        self.set_priority_weight(priority, weight);
    }

    pub fn set_time_normalization(&mut self, hours: f64) {
        if !hours.is_finite() {
            tracing::warn!(hours, "ignoring non-finite time normalization");
            return;
        }
        let (min, max) = TIME_NORMALIZATION_RANGE;
        let snapped = (hours.clamp(min, max) / TIME_NORMALIZATION_STEP).round() * TIME_NORMALIZATION_STEP;
        self.config.time_normalization_hours = snapped;
        self.dirty = true;
    }

    pub fn adjust_time_normalization(&mut self, steps: i32) {
        let hours = self.config.time_normalization_hours + steps as f64 * TIME_NORMALIZATION_STEP;
        self.set_time_normalization(hours);
    }

    pub fn domain_filter(&self) -> DomainFilter {
        DomainFilter::from_wire(self.config.domain_filter.as_deref())
    }

    pub fn set_domain_filter(&mut self, filter: DomainFilter) {
        self.config.domain_filter = filter.wire_value();
        self.dirty = true;
    }

    pub fn cycle_domain(&mut self, forward: bool) {
        let current = self.domain_filter();
        let next = if forward { current.next() } else { current.previous() };
        self.set_domain_filter(next);
    }

    /// Replace the config with one loaded from the backend
    pub fn load_config(&mut self, config: SearchConfig) {
        self.config = config;
        self.dirty = false;
    }

    /// The backend stored `saved`. Edits made while the save was in flight
    /// stay dirty.
    pub fn mark_saved(&mut self, saved: &SearchConfig) {
        if self.config == *saved {
            self.dirty = false;
        }
    }

    pub fn reset_to_defaults(&mut self) {
        self.config = SearchConfig::default();
        self.dirty = true;
    }

    /// Request for `/api/preview-search`, or `None` for a blank query
    pub fn preview_request(&self) -> Option<SearchPreviewRequest> {
        build_preview_request(&self.query, &self.config)
    }

    pub fn apply_preview(&mut self, response: SearchPreviewResponse) {
        self.results = response.similar_tickets;
        self.metadata = Some(response.search_metadata);
        self.expanded.clear();
        self.selected_result = 0;
        self.last_error = None;
    }

    pub fn preview_failed(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    pub fn toggle_expanded(&mut self, ticket_id: &str) {
        if !self.expanded.remove(ticket_id) {
            self.expanded.insert(ticket_id.to_string());
        }
    }

    pub fn is_expanded(&self, ticket_id: &str) -> bool {
        self.expanded.contains(ticket_id)
    }

    pub fn select_next(&mut self) {
        if !self.results.is_empty() {
            self.selected_result = (self.selected_result + 1).min(self.results.len() - 1);
        }
    }

    pub fn select_previous(&mut self) {
        self.selected_result = self.selected_result.saturating_sub(1);
    }

    pub fn selected(&self) -> Option<&SimilarTicketPreview> {
        self.results.get(self.selected_result)
    }
}

/// Title is the first line of the query, description the whole query
pub fn build_preview_request(query: &str, config: &SearchConfig) -> Option<SearchPreviewRequest> {
    if query.trim().is_empty() {
        return None;
    }
    Some(SearchPreviewRequest {
        title: first_line_or(query, "Query").to_string(),
        description: query.to_string(),
        config: config.clone(),
    })
}
