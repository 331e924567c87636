// SSE decoding module
pub mod sse;

// Stream record fold
pub mod reducer;

// HTTP backend client
pub mod client;

// Run manager
pub mod runtime;

// Search tuning
pub mod search;

pub mod artifact;
pub mod export;
pub mod format;
pub mod taxonomy;

// Configuration and logging
pub mod config;
pub mod logging;

// Simulated backend for demos and tests
pub mod mock_backend;

// TUI state and rendering
pub mod app;
pub mod ui;

pub use triage_dashboard_sdk as sdk;
