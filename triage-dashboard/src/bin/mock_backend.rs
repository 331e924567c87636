//! Simulated triage backend for demos and manual testing
//!
//! Serves every dashboard endpoint with canned data and streams the
//! five-stage workflow with a delay between events.

use anyhow::Result;
use clap::Parser;
use std::time::Duration;

use triage_dashboard::logging::{self, LogTarget};
use triage_dashboard::mock_backend::{MockOptions, MockServer};

#[derive(Parser, Debug)]
#[command(name = "triage-mock-backend", version, about = "Mock triage backend")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8000")]
    addr: String,

    /// Delay between streamed events in milliseconds
    #[arg(long, default_value_t = 300)]
    delay_ms: u64,

    /// Report that domain classification is skipped
    #[arg(long)]
    skip_classification: bool,

    /// Answer /api/output with a server error
    #[arg(long)]
    fail_output: bool,

    /// Answer /api/process-ticket with a server error
    #[arg(long)]
    fail_process_ticket: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(&args.log_level, &LogTarget::Stderr)?;

    let options = MockOptions {
        skip_domain_classification: args.skip_classification,
        fail_output: args.fail_output,
        fail_process_ticket: args.fail_process_ticket,
        ..MockOptions::default()
    }
    .with_delay(Duration::from_millis(args.delay_ms));

    let server = MockServer::spawn(&args.addr, options).await?;
    println!("Mock backend listening on {}", server.base_url());
    server.join().await;
    Ok(())
}
