use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use triage_dashboard::app::App;
use triage_dashboard::client::BackendClient;
use triage_dashboard::config::DashboardConfig;
use triage_dashboard::export;
use triage_dashboard::format::{percent, ticket_as_text};
use triage_dashboard::logging::{self, LogTarget};
use triage_dashboard::runtime::{RunManager, RunUpdate};
use triage_dashboard::search::{parse_domain, SearchTuning};
use triage_dashboard::sdk::{
    PromptGroup, RunOutcome, SearchConfig, Ticket, TriageBackend, WorkflowRun,
};
use triage_dashboard::ui::ui;

#[derive(Parser, Debug)]
#[command(name = "triage-dashboard", version, about = "Dashboard for the ticket triage workflow")]
struct Cli {
    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Debug, Default)]
struct ConfigOverrides {
    /// Backend base URL
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Timeout in seconds for non-streaming requests
    #[arg(long, global = true)]
    request_timeout: Option<u64>,

    /// Fail a run whose stream is silent this many seconds (0 disables)
    #[arg(long, global = true)]
    stream_idle_timeout: Option<u64>,

    /// Directory for exported files
    #[arg(long, global = true)]
    export_dir: Option<PathBuf>,
}

impl ConfigOverrides {
    fn apply(self, config: &mut DashboardConfig) {
        if let Some(url) = self.backend_url {
            config.backend_url = url;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(secs) = self.request_timeout {
            config.request_timeout_secs = secs;
        }
        if let Some(secs) = self.stream_idle_timeout {
            config.stream_idle_timeout_secs = (secs > 0).then_some(secs);
        }
        if let Some(dir) = self.export_dir {
            config.export_dir = Some(dir);
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive dashboard (default)
    Tui,
    /// Run one ticket through the workflow and print stage transitions
    Submit(SubmitArgs),
    /// Preview the similar-ticket search
    Search(SearchArgs),
    /// Show or change the backend's search config
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print the backend's sample ticket
    Sample,
    /// Print the prompt templates
    Prompts,
    /// Save the backend's ticket CSV
    DownloadCsv {
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("source").required(true).args(["text", "file", "sample"])))]
struct SubmitArgs {
    /// Ticket text. The first line becomes the title.
    #[arg(long)]
    text: Option<String>,

    /// Read the ticket text from a file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Submit the backend's sample ticket
    #[arg(long)]
    sample: bool,

    /// Print the final run as JSON
    #[arg(long)]
    json: bool,

    /// Write the final output to this path
    #[arg(long)]
    export: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SearchArgs {
    #[arg(long)]
    query: String,

    #[arg(long)]
    top_k: Option<u32>,

    #[arg(long, value_parser = parse_finite)]
    vector_weight: Option<f64>,

    /// auto, mm, ciw or specialty
    #[arg(long)]
    domain: Option<String>,

    /// Write the results to this path
    #[arg(long)]
    export: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the current search config
    Show,
    /// Change fields of the search config and save it
    Save {
        #[arg(long)]
        top_k: Option<u32>,
        #[arg(long, value_parser = parse_finite)]
        vector_weight: Option<f64>,
        #[arg(long, value_parser = parse_finite)]
        time_normalization: Option<f64>,
        #[arg(long)]
        domain: Option<String>,
    },
    /// Save the default search config
    Reset,
}

fn parse_finite(value: &str) -> std::result::Result<f64, String> {
    match value.parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(number),
        Ok(_) => Err("expected a finite number".to_string()),
        Err(err) => Err(err.to_string()),
    }
}

fn main() -> Result<()> {
    // .env may hold TRIAGE_* overrides
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let mut config = DashboardConfig::load()?;
    cli.overrides.apply(&mut config);

    match cli.command.unwrap_or(Command::Tui) {
        Command::Tui => {
            logging::init(&config.log_level, &LogTarget::tui_default())?;
            run_tui(config)
        }
        command => {
            logging::init(&config.log_level, &LogTarget::Stderr)?;
            let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
            runtime.block_on(run_headless(config, command))
        }
    }
}

// ============================================================================
// TUI
// ============================================================================

fn run_tui(config: DashboardConfig) -> Result<()> {
    let mut app = App::new(config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run main loop
    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app.shutdown();

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        app.tick();

        terminal.draw(|f| ui(f, app))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

// ============================================================================
// Headless commands
// ============================================================================

async fn run_headless(config: DashboardConfig, command: Command) -> Result<()> {
    let client = BackendClient::from_config(&config).context("Failed to build HTTP client")?;
    let backend: Arc<dyn TriageBackend> = Arc::new(client);

    match command {
        Command::Tui => bail!("the TUI cannot run inside a headless command"),
        Command::Submit(args) => submit(&config, backend, args).await,
        Command::Search(args) => search(backend.as_ref(), args).await,
        Command::Config { action } => search_config(backend.as_ref(), action).await,
        Command::Sample => {
            let ticket = backend.load_sample().await?;
            println!("{}", ticket_as_text(&ticket));
            Ok(())
        }
        Command::Prompts => print_prompts(backend.as_ref()).await,
        Command::DownloadCsv { out } => {
            let bytes = backend.download_csv().await?;
            export::write_csv(&bytes, &out)?;
            println!("Saved {} bytes to {}", bytes.len(), out.display());
            Ok(())
        }
    }
}

async fn read_ticket(backend: &dyn TriageBackend, args: &SubmitArgs) -> Result<Ticket> {
    if args.sample {
        return Ok(backend.load_sample().await?);
    }
    let text = match (&args.text, &args.file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ticket file {}", path.display()))?,
        (None, None) => bail!("one of --text, --file or --sample is required"),
    };
    Ticket::from_free_text(&text).ok_or_else(|| anyhow!("The ticket text is empty"))
}

async fn submit(config: &DashboardConfig, backend: Arc<dyn TriageBackend>, args: SubmitArgs) -> Result<()> {
    let runs = RunManager::new(backend.clone(), tokio::runtime::Handle::current())
        .with_stream_idle_timeout(config.stream_idle_timeout());

    if let Err(err) = runs.configure_from_backend().await {
        tracing::warn!(error = %err, "using the default stage order");
    }

    let ticket = read_ticket(backend.as_ref(), &args).await?;
    println!("Submitting {}: {}", ticket.ticket_id, ticket.title);

    let mut updates = runs.subscribe();
    runs.start(ticket)?;

    let printer = async {
        while let Ok(update) = updates.recv().await {
            print_update(&runs, &update);
        }
    };

    tokio::select! {
        _ = runs.wait() => {}
        _ = printer => {}
        _ = tokio::signal::ctrl_c() => {
            runs.cancel();
            runs.wait().await;
        }
    }
    // Updates published just before the task ended
    loop {
        match updates.try_recv() {
            Ok(update) => print_update(&runs, &update),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }

    let run = runs.snapshot();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    }
    if let Some(path) = &args.export {
        export::export_artifact_to(&run, path)?;
        println!("Exported final output to {}", path.display());
    }

    run_result(&run)
}

fn print_update(runs: &RunManager, update: &RunUpdate) {
    match update {
        RunUpdate::Started { run_id } => println!("Run {} started", run_id),
        RunUpdate::StageChanged { stage, status, .. } => {
            let run = runs.snapshot();
            let detail = run
                .stage(stage)
                .and_then(|state| state.error_detail.clone())
                .map(|e| format!(": {}", e))
                .unwrap_or_default();
            println!(
                "{} {} {}{}",
                triage_dashboard::ui::status_icon(*status),
                stage.display_name(),
                status.label(),
                detail
            );
        }
        RunUpdate::Finished { outcome, .. } => match outcome {
            Some(RunOutcome::Completed { .. }) => println!("Workflow complete"),
            Some(RunOutcome::Failed { message }) => println!("Workflow failed: {}", message),
            Some(RunOutcome::Cancelled) => println!("Workflow cancelled"),
            None => println!("Stream ended without completion"),
        },
        RunUpdate::ArtifactLoaded { .. } => println!("Final output loaded"),
        RunUpdate::ArtifactFailed { message, .. } => {
            println!("Could not load final output: {}", message)
        }
    }
}

fn run_result(run: &WorkflowRun) -> Result<()> {
    match &run.outcome {
        Some(RunOutcome::Failed { message }) => bail!("workflow failed: {}", message),
        Some(RunOutcome::Cancelled) => bail!("workflow cancelled"),
        _ => Ok(()),
    }
}

fn apply_domain(tuning: &mut SearchTuning, domain: &str) -> Result<()> {
    let filter = parse_domain(domain)
        .ok_or_else(|| anyhow!("Unknown domain '{}' (expected auto, mm, ciw or specialty)", domain))?;
    tuning.set_domain_filter(filter);
    Ok(())
}

async fn search(backend: &dyn TriageBackend, args: SearchArgs) -> Result<()> {
    let mut tuning = SearchTuning::new();
    match backend.load_search_config().await {
        Ok(config) => tuning.load_config(config),
        Err(err) => tracing::warn!(error = %err, "using the default search config"),
    }
    if let Some(top_k) = args.top_k {
        tuning.set_top_k(top_k);
    }
    if let Some(weight) = args.vector_weight {
        tuning.set_vector_weight(weight);
    }
    if let Some(domain) = &args.domain {
        apply_domain(&mut tuning, domain)?;
    }
    tuning.query = args.query;

    let request = tuning
        .preview_request()
        .ok_or_else(|| anyhow!("The query is empty"))?;
    let response = backend.preview_search(&request).await?;
    tuning.apply_preview(response);

    if let Some(meta) = &tuning.metadata {
        println!(
            "Domain {}  found {}  avg {}  top {}",
            meta.query_domain,
            meta.total_found,
            percent(meta.avg_similarity),
            percent(meta.top_similarity)
        );
    }
    for (idx, ticket) in tuning.results.iter().enumerate() {
        println!(
            "{:>2}. {} {} ({}, {})",
            idx + 1,
            percent(ticket.similarity_score),
            ticket.ticket_id,
            ticket.title,
            ticket.domain
        );
    }

    if let Some(path) = &args.export {
        export::export_preview_to(
            &tuning.query,
            &tuning.config,
            tuning.metadata.as_ref(),
            &tuning.results,
            chrono::Local::now(),
            path,
        )?;
        println!("Exported results to {}", path.display());
    }
    Ok(())
}

async fn search_config(backend: &dyn TriageBackend, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = backend.load_search_config().await?;
            println!("{}", serde_yaml::to_string(&config)?);
        }
        ConfigAction::Save {
            top_k,
            vector_weight,
            time_normalization,
            domain,
        } => {
            let mut tuning = SearchTuning::new();
            tuning.load_config(backend.load_search_config().await?);
            if let Some(top_k) = top_k {
                tuning.set_top_k(top_k);
            }
            if let Some(weight) = vector_weight {
                tuning.set_vector_weight(weight);
            }
            if let Some(hours) = time_normalization {
                tuning.set_time_normalization(hours);
            }
            if let Some(domain) = &domain {
                apply_domain(&mut tuning, domain)?;
            }
            backend.save_search_config(&tuning.config).await?;
            println!("{}", serde_yaml::to_string(&tuning.config)?);
        }
        ConfigAction::Reset => {
            backend.save_search_config(&SearchConfig::default()).await?;
            println!("Search config reset to defaults");
        }
    }
    Ok(())
}

async fn print_prompts(backend: &dyn TriageBackend) -> Result<()> {
    let prompts = backend.fetch_prompts().await?;
    for (stage, group) in &prompts {
        println!("== {} ==", stage);
        match group {
            PromptGroup::Single(template) => println!("{}\n", template.template),
            PromptGroup::Named(named) => {
                for (name, template) in named {
                    println!("-- {} --\n{}\n", name, template.template);
                }
            }
        }
    }
    Ok(())
}
