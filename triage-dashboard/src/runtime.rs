//! Run manager: owns the current [`WorkflowRun`] and the task that consumes
//! its event stream.
//!
//! The stream task is the only writer of the shared run. Renderers poll
//! [`RunManager::snapshot`] each frame and may subscribe to [`RunUpdate`]s.

use futures::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use triage_dashboard_sdk::{
    ByteChunkStream, DashboardError, DashboardResult, RunOutcome, StageKey, StageStatus, Ticket,
    TriageBackend, UiConfig, WorkflowRun,
};
use uuid::Uuid;

use crate::reducer::{self, Applied, StreamReducer};

/// Notifications published while a run progresses
#[derive(Debug, Clone, PartialEq)]
pub enum RunUpdate {
    Started {
        run_id: Uuid,
    },
    StageChanged {
        run_id: Uuid,
        stage: StageKey,
        status: StageStatus,
    },
    Finished {
        run_id: Uuid,
        outcome: Option<RunOutcome>,
    },
    ArtifactLoaded {
        run_id: Uuid,
    },
    ArtifactFailed {
        run_id: Uuid,
        message: String,
    },
}

/// Everything the stream task needs, moved into it at spawn
struct RunContext {
    run_id: Uuid,
    ticket: Ticket,
    backend: Arc<dyn TriageBackend>,
    run: Arc<Mutex<WorkflowRun>>,
    updates: broadcast::Sender<RunUpdate>,
    token: CancellationToken,
    idle_timeout: Option<Duration>,
}

/// Single-flight manager for ticket runs
pub struct RunManager {
    backend: Arc<dyn TriageBackend>,
    handle: Handle,
    run: Arc<Mutex<WorkflowRun>>,
    stage_order: Mutex<Vec<StageKey>>,
    active_token: Mutex<Option<CancellationToken>>,
    /// Flips to true when the active stream task exits
    active_done: Mutex<Option<watch::Receiver<bool>>>,
    updates: broadcast::Sender<RunUpdate>,
    stream_idle_timeout: Option<Duration>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RunManager {
    /// Create a manager whose stream tasks run on `handle`
    pub fn new(backend: Arc<dyn TriageBackend>, handle: Handle) -> Self {
        let order = StageKey::pipeline();
        // Capacity 1000 keeps slow observers from lagging on chatty runs
        let (updates, _) = broadcast::channel(1000);

        Self {
            backend,
            handle,
            run: Arc::new(Mutex::new(WorkflowRun::idle(&order))),
            stage_order: Mutex::new(order),
            active_token: Mutex::new(None),
            active_done: Mutex::new(None),
            updates,
            stream_idle_timeout: None,
        }
    }

    pub fn with_stream_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    pub fn backend(&self) -> Arc<dyn TriageBackend> {
        self.backend.clone()
    }

    pub fn stage_order(&self) -> Vec<StageKey> {
        lock(&self.stage_order).clone()
    }

    /// Change the processing order used by the next run. An idle run is
    /// rebuilt so the cards match immediately.
    pub fn set_stage_order(&self, order: Vec<StageKey>) {
        {
            let mut run = lock(&self.run);
            if !run.in_progress && run.started_at.is_none() {
                *run = WorkflowRun::idle(&order);
            }
        }
        *lock(&self.stage_order) = order;
    }

    /// Apply the backend's UI config to the stage order
    pub async fn configure_from_backend(&self) -> DashboardResult<UiConfig> {
        let config = self.backend.fetch_ui_config().await?;
        if config.skip_domain_classification {
            tracing::info!("backend skips domain classification");
        }
        self.set_stage_order(config.stage_order());
        Ok(config)
    }

    pub fn is_running(&self) -> bool {
        lock(&self.run).in_progress
    }

    /// Clone of the current run for rendering
    pub fn snapshot(&self) -> WorkflowRun {
        lock(&self.run).clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunUpdate> {
        self.updates.subscribe()
    }

    /// Submit `ticket` and start consuming its stream.
    ///
    /// Fails with [`DashboardError::RunInProgress`] while another run is active.
    pub fn start(&self, ticket: Ticket) -> DashboardResult<Uuid> {
        let order = self.stage_order();
        let run_id = {
            let mut run = lock(&self.run);
            if run.in_progress {
                return Err(DashboardError::RunInProgress);
            }
            *run = WorkflowRun::start(&order, ticket.clone());
            run.id
        };

        let token = CancellationToken::new();
        let context = RunContext {
            run_id,
            ticket,
            backend: self.backend.clone(),
            run: self.run.clone(),
            updates: self.updates.clone(),
            token: token.clone(),
            idle_timeout: self.stream_idle_timeout,
        };

        tracing::info!(%run_id, "starting workflow run");
        let (done_tx, done_rx) = watch::channel(false);
        self.handle.spawn(async move {
            drive_run(context).await;
            let _ = done_tx.send(true);
        });

        // A previous task may still be fetching its artifact
        if let Some(previous) = lock(&self.active_token).replace(token) {
            previous.cancel();
        }
        *lock(&self.active_done) = Some(done_rx);
        Ok(run_id)
    }

    /// Cancel the active run, if any. The stream task drops the response and
    /// marks the run cancelled.
    pub fn cancel(&self) {
        if let Some(token) = lock(&self.active_token).as_ref() {
            tracing::info!("cancelling workflow run");
            token.cancel();
        }
    }

    /// Wait for the active stream task to finish.
    ///
    /// Dropping the returned future early does not affect later calls.
    pub async fn wait(&self) {
        let done = lock(&self.active_done).clone();
        if let Some(mut done) = done {
            if done.wait_for(|finished| *finished).await.is_err() {
                tracing::error!("workflow stream task ended without finishing the run");
            }
        }
    }
}

impl Drop for RunManager {
    fn drop(&mut self) {
        if let Some(token) = lock(&self.active_token).take() {
            token.cancel();
        }
    }
}

enum StreamEnd {
    Terminal,
    Closed,
    Cancelled,
    Failed(DashboardError),
}

async fn next_chunk(
    stream: &mut ByteChunkStream,
    idle_timeout: Option<Duration>,
) -> DashboardResult<Option<Vec<u8>>> {
    let next = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, stream.next())
            .await
            .map_err(|_| DashboardError::StreamTimeout(limit))?,
        None => stream.next().await,
    };
    next.transpose()
}

fn publish(updates: &broadcast::Sender<RunUpdate>, update: RunUpdate) {
    // No subscribers is fine
    let _ = updates.send(update);
}

async fn drive_run(ctx: RunContext) {
    let RunContext {
        run_id,
        ticket,
        backend,
        run,
        updates,
        token,
        idle_timeout,
    } = ctx;

    publish(&updates, RunUpdate::Started { run_id });

    let opened = tokio::select! {
        biased;
        _ = token.cancelled() => Err(DashboardError::Cancelled),
        opened = backend.process_ticket(&ticket) => opened,
    };

    let mut stream = match opened {
        Ok(stream) => stream,
        Err(DashboardError::Cancelled) => {
            let outcome = {
                let mut run = lock(&run);
                reducer::mark_cancelled(&mut run);
                run.outcome.clone()
            };
            publish(&updates, RunUpdate::Finished { run_id, outcome });
            return;
        }
        Err(err) => {
            tracing::error!(%run_id, error = %err, "failed to open event stream");
            let outcome = {
                let mut run = lock(&run);
                reducer::fail_transport(&mut run, &err.to_string());
                run.outcome.clone()
            };
            publish(&updates, RunUpdate::Finished { run_id, outcome });
            return;
        }
    };

    let mut stream_reducer = StreamReducer::new();
    let end = loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => break StreamEnd::Cancelled,
            next = next_chunk(&mut stream, idle_timeout) => next,
        };

        match next {
            Ok(Some(chunk)) => {
                let changes = {
                    let mut run = lock(&run);
                    let applied = stream_reducer.feed(&mut run, &chunk);
                    stage_changes(run_id, applied)
                };
                for update in changes {
                    publish(&updates, update);
                }
                if stream_reducer.is_terminal() {
                    break StreamEnd::Terminal;
                }
            }
            Ok(None) => break StreamEnd::Closed,
            Err(err) => break StreamEnd::Failed(err),
        }
    };

    // Release the connection before any follow-up request
    drop(stream);

    let outcome = {
        let mut run = lock(&run);
        match &end {
            StreamEnd::Terminal => {}
            StreamEnd::Closed => {
                let applied = stream_reducer.close(&mut run);
                for update in stage_changes(run_id, applied) {
                    publish(&updates, update);
                }
                if !run.is_terminal() {
                    tracing::warn!(%run_id, "event stream closed without a terminal record");
                }
            }
            StreamEnd::Cancelled => reducer::mark_cancelled(&mut run),
            StreamEnd::Failed(err) => {
                tracing::error!(%run_id, error = %err, "event stream failed");
                reducer::fail_transport(&mut run, &err.to_string());
            }
        }
        if run.dropped_records > 0 {
            tracing::warn!(%run_id, dropped = run.dropped_records, "malformed records dropped");
        }
        run.outcome.clone()
    };

    tracing::info!(%run_id, outcome = ?outcome, "workflow run finished");
    publish(
        &updates,
        RunUpdate::Finished {
            run_id,
            outcome: outcome.clone(),
        },
    );

    if let Some(RunOutcome::Completed {
        output_available: true,
    }) = outcome
    {
        load_artifact(run_id, backend.as_ref(), &run, &updates, &token).await;
    }
}

/// Fetch the final artifact. Failure leaves the run complete.
async fn load_artifact(
    run_id: Uuid,
    backend: &dyn TriageBackend,
    run: &Mutex<WorkflowRun>,
    updates: &broadcast::Sender<RunUpdate>,
    token: &CancellationToken,
) {
    let fetched = tokio::select! {
        biased;
        _ = token.cancelled() => return,
        fetched = backend.fetch_output() => fetched,
    };

    match fetched {
        Ok(artifact) => {
            {
                let mut run = lock(run);
                if run.id != run_id {
                    return;
                }
                run.final_artifact = Some(artifact);
            }
            publish(updates, RunUpdate::ArtifactLoaded { run_id });
        }
        Err(err) => {
            tracing::error!(%run_id, error = %err, "failed to fetch final output");
            publish(
                updates,
                RunUpdate::ArtifactFailed {
                    run_id,
                    message: err.to_string(),
                },
            );
        }
    }
}

fn stage_changes(run_id: Uuid, applied: Vec<Applied>) -> Vec<RunUpdate> {
    applied
        .into_iter()
        .filter_map(|applied| match applied {
            Applied::Stage(stage, status) => Some(RunUpdate::StageChanged {
                run_id,
                stage,
                status,
            }),
            _ => None,
        })
        .collect()
}
