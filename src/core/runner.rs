// src/core/runner.rs

//! Drives the harvesting workflow across every configured server.
//!
//! Each server runs in its own task with its own connection, session and
//! cancellation token, so nothing that happens to one server (an error, a
//! panic, a cancellation) reaches another. Within a server, scans are handled
//! in catalog order and formats in canonical order, one at a time.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::console::{Reporter, Scope};
use crate::core::client::catalog::{self, EMPTY_CATALOG_WARNING};
use crate::core::client::export::{self, ExportOptions};
use crate::core::client::session::{self, Session};
use crate::core::client::transport::{Connector, Transport};
use crate::core::client::ServerContext;
use crate::core::error::ServerError;
use crate::core::models::{Credentials, ExportFormat, ServerTarget};
use crate::summary::{ExportFailure, RunSummary, ServerSummary};

/// Everything the runner needs besides the server list.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub credentials: Credentials,
    /// Formats to export, in the order they are attempted.
    pub formats: Vec<ExportFormat>,
    pub export: ExportOptions,
    /// Upper bound on servers processed at the same time.
    pub max_parallel_servers: usize,
}

pub struct ServerRunner<C: Connector> {
    connector: Arc<C>,
    settings: Arc<RunSettings>,
    reporter: Reporter,
}

impl<C: Connector> ServerRunner<C> {
    pub fn new(connector: C, settings: RunSettings, reporter: Reporter) -> Self {
        Self { connector: Arc::new(connector), settings: Arc::new(settings), reporter }
    }

    /// Processes every server and returns the run summary.
    ///
    /// Never fails: per-server problems are recorded in that server's summary.
    /// Summaries come back in the order `servers` were given.
    pub async fn run(&self, servers: &[ServerTarget], cancel: &CancellationToken) -> RunSummary {
        let started = Instant::now();
        let limit = Arc::new(Semaphore::new(self.settings.max_parallel_servers.max(1)));
        let mut tasks = JoinSet::new();

        info!(servers = servers.len(), parallel = self.settings.max_parallel_servers, "Starting report download phase.");

        for (index, target) in servers.iter().cloned().enumerate() {
            let connector = Arc::clone(&self.connector);
            let settings = Arc::clone(&self.settings);
            let reporter = self.reporter;
            let cancel = cancel.child_token();
            let limit = Arc::clone(&limit);

            tasks.spawn(async move {
                let _permit = limit.acquire_owned().await.ok();
                let started = Instant::now();

                // The inner task isolates panics so they become this server's outcome.
                let worker = tokio::spawn(process_server(connector, settings, reporter, target.clone(), cancel));
                let mut summary = match worker.await {
                    Ok(summary) => summary,
                    Err(join_error) => {
                        let detail = join_error.to_string();
                        reporter.error(Scope::server(&target.host), &format!("Unexpected failure: {detail}"));
                        let mut summary = ServerSummary::new(target);
                        summary.fail(ServerError::Unexpected(detail));
                        summary
                    }
                };
                summary.elapsed = started.elapsed();
                reporter.server_finished(&summary);
                (index, summary)
            });
        }

        let mut finished = Vec::with_capacity(servers.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => finished.push(entry),
                Err(e) => error!(error = %e, "Server task failed outside its workflow."),
            }
        }

        let summary = RunSummary { servers: collect_summaries(servers, finished), elapsed: started.elapsed() };
        info!(
            artifacts = summary.artifact_count(),
            failures = summary.export_failure_count(),
            completed = summary.completed_servers(),
            abandoned = summary.abandoned_servers(),
            "Report download phase finished."
        );
        summary
    }
}

/// Orders summaries as `servers` were given. A server whose task produced
/// nothing still gets a row, marked as an unexpected failure.
fn collect_summaries(servers: &[ServerTarget], finished: Vec<(usize, ServerSummary)>) -> Vec<ServerSummary> {
    let mut slots: Vec<Option<ServerSummary>> = vec![None; servers.len()];
    for (index, summary) in finished {
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(summary);
        }
    }
    slots
        .into_iter()
        .zip(servers)
        .map(|(slot, target)| {
            slot.unwrap_or_else(|| {
                let mut summary = ServerSummary::new(target.clone());
                summary.fail(ServerError::Unexpected("server task ended without a summary".to_string()));
                summary
            })
        })
        .collect()
}

async fn process_server<C: Connector>(
    connector: Arc<C>,
    settings: Arc<RunSettings>,
    reporter: Reporter,
    target: ServerTarget,
    cancel: CancellationToken,
) -> ServerSummary {
    let mut summary = ServerSummary::new(target.clone());
    if let Err(e) = harvest(connector.as_ref(), &settings, reporter, &target, &cancel, &mut summary).await {
        summary.fail(e);
    }
    summary
}

/// Connect, authenticate, export. The transport and session are dropped on return.
async fn harvest<C: Connector>(
    connector: &C,
    settings: &RunSettings,
    reporter: Reporter,
    target: &ServerTarget,
    cancel: &CancellationToken,
    summary: &mut ServerSummary,
) -> Result<(), ServerError> {
    reporter.notice(&format!("\nConnecting to {target}..."));
    let transport = connector.connect(target).map_err(|e| {
        reporter.error(Scope::server(&target.host), &format!("Could not prepare connection: {e}"));
        ServerError::Connect(e)
    })?;

    let ctx = ServerContext { target, transport: &transport, cancel, reporter };
    let session = session::authenticate(&ctx, &settings.credentials).await?;

    let outcome = export_catalog(&ctx, &session, settings, summary).await;
    session::logout(&ctx, &session).await;
    outcome
}

async fn export_catalog<T: Transport>(
    ctx: &ServerContext<'_, T>,
    session: &Session,
    settings: &RunSettings,
    summary: &mut ServerSummary,
) -> Result<(), ServerError> {
    ctx.reporter.notice(&format!("Getting report list from {}...", ctx.host()));
    let scans = catalog::list_scans(ctx, session).await?;
    summary.scans_listed = scans.len();
    if scans.is_empty() {
        summary.warnings.push(EMPTY_CATALOG_WARNING.to_string());
        return Ok(());
    }

    ctx.reporter.notice(&format!("Downloading reports from {}. Please wait...", ctx.host()));
    for scan in &scans {
        if ctx.cancel.is_cancelled() {
            return Err(ServerError::Cancelled);
        }

        if !scan.is_completed() {
            let message = format!(
                "Skipped download: {}. Scan status: '{}' != 'completed'",
                scan.name, scan.status
            );
            ctx.reporter.warn(ctx.scope().scan(&scan.name), &message);
            summary.scans_skipped += 1;
            summary.warnings.push(message);
            continue;
        }

        for format in &settings.formats {
            match export::export_and_download(ctx, session, scan, *format, &settings.export).await {
                Ok(artifact) => summary.artifacts.push(artifact),
                Err(error) => summary.failures.push(ExportFailure {
                    scan_id: scan.id,
                    scan_name: scan.name.clone(),
                    error,
                }),
            }
        }
    }
    Ok(())
}
