// src/core/client/export.rs

//! Request → poll → download for one (scan, format) pair.

use std::path::PathBuf;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::core::client::poll::PollPolicy;
use crate::core::client::session::Session;
use crate::core::client::transport::{ApiRequest, Transport};
use crate::core::client::ServerContext;
use crate::core::error::{ExportError, ExportErrorKind};
use crate::core::models::{
    ExportFormat, ExportJob, ExportRequest, ExportStatus, ExportStatusResponse, ExportTicket,
    ReportArtifact, Scan,
};
use crate::summary::format_elapsed;

/// Status value marking an export as downloadable.
pub const READY_STATUS: &str = "ready";

/// Knobs shared by every export of a run.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub dest_dir: PathBuf,
    /// Report sections requested for PDF exports.
    pub pdf_chapters: Vec<String>,
    pub poll: PollPolicy,
}

/// Exports `scan` as `format` and writes the result under `options.dest_dir`.
///
/// Any failure is logged with server, scan and format and returned; the caller
/// moves on to the next format or scan.
pub async fn export_and_download<T: Transport>(
    ctx: &ServerContext<'_, T>,
    session: &Session,
    scan: &Scan,
    format: ExportFormat,
    options: &ExportOptions,
) -> Result<ReportArtifact, ExportError> {
    let started = Instant::now();
    ctx.reporter.progress(&format!("Exporting scan report for: {}, type: {}", scan.name, format));

    let result = run_export(ctx, session, scan, format, options).await;
    match &result {
        Ok(artifact) => {
            info!(
                server = %ctx.target,
                scan = %scan.name,
                format = %format,
                path = %artifact.path.display(),
                bytes = artifact.bytes,
                "Report saved."
            );
            ctx.reporter.progress(&format!("Report saved as: {}", artifact.file_name()));
            ctx.reporter.progress(&format!("Time elapsed: {}", format_elapsed(started.elapsed())));
        }
        Err(err) => {
            let scope = ctx.scope().scan(&scan.name).format(format);
            ctx.reporter.error(scope, &format!("Error downloading report: {err}"));
        }
    }
    result
}

async fn run_export<T: Transport>(
    ctx: &ServerContext<'_, T>,
    session: &Session,
    scan: &Scan,
    format: ExportFormat,
    options: &ExportOptions,
) -> Result<ReportArtifact, ExportError> {
    let mut job = request_export(ctx, session, scan, format, &options.pdf_chapters).await?;
    let polls = wait_until_ready(ctx, session, &mut job, &options.poll).await?;
    debug!(server = %ctx.target, scan_id = job.scan_id, file_id = job.file_id, polls, "Export ready.");
    download(ctx, session, scan, &job, options).await
}

async fn request_export<T: Transport>(
    ctx: &ServerContext<'_, T>,
    session: &Session,
    scan: &Scan,
    format: ExportFormat,
    pdf_chapters: &[String],
) -> Result<ExportJob, ExportError> {
    let failed = |detail: String| ExportError::new(ExportErrorKind::RequestFailed, format, detail);

    let request = ExportRequest::new(format, pdf_chapters);
    let body = serde_json::to_value(&request).map_err(|e| failed(e.to_string()))?;
    let response = ctx
        .send(ApiRequest::post(format!("scans/{}/export", scan.id), &session.headers, body))
        .await
        .map_err(|e| ExportError::from_transport(ExportErrorKind::RequestFailed, format, e))?;

    if !response.is_success() {
        return Err(failed(format!("HTTP {}: {}", response.status, response.excerpt())));
    }
    let ticket: ExportTicket = response
        .json()
        .map_err(|e| failed(format!("{e} ({})", response.excerpt())))?;

    let job = ExportJob { scan_id: scan.id, format, file_id: ticket.file, status: ExportStatus::Requested };
    debug!(server = %ctx.target, scan_id = job.scan_id, file_id = job.file_id, format = %format, "Export requested.");
    Ok(job)
}

/// Polls the export status until it reads `ready`.
///
/// Delays grow per the policy's backoff. The export is abandoned once
/// `max_wait` has passed without a `ready` answer, when a single status
/// request fails, or when the server's work is cancelled. Returns the number
/// of status requests issued.
async fn wait_until_ready<T: Transport>(
    ctx: &ServerContext<'_, T>,
    session: &Session,
    job: &mut ExportJob,
    policy: &PollPolicy,
) -> Result<u32, ExportError> {
    let format = job.format;
    let failed = |detail: String| ExportError::new(ExportErrorKind::PollFailed, format, detail);
    let deadline = Instant::now() + policy.max_wait;
    let mut backoff = policy.backoff();
    let mut polls = 0u32;

    loop {
        polls += 1;
        ctx.reporter.poll_tick(polls);

        let response = ctx
            .send(ApiRequest::get(job.status_path(), &session.headers))
            .await
            .map_err(|e| ExportError::from_transport(ExportErrorKind::PollFailed, format, e))?;
        if !response.is_success() {
            return Err(failed(format!("HTTP {}: {}", response.status, response.excerpt())));
        }
        let status: ExportStatusResponse = response
            .json()
            .map_err(|e| failed(format!("{e} ({})", response.excerpt())))?;

        if status.status == READY_STATUS {
            job.status = ExportStatus::Ready;
            ctx.reporter.poll_done();
            return Ok(polls);
        }
        job.status = ExportStatus::Processing;

        let now = Instant::now();
        if now >= deadline {
            return Err(ExportError::new(
                ExportErrorKind::PollTimedOut,
                format,
                format!(
                    "export still '{}' after {} ({} status checks)",
                    status.status,
                    format_elapsed(policy.max_wait),
                    polls
                ),
            ));
        }

        let delay = backoff.next_delay().min(deadline - now);
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                return Err(ExportError::new(ExportErrorKind::Cancelled, format, "cancelled while waiting for export"));
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn download<T: Transport>(
    ctx: &ServerContext<'_, T>,
    session: &Session,
    scan: &Scan,
    job: &ExportJob,
    options: &ExportOptions,
) -> Result<ReportArtifact, ExportError> {
    let format = job.format;
    let failed = |detail: String| ExportError::new(ExportErrorKind::DownloadFailed, format, detail);
    ctx.reporter.progress("Downloading report...");

    let started = Instant::now();
    let response = ctx
        .send(ApiRequest::get(job.download_path(), &session.headers))
        .await
        .map_err(|e| ExportError::from_transport(ExportErrorKind::DownloadFailed, format, e))?;
    ctx.reporter.response_diagnostics(
        ctx.scope().scan(&scan.name),
        started.elapsed(),
        response.status,
        response.body.len(),
    );

    if !response.is_success() {
        return Err(failed(format!("HTTP {}: {}", response.status, response.excerpt())));
    }

    let artifact = ReportArtifact::for_scan(&options.dest_dir, scan, format, response.body.len());
    if tokio::fs::try_exists(&artifact.path).await.unwrap_or(false) {
        ctx.reporter.warn(
            ctx.scope().scan(&scan.name).format(format),
            &format!("Overwriting existing report {}", artifact.path.display()),
        );
    }

    ctx.reporter.progress("Writing report to file...");
    tokio::fs::write(&artifact.path, &response.body)
        .await
        .map_err(|e| failed(format!("could not write {}: {e}", artifact.path.display())))?;
    Ok(artifact)
}
