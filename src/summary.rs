// src/summary.rs

use std::time::Duration;

use crate::core::error::{ExportError, ServerError};
use crate::core::models::{ReportArtifact, ServerTarget};

/// How a server's processing ended.
#[derive(Debug, Clone)]
pub enum ServerOutcome {
    /// Authenticated and catalogued; individual exports may still have failed.
    Completed,
    Failed(ServerError),
    Cancelled,
}

/// A (scan, format) pair that was abandoned.
#[derive(Debug, Clone)]
pub struct ExportFailure {
    pub scan_id: u64,
    pub scan_name: String,
    pub error: ExportError,
}

#[derive(Debug, Clone)]
pub struct ServerSummary {
    pub target: ServerTarget,
    pub outcome: ServerOutcome,
    pub scans_listed: usize,
    pub scans_skipped: usize,
    pub artifacts: Vec<ReportArtifact>,
    pub failures: Vec<ExportFailure>,
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

impl ServerSummary {
    pub fn new(target: ServerTarget) -> Self {
        Self {
            target,
            outcome: ServerOutcome::Completed,
            scans_listed: 0,
            scans_skipped: 0,
            artifacts: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, ServerOutcome::Completed)
    }

    pub fn fail(&mut self, error: ServerError) {
        self.outcome = if error.is_cancelled() {
            ServerOutcome::Cancelled
        } else {
            ServerOutcome::Failed(error)
        };
    }

    /// One-line status used in the per-server and overall summaries.
    pub fn status_line(&self) -> String {
        match &self.outcome {
            ServerOutcome::Completed => format!(
                "{} report(s) saved, {} export(s) failed, {} scan(s) skipped",
                self.artifacts.len(),
                self.failures.len(),
                self.scans_skipped
            ),
            ServerOutcome::Failed(e) => format!("abandoned: {e}"),
            ServerOutcome::Cancelled => "cancelled".to_string(),
        }
    }
}

/// Result of a whole run. Produced even when every server failed.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub servers: Vec<ServerSummary>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn artifact_count(&self) -> usize {
        self.servers.iter().map(|s| s.artifacts.len()).sum()
    }

    pub fn export_failure_count(&self) -> usize {
        self.servers.iter().map(|s| s.failures.len()).sum()
    }

    pub fn completed_servers(&self) -> usize {
        self.servers.iter().filter(|s| s.is_completed()).count()
    }

    pub fn abandoned_servers(&self) -> usize {
        self.servers.len() - self.completed_servers()
    }

    pub fn server(&self, host: &str) -> Option<&ServerSummary> {
        self.servers.iter().find(|s| s.target.host == host)
    }
}

/// `12.34 sec` below a minute, `2.5 min` above.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs >= 60.0 {
        format!("{} min", round2(secs / 60.0))
    } else {
        format!("{} sec", round2(secs))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
