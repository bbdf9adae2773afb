// src/core/models.rs

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

// --- Targets & Credentials ---

/// A scanner appliance to harvest reports from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerTarget {
    pub host: String,
    pub port: u16,
}

impl ServerTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl fmt::Display for ServerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The username/password pair exchanged for a session token on every server.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

// Never print the password, not even in debug logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

// --- Catalog ---

/// Status value the appliance reports for a finished scan.
pub const COMPLETED_STATUS: &str = "completed";

/// A snapshot of one scan job as listed by `GET /scans`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scan {
    pub id: u64,
    pub name: String,
    pub status: String,
    #[serde(rename = "last_modification_date")]
    pub last_modified_epoch: i64,
}

impl Scan {
    /// Only completed scans have results worth exporting.
    pub fn is_completed(&self) -> bool {
        self.status == COMPLETED_STATUS
    }
}

/// Payload of `GET /scans`. The appliance sends `"scans": null` when it has none.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanList {
    #[serde(default)]
    pub scans: Option<Vec<Scan>>,
}

impl ScanList {
    pub fn into_scans(self) -> Vec<Scan> {
        self.scans.unwrap_or_default()
    }
}

// --- Export ---

/// The report formats the appliance can export, in the order they are attempted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    Nessus,
    Csv,
    Pdf,
}

impl ExportFormat {
    /// Every format, in canonical export order.
    pub fn all() -> Vec<ExportFormat> {
        ExportFormat::iter().collect()
    }

    /// File extension of the downloaded artifact.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Nessus => "nessus",
            ExportFormat::Csv => "csv",
            ExportFormat::Pdf => "pdf",
        }
    }
}

/// Body of `POST /scans/{id}/export`.
///
/// `chapters` is a `;`-terminated list of report sections and is only
/// populated for PDF exports. Reports are never password protected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRequest {
    pub format: ExportFormat,
    pub chapters: String,
    pub password: String,
}

impl ExportRequest {
    pub fn new(format: ExportFormat, pdf_chapters: &[String]) -> Self {
        let chapters = match format {
            ExportFormat::Pdf => pdf_chapters.iter().map(|c| format!("{c};")).collect(),
            _ => String::new(),
        };
        Self { format, chapters, password: String::new() }
    }
}

/// Response of `POST /scans/{id}/export`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportTicket {
    pub file: u64,
}

/// Response of `GET /scans/{id}/export/{file}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportStatusResponse {
    pub status: String,
}

/// Lifecycle of one server-side export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ExportStatus {
    Requested,
    Processing,
    Ready,
}

/// Transient handle for an export in flight. Never persisted or reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportJob {
    pub scan_id: u64,
    pub format: ExportFormat,
    pub file_id: u64,
    pub status: ExportStatus,
}

impl ExportJob {
    pub fn status_path(&self) -> String {
        format!("scans/{}/export/{}/status", self.scan_id, self.file_id)
    }

    pub fn download_path(&self) -> String {
        format!("scans/{}/export/{}/download", self.scan_id, self.file_id)
    }
}

// --- Artifacts ---

/// A report written to local storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    pub path: PathBuf,
    pub sanitized_scan_name: String,
    pub timestamp: String,
    pub format: ExportFormat,
    pub bytes: usize,
}

impl ReportArtifact {
    /// Builds the artifact descriptor for `scan` in `format` under `dest_dir`.
    pub fn for_scan(dest_dir: &Path, scan: &Scan, format: ExportFormat, bytes: usize) -> Self {
        let sanitized_scan_name = sanitize_scan_name(&scan.name);
        let timestamp = format_timestamp(scan.last_modified_epoch);
        let path = dest_dir.join(report_file_name(&sanitized_scan_name, &timestamp, format));
        Self { path, sanitized_scan_name, timestamp, format, bytes }
    }

    pub fn file_name(&self) -> String {
        report_file_name(&self.sanitized_scan_name, &self.timestamp, self.format)
    }
}

/// `{name}_{timestamp}.{ext}`.
pub fn report_file_name(sanitized_scan_name: &str, timestamp: &str, format: ExportFormat) -> String {
    format!("{}_{}.{}", sanitized_scan_name, timestamp, format.extension())
}

/// Collapses whitespace runs into single underscores. Path separators are
/// mapped too so a scan name cannot escape the destination directory.
pub fn sanitize_scan_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .replace(['/', '\\'], "_")
}

/// Formats a last-modification epoch as `YYYYMMDD-HHMM` (UTC).
pub fn format_timestamp(epoch: i64) -> String {
    DateTime::from_timestamp(epoch, 0)
        .unwrap_or_default()
        .format("%Y%m%d-%H%M")
        .to_string()
}

/// Human readable form used in the verbose catalog table.
pub fn format_listing_date(epoch: i64) -> String {
    DateTime::from_timestamp(epoch, 0)
        .unwrap_or_default()
        .format("%b %e, %Y %H:%M UTC")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(name: &str, epoch: i64, status: &str) -> Scan {
        Scan { id: 7, name: name.to_string(), status: status.to_string(), last_modified_epoch: epoch }
    }

    #[test]
    fn weekly_scan_csv_file_name() {
        // 2024-03-05 14:30 UTC
        let artifact = ReportArtifact::for_scan(Path::new("/reports"), &scan("Weekly Scan", 1_709_649_000, "completed"), ExportFormat::Csv, 0);
        assert_eq!(artifact.file_name(), "Weekly_Scan_20240305-1430.csv");
        assert_eq!(artifact.path, PathBuf::from("/reports/Weekly_Scan_20240305-1430.csv"));
    }

    #[test]
    fn sanitize_collapses_and_trims_whitespace() {
        assert_eq!(sanitize_scan_name("  DMZ   hosts\tweekly "), "DMZ_hosts_weekly");
        assert_eq!(sanitize_scan_name("../etc/passwd"), ".._etc_passwd");
    }

    #[test]
    fn file_name_is_deterministic() {
        let s = scan("Internal Sweep", 1_700_000_000, "completed");
        let a = ReportArtifact::for_scan(Path::new("out"), &s, ExportFormat::Pdf, 10);
        let b = ReportArtifact::for_scan(Path::new("out"), &s, ExportFormat::Pdf, 99);
        assert_eq!(a.path, b.path);
    }

    #[test]
    fn pdf_requests_carry_chapters_others_do_not() {
        let chapters = vec!["vuln_by_host".to_string(), "remediations".to_string()];
        let pdf = ExportRequest::new(ExportFormat::Pdf, &chapters);
        assert_eq!(pdf.chapters, "vuln_by_host;remediations;");
        assert!(pdf.password.is_empty());

        let csv = ExportRequest::new(ExportFormat::Csv, &chapters);
        assert!(csv.chapters.is_empty());

        let body = serde_json::to_value(&pdf).unwrap();
        assert_eq!(body["format"], "pdf");
    }

    #[test]
    fn formats_iterate_in_canonical_order() {
        assert_eq!(ExportFormat::all(), vec![ExportFormat::Nessus, ExportFormat::Csv, ExportFormat::Pdf]);
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
    }

    #[test]
    fn null_scan_list_is_empty() {
        let list: ScanList = serde_json::from_str(r#"{"folders": [], "scans": null}"#).unwrap();
        assert!(list.into_scans().is_empty());
    }

    #[test]
    fn only_completed_scans_are_eligible() {
        assert!(scan("a", 0, "completed").is_completed());
        assert!(!scan("a", 0, "running").is_completed());
        assert!(!scan("a", 0, "Completed").is_completed());
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("admin", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
