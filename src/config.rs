// src/config.rs

//! JSON configuration.
//!
//! ```json
//! {
//!   "nessus": { "servers": ["scanner-a.example"], "port": 8834 },
//!   "file-paths": { "logs": "logs", "dest_folder": "reports" }
//! }
//! ```
//!
//! Only the two sections above are required; `tls`, `timeouts`, `export` and
//! `concurrency` fall back to defaults suited to slow links.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::core::client::export::ExportOptions;
use crate::core::client::poll::PollPolicy;
use crate::core::client::transport::{base_url, default_user_agent, HttpSettings};
use crate::core::models::{Credentials, ExportFormat, ServerTarget};
use crate::core::runner::RunSettings;
use crate::logging;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.json";
pub const DEFAULT_PORT: u16 = 8834;

/// Longest an export may be waited on, whatever the configuration says.
const MAX_WAIT_CEILING_SECS: u64 = 24 * 60 * 60;

/// Report sections requested for PDF exports.
pub const DEFAULT_PDF_CHAPTERS: [&str; 6] = [
    "vuln_hosts_summary",
    "vuln_by_plugin",
    "vuln_by_host",
    "remediations",
    "compliance_exec",
    "compliance",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no config file found at '{}'; rename 'config.json.example' to 'config.json' and fill in the required info", .0.display())]
    ExampleOnly(PathBuf),

    #[error("no config file found at '{}'", .0.display())]
    NotFound(PathBuf),

    #[error("could not read '{}': {source}", .path.display())]
    Read { path: PathBuf, source: std::io::Error },

    #[error("could not parse '{}': {source}", .path.display())]
    Parse { path: PathBuf, source: serde_json::Error },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub nessus: NessusSection,
    #[serde(rename = "file-paths")]
    pub file_paths: FilePaths,
    #[serde(default)]
    pub tls: TlsSection,
    #[serde(default)]
    pub timeouts: TimeoutSection,
    #[serde(default)]
    pub export: ExportSection,
    #[serde(default)]
    pub concurrency: ConcurrencySection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NessusSection {
    pub servers: Vec<String>,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilePaths {
    /// Defaults to the platform data directory.
    #[serde(default)]
    pub logs: Option<PathBuf>,
    pub dest_folder: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TlsSection {
    #[serde(default = "default_true")]
    pub verify: bool,
    /// Extra PEM trust anchor, typically the appliance's own CA.
    #[serde(default)]
    pub ca_bundle: Option<PathBuf>,
}

impl Default for TlsSection {
    fn default() -> Self {
        Self { verify: true, ca_bundle: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutSection {
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,
    #[serde(default = "default_read_secs")]
    pub read_secs: u64,
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self { connect_secs: default_connect_secs(), read_secs: default_read_secs() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportSection {
    #[serde(default = "ExportFormat::all")]
    pub formats: Vec<ExportFormat>,
    #[serde(default = "default_pdf_chapters")]
    pub pdf_chapters: Vec<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_poll_interval_ms")]
    pub max_poll_interval_ms: u64,
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            formats: ExportFormat::all(),
            pdf_chapters: default_pdf_chapters(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_interval_ms: default_max_poll_interval_ms(),
            max_wait_secs: default_max_wait_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConcurrencySection {
    #[serde(default = "default_parallel_servers")]
    pub max_parallel_servers: usize,
}

impl Default for ConcurrencySection {
    fn default() -> Self {
        Self { max_parallel_servers: default_parallel_servers() }
    }
}

fn default_port() -> u16 { DEFAULT_PORT }
fn default_true() -> bool { true }
fn default_connect_secs() -> u64 { 120 }
fn default_read_secs() -> u64 { 300 }
fn default_poll_interval_ms() -> u64 { 1_000 }
fn default_max_poll_interval_ms() -> u64 { 15_000 }
fn default_max_wait_secs() -> u64 { 30 * 60 }
fn default_parallel_servers() -> usize { 1 }

fn default_pdf_chapters() -> Vec<String> {
    DEFAULT_PDF_CHAPTERS.iter().map(|c| c.to_string()).collect()
}

impl Config {
    /// Reads and validates the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            let example = path.with_file_name("config.json.example");
            return Err(if example.is_file() {
                ConfigError::ExampleOnly(path.to_path_buf())
            } else {
                ConfigError::NotFound(path.to_path_buf())
            });
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config: Config = serde_json::from_str(&raw)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nessus.servers.is_empty() {
            return Err(ConfigError::Invalid("nessus.servers must list at least one server".into()));
        }
        if self.nessus.port == 0 {
            return Err(ConfigError::Invalid("nessus.port must be non-zero".into()));
        }
        for host in &self.nessus.servers {
            if host.trim().is_empty() {
                return Err(ConfigError::Invalid("nessus.servers contains a blank entry".into()));
            }
            base_url(&ServerTarget::new(host.trim(), self.nessus.port))
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        if self.file_paths.dest_folder.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("file-paths.dest_folder must not be empty".into()));
        }
        if self.export.formats.is_empty() {
            return Err(ConfigError::Invalid("export.formats must name at least one format".into()));
        }
        if self.export.formats.contains(&ExportFormat::Pdf)
            && self.export.pdf_chapters.iter().all(|c| c.trim().is_empty())
        {
            return Err(ConfigError::Invalid("export.pdf_chapters must not be empty when pdf is requested".into()));
        }
        if self.export.max_wait_secs == 0 || self.export.max_wait_secs > MAX_WAIT_CEILING_SECS {
            return Err(ConfigError::Invalid(format!(
                "export.max_wait_secs must be between 1 and {MAX_WAIT_CEILING_SECS}"
            )));
        }
        if self.concurrency.max_parallel_servers == 0 {
            return Err(ConfigError::Invalid("concurrency.max_parallel_servers must be at least 1".into()));
        }
        if self.timeouts.connect_secs == 0 || self.timeouts.read_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }
        Ok(())
    }

    pub fn servers(&self) -> Vec<ServerTarget> {
        self.nessus
            .servers
            .iter()
            .map(|host| ServerTarget::new(host.trim(), self.nessus.port))
            .collect()
    }

    pub fn dest_dir(&self) -> &Path {
        &self.file_paths.dest_folder
    }

    pub fn log_dir(&self) -> PathBuf {
        self.file_paths
            .logs
            .clone()
            .unwrap_or_else(|| logging::get_data_dir().join("logs"))
    }

    /// Requested formats, deduplicated, in canonical export order.
    pub fn formats(&self) -> Vec<ExportFormat> {
        self.export.formats.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            initial_interval: Duration::from_millis(self.export.poll_interval_ms),
            max_interval: Duration::from_millis(self.export.max_poll_interval_ms),
            max_wait: Duration::from_secs(self.export.max_wait_secs),
            ..PollPolicy::default()
        }
    }

    /// Connection settings; reads the CA bundle if one is configured.
    pub fn http_settings(&self) -> Result<HttpSettings, ConfigError> {
        let ca_bundle = match &self.tls.ca_bundle {
            Some(path) => Some(
                std::fs::read(path).map_err(|source| ConfigError::Read { path: path.clone(), source })?,
            ),
            None => None,
        };
        Ok(HttpSettings {
            connect_timeout: Duration::from_secs(self.timeouts.connect_secs),
            read_timeout: Duration::from_secs(self.timeouts.read_secs),
            verify_tls: self.tls.verify,
            ca_bundle,
            user_agent: default_user_agent(),
        })
    }

    pub fn run_settings(&self, credentials: Credentials) -> RunSettings {
        RunSettings {
            credentials,
            formats: self.formats(),
            export: ExportOptions {
                dest_dir: self.dest_dir().to_path_buf(),
                pdf_chapters: self
                    .export
                    .pdf_chapters
                    .iter()
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect(),
                poll: self.poll_policy(),
            },
            max_parallel_servers: self.concurrency.max_parallel_servers,
        }
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    /// Parses and validates a configuration held in memory.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let config: Config = serde_json::from_str(raw)
            .map_err(|source| ConfigError::Parse { path: PathBuf::from("<inline>"), source })?;
        config.validate()?;
        Ok(config)
    }
}
