//! Scripted in-memory appliance for workflow tests.
//!
//! Each host gets a [`HostScript`] describing how it should behave; every
//! request that reaches the fake is recorded so tests can assert on call
//! counts and ordering.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use nessus_harvester::console::Reporter;
use nessus_harvester::core::client::export::ExportOptions;
use nessus_harvester::core::client::poll::PollPolicy;
use nessus_harvester::core::client::session::TOKEN_HEADER;
use nessus_harvester::core::client::transport::{ApiRequest, ApiResponse, Connector, Method, Transport};
use nessus_harvester::core::error::TransportError;
use nessus_harvester::core::models::{Credentials, ExportFormat, Scan, ServerTarget};
use nessus_harvester::core::runner::{RunSettings, ServerRunner};

pub const USERNAME: &str = "auditor";
pub const PASSWORD: &str = "correct horse";

/// How one fake server behaves.
#[derive(Debug, Clone, Default)]
pub struct HostScript {
    pub reject_login: bool,
    /// Raw `(status, body)` answer to `POST /session`, overriding the normal login.
    pub login_reply: Option<(u16, String)>,
    /// The transport fails with a timeout for this request instead of reaching the server.
    pub transport_error_on: Option<(Method, &'static str)>,
    pub scans: Vec<Scan>,
    /// Answer `GET /scans` with `"scans": null` instead of a list.
    pub null_catalog: bool,
    pub malformed_catalog: bool,
    pub catalog_status: Option<u16>,
    /// Cancelled as the scan list is served.
    pub cancel_on_catalog: Option<CancellationToken>,
    pub panic_on_catalog: bool,
    /// Non-ready status answers before an export turns ready.
    pub pending_polls: u32,
    pub fail_export_request: Vec<ExportFormat>,
    pub fail_poll: Vec<ExportFormat>,
    pub fail_download: Vec<ExportFormat>,
}

impl HostScript {
    pub fn with_scans(scans: Vec<Scan>) -> Self {
        Self { scans, ..Self::default() }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub host: String,
    pub method: Method,
    pub path: String,
    pub token: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
struct PendingExport {
    scan_id: u64,
    format: ExportFormat,
    remaining_polls: u32,
}

#[derive(Debug, Default)]
struct ApplianceState {
    scripts: HashMap<String, HostScript>,
    exports: HashMap<(String, u64), PendingExport>,
    next_file_id: u64,
    log: Vec<RecordedRequest>,
}

/// Connector handing out transports backed by the shared scripted state.
#[derive(Debug, Clone, Default)]
pub struct FakeAppliance {
    state: Arc<Mutex<ApplianceState>>,
}

impl FakeAppliance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(self, host: &str, script: HostScript) -> Self {
        self.state.lock().unwrap().scripts.insert(host.to_string(), script);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn requests_for(&self, host: &str) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|r| r.host == host).collect()
    }

    pub fn count(&self, host: &str, method: Method, matches: impl Fn(&str) -> bool) -> usize {
        self.requests_for(host)
            .iter()
            .filter(|r| r.method == method && matches(&r.path))
            .count()
    }

    pub fn logins(&self, host: &str) -> usize {
        self.count(host, Method::Post, |p| p == "session")
    }

    pub fn catalog_calls(&self, host: &str) -> usize {
        self.count(host, Method::Get, |p| p == "scans")
    }

    pub fn export_requests(&self, host: &str) -> usize {
        self.count(host, Method::Post, |p| p.ends_with("/export"))
    }

    pub fn status_polls(&self, host: &str) -> usize {
        self.count(host, Method::Get, |p| p.ends_with("/status"))
    }

    pub fn downloads(&self, host: &str) -> usize {
        self.count(host, Method::Get, |p| p.ends_with("/download"))
    }

    /// `(scan id, format)` of every export request to `host`, in arrival order.
    pub fn export_sequence(&self, host: &str) -> Vec<(u64, String)> {
        self.requests_for(host)
            .into_iter()
            .filter(|r| r.method == Method::Post && r.path.ends_with("/export"))
            .map(|r| {
                let scan_id = r.path.split('/').nth(1).unwrap().parse().unwrap();
                let format = r.body.as_ref().unwrap()["format"].as_str().unwrap().to_string();
                (scan_id, format)
            })
            .collect()
    }
}

impl Connector for FakeAppliance {
    type Transport = FakeTransport;

    fn connect(&self, target: &ServerTarget) -> Result<FakeTransport, TransportError> {
        if !self.state.lock().unwrap().scripts.contains_key(&target.host) {
            return Err(TransportError::Connect(format!("{} refused the connection", target)));
        }
        Ok(FakeTransport { host: target.host.clone(), state: Arc::clone(&self.state) })
    }
}

pub struct FakeTransport {
    host: String,
    state: Arc<Mutex<ApplianceState>>,
}

enum Reply {
    Respond(ApiResponse),
    Fail(TransportError),
    Panic,
}

impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let reply = {
            let mut state = self.state.lock().unwrap();
            state.log.push(RecordedRequest {
                host: self.host.clone(),
                method: request.method,
                path: request.path.clone(),
                token: request
                    .headers
                    .get(TOKEN_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(String::from),
                body: request.body.clone(),
            });
            route(&mut state, &self.host, &request)
        };
        match reply {
            Reply::Respond(response) => Ok(response),
            Reply::Fail(error) => Err(error),
            Reply::Panic => panic!("scripted panic on {}", self.host),
        }
    }
}

fn ok_json(value: Value) -> Reply {
    Reply::Respond(ApiResponse::new(200, value.to_string()))
}

fn status(code: u16, value: Value) -> Reply {
    Reply::Respond(ApiResponse::new(code, value.to_string()))
}

fn token_for(host: &str) -> String {
    format!("token-{host}")
}

fn route(state: &mut ApplianceState, host: &str, request: &ApiRequest) -> Reply {
    let script = state.scripts.get(host).cloned().unwrap_or_default();
    let segments: Vec<&str> = request.path.split('/').collect();

    if let Some((method, path)) = script.transport_error_on {
        if method == request.method && path == request.path {
            return Reply::Fail(TransportError::Timeout(format!("{host} did not answer {method} {path}")));
        }
    }

    match (request.method, segments.as_slice()) {
        (Method::Post, ["session"]) => {
            if let Some((code, body)) = &script.login_reply {
                return Reply::Respond(ApiResponse::new(*code, body.clone()));
            }
            let body = request.body.clone().unwrap_or_default();
            if script.reject_login || body["username"] != USERNAME || body["password"] != PASSWORD {
                status(401, json!({ "error": "Invalid Credentials" }))
            } else {
                ok_json(json!({ "token": token_for(host) }))
            }
        }
        (Method::Delete, ["session"]) => Reply::Respond(ApiResponse::new(200, Vec::new())),
        _ if !authorized(host, request) => status(401, json!({ "error": "Invalid Credentials" })),
        (Method::Get, ["scans"]) => {
            if let Some(token) = &script.cancel_on_catalog {
                token.cancel();
            }
            if script.panic_on_catalog {
                Reply::Panic
            } else if let Some(code) = script.catalog_status {
                status(code, json!({ "error": "scan list unavailable" }))
            } else if script.malformed_catalog {
                Reply::Respond(ApiResponse::new(200, "<html>maintenance</html>"))
            } else if script.null_catalog || script.scans.is_empty() {
                ok_json(json!({ "folders": [], "scans": null }))
            } else {
                ok_json(json!({ "scans": script.scans }))
            }
        }
        (Method::Post, ["scans", id, "export"]) => {
            let scan_id: u64 = id.parse().unwrap_or_default();
            let format: ExportFormat = request
                .body
                .as_ref()
                .and_then(|b| b["format"].as_str())
                .and_then(|f| f.parse().ok())
                .unwrap_or(ExportFormat::Nessus);
            if script.fail_export_request.contains(&format) {
                return status(500, json!({ "error": "export failed" }));
            }
            state.next_file_id += 1;
            let file_id = state.next_file_id;
            state.exports.insert(
                (host.to_string(), file_id),
                PendingExport { scan_id, format, remaining_polls: script.pending_polls },
            );
            ok_json(json!({ "file": file_id }))
        }
        (Method::Get, ["scans", _, "export", file, "status"]) => {
            let file_id: u64 = file.parse().unwrap_or_default();
            let Some(export) = state.exports.get_mut(&(host.to_string(), file_id)) else {
                return status(404, json!({ "error": "The requested file was not found" }));
            };
            if script.fail_poll.contains(&export.format) {
                return status(500, json!({ "error": "status unavailable" }));
            }
            if export.remaining_polls > 0 {
                export.remaining_polls -= 1;
                ok_json(json!({ "status": "loading" }))
            } else {
                ok_json(json!({ "status": "ready" }))
            }
        }
        (Method::Get, ["scans", _, "export", file, "download"]) => {
            let file_id: u64 = file.parse().unwrap_or_default();
            let Some(export) = state.exports.get(&(host.to_string(), file_id)) else {
                return status(404, json!({ "error": "The requested file was not found" }));
            };
            if script.fail_download.contains(&export.format) {
                return status(503, json!({ "error": "download unavailable" }));
            }
            let body = report_body(host, export.scan_id, export.format);
            Reply::Respond(ApiResponse::new(200, body))
        }
        _ => status(404, json!({ "error": "not found" })),
    }
}

fn authorized(host: &str, request: &ApiRequest) -> bool {
    request
        .headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("token={}", token_for(host)))
}

/// What the fake serves as the exported report body.
pub fn report_body(host: &str, scan_id: u64, format: ExportFormat) -> String {
    format!("{format} report of scan {scan_id} from {host}")
}

// --- Fixtures ---

pub fn scan(id: u64, name: &str, status: &str, epoch: i64) -> Scan {
    Scan { id, name: name.to_string(), status: status.to_string(), last_modified_epoch: epoch }
}

pub fn completed(id: u64, name: &str) -> Scan {
    // 2024-03-05 14:30 UTC
    scan(id, name, "completed", 1_709_649_000)
}

pub fn target(host: &str) -> ServerTarget {
    ServerTarget::new(host, 8834)
}

pub fn settings(dest_dir: &Path, max_parallel_servers: usize) -> RunSettings {
    RunSettings {
        credentials: Credentials::new(USERNAME, PASSWORD),
        formats: ExportFormat::all(),
        export: ExportOptions {
            dest_dir: dest_dir.to_path_buf(),
            pdf_chapters: vec!["vuln_hosts_summary".to_string(), "vuln_by_host".to_string()],
            poll: PollPolicy::immediate(Duration::from_secs(30)),
        },
        max_parallel_servers,
    }
}

pub fn runner(appliance: &FakeAppliance, dest_dir: &Path) -> ServerRunner<FakeAppliance> {
    ServerRunner::new(appliance.clone(), settings(dest_dir, 1), Reporter::silent())
}
