// src/core/client/transport.rs

//! The seam between the workflow and the network.
//!
//! Workflow code only sees [`Transport`]: a request goes in, a status code and
//! a raw body come out. [`HttpConnector`] produces the reqwest-backed
//! implementation, one per server, so each server's connection pool is
//! dropped as soon as that server's processing ends.

use std::future::Future;
use std::time::Duration;

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use strum::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::core::error::TransportError;
use crate::core::models::ServerTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Delete,
}

/// A request relative to the appliance's API root (e.g. `scans/12/export`).
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>, headers: &HeaderMap) -> Self {
        Self { method: Method::Get, path: path.into(), headers: headers.clone(), body: None }
    }

    pub fn post(path: impl Into<String>, headers: &HeaderMap, body: serde_json::Value) -> Self {
        Self { method: Method::Post, path: path.into(), headers: headers.clone(), body: Some(body) }
    }

    pub fn delete(path: impl Into<String>, headers: &HeaderMap) -> Self {
        Self { method: Method::Delete, path: path.into(), headers: headers.clone(), body: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Short, lossy excerpt of the body for error messages.
    pub fn excerpt(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        let mut excerpt: String = text.chars().take(120).collect();
        if text.chars().count() > 120 {
            excerpt.push('…');
        }
        excerpt
    }
}

/// Sends API requests to one appliance.
pub trait Transport: Send + Sync {
    fn send(&self, request: ApiRequest) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send;
}

/// Builds a fresh [`Transport`] for each server.
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport + 'static;

    fn connect(&self, target: &ServerTarget) -> Result<Self::Transport, TransportError>;
}

/// Sends `request`, giving up as soon as `cancel` fires.
pub async fn send_cancellable<T: Transport>(
    transport: &T,
    request: ApiRequest,
    cancel: &CancellationToken,
) -> Result<ApiResponse, TransportError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransportError::Cancelled),
        response = transport.send(request) => response,
    }
}

// --- reqwest implementation ---

/// Connection settings shared by every server.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub verify_tls: bool,
    /// PEM encoded trust anchor added on top of the platform roots.
    pub ca_bundle: Option<Vec<u8>>,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(120),
            read_timeout: Duration::from_secs(300),
            verify_tls: true,
            ca_bundle: None,
            user_agent: default_user_agent(),
        }
    }
}

pub fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone)]
pub struct HttpConnector {
    settings: HttpSettings,
}

impl HttpConnector {
    pub fn new(settings: HttpSettings) -> Self {
        if !settings.verify_tls {
            warn!("TLS certificate verification is disabled for all servers.");
        }
        Self { settings }
    }
}

impl Connector for HttpConnector {
    type Transport = HttpTransport;

    fn connect(&self, target: &ServerTarget) -> Result<HttpTransport, TransportError> {
        let base = base_url(target)?;

        let mut builder = reqwest::Client::builder()
            .user_agent(self.settings.user_agent.clone())
            .connect_timeout(self.settings.connect_timeout)
            .read_timeout(self.settings.read_timeout)
            .danger_accept_invalid_certs(!self.settings.verify_tls);

        if let Some(pem) = &self.settings.ca_bundle {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| TransportError::Tls(format!("invalid CA bundle: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder.build().map_err(|e| TransportError::Tls(e.to_string()))?;
        debug!(server = %target, base = %base, "Prepared HTTP client.");
        Ok(HttpTransport { client, base })
    }
}

/// `https://{host}:{port}/`, the root all API paths are joined onto.
pub fn base_url(target: &ServerTarget) -> Result<Url, TransportError> {
    let host = if target.host.contains(':') && !target.host.starts_with('[') {
        format!("[{}]", target.host)
    } else {
        target.host.clone()
    };
    Url::parse(&format!("https://{}:{}/", host, target.port))
        .map_err(|e| TransportError::InvalidRequest(format!("bad server address '{}': {e}", target.host)))
}

#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
}

impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self
            .base
            .join(&request.path)
            .map_err(|e| TransportError::InvalidRequest(format!("{}: {e}", request.path)))?;

        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Delete => self.client.delete(url),
        }
        .headers(request.headers);

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify)?;
        Ok(ApiResponse { status, body: body.to_vec() })
    }
}

/// Sorts a reqwest failure into the transport taxonomy.
fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout(err.to_string());
    }

    let chain = error_chain(&err);
    let lowered = chain.to_lowercase();
    if lowered.contains("certificate") || lowered.contains("tls") || lowered.contains("handshake") {
        TransportError::Tls(chain)
    } else if err.is_connect() {
        TransportError::Connect(chain)
    } else {
        TransportError::Http(chain)
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}
