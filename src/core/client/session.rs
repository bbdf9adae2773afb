// src/core/client/session.rs

use std::time::Duration;

use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_TYPE, USER_AGENT,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::core::client::transport::{default_user_agent, ApiRequest, Transport};
use crate::core::client::ServerContext;
use crate::core::error::AuthError;
use crate::core::models::Credentials;

/// Header the appliance reads the session token from.
pub const TOKEN_HEADER: &str = "x-cookie";

/// Upper bound on the logout request.
pub const LOGOUT_TIMEOUT: Duration = Duration::from_secs(10);

/// An authenticated session on one server. Dropped when that server is done.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub headers: HeaderMap,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Exchanges credentials for a session token on `ctx`'s server.
///
/// A missing token in an otherwise valid payload means the credentials were
/// refused. Failures are logged against the server and never retried.
pub async fn authenticate<T: Transport>(
    ctx: &ServerContext<'_, T>,
    credentials: &Credentials,
) -> Result<Session, AuthError> {
    info!(server = %ctx.target, user = %credentials.username, "Requesting session token.");
    let result = request_token(ctx, credentials).await;
    if let Err(err) = &result {
        ctx.reporter.error(ctx.scope(), &format!("Error logging in/getting token: {err}"));
    }
    result
}

async fn request_token<T: Transport>(
    ctx: &ServerContext<'_, T>,
    credentials: &Credentials,
) -> Result<Session, AuthError> {
    let body = serde_json::json!({
        "username": credentials.username,
        "password": credentials.password,
    });
    let response = ctx.send(ApiRequest::post("session", &login_headers(), body)).await?;

    if matches!(response.status, 401 | 403) {
        return Err(AuthError::Rejected);
    }

    let payload: SessionResponse = response
        .json()
        .map_err(|e| AuthError::MalformedResponse(format!("HTTP {}: {e} ({})", response.status, response.excerpt())))?;

    match payload.token.filter(|t| !t.is_empty()) {
        Some(token) => {
            let headers = authenticated_headers(&token)?;
            debug!(server = %ctx.target, "Session established.");
            Ok(Session { token, headers })
        }
        None => Err(AuthError::Rejected),
    }
}

/// Releases the server-side session. Failure only warrants a warning.
///
/// Sent even when the server's work was cancelled, bounded by [`LOGOUT_TIMEOUT`].
pub async fn logout<T: Transport>(ctx: &ServerContext<'_, T>, session: &Session) {
    let request = ApiRequest::delete("session", &session.headers);
    match tokio::time::timeout(LOGOUT_TIMEOUT, ctx.transport.send(request)).await {
        Ok(Ok(response)) if response.is_success() => debug!(server = %ctx.target, "Session closed."),
        Ok(Ok(response)) => warn!(server = %ctx.target, status = response.status, "Logout was refused."),
        Ok(Err(e)) => warn!(server = %ctx.target, error = %e, "Logout failed."),
        Err(_) => warn!(server = %ctx.target, timeout_secs = LOGOUT_TIMEOUT.as_secs(), "Logout timed out."),
    }
}

fn login_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

/// The fixed header set sent with every authenticated request.
pub fn authenticated_headers(token: &str) -> Result<HeaderMap, AuthError> {
    let cookie = HeaderValue::from_str(&format!("token={token}"))
        .map_err(|_| AuthError::MalformedResponse("token contains invalid characters".to_string()))?;
    let user_agent = HeaderValue::from_str(&default_user_agent())
        .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, user_agent);
    headers.insert(TOKEN_HEADER, cookie);
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json,text/html;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-us,en;q=0.5"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}
