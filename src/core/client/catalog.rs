// src/core/client/catalog.rs

use tracing::{debug, info};

use crate::core::client::session::Session;
use crate::core::client::transport::{ApiRequest, Transport};
use crate::core::client::ServerContext;
use crate::core::error::CatalogError;
use crate::core::models::{Scan, ScanList};

/// Warning recorded when a server has nothing to export.
pub const EMPTY_CATALOG_WARNING: &str = "There are no reports to download!";

/// Fetches every scan job known to the server, in the order the server lists them.
///
/// An empty catalog is only a warning. Transport or decoding failures are
/// logged and returned; the caller abandons this server.
pub async fn list_scans<T: Transport>(
    ctx: &ServerContext<'_, T>,
    session: &Session,
) -> Result<Vec<Scan>, CatalogError> {
    let result = fetch(ctx, session).await;
    match &result {
        Ok(scans) if scans.is_empty() => ctx.reporter.warn(ctx.scope(), EMPTY_CATALOG_WARNING),
        Ok(scans) => {
            info!(server = %ctx.target, count = scans.len(), "Scan list retrieved.");
            ctx.reporter.scan_table(scans);
        }
        Err(err) => ctx.reporter.error(ctx.scope(), &format!("Error getting scan list: {err}")),
    }
    result
}

async fn fetch<T: Transport>(ctx: &ServerContext<'_, T>, session: &Session) -> Result<Vec<Scan>, CatalogError> {
    debug!(server = %ctx.target, "Requesting scan list.");
    let response = ctx.send(ApiRequest::get("scans", &session.headers)).await?;

    if !response.is_success() {
        return Err(CatalogError::Status { status: response.status, body: response.excerpt() });
    }

    let list: ScanList = response
        .json()
        .map_err(|e| CatalogError::MalformedResponse(format!("{e} ({})", response.excerpt())))?;
    Ok(list.into_scans())
}
