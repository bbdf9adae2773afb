// src/core/client/mod.rs

// Talks to a single appliance: one module per stage of the harvesting
// workflow, all sharing the same per-server context.
pub mod catalog;
pub mod export;
pub mod poll;
pub mod session;
pub mod transport;

use tokio_util::sync::CancellationToken;

use crate::console::{Reporter, Scope};
use crate::core::error::TransportError;
use crate::core::models::ServerTarget;
use self::transport::{send_cancellable, ApiRequest, ApiResponse, Transport};

/// Everything a stage needs to talk to one server.
///
/// Lives only for the duration of that server's processing; nothing in it is
/// shared with another server.
pub struct ServerContext<'a, T: Transport> {
    pub target: &'a ServerTarget,
    pub transport: &'a T,
    pub cancel: &'a CancellationToken,
    pub reporter: Reporter,
}

impl<'a, T: Transport> ServerContext<'a, T> {
    pub fn host(&self) -> &str {
        &self.target.host
    }

    pub fn scope(&self) -> Scope<'_> {
        Scope::server(self.host())
    }

    /// Sends `request`, aborting early if this server's work is cancelled.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        send_cancellable(self.transport, request, self.cancel).await
    }
}
