// src/core/mod.rs

// The `core` module holds everything that talks to the appliances; the
// top-level modules around it (config, logging, console, cli) only feed it.

/// Data structures shared across the workflow: servers, scans, export jobs
/// and the artifacts written to disk.
pub mod models;

/// Typed errors for each stage of the workflow.
pub mod error;

/// Per-server API client: transport, session, catalog, polling and export.
pub mod client;

/// Sequences the client stages across all configured servers.
pub mod runner;
