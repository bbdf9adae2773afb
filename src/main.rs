// src/main.rs

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use nessus_harvester::cli::Cli;
use nessus_harvester::config::Config;
use nessus_harvester::console::Reporter;
use nessus_harvester::core::client::transport::HttpConnector;
use nessus_harvester::core::runner::ServerRunner;
use nessus_harvester::{logging, prompt};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let reporter = Reporter::new(cli.verbose, cli.debug);

    if !cli.no_banner {
        reporter.banner();
    }

    // --- Setup: anything failing here is fatal, no server has been contacted yet ---
    let config = Config::load(&cli.config)?;
    std::fs::create_dir_all(config.dest_dir())
        .wrap_err_with(|| format!("could not create report folder {}", config.dest_dir().display()))?;
    let log_path = logging::initialize_logging(&config.log_dir(), cli.debug)?;

    if cli.debug {
        reporter.notice("\n[$] RUNNING IN DEBUGGING MODE");
        reporter.notice(&format!("[$] ALL DEBUGGING OUTPUT WILL BE SAVED TO '{}'", log_path.display()));
    }

    let credentials = prompt::credentials(cli.username.clone())?;
    let connector = HttpConnector::new(config.http_settings()?);
    let runner = ServerRunner::new(connector, config.run_settings(credentials), reporter);

    // Ctrl-C cancels every server's token; each server winds down on its own.
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling remaining work.");
                cancel.cancel();
            }
        }
    });

    // --- Run ---
    let servers = config.servers();
    info!(servers = servers.len(), dest = %config.dest_dir().display(), "Harvest starting.");
    let summary = runner.run(&servers, &cancel).await;
    reporter.run_finished(&summary);

    Ok(())
}
