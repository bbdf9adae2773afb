// src/console.rs

//! Terminal narration.
//!
//! A [`Reporter`] is handed to every component instead of relying on global
//! verbosity flags. Warnings and errors go to both the log file (through
//! `tracing`) and the terminal; progress narration is only printed in verbose
//! mode and HTTP diagnostics only in debug mode.

use std::io::{stdout, Write};
use std::time::Duration;

use crossterm::{
    style::Stylize,
    terminal::{Clear, ClearType},
    cursor::MoveTo,
    ExecutableCommand,
};
use tracing::{debug, error, warn};

use crate::core::models::{format_listing_date, ExportFormat, Scan};
use crate::summary::{format_elapsed, RunSummary, ServerOutcome, ServerSummary};

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

const BANNER: &str = r#"
::::    ::: :::    :::
:+:+:   :+: :+:    :+:
:+:+:+  +:+ +:+    +:+
+#+ +:+ +#+ +#++:++#++    -> NESSUS HARVESTER
+#+  +#+#+# +#+    +#+    -> bulk report export & download
#+#   #+#+# #+#    #+#
###    #### ###    ###
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Nothing on the terminal; log file only.
    Silent,
    Normal,
    Verbose,
    Debug,
}

/// Where a message comes from: always a server, sometimes a scan and format.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub server: &'a str,
    pub scan: Option<&'a str>,
    pub format: Option<ExportFormat>,
}

impl<'a> Scope<'a> {
    pub fn server(server: &'a str) -> Self {
        Self { server, scan: None, format: None }
    }

    pub fn scan(mut self, scan: &'a str) -> Self {
        self.scan = Some(scan);
        self
    }

    pub fn format(mut self, format: ExportFormat) -> Self {
        self.format = Some(format);
        self
    }

    fn label(&self) -> String {
        match (self.scan, self.format) {
            (Some(scan), Some(format)) => format!("{} [{} / {}]", self.server, scan, format),
            (Some(scan), None) => format!("{} [{}]", self.server, scan),
            _ => self.server.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    verbosity: Verbosity,
}

impl Reporter {
    /// `debug` implies `verbose`.
    pub fn new(verbose: bool, debug: bool) -> Self {
        let verbosity = match (verbose, debug) {
            (_, true) => Verbosity::Debug,
            (true, false) => Verbosity::Verbose,
            _ => Verbosity::Normal,
        };
        Self { verbosity }
    }

    pub fn silent() -> Self {
        Self { verbosity: Verbosity::Silent }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity >= Verbosity::Verbose
    }

    pub fn is_debug(&self) -> bool {
        self.verbosity >= Verbosity::Debug
    }

    fn prints(&self) -> bool {
        self.verbosity > Verbosity::Silent
    }

    // --- Always shown ---

    pub fn banner(&self) {
        if !self.prints() {
            return;
        }
        let mut out = stdout();
        // Clearing is cosmetic; a dumb terminal just gets the banner appended.
        let _ = out.execute(Clear(ClearType::All));
        let _ = out.execute(MoveTo(0, 0));
        println!("{}", BANNER.cyan());
    }

    pub fn notice(&self, message: &str) {
        if self.prints() {
            println!("{message}");
        }
    }

    pub fn warn(&self, scope: Scope<'_>, message: &str) {
        warn!(
            server = scope.server,
            scan = scope.scan,
            format = scope.format.map(|f| f.extension()),
            "{message}"
        );
        if self.prints() {
            println!("\n{} {}: {}", "[!] WARNING".yellow().bold(), scope.label(), message);
        }
    }

    pub fn error(&self, scope: Scope<'_>, message: &str) {
        error!(
            server = scope.server,
            scan = scope.scan,
            format = scope.format.map(|f| f.extension()),
            "{message}"
        );
        if self.prints() {
            println!("\n{} {}: {}", "[!] ERROR".red().bold(), scope.label(), message);
        }
    }

    // --- Verbose narration ---

    pub fn progress(&self, message: &str) {
        if self.is_verbose() {
            println!("{} {}", "[+]".green(), message);
        }
    }

    /// Redraws the "generating report" spinner on the current line.
    pub fn poll_tick(&self, attempt: u32) {
        if self.is_verbose() {
            print!("\r{} Generating report on server... {}", "[+]".green(), SPINNER[attempt as usize % SPINNER.len()]);
            let _ = stdout().flush();
        }
    }

    pub fn poll_done(&self) {
        if self.is_verbose() {
            println!("\r{} Generating report on server... DONE!", "[+]".green());
        }
    }

    pub fn scan_table(&self, scans: &[Scan]) {
        if !self.is_verbose() {
            return;
        }
        println!("\n{:<7} {:<50} {:<30} {:<15}", "Scan ID", "Name", "Last Modified", "Status");
        println!("{:<7} {:<50} {:<30} {:<15}", "-------", "----", "-------------", "------");
        for scan in scans {
            println!(
                "{:<7} {:<50} {:<30} {:<15}",
                scan.id,
                scan.name,
                format_listing_date(scan.last_modified_epoch),
                scan.status
            );
        }
    }

    // --- Debug diagnostics ---

    pub fn response_diagnostics(&self, scope: Scope<'_>, elapsed: Duration, status: u16, size: usize) {
        debug!(
            server = scope.server,
            scan = scope.scan,
            response_time = %format_elapsed(elapsed),
            status,
            size,
            "Download response received."
        );
        if self.is_debug() {
            println!("\n{}", "==== START DEBUGGING INFO ====".magenta());
            println!("HTTP Response Time: {}", format_elapsed(elapsed));
            println!("HTTP Response Code: {status}");
            println!("HTTP Response Size: {size} bytes");
            println!("{}", "==== END DEBUGGING INFO ====".magenta());
        }
    }

    // --- Summaries ---

    pub fn server_finished(&self, summary: &ServerSummary) {
        if !self.prints() {
            return;
        }
        let host = &summary.target.host;
        let elapsed = format_elapsed(summary.elapsed);
        println!("\n===");
        match &summary.outcome {
            ServerOutcome::Completed => println!(
                "{} Download from {} complete! ({}) {}",
                "[*] SUCCESS:".green().bold(),
                host,
                elapsed,
                summary.status_line()
            ),
            _ => println!("{} {} {} ({})", "[!] ABANDONED:".red().bold(), host, summary.status_line(), elapsed),
        }
        println!("===");
    }

    pub fn run_finished(&self, run: &RunSummary) {
        if !self.prints() {
            return;
        }
        let headline = format!(
            "[*] Report Download Phase Complete for All Servers! ({})",
            format_elapsed(run.elapsed)
        );
        let outline = "*".repeat(headline.chars().count());
        println!("\n{outline}");
        println!("{}", headline.as_str().bold());
        for server in &run.servers {
            println!("    {:<30} {}", server.target.host, server.status_line());
        }
        println!(
            "    {} report(s) saved, {} export(s) failed, {}/{} server(s) completed",
            run.artifact_count(),
            run.export_failure_count(),
            run.completed_servers(),
            run.servers.len()
        );
        println!("{outline}\n");
    }
}
