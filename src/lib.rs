// src/lib.rs

//! Bulk export and download of scan reports from Nessus appliances.
//!
//! For every configured server the harvester logs in, lists the scan jobs and,
//! for each completed scan, asks the server to export a `.nessus`, `.csv` and
//! `.pdf` report, waits for the export to be generated and saves it locally.
//! A failure on one server, scan or format never stops the others.

pub mod cli;
pub mod config;
pub mod console;
pub mod core;
pub mod logging;
pub mod prompt;
pub mod summary;
