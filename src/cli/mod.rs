//! CLI module for skillmine
//!
//! This module provides:
//! - Command implementations (run, ingest, analyze, export, authors, doctor)
//! - Output handlers (console, JSON, quiet)

pub mod commands;
pub mod output;

pub use commands::{analyze, doctor, export, ingest, list_authors, run_pipeline};
pub use output::{OutputMode, create_handler};
