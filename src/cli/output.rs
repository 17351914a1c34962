//! Output handlers for CLI commands
//!
//! Supports console (pretty), JSON, and quiet output modes. Logs go to
//! stderr through tracing; these handlers carry the command results.

use crate::extract::IngestReport;
use crate::pipeline::AnalysisReport;
use serde::Serialize;

/// Output mode for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Console,
    Json,
    Quiet,
}

impl OutputMode {
    /// Pick the mode from the global flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if json {
            Self::Json
        } else if quiet {
            Self::Quiet
        } else {
            Self::Console
        }
    }
}

/// Events emitted by commands
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputEvent {
    Ingested {
        source: String,
        #[serde(flatten)]
        report: IngestReport,
    },
    Analyzed {
        #[serde(flatten)]
        report: AnalysisReport,
    },
    Exported {
        path: String,
        profiles: usize,
    },
    Author {
        email: String,
        name: String,
        commits: usize,
        has_profile: bool,
    },
    Check {
        name: String,
        ok: bool,
        detail: String,
    },
    Info {
        message: String,
    },
}

/// Output handler trait
pub trait OutputHandler: Send + Sync {
    /// Emit an event
    fn emit(&self, event: OutputEvent);
}

/// Human-readable output on stdout
pub struct ConsoleHandler;

impl OutputHandler for ConsoleHandler {
    fn emit(&self, event: OutputEvent) {
        match event {
            OutputEvent::Ingested { source, report } => {
                println!(
                    "Ingested {}: {} commits seen, {} new, {} batches",
                    source, report.seen, report.inserted, report.batches
                );
            }
            OutputEvent::Analyzed { report } => {
                println!(
                    "Analyzed {} authors ({} fallback); skipped {} existing, {} with too few commits, {} without email",
                    report.analyzed + report.fallbacks,
                    report.fallbacks,
                    report.skipped_existing,
                    report.skipped_few_commits,
                    report.skipped_no_email
                );
            }
            OutputEvent::Exported { path, profiles } => {
                println!("Exported {} profiles to {}", profiles, path);
            }
            OutputEvent::Author {
                email,
                name,
                commits,
                has_profile,
            } => {
                let mark = if has_profile { "✓" } else { " " };
                println!("{} {:>5}  {} <{}>", mark, commits, name, email);
            }
            OutputEvent::Check { name, ok, detail } => {
                let mark = if ok { "✓" } else { "✗" };
                println!("{} {}: {}", mark, name, detail);
            }
            OutputEvent::Info { message } => {
                println!("{}", message);
            }
        }
    }
}

/// One JSON object per line on stdout
pub struct JsonHandler;

impl OutputHandler for JsonHandler {
    fn emit(&self, event: OutputEvent) {
        if let Ok(line) = serde_json::to_string(&event) {
            println!("{}", line);
        }
    }
}

/// Handler that emits nothing
pub struct QuietHandler;

impl OutputHandler for QuietHandler {
    fn emit(&self, _event: OutputEvent) {}
}

/// Create an output handler based on mode
pub fn create_handler(mode: OutputMode) -> Box<dyn OutputHandler> {
    match mode {
        OutputMode::Console => Box::new(ConsoleHandler),
        OutputMode::Json => Box::new(JsonHandler),
        OutputMode::Quiet => Box::new(QuietHandler),
    }
}
