//! Orchestration of the ingest, analyze and export phases

mod runner;

pub use runner::{AnalysisReport, Pipeline, RunReport};
