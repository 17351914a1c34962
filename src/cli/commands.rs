//! CLI command implementations

use super::output::{OutputEvent, OutputHandler};
use crate::backend_executor::{BackendRequest, create_executor};
use crate::config::{SkillmineConfig, expand_path, mask_key};
use crate::extract::RepoLocation;
use crate::pipeline::Pipeline;
use crate::process::run_captured;
use crate::profile::ProfileSynthesizer;
use crate::template::TemplateEngine;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Resolve the repository argument, falling back to the configured default
pub fn resolve_source(config: &SkillmineConfig, source: Option<&str>) -> Result<RepoLocation> {
    let raw = source.unwrap_or(&config.ingest.default_source);
    Ok(match RepoLocation::parse(raw) {
        RepoLocation::Local(path) => RepoLocation::Local(expand_path(&path.to_string_lossy())?),
        remote => remote,
    })
}

fn build_synthesizer(config: &SkillmineConfig) -> Result<ProfileSynthesizer> {
    let backend = create_executor(&config.backend).context("creating model backend")?;
    ProfileSynthesizer::from_config(backend, config)
}

/// Ingest, analyze and export
pub async fn run_pipeline(
    config: Arc<SkillmineConfig>,
    source: Option<&str>,
    handler: &dyn OutputHandler,
) -> Result<i32> {
    let location = resolve_source(&config, source)?;
    // Fail on a bad template or backend before spending time on ingestion
    let synthesizer = build_synthesizer(&config)?;
    let export_path = config.export_path()?;

    let mut pipeline = Pipeline::open(config)?;
    let report = pipeline.run(&location, &synthesizer, &export_path).await?;

    handler.emit(OutputEvent::Ingested {
        source: location.to_string(),
        report: report.ingest,
    });
    handler.emit(OutputEvent::Analyzed {
        report: report.analysis,
    });
    handler.emit(OutputEvent::Exported {
        path: export_path.display().to_string(),
        profiles: report.exported,
    });

    Ok(0)
}

/// Ingestion only
pub async fn ingest(
    config: Arc<SkillmineConfig>,
    source: Option<&str>,
    handler: &dyn OutputHandler,
) -> Result<i32> {
    let location = resolve_source(&config, source)?;
    let mut pipeline = Pipeline::open(config)?;
    let report = pipeline.ingest_location(&location).await?;

    handler.emit(OutputEvent::Ingested {
        source: location.to_string(),
        report,
    });
    Ok(0)
}

/// Analysis only, over whatever the store already holds
pub async fn analyze(config: Arc<SkillmineConfig>, handler: &dyn OutputHandler) -> Result<i32> {
    let synthesizer = build_synthesizer(&config)?;
    let mut pipeline = Pipeline::open(config)?;
    let report = pipeline.analyze(&synthesizer).await?;

    handler.emit(OutputEvent::Analyzed { report });
    Ok(0)
}

/// Export only
pub fn export(config: Arc<SkillmineConfig>, handler: &dyn OutputHandler) -> Result<i32> {
    let path = config.export_path()?;
    let pipeline = Pipeline::open(config)?;
    let profiles = pipeline.export(&path)?;

    handler.emit(OutputEvent::Exported {
        path: path.display().to_string(),
        profiles,
    });
    Ok(0)
}

/// List authors with commit counts and profile status
pub fn list_authors(config: Arc<SkillmineConfig>, handler: &dyn OutputHandler) -> Result<i32> {
    let pipeline = Pipeline::open(config)?;
    let stats = pipeline.store().author_stats()?;

    if stats.is_empty() {
        handler.emit(OutputEvent::Info {
            message: "(no commits ingested)".into(),
        });
    }

    for author in stats {
        handler.emit(OutputEvent::Author {
            email: author.email,
            name: author.name,
            commits: author.commits,
            has_profile: author.has_profile,
        });
    }
    Ok(0)
}

fn check(handler: &dyn OutputHandler, name: &str, ok: bool, detail: impl Into<String>) -> bool {
    handler.emit(OutputEvent::Check {
        name: name.to_string(),
        ok,
        detail: detail.into(),
    });
    ok
}

/// Check configuration, git, and backend reachability
pub async fn doctor(config: &SkillmineConfig, probe: bool, handler: &dyn OutputHandler) -> i32 {
    let mut all_ok = true;

    match config.store_path() {
        Ok(path) => check(handler, "store", true, path.display().to_string()),
        Err(e) => {
            all_ok = false;
            check(handler, "store", false, format!("{:#}", e))
        }
    };

    let git = run_captured(tokio::process::Command::new("git").arg("--version")).await;
    all_ok &= match git {
        Ok(output) if output.success() => check(handler, "git", true, output.stdout.trim()),
        Ok(output) => check(handler, "git", false, output.stderr.trim()),
        Err(e) => check(handler, "git", false, e.to_string()),
    };

    // A missing key is reported but not fatal: local servers need none
    match config.backend.resolve_api_key() {
        Some(key) => check(handler, "api key", true, mask_key(&key)),
        None => check(
            handler,
            "api key",
            true,
            format!("not set (inline or ${})", config.backend.api_key_env),
        ),
    };

    all_ok &= match config.prompt_template_path() {
        Ok(None) => check(handler, "prompt template", true, "built-in"),
        Ok(Some(path)) => match TemplateEngine::new().load_file(&path) {
            Ok(_) => check(handler, "prompt template", true, path.display().to_string()),
            Err(e) => check(handler, "prompt template", false, e.to_string()),
        },
        Err(e) => check(handler, "prompt template", false, format!("{:#}", e)),
    };

    let backend = match create_executor(&config.backend) {
        Ok(backend) => backend,
        Err(e) => {
            check(handler, "backend", false, e.to_string());
            return 1;
        }
    };

    let target = format!("{} ({})", config.backend.base_url, config.backend.model);
    all_ok &= if backend.is_available().await {
        check(handler, "backend", true, format!("{} reachable", target))
    } else {
        check(handler, "backend", false, format!("{} unreachable", target))
    };

    if probe {
        let started = Instant::now();
        let request = BackendRequest::new("Reply with the single word OK.")
            .with_timeout(Duration::from_secs(60));
        all_ok &= match backend.execute(&request).await {
            Ok(response) => {
                let preview: String = response.text.trim().chars().take(60).collect();
                check(
                    handler,
                    "probe",
                    true,
                    format!("{:?} in {:.1}s", preview, started.elapsed().as_secs_f64()),
                )
            }
            Err(e) => check(handler, "probe", false, e.to_string()),
        };
    }

    tracing::debug!(backend = backend.name(), all_ok, "Doctor finished");

    if all_ok { 0 } else { 1 }
}
