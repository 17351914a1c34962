//! Pipeline runner - sequences ingestion, analysis and export

use crate::config::SkillmineConfig;
use crate::extract::{CommitExtractor, CommitSource, GitLogSource, IngestReport, RepoLocation};
use crate::profile::ProfileSynthesizer;
use crate::store::FactStore;
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Outcome counts for one analysis pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    /// Authors whose model output validated
    pub analyzed: usize,
    /// Authors saved with the fallback profile
    pub fallbacks: usize,
    pub skipped_no_email: usize,
    pub skipped_existing: usize,
    pub skipped_few_commits: usize,
}

/// Totals for a full run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub ingest: IngestReport,
    pub analysis: AnalysisReport,
    pub exported: usize,
}

/// Owns the fact store and drives each phase against it
pub struct Pipeline {
    config: Arc<SkillmineConfig>,
    store: FactStore,
}

impl Pipeline {
    pub fn new(config: Arc<SkillmineConfig>, store: FactStore) -> Self {
        Self { config, store }
    }

    /// Open the configured store
    pub fn open(config: Arc<SkillmineConfig>) -> Result<Self> {
        let path = config.store_path()?;
        let store = FactStore::open(&path)
            .with_context(|| format!("opening fact store {}", path.display()))?;
        Ok(Self::new(config, store))
    }

    pub fn store(&self) -> &FactStore {
        &self.store
    }

    /// Ingest everything `source` yields
    pub async fn ingest(&mut self, source: &mut dyn CommitSource) -> Result<IngestReport> {
        CommitExtractor::new(self.config.ingest.batch_size)
            .ingest(source, &mut self.store)
            .await
    }

    /// Resolve `location` and ingest its full history.
    ///
    /// A remote clone lives only for the duration of this call.
    pub async fn ingest_location(&mut self, location: &RepoLocation) -> Result<IngestReport> {
        tracing::info!(source = %location, "Phase: ingestion");

        let checkout = location
            .checkout()
            .await
            .with_context(|| format!("preparing repository {}", location))?;
        let mut source = GitLogSource::open(checkout.path())
            .await
            .with_context(|| format!("opening repository {}", checkout.path().display()))?;

        self.ingest(&mut source).await
    }

    /// Analyze every author that has enough history and no profile yet
    pub async fn analyze(&mut self, synthesizer: &ProfileSynthesizer) -> Result<AnalysisReport> {
        let mut report = AnalysisReport::default();
        let min_commits = self.config.analysis.min_commits;
        let delay = self.config.analysis.delay();

        let authors = self.store.list_distinct_authors()?;
        tracing::info!(
            authors = authors.len(),
            backend = synthesizer.backend_name(),
            "Phase: analysis"
        );

        for author in authors {
            if author.email.trim().is_empty() {
                tracing::debug!(name = %author.name, "Skipping author without email");
                report.skipped_no_email += 1;
                continue;
            }

            if self.store.has_profile(&author.email)? {
                tracing::info!(email = %author.email, "Skipping, already analyzed");
                report.skipped_existing += 1;
                continue;
            }

            let messages = self.store.messages_for_author(&author.email)?;
            if messages.len() < min_commits {
                tracing::info!(
                    email = %author.email,
                    commits = messages.len(),
                    min_commits,
                    "Skipping, too few commits"
                );
                report.skipped_few_commits += 1;
                continue;
            }

            tracing::info!(
                email = %author.email,
                name = %author.name,
                commits = messages.len(),
                "Analyzing author"
            );

            let synthesis = synthesizer
                .synthesize(&author.name, &author.email, &messages)
                .await;

            tracing::info!(email = %author.email, raw = %synthesis.raw_text, "Model response");

            self.store.save_profile(
                &author.email,
                &author.name,
                &synthesis.profile,
                &synthesis.raw_text,
            )?;

            if synthesis.is_fallback() {
                report.fallbacks += 1;
            } else {
                report.analyzed += 1;
            }

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        tracing::info!(
            analyzed = report.analyzed,
            fallbacks = report.fallbacks,
            skipped_existing = report.skipped_existing,
            skipped_few_commits = report.skipped_few_commits,
            skipped_no_email = report.skipped_no_email,
            "Analysis complete"
        );

        Ok(report)
    }

    /// Write every stored profile to `path` as a JSON array, replacing any
    /// previous export. Returns the number of profiles written.
    pub fn export(&self, path: &Path) -> Result<usize> {
        tracing::info!(path = %path.display(), "Phase: export");

        let profiles = self.store.all_profiles()?;
        let json = serde_json::to_string_pretty(&profiles)?;

        let parent = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating export directory {}", parent.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("creating temporary file in {}", parent.display()))?;
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        match_target_permissions(tmp.as_file(), path)?;
        tmp.persist(path)
            .with_context(|| format!("writing export {}", path.display()))?;

        tracing::info!(path = %path.display(), profiles = profiles.len(), "Export written");
        Ok(profiles.len())
    }

    /// Ingest, analyze and export in order
    pub async fn run(
        &mut self,
        location: &RepoLocation,
        synthesizer: &ProfileSynthesizer,
        export_path: &Path,
    ) -> Result<RunReport> {
        let ingest = self.ingest_location(location).await?;
        let analysis = self.analyze(synthesizer).await?;
        let exported = self.export(export_path)?;

        Ok(RunReport {
            ingest,
            analysis,
            exported,
        })
    }
}

/// Mode for an export that replaces no existing file
#[cfg(unix)]
const EXPORT_MODE: u32 = 0o644;

/// Temp files are created owner-only; give the export the replaced file's
/// mode, or a world-readable one when there is nothing to replace.
#[cfg(unix)]
fn match_target_permissions(file: &std::fs::File, target: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(target)
        .map(|meta| meta.permissions().mode() & 0o777)
        .unwrap_or(EXPORT_MODE);
    file.set_permissions(std::fs::Permissions::from_mode(mode))
        .with_context(|| format!("setting permissions for {}", target.display()))?;
    Ok(())
}

#[cfg(not(unix))]
fn match_target_permissions(_file: &std::fs::File, _target: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend_executor::BackendError;
    use crate::backend_executor::mock::MockBackend;
    use crate::extract::VecSource;
    use crate::extract::source::tests::{fixture_repo, git_available, raw};
    use crate::profile::AuthorProfile;
    use tempfile::TempDir;

    const REPLY: &str = r#"{"name": "x", "email": "x", "summary": "Auth developer.",
        "skills": {"specific_integrations": ["Auth0"], "domain_concepts": ["Session Management"],
                   "technical_stack": ["Express.js"]}}"#;

    fn test_config() -> Arc<SkillmineConfig> {
        let mut config = SkillmineConfig::default();
        config.analysis.delay_ms = 0;
        Arc::new(config)
    }

    fn synthesizer(backend: MockBackend) -> ProfileSynthesizer {
        ProfileSynthesizer::new(Box::new(backend), 12_000)
    }

    async fn seeded(commits: Vec<crate::extract::RawCommit>) -> Pipeline {
        let mut pipeline = Pipeline::new(test_config(), FactStore::open_in_memory().unwrap());
        pipeline.ingest(&mut VecSource::new(commits)).await.unwrap();
        pipeline
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let mut pipeline = seeded(vec![
            raw("c3", "a@x.com", 300, "feat: add logout"),
            raw("c2", "a@x.com", 200, "fix: bug"),
            raw("c1", "a@x.com", 100, "feat: add login"),
            raw("d1", "b@y.com", 150, "docs: typo"),
        ])
        .await;

        let backend = MockBackend::replying(REPLY);
        let prompts = backend.prompts();
        let report = pipeline.analyze(&synthesizer(backend)).await.unwrap();

        assert_eq!(report.analyzed, 1);
        assert_eq!(report.skipped_few_commits, 1);

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("- feat: add logout\n- fix: bug\n- feat: add login"));
        assert_eq!(prompts[0].lines().filter(|l| l.starts_with("- ")).count(), 3);

        assert!(pipeline.store().has_profile("a@x.com").unwrap());
        assert!(!pipeline.store().has_profile("b@y.com").unwrap());

        let dir = TempDir::new().unwrap();
        let out = dir.path().join("final_analysis_results.json");
        assert_eq!(pipeline.export(&out).unwrap(), 1);

        let exported: Vec<AuthorProfile> =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].email, "a@x.com");
        assert_eq!(exported[0].skills.specific_integrations, vec!["Auth0"]);
    }

    #[tokio::test]
    async fn test_resume_skips_analyzed_authors() {
        let mut pipeline = seeded(vec![
            raw("c1", "a@x.com", 1, "feat: one"),
            raw("c2", "a@x.com", 2, "feat: two"),
        ])
        .await;

        pipeline
            .analyze(&synthesizer(MockBackend::replying(REPLY)))
            .await
            .unwrap();
        let before = pipeline.store().get_profile("a@x.com").unwrap().unwrap();

        let backend = MockBackend::replying("{\"should\": \"not be called\"}");
        let prompts = backend.prompts();
        let report = pipeline.analyze(&synthesizer(backend)).await.unwrap();

        assert_eq!(report.skipped_existing, 1);
        assert_eq!(report.analyzed + report.fallbacks, 0);
        assert!(prompts.lock().unwrap().is_empty());

        let after = pipeline.store().get_profile("a@x.com").unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_commit_threshold() {
        let mut pipeline = seeded(vec![
            raw("s1", "solo@x.com", 1, "chore: init"),
            raw("p1", "pair@x.com", 2, "feat: a"),
            raw("p2", "pair@x.com", 3, "feat: b"),
        ])
        .await;

        let backend = MockBackend::replying(REPLY);
        let prompts = backend.prompts();
        let report = pipeline.analyze(&synthesizer(backend)).await.unwrap();

        assert_eq!(report.analyzed, 1);
        assert_eq!(report.skipped_few_commits, 1);
        assert_eq!(prompts.lock().unwrap().len(), 1);
        assert!(pipeline.store().has_profile("pair@x.com").unwrap());
        assert!(!pipeline.store().has_profile("solo@x.com").unwrap());
    }

    #[tokio::test]
    async fn test_failures_are_saved_as_fallback_and_loop_continues() {
        let mut pipeline = seeded(vec![
            raw("a1", "a@x.com", 1, "feat: a"),
            raw("a2", "a@x.com", 2, "feat: b"),
            raw("b1", "b@y.com", 3, "feat: c"),
            raw("b2", "b@y.com", 4, "feat: d"),
        ])
        .await;

        let backend = MockBackend::replying(REPLY)
            .then(Err(BackendError::network("connection reset")));
        let report = pipeline.analyze(&synthesizer(backend)).await.unwrap();

        assert_eq!(report.fallbacks, 1);
        assert_eq!(report.analyzed, 1);

        let stored = pipeline.store().all_profiles().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored.iter().filter(|p| p.is_fallback()).count(), 1);

        let failed = stored.iter().find(|p| p.is_fallback()).unwrap();
        let row = pipeline.store().get_profile(&failed.email).unwrap().unwrap();
        assert!(row.raw_response.unwrap().starts_with("Error: network error"));
    }

    #[tokio::test]
    async fn test_authors_without_email_are_skipped() {
        let mut pipeline = seeded(vec![
            raw("n1", "", 1, "chore: a"),
            raw("n2", "", 2, "chore: b"),
        ])
        .await;

        let backend = MockBackend::replying(REPLY);
        let prompts = backend.prompts();
        let report = pipeline.analyze(&synthesizer(backend)).await.unwrap();

        assert_eq!(report.skipped_no_email, 1);
        assert!(prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_overwrites_previous_file() {
        let pipeline = seeded(Vec::new()).await;
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("nested").join("out.json");

        std::fs::create_dir_all(out.parent().unwrap()).unwrap();
        std::fs::write(&out, "stale").unwrap();

        assert_eq!(pipeline.export(&out).unwrap(), 0);
        let exported: Vec<AuthorProfile> =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert!(exported.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_export_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let pipeline = seeded(Vec::new()).await;
        let dir = TempDir::new().unwrap();
        fn mode_of(path: &Path) -> u32 {
            std::fs::metadata(path).unwrap().permissions().mode() & 0o777
        }

        let fresh = dir.path().join("fresh.json");
        pipeline.export(&fresh).unwrap();
        assert_eq!(mode_of(&fresh), 0o644);

        let existing = dir.path().join("existing.json");
        std::fs::write(&existing, "stale").unwrap();
        std::fs::set_permissions(&existing, std::fs::Permissions::from_mode(0o640)).unwrap();
        pipeline.export(&existing).unwrap();
        assert_eq!(mode_of(&existing), 0o640);
    }

    #[tokio::test]
    async fn test_run_against_git_repository() {
        if !git_available().await {
            return;
        }
        let repo = fixture_repo().await;
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("results.json");

        let mut pipeline = Pipeline::new(test_config(), FactStore::open_in_memory().unwrap());
        let location = RepoLocation::Local(repo.path().to_path_buf());
        let synth = synthesizer(MockBackend::replying(REPLY));

        let first = pipeline.run(&location, &synth, &out).await.unwrap();
        assert_eq!(first.ingest.inserted, 2);
        assert_eq!(first.analysis.analyzed, 1);
        assert_eq!(first.exported, 1);

        let second = pipeline.run(&location, &synth, &out).await.unwrap();
        assert_eq!(second.ingest.seen, 2);
        assert_eq!(second.ingest.inserted, 0);
        assert_eq!(second.analysis.skipped_existing, 1);
        assert_eq!(second.exported, 1);
    }

    #[tokio::test]
    async fn test_missing_local_repository_is_fatal() {
        if !git_available().await {
            return;
        }
        let dir = TempDir::new().unwrap();
        let mut pipeline = Pipeline::new(test_config(), FactStore::open_in_memory().unwrap());

        let err = pipeline
            .ingest_location(&RepoLocation::Local(dir.path().join("missing")))
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("missing"));
    }
}
