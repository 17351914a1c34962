//! Configuration loading with multi-layer merge

use super::BackendConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level skillmine configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SkillmineConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub backend: BackendConfig,
}

/// Location of the SQLite fact store
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

/// Location of the exported profile document
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    #[serde(default = "default_export_path")]
    pub path: String,
}

/// Commit ingestion settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    /// Commits per store transaction
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Repository used when no source argument is given
    #[serde(default = "default_source")]
    pub default_source: String,
}

/// Per-author analysis settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Authors with fewer commit messages are skipped
    #[serde(default = "default_min_commits")]
    pub min_commits: usize,

    /// Maximum characters of commit text sent to the model
    #[serde(default = "default_char_budget")]
    pub char_budget: usize,

    /// Pause between analyzed authors, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Custom minijinja prompt template file
    pub prompt_template: Option<String>,
}

fn default_store_path() -> String {
    "repo_data.db".into()
}

fn default_export_path() -> String {
    "final_analysis_results.json".into()
}

fn default_batch_size() -> usize {
    100
}

fn default_source() -> String {
    "temp_netlex_repo".into()
}

fn default_min_commits() -> usize {
    2
}

fn default_char_budget() -> usize {
    12_000
}

fn default_delay_ms() -> u64 {
    1000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: default_export_path(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            default_source: default_source(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_commits: default_min_commits(),
            char_budget: default_char_budget(),
            delay_ms: default_delay_ms(),
            prompt_template: None,
        }
    }
}

impl AnalysisConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl SkillmineConfig {
    /// Load configuration from the standard hierarchy
    ///
    /// Load order (later overrides earlier, key by key):
    /// 1. Built-in defaults
    /// 2. ~/.config/skillmine/config.toml
    /// 3. ./skillmine.toml
    /// 4. `explicit`, if given (must exist)
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut layers = Vec::new();

        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                layers.push(user_config_path);
            }
        }

        let project_config_path = PathBuf::from("skillmine.toml");
        if project_config_path.exists() {
            layers.push(project_config_path);
        }

        if let Some(path) = explicit {
            layers.push(path.to_path_buf());
        }

        Self::load_layers(&layers)
    }

    /// Merge config files in order and deserialize the result once.
    ///
    /// Keys a layer leaves out keep the value from earlier layers, so a
    /// project file setting only `backend.model` does not drop a user-level
    /// `backend.api_key`.
    pub fn load_layers(paths: &[PathBuf]) -> Result<Self> {
        let mut merged = toml::Table::new();
        for path in paths {
            let layer = read_layer(path).with_context(|| format!("loading {}", path.display()))?;
            merge_tables(&mut merged, layer);
        }

        let config = toml::Value::Table(merged)
            .try_into::<Self>()
            .context("combining configuration layers")?;
        config.validate()?;
        Ok(config)
    }

    /// Get the user config path (~/.config/skillmine/config.toml)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("skillmine/config.toml"))
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.ingest.batch_size == 0 {
            anyhow::bail!("ingest.batch_size must be at least 1");
        }
        if self.analysis.char_budget == 0 {
            anyhow::bail!("analysis.char_budget must be at least 1");
        }
        if !self.backend.is_http() {
            anyhow::bail!(
                "backend.base_url must be an http(s) URL, got '{}'",
                self.backend.base_url
            );
        }
        Ok(())
    }

    /// Fact store path with `~` and `$VAR` expanded
    pub fn store_path(&self) -> Result<PathBuf> {
        expand_path(&self.store.path)
    }

    /// Export path with `~` and `$VAR` expanded
    pub fn export_path(&self) -> Result<PathBuf> {
        expand_path(&self.export.path)
    }

    /// Custom prompt template path, if configured
    pub fn prompt_template_path(&self) -> Result<Option<PathBuf>> {
        self.analysis
            .prompt_template
            .as_deref()
            .map(expand_path)
            .transpose()
    }
}

/// Read one layer as a raw table, rejecting unknown keys up front
fn read_layer(path: &Path) -> Result<toml::Table> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let table: toml::Table =
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    toml::Value::Table(table.clone())
        .try_into::<SkillmineConfig>()
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(table)
}

/// Recursively overlay `overlay` onto `base`; nested tables merge, anything else replaces
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(nested) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, nested);
                } else {
                    base.insert(key, toml::Value::Table(nested));
                }
            }
            other => {
                base.insert(key, other);
            }
        }
    }
}

/// Expand `~` and environment variables in a configured path
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded =
        shellexpand::full(raw).with_context(|| format!("expanding path '{}'", raw))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
