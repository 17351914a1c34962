//! Configuration types and loading for skillmine

mod backend;
mod loader;

pub use backend::{BackendConfig, mask_key};
#[allow(unused_imports)]
pub use loader::{
    AnalysisConfig, ExportConfig, IngestConfig, SkillmineConfig, StoreConfig, expand_path,
};
