//! Commit extraction: traverse a repository and feed the fact store

mod error;
mod extractor;
mod location;
mod parser;
pub(crate) mod source;

pub use error::ExtractError;
pub use extractor::{CommitExtractor, IngestReport};
pub use location::{Checkout, RepoLocation};
#[allow(unused_imports)]
pub use source::{CommitSource, GitLogSource, RawCommit, VecSource};
