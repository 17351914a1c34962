//! Profile synthesis: commit messages in, structured skill profile out

mod model;
mod prompt;
mod synthesizer;

#[allow(unused_imports)]
pub use model::{AuthorProfile, FALLBACK_SUMMARY, ParseError, SkillSet, parse_profile};
#[allow(unused_imports)]
pub use prompt::{TRUNCATION_MARKER, build_commit_blob};
pub use synthesizer::{Outcome, ProfileSynthesizer, Synthesis};
