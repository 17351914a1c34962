//! Fact store - durable storage for commit facts and author profiles

mod facts;
mod schema;

#[allow(unused_imports)]
pub use facts::{AuthorIdentity, AuthorStats, CommitFact, FactStore, StoredProfile};

#[cfg(test)]
pub(crate) use facts::tests::commit as test_commit;
