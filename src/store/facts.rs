//! Fact store: commit facts and derived author profiles

use super::schema::init_schema;
use crate::profile::AuthorProfile;
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

/// An immutable, normalized record of one commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFact {
    pub hash: String,
    pub author_name: String,
    pub author_email: String,
    /// Commit time, seconds since the epoch
    pub timestamp: i64,
    pub message: String,
    pub files_changed: Vec<String>,
}

/// A distinct author as observed in the commit facts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorIdentity {
    pub email: String,
    /// Name on the author's most recent commit
    pub name: String,
}

/// A stored profile row, including the audit text
#[derive(Debug, Clone, PartialEq)]
pub struct StoredProfile {
    pub email: String,
    pub name: String,
    pub profile_json: String,
    pub raw_response: Option<String>,
    pub last_updated: i64,
}

/// Per-author summary for status listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorStats {
    pub email: String,
    pub name: String,
    pub commits: usize,
    pub has_profile: bool,
}

/// SQLite-backed store owning both the commit and profile tables
pub struct FactStore {
    conn: Connection,
}

impl FactStore {
    /// Open or create the store at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open fact store at {}", path.display()))?;

        init_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory fact store")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Insert a batch of commits in one transaction, ignoring known hashes.
    ///
    /// Returns the number of rows that were new.
    pub fn insert_commits(&mut self, batch: &[CommitFact]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO commits
                 (hash, author_name, author_email, date_timestamp, message, files_changed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;

            for commit in batch {
                let files_json = serde_json::to_string(&commit.files_changed)?;
                inserted += stmt.execute((
                    &commit.hash,
                    &commit.author_name,
                    &commit.author_email,
                    commit.timestamp,
                    &commit.message,
                    &files_json,
                ))?;
            }
        }

        tx.commit().context("Failed to commit batch")?;
        Ok(inserted)
    }

    /// Total number of commit facts
    pub fn commit_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM commits", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Look up one commit fact by hash
    pub fn get_commit(&self, hash: &str) -> Result<Option<CommitFact>> {
        let row: Option<(String, String, String, i64, String, String)> = self
            .conn
            .query_row(
                "SELECT hash, author_name, author_email, date_timestamp, message, files_changed
                 FROM commits WHERE hash = ?1",
                [hash],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(hash, author_name, author_email, timestamp, message, files)| {
            let files_changed: Vec<String> = serde_json::from_str(&files)
                .with_context(|| format!("Corrupt file list for commit {}", hash))?;
            Ok(CommitFact {
                hash,
                author_name,
                author_email,
                timestamp,
                message,
                files_changed,
            })
        })
        .transpose()
    }

    /// Distinct authors, one per email, named as on their newest commit
    pub fn list_distinct_authors(&self) -> Result<Vec<AuthorIdentity>> {
        // SQLite takes bare columns from the row that produced MAX()
        let mut stmt = self.conn.prepare(
            "SELECT author_email, author_name, MAX(date_timestamp)
             FROM commits
             GROUP BY author_email",
        )?;

        let authors = stmt
            .query_map([], |row| {
                Ok(AuthorIdentity {
                    email: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(authors)
    }

    /// All commit messages for an author, newest first
    pub fn messages_for_author(&self, email: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT message FROM commits
             WHERE author_email = ?1
             ORDER BY date_timestamp DESC, rowid ASC",
        )?;

        let messages = stmt
            .query_map([email], |row| {
                Ok(row.get::<_, Option<String>>(0)?.unwrap_or_default())
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(messages)
    }

    /// Whether a profile has already been saved for this email
    pub fn has_profile(&self, email: &str) -> Result<bool> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM author_profiles WHERE email = ?1",
                [email],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(exists)
    }

    /// Insert or wholly replace the profile for `email`
    pub fn save_profile(
        &mut self,
        email: &str,
        name: &str,
        profile: &AuthorProfile,
        raw_response: &str,
    ) -> Result<()> {
        let profile_json = serde_json::to_string(profile)?;
        let now = chrono::Utc::now().timestamp();

        self.conn
            .execute(
                "INSERT INTO author_profiles (email, name, profile_json, raw_response, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(email) DO UPDATE SET
                    name = excluded.name,
                    profile_json = excluded.profile_json,
                    raw_response = excluded.raw_response,
                    last_updated = excluded.last_updated",
                (email, name, &profile_json, raw_response, now),
            )
            .with_context(|| format!("Failed to save profile for {}", email))?;

        Ok(())
    }

    /// Read back one stored profile row
    pub fn get_profile(&self, email: &str) -> Result<Option<StoredProfile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT email, name, profile_json, raw_response, last_updated
                 FROM author_profiles WHERE email = ?1",
                [email],
                |row| {
                    Ok(StoredProfile {
                        email: row.get(0)?,
                        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        profile_json: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        raw_response: row.get(3)?,
                        last_updated: row.get::<_, Option<i64>>(4)?.unwrap_or_default(),
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    /// Every stored structured profile, ordered by email
    pub fn all_profiles(&self) -> Result<Vec<AuthorProfile>> {
        let mut stmt = self
            .conn
            .prepare("SELECT email, profile_json FROM author_profiles ORDER BY email")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .filter_map(|(email, json)| json.map(|json| (email, json)))
            .map(|(email, json)| {
                serde_json::from_str(&json)
                    .with_context(|| format!("Corrupt stored profile for {}", email))
            })
            .collect()
    }

    /// Commit counts and profile status per author
    pub fn author_stats(&self) -> Result<Vec<AuthorStats>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.author_email, c.author_name, COUNT(*), MAX(c.date_timestamp),
                    EXISTS(SELECT 1 FROM author_profiles p WHERE p.email = c.author_email)
             FROM commits c
             GROUP BY c.author_email
             ORDER BY COUNT(*) DESC, c.author_email",
        )?;

        let stats = stmt
            .query_map([], |row| {
                Ok(AuthorStats {
                    email: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    commits: row.get::<_, i64>(2)? as usize,
                    has_profile: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(stats)
    }
}
