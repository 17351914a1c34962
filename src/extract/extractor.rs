//! Batched ingestion of commits into the fact store

use super::source::{CommitSource, RawCommit};
use crate::store::{CommitFact, FactStore};
use anyhow::{Context, Result};
use serde::Serialize;

/// Totals for one ingestion pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Commits read from the source
    pub seen: usize,
    /// Commits that were new to the store
    pub inserted: usize,
    /// Batches flushed
    pub batches: usize,
}

impl From<RawCommit> for CommitFact {
    fn from(raw: RawCommit) -> Self {
        Self {
            hash: raw.hash,
            author_name: raw.author_name,
            author_email: raw.author_email,
            timestamp: raw.timestamp,
            message: raw.message.trim_end().to_string(),
            files_changed: raw.files,
        }
    }
}

/// Drains a [`CommitSource`] into the store in fixed-size batches
pub struct CommitExtractor {
    batch_size: usize,
}

impl CommitExtractor {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Ingest every commit the source yields.
    ///
    /// Each full batch is committed as soon as it fills; a traversal error
    /// aborts with the earlier batches already durable.
    pub async fn ingest(
        &self,
        source: &mut dyn CommitSource,
        store: &mut FactStore,
    ) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        let mut batch: Vec<CommitFact> = Vec::with_capacity(self.batch_size);

        tracing::info!(
            source = %source.describe(),
            batch_size = self.batch_size,
            "Ingesting commits"
        );

        while let Some(raw) = source
            .next_commit()
            .await
            .with_context(|| format!("traversing {}", source.describe()))?
        {
            report.seen += 1;
            batch.push(raw.into());

            if batch.len() >= self.batch_size {
                self.flush(store, &mut batch, &mut report)?;
            }
        }

        if !batch.is_empty() {
            self.flush(store, &mut batch, &mut report)?;
        }

        tracing::info!(
            seen = report.seen,
            inserted = report.inserted,
            batches = report.batches,
            "Ingestion complete"
        );

        Ok(report)
    }

    fn flush(
        &self,
        store: &mut FactStore,
        batch: &mut Vec<CommitFact>,
        report: &mut IngestReport,
    ) -> Result<()> {
        let inserted = store.insert_commits(batch)?;
        report.inserted += inserted;
        report.batches += 1;

        tracing::info!(
            batch = report.batches,
            size = batch.len(),
            new = inserted,
            total = report.seen,
            "Flushed commit batch"
        );

        batch.clear();
        Ok(())
    }
}
