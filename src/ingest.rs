//! Best-effort, row-isolated bulk import.
//!
//! The pipeline composes the codec, the entity catalog, and the annotation
//! store. Rows are processed sequentially so duplicate detection sees
//! records created earlier in the same batch. One row's failure never
//! aborts the batch; failures are captured as data in the summary.

use serde::{Deserialize, Serialize};

use crate::catalog::EntityCatalog;
use crate::codec::import::{parse_delimited, ImportRow, RowParseError};
use crate::store::AnnotationStore;
use crate::types::{AnnotationRef, SamplePurpose, TRAIT_LOOKUP};
use crate::Result;

/// A row that reached a failed terminal state, with context for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFailure {
    /// 1-based input line.
    pub line: u64,
    /// The row's text column (may be empty when parsing failed).
    pub text: String,
    /// Why the row failed.
    pub reason: String,
}

/// Outcome of one import invocation.
///
/// Always returned, even with zero successes; failure reasons are retained
/// rather than dropped into a log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Rows persisted as new samples.
    pub imported: usize,
    /// Rows skipped because a sample with identical text already exists.
    pub skipped: usize,
    /// Rows that failed, with reasons.
    pub failed: Vec<RowFailure>,
}

impl ImportSummary {
    /// Total rows that reached a terminal state.
    #[must_use]
    pub fn total(&self) -> usize {
        self.imported + self.skipped + self.failed.len()
    }
}

impl std::fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "imported {}, skipped {}, failed {}",
            self.imported,
            self.skipped,
            self.failed.len()
        )?;
        for failure in &self.failed {
            writeln!(f, "  line {}: {}", failure.line, failure.reason)?;
        }
        Ok(())
    }
}

/// Composes catalog, store, and codec into a bulk importer.
///
/// Collaborators are passed explicitly at construction; the pipeline holds
/// no ambient state of its own.
pub struct ImportPipeline<'a> {
    catalog: &'a EntityCatalog,
    store: &'a AnnotationStore,
}

impl<'a> ImportPipeline<'a> {
    /// Wire a pipeline to its collaborators.
    #[must_use]
    pub fn new(catalog: &'a EntityCatalog, store: &'a AnnotationStore) -> Self {
        Self { catalog, store }
    }

    /// Import delimited text, returning a summary.
    ///
    /// Only a stream-level parse failure (no header, missing required
    /// column) errors out before any row is processed. Imported samples
    /// default to the train purpose. Column headers are matched against
    /// the entity names known when the import starts.
    pub fn run(&self, raw: &str) -> Result<ImportSummary> {
        let rows = parse_delimited(raw)?;
        // Header validation snapshot: columns added as entities mid-batch
        // do not retroactively become annotation columns.
        let known: Vec<String> = self
            .catalog
            .list_all()
            .into_iter()
            .map(|e| e.name)
            .collect();

        let summary = rows
            .into_iter()
            .fold(ImportSummary::default(), |mut acc, row| {
                match row {
                    Ok(row) => match self.ingest_row(&row, &known) {
                        Ok(RowOutcome::Imported) => acc.imported += 1,
                        Ok(RowOutcome::Skipped) => acc.skipped += 1,
                        Err(err) => {
                            log::warn!("import row at line {} failed: {err}", row.line);
                            acc.failed.push(RowFailure {
                                line: row.line,
                                text: row.text.clone(),
                                reason: err.to_string(),
                            });
                        }
                    },
                    Err(RowParseError { line, message }) => {
                        log::warn!("import row at line {line} unparseable: {message}");
                        acc.failed.push(RowFailure {
                            line,
                            text: String::new(),
                            reason: message,
                        });
                    }
                }
                acc
            });

        log::info!("import finished: {summary}");
        Ok(summary)
    }

    fn ingest_row(&self, row: &ImportRow, known: &[String]) -> Result<RowOutcome> {
        if row.text.trim().is_empty() {
            // Reject before resolving values so the catalog stays untouched.
            return Err(crate::Error::validation("sample text must not be empty"));
        }
        if self.store.exists(&row.text) {
            log::debug!("line {}: duplicate text, skipping", row.line);
            return Ok(RowOutcome::Skipped);
        }

        // Resolve every annotation value before touching the sample table,
        // so a failed row leaves no orphan sample behind. The import format
        // carries no offsets, so all annotations are trait-style.
        let mut refs = Vec::new();
        for name in known {
            if let Some(value) = row.column(name) {
                let resolved =
                    self.catalog
                        .resolve_or_create_value(name, value, &[TRAIT_LOOKUP])?;
                refs.push(AnnotationRef::trait_of(resolved.value.id));
            }
        }

        let sample = self.store.create_sample(&row.text, SamplePurpose::Train)?;
        if let Err(err) = self.store.replace_annotations(sample.id, &refs, self.catalog) {
            // Roll the sample back so the row fails clean.
            self.store.delete_sample_cascade(sample.id);
            return Err(err);
        }
        Ok(RowOutcome::Imported)
    }
}

enum RowOutcome {
    Imported,
    Skipped,
}
