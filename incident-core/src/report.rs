//! Run accounting and human-readable progress output.
//!
//! [`RunSummary`] holds the counters for one invocation. [`RunReporter`]
//! writes page progress, insert failures and the final summary both to the
//! `log` facade and to a caller-supplied writer. Output is best-effort: a
//! failing writer is reported at `warn` level and otherwise ignored.

use std::fmt;
use std::io::Write;

use crate::{FeatureRecord, RecordError};

/// Counters accumulated over one run.
///
/// Every processed record ends up in exactly one of `added`, `existing`,
/// `failed` or `rejected`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Records taken from source pages.
    pub processed: u64,
    /// Records inserted into the store.
    pub added: u64,
    /// Records skipped because their identifier was already stored.
    pub existing: u64,
    /// Records the store refused.
    pub failed: u64,
    /// Records quarantined because they could not be validated.
    pub rejected: u64,
    /// Pages that carried records.
    pub pages: u32,
}

impl RunSummary {
    /// Count a record taken from a page.
    #[must_use]
    pub const fn record_processed(self) -> Self {
        Self {
            processed: self.processed.saturating_add(1),
            ..self
        }
    }

    /// Count a successful insert.
    #[must_use]
    pub const fn record_added(self) -> Self {
        Self {
            added: self.added.saturating_add(1),
            ..self
        }
    }

    /// Count a record already present in the store.
    #[must_use]
    pub const fn record_existing(self) -> Self {
        Self {
            existing: self.existing.saturating_add(1),
            ..self
        }
    }

    /// Count a record the store refused.
    #[must_use]
    pub const fn record_failed(self) -> Self {
        Self {
            failed: self.failed.saturating_add(1),
            ..self
        }
    }

    /// Count a quarantined record.
    #[must_use]
    pub const fn record_rejected(self) -> Self {
        Self {
            rejected: self.rejected.saturating_add(1),
            ..self
        }
    }

    /// Count a page that carried records.
    #[must_use]
    pub const fn record_page(self) -> Self {
        Self {
            pages: self.pages.saturating_add(1),
            ..self
        }
    }

    /// Whether every processed record has exactly one outcome.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        let outcomes = [self.added, self.existing, self.failed, self.rejected]
            .into_iter()
            .try_fold(0_u64, u64::checked_add);
        outcomes == Some(self.processed)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed, {} added and {} already existing",
            self.processed, self.added, self.existing
        )?;
        if self.failed > 0 || self.rejected > 0 {
            write!(
                f,
                " ({} failed, {} rejected)",
                self.failed, self.rejected
            )?;
        }
        Ok(())
    }
}

/// Writes progress lines for a run.
///
/// Lines are prefixed with `INFO:` or `ERROR:` and a tab, and are mirrored to
/// the `log` facade so that they also land in the log file.
///
/// # Examples
/// ```
/// use incident_core::{RunReporter, RunSummary};
///
/// let mut reporter = RunReporter::new(Vec::new());
/// let summary = RunSummary::default().record_processed().record_added();
/// reporter.report(&summary, "Ukraine", Some(2024));
///
/// let output = String::from_utf8(reporter.into_inner()).expect("utf-8 output");
/// assert!(output.contains("For Ukraine in 2024:"));
/// assert!(output.contains("1 processed, 1 added and 0 already existing"));
/// ```
#[derive(Debug)]
pub struct RunReporter<W: Write> {
    out: W,
}

impl<W: Write> RunReporter<W> {
    /// Wrap a writer.
    #[must_use]
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Report the number of records on a fetched page.
    pub fn page(&mut self, page: u32, records: usize, country: &str) {
        let line = format!("{records} incidents in {country} (page {page})");
        log::info!("{line}");
        self.info(&line);
    }

    /// Report a singleton page that ends the run unprocessed.
    pub fn page_dropped(&mut self, page: u32, identifier: Option<&str>) {
        let line = format!(
            "page {page} carried a single record ({}); stopping without processing it",
            identifier.unwrap_or("no identifier")
        );
        log::warn!("{line}");
        self.info(&line);
    }

    /// Report a row the store refused.
    pub fn insert_failed(&mut self, feature: &FeatureRecord, detail: &str) {
        log::error!(
            "failed to add {}: {detail}; payload: {feature:?}",
            feature.identifier()
        );
        self.error(&format!("failed to add {}: {detail}", feature.identifier()));
    }

    /// Report a record quarantined at the ingestion boundary.
    pub fn record_rejected(&mut self, error: &RecordError) {
        log::error!("skipping invalid record: {error}");
        self.error(&format!("skipping invalid record: {error}"));
    }

    /// Write the end-of-run summary.
    pub fn report(&mut self, summary: &RunSummary, country: &str, year: Option<i32>) {
        let scope = year.map_or_else(
            || format!("For {country}:"),
            |year| format!("For {country} in {year}:"),
        );
        log::info!("{scope} {summary}");
        self.info(&scope);
        self.info(&summary.to_string());
    }

    /// Recover the writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn info(&mut self, line: &str) {
        self.emit("INFO", line);
    }

    fn error(&mut self, line: &str) {
        self.emit("ERROR", line);
    }

    fn emit(&mut self, level: &str, line: &str) {
        if let Err(err) = writeln!(self.out, "{level}:\t{line}") {
            log::warn!("failed to write progress output: {err}");
        }
    }
}
