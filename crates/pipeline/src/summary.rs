//! Batch summary sink.
//!
//! Per-file records and aggregate counts, shared between concurrently running
//! file pipelines and serializable to JSON.

use crate::error::{FileFailure, Stage};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Terminal outcome of one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Final output written
    Encoded {
        output: PathBuf,
        /// No silence found; the source was carried through unchanged
        pass_through: bool,
        segments: usize,
        silences: usize,
        report: Option<PathBuf>,
    },
    /// Final output already existed
    Skipped { output: PathBuf },
    Failed { stage: Stage, message: String },
}

/// One file's entry in the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

impl FileRecord {
    pub fn failed(failure: FileFailure) -> Self {
        Self {
            path: failure.path,
            outcome: FileOutcome::Failed {
                stage: failure.stage,
                message: failure.message,
            },
        }
    }
}

/// Everything the batch produced, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub files: Vec<FileRecord>,
    pub encoded: u64,
    pub pass_through: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl BatchSummary {
    /// Append a record and update the counters.
    pub fn record(&mut self, record: FileRecord) {
        match &record.outcome {
            FileOutcome::Encoded { pass_through, .. } => {
                self.encoded += 1;
                if *pass_through {
                    self.pass_through += 1;
                }
            }
            FileOutcome::Skipped { .. } => self.skipped += 1,
            FileOutcome::Failed { .. } => self.failed += 1,
        }
        self.files.push(record);
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Failed files, in record order.
    pub fn failures(&self) -> impl Iterator<Item = &FileRecord> {
        self.files
            .iter()
            .filter(|r| matches!(r.outcome, FileOutcome::Failed { .. }))
    }

    /// Write the summary as pretty JSON.
    pub fn write_json(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(path, json)
    }
}

/// Shared summary for concurrent access across file pipelines
pub type SharedSummary = Arc<RwLock<BatchSummary>>;

/// Creates a new, empty SharedSummary
pub fn new_shared_summary() -> SharedSummary {
    Arc::new(RwLock::new(BatchSummary::default()))
}
