//! Error types for the per-file pipeline.

use crate::engine::EngineError;
use crate::graph::GraphInvariantError;
use crate::silence::ParseError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline stages.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Anything that can stop one file's pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not parse silence diagnostics: {0}")]
    Parse(#[from] ParseError),

    #[error("filter graph invariant violated: {0}")]
    GraphInvariant(#[from] GraphInvariantError),

    #[error("media engine invocation failed: {0}")]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pipeline stage a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Detect,
    BuildGraph,
    Trim,
    Encode,
    /// Outside any stage, e.g. the file task itself died
    Worker,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Detect => "detect",
            Stage::BuildGraph => "build_graph",
            Stage::Trim => "trim",
            Stage::Encode => "encode",
            Stage::Worker => "worker",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed file as recorded by the batch driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub stage: Stage,
    pub message: String,
}

impl FileFailure {
    pub fn new(path: impl Into<PathBuf>, stage: Stage, error: &PipelineError) -> Self {
        Self {
            path: path.into(),
            stage,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed at {}: {}",
            self.path.display(),
            self.stage,
            self.message
        )
    }
}
