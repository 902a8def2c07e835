//! Two-stage transcode.
//!
//! Stage 1 materializes the silence-trimmed intermediate, either through the
//! engine or by copying the source when there is nothing to cut. Stage 2
//! re-encodes the intermediate with the resolved preset.

use crate::engine::{EngineError, MediaEngine};
use crate::error::PipelineResult;
use crate::graph::GraphPlan;
use crate::preset::Preset;
use crate::scan::INTERMEDIATE_SUFFIX;
use std::fs;
use std::path::{Path, PathBuf};

/// Container of every final output.
pub const OUTPUT_CONTAINER: &str = "mp4";

fn stem_of(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<dir>/<source-stem>_<preset>.mp4`
pub fn final_output_path(source: &Path, dir: &Path, preset_name: &str) -> PathBuf {
    dir.join(format!(
        "{}_{}.{}",
        stem_of(source),
        preset_name,
        OUTPUT_CONTAINER
    ))
}

/// `<work_dir>/<source-stem>_removed_silence.<source-ext>`
pub fn intermediate_path(source: &Path, work_dir: &Path) -> PathBuf {
    let mut name = format!("{}{}", stem_of(source), INTERMEDIATE_SUFFIX);
    if let Some(ext) = source.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    work_dir.join(name)
}

/// How stage 1 produced the intermediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimOutcome {
    Copied,
    Trimmed,
}

/// Drives the engine for both stages of one file.
pub struct Transcoder<'a> {
    engine: &'a dyn MediaEngine,
}

impl<'a> Transcoder<'a> {
    pub fn new(engine: &'a dyn MediaEngine) -> Self {
        Self { engine }
    }

    /// Stage 1: produce the silence-trimmed intermediate.
    pub fn trim(
        &self,
        source: &Path,
        plan: &GraphPlan,
        intermediate: &Path,
    ) -> PipelineResult<TrimOutcome> {
        match plan {
            GraphPlan::PassThrough => {
                tracing::info!(file = %source.display(), "no silence detected, copying source");
                fs::copy(source, intermediate)?;
                Ok(TrimOutcome::Copied)
            }
            GraphPlan::Trim(graph) => {
                tracing::info!(
                    file = %source.display(),
                    segments = graph.segment_count(),
                    "removing silence"
                );
                self.engine.execute_graph(source, graph, intermediate)?;
                Ok(TrimOutcome::Trimmed)
            }
        }
    }

    /// Stage 2: encode the intermediate with the preset.
    pub fn encode(
        &self,
        intermediate: &Path,
        preset: &Preset,
        output: &Path,
    ) -> Result<(), EngineError> {
        tracing::info!(output = %output.display(), "re-encoding for preset");
        self.engine.execute_preset(intermediate, preset, output)
    }
}
