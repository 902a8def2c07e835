//! External media engine.
//!
//! The pipeline never touches media bytes itself. It talks to an engine
//! through [`MediaEngine`], whose production implementation shells out to
//! ffmpeg. Tests substitute an in-memory engine.

use crate::graph::FilterGraph;
use crate::preset::Preset;
use crate::silence::DetectionParams;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use thiserror::Error;

/// Lines of engine stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 8;

/// Error type for engine invocations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine exited with non-zero status
    #[error("{program} failed with exit code {code}: {stderr}")]
    Failed {
        program: String,
        code: i32,
        stderr: String,
    },

    /// Engine was terminated by a signal
    #[error("{program} was terminated by signal")]
    Terminated { program: String },

    /// Engine could not be launched
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// The two contracts the pipeline consumes, plus the stage-2 encode.
///
/// Calls block until the engine finishes.
pub trait MediaEngine: Send + Sync {
    /// Run silence detection and return the raw diagnostic text.
    fn detect_silence(&self, input: &Path, params: &DetectionParams) -> Result<String, EngineError>;

    /// Apply a trim/concat graph to `input`, writing `output`.
    fn execute_graph(&self, input: &Path, graph: &FilterGraph, output: &Path) -> Result<(), EngineError>;

    /// Re-encode `input` with preset settings, writing `output`.
    fn execute_preset(&self, input: &Path, preset: &Preset, output: &Path) -> Result<(), EngineError>;
}

/// ffmpeg-backed engine.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    program: PathBuf,
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn base_command(&self, input: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-hide_banner").arg("-nostdin").arg("-y");
        cmd.arg("-i").arg(input);
        cmd
    }

    /// `silencedetect` over the audio, decoded to the null muxer.
    pub fn build_silence_detect_command(&self, input: &Path, params: &DetectionParams) -> Command {
        let mut cmd = self.base_command(input);
        cmd.arg("-af").arg(format!(
            "silencedetect=n={}dB:d={}",
            params.threshold_db, params.min_silence_secs
        ));
        cmd.arg("-f").arg("null").arg("-");
        cmd
    }

    /// Stage 1: trim/concat through `-filter_complex`.
    pub fn build_graph_command(&self, input: &Path, graph: &FilterGraph, output: &Path) -> Command {
        let mut cmd = self.base_command(input);
        cmd.arg("-filter_complex").arg(graph.to_filter_complex());
        for label in graph.output_labels() {
            cmd.arg("-map").arg(format!("[{}]", label));
        }
        cmd.arg(output);
        cmd
    }

    /// Stage 2: H.264/AAC encode with preset settings.
    pub fn build_preset_command(&self, input: &Path, preset: &Preset, output: &Path) -> Command {
        let mut cmd = self.base_command(input);

        cmd.arg("-c:v").arg("libx264");
        cmd.arg("-preset").arg(preset.encoder_effort.as_str());
        cmd.arg("-crf").arg(preset.quality_factor.to_string());
        cmd.arg("-pix_fmt").arg(preset.pixel_format);
        cmd.arg("-vf")
            .arg(format!("scale={}:flags=lanczos", preset.target_resolution));

        cmd.arg("-c:a").arg("aac");
        cmd.arg("-b:a").arg(format!("{}k", preset.audio_bitrate_kbps));

        cmd.arg("-video_track_timescale")
            .arg(preset.timestamp_scale.to_string());
        cmd.arg("-movflags").arg("+faststart");

        cmd.arg(output);
        cmd
    }

    fn run(&self, mut cmd: Command) -> Result<Output, EngineError> {
        let program = self.program.display().to_string();
        tracing::debug!(?cmd, "invoking engine");

        let output = cmd.output().map_err(|source| EngineError::Launch {
            program: program.clone(),
            source,
        })?;

        if output.status.success() {
            return Ok(output);
        }
        match output.status.code() {
            Some(code) => Err(EngineError::Failed {
                program,
                code,
                stderr: stderr_tail(&output.stderr),
            }),
            None => Err(EngineError::Terminated { program }),
        }
    }
}

/// Last few non-empty stderr lines, joined for a one-line message.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let skip = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[skip..].join(" | ")
}

impl MediaEngine for FfmpegEngine {
    fn detect_silence(&self, input: &Path, params: &DetectionParams) -> Result<String, EngineError> {
        let output = self.run(self.build_silence_detect_command(input, params))?;
        // silencedetect reports on stderr
        Ok(String::from_utf8_lossy(&output.stderr).into_owned())
    }

    fn execute_graph(&self, input: &Path, graph: &FilterGraph, output: &Path) -> Result<(), EngineError> {
        self.run(self.build_graph_command(input, graph, output))
            .map(|_| ())
    }

    fn execute_preset(&self, input: &Path, preset: &Preset, output: &Path) -> Result<(), EngineError> {
        self.run(self.build_preset_command(input, preset, output))
            .map(|_| ())
    }
}
