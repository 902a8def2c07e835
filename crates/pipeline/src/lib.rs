//! silencecut
//!
//! Batch tool that finds silent stretches in short videos, cuts them out with
//! one ffmpeg filter graph, then re-encodes the result for a social platform
//! preset.

pub mod batch;
pub mod concurrency;
pub mod engine;
pub mod error;
pub mod graph;
pub mod planner;
pub mod preset;
pub mod report;
pub mod scan;
pub mod silence;
pub mod startup;
pub mod summary;
pub mod transcode;

pub use silencecut_config as config;
pub use silencecut_config::Config;
pub use batch::{process_file, BatchDriver, FileJob, FileState, RunContext};
pub use concurrency::ConcurrencyPlan;
pub use engine::{EngineError, FfmpegEngine, MediaEngine};
pub use error::{FileFailure, PipelineError, PipelineResult, Stage};
pub use graph::{build_graph, FilterGraph, GraphInvariantError, GraphPlan};
pub use planner::{plan_segments, Segment, SegmentEnd};
pub use preset::{Preset, PresetRegistry, ResolvedPreset, DEFAULT_PRESET_NAME};
pub use report::{render_silence_report, write_silence_report};
pub use scan::{scan_folder, ScanCandidate, ScanOptions};
pub use silence::{parse_silence_log, DetectionParams, ParseError, SilenceInterval, SilenceScan};
pub use startup::{
    check_engine_available, check_input_folder, ensure_dir, parse_ffmpeg_version, StartupError,
};
pub use summary::{new_shared_summary, BatchSummary, FileOutcome, FileRecord, SharedSummary};
pub use transcode::{final_output_path, intermediate_path, Transcoder, TrimOutcome};
