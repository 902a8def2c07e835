//! Batch driver.
//!
//! Runs detect → plan → build graph → trim → encode for every eligible file
//! in a folder. A failure in any stage ends that file only; the batch always
//! moves on to the next one. A semaphore bounds how many files are in flight.

use crate::concurrency::ConcurrencyPlan;
use crate::config::Config;
use crate::engine::MediaEngine;
use crate::error::{FileFailure, PipelineError, Stage};
use crate::graph::{build_graph, GraphPlan};
use crate::planner::plan_segments;
use crate::preset::{PresetRegistry, ResolvedPreset};
use crate::report::write_silence_report;
use crate::scan::{scan_folder, ScanOptions};
use crate::silence::{parse_silence_log, DetectionParams};
use crate::summary::{new_shared_summary, BatchSummary, FileOutcome, FileRecord, SharedSummary};
use crate::transcode::{final_output_path, intermediate_path, Transcoder};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Everything one run needs, resolved once from config and CLI input.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub input_dir: PathBuf,
    /// `None` writes outputs next to each source
    pub output_dir: Option<PathBuf>,
    pub work_dir: PathBuf,
    pub preset: ResolvedPreset,
    pub detection: DetectionParams,
    pub scan: ScanOptions,
    pub skip_existing: bool,
    pub write_reports: bool,
    pub keep_intermediate: bool,
    pub concurrency: ConcurrencyPlan,
}

impl RunContext {
    pub fn from_config(config: &Config, input_dir: PathBuf) -> Self {
        let preset = PresetRegistry::lookup(&config.batch.preset);
        Self {
            input_dir,
            output_dir: config.paths.output_dir.clone(),
            work_dir: config
                .paths
                .work_dir
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join("silencecut"))
                .join(format!("run-{}", std::process::id())),
            scan: ScanOptions {
                extensions: config.batch.extensions.clone(),
                recursive: config.batch.recursive,
                preset_name: preset.name.clone(),
            },
            preset,
            detection: DetectionParams {
                threshold_db: config.detection.threshold_db,
                min_silence_secs: config.detection.min_silence_secs,
            },
            skip_existing: config.batch.skip_existing,
            write_reports: config.batch.write_reports,
            keep_intermediate: config.batch.keep_intermediate,
            concurrency: ConcurrencyPlan::derive(config),
        }
    }

    /// Directory that receives the final output and report for `source`.
    ///
    /// With an output directory set, the source's subdirectory below the
    /// input folder is mirrored under it.
    pub fn output_dir_for(&self, source: &Path) -> PathBuf {
        let parent = source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        match &self.output_dir {
            Some(dir) => match parent.strip_prefix(&self.input_dir) {
                Ok(relative) => dir.join(relative),
                Err(_) => dir.clone(),
            },
            None => parent,
        }
    }
}

/// Where a file is in its pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileState {
    Queued,
    Detected,
    Planned,
    GraphBuilt,
    Trimmed,
    Encoded,
    Skipped,
    Failed(Stage),
}

impl FileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::Queued => "queued",
            FileState::Detected => "detected",
            FileState::Planned => "planned",
            FileState::GraphBuilt => "graph_built",
            FileState::Trimmed => "trimmed",
            FileState::Encoded => "encoded",
            FileState::Skipped => "skipped",
            FileState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileState::Encoded | FileState::Skipped | FileState::Failed(_)
        )
    }
}

/// One source file moving through the pipeline.
#[derive(Debug)]
pub struct FileJob {
    /// Position in the batch; keeps scratch directories apart
    pub index: usize,
    pub source: PathBuf,
    pub state: FileState,
}

impl FileJob {
    pub fn new(index: usize, source: PathBuf) -> Self {
        Self {
            index,
            source,
            state: FileState::Queued,
        }
    }

    fn advance(&mut self, next: FileState) {
        tracing::debug!(
            file = %self.source.display(),
            from = self.state.as_str(),
            to = next.as_str(),
            "state transition"
        );
        self.state = next;
    }

    fn fail(&mut self, stage: Stage, error: impl Into<PipelineError>) -> FileFailure {
        let error = error.into();
        self.advance(FileState::Failed(stage));
        FileFailure::new(&self.source, stage, &error)
    }
}

/// Run every stage for one file. Never panics on stage errors; they come
/// back as a failed record.
pub fn process_file(ctx: &RunContext, engine: &dyn MediaEngine, job: &mut FileJob) -> FileRecord {
    match run_stages(ctx, engine, job) {
        Ok(outcome) => FileRecord {
            path: job.source.clone(),
            outcome,
        },
        Err(failure) => {
            tracing::error!(
                file = %failure.path.display(),
                stage = %failure.stage,
                error = %failure.message,
                "file failed, continuing with next"
            );
            FileRecord::failed(failure)
        }
    }
}

fn run_stages(
    ctx: &RunContext,
    engine: &dyn MediaEngine,
    job: &mut FileJob,
) -> Result<FileOutcome, FileFailure> {
    let source = job.source.clone();
    let out_dir = ctx.output_dir_for(&source);
    let output = final_output_path(&source, &out_dir, &ctx.preset.name);

    if ctx.skip_existing && output.exists() {
        tracing::info!(file = %source.display(), output = %output.display(), "output exists, skipping");
        job.advance(FileState::Skipped);
        return Ok(FileOutcome::Skipped { output });
    }

    tracing::info!(file = %source.display(), "detecting silence");
    let diagnostics = engine
        .detect_silence(&source, &ctx.detection)
        .map_err(|e| job.fail(Stage::Detect, e))?;
    let scan =
        parse_silence_log(&diagnostics, ctx.detection).map_err(|e| job.fail(Stage::Detect, e))?;
    job.advance(FileState::Detected);

    let report = if ctx.write_reports {
        match fs::create_dir_all(&out_dir)
            .and_then(|_| write_silence_report(&source, &out_dir, &scan.intervals))
        {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(file = %source.display(), error = %e, "could not write silence report");
                None
            }
        }
    } else {
        None
    };

    let segments = plan_segments(&scan.intervals);
    job.advance(FileState::Planned);

    let plan = build_graph(&segments).map_err(|e| {
        tracing::error!(file = %source.display(), error = %e, "graph builder produced an invalid graph");
        job.fail(Stage::BuildGraph, e)
    })?;
    let pass_through = matches!(plan, GraphPlan::PassThrough);
    job.advance(FileState::GraphBuilt);

    let work_dir = ctx.work_dir.join(format!("{:04}", job.index));
    fs::create_dir_all(&work_dir)
        .and_then(|_| fs::create_dir_all(&out_dir))
        .map_err(|e| job.fail(Stage::Trim, e))?;
    let intermediate = intermediate_path(&source, &work_dir);
    let transcoder = Transcoder::new(engine);

    let trimmed = transcoder.trim(&source, &plan, &intermediate);
    if let Err(e) = trimmed {
        cleanup_intermediate(ctx, &intermediate, &work_dir);
        return Err(job.fail(Stage::Trim, e));
    }
    job.advance(FileState::Trimmed);

    let encoded = transcoder.encode(&intermediate, &ctx.preset.settings, &output);
    cleanup_intermediate(ctx, &intermediate, &work_dir);
    if let Err(e) = encoded {
        // A partial output would be mistaken for a finished one on the next run
        let _ = fs::remove_file(&output);
        return Err(job.fail(Stage::Encode, e));
    }
    job.advance(FileState::Encoded);

    tracing::info!(file = %source.display(), output = %output.display(), "done");
    Ok(FileOutcome::Encoded {
        output,
        pass_through,
        segments: segments.len(),
        silences: scan.intervals.len(),
        report,
    })
}

fn cleanup_intermediate(ctx: &RunContext, intermediate: &Path, work_dir: &Path) {
    if ctx.keep_intermediate {
        return;
    }
    let _ = fs::remove_file(intermediate);
    let _ = fs::remove_dir(work_dir);
}

/// Drives a whole folder through the pipeline.
pub struct BatchDriver {
    ctx: Arc<RunContext>,
    engine: Arc<dyn MediaEngine>,
    summary: SharedSummary,
    semaphore: Arc<Semaphore>,
}

impl BatchDriver {
    pub fn new(ctx: RunContext, engine: Arc<dyn MediaEngine>) -> Self {
        let permits = ctx.concurrency.max_concurrent_files.max(1) as usize;
        Self {
            ctx: Arc::new(ctx),
            engine,
            summary: new_shared_summary(),
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Get the shared summary
    pub fn summary(&self) -> SharedSummary {
        self.summary.clone()
    }

    /// Get the number of free slots for files
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    async fn acquire_permit(&self) -> Option<OwnedSemaphorePermit> {
        self.semaphore.clone().acquire_owned().await.ok()
    }

    /// Process every eligible file and return the summary.
    pub async fn run(&self) -> BatchSummary {
        let candidates = scan_folder(&self.ctx.input_dir, &self.ctx.scan);
        tracing::info!(
            folder = %self.ctx.input_dir.display(),
            files = candidates.len(),
            preset = %self.ctx.preset.name,
            concurrency = self.ctx.concurrency.max_concurrent_files,
            "starting batch"
        );
        if !self.ctx.preset.registered {
            tracing::warn!(
                preset = %self.ctx.preset.name,
                "unknown preset, using base settings"
            );
        }

        let mut handles = Vec::with_capacity(candidates.len());
        for (index, candidate) in candidates.into_iter().enumerate() {
            let Some(permit) = self.acquire_permit().await else {
                tracing::error!("file semaphore closed, stopping batch");
                break;
            };

            let ctx = self.ctx.clone();
            let engine = self.engine.clone();
            let summary = self.summary.clone();
            let path = candidate.path;
            tracing::debug!(file = %path.display(), size_bytes = candidate.size_bytes, index, "dispatching file");

            handles.push(tokio::spawn(async move {
                let fallback_path = path.clone();
                let result = tokio::task::spawn_blocking(move || {
                    let mut job = FileJob::new(index, path);
                    process_file(&ctx, engine.as_ref(), &mut job)
                })
                .await;

                let record = result.unwrap_or_else(|join_err| {
                    tracing::error!(file = %fallback_path.display(), error = %join_err, "file task panicked");
                    FileRecord {
                        path: fallback_path,
                        outcome: FileOutcome::Failed {
                            stage: Stage::Worker,
                            message: format!("file task panicked: {}", join_err),
                        },
                    }
                });

                summary.write().await.record(record);
                drop(permit);
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "summary task failed");
            }
        }

        if !self.ctx.keep_intermediate {
            let _ = fs::remove_dir(&self.ctx.work_dir);
        }

        let summary = self.summary.read().await.clone();
        tracing::info!(
            encoded = summary.encoded,
            pass_through = summary.pass_through,
            skipped = summary.skipped,
            failed = summary.failed,
            "batch finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;
    use crate::graph::FilterGraph;
    use crate::preset::Preset;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory engine. Diagnostics are keyed by file name; graph or preset
    /// calls for names in the failure lists exit with status 1.
    #[derive(Default)]
    struct MockEngine {
        diagnostics: Vec<(&'static str, &'static str)>,
        fail_detect: Vec<&'static str>,
        fail_graph: Vec<&'static str>,
        fail_preset: Vec<&'static str>,
        graphs: Mutex<Vec<String>>,
    }

    fn file_name(path: &Path) -> String {
        path.file_name().unwrap().to_string_lossy().into_owned()
    }

    fn failed(program: &str) -> EngineError {
        EngineError::Failed {
            program: program.to_string(),
            code: 1,
            stderr: "mock failure".to_string(),
        }
    }

    impl MediaEngine for MockEngine {
        fn detect_silence(&self, input: &Path, _: &DetectionParams) -> Result<String, EngineError> {
            let name = file_name(input);
            if self.fail_detect.contains(&name.as_str()) {
                return Err(failed("detect"));
            }
            Ok(self
                .diagnostics
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, text)| text.to_string())
                .unwrap_or_default())
        }

        fn execute_graph(&self, input: &Path, graph: &FilterGraph, output: &Path) -> Result<(), EngineError> {
            if self.fail_graph.contains(&file_name(input).as_str()) {
                return Err(failed("graph"));
            }
            self.graphs.lock().unwrap().push(graph.to_filter_complex());
            fs::write(output, b"trimmed").unwrap();
            Ok(())
        }

        fn execute_preset(&self, input: &Path, _: &Preset, output: &Path) -> Result<(), EngineError> {
            let stem = file_name(input).replace("_removed_silence", "");
            // leave a partial file behind like a crashed encoder would
            fs::write(output, b"partial").unwrap();
            if self.fail_preset.contains(&stem.as_str()) {
                return Err(failed("preset"));
            }
            fs::write(output, b"encoded").unwrap();
            Ok(())
        }
    }

    const ONE_SILENCE: &str = "\
[silencedetect @ 0x1] silence_start: 2.0
[silencedetect @ 0x1] silence_end: 4.0 | silence_duration: 2.0
";

    struct Fixture {
        _input: TempDir,
        _work: TempDir,
        ctx: RunContext,
    }

    fn fixture(files: &[&str], max_concurrent_files: u32) -> Fixture {
        let input = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        for name in files {
            fs::write(input.path().join(name), b"source").unwrap();
        }

        let mut config = Config::default();
        config.paths.work_dir = Some(work.path().to_path_buf());
        config.batch.max_concurrent_files = max_concurrent_files;
        let ctx = RunContext::from_config(&config, input.path().to_path_buf());

        Fixture {
            _input: input,
            _work: work,
            ctx,
        }
    }

    fn output_of(ctx: &RunContext, name: &str) -> PathBuf {
        final_output_path(&ctx.input_dir.join(name), &ctx.input_dir, "tiktok")
    }

    #[tokio::test]
    async fn test_failed_file_does_not_stop_batch() {
        let fx = fixture(&["a.mp4", "b.mp4", "c.mp4"], 1);
        let engine = MockEngine {
            diagnostics: vec![("a.mp4", ONE_SILENCE), ("b.mp4", ONE_SILENCE), ("c.mp4", ONE_SILENCE)],
            fail_graph: vec!["b.mp4"],
            ..Default::default()
        };
        let driver = BatchDriver::new(fx.ctx.clone(), Arc::new(engine));

        let summary = driver.run().await;

        assert_eq!(summary.files.len(), 3);
        assert_eq!(summary.encoded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(fs::read(output_of(&fx.ctx, "a.mp4")).unwrap(), b"encoded");
        assert_eq!(fs::read(output_of(&fx.ctx, "c.mp4")).unwrap(), b"encoded");
        assert!(!output_of(&fx.ctx, "b.mp4").exists());

        let failure = summary.failures().next().unwrap();
        assert_eq!(failure.path, fx.ctx.input_dir.join("b.mp4"));
        assert!(matches!(
            failure.outcome,
            FileOutcome::Failed { stage: Stage::Trim, .. }
        ));
        assert_eq!(driver.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_failure_isolation_with_worker_pool() {
        let fx = fixture(&["a.mp4", "b.mp4", "c.mp4", "d.mp4"], 3);
        let engine = MockEngine {
            fail_detect: vec!["a.mp4"],
            fail_preset: vec!["c.mp4"],
            ..Default::default()
        };
        let summary = BatchDriver::new(fx.ctx.clone(), Arc::new(engine)).run().await;

        assert_eq!(summary.files.len(), 4);
        assert_eq!(summary.encoded, 2);
        assert_eq!(summary.pass_through, 2);
        assert_eq!(summary.failed, 2);

        let stage_of = |name: &str| {
            summary
                .files
                .iter()
                .find(|r| r.path == fx.ctx.input_dir.join(name))
                .map(|r| r.outcome.clone())
                .unwrap()
        };
        assert!(matches!(stage_of("a.mp4"), FileOutcome::Failed { stage: Stage::Detect, .. }));
        assert!(matches!(stage_of("c.mp4"), FileOutcome::Failed { stage: Stage::Encode, .. }));
        // partial output from the failed encode is removed
        assert!(!output_of(&fx.ctx, "c.mp4").exists());
    }

    #[tokio::test]
    async fn test_no_silence_is_pass_through() {
        let fx = fixture(&["quiet.mov"], 1);
        let engine = Arc::new(MockEngine::default());
        let summary = BatchDriver::new(fx.ctx.clone(), engine.clone()).run().await;

        assert_eq!(summary.pass_through, 1);
        assert!(engine.graphs.lock().unwrap().is_empty());
        match &summary.files[0].outcome {
            FileOutcome::Encoded {
                output,
                segments,
                silences,
                report,
                ..
            } => {
                assert_eq!(output, &output_of(&fx.ctx, "quiet.mov"));
                assert_eq!(*segments, 1);
                assert_eq!(*silences, 0);
                let report = report.as_ref().unwrap();
                assert_eq!(fs::read_to_string(report).unwrap(), "No silence detected.\n");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_graph_and_cleanup_for_trimmed_file() {
        let fx = fixture(&["talk.mp4"], 1);
        let engine = Arc::new(MockEngine {
            diagnostics: vec![("talk.mp4", ONE_SILENCE)],
            ..Default::default()
        });
        let summary = BatchDriver::new(fx.ctx.clone(), engine.clone()).run().await;

        assert_eq!(summary.encoded, 1);
        assert_eq!(summary.pass_through, 0);
        let graphs = engine.graphs.lock().unwrap();
        assert_eq!(graphs.len(), 1);
        assert!(graphs[0].contains("[v0][v1]concat=n=2:v=1:a=0[outv]"));

        // intermediate, its scratch directory and the run directory are gone
        assert!(!fx.ctx.work_dir.exists());
        assert!(fx.ctx.work_dir.parent().unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_existing_output_is_skipped() {
        let fx = fixture(&["done.mp4"], 1);
        fs::write(output_of(&fx.ctx, "done.mp4"), b"old").unwrap();

        let engine = MockEngine {
            fail_detect: vec!["done.mp4"],
            ..Default::default()
        };
        let summary = BatchDriver::new(fx.ctx.clone(), Arc::new(engine)).run().await;

        // own output is not picked up as a source; the source is skipped
        assert_eq!(summary.files.len(), 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(fs::read(output_of(&fx.ctx, "done.mp4")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_malformed_diagnostics_fail_at_detect() {
        let fx = fixture(&["bad.mp4"], 1);
        let engine = MockEngine {
            diagnostics: vec![("bad.mp4", "silence_end: garbage")],
            ..Default::default()
        };
        let summary = BatchDriver::new(fx.ctx.clone(), Arc::new(engine)).run().await;

        assert_eq!(summary.failed, 1);
        match &summary.files[0].outcome {
            FileOutcome::Failed { stage, message } => {
                assert_eq!(*stage, Stage::Detect);
                assert!(message.contains("could not parse silence diagnostics"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_same_named_sources_keep_separate_outputs() {
        let input = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        for dir in ["a", "b"] {
            fs::create_dir(input.path().join(dir)).unwrap();
            fs::write(input.path().join(dir).join("clip.mp4"), b"source").unwrap();
        }

        let mut config = Config::default();
        config.batch.recursive = true;
        config.paths.output_dir = Some(out.path().to_path_buf());
        config.paths.work_dir = Some(work.path().to_path_buf());
        let ctx = RunContext::from_config(&config, input.path().to_path_buf());

        let summary = BatchDriver::new(ctx, Arc::new(MockEngine::default())).run().await;

        assert_eq!(summary.encoded, 2);
        assert_eq!(summary.skipped, 0);
        for dir in ["a", "b"] {
            let out_dir = out.path().join(dir);
            assert_eq!(fs::read(out_dir.join("clip_tiktok.mp4")).unwrap(), b"encoded");
            assert!(out_dir.join("clip_silence_report.txt").is_file());
        }
    }

    #[test]
    fn test_work_dir_is_per_run() {
        let mut config = Config::default();
        config.paths.work_dir = Some(PathBuf::from("/scratch"));
        let ctx = RunContext::from_config(&config, PathBuf::from("/srv/in"));
        assert_eq!(
            ctx.work_dir,
            PathBuf::from(format!("/scratch/run-{}", std::process::id()))
        );
    }

    #[test]
    fn test_process_file_state_transitions() {
        let fx = fixture(&["talk.mp4"], 1);
        let engine = MockEngine {
            diagnostics: vec![("talk.mp4", ONE_SILENCE)],
            ..Default::default()
        };
        let mut job = FileJob::new(0, fx.ctx.input_dir.join("talk.mp4"));
        assert_eq!(job.state, FileState::Queued);

        let record = process_file(&fx.ctx, &engine, &mut job);
        assert_eq!(job.state, FileState::Encoded);
        assert!(job.state.is_terminal());
        assert!(matches!(record.outcome, FileOutcome::Encoded { segments: 2, silences: 1, .. }));
    }

    #[test]
    fn test_run_context_from_config() {
        let mut config = Config::default();
        config.batch.preset = "youtube".to_string();
        config.paths.output_dir = Some(PathBuf::from("/srv/out"));
        let ctx = RunContext::from_config(&config, PathBuf::from("/srv/in"));

        assert_eq!(ctx.preset.name, "youtube");
        assert!(ctx.preset.registered);
        assert_eq!(ctx.scan.preset_name, "youtube");
        assert_eq!(ctx.output_dir_for(Path::new("/srv/in/a.mp4")), PathBuf::from("/srv/out"));
        assert_eq!(
            ctx.output_dir_for(Path::new("/srv/in/day1/a.mp4")),
            PathBuf::from("/srv/out/day1")
        );
        assert_eq!(ctx.detection.threshold_db, -40.0);
        assert_eq!(ctx.concurrency.max_concurrent_files, 1);

        config.paths.output_dir = None;
        let ctx = RunContext::from_config(&config, PathBuf::from("/srv/in"));
        assert_eq!(ctx.output_dir_for(Path::new("/srv/in/a.mp4")), PathBuf::from("/srv/in"));
    }
}
