//! CLI entry point for silencecut
//!
//! Parses arguments, layers them over config file and environment settings,
//! runs preflight checks and drives one batch over a folder.

use clap::Parser;
use silencecut::{
    check_engine_available, check_input_folder, ensure_dir, BatchDriver, Config, FfmpegEngine,
    PresetRegistry, RunContext,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// silencecut - remove silent stretches from videos and re-encode for a platform preset
#[derive(Parser, Debug)]
#[command(name = "silencecut")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Folder containing the videos to process
    folder: Option<String>,

    /// Preset for the final encode (tiktok, highest, youtube, facebook, instagram)
    #[arg(short, long)]
    preset: Option<String>,

    /// Path to a config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Files processed at once (0 = derive from CPU count)
    #[arg(short, long)]
    jobs: Option<u32>,

    /// Silence threshold in dB
    #[arg(long, allow_hyphen_values = true)]
    threshold_db: Option<f64>,

    /// Minimum silence length in seconds
    #[arg(long)]
    min_silence: Option<f64>,

    /// Directory for final outputs and reports (default: next to each source)
    #[arg(short, long)]
    output_dir: Option<String>,

    /// Directory for intermediate files
    #[arg(long)]
    work_dir: Option<String>,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Re-encode even when the output already exists
    #[arg(long)]
    overwrite: bool,

    /// Keep the silence-trimmed intermediate files
    #[arg(long)]
    keep_intermediate: bool,

    /// Write the batch summary as JSON to this path
    #[arg(long)]
    summary_json: Option<String>,

    /// Skip the ffmpeg preflight check. For testing only.
    #[arg(long, default_value = "false")]
    skip_checks: bool,

    /// Print the registered presets and exit
    #[arg(long)]
    list_presets: bool,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Clean up a user-supplied path: surrounding whitespace and quotes go,
/// a leading `~` expands to `$HOME`, and relative paths become absolute.
fn sanitize_path(raw: &str) -> PathBuf {
    let mut s = raw.trim();
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            s = &s[1..s.len() - 1];
        }
    }

    let path = match s.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => match std::env::var("HOME") {
            Ok(home) => PathBuf::from(home).join(rest.trim_start_matches('/')),
            Err(_) => PathBuf::from(s),
        },
        _ => PathBuf::from(s),
    };

    if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&path))
            .unwrap_or(path)
    }
}

fn load_config(args: &Args) -> Result<Config, String> {
    let mut config = match &args.config {
        Some(path) => Config::load(path).map_err(|e| format!("{}: {}", path.display(), e))?,
        None => Config::from_env(),
    };

    if let Some(preset) = &args.preset {
        config.batch.preset = preset.trim().to_string();
    }
    if let Some(jobs) = args.jobs {
        config.batch.max_concurrent_files = jobs;
    }
    if let Some(db) = args.threshold_db {
        config.detection.threshold_db = db;
    }
    if let Some(secs) = args.min_silence {
        config.detection.min_silence_secs = secs;
    }
    if let Some(dir) = &args.output_dir {
        config.paths.output_dir = Some(sanitize_path(dir));
    }
    if let Some(dir) = &args.work_dir {
        config.paths.work_dir = Some(sanitize_path(dir));
    }
    if args.recursive {
        config.batch.recursive = true;
    }
    if args.overwrite {
        config.batch.skip_existing = false;
    }
    if args.keep_intermediate {
        config.batch.keep_intermediate = true;
    }

    // The preset name becomes part of every output file name
    let preset = config.batch.preset.as_str();
    if preset.is_empty() || preset == "." || preset == ".." || preset.contains(['/', '\\']) {
        return Err(format!("invalid preset name {:?}", preset));
    }
    Ok(config)
}

fn print_presets() {
    for name in PresetRegistry::names() {
        let preset = PresetRegistry::lookup(name).settings;
        println!(
            "{:<10} crf {:>2}  {}  {}  audio {}k",
            name,
            preset.quality_factor,
            preset.target_resolution,
            preset.encoder_effort.as_str(),
            preset.audio_bitrate_kbps
        );
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if args.list_presets {
        print_presets();
        return ExitCode::SUCCESS;
    }

    let Some(folder) = args.folder.as_deref() else {
        eprintln!("No input folder given. Run with --help for usage.");
        return ExitCode::FAILURE;
    };
    let folder = sanitize_path(folder);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = check_input_folder(&folder) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let engine = FfmpegEngine::new(&config.engine.ffmpeg_path);
    if args.skip_checks {
        tracing::warn!("skipping startup checks (--skip-checks enabled)");
    } else if let Err(e) = check_engine_available(engine.program()) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let ctx = RunContext::from_config(&config, folder);
    let dirs: Vec<&Path> = ctx
        .output_dir
        .iter()
        .map(PathBuf::as_path)
        .chain(std::iter::once(ctx.work_dir.as_path()))
        .collect();
    for dir in dirs {
        if let Err(e) = ensure_dir(dir) {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    }

    let driver = BatchDriver::new(ctx, Arc::new(engine));
    let summary = driver.run().await;

    println!(
        "Processed {} file(s): {} encoded ({} unchanged), {} skipped, {} failed",
        summary.files.len(),
        summary.encoded,
        summary.pass_through,
        summary.skipped,
        summary.failed
    );
    for record in summary.failures() {
        if let silencecut::FileOutcome::Failed { stage, message } = &record.outcome {
            eprintln!("  {} failed at {}: {}", record.path.display(), stage, message);
        }
    }

    if let Some(path) = &args.summary_json {
        let path = sanitize_path(path);
        match summary.write_json(&path) {
            Ok(()) => tracing::info!(path = %path.display(), "wrote batch summary"),
            Err(e) => {
                eprintln!("Failed to write summary {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
    }

    if summary.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
