//! Startup checks module
//!
//! Preflight checks run once before a batch starts:
//! - The input folder exists and is a directory
//! - The media engine can be launched (`ffmpeg -version`)
//! - Output and work directories exist or can be created

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Input folder not found or not a directory: {0}")]
    InputFolder(PathBuf),

    #[error("Media engine not available: {0}")]
    EngineUnavailable(String),

    #[error("Cannot create directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Parse FFmpeg version string and extract major version number
///
/// Handles various FFmpeg version formats:
/// - Standard: "ffmpeg version 6.1.1 ..."
/// - N-prefixed: "ffmpeg version n7.0-... ..."
/// - Git builds: "ffmpeg version N-113684-g..." yield `None`
pub fn parse_ffmpeg_version(version_output: &str) -> Option<u32> {
    let version_line = version_output
        .lines()
        .find(|line| line.to_lowercase().contains("ffmpeg version"))?;

    let version_part = version_line
        .to_lowercase()
        .split("ffmpeg version")
        .nth(1)?
        .split_whitespace()
        .next()?
        .to_string();

    let version_str = version_part.trim_start_matches('n');

    // Major version is before the first '.' or '-'
    let major_str = version_str.split(['.', '-']).next()?;

    major_str.parse().ok()
}

/// Check that the engine launches by running `<program> -version`
///
/// Returns the parsed major version when the banner has one.
pub fn check_engine_available(program: &Path) -> Result<Option<u32>, StartupError> {
    let output = Command::new(program)
        .arg("-version")
        .output()
        .map_err(|e| {
            StartupError::EngineUnavailable(format!(
                "{} -version failed; is ffmpeg installed and in PATH? Error: {}",
                program.display(),
                e
            ))
        })?;

    if !output.status.success() {
        return Err(StartupError::EngineUnavailable(format!(
            "{} -version exited with {}",
            program.display(),
            output.status
        )));
    }

    let version_output = String::from_utf8_lossy(&output.stdout);
    let major = parse_ffmpeg_version(&version_output);
    match major {
        Some(major) => tracing::info!(program = %program.display(), major, "media engine available"),
        None => tracing::warn!(
            program = %program.display(),
            banner = version_output.lines().next().unwrap_or("(empty)"),
            "could not parse engine version"
        ),
    }
    Ok(major)
}

/// Check the input folder is a directory
pub fn check_input_folder(folder: &Path) -> Result<(), StartupError> {
    if folder.is_dir() {
        Ok(())
    } else {
        Err(StartupError::InputFolder(folder.to_path_buf()))
    }
}

/// Create a directory (and parents) if missing
pub fn ensure_dir(path: &Path) -> Result<(), StartupError> {
    fs::create_dir_all(path).map_err(|source| StartupError::Directory {
        path: path.to_path_buf(),
        source,
    })
}
