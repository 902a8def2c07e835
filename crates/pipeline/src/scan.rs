//! Scanner module for discovering eligible media files in the input folder.
//!
//! Filters by extension, skips hidden directories and leaves out files this
//! tool produced on an earlier run.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Stem suffix of stage-1 intermediates.
pub const INTERMEDIATE_SUFFIX: &str = "_removed_silence";

/// A source file discovered during scanning.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanCandidate {
    /// Full path to the media file.
    pub path: PathBuf,
    /// File size in bytes at discovery time.
    pub size_bytes: u64,
}

/// What to pick up from the folder.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Extensions without the dot, matched case-insensitively.
    pub extensions: Vec<String>,
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Preset name of this run; `<stem>_<preset>` files are our own outputs.
    pub preset_name: String,
}

/// Checks if a file has one of the given extensions (case-insensitive).
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            extensions
                .iter()
                .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// True for intermediates and final outputs of the given preset.
pub fn is_generated_output(path: &Path, preset_name: &str) -> bool {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    stem.ends_with(INTERMEDIATE_SUFFIX) || stem.ends_with(&format!("_{}", preset_name))
}

/// Scans `root` for eligible source files, sorted by path.
///
/// This function:
/// - Walks the top level only, or the whole tree when `recursive`
/// - Skips hidden directories (names starting with `.`)
/// - Filters files by extension (case-insensitive)
/// - Excludes files produced by this tool
pub fn scan_folder(root: &Path, options: &ScanOptions) -> Vec<ScanCandidate> {
    let mut candidates = Vec::new();

    if !root.exists() {
        return candidates;
    }

    let max_depth = if options.recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(root)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            // Allow the root directory even if it starts with '.'
            if entry.file_type().is_dir() && entry.depth() > 0 {
                if let Some(name) = entry.file_name().to_str() {
                    return !name.starts_with('.');
                }
            }
            true
        });

    for entry in walker.filter_map(|e| e.ok()) {
        let path = entry.path();

        if !entry.file_type().is_file() {
            continue;
        }

        if !has_extension(path, &options.extensions) {
            continue;
        }

        if is_generated_output(path, &options.preset_name) {
            tracing::debug!(file = %path.display(), "ignoring generated output");
            continue;
        }

        if let Ok(metadata) = entry.metadata() {
            candidates.push(ScanCandidate {
                path: path.to_path_buf(),
                size_bytes: metadata.len(),
            });
        }
    }

    candidates.sort_by(|a, b| a.path.cmp(&b.path));
    candidates
}
