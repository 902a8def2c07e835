//! Plain-text silence report written next to each output.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::silence::SilenceInterval;

/// `<dir>/<stem>_silence_report.txt`
///
/// For example: `/media/talk.mp4` with `dir = /out` -> `/out/talk_silence_report.txt`
pub fn silence_report_path(source: &Path, dir: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join(format!("{}_silence_report.txt", stem))
}

fn seconds(value: Option<f64>) -> String {
    value.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

/// Render the report body.
pub fn render_silence_report(intervals: &[SilenceInterval]) -> String {
    if intervals.is_empty() {
        return "No silence detected.\n".to_string();
    }

    let mut out = String::new();
    for (i, interval) in intervals.iter().enumerate() {
        let _ = writeln!(out, "Silence {}:", i + 1);
        let _ = writeln!(out, "  Start:    {} seconds", seconds(interval.start));
        let _ = writeln!(out, "  End:      {} seconds", interval.end);
        let _ = writeln!(out, "  Duration: {} seconds", seconds(interval.duration));
        out.push('\n');
    }
    out
}

/// Write the report for `source` into `dir`, returning its path.
pub fn write_silence_report(
    source: &Path,
    dir: &Path,
    intervals: &[SilenceInterval],
) -> io::Result<PathBuf> {
    let path = silence_report_path(source, dir);
    fs::write(&path, render_silence_report(intervals))?;
    Ok(path)
}
