//! Silence interval parser.
//!
//! Turns the diagnostic text printed by the engine's `silencedetect` filter
//! into a typed, ordered list of [`SilenceInterval`]s.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use thiserror::Error;

/// One marker and its value, e.g. `silence_end: 2.08333e-05`. ffmpeg prints
/// these with `%g`, so small values come out in exponent form.
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"silence_(start|end|duration):\s*(-?\d+(?:\.\d*)?(?:[eE][-+]?\d+)?)")
        .expect("valid regex")
});

/// Marker substrings that show the engine reported silence at all.
const SILENCE_MARKERS: &[&str] = &["silence_start", "silence_end", "silence_duration"];

/// Error returned when diagnostics mention silence but yield no numbers.
#[derive(Debug, Error, PartialEq)]
#[error("silence markers present but no numeric values could be extracted ({markers} markers seen)")]
pub struct ParseError {
    /// How many marker occurrences were seen in the text
    pub markers: usize,
}

/// Parameters the diagnostics were produced with. Carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectionParams {
    /// Noise floor in dB
    pub threshold_db: f64,
    /// Minimum silent span in seconds
    pub min_silence_secs: f64,
}

/// A detected span of near-silence, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SilenceInterval {
    /// `None` when silence was already running when detection began
    pub start: Option<f64>,
    pub end: f64,
    pub duration: Option<f64>,
}

/// Result of parsing one file's diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SilenceScan {
    pub params: DetectionParams,
    pub intervals: Vec<SilenceInterval>,
}

impl SilenceScan {
    /// No silence was found; the file is carried forward unchanged.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

/// Parse `silencedetect` diagnostics into intervals.
///
/// Markers are paired in the order they appear: a start opens an interval,
/// the next end closes it, and a duration right after an end belongs to that
/// interval. An end with no open start gets an absent start, so missing
/// starts always land on the earliest intervals. A start at or before zero
/// is reported as absent. A start still open at the end of the text is
/// dropped.
pub fn parse_silence_log(text: &str, params: DetectionParams) -> Result<SilenceScan, ParseError> {
    let mut intervals: Vec<SilenceInterval> = Vec::new();
    let mut open_start: Option<f64> = None;
    let mut awaiting_duration = false;
    let mut values = 0usize;

    for caps in MARKER_RE.captures_iter(text) {
        let Ok(value) = caps[2].parse::<f64>() else {
            continue;
        };
        values += 1;

        match &caps[1] {
            "start" => {
                if let Some(previous) = open_start.replace(value) {
                    tracing::debug!(previous, next = value, "silence start without an end, replacing");
                }
                awaiting_duration = false;
            }
            "end" => {
                intervals.push(SilenceInterval {
                    start: open_start.take().filter(|&s| s > 0.0),
                    end: value,
                    duration: None,
                });
                awaiting_duration = true;
            }
            _ => {
                if awaiting_duration {
                    if let Some(last) = intervals.last_mut() {
                        last.duration = Some(value);
                    }
                }
                awaiting_duration = false;
            }
        }
    }

    if values == 0 {
        let markers: usize = SILENCE_MARKERS
            .iter()
            .map(|marker| text.matches(marker).count())
            .sum();
        if markers > 0 {
            return Err(ParseError { markers });
        }
    }

    if let Some(start) = open_start {
        tracing::debug!(start, "dropping trailing silence start without a matching end");
    }

    Ok(SilenceScan { params, intervals })
}
