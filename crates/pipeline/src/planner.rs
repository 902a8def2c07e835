//! Segment planning.
//!
//! Derives the non-silent segments to keep as the complement of an ordered
//! list of silence intervals. The last segment is always open-ended so the
//! source duration never has to be known.

use crate::silence::SilenceInterval;
use serde::Serialize;
use std::fmt;

/// Where a kept segment stops.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum SegmentEnd {
    /// A finite timestamp in seconds
    At(f64),
    /// Through the end of the stream
    EndOfStream,
}

/// A non-silent span to retain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    pub start: f64,
    pub end: SegmentEnd,
}

impl Segment {
    /// Covers the entire source: starts at zero and runs to end-of-stream.
    pub fn is_whole_file(&self) -> bool {
        self.start <= 0.0 && self.end == SegmentEnd::EndOfStream
    }

    /// Duration in seconds, `None` for the open-ended segment.
    pub fn duration(&self) -> Option<f64> {
        match self.end {
            SegmentEnd::At(end) => Some(end - self.start),
            SegmentEnd::EndOfStream => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            SegmentEnd::At(end) => write!(f, "{}..{}", self.start, end),
            SegmentEnd::EndOfStream => write!(f, "{}..EOS", self.start),
        }
    }
}

/// Plan the segments to keep.
///
/// The cursor starts at zero. An interval without a start only moves the
/// cursor. Otherwise the span between the cursor and the silence start is
/// kept if non-empty, and the cursor moves to the silence end. A trailing
/// open-ended segment is always emitted, so an empty interval list yields
/// exactly one whole-file segment.
///
/// The cursor never moves backwards, which keeps segments ordered and
/// non-overlapping even if intervals arrive out of order.
pub fn plan_segments(intervals: &[SilenceInterval]) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(intervals.len() + 1);
    let mut cursor = 0.0_f64;

    for interval in intervals {
        if let Some(start) = interval.start {
            if cursor < start {
                segments.push(Segment {
                    start: cursor,
                    end: SegmentEnd::At(start),
                });
                cursor = start;
            }
        }
        cursor = cursor.max(interval.end);
    }

    segments.push(Segment {
        start: cursor,
        end: SegmentEnd::EndOfStream,
    });

    segments
}
