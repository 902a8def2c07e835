//! Trim + concat filter graph construction.
//!
//! Each kept segment becomes a video `trim` and an audio `atrim` over the same
//! time range, each followed by a timestamp reset. All trimmed outputs are
//! joined by one video-only and one audio-only `concat`.

use crate::planner::{Segment, SegmentEnd};
use std::collections::HashMap;
use std::fmt::Write as _;
use thiserror::Error;

/// Label of the joined video stream.
pub const VIDEO_OUT: &str = "outv";
/// Label of the joined audio stream.
pub const AUDIO_OUT: &str = "outa";

/// A planner or builder defect. Never patched up, only reported.
#[derive(Debug, Error, PartialEq)]
pub enum GraphInvariantError {
    #[error("no segments to build a graph from")]
    NoSegments,

    #[error("node count mismatch: {video} video, {audio} audio trims for {segments} segments")]
    NodeCount {
        segments: usize,
        video: usize,
        audio: usize,
    },

    #[error("{kind} concat has {operands} operands for {segments} segments")]
    ConcatOperands {
        kind: StreamKind,
        operands: usize,
        segments: usize,
    },

    #[error("label [{label}] produced {produced} times and consumed {consumed} times")]
    Label {
        label: String,
        produced: usize,
        consumed: usize,
    },
}

/// Which elementary stream a node works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StreamKind::Video => "video",
            StreamKind::Audio => "audio",
        })
    }
}

impl StreamKind {
    fn input_pad(self) -> &'static str {
        match self {
            StreamKind::Video => "0:v",
            StreamKind::Audio => "0:a",
        }
    }

    fn trim_filter(self) -> &'static str {
        match self {
            StreamKind::Video => "trim",
            StreamKind::Audio => "atrim",
        }
    }

    fn reset_filter(self) -> &'static str {
        match self {
            StreamKind::Video => "setpts=PTS-STARTPTS",
            StreamKind::Audio => "asetpts=PTS-STARTPTS",
        }
    }

    fn label_prefix(self) -> char {
        match self {
            StreamKind::Video => 'v',
            StreamKind::Audio => 'a',
        }
    }
}

/// Trim one time range out of the source and reset its timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimNode {
    pub kind: StreamKind,
    pub start: f64,
    pub end: SegmentEnd,
    pub output: String,
}

impl TrimNode {
    fn render(&self, out: &mut String) {
        let _ = write!(
            out,
            "[{}]{}=start={}",
            self.kind.input_pad(),
            self.kind.trim_filter(),
            self.start
        );
        if let SegmentEnd::At(end) = self.end {
            let _ = write!(out, ":end={}", end);
        }
        let _ = write!(out, ",{}[{}]", self.kind.reset_filter(), self.output);
    }
}

/// Join trimmed pieces of one stream kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatNode {
    pub kind: StreamKind,
    pub inputs: Vec<String>,
    pub output: String,
}

impl ConcatNode {
    fn render(&self, out: &mut String) {
        for input in &self.inputs {
            let _ = write!(out, "[{}]", input);
        }
        let (v, a) = match self.kind {
            StreamKind::Video => (1, 0),
            StreamKind::Audio => (0, 1),
        };
        let _ = write!(
            out,
            "concat=n={}:v={}:a={}[{}]",
            self.inputs.len(),
            v,
            a,
            self.output
        );
    }
}

/// Declarative trim/concat graph for one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    pub video_trims: Vec<TrimNode>,
    pub audio_trims: Vec<TrimNode>,
    pub video_concat: ConcatNode,
    pub audio_concat: ConcatNode,
}

impl FilterGraph {
    /// Number of segments the graph retains.
    pub fn segment_count(&self) -> usize {
        self.video_trims.len()
    }

    /// Render as an engine `-filter_complex` argument.
    pub fn to_filter_complex(&self) -> String {
        let mut out = String::new();
        for (video, audio) in self.video_trims.iter().zip(&self.audio_trims) {
            video.render(&mut out);
            out.push(';');
            audio.render(&mut out);
            out.push(';');
        }
        self.video_concat.render(&mut out);
        out.push(';');
        self.audio_concat.render(&mut out);
        out
    }

    /// Output labels to map into the produced file, video first.
    pub fn output_labels(&self) -> [&str; 2] {
        [&self.video_concat.output, &self.audio_concat.output]
    }

    /// Check node counts and that every intermediate label is produced and
    /// consumed exactly once.
    pub fn validate(&self) -> Result<(), GraphInvariantError> {
        let segments = self.video_trims.len().max(self.audio_trims.len());
        if segments == 0 {
            return Err(GraphInvariantError::NoSegments);
        }
        if self.video_trims.len() != self.audio_trims.len() {
            return Err(GraphInvariantError::NodeCount {
                segments,
                video: self.video_trims.len(),
                audio: self.audio_trims.len(),
            });
        }
        for concat in [&self.video_concat, &self.audio_concat] {
            if concat.inputs.len() != segments {
                return Err(GraphInvariantError::ConcatOperands {
                    kind: concat.kind,
                    operands: concat.inputs.len(),
                    segments,
                });
            }
        }

        let mut uses: HashMap<&str, (usize, usize)> = HashMap::new();
        for trim in self.video_trims.iter().chain(&self.audio_trims) {
            uses.entry(trim.output.as_str()).or_default().0 += 1;
        }
        for concat in [&self.video_concat, &self.audio_concat] {
            for input in &concat.inputs {
                uses.entry(input.as_str()).or_default().1 += 1;
            }
        }
        let mut labels: Vec<_> = uses.into_iter().collect();
        labels.sort_by(|a, b| a.0.cmp(b.0));
        if let Some((label, (produced, consumed))) =
            labels.into_iter().find(|(_, (p, c))| *p != 1 || *c != 1)
        {
            return Err(GraphInvariantError::Label {
                label: label.to_string(),
                produced,
                consumed,
            });
        }

        Ok(())
    }
}

/// What stage 1 has to do with a source.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphPlan {
    /// Nothing to cut; copy the source unchanged.
    PassThrough,
    /// Run the graph through the engine.
    Trim(FilterGraph),
}

/// Build the trim/concat plan for a list of segments.
///
/// A single segment spanning the whole file yields [`GraphPlan::PassThrough`].
/// Anything else yields a validated graph.
pub fn build_graph(segments: &[Segment]) -> Result<GraphPlan, GraphInvariantError> {
    match segments {
        [] => return Err(GraphInvariantError::NoSegments),
        [only] if only.is_whole_file() => return Ok(GraphPlan::PassThrough),
        _ => {}
    }

    let trims = |kind: StreamKind| -> Vec<TrimNode> {
        segments
            .iter()
            .enumerate()
            .map(|(i, segment)| TrimNode {
                kind,
                start: segment.start,
                end: segment.end,
                output: format!("{}{}", kind.label_prefix(), i),
            })
            .collect()
    };
    let video_trims = trims(StreamKind::Video);
    let audio_trims = trims(StreamKind::Audio);

    let graph = FilterGraph {
        video_concat: ConcatNode {
            kind: StreamKind::Video,
            inputs: video_trims.iter().map(|t| t.output.clone()).collect(),
            output: VIDEO_OUT.to_string(),
        },
        audio_concat: ConcatNode {
            kind: StreamKind::Audio,
            inputs: audio_trims.iter().map(|t| t.output.clone()).collect(),
            output: AUDIO_OUT.to_string(),
        },
        video_trims,
        audio_trims,
    };

    graph.validate()?;
    Ok(GraphPlan::Trim(graph))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan_segments;
    use crate::silence::SilenceInterval;
    use proptest::prelude::*;

    fn seg(start: f64, end: Option<f64>) -> Segment {
        Segment {
            start,
            end: end.map(SegmentEnd::At).unwrap_or(SegmentEnd::EndOfStream),
        }
    }

    fn expect_graph(plan: GraphPlan) -> FilterGraph {
        match plan {
            GraphPlan::Trim(graph) => graph,
            GraphPlan::PassThrough => panic!("expected a trim graph"),
        }
    }

    #[test]
    fn test_whole_file_is_pass_through() {
        let segments = plan_segments(&[]);
        assert_eq!(build_graph(&segments), Ok(GraphPlan::PassThrough));
    }

    #[test]
    fn test_empty_segments_is_invariant_error() {
        assert_eq!(build_graph(&[]), Err(GraphInvariantError::NoSegments));
    }

    #[test]
    fn test_two_segment_filter_complex() {
        let graph = expect_graph(build_graph(&[seg(0.0, Some(2.0)), seg(4.0, None)]).unwrap());
        assert_eq!(
            graph.to_filter_complex(),
            "[0:v]trim=start=0:end=2,setpts=PTS-STARTPTS[v0];\
             [0:a]atrim=start=0:end=2,asetpts=PTS-STARTPTS[a0];\
             [0:v]trim=start=4,setpts=PTS-STARTPTS[v1];\
             [0:a]atrim=start=4,asetpts=PTS-STARTPTS[a1];\
             [v0][v1]concat=n=2:v=1:a=0[outv];\
             [a0][a1]concat=n=2:v=0:a=1[outa]"
        );
        assert_eq!(graph.output_labels(), ["outv", "outa"]);
    }

    #[test]
    fn test_single_late_segment_is_one_operand_concat() {
        let segments = plan_segments(&[SilenceInterval {
            start: None,
            end: 1.25,
            duration: None,
        }]);
        let graph = expect_graph(build_graph(&segments).unwrap());
        assert_eq!(graph.segment_count(), 1);
        assert_eq!(
            graph.to_filter_complex(),
            "[0:v]trim=start=1.25,setpts=PTS-STARTPTS[v0];\
             [0:a]atrim=start=1.25,asetpts=PTS-STARTPTS[a0];\
             [v0]concat=n=1:v=1:a=0[outv];\
             [a0]concat=n=1:v=0:a=1[outa]"
        );
    }

    #[test]
    fn test_validate_rejects_count_mismatch() {
        let mut graph = expect_graph(build_graph(&[seg(0.0, Some(2.0)), seg(4.0, None)]).unwrap());
        graph.audio_trims.pop();
        assert!(matches!(
            graph.validate(),
            Err(GraphInvariantError::NodeCount { video: 2, audio: 1, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_reused_label() {
        let mut graph = expect_graph(build_graph(&[seg(0.0, Some(2.0)), seg(4.0, None)]).unwrap());
        graph.video_concat.inputs[1] = "v0".to_string();
        assert_eq!(
            graph.validate(),
            Err(GraphInvariantError::Label {
                label: "v0".to_string(),
                produced: 1,
                consumed: 2,
            })
        );
    }

    #[test]
    fn test_validate_rejects_short_concat() {
        let mut graph = expect_graph(build_graph(&[seg(0.0, Some(2.0)), seg(4.0, None)]).unwrap());
        graph.audio_concat.inputs.pop();
        assert!(matches!(
            graph.validate(),
            Err(GraphInvariantError::ConcatOperands {
                kind: StreamKind::Audio,
                operands: 1,
                segments: 2,
            })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // N segments give N video trims, N audio trims and N-operand concats.
        #[test]
        fn prop_graph_shape(bounds in proptest::collection::vec(1u32..100, 1..30)) {
            let mut segments = Vec::new();
            let mut t = 0u32;
            for (i, len) in bounds.iter().enumerate() {
                let start = t;
                t += len;
                let end = if i + 1 == bounds.len() { None } else { Some(t as f64) };
                segments.push(seg(start as f64, end));
                t += 1;
            }
            prop_assume!(!(segments.len() == 1 && segments[0].is_whole_file()));

            let graph = expect_graph(build_graph(&segments).unwrap());
            let n = segments.len();
            prop_assert_eq!(graph.video_trims.len(), n);
            prop_assert_eq!(graph.audio_trims.len(), n);
            prop_assert_eq!(graph.video_concat.inputs.len(), n);
            prop_assert_eq!(graph.audio_concat.inputs.len(), n);

            let rendered = graph.to_filter_complex();
            let concat_n = format!("concat=n={}:", n);
            prop_assert_eq!(rendered.matches(concat_n.as_str()).count(), 2);
            prop_assert_eq!(rendered.matches("setpts=PTS-STARTPTS").count(), 2 * n);
            prop_assert_eq!(rendered.matches(":end=").count(), 2 * (n - 1));
        }
    }
}
