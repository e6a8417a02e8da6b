// crates/core/src/progress.rs
//! Line-level extraction rules for the external tool's progress output.
//!
//! The tool writes unstructured text on two streams. Each line is checked
//! against two independent rules:
//! - stage detection: a `Destination:` announcement whose trailing file
//!   extension names the kind of stream being fetched, or a merge marker
//! - percentage detection: a 1–3 digit number (optionally decimal)
//!   immediately followed by `%`
//!
//! Lines matching neither rule yield an empty [`LineObservation`]. Nothing
//! here can fail; garbled lines are expected noise.

use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Serialize, Serializer};

/// Coarse phase of a job, shown to the user as a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    DownloadingVideo,
    DownloadingAudio,
    DownloadingSubtitles,
    DownloadingThumbnail,
    Merging,
    Completed,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::DownloadingVideo => "downloading video",
            Stage::DownloadingAudio => "downloading audio",
            Stage::DownloadingSubtitles => "downloading subtitles",
            Stage::DownloadingThumbnail => "downloading thumbnail",
            Stage::Merging => "merging",
            Stage::Completed => "completed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// What a single output line told us. Both fields are independent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineObservation {
    pub stage: Option<Stage>,
    pub percent: Option<u8>,
}

impl LineObservation {
    pub fn is_empty(&self) -> bool {
        self.stage.is_none() && self.percent.is_none()
    }
}

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv"];
const AUDIO_EXTENSIONS: &[&str] = &["m4a", "mp3", "opus", "ogg", "aac"];
const MERGE_MARKERS: &[&str] = &["Merging", "ffmpeg"];

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|[^\d.])(\d{1,3}(?:\.\d+)?)%").expect("valid percent regex"))
}

fn destination_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Destination: .*\.([A-Za-z0-9]+)").expect("valid destination regex")
    })
}

/// Apply both extraction rules to one line.
pub fn observe_line(line: &str) -> LineObservation {
    LineObservation {
        stage: detect_stage(line),
        percent: parse_percent(line),
    }
}

/// Stage announced by this line, if any.
///
/// A merge marker wins over a destination extension on the same line.
pub fn detect_stage(line: &str) -> Option<Stage> {
    if MERGE_MARKERS.iter().any(|m| line.contains(m)) {
        return Some(Stage::Merging);
    }

    let caps = destination_re().captures(line)?;
    let ext = caps.get(1)?.as_str().to_ascii_lowercase();
    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(Stage::DownloadingVideo)
    } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        Some(Stage::DownloadingAudio)
    } else {
        None
    }
}

/// First percentage token on the line, truncated to an integer.
///
/// The token must not be the tail of a longer number. Values above 100 are
/// rejected rather than clamped.
pub fn parse_percent(line: &str) -> Option<u8> {
    let caps = percent_re().captures(line)?;
    let pct: f64 = caps.get(1)?.as_str().parse().ok()?;
    if !(0.0..=100.0).contains(&pct) {
        return None;
    }
    Some(pct.trunc() as u8)
}
