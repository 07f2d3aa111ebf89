//! Track analysis data model
//!
//! Each facet is fetched independently and is either present (`Some`) or
//! absent (`None`). There is no partially populated facet.

use serde::{Deserialize, Serialize};

/// Number of pitch classes / timbre coefficients per segment
pub const SEGMENT_VECTOR_LEN: usize = 12;

/// Pitch class names indexed by key value (0 = C)
const KEY_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Point in time with the service's confidence in it (bars, beats, tatums)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// 0.0 - 1.0, not validated
    pub confidence: f64,
    /// Seconds from track start
    pub time: f64,
}

/// Value with the service's confidence in it (key, mode, tempo, time signature)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate<T> {
    pub confidence: f64,
    pub value: T,
}

/// Key estimate, value 0-11 with 0 = C
pub type KeyEstimate = Estimate<i32>;
/// Mode estimate, 0 = minor, 1 = major
pub type ModeEstimate = Estimate<i32>;
/// Tempo estimate in beats per minute
pub type TempoEstimate = Estimate<f64>;
/// Beats per measure; 0 = none, 1 = unknown/ambiguous
pub type TimeSignatureEstimate = Estimate<i32>;

/// Pitch class name for a key value, `None` outside 0-11
pub fn key_name(key: i32) -> Option<&'static str> {
    usize::try_from(key).ok().and_then(|k| KEY_NAMES.get(k)).copied()
}

/// Track metadata as reported by the service
///
/// Tag-derived fields are optional upstream; absent values stay empty / zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub status: String,
    pub id: String,
    pub md5: String,
    pub artist: String,
    pub release: String,
    pub title: String,
    pub genre: String,
    /// Seconds
    pub duration: f64,
    /// Hz
    pub sample_rate: u32,
    /// kbps
    pub bit_rate: u32,
}

/// Large-scale structural section (verse, chorus, ...)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub start: f64,
    pub duration: f64,
}

/// Loudness level (dB) and the time it is reached
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentLoudness {
    pub loudness: f64,
    pub time: f64,
}

/// Short, timbrally uniform slice of audio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub duration: f64,
    pub loudness_average: SegmentLoudness,
    pub loudness_max: SegmentLoudness,
    pub pitches: [f64; SEGMENT_VECTOR_LEN],
    pub timbre: [f64; SEGMENT_VECTOR_LEN],
}

/// Aggregate analysis result for one audio file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackAnalysis {
    /// Content hash the analysis belongs to
    pub md5: String,
    pub analysis_version: u32,

    pub duration: Option<f64>,
    pub end_of_fade_in: Option<f64>,
    pub start_of_fade_out: Option<f64>,
    pub loudness: Option<f64>,
    pub key: Option<KeyEstimate>,
    pub mode: Option<ModeEstimate>,
    pub tempo: Option<TempoEstimate>,
    pub time_signature: Option<TimeSignatureEstimate>,
    pub metadata: Option<Metadata>,
    pub bars: Option<Vec<Marker>>,
    pub beats: Option<Vec<Marker>>,
    pub tatums: Option<Vec<Marker>>,
    pub sections: Option<Vec<Section>>,
    pub segments: Option<Vec<Segment>>,
}

impl TrackAnalysis {
    /// Empty analysis for a content hash; no facet loaded yet
    pub fn new(md5: impl Into<String>, analysis_version: u32) -> Self {
        Self {
            md5: md5.into(),
            analysis_version,
            duration: None,
            end_of_fade_in: None,
            start_of_fade_out: None,
            loudness: None,
            key: None,
            mode: None,
            tempo: None,
            time_signature: None,
            metadata: None,
            bars: None,
            beats: None,
            tatums: None,
            sections: None,
            segments: None,
        }
    }
}
