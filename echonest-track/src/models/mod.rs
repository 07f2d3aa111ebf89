//! Data models for analysis retrieval

pub mod analysis;
pub mod session;

pub use analysis::{
    key_name, Estimate, KeyEstimate, Marker, Metadata, ModeEstimate, Section, Segment,
    SegmentLoudness, TempoEstimate, TimeSignatureEstimate, TrackAnalysis, SEGMENT_VECTOR_LEN,
};
pub use session::{AnalysisSession, RetrievalState, RetrievalTracker, StateTransition, API_VERSION};
