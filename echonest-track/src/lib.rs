//! echonest-track library interface
//!
//! Retrieves Echo Nest track analyses for local audio files: hash the file,
//! make sure the service holds an analysis for it (uploading when needed),
//! fetch every analysis facet, and keep the result in a local cache.
//!
//! The [`AnalysisOrchestrator`] runs a retrieval on a background task and
//! reports to an [`AnalysisHandler`].

pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::config::{ClientConfig, ConfigOverrides};
pub use crate::error::{AnalysisError, AnalysisResult};
pub use crate::models::{RetrievalState, TrackAnalysis};
pub use crate::services::{
    AnalysisHandler, AnalysisOrchestrator, AnalysisSource, RetrievalFailure, RetrievalHandle,
    RetrievalOutcome, TrackAccessor,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
