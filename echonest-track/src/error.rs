//! Error types for echonest-track
//!
//! Network and protocol failures are kept apart so callers can tell a dead
//! connection from a status code the service chose to return.

use echonest_common::StatusCode;
use thiserror::Error;

/// Analysis retrieval errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Connection or I/O failure while talking to the service
    #[error("Network error: {0}")]
    Transport(String),

    /// Service answered with a non-success status code
    #[error("{endpoint} returned status {status}")]
    Protocol {
        endpoint: String,
        status: StatusCode,
    },

    /// Malformed or incomplete XML payload
    #[error("Parse error: {0}")]
    Parse(String),

    /// Local cache read/write failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// Local file I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// echonest-common error (configuration)
    #[error("Common error: {0}")]
    Common(#[from] echonest_common::Error),

    /// A retrieval is already in flight on this orchestrator
    #[error("A retrieval is already running")]
    Busy,

    /// Orchestrator has been shut down
    #[error("Orchestrator has been shut down")]
    ShutDown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    pub fn protocol(endpoint: impl Into<String>, status: StatusCode) -> Self {
        AnalysisError::Protocol {
            endpoint: endpoint.into(),
            status,
        }
    }

    /// Status code carried by a protocol error, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            AnalysisError::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        AnalysisError::Transport(err.to_string())
    }
}

impl From<roxmltree::Error> for AnalysisError {
    fn from(err: roxmltree::Error) -> Self {
        AnalysisError::Parse(err.to_string())
    }
}

/// Result type for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;
