//! Retrieval session and state machine
//!
//! State progression:
//! IDLE → CACHE_LOOKUP → DONE (cache hit)
//! IDLE → CACHE_LOOKUP → VALIDATING → UPLOADING → FETCHING_FACETS → PERSISTING → DONE
//!
//! FAILED is reachable from CACHE_LOOKUP, VALIDATING, UPLOADING and FETCHING_FACETS.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::services::hasher::ContentHash;

/// API protocol version sent with every request
pub const API_VERSION: &str = "3";

/// Everything needed to talk to the service about one file
///
/// Immutable once created; owned by the retrieval that created it.
#[derive(Clone)]
pub struct AnalysisSession {
    session_id: Uuid,
    base_url: String,
    api_key: String,
    md5: ContentHash,
    file_path: PathBuf,
    analysis_version: u32,
    started_at: DateTime<Utc>,
}

impl AnalysisSession {
    pub fn new(
        session_id: Uuid,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        md5: ContentHash,
        file_path: impl Into<PathBuf>,
        analysis_version: u32,
    ) -> Self {
        Self {
            session_id,
            base_url: base_url.into(),
            api_key: api_key.into(),
            md5,
            file_path: file_path.into(),
            analysis_version,
            started_at: Utc::now(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn md5(&self) -> &ContentHash {
        &self.md5
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn analysis_version(&self) -> u32 {
        self.analysis_version
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Query parameters identifying this track: api_key, md5, version, analysis_version
    pub fn track_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("api_key", self.api_key.clone()),
            ("md5", self.md5.to_string()),
            ("version", API_VERSION.to_string()),
            ("analysis_version", self.analysis_version.to_string()),
        ]
    }
}

// API key is never printed
impl fmt::Debug for AnalysisSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisSession")
            .field("session_id", &self.session_id)
            .field("base_url", &self.base_url)
            .field("api_key_len", &self.api_key.len())
            .field("md5", &self.md5)
            .field("file_path", &self.file_path)
            .field("analysis_version", &self.analysis_version)
            .field("started_at", &self.started_at)
            .finish()
    }
}

/// Retrieval workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetrievalState {
    /// Not started
    Idle,
    /// Hashing the file and looking for a persisted analysis
    CacheLookup,
    /// Checking the API key against the service
    Validating,
    /// Existence check, upload-and-wait when unknown
    Uploading,
    /// Bars first, then every remaining facet
    FetchingFacets,
    /// Writing the cache entry
    Persisting,
    /// Analysis delivered to the handler
    Done,
    /// Retrieval stopped on an error
    Failed,
}

impl RetrievalState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RetrievalState::Done | RetrievalState::Failed)
    }
}

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub old_state: RetrievalState,
    pub new_state: RetrievalState,
    pub transitioned_at: DateTime<Utc>,
}

/// Tracks the state of one retrieval and the transitions it went through
#[derive(Debug, Clone)]
pub struct RetrievalTracker {
    retrieval_id: Uuid,
    state: RetrievalState,
    transitions: Vec<StateTransition>,
}

impl RetrievalTracker {
    pub fn new() -> Self {
        Self {
            retrieval_id: Uuid::new_v4(),
            state: RetrievalState::Idle,
            transitions: Vec::new(),
        }
    }

    pub fn retrieval_id(&self) -> Uuid {
        self.retrieval_id
    }

    pub fn state(&self) -> RetrievalState {
        self.state
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Visited states in order, starting with `Idle`
    pub fn path(&self) -> Vec<RetrievalState> {
        std::iter::once(RetrievalState::Idle)
            .chain(self.transitions.iter().map(|t| t.new_state))
            .collect()
    }

    /// Transition to new state
    pub fn transition_to(&mut self, new_state: RetrievalState) -> &StateTransition {
        let transition = StateTransition {
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        tracing::debug!(
            retrieval_id = %self.retrieval_id,
            from = ?transition.old_state,
            to = ?transition.new_state,
            "Retrieval state transition"
        );
        self.state = new_state;
        self.transitions.push(transition);
        // just pushed
        &self.transitions[self.transitions.len() - 1]
    }
}

impl Default for RetrievalTracker {
    fn default() -> Self {
        Self::new()
    }
}
