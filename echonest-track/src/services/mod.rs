//! Service modules for analysis retrieval

pub mod accessor;
pub mod cache;
pub mod envelope;
pub mod facets;
pub mod hasher;
pub mod orchestrator;
pub mod transport;
pub mod upload_gate;

pub use accessor::{FacetFailure, TrackAccessor};
pub use cache::{AnalysisCache, StoreOutcome};
pub use facets::{missing_facets, Facet, FACET_NAMES};
pub use hasher::{hash_bytes, hash_file, ContentHash};
pub use orchestrator::{
    AnalysisHandler, AnalysisOrchestrator, AnalysisSource, RetrievalFailure, RetrievalHandle,
    RetrievalOutcome,
};
pub use transport::{AnalysisTransport, HttpTransport, UploadRequest};
pub use upload_gate::{ExistenceCheck, GateOutcome, KeyValidation, UploadGate};
