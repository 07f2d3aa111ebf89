//! Background retrieval orchestrator
//!
//! Drives one retrieval at a time through its states on a tokio task:
//!
//! ```text
//! Idle → CacheLookup → Done                                  (cache hit)
//!                    → Validating → Uploading → FetchingFacets → Persisting → Done
//! Failed ← CacheLookup | Validating | Uploading | FetchingFacets
//! ```
//!
//! The handler hears about a loaded analysis (from disk or from the service)
//! and about a bars failure. Hashing, validation and upload failures stop the
//! retrieval without invoking the handler; they are reported through the
//! [`RetrievalOutcome`] returned by [`RetrievalHandle::wait`].

use echonest_common::config::is_valid_key;
use echonest_common::StatusCode;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{AnalysisSession, RetrievalState, RetrievalTracker, TrackAnalysis};
use crate::services::accessor::TrackAccessor;
use crate::services::cache::AnalysisCache;
use crate::services::facets::missing_facets;
use crate::services::hasher::{hash_file, ContentHash};
use crate::services::transport::{AnalysisTransport, HttpTransport};
use crate::services::upload_gate::{KeyValidation, UploadGate};

/// Receives retrieval results
///
/// Called on the retrieval's worker task; implementations hand the value off
/// rather than doing long work inline.
pub trait AnalysisHandler: Send + Sync {
    /// A complete analysis is available (loaded from disk or fetched)
    fn on_track_loaded(&self, analysis: TrackAnalysis);

    /// Bars could not be fetched; `failure.analysis` is the partial result
    fn on_track_failed(&self, failure: RetrievalFailure);
}

/// Partial result handed to [`AnalysisHandler::on_track_failed`]
#[derive(Debug)]
pub struct RetrievalFailure {
    pub session: AnalysisSession,
    pub analysis: TrackAnalysis,
    pub error: AnalysisError,
}

/// Where a loaded analysis came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisSource {
    Cache,
    Service,
}

/// Final report of one retrieval
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalOutcome {
    Loaded {
        md5: ContentHash,
        source: AnalysisSource,
        /// Facets that failed and stayed unset
        missing_facets: Vec<&'static str>,
    },
    Failed {
        /// State the retrieval was in when it stopped
        stage: RetrievalState,
        reason: String,
        status: Option<StatusCode>,
        handler_notified: bool,
    },
}

impl RetrievalOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, RetrievalOutcome::Loaded { .. })
    }
}

/// Caller side of a started retrieval
pub struct RetrievalHandle {
    retrieval_id: Uuid,
    outcome: oneshot::Receiver<RetrievalOutcome>,
}

impl RetrievalHandle {
    pub fn retrieval_id(&self) -> Uuid {
        self.retrieval_id
    }

    /// Wait for the retrieval to finish
    pub async fn wait(self) -> AnalysisResult<RetrievalOutcome> {
        self.outcome.await.map_err(|_| {
            AnalysisError::Internal(format!(
                "Retrieval {} ended without reporting an outcome",
                self.retrieval_id
            ))
        })
    }
}

/// Everything one retrieval needs, cloned into its worker task
#[derive(Clone)]
struct RetrievalContext {
    base_url: String,
    api_key: String,
    analysis_version: u32,
    transport: Arc<dyn AnalysisTransport>,
    cache: Arc<AnalysisCache>,
    handler: Arc<dyn AnalysisHandler>,
}

/// Runs retrievals on a background worker, one at a time
pub struct AnalysisOrchestrator {
    context: RetrievalContext,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Set while a retrieval is running; cleared before its outcome is sent
    in_flight: Arc<AtomicBool>,
    shut_down: AtomicBool,
}

impl AnalysisOrchestrator {
    /// Orchestrator talking HTTP to the configured service
    pub fn new(config: &ClientConfig, handler: Arc<dyn AnalysisHandler>) -> AnalysisResult<Self> {
        let transport = Arc::new(HttpTransport::new(config.request_timeout)?);
        let cache = Arc::new(AnalysisCache::new(&config.cache_dir));
        Ok(Self::with_transport(config, transport, cache, handler))
    }

    /// Orchestrator over an explicit transport and cache
    pub fn with_transport(
        config: &ClientConfig,
        transport: Arc<dyn AnalysisTransport>,
        cache: Arc<AnalysisCache>,
        handler: Arc<dyn AnalysisHandler>,
    ) -> Self {
        Self {
            context: RetrievalContext {
                base_url: config.base_url.clone(),
                api_key: config.api_key.clone(),
                analysis_version: config.analysis_version,
                transport,
                cache,
                handler,
            },
            worker: Mutex::new(None),
            in_flight: Arc::new(AtomicBool::new(false)),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.context.cache
    }

    /// Start retrieving the analysis for `file_path`; returns immediately
    ///
    /// Must be called from within a tokio runtime, the worker is spawned on
    /// it. Fails with `Busy` while a previous retrieval is still running, with
    /// `ShutDown` after [`shutdown`](Self::shutdown), and with `Internal`
    /// outside a runtime.
    pub fn start(&self, file_path: impl Into<PathBuf>) -> AnalysisResult<RetrievalHandle> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            AnalysisError::Internal(format!("Retrieval needs a tokio runtime: {}", e))
        })?;

        // Held until the worker handle is stored, so shutdown() either sees
        // the new worker or start() sees the flag
        let mut worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(AnalysisError::ShutDown);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AnalysisError::Busy);
        }

        let file_path = file_path.into();
        let tracker = RetrievalTracker::new();
        let retrieval_id = tracker.retrieval_id();
        let (sender, receiver) = oneshot::channel();
        let context = self.context.clone();
        let in_flight = InFlight(Arc::clone(&self.in_flight));

        tracing::info!(
            retrieval_id = %retrieval_id,
            file = %file_path.display(),
            "Starting analysis retrieval"
        );

        *worker = Some(runtime.spawn(async move {
            tracing::debug!(retrieval_id = %retrieval_id, "Background retrieval task started");
            let outcome = run_retrieval(context, tracker, &file_path).await;
            drop(in_flight);
            if sender.send(outcome).is_err() {
                tracing::debug!(retrieval_id = %retrieval_id, "Retrieval outcome dropped by caller");
            }
        }));

        Ok(RetrievalHandle {
            retrieval_id,
            outcome: receiver,
        })
    }

    /// Refuse new retrievals and wait for the one in flight to finish
    pub async fn shutdown(&self) {
        let handle = {
            let mut worker = self
                .worker
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            self.shut_down.store(true, Ordering::SeqCst);
            worker.take()
        };

        if let Some(handle) = handle {
            tracing::info!("Waiting for in-flight retrieval before shutdown");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Retrieval task ended abnormally");
            }
        }
        tracing::info!("Analysis orchestrator shut down");
    }
}

/// Clears the in-flight flag when the worker finishes, panics included
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn run_retrieval(
    context: RetrievalContext,
    mut tracker: RetrievalTracker,
    file_path: &Path,
) -> RetrievalOutcome {
    tracker.transition_to(RetrievalState::CacheLookup);

    let md5 = match hash_file(file_path).await {
        Ok(md5) => md5,
        Err(error) => return fail(&mut tracker, &error, false),
    };

    match context.cache.load(&md5, context.analysis_version).await {
        Ok(Some(analysis)) => {
            tracker.transition_to(RetrievalState::Done);
            tracing::info!(
                retrieval_id = %tracker.retrieval_id(),
                md5 = %md5,
                "Analysis loaded from disk"
            );
            context.handler.on_track_loaded(analysis);
            return RetrievalOutcome::Loaded {
                md5,
                source: AnalysisSource::Cache,
                missing_facets: Vec::new(),
            };
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(md5 = %md5, error = %e, "Ignoring unusable cache entry");
        }
    }

    tracker.transition_to(RetrievalState::Validating);

    if !is_valid_key(&context.api_key) {
        tracing::warn!("Echo Nest API key not set");
        let error = AnalysisError::Common(echonest_common::Error::Config(
            "Echo Nest API key not set".to_string(),
        ));
        return fail(&mut tracker, &error, false);
    }

    let session = AnalysisSession::new(
        tracker.retrieval_id(),
        context.base_url.clone(),
        context.api_key.clone(),
        md5.clone(),
        file_path.to_path_buf(),
        context.analysis_version,
    );
    let gate = UploadGate::new(Arc::clone(&context.transport));

    match gate.validate_key(&session).await {
        Ok(KeyValidation::Valid) => {}
        Ok(KeyValidation::Invalid) => {
            let error = AnalysisError::protocol("get_duration", StatusCode::InvalidKey);
            return fail(&mut tracker, &error, false);
        }
        Err(error) => return fail(&mut tracker, &error, false),
    }

    tracker.transition_to(RetrievalState::Uploading);

    if let Err(error) = gate.ensure_analyzed(&session).await {
        return fail(&mut tracker, &error, false);
    }

    tracker.transition_to(RetrievalState::FetchingFacets);

    let mut accessor = TrackAccessor::new(session, Arc::clone(&context.transport));
    if let Err(error) = accessor.bars().await {
        let outcome = fail(&mut tracker, &error, true);
        let (session, analysis) = accessor.into_parts();
        context.handler.on_track_failed(RetrievalFailure {
            session,
            analysis,
            error,
        });
        return outcome;
    }

    let failures = accessor.fetch_remaining().await;
    if !failures.is_empty() {
        tracing::warn!(
            retrieval_id = %tracker.retrieval_id(),
            failed = failures.len(),
            facets = ?failures.iter().map(|f| f.facet).collect::<Vec<_>>(),
            "Some facets could not be loaded"
        );
    }

    tracker.transition_to(RetrievalState::Persisting);

    let (_session, analysis) = accessor.into_parts();
    let missing = missing_facets(&analysis);
    if missing.is_empty() {
        if let Err(e) = context.cache.store(&analysis).await {
            tracing::error!(md5 = %md5, error = %e, "Failed to save analysis to disk");
        }
    } else {
        tracing::warn!(
            md5 = %md5,
            missing = ?missing,
            "Incomplete analysis not saved to disk"
        );
    }

    tracker.transition_to(RetrievalState::Done);
    tracing::info!(
        retrieval_id = %tracker.retrieval_id(),
        md5 = %md5,
        "Analysis loaded from server"
    );
    context.handler.on_track_loaded(analysis);

    RetrievalOutcome::Loaded {
        md5,
        source: AnalysisSource::Service,
        missing_facets: missing,
    }
}

fn fail(
    tracker: &mut RetrievalTracker,
    error: &AnalysisError,
    handler_notified: bool,
) -> RetrievalOutcome {
    let stage = tracker.state();
    tracker.transition_to(RetrievalState::Failed);
    tracing::error!(
        retrieval_id = %tracker.retrieval_id(),
        stage = ?stage,
        error = %error,
        "Analysis retrieval failed"
    );
    RetrievalOutcome::Failed {
        stage,
        reason: error.to_string(),
        status: error.status(),
        handler_notified,
    }
}
