//! Track analysis accessor
//!
//! Lazily fetches facets for one analyzed track. A loaded facet is memoized
//! and never requested or changed again. A failed request leaves the facet
//! unset, so a later access goes back to the network.

use std::sync::Arc;

use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{
    AnalysisSession, KeyEstimate, Marker, Metadata, ModeEstimate, Section, Segment, TempoEstimate,
    TimeSignatureEstimate, TrackAnalysis,
};
use crate::services::envelope::parse_analysis;
use crate::services::facets::{
    Bars, Beats, Duration, EndOfFadeIn, Facet, Key, Loudness, Mode, Sections, Segments,
    StartOfFadeOut, Tatums, Tempo, TimeSignature, TrackMetadata,
};
use crate::services::transport::{endpoint_url, AnalysisTransport};

/// A facet request that did not produce a value
#[derive(Debug)]
pub struct FacetFailure {
    pub facet: &'static str,
    pub error: AnalysisError,
}

/// Memoizing facet fetcher for one session
pub struct TrackAccessor {
    session: AnalysisSession,
    transport: Arc<dyn AnalysisTransport>,
    analysis: TrackAnalysis,
}

impl TrackAccessor {
    pub fn new(session: AnalysisSession, transport: Arc<dyn AnalysisTransport>) -> Self {
        let analysis = TrackAnalysis::new(session.md5().as_str(), session.analysis_version());
        Self {
            session,
            transport,
            analysis,
        }
    }

    pub fn session(&self) -> &AnalysisSession {
        &self.session
    }

    pub fn analysis(&self) -> &TrackAnalysis {
        &self.analysis
    }

    pub fn into_parts(self) -> (AnalysisSession, TrackAnalysis) {
        (self.session, self.analysis)
    }

    /// Return the facet, requesting it from the service on first access
    pub async fn fetch<'a, F: Facet>(&'a mut self) -> AnalysisResult<&'a F::Value>
    where
        F::Value: 'a,
    {
        if F::peek(&self.analysis).is_some() {
            tracing::info!(
                md5 = %self.session.md5(),
                facet = F::NAME,
                "Facet already loaded"
            );
        } else {
            let value = self.request::<F>().await?;
            tracing::info!(
                md5 = %self.session.md5(),
                facet = F::NAME,
                summary = %F::summary(&value),
                "Facet loaded"
            );
            *F::slot(&mut self.analysis) = Some(value);
        }

        F::peek(&self.analysis)
            .ok_or_else(|| AnalysisError::Internal(format!("{} missing after load", F::NAME)))
    }

    async fn request<F: Facet>(&self) -> AnalysisResult<F::Value> {
        let url = endpoint_url(self.session.base_url(), F::ENDPOINT);
        let body = self
            .transport
            .get(&url, &self.session.track_query())
            .await
            .map_err(|e| {
                tracing::warn!(facet = F::NAME, error = %e, "Facet request failed");
                e
            })?;

        parse_analysis(F::ENDPOINT, &body, F::parse).map_err(|e| {
            match e.status() {
                Some(status) => tracing::warn!(
                    facet = F::NAME,
                    code = status.code(),
                    status = %status,
                    "Facet request returned error status"
                ),
                None => tracing::warn!(facet = F::NAME, error = %e, "Facet response unusable"),
            }
            e
        })
    }

    pub async fn bars(&mut self) -> AnalysisResult<&Vec<Marker>> {
        self.fetch::<Bars>().await
    }

    pub async fn beats(&mut self) -> AnalysisResult<&Vec<Marker>> {
        self.fetch::<Beats>().await
    }

    pub async fn tatums(&mut self) -> AnalysisResult<&Vec<Marker>> {
        self.fetch::<Tatums>().await
    }

    pub async fn sections(&mut self) -> AnalysisResult<&Vec<Section>> {
        self.fetch::<Sections>().await
    }

    pub async fn segments(&mut self) -> AnalysisResult<&Vec<Segment>> {
        self.fetch::<Segments>().await
    }

    pub async fn duration(&mut self) -> AnalysisResult<f64> {
        self.fetch::<Duration>().await.copied()
    }

    pub async fn end_of_fade_in(&mut self) -> AnalysisResult<f64> {
        self.fetch::<EndOfFadeIn>().await.copied()
    }

    pub async fn start_of_fade_out(&mut self) -> AnalysisResult<f64> {
        self.fetch::<StartOfFadeOut>().await.copied()
    }

    pub async fn loudness(&mut self) -> AnalysisResult<f64> {
        self.fetch::<Loudness>().await.copied()
    }

    pub async fn key(&mut self) -> AnalysisResult<KeyEstimate> {
        self.fetch::<Key>().await.copied()
    }

    pub async fn mode(&mut self) -> AnalysisResult<ModeEstimate> {
        self.fetch::<Mode>().await.copied()
    }

    pub async fn tempo(&mut self) -> AnalysisResult<TempoEstimate> {
        self.fetch::<Tempo>().await.copied()
    }

    pub async fn time_signature(&mut self) -> AnalysisResult<TimeSignatureEstimate> {
        self.fetch::<TimeSignature>().await.copied()
    }

    pub async fn metadata(&mut self) -> AnalysisResult<&Metadata> {
        self.fetch::<TrackMetadata>().await
    }

    /// Fetch every facet except bars, continuing past failures
    ///
    /// Returns the failures; each has already been logged.
    pub async fn fetch_remaining(&mut self) -> Vec<FacetFailure> {
        let mut failures = Vec::new();
        self.fetch_soft::<Beats>(&mut failures).await;
        self.fetch_soft::<Duration>(&mut failures).await;
        self.fetch_soft::<EndOfFadeIn>(&mut failures).await;
        self.fetch_soft::<Key>(&mut failures).await;
        self.fetch_soft::<Loudness>(&mut failures).await;
        self.fetch_soft::<TrackMetadata>(&mut failures).await;
        self.fetch_soft::<Mode>(&mut failures).await;
        self.fetch_soft::<Sections>(&mut failures).await;
        self.fetch_soft::<Segments>(&mut failures).await;
        self.fetch_soft::<StartOfFadeOut>(&mut failures).await;
        self.fetch_soft::<Tatums>(&mut failures).await;
        self.fetch_soft::<Tempo>(&mut failures).await;
        self.fetch_soft::<TimeSignature>(&mut failures).await;
        failures
    }

    async fn fetch_soft<F: Facet>(&mut self, failures: &mut Vec<FacetFailure>) {
        if let Err(error) = self.fetch::<F>().await {
            failures.push(FacetFailure {
                facet: F::NAME,
                error,
            });
        }
    }
}
