//! Upload gate
//!
//! Decides whether the service already holds an analysis for a file's content
//! hash, and uploads the file (blocking until analysis completes) when it does
//! not. A failed upload is never retried.

use echonest_common::StatusCode;
use std::sync::Arc;

use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{AnalysisSession, API_VERSION};
use crate::services::envelope::read_status;
use crate::services::transport::{endpoint_url, AnalysisTransport, UploadRequest};

/// Endpoint used for both key validation and the existence check
const CHECK_ENDPOINT: &str = "get_duration";
const UPLOAD_ENDPOINT: &str = "upload";

/// API key validation outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyValidation {
    Valid,
    Invalid,
}

/// Result of asking the service about a content hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistenceCheck {
    /// Analysis already exists
    Known,
    /// Service does not know this md5, upload required
    Unknown,
    InvalidKey,
    NotAllowed,
    LimitExceeded,
}

/// How the gate got the file analyzed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    AlreadyAnalyzed,
    Uploaded,
}

/// Fingerprint check and upload-and-wait
pub struct UploadGate {
    transport: Arc<dyn AnalysisTransport>,
}

impl UploadGate {
    pub fn new(transport: Arc<dyn AnalysisTransport>) -> Self {
        Self { transport }
    }

    /// Check the API key with a request that carries no md5
    ///
    /// Only status 1 marks the key invalid; a valid key answers such a request
    /// with a missing-parameter status.
    pub async fn validate_key(&self, session: &AnalysisSession) -> AnalysisResult<KeyValidation> {
        tracing::debug!(
            key_len = session.api_key().len(),
            "Validating API key"
        );

        let query = [
            ("api_key", session.api_key().to_string()),
            ("version", API_VERSION.to_string()),
            ("analysis_version", session.analysis_version().to_string()),
        ];
        let url = endpoint_url(session.base_url(), CHECK_ENDPOINT);
        let body = self.transport.get(&url, &query).await?;

        if read_status(&body)? == StatusCode::InvalidKey {
            tracing::warn!("Echo Nest API key is invalid");
            Ok(KeyValidation::Invalid)
        } else {
            tracing::info!("Echo Nest API key is valid");
            Ok(KeyValidation::Valid)
        }
    }

    /// Ask whether the service already analyzed this content hash
    pub async fn check_exists(&self, session: &AnalysisSession) -> AnalysisResult<ExistenceCheck> {
        let url = endpoint_url(session.base_url(), CHECK_ENDPOINT);
        let body = self.transport.get(&url, &session.track_query()).await?;
        let status = read_status(&body)?;

        let check = match status {
            StatusCode::Success => ExistenceCheck::Known,
            StatusCode::InvalidParameter => ExistenceCheck::Unknown,
            StatusCode::InvalidKey => ExistenceCheck::InvalidKey,
            StatusCode::NotAllowed => ExistenceCheck::NotAllowed,
            StatusCode::LimitExceeded => ExistenceCheck::LimitExceeded,
            other => return Err(AnalysisError::protocol(CHECK_ENDPOINT, other)),
        };

        tracing::debug!(md5 = %session.md5(), check = ?check, "Existence check");
        Ok(check)
    }

    /// Upload the file and wait for the analysis to finish
    pub async fn upload(&self, session: &AnalysisSession) -> AnalysisResult<()> {
        tracing::info!(
            md5 = %session.md5(),
            file = %session.file_path().display(),
            "Uploading file for analysis"
        );

        let request = UploadRequest {
            fields: vec![
                ("api_key", session.api_key().to_string()),
                ("version", API_VERSION.to_string()),
                ("analysis_version", session.analysis_version().to_string()),
                ("wait", "Y".to_string()),
            ],
            file_field: "file",
            file_path: session.file_path().to_path_buf(),
        };
        let url = endpoint_url(session.base_url(), UPLOAD_ENDPOINT);
        let body = self.transport.upload(&url, request).await?;

        match read_status(&body)? {
            StatusCode::Success => {
                tracing::info!(md5 = %session.md5(), "Upload complete");
                Ok(())
            }
            status => {
                tracing::error!(md5 = %session.md5(), status = %status, "Upload rejected");
                Err(AnalysisError::protocol(UPLOAD_ENDPOINT, status))
            }
        }
    }

    /// Make sure the service holds an analysis for the session's file
    pub async fn ensure_analyzed(&self, session: &AnalysisSession) -> AnalysisResult<GateOutcome> {
        match self.check_exists(session).await? {
            ExistenceCheck::Known => {
                tracing::info!(md5 = %session.md5(), "File already analyzed");
                Ok(GateOutcome::AlreadyAnalyzed)
            }
            ExistenceCheck::Unknown => {
                tracing::info!(md5 = %session.md5(), "Unknown file, beginning upload");
                self.upload(session).await?;
                Ok(GateOutcome::Uploaded)
            }
            ExistenceCheck::InvalidKey => {
                Err(AnalysisError::protocol(CHECK_ENDPOINT, StatusCode::InvalidKey))
            }
            ExistenceCheck::NotAllowed => {
                Err(AnalysisError::protocol(CHECK_ENDPOINT, StatusCode::NotAllowed))
            }
            ExistenceCheck::LimitExceeded => {
                Err(AnalysisError::protocol(CHECK_ENDPOINT, StatusCode::LimitExceeded))
            }
        }
    }
}
