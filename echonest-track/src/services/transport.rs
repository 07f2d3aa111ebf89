//! HTTP transport for the Echo Nest API
//!
//! Requests are issued one at a time from the retrieval worker. The trait is
//! the seam tests use to script service responses.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AnalysisError, AnalysisResult};

const USER_AGENT: &str = concat!("echonest-track/", env!("CARGO_PKG_VERSION"));

/// Multipart upload request
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Plain text form fields
    pub fields: Vec<(&'static str, String)>,
    /// Form field name carrying the file
    pub file_field: &'static str,
    /// File sent as the body of `file_field`
    pub file_path: PathBuf,
}

/// Raw request/response exchange with the service
///
/// Implementations return the full response body; status-code handling is
/// done by the caller on the parsed envelope.
#[async_trait]
pub trait AnalysisTransport: Send + Sync {
    /// GET `url` with the given query string, return the response body
    async fn get(&self, url: &str, query: &[(&'static str, String)]) -> AnalysisResult<String>;

    /// Multipart POST to `url`, return the response body
    async fn upload(&self, url: &str, request: UploadRequest) -> AnalysisResult<String>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client. `timeout` of `None` leaves requests unbounded, which the
    /// upload-and-wait call relies on for long files.
    pub fn new(timeout: Option<Duration>) -> AnalysisResult<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl AnalysisTransport for HttpTransport {
    async fn get(&self, url: &str, query: &[(&'static str, String)]) -> AnalysisResult<String> {
        tracing::debug!(url = %url, "GET request");

        let response = self.http_client.get(url).query(query).send().await?;
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(
            url = %url,
            http_status = status.as_u16(),
            body_len = body.len(),
            "GET response"
        );
        Ok(body)
    }

    async fn upload(&self, url: &str, request: UploadRequest) -> AnalysisResult<String> {
        let bytes = tokio::fs::read(&request.file_path).await?;
        let file_name = request
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        tracing::debug!(
            url = %url,
            file = %request.file_path.display(),
            size_bytes = bytes.len(),
            "Multipart upload"
        );

        let mut form = reqwest::multipart::Form::new();
        for (name, value) in request.fields {
            form = form.text(name, value);
        }
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        form = form.part(request.file_field, part);

        let response = self.http_client.post(url).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(
            url = %url,
            http_status = status.as_u16(),
            body_len = body.len(),
            "Upload response"
        );
        Ok(body)
    }
}

/// Join the service base URL and an endpoint name
pub fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), endpoint)
}
