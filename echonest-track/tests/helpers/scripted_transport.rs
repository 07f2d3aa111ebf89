//! Scripted transport
//!
//! Stands in for the Echo Nest service: answers each endpoint with scripted
//! response bodies and records every request it receives.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use echonest_track::error::{AnalysisError, AnalysisResult};
use echonest_track::services::{AnalysisTransport, UploadRequest};

/// One request seen by the transport
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Last path segment of the URL, e.g. `get_bars`
    pub endpoint: String,
    pub params: Vec<(String, String)>,
    pub is_upload: bool,
}

impl RecordedCall {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Default)]
struct Script {
    /// Consumed in order before falling back to `standing`
    queued: HashMap<String, VecDeque<String>>,
    standing: HashMap<String, String>,
    calls: Vec<RecordedCall>,
    gates: HashMap<String, Arc<Semaphore>>,
}

/// Fake [`AnalysisTransport`] driven by per-endpoint scripts
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request to `endpoint` with `body`
    pub fn respond(&self, endpoint: &str, body: impl Into<String>) {
        self.script
            .lock()
            .unwrap()
            .standing
            .insert(endpoint.to_string(), body.into());
    }

    /// Answer the next request to `endpoint` with `body`
    pub fn respond_once(&self, endpoint: &str, body: impl Into<String>) {
        self.script
            .lock()
            .unwrap()
            .queued
            .entry(endpoint.to_string())
            .or_default()
            .push_back(body.into());
    }

    /// Hold requests to `endpoint` until the returned semaphore gets permits
    pub fn pause(&self, endpoint: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.script
            .lock()
            .unwrap()
            .gates
            .insert(endpoint.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn total_calls(&self) -> usize {
        self.script.lock().unwrap().calls.len()
    }

    pub fn call_count(&self, endpoint: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.endpoint == endpoint)
            .count()
    }

    /// Endpoints in request order
    pub fn endpoints(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.endpoint).collect()
    }

    async fn answer(&self, url: &str, params: Vec<(String, String)>, is_upload: bool) -> AnalysisResult<String> {
        let endpoint = url.rsplit('/').next().unwrap_or(url).to_string();

        let gate = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(RecordedCall {
                endpoint: endpoint.clone(),
                params,
                is_upload,
            });
            script.gates.get(&endpoint).cloned()
        };

        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        let mut script = self.script.lock().unwrap();
        if let Some(body) = script
            .queued
            .get_mut(&endpoint)
            .and_then(|queue| queue.pop_front())
        {
            return Ok(body);
        }
        script
            .standing
            .get(&endpoint)
            .cloned()
            .ok_or_else(|| AnalysisError::Transport(format!("connection refused: {}", endpoint)))
    }
}

#[async_trait]
impl AnalysisTransport for ScriptedTransport {
    async fn get(&self, url: &str, query: &[(&'static str, String)]) -> AnalysisResult<String> {
        let params = query
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();
        self.answer(url, params, false).await
    }

    async fn upload(&self, url: &str, request: UploadRequest) -> AnalysisResult<String> {
        let mut params: Vec<(String, String)> = request
            .fields
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();
        params.push((
            request.file_field.to_string(),
            request.file_path.display().to_string(),
        ));
        self.answer(url, params, true).await
    }
}
