//! Response bodies, configs and handlers shared by the integration tests

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use echonest_track::{AnalysisHandler, ClientConfig, RetrievalFailure, TrackAnalysis};

use super::scripted_transport::ScriptedTransport;

pub const TEST_API_KEY: &str = "TESTKEY0123456789";
pub const TEST_BASE_URL: &str = "http://echonest.test/api/";

/// Wrap an `analysis` payload in a success envelope
pub fn envelope(payload: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <response version=\"3\">\
         <status><version>3</version><code>0</code><message>Success</message></status>\
         <query><parameter name=\"api_key\">{}</parameter></query>\
         <analysis>{}</analysis></response>",
        TEST_API_KEY, payload
    )
}

/// Envelope carrying only a status code
pub fn status_body(code: i32) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <response version=\"3\">\
         <status><version>3</version><code>{}</code><message>status {}</message></status>\
         </response>",
        code, code
    )
}

fn segment(start: f64) -> String {
    let pitches: String = (0..12)
        .map(|i| format!("<pitch>{:.2}</pitch>", i as f64 / 12.0))
        .collect();
    let timbre: String = (0..12).map(|i| format!("<coeff>{}.25</coeff>", i)).collect();
    format!(
        "<segment start=\"{start}\" duration=\"0.5\">\
         <loudness><dB time=\"0\">-60.0</dB><dB time=\"0.1\" type=\"max\">-21.5</dB></loudness>\
         <pitches>{pitches}</pitches><timbre>{timbre}</timbre></segment>"
    )
}

/// Success payload for every facet endpoint, keyed by endpoint
pub fn facet_bodies(md5: &str) -> Vec<(&'static str, String)> {
    vec![
        (
            "get_bars",
            envelope(
                "<bar confidence=\"0.643\">1.0</bar>\
                 <bar confidence=\"0.71\">3.5</bar>",
            ),
        ),
        (
            "get_beats",
            envelope(
                "<beat confidence=\"0.9\">0.5</beat>\
                 <beat confidence=\"0.8\">1.0</beat>\
                 <beat confidence=\"0.85\">1.5</beat>",
            ),
        ),
        (
            "get_tatums",
            envelope("<tatum confidence=\"0.4\">0.25</tatum>"),
        ),
        (
            "get_sections",
            envelope(
                "<section start=\"0.0\" duration=\"12.5\"/>\
                 <section start=\"12.5\" duration=\"30.0\"/>",
            ),
        ),
        (
            "get_segments",
            envelope(&format!("{}{}", segment(0.0), segment(0.5))),
        ),
        ("get_duration", envelope("<duration>215.2</duration>")),
        (
            "get_end_of_fade_in",
            envelope("<end_of_fade_in>0.2</end_of_fade_in>"),
        ),
        (
            "get_start_of_fade_out",
            envelope("<start_of_fade_out>208.4</start_of_fade_out>"),
        ),
        ("get_loudness", envelope("<loudness>-9.3</loudness>")),
        ("get_key", envelope("<key confidence=\"0.6\">7</key>")),
        ("get_mode", envelope("<mode confidence=\"0.5\">1</mode>")),
        ("get_tempo", envelope("<tempo confidence=\"0.9\">122.0</tempo>")),
        (
            "get_time_signature",
            envelope("<time_signature confidence=\"1\">4</time_signature>"),
        ),
        (
            "get_metadata",
            envelope(&format!(
                "<status>complete</status><id>TRABC123</id><md5>{md5}</md5>\
                 <artist>Test Artist</artist><release>Test Release</release>\
                 <title>Test Title</title><genre>Test</genre>\
                 <duration>215.2</duration><samplerate>44100</samplerate>\
                 <bitrate>192</bitrate>"
            )),
        ),
    ]
}

/// Script a service that accepts the key and already knows the file
///
/// The first `get_duration` (key validation, no md5) answers with a
/// missing-parameter status the way the real service does.
pub fn analyzed_service(transport: &ScriptedTransport, md5: &str) {
    transport.respond_once("get_duration", status_body(4));
    for (endpoint, body) in facet_bodies(md5) {
        transport.respond(endpoint, body);
    }
}

pub fn test_config(cache_dir: &Path) -> ClientConfig {
    ClientConfig {
        base_url: TEST_BASE_URL.to_string(),
        api_key: TEST_API_KEY.to_string(),
        analysis_version: 3,
        cache_dir: cache_dir.to_path_buf(),
        request_timeout: None,
    }
}

/// Write an "audio" file with the given content
pub fn audio_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Handler that keeps everything it is given
#[derive(Default)]
pub struct RecordingHandler {
    loaded: Mutex<Vec<TrackAnalysis>>,
    failed: Mutex<Vec<RetrievalFailure>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loaded(&self) -> Vec<TrackAnalysis> {
        self.loaded.lock().unwrap().clone()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.lock().unwrap().len()
    }

    pub fn take_failures(&self) -> Vec<RetrievalFailure> {
        std::mem::take(&mut *self.failed.lock().unwrap())
    }

    pub fn invocations(&self) -> usize {
        self.loaded.lock().unwrap().len() + self.failed_count()
    }
}

impl AnalysisHandler for RecordingHandler {
    fn on_track_loaded(&self, analysis: TrackAnalysis) {
        self.loaded.lock().unwrap().push(analysis);
    }

    fn on_track_failed(&self, failure: RetrievalFailure) {
        self.failed.lock().unwrap().push(failure);
    }
}
