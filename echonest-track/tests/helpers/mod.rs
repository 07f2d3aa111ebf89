//! Test Helper Utilities
//!
//! Shared utilities for testing echonest-track

#![allow(dead_code)]

pub mod fixtures;
pub mod log_capture;
pub mod scripted_transport;

pub use fixtures::{
    analyzed_service, audio_file, envelope, status_body, test_config, RecordingHandler,
    TEST_API_KEY,
};
pub use log_capture::LogCapture;
pub use scripted_transport::{RecordedCall, ScriptedTransport};
