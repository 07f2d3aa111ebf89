//! # Echo Nest Common Library
//!
//! Shared code for the Echo Nest client crates:
//! - Error type shared across crates
//! - Service status code taxonomy
//! - TOML configuration loading and directory resolution

pub mod config;
pub mod error;
pub mod status;

pub use error::{Error, Result};
pub use status::StatusCode;
