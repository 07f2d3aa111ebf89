//! echonest-track - command-line front end
//!
//! Retrieves the Echo Nest analysis for one audio file and prints a summary.
//! Results come from the local cache when the file was analyzed before.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use echonest_common::config::{default_config_path, load_toml_config};
use echonest_track::models::key_name;
use echonest_track::{
    AnalysisHandler, AnalysisOrchestrator, ClientConfig, ConfigOverrides, RetrievalFailure,
    RetrievalOutcome, TrackAnalysis,
};

/// Command-line arguments for echonest-track
#[derive(Parser, Debug)]
#[command(name = "echonest-track")]
#[command(about = "Fetch Echo Nest track analysis for an audio file")]
#[command(version)]
struct Args {
    /// Audio file to analyze
    file: PathBuf,

    /// Echo Nest API key (default: $ECHONEST_API_KEY, then config file)
    #[arg(long)]
    api_key: Option<String>,

    /// Folder holding cached analyses (default: $ECHONEST_CACHE_DIR, then config file)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Analysis version requested from the service
    #[arg(long)]
    analysis_version: Option<u32>,

    /// Service base URL
    #[arg(long)]
    base_url: Option<String>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Prints results to stdout
struct PrintingHandler;

impl AnalysisHandler for PrintingHandler {
    fn on_track_loaded(&self, analysis: TrackAnalysis) {
        println!("md5:            {}", analysis.md5);
        if let Some(metadata) = &analysis.metadata {
            println!("artist:         {}", metadata.artist);
            println!("title:          {}", metadata.title);
            println!("release:        {}", metadata.release);
        }
        if let Some(duration) = analysis.duration {
            println!("duration:       {:.2}s", duration);
        }
        if let Some(tempo) = analysis.tempo {
            println!("tempo:          {:.1} bpm ({:.2})", tempo.value, tempo.confidence);
        }
        if let Some(key) = analysis.key {
            let name = key_name(key.value).unwrap_or("?");
            let mode = match analysis.mode.map(|m| m.value) {
                Some(1) => " major",
                Some(0) => " minor",
                _ => "",
            };
            println!("key:            {}{} ({:.2})", name, mode, key.confidence);
        }
        if let Some(time_signature) = analysis.time_signature {
            println!("time signature: {}", time_signature.value);
        }
        if let Some(loudness) = analysis.loudness {
            println!("loudness:       {:.2} dB", loudness);
        }
        let count = |markers: Option<usize>| markers.map_or("-".to_string(), |n| n.to_string());
        println!("bars:           {}", count(analysis.bars.as_ref().map(Vec::len)));
        println!("beats:          {}", count(analysis.beats.as_ref().map(Vec::len)));
        println!("tatums:         {}", count(analysis.tatums.as_ref().map(Vec::len)));
        println!("sections:       {}", count(analysis.sections.as_ref().map(Vec::len)));
        println!("segments:       {}", count(analysis.segments.as_ref().map(Vec::len)));
    }

    fn on_track_failed(&self, failure: RetrievalFailure) {
        eprintln!(
            "Analysis of {} failed: {}",
            failure.session.file_path().display(),
            failure.error
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path().context("Cannot locate configuration folder")?,
    };
    let toml_config = load_toml_config(&config_path)?;

    let file_layer = match &toml_config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Cannot open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    info!(version = echonest_track::VERSION, "Starting echonest-track");

    let overrides = ConfigOverrides {
        api_key: args.api_key,
        base_url: args.base_url,
        analysis_version: args.analysis_version,
        cache_dir: args.cache_dir,
    };
    let config = ClientConfig::resolve(&overrides, &toml_config)?;

    let orchestrator = AnalysisOrchestrator::new(&config, Arc::new(PrintingHandler))?;
    let handle = orchestrator.start(&args.file)?;
    let outcome = handle.wait().await?;
    orchestrator.shutdown().await;

    match outcome {
        RetrievalOutcome::Loaded {
            source,
            missing_facets,
            ..
        } => {
            info!(source = ?source, missing = ?missing_facets, "Retrieval complete");
            Ok(())
        }
        RetrievalOutcome::Failed { stage, reason, .. } => {
            anyhow::bail!("Retrieval failed during {:?}: {}", stage, reason)
        }
    }
}
