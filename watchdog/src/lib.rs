//! Watchdog
//!
//! Ties the telemetry crates into a running service: archive ingestion, the
//! per-frame pipeline, concurrent stream workers and the status API.

pub mod archive;
pub mod config;
pub mod pipeline;
pub mod service;

pub use archive::{load_archive, read_archive, write_archive, Archive, ArchiveEntry, ArchiveError};
pub use config::{ConfigError, WatchdogConfig, STATUS_PORT_ENV};
pub use pipeline::{CounterSnapshot, DropCounters, DropReason, Outcome, Pipeline};
pub use service::{run_streams, serve_status, status_router, RunSummary, ServiceError, StatusState};

use anomaly_scorer::{ContributionAnalyzer, ModelBank};
use golden_features::Normalizer;
use std::sync::Arc;
use telemetry_decoders::{default_registry, RegistryError};

/// Pipeline over the built-in registry with the configured ranges,
/// calibration and contribution multiple
pub fn build_pipeline(config: &WatchdogConfig, bank: ModelBank) -> Result<Pipeline, RegistryError> {
    let registry = default_registry(&config.calibration)?;
    Ok(Pipeline::new(
        Arc::new(registry),
        Arc::new(Normalizer::new(config.ranges.clone())),
        Arc::new(bank),
        ContributionAnalyzer::new(config.contribution_multiple),
    ))
}
