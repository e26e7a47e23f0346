//! Fault Injector
//!
//! Offline validation of detector sensitivity. Clean held-out records are
//! perturbed by a [`FaultSpec`] and the labeled result is run through a
//! trained model to measure recall and false-positive rate. Nothing here is
//! on the live path.

use chrono::{DateTime, Utc};
use golden_features::Feature;
use thiserror::Error;

pub mod benchmark;
pub mod injector;
pub mod spec;

pub use benchmark::{evaluate, BenchmarkReport, ThresholdResult};
pub use injector::{FaultInjector, LabeledRecord, DEFAULT_SEED};
pub use spec::{FaultKind, FaultSpec, FaultWindow, NoiseDistribution};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InjectError {
    #[error("feature {0:?} is not in the satellite's schema")]
    UnknownFeature(String),
    #[error("window {start}..{end} is inverted or outside batch range {batch_start}..{batch_end}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        batch_start: DateTime<Utc>,
        batch_end: DateTime<Utc>,
    },
    #[error("empty batch")]
    EmptyBatch,
    #[error("invalid magnitude {0}")]
    InvalidMagnitude(f64),
    #[error("no in-window reading of {0} to freeze")]
    MissingBaseline(Feature),
}
