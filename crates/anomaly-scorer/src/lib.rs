//! Anomaly Scorer
//!
//! One self-supervised reconstruction model per satellite identity, plus the
//! contribution analysis that explains each score.
//!
//! # Scoring
//!
//! ```text
//! z   = (x - μ) / σ                 scaled input over the model's features
//! ẑ   = W z                         masked linear reconstruction, diag(W) = 0
//! s   = mean((z - ẑ)²)              aggregate score
//! e_j = |x_j - (σ_j ẑ_j + μ_j)|     per-feature error, original units
//! ```
//!
//! A feature contributes when `e_j / ē_j` exceeds the configured multiple,
//! where `ē_j` is its mean absolute error over the training set.

use golden_features::Feature;
use link_layer::Identity;
use thiserror::Error;

pub mod artifact;
pub mod contribution;
pub mod detector;
pub mod model;
pub mod scaler;
pub mod store;
pub mod trainer;

pub use artifact::{ModelArtifact, Score, TrainingBaseline};
pub use contribution::{AnomalyReport, Contribution, ContributionAnalyzer, DEFAULT_CONTRIBUTION_MULTIPLE};
pub use detector::{Detector, DetectorState};
pub use store::{ArtifactStore, ModelBank, StoreError};
pub use trainer::{select_features, train, TrainerConfig};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrainError {
    #[error("no training records")]
    NoRecords,
    #[error("{found} complete training records, need at least {required}")]
    InsufficientRecords { found: usize, required: usize },
    #[error("training batch for {expected} contains a record from {found}")]
    ForeignRecord { expected: Identity, found: Identity },
    #[error("empty feature set")]
    EmptyFeatureSet,
    #[error("feature {0} has zero variance")]
    ZeroVarianceFeature(Feature),
    #[error("reconstruction system is singular")]
    SingularSystem,
    #[error("detector for {0} is already serving")]
    AlreadyServing(Identity),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoreError {
    #[error("record for {identity} is missing {feature}")]
    IncompleteRecord { identity: Identity, feature: Feature },
    #[error("record from {found} scored against the model for {expected}")]
    IdentityMismatch { expected: Identity, found: Identity },
    #[error("detector for {0} is not serving")]
    NotServing(Identity),
}
