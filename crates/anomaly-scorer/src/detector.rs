//! Per-satellite detector lifecycle: `Untrained → Trained → Serving`

use crate::artifact::{ModelArtifact, Score};
use crate::trainer::{train, TrainerConfig};
use crate::{ScoreError, TrainError};
use golden_features::{CanonicalRecord, Feature};
use link_layer::Identity;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum DetectorState {
    Untrained,
    /// Fitted but not yet published for scoring; may be retrained
    Trained(ModelArtifact),
    /// Frozen and shared
    Serving(Arc<ModelArtifact>),
}

#[derive(Debug, Clone)]
pub struct Detector {
    identity: Identity,
    state: DetectorState,
}

impl Detector {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            state: DetectorState::Untrained,
        }
    }

    /// Start from a previously persisted artifact
    pub fn from_artifact(artifact: ModelArtifact) -> Self {
        Self {
            identity: artifact.identity,
            state: DetectorState::Trained(artifact),
        }
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    /// The fitted artifact, once trained
    pub fn artifact(&self) -> Option<&ModelArtifact> {
        match &self.state {
            DetectorState::Untrained => None,
            DetectorState::Trained(artifact) => Some(artifact),
            DetectorState::Serving(artifact) => Some(artifact),
        }
    }

    pub fn train(
        &mut self,
        features: &[Feature],
        records: &[CanonicalRecord],
        config: &TrainerConfig,
    ) -> Result<(), TrainError> {
        if matches!(self.state, DetectorState::Serving(_)) {
            return Err(TrainError::AlreadyServing(self.identity));
        }
        self.state = DetectorState::Trained(train(self.identity, features, records, config)?);
        Ok(())
    }

    /// Freeze the trained model. Returns the shared artifact, or `None` if
    /// nothing has been trained.
    pub fn serve(&mut self) -> Option<Arc<ModelArtifact>> {
        let state = std::mem::replace(&mut self.state, DetectorState::Untrained);
        self.state = match state {
            DetectorState::Trained(artifact) => DetectorState::Serving(Arc::new(artifact)),
            other => other,
        };
        match &self.state {
            DetectorState::Serving(artifact) => Some(Arc::clone(artifact)),
            _ => None,
        }
    }

    pub fn score(&self, record: &CanonicalRecord) -> Result<Score, ScoreError> {
        match &self.state {
            DetectorState::Serving(artifact) => artifact.score(record),
            _ => Err(ScoreError::NotServing(self.identity)),
        }
    }
}
