//! Artifact persistence and the serving model bank

use crate::artifact::ModelArtifact;
use golden_features::{schema_hash, SCHEMA_VERSION};
use link_layer::Identity;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

const ARTIFACT_SUFFIX: &str = ".model.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(
        "model for {identity} was trained against schema v{found_version} ({found_hash:08x}), running v{expected_version} ({expected_hash:08x})"
    )]
    SchemaMismatch {
        identity: Identity,
        expected_version: u8,
        expected_hash: u32,
        found_version: u8,
        found_hash: u32,
    },
    #[error("{path} holds a model for {found}")]
    IdentityMismatch { path: PathBuf, found: Identity },
    #[error("duplicate model for {0}")]
    Duplicate(Identity),
    #[error("model for {identity} is corrupt: {reason}")]
    CorruptArtifact { identity: Identity, reason: String },
}

/// One JSON file per identity: `<dir>/<IDENTITY>.model.json`
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, identity: &Identity) -> PathBuf {
        self.dir.join(format!("{}{}", identity, ARTIFACT_SUFFIX))
    }

    pub fn save(&self, artifact: &ModelArtifact) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&artifact.identity);
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, artifact)?;
        info!(identity = %artifact.identity, path = %path.display(), "model saved");
        Ok(path)
    }

    pub fn load(&self, identity: &Identity) -> Result<ModelArtifact, StoreError> {
        let path = self.path_for(identity);
        let artifact = read_artifact(&path)?;
        if artifact.identity != *identity {
            return Err(StoreError::IdentityMismatch {
                path,
                found: artifact.identity,
            });
        }
        artifact.validate()?;
        Ok(artifact)
    }

    /// Load every artifact in the directory into a model bank
    pub fn load_all(&self) -> Result<ModelBank, StoreError> {
        let mut bank = ModelBank::default();
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(ARTIFACT_SUFFIX))
            })
            .collect();
        paths.sort();

        for path in paths {
            debug!(path = %path.display(), "loading model");
            bank.insert(read_artifact(&path)?)?;
        }
        info!(models = bank.len(), dir = %self.dir.display(), "model bank loaded");
        Ok(bank)
    }
}

fn read_artifact(path: &Path) -> Result<ModelArtifact, StoreError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Read-only set of serving models, one per identity. Every artifact held
/// here is in the `Serving` state of a [`Detector`](crate::Detector).
#[derive(Debug, Default, Clone)]
pub struct ModelBank {
    models: HashMap<Identity, Arc<ModelArtifact>>,
}

impl ModelBank {
    /// Add an artifact. Refuses schema mismatches, internally inconsistent
    /// artifacts and second models for an identity.
    pub fn insert(&mut self, artifact: ModelArtifact) -> Result<(), StoreError> {
        if !artifact.matches_schema() {
            return Err(StoreError::SchemaMismatch {
                identity: artifact.identity,
                expected_version: SCHEMA_VERSION,
                expected_hash: schema_hash(),
                found_version: artifact.schema_version,
                found_hash: artifact.schema_hash,
            });
        }
        artifact.validate()?;
        if self.models.contains_key(&artifact.identity) {
            return Err(StoreError::Duplicate(artifact.identity));
        }
        self.models.insert(artifact.identity, Arc::new(artifact));
        Ok(())
    }

    pub fn get(&self, identity: &Identity) -> Option<&Arc<ModelArtifact>> {
        self.models.get(identity)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn identities(&self) -> impl Iterator<Item = Identity> + '_ {
        self.models.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainer::{train, TrainerConfig};
    use chrono::{Duration, TimeZone, Utc};
    use golden_features::{CanonicalRecord, Feature};

    fn artifact(callsign: &str) -> ModelArtifact {
        let identity: Identity = callsign.parse().unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let records: Vec<CanonicalRecord> = (0..32)
            .map(|i| {
                let x = i as f64;
                CanonicalRecord::new(identity, 1, t0 + Duration::minutes(i))
                    .with(Feature::BattVoltage, 7.0 + 0.01 * x)
                    .with(Feature::TempObc, 10.0 + (x * 0.7).sin())
            })
            .collect();
        train(
            identity,
            &[Feature::BattVoltage, Feature::TempObc],
            &records,
            &TrainerConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let original = artifact("DP0UWE");

        let path = store.save(&original).unwrap();
        assert!(path.ends_with("DP0UWE.model.json"));

        let loaded = store.load(&original.identity).unwrap();
        assert_eq!(loaded.features, original.features);
        assert_eq!(loaded.identity, original.identity);
        assert_eq!(loaded.baseline.error_scale.len(), 2);
    }

    #[test]
    fn test_load_all_builds_bank() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save(&artifact("DP0UWE")).unwrap();
        store.save(&artifact("LU7AQB")).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let bank = store.load_all().unwrap();
        assert_eq!(bank.len(), 2);
        assert!(bank.get(&"LU7AQB".parse().unwrap()).is_some());
    }

    #[test]
    fn test_schema_mismatch_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let mut stale = artifact("DP0UWE");
        stale.schema_hash ^= 0xDEAD_BEEF;
        store.save(&stale).unwrap();

        assert!(matches!(store.load_all(), Err(StoreError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_inconsistent_artifact_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let mut truncated = artifact("DP0UWE");
        truncated.scaler.scale.pop();
        store.save(&truncated).unwrap();

        assert!(matches!(store.load_all(), Err(StoreError::CorruptArtifact { .. })));
        assert!(matches!(
            store.load(&truncated.identity),
            Err(StoreError::CorruptArtifact { .. })
        ));
    }

    #[test]
    fn test_bank_rejects_corrupt_parts() {
        let corruptions: [fn(&mut ModelArtifact); 11] = [
            |a: &mut ModelArtifact| a.scaler.scale[0] = 0.0,
            |a: &mut ModelArtifact| a.scaler.mean[1] = f64::NAN,
            |a: &mut ModelArtifact| {
                a.baseline.error_scale.pop();
            },
            |a: &mut ModelArtifact| {
                a.model.weights.pop();
            },
            |a: &mut ModelArtifact| a.model.n = 3,
            |a: &mut ModelArtifact| a.model.weights[0] = 0.5,
            |a: &mut ModelArtifact| a.features.swap(0, 1),
            |a: &mut ModelArtifact| a.features[1] = a.features[0],
            |a: &mut ModelArtifact| a.features = Feature::ALL.repeat(2),
            |a: &mut ModelArtifact| a.features.clear(),
            |a: &mut ModelArtifact| a.baseline.threshold = f64::INFINITY,
        ];

        for (i, corrupt) in corruptions.iter().enumerate() {
            let mut bad = artifact("DP0UWE");
            corrupt(&mut bad);
            let mut bank = ModelBank::default();
            assert!(
                matches!(bank.insert(bad), Err(StoreError::CorruptArtifact { .. })),
                "corruption {} accepted",
                i
            );
            assert!(bank.is_empty());
        }
    }

    #[test]
    fn test_trained_artifact_is_consistent() {
        assert!(artifact("DP0UWE").validate().is_ok());
    }

    #[test]
    fn test_misnamed_file_detected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let path = store.save(&artifact("DP0UWE")).unwrap();
        let wrong: Identity = "LU7AQB".parse().unwrap();
        fs::rename(path, store.path_for(&wrong)).unwrap();

        assert!(matches!(store.load(&wrong), Err(StoreError::IdentityMismatch { .. })));
    }

    #[test]
    fn test_bank_rejects_second_model() {
        let mut bank = ModelBank::default();
        bank.insert(artifact("DP0UWE")).unwrap();
        assert!(matches!(bank.insert(artifact("DP0UWE")), Err(StoreError::Duplicate(_))));
    }
}
