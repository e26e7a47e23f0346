//! Live frame pipeline
//!
//! ```text
//! RawFrame → validate → resolve(source) → decode → normalize → score → analyze
//! ```
//!
//! Every stage either passes the frame on or drops it with a [`DropReason`].
//! Drops are counted and logged at debug; they never stop the stream.

use anomaly_scorer::{AnomalyReport, ContributionAnalyzer, ModelBank, ScoreError};
use golden_features::{CanonicalRecord, NormalizeError, Normalizer};
use link_layer::{FrameError, RawFrame};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use telemetry_decoders::{DecodeError, DecoderRegistry};
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    FrameTooShort,
    ChecksumMismatch,
    MalformedHeader,
    Unsupported,
    MalformedPayload,
    MissingRequiredField,
    Normalization,
    IncompleteRecord,
    ModelMismatch,
}

impl DropReason {
    pub const COUNT: usize = 9;

    pub const ALL: [DropReason; Self::COUNT] = [
        DropReason::FrameTooShort,
        DropReason::ChecksumMismatch,
        DropReason::MalformedHeader,
        DropReason::Unsupported,
        DropReason::MalformedPayload,
        DropReason::MissingRequiredField,
        DropReason::Normalization,
        DropReason::IncompleteRecord,
        DropReason::ModelMismatch,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

impl From<&FrameError> for DropReason {
    fn from(e: &FrameError) -> Self {
        match e {
            FrameError::FrameTooShort { .. } => DropReason::FrameTooShort,
            FrameError::ChecksumMismatch { .. } => DropReason::ChecksumMismatch,
            FrameError::MalformedHeader(_) => DropReason::MalformedHeader,
        }
    }
}

impl From<&DecodeError> for DropReason {
    fn from(e: &DecodeError) -> Self {
        match e {
            DecodeError::MalformedPayload(_) => DropReason::MalformedPayload,
            DecodeError::MissingRequiredField(_) => DropReason::MissingRequiredField,
        }
    }
}

/// Counters shared by every stream worker
#[derive(Debug, Default)]
pub struct DropCounters {
    processed: AtomicU64,
    scored: AtomicU64,
    dropped: [AtomicU64; DropReason::COUNT],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub processed: u64,
    pub scored: u64,
    pub dropped: BTreeMap<DropReason, u64>,
}

impl CounterSnapshot {
    pub fn total_dropped(&self) -> u64 {
        self.dropped.values().sum()
    }
}

impl DropCounters {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_drop(&self, reason: DropReason) {
        self.dropped[reason.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, reason: DropReason) -> u64 {
        self.dropped[reason.index()].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            scored: self.scored.load(Ordering::Relaxed),
            dropped: DropReason::ALL
                .into_iter()
                .map(|r| (r, self.get(r)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// `report` is `None` when no model is loaded for the sender
    Processed {
        record: CanonicalRecord,
        report: Option<AnomalyReport>,
    },
    Dropped(DropReason),
}

impl Outcome {
    pub fn record(&self) -> Option<&CanonicalRecord> {
        match self {
            Outcome::Processed { record, .. } => Some(record),
            Outcome::Dropped(_) => None,
        }
    }

    pub fn report(&self) -> Option<&AnomalyReport> {
        match self {
            Outcome::Processed { report, .. } => report.as_ref(),
            Outcome::Dropped(_) => None,
        }
    }

    pub fn into_report(self) -> Option<AnomalyReport> {
        match self {
            Outcome::Processed { report, .. } => report,
            Outcome::Dropped(_) => None,
        }
    }
}

/// Read-only after construction; share it across workers behind an `Arc`
pub struct Pipeline {
    registry: Arc<DecoderRegistry>,
    normalizer: Arc<Normalizer>,
    bank: Arc<ModelBank>,
    analyzer: ContributionAnalyzer,
    counters: Arc<DropCounters>,
}

impl Pipeline {
    pub fn new(
        registry: Arc<DecoderRegistry>,
        normalizer: Arc<Normalizer>,
        bank: Arc<ModelBank>,
        analyzer: ContributionAnalyzer,
    ) -> Self {
        Self {
            registry,
            normalizer,
            bank,
            analyzer,
            counters: Arc::new(DropCounters::new()),
        }
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    pub fn bank(&self) -> &ModelBank {
        &self.bank
    }

    pub fn counters(&self) -> Arc<DropCounters> {
        Arc::clone(&self.counters)
    }

    fn drop_frame(&self, reason: DropReason, detail: &dyn std::fmt::Display) -> Outcome {
        self.counters.record_drop(reason);
        debug!(?reason, %detail, "frame dropped");
        Outcome::Dropped(reason)
    }

    pub fn process(&self, frame: &RawFrame) -> Outcome {
        self.counters.processed.fetch_add(1, Ordering::Relaxed);

        let validated = match frame.validate() {
            Ok(v) => v,
            Err(e) => return self.drop_frame(DropReason::from(&e), &e),
        };
        let identity = validated.header.source;

        let Some(entry) = self.registry.resolve(&identity) else {
            return self.drop_frame(DropReason::Unsupported, &identity);
        };

        let fields = match entry.decode(validated.payload) {
            Ok(fields) => fields,
            Err(e) => return self.drop_frame(DropReason::from(&e), &e),
        };

        let record = match self.normalizer.normalize(
            identity,
            entry.info().norad_id,
            frame.received_at(),
            &fields,
        ) {
            Ok(record) => record,
            Err(e) => {
                if matches!(e, NormalizeError::UnitMismatch { .. }) {
                    error!(%identity, error = %e, "adapter emitted a quantity in the wrong unit");
                }
                return self.drop_frame(DropReason::Normalization, &e);
            }
        };

        let Some(artifact) = self.bank.get(&identity) else {
            return Outcome::Processed {
                record,
                report: None,
            };
        };

        let score = match artifact.score(&record) {
            Ok(score) => score,
            Err(e @ ScoreError::IncompleteRecord { .. }) => {
                return self.drop_frame(DropReason::IncompleteRecord, &e)
            }
            Err(e) => {
                warn!(%identity, error = %e, "model rejected record");
                return self.drop_frame(DropReason::ModelMismatch, &e);
            }
        };
        self.counters.scored.fetch_add(1, Ordering::Relaxed);

        let report = self.analyzer.analyze(artifact, &record, &score);
        if !report.nominal {
            let contributors: Vec<&str> = report.contributors.iter().map(|c| c.feature.name()).collect();
            warn!(
                %identity,
                timestamp = %report.timestamp,
                score = report.score,
                threshold = report.threshold,
                ?contributors,
                "anomaly"
            );
        }

        Outcome::Processed {
            record,
            report: Some(report),
        }
    }
}
