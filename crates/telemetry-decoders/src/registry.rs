//! Decoder registry
//!
//! Built once at startup through [`RegistryBuilder`], then frozen. The frozen
//! [`DecoderRegistry`] is shared by `Arc` across ingestion streams; lookups
//! take no locks.

use crate::traits::{Paired, PayloadDecoder, TelemetryDecoder, UnitAdapter};
use crate::DecodeError;
use golden_features::{Feature, PhysicalFields};
use link_layer::{Identity, IdentityError};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("identity {0} is already registered")]
    DuplicateIdentity(Identity),
    #[error("invalid identity: {0}")]
    Identity(#[from] IdentityError),
}

/// Descriptive metadata for a registered satellite
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SatelliteInfo {
    pub name: String,
    pub norad_id: u32,
}

impl SatelliteInfo {
    pub fn new(name: impl Into<String>, norad_id: u32) -> Self {
        Self {
            name: name.into(),
            norad_id,
        }
    }
}

/// Everything needed to turn one satellite's payload into physical fields
pub struct DecoderEntry {
    identity: Identity,
    info: SatelliteInfo,
    decoder: Box<dyn TelemetryDecoder>,
}

impl DecoderEntry {
    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn info(&self) -> &SatelliteInfo {
        &self.info
    }

    /// Canonical features this satellite can populate
    pub fn features(&self) -> &'static [Feature] {
        self.decoder.features()
    }

    pub fn decode(&self, payload: &[u8]) -> Result<PhysicalFields, DecodeError> {
        self.decoder.decode(payload)
    }
}

impl std::fmt::Debug for DecoderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderEntry")
            .field("identity", &self.identity)
            .field("info", &self.info)
            .field("features", &self.features())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: HashMap<Identity, DecoderEntry>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder/adapter pair for `identity`. A second registration
    /// for the same identity fails and leaves the first in place.
    pub fn register<D, A>(
        &mut self,
        identity: Identity,
        info: SatelliteInfo,
        decoder: D,
        adapter: A,
    ) -> Result<&mut Self, RegistryError>
    where
        D: PayloadDecoder + 'static,
        A: UnitAdapter<Raw = D::Raw> + 'static,
    {
        if self.entries.contains_key(&identity) {
            warn!(%identity, "duplicate decoder registration rejected");
            return Err(RegistryError::DuplicateIdentity(identity));
        }

        self.entries.insert(
            identity,
            DecoderEntry {
                identity,
                info,
                decoder: Box::new(Paired::new(decoder, adapter)),
            },
        );
        Ok(self)
    }

    pub fn build(self) -> DecoderRegistry {
        info!(satellites = self.entries.len(), "decoder registry frozen");
        DecoderRegistry {
            entries: self.entries,
        }
    }
}

/// Immutable identity → decoder mapping
#[derive(Debug)]
pub struct DecoderRegistry {
    entries: HashMap<Identity, DecoderEntry>,
}

impl DecoderRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// `None` means the identity is unsupported; callers drop the frame
    pub fn resolve(&self, identity: &Identity) -> Option<&DecoderEntry> {
        self.entries.get(identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn identities(&self) -> impl Iterator<Item = Identity> + '_ {
        self.entries.keys().copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = &DecoderEntry> {
        self.entries.values()
    }
}
