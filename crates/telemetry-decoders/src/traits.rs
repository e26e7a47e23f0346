//! Decoder traits
//!
//! A satellite format is a [`PayloadDecoder`] producing a typed raw record and
//! a [`UnitAdapter`] turning that record into physical fields. The two are
//! paired by [`Paired`] and only then erased to `dyn TelemetryDecoder`.

use crate::DecodeError;
use golden_features::{Feature, PhysicalFields};

/// Bytes to a satellite's raw record. Must be pure.
pub trait PayloadDecoder: Send + Sync {
    type Raw;

    fn decode(&self, payload: &[u8]) -> Result<Self::Raw, DecodeError>;
}

/// Raw record to physical fields, applying the satellite's calibration
pub trait UnitAdapter: Send + Sync {
    type Raw;

    /// Every canonical feature this adapter can populate
    fn features(&self) -> &'static [Feature];

    fn adapt(&self, raw: &Self::Raw) -> Result<PhysicalFields, DecodeError>;
}

/// Type-erased decode + adapt
pub trait TelemetryDecoder: Send + Sync {
    fn features(&self) -> &'static [Feature];

    fn decode(&self, payload: &[u8]) -> Result<PhysicalFields, DecodeError>;
}

/// A decoder and the adapter for its raw record type
pub struct Paired<D, A> {
    decoder: D,
    adapter: A,
}

impl<D, A> Paired<D, A>
where
    D: PayloadDecoder,
    A: UnitAdapter<Raw = D::Raw>,
{
    pub fn new(decoder: D, adapter: A) -> Self {
        Self { decoder, adapter }
    }
}

impl<D, A> TelemetryDecoder for Paired<D, A>
where
    D: PayloadDecoder,
    A: UnitAdapter<Raw = D::Raw>,
{
    fn features(&self) -> &'static [Feature] {
        self.adapter.features()
    }

    fn decode(&self, payload: &[u8]) -> Result<PhysicalFields, DecodeError> {
        let raw = self.decoder.decode(payload)?;
        self.adapter.adapt(&raw)
    }
}
