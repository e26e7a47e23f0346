//! Telemetry Decoders
//!
//! Satellite-specific binary decoders and unit adapters behind an immutable
//! registry keyed by link-layer identity.
//!
//! | Satellite | NORAD | Callsign | Payload |
//! |-----------|-------|----------|---------|
//! | GO-32 (TechSat-1B) | 25397 | `4X1GO` | 18 bytes, big-endian |
//! | UWE-4 | 43880 | `DP0UWE` | 17 bytes, little-endian |
//! | BugSat-1 | 40014 | `LU7AQB` | 14 bytes, big-endian |

use thiserror::Error;

pub mod calibration;
pub mod formats;
pub mod registry;
pub mod traits;

pub use calibration::{Affine, CalibrationSet};
pub use registry::{DecoderEntry, DecoderRegistry, RegistryBuilder, RegistryError, SatelliteInfo};
pub use traits::{Paired, PayloadDecoder, TelemetryDecoder, UnitAdapter};

use formats::{bugsat1, go32, uwe4};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("missing required field {0}")]
    MissingRequiredField(&'static str),
}

impl DecodeError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        DecodeError::MalformedPayload(reason.into())
    }

    pub(crate) fn too_short(needed: usize, got: usize) -> Self {
        DecodeError::MalformedPayload(format!("need {} bytes, got {}", needed, got))
    }
}

/// Registry of every supported satellite
pub fn default_registry(calibration: &CalibrationSet) -> Result<DecoderRegistry, RegistryError> {
    let mut builder = RegistryBuilder::new();

    builder.register(
        go32::identity()?,
        SatelliteInfo::new("GO-32 (TechSat-1B)", go32::NORAD_ID),
        go32::Go32Decoder,
        go32::Go32Adapter::new(calibration.go32),
    )?;
    builder.register(
        uwe4::identity()?,
        SatelliteInfo::new("UWE-4", uwe4::NORAD_ID),
        uwe4::Uwe4Decoder,
        uwe4::Uwe4Adapter::new(calibration.uwe4),
    )?;
    builder.register(
        bugsat1::identity()?,
        SatelliteInfo::new("BugSat-1", bugsat1::NORAD_ID),
        bugsat1::BugSat1Decoder,
        bugsat1::BugSat1Adapter::new(calibration.bugsat1),
    )?;

    Ok(builder.build())
}
