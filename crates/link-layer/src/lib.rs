//! Link-Layer Frame Validator
//!
//! Validates AX.25 UI frames as delivered by the demodulator and extracts the
//! sender identity. The FCS is checked before any header byte is interpreted,
//! so a corrupted frame can never be attributed to a satellite.
//!
//! ```text
//! | Dest (7) | Source (7) | Digipeaters (0-56) | Control (1) | PID (1) | Info (N) | FCS (2) |
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod fcs;
pub mod identity;

pub use identity::{Identity, IdentityError};

/// Two addresses + control + PID + FCS
pub const MIN_FRAME_LEN: usize = 7 + 7 + 1 + 1 + 2;

/// Destination + source + up to 8 digipeaters
pub const MAX_ADDRESSES: usize = 10;

/// Control byte of an unnumbered-information frame
pub const CONTROL_UI: u8 = 0x03;

/// PID for "no layer 3"
pub const PID_NO_LAYER3: u8 = 0xF0;

const ADDRESS_LEN: usize = 7;
const FCS_LEN: usize = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short: {len} bytes, need at least {min}")]
    FrameTooShort { len: usize, min: usize },
    #[error("checksum mismatch: computed {computed:#06x}, transmitted {transmitted:#06x}")]
    ChecksumMismatch { computed: u16, transmitted: u16 },
    #[error("malformed header: {0}")]
    MalformedHeader(String),
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Frame bytes as captured plus reception metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFrame {
    bytes: Vec<u8>,
    received_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rssi_dbm: Option<f64>,
}

impl RawFrame {
    pub fn new(bytes: Vec<u8>, received_at: DateTime<Utc>) -> Self {
        Self {
            bytes,
            received_at,
            rssi_dbm: None,
        }
    }

    pub fn with_rssi(mut self, rssi_dbm: f64) -> Self {
        self.rssi_dbm = Some(rssi_dbm);
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn rssi_dbm(&self) -> Option<f64> {
        self.rssi_dbm
    }

    /// Validate this frame. See [`validate`].
    pub fn validate(&self) -> Result<ValidatedFrame<'_>> {
        validate(&self.bytes)
    }
}

/// Parsed AX.25 header; only ever built from a frame whose FCS matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkHeader {
    pub destination: Identity,
    pub source: Identity,
    pub digipeaters: Vec<Identity>,
    pub control: u8,
    pub pid: u8,
}

impl LinkHeader {
    pub fn is_ui(&self) -> bool {
        self.control & 0xEF == CONTROL_UI
    }
}

/// A frame that passed validation, borrowing its payload from the raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedFrame<'a> {
    pub header: LinkHeader,
    pub payload: &'a [u8],
}

/// Validate raw frame bytes and split them into header and payload.
pub fn validate(bytes: &[u8]) -> Result<ValidatedFrame<'_>> {
    if bytes.len() < MIN_FRAME_LEN {
        return Err(FrameError::FrameTooShort {
            len: bytes.len(),
            min: MIN_FRAME_LEN,
        });
    }

    let (body, trailer) = bytes.split_at(bytes.len() - FCS_LEN);
    let transmitted = u16::from_le_bytes([trailer[0], trailer[1]]);
    let computed = fcs::crc16_x25(body);
    if computed != transmitted {
        return Err(FrameError::ChecksumMismatch {
            computed,
            transmitted,
        });
    }

    let mut addresses: Vec<Identity> = Vec::with_capacity(2);
    let mut offset = 0;
    loop {
        if addresses.len() == MAX_ADDRESSES {
            return Err(FrameError::MalformedHeader(format!(
                "address field exceeds {} entries",
                MAX_ADDRESSES
            )));
        }
        let chunk: &[u8; ADDRESS_LEN] = body
            .get(offset..offset + ADDRESS_LEN)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| FrameError::MalformedHeader("truncated address field".to_string()))?;

        let identity = Identity::from_address_bytes(chunk).map_err(|e| {
            FrameError::MalformedHeader(format!("address {}: {}", addresses.len(), e))
        })?;
        addresses.push(identity);
        offset += ADDRESS_LEN;

        if chunk[ADDRESS_LEN - 1] & 0x01 == 1 {
            break;
        }
    }

    if addresses.len() < 2 {
        return Err(FrameError::MalformedHeader(
            "address field ends before source address".to_string(),
        ));
    }

    let (control, pid) = match body.get(offset..offset + 2) {
        Some(&[control, pid]) => (control, pid),
        _ => {
            return Err(FrameError::MalformedHeader(
                "missing control/PID bytes".to_string(),
            ))
        }
    };

    let digipeaters = addresses.split_off(2);
    let header = LinkHeader {
        destination: addresses[0],
        source: addresses[1],
        digipeaters,
        control,
        pid,
    };

    Ok(ValidatedFrame {
        header,
        payload: &body[offset + 2..],
    })
}

/// Build a UI frame with a valid FCS. Used by simulators and tests.
pub fn encode_frame(destination: &Identity, source: &Identity, payload: &[u8]) -> Vec<u8> {
    encode_frame_via(destination, source, &[], payload)
}

/// Build a UI frame routed through `digipeaters`.
pub fn encode_frame_via(
    destination: &Identity,
    source: &Identity,
    digipeaters: &[Identity],
    payload: &[u8],
) -> Vec<u8> {
    let mut frame =
        Vec::with_capacity(ADDRESS_LEN * (2 + digipeaters.len()) + 2 + payload.len() + FCS_LEN);
    frame.extend_from_slice(&destination.to_address_bytes(false));
    frame.extend_from_slice(&source.to_address_bytes(digipeaters.is_empty()));
    for (i, digi) in digipeaters.iter().enumerate() {
        frame.extend_from_slice(&digi.to_address_bytes(i + 1 == digipeaters.len()));
    }
    frame.push(CONTROL_UI);
    frame.push(PID_NO_LAYER3);
    frame.extend_from_slice(payload);
    fcs::append_fcs(&mut frame);
    frame
}
