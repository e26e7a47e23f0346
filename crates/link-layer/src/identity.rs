//! Station identity (callsign + SSID)
//!
//! The only key used to select decoders and models. Stored inline so that
//! lookups on the live path never allocate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum callsign length in an AX.25 address field
pub const MAX_CALLSIGN_LEN: usize = 6;

/// Highest SSID an address can carry
pub const MAX_SSID: u8 = 15;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("callsign must be 1-6 characters, got {0}")]
    Length(usize),
    #[error("invalid callsign character {0:?}")]
    InvalidCharacter(char),
    #[error("SSID {0} out of range 0-15")]
    SsidOutOfRange(u8),
    #[error("invalid SSID suffix {0:?}")]
    InvalidSsid(String),
}

/// AX.25 station identity
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity {
    call: [u8; MAX_CALLSIGN_LEN],
    len: u8,
    ssid: u8,
}

impl Identity {
    /// Build an identity from a callsign and SSID.
    ///
    /// Callsigns are upper-cased; only ASCII alphanumerics are accepted.
    pub fn new(callsign: &str, ssid: u8) -> Result<Self, IdentityError> {
        let callsign = callsign.trim();
        if callsign.is_empty() || callsign.len() > MAX_CALLSIGN_LEN {
            return Err(IdentityError::Length(callsign.len()));
        }
        if ssid > MAX_SSID {
            return Err(IdentityError::SsidOutOfRange(ssid));
        }

        let mut call = [b' '; MAX_CALLSIGN_LEN];
        for (slot, ch) in call.iter_mut().zip(callsign.chars()) {
            if !ch.is_ascii_alphanumeric() {
                return Err(IdentityError::InvalidCharacter(ch));
            }
            *slot = ch.to_ascii_uppercase() as u8;
        }

        Ok(Self {
            call,
            len: callsign.len() as u8,
            ssid,
        })
    }

    /// Decode the 7-byte AX.25 address encoding (ASCII shifted left one bit,
    /// space padded, SSID in bits 1-4 of the last byte).
    pub(crate) fn from_address_bytes(bytes: &[u8; 7]) -> Result<Self, IdentityError> {
        let mut call = [0u8; MAX_CALLSIGN_LEN];
        for (slot, &b) in call.iter_mut().zip(bytes[..MAX_CALLSIGN_LEN].iter()) {
            *slot = b >> 1;
        }

        let len = call.iter().rposition(|&c| c != b' ').map(|p| p + 1).unwrap_or(0);
        if len == 0 {
            return Err(IdentityError::Length(0));
        }
        if let Some(&bad) = call[..len].iter().find(|c| !(c.is_ascii_uppercase() || c.is_ascii_digit())) {
            return Err(IdentityError::InvalidCharacter(bad as char));
        }

        Ok(Self {
            call,
            len: len as u8,
            ssid: (bytes[6] >> 1) & 0x0F,
        })
    }

    /// Encode into the 7-byte AX.25 address form. `last` sets the address
    /// extension bit.
    pub(crate) fn to_address_bytes(&self, last: bool) -> [u8; 7] {
        let mut out = [0u8; 7];
        for (slot, &c) in out.iter_mut().zip(self.call.iter()) {
            *slot = c << 1;
        }
        // Reserved bits are set per AX.25 2.2
        out[6] = 0x60 | ((self.ssid & 0x0F) << 1) | u8::from(last);
        out
    }

    pub fn callsign(&self) -> &str {
        std::str::from_utf8(&self.call[..self.len as usize]).unwrap_or_default()
    }

    pub fn ssid(&self) -> u8 {
        self.ssid
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ssid > 0 {
            write!(f, "{}-{}", self.callsign(), self.ssid)
        } else {
            write!(f, "{}", self.callsign())
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self)
    }
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('-') {
            Some((call, ssid)) => {
                let ssid: u8 = ssid
                    .parse()
                    .map_err(|_| IdentityError::InvalidSsid(ssid.to_string()))?;
                Identity::new(call, ssid)
            }
            None => Identity::new(s, 0),
        }
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.to_string()
    }
}
