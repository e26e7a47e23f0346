//! Per-satellite payload formats

use crate::DecodeError;
use golden_features::OperatingMode;

pub mod bugsat1;
pub mod go32;
pub mod uwe4;

/// Shared 2-bit mode field used by GO-32 and BugSat-1
pub(crate) fn mode_from_code(code: u8) -> Result<OperatingMode, DecodeError> {
    match code {
        0 => Ok(OperatingMode::Startup),
        1 => Ok(OperatingMode::Nominal),
        2 => Ok(OperatingMode::Safe),
        3 => Ok(OperatingMode::Transmit),
        other => Err(DecodeError::malformed(format!("mode code {} out of range 0-3", other))),
    }
}

pub(crate) fn mode_code(mode: OperatingMode) -> u8 {
    match mode {
        OperatingMode::Startup => 0,
        OperatingMode::Nominal => 1,
        OperatingMode::Safe => 2,
        OperatingMode::Transmit => 3,
        // Not encodable; closest is startup
        OperatingMode::Unknown => 0,
    }
}

fn check_len(payload: &[u8], needed: usize) -> Result<(), DecodeError> {
    if payload.len() < needed {
        return Err(DecodeError::too_short(needed, payload.len()));
    }
    Ok(())
}

fn truncated(_: std::io::Error) -> DecodeError {
    DecodeError::malformed("truncated payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{default_registry, CalibrationSet};
    use proptest::prelude::*;

    #[test]
    fn test_mode_codes() {
        for code in 0..4 {
            assert_eq!(mode_code(mode_from_code(code).unwrap()), code);
        }
        assert!(mode_from_code(4).is_err());
    }

    proptest! {
        #[test]
        fn decoding_is_deterministic(payload in proptest::collection::vec(any::<u8>(), 0..32)) {
            let registry = default_registry(&CalibrationSet::default()).unwrap();
            for entry in registry.entries() {
                let first = entry.decode(&payload);
                let second = entry.decode(&payload);
                prop_assert_eq!(first, second);
            }
        }
    }
}
