//! BugSat-1 (Tita) beacon
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       1     Beacon type (0x42)
//! 1       4     Uptime (s)
//! 5       2     Battery voltage (10 mV, 0xFFFF = not sampled)
//! 7       2     Battery current (signed 10 mA, i16::MIN = not sampled)
//! 9       2     CPU temperature (signed 0.1 °C, 0x7FFF = not sampled)
//! 11      2     RF temperature (signed 0.1 °C, 0x7FFF = not sampled)
//! 13      1     Mode code (0-3)
//! ```
//!
//! Big-endian throughout.

use super::{check_len, mode_code, mode_from_code, truncated};
use crate::calibration::BugSat1Calibration;
use crate::traits::{PayloadDecoder, UnitAdapter};
use crate::DecodeError;
use byteorder::{BigEndian, ReadBytesExt};
use golden_features::{Feature, OperatingMode, PhysicalFields, Quantity};
use link_layer::{Identity, IdentityError};
use std::io::Cursor;

pub const NORAD_ID: u32 = 40014;
pub const CALLSIGN: &str = "LU7AQB";
pub const PAYLOAD_LEN: usize = 14;

pub const BEACON_TYPE: u8 = 0x42;

const VOLTAGE_NOT_SAMPLED: u16 = 0xFFFF;
const CURRENT_NOT_SAMPLED: i16 = i16::MIN;
const TEMP_NOT_SAMPLED: i16 = 0x7FFF;

pub fn identity() -> Result<Identity, IdentityError> {
    Identity::new(CALLSIGN, 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BugSat1Raw {
    pub uptime_s: u32,
    pub voltage_raw: Option<u16>,
    pub current_raw: Option<i16>,
    pub cpu_temp_raw: Option<i16>,
    pub rf_temp_raw: Option<i16>,
    pub mode: OperatingMode,
}

impl BugSat1Raw {
    /// A nominal beacon carrying only voltage and current
    pub fn power(voltage_raw: u16, current_raw: i16) -> Self {
        Self {
            uptime_s: 0,
            voltage_raw: Some(voltage_raw),
            current_raw: Some(current_raw),
            cpu_temp_raw: None,
            rf_temp_raw: None,
            mode: OperatingMode::Nominal,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PAYLOAD_LEN);
        out.push(BEACON_TYPE);
        out.extend_from_slice(&self.uptime_s.to_be_bytes());
        out.extend_from_slice(&self.voltage_raw.unwrap_or(VOLTAGE_NOT_SAMPLED).to_be_bytes());
        out.extend_from_slice(&self.current_raw.unwrap_or(CURRENT_NOT_SAMPLED).to_be_bytes());
        out.extend_from_slice(&self.cpu_temp_raw.unwrap_or(TEMP_NOT_SAMPLED).to_be_bytes());
        out.extend_from_slice(&self.rf_temp_raw.unwrap_or(TEMP_NOT_SAMPLED).to_be_bytes());
        out.push(mode_code(self.mode));
        out
    }
}

pub struct BugSat1Decoder;

impl PayloadDecoder for BugSat1Decoder {
    type Raw = BugSat1Raw;

    fn decode(&self, payload: &[u8]) -> Result<BugSat1Raw, DecodeError> {
        check_len(payload, PAYLOAD_LEN)?;

        let mut cursor = Cursor::new(payload);
        let beacon_type = cursor.read_u8().map_err(truncated)?;
        if beacon_type != BEACON_TYPE {
            return Err(DecodeError::malformed(format!(
                "unsupported beacon type {:#04x}",
                beacon_type
            )));
        }

        let uptime_s = cursor.read_u32::<BigEndian>().map_err(truncated)?;
        let voltage = cursor.read_u16::<BigEndian>().map_err(truncated)?;
        let current = cursor.read_i16::<BigEndian>().map_err(truncated)?;
        let cpu_temp = cursor.read_i16::<BigEndian>().map_err(truncated)?;
        let rf_temp = cursor.read_i16::<BigEndian>().map_err(truncated)?;
        let mode = mode_from_code(cursor.read_u8().map_err(truncated)?)?;

        Ok(BugSat1Raw {
            uptime_s,
            voltage_raw: (voltage != VOLTAGE_NOT_SAMPLED).then_some(voltage),
            current_raw: (current != CURRENT_NOT_SAMPLED).then_some(current),
            cpu_temp_raw: (cpu_temp != TEMP_NOT_SAMPLED).then_some(cpu_temp),
            rf_temp_raw: (rf_temp != TEMP_NOT_SAMPLED).then_some(rf_temp),
            mode,
        })
    }
}

pub struct BugSat1Adapter {
    calibration: BugSat1Calibration,
}

impl BugSat1Adapter {
    pub fn new(calibration: BugSat1Calibration) -> Self {
        Self { calibration }
    }
}

impl UnitAdapter for BugSat1Adapter {
    type Raw = BugSat1Raw;

    fn features(&self) -> &'static [Feature] {
        &[
            Feature::BattVoltage,
            Feature::BattCurrent,
            Feature::TempObc,
            Feature::TempPa,
            Feature::Uptime,
        ]
    }

    fn adapt(&self, raw: &BugSat1Raw) -> Result<PhysicalFields, DecodeError> {
        let cal = &self.calibration;
        let voltage = raw
            .voltage_raw
            .ok_or(DecodeError::MissingRequiredField("voltage"))?;
        let current = raw
            .current_raw
            .ok_or(DecodeError::MissingRequiredField("current"))?;
        let celsius = |t: Option<i16>| t.map(|t| Quantity::celsius(cal.temperature.apply(t as f64)));

        Ok(PhysicalFields::new()
            .with(
                Feature::BattVoltage,
                Quantity::volts(cal.battery_voltage.apply(voltage as f64)),
            )
            .with(
                Feature::BattCurrent,
                Quantity::amps(cal.battery_current.apply(current as f64)),
            )
            .with_opt(Feature::TempObc, celsius(raw.cpu_temp_raw))
            .with_opt(Feature::TempPa, celsius(raw.rf_temp_raw))
            .with(Feature::Uptime, Quantity::seconds(raw.uptime_s as f64))
            .with_mode(raw.mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_beacon() {
        let payload = BugSat1Raw::power(820, 15).encode();
        assert_eq!(payload.len(), PAYLOAD_LEN);

        let raw = BugSat1Decoder.decode(&payload).unwrap();
        let fields = BugSat1Adapter::new(BugSat1Calibration::default())
            .adapt(&raw)
            .unwrap();

        assert!((fields.get(Feature::BattVoltage).unwrap().value - 8.2).abs() < 1e-9);
        assert!((fields.get(Feature::BattCurrent).unwrap().value - 0.15).abs() < 1e-9);
        assert_eq!(fields.get(Feature::TempObc), None);
        assert_eq!(fields.mode(), Some(OperatingMode::Nominal));
    }

    #[test]
    fn test_temperatures_when_sampled() {
        let mut raw = BugSat1Raw::power(800, -20);
        raw.cpu_temp_raw = Some(235);
        raw.rf_temp_raw = Some(-15);
        let decoded = BugSat1Decoder.decode(&raw.encode()).unwrap();
        assert_eq!(decoded, raw);

        let fields = BugSat1Adapter::new(BugSat1Calibration::default())
            .adapt(&decoded)
            .unwrap();
        assert!((fields.get(Feature::TempObc).unwrap().value - 23.5).abs() < 1e-9);
        assert!((fields.get(Feature::TempPa).unwrap().value + 1.5).abs() < 1e-9);
        assert!((fields.get(Feature::BattCurrent).unwrap().value + 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_missing_voltage() {
        let mut raw = BugSat1Raw::power(820, 15);
        raw.voltage_raw = None;
        let decoded = BugSat1Decoder.decode(&raw.encode()).unwrap();
        assert_eq!(
            BugSat1Adapter::new(BugSat1Calibration::default()).adapt(&decoded),
            Err(DecodeError::MissingRequiredField("voltage"))
        );
    }

    #[test]
    fn test_rejects_other_beacons() {
        let mut payload = BugSat1Raw::power(820, 15).encode();
        payload[0] = 0x41;
        assert!(BugSat1Decoder.decode(&payload).is_err());
        assert!(BugSat1Decoder.decode(&payload[..10]).is_err());
    }
}
