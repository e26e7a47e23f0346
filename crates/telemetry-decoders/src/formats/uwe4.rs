//! UWE-4 beacon
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       1     Frame type (0x01 = beacon)
//! 1       4     Uptime (s)
//! 5       2     Battery A voltage (mV, 0xFFFF = not sampled)
//! 7       2     Battery B voltage (mV, 0xFFFF = not sampled)
//! 9       2     Battery A current (signed mA, i16::MIN = not sampled)
//! 11      2     Battery B current (signed mA, i16::MIN = not sampled)
//! 13      1     OBC temperature (signed °C, -128 = not sampled)
//! 14      1     Battery A temperature
//! 15      1     Battery B temperature
//! 16      1     Panel +Z temperature
//! ```
//!
//! Little-endian throughout.

use super::{check_len, truncated};
use crate::calibration::Uwe4Calibration;
use crate::traits::{PayloadDecoder, UnitAdapter};
use crate::DecodeError;
use byteorder::{LittleEndian, ReadBytesExt};
use golden_features::{Feature, PhysicalFields, Quantity};
use link_layer::{Identity, IdentityError};
use std::io::Cursor;

pub const NORAD_ID: u32 = 43880;
pub const CALLSIGN: &str = "DP0UWE";
pub const PAYLOAD_LEN: usize = 17;

pub const FRAME_TYPE_BEACON: u8 = 0x01;

const VOLTAGE_NOT_SAMPLED: u16 = 0xFFFF;
const CURRENT_NOT_SAMPLED: i16 = i16::MIN;
const TEMP_NOT_SAMPLED: i8 = -128;

pub fn identity() -> Result<Identity, IdentityError> {
    Identity::new(CALLSIGN, 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Uwe4Raw {
    pub uptime_s: u32,
    pub batt_a_mv: Option<u16>,
    pub batt_b_mv: Option<u16>,
    pub batt_a_ma: Option<i16>,
    pub batt_b_ma: Option<i16>,
    pub temp_obc: Option<i8>,
    pub temp_batt_a: Option<i8>,
    pub temp_batt_b: Option<i8>,
    pub temp_panel_z: Option<i8>,
}

impl Uwe4Raw {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PAYLOAD_LEN);
        out.push(FRAME_TYPE_BEACON);
        out.extend_from_slice(&self.uptime_s.to_le_bytes());
        for mv in [self.batt_a_mv, self.batt_b_mv] {
            out.extend_from_slice(&mv.unwrap_or(VOLTAGE_NOT_SAMPLED).to_le_bytes());
        }
        for ma in [self.batt_a_ma, self.batt_b_ma] {
            out.extend_from_slice(&ma.unwrap_or(CURRENT_NOT_SAMPLED).to_le_bytes());
        }
        for t in [self.temp_obc, self.temp_batt_a, self.temp_batt_b, self.temp_panel_z] {
            out.extend_from_slice(&t.unwrap_or(TEMP_NOT_SAMPLED).to_le_bytes());
        }
        out
    }
}

fn sampled<T: PartialEq>(value: T, sentinel: T) -> Option<T> {
    (value != sentinel).then_some(value)
}

pub struct Uwe4Decoder;

impl PayloadDecoder for Uwe4Decoder {
    type Raw = Uwe4Raw;

    fn decode(&self, payload: &[u8]) -> Result<Uwe4Raw, DecodeError> {
        check_len(payload, PAYLOAD_LEN)?;

        let mut cursor = Cursor::new(payload);
        let frame_type = cursor.read_u8().map_err(truncated)?;
        if frame_type != FRAME_TYPE_BEACON {
            return Err(DecodeError::malformed(format!(
                "unsupported frame type {:#04x}",
                frame_type
            )));
        }

        let uptime_s = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
        let mut voltage = || -> Result<Option<u16>, DecodeError> {
            Ok(sampled(
                cursor.read_u16::<LittleEndian>().map_err(truncated)?,
                VOLTAGE_NOT_SAMPLED,
            ))
        };
        let batt_a_mv = voltage()?;
        let batt_b_mv = voltage()?;

        let mut current = || -> Result<Option<i16>, DecodeError> {
            Ok(sampled(
                cursor.read_i16::<LittleEndian>().map_err(truncated)?,
                CURRENT_NOT_SAMPLED,
            ))
        };
        let batt_a_ma = current()?;
        let batt_b_ma = current()?;

        let mut temp = || -> Result<Option<i8>, DecodeError> {
            Ok(sampled(cursor.read_i8().map_err(truncated)?, TEMP_NOT_SAMPLED))
        };

        Ok(Uwe4Raw {
            uptime_s,
            batt_a_mv,
            batt_b_mv,
            batt_a_ma,
            batt_b_ma,
            temp_obc: temp()?,
            temp_batt_a: temp()?,
            temp_batt_b: temp()?,
            temp_panel_z: temp()?,
        })
    }
}

pub struct Uwe4Adapter {
    calibration: Uwe4Calibration,
}

impl Uwe4Adapter {
    pub fn new(calibration: Uwe4Calibration) -> Self {
        Self { calibration }
    }
}

impl UnitAdapter for Uwe4Adapter {
    type Raw = Uwe4Raw;

    fn features(&self) -> &'static [Feature] {
        &[
            Feature::BattVoltage,
            Feature::BattCurrent,
            Feature::TempObc,
            Feature::TempBatt,
            Feature::TempPanel,
            Feature::Uptime,
        ]
    }

    fn adapt(&self, raw: &Uwe4Raw) -> Result<PhysicalFields, DecodeError> {
        let cal = &self.calibration;

        let va = raw.batt_a_mv.ok_or(DecodeError::MissingRequiredField("batt_a_voltage"))?;
        let vb = raw.batt_b_mv.ok_or(DecodeError::MissingRequiredField("batt_b_voltage"))?;
        let ia = raw.batt_a_ma.ok_or(DecodeError::MissingRequiredField("batt_a_current"))?;
        let ib = raw.batt_b_ma.ok_or(DecodeError::MissingRequiredField("batt_b_current"))?;

        let volts = (cal.battery_voltage.apply(va as f64) + cal.battery_voltage.apply(vb as f64)) / 2.0;
        let amps = cal.battery_current.apply(ia as f64) + cal.battery_current.apply(ib as f64);

        let temp_batt = match (raw.temp_batt_a, raw.temp_batt_b) {
            (Some(a), Some(b)) => Some((a as f64 + b as f64) / 2.0),
            (Some(t), None) | (None, Some(t)) => Some(t as f64),
            (None, None) => None,
        }
        .map(|t| cal.temperature.apply(t));

        let celsius = |t: Option<i8>| t.map(|t| Quantity::celsius(cal.temperature.apply(t as f64)));

        Ok(PhysicalFields::new()
            .with(Feature::BattVoltage, Quantity::volts(volts))
            .with(Feature::BattCurrent, Quantity::amps(amps))
            .with_opt(Feature::TempObc, celsius(raw.temp_obc))
            .with_opt(Feature::TempBatt, temp_batt.map(Quantity::celsius))
            .with_opt(Feature::TempPanel, celsius(raw.temp_panel_z))
            .with(Feature::Uptime, Quantity::seconds(raw.uptime_s as f64)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Uwe4Raw {
        Uwe4Raw {
            uptime_s: 3600,
            batt_a_mv: Some(4000),
            batt_b_mv: Some(4200),
            batt_a_ma: Some(-120),
            batt_b_ma: Some(80),
            temp_obc: Some(18),
            temp_batt_a: Some(10),
            temp_batt_b: None,
            temp_panel_z: Some(-35),
        }
    }

    #[test]
    fn test_decode_layout() {
        let payload = sample().encode();
        assert_eq!(payload.len(), PAYLOAD_LEN);
        assert_eq!(Uwe4Decoder.decode(&payload).unwrap(), sample());
    }

    #[test]
    fn test_adapter_combines_batteries() {
        let fields = Uwe4Adapter::new(Uwe4Calibration::default())
            .adapt(&sample())
            .unwrap();

        assert!((fields.get(Feature::BattVoltage).unwrap().value - 4.1).abs() < 1e-9);
        assert!((fields.get(Feature::BattCurrent).unwrap().value + 0.04).abs() < 1e-9);
        assert_eq!(fields.get(Feature::TempBatt), Some(Quantity::celsius(10.0)));
        assert_eq!(fields.get(Feature::TempPanel), Some(Quantity::celsius(-35.0)));
        assert_eq!(fields.get(Feature::Uptime), Some(Quantity::seconds(3600.0)));
        assert_eq!(fields.get(Feature::SolarPower), None);
        assert_eq!(fields.mode(), None);
    }

    #[test]
    fn test_battery_temperatures_averaged() {
        let mut raw = sample();
        raw.temp_batt_b = Some(13);
        let fields = Uwe4Adapter::new(Uwe4Calibration::default()).adapt(&raw).unwrap();
        assert_eq!(fields.get(Feature::TempBatt), Some(Quantity::celsius(11.5)));

        raw.temp_batt_a = None;
        let fields = Uwe4Adapter::new(Uwe4Calibration::default()).adapt(&raw).unwrap();
        assert_eq!(fields.get(Feature::TempBatt), Some(Quantity::celsius(13.0)));
    }

    #[test]
    fn test_unsampled_temperatures_are_absent() {
        let mut raw = sample();
        raw.temp_obc = None;
        raw.temp_batt_a = None;
        let fields = Uwe4Adapter::new(Uwe4Calibration::default()).adapt(&raw).unwrap();

        assert_eq!(fields.get(Feature::TempObc), None);
        assert_eq!(fields.get(Feature::TempBatt), None);
    }

    #[test]
    fn test_missing_battery_channel() {
        let mut raw = sample();
        raw.batt_b_mv = None;
        let payload = raw.encode();
        let decoded = Uwe4Decoder.decode(&payload).unwrap();

        assert_eq!(
            Uwe4Adapter::new(Uwe4Calibration::default()).adapt(&decoded),
            Err(DecodeError::MissingRequiredField("batt_b_voltage"))
        );
    }

    #[test]
    fn test_wrong_frame_type() {
        let mut payload = sample().encode();
        payload[0] = 0x02;
        assert!(matches!(
            Uwe4Decoder.decode(&payload),
            Err(DecodeError::MalformedPayload(_))
        ));
    }
}
