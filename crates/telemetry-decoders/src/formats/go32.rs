//! GO-32 (TechSat-1B) housekeeping beacon
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       2     Sync word
//! 2       1     Mode code (0-3)
//! 3       2     Battery voltage ADC (0-1023)
//! 5       2     Battery current ADC (signed, ±1023)
//! 7       2     Solar current ADC (0-1023)
//! 9       2     OBC temperature (signed, 0.1 °C)
//! 11      2     PA temperature (signed, 0.1 °C)
//! 13      1     RSSI (magnitude, -dBm)
//! 14      4     Spin rate (f32, rad/s)
//! ```
//!
//! All multi-byte fields are big-endian.

use super::{check_len, mode_code, mode_from_code, truncated};
use crate::calibration::Go32Calibration;
use crate::traits::{PayloadDecoder, UnitAdapter};
use crate::DecodeError;
use byteorder::{BigEndian, ReadBytesExt};
use golden_features::{Feature, OperatingMode, PhysicalFields, Quantity};
use link_layer::{Identity, IdentityError};
use std::io::Cursor;

pub const NORAD_ID: u32 = 25397;
pub const CALLSIGN: &str = "4X1GO";
pub const PAYLOAD_LEN: usize = 18;

const ADC_MAX: u16 = 1023;

pub fn identity() -> Result<Identity, IdentityError> {
    Identity::new(CALLSIGN, 0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Go32Raw {
    pub sync: u16,
    pub mode: OperatingMode,
    pub batt_v_adc: u16,
    pub batt_i_adc: i16,
    pub solar_i_adc: u16,
    pub temp_obc: i16,
    pub temp_pa: i16,
    pub rssi: u8,
    pub spin_rate: f32,
}

impl Go32Raw {
    /// Serialize back into a payload. Used by simulators and tests.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PAYLOAD_LEN);
        out.extend_from_slice(&self.sync.to_be_bytes());
        out.push(mode_code(self.mode));
        out.extend_from_slice(&self.batt_v_adc.to_be_bytes());
        out.extend_from_slice(&self.batt_i_adc.to_be_bytes());
        out.extend_from_slice(&self.solar_i_adc.to_be_bytes());
        out.extend_from_slice(&self.temp_obc.to_be_bytes());
        out.extend_from_slice(&self.temp_pa.to_be_bytes());
        out.push(self.rssi);
        out.extend_from_slice(&self.spin_rate.to_be_bytes());
        out
    }
}

pub struct Go32Decoder;

impl PayloadDecoder for Go32Decoder {
    type Raw = Go32Raw;

    fn decode(&self, payload: &[u8]) -> Result<Go32Raw, DecodeError> {
        check_len(payload, PAYLOAD_LEN)?;

        let mut cursor = Cursor::new(payload);
        let sync = cursor.read_u16::<BigEndian>().map_err(truncated)?;
        let mode = mode_from_code(cursor.read_u8().map_err(truncated)?)?;
        let batt_v_adc = cursor.read_u16::<BigEndian>().map_err(truncated)?;
        let batt_i_adc = cursor.read_i16::<BigEndian>().map_err(truncated)?;
        let solar_i_adc = cursor.read_u16::<BigEndian>().map_err(truncated)?;
        let temp_obc = cursor.read_i16::<BigEndian>().map_err(truncated)?;
        let temp_pa = cursor.read_i16::<BigEndian>().map_err(truncated)?;
        let rssi = cursor.read_u8().map_err(truncated)?;
        let spin_rate = cursor.read_f32::<BigEndian>().map_err(truncated)?;

        if batt_v_adc > ADC_MAX {
            return Err(DecodeError::malformed(format!(
                "battery voltage ADC {} > {}",
                batt_v_adc, ADC_MAX
            )));
        }
        if batt_i_adc.unsigned_abs() > ADC_MAX {
            return Err(DecodeError::malformed(format!(
                "battery current ADC {} out of ±{}",
                batt_i_adc, ADC_MAX
            )));
        }
        if solar_i_adc > ADC_MAX {
            return Err(DecodeError::malformed(format!(
                "solar current ADC {} > {}",
                solar_i_adc, ADC_MAX
            )));
        }
        if !spin_rate.is_finite() {
            return Err(DecodeError::malformed("spin rate is not finite"));
        }

        Ok(Go32Raw {
            sync,
            mode,
            batt_v_adc,
            batt_i_adc,
            solar_i_adc,
            temp_obc,
            temp_pa,
            rssi,
            spin_rate,
        })
    }
}

pub struct Go32Adapter {
    calibration: Go32Calibration,
}

impl Go32Adapter {
    pub fn new(calibration: Go32Calibration) -> Self {
        Self { calibration }
    }
}

impl UnitAdapter for Go32Adapter {
    type Raw = Go32Raw;

    fn features(&self) -> &'static [Feature] {
        &[
            Feature::BattVoltage,
            Feature::BattCurrent,
            Feature::SolarPower,
            Feature::TempObc,
            Feature::TempPa,
            Feature::SignalRssi,
            Feature::TumbleRate,
        ]
    }

    fn adapt(&self, raw: &Go32Raw) -> Result<PhysicalFields, DecodeError> {
        let cal = &self.calibration;
        let volts = cal.battery_voltage.apply(raw.batt_v_adc as f64);
        let solar_amps = cal.solar_current.apply(raw.solar_i_adc as f64);

        Ok(PhysicalFields::new()
            .with(Feature::BattVoltage, Quantity::volts(volts))
            .with(
                Feature::BattCurrent,
                Quantity::amps(cal.battery_current.apply(raw.batt_i_adc as f64)),
            )
            .with(Feature::SolarPower, Quantity::watts(solar_amps * volts))
            .with(
                Feature::TempObc,
                Quantity::celsius(cal.temperature.apply(raw.temp_obc as f64)),
            )
            .with(
                Feature::TempPa,
                Quantity::celsius(cal.temperature.apply(raw.temp_pa as f64)),
            )
            .with(Feature::SignalRssi, Quantity::dbm(-(raw.rssi as f64)))
            .with(
                Feature::TumbleRate,
                Quantity::radians_per_second(raw.spin_rate as f64),
            )
            .with_mode(raw.mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Go32Raw {
        Go32Raw {
            sync: 0x1ACF,
            mode: OperatingMode::Nominal,
            batt_v_adc: 512,
            batt_i_adc: -256,
            solar_i_adc: 1024 / 5,
            temp_obc: 215,
            temp_pa: -52,
            rssi: 110,
            spin_rate: 0.25,
        }
    }

    #[test]
    fn test_decode_layout() {
        let payload = sample().encode();
        assert_eq!(payload.len(), PAYLOAD_LEN);
        assert_eq!(Go32Decoder.decode(&payload).unwrap(), sample());
    }

    #[test]
    fn test_adapter_conversions() {
        let fields = Go32Adapter::new(Go32Calibration::default())
            .adapt(&sample())
            .unwrap();

        let volts = fields.get(Feature::BattVoltage).unwrap().value;
        assert!((volts - 7.5).abs() < 1e-9);
        assert!((fields.get(Feature::BattCurrent).unwrap().value + 0.5).abs() < 1e-9);
        // 204 counts * 5/1024 A * 7.5 V
        let expected_power = 204.0 * 5.0 / 1024.0 * 7.5;
        assert!((fields.get(Feature::SolarPower).unwrap().value - expected_power).abs() < 1e-9);
        assert!((fields.get(Feature::TempObc).unwrap().value - 21.5).abs() < 1e-9);
        assert!((fields.get(Feature::TempPa).unwrap().value + 5.2).abs() < 1e-9);
        assert_eq!(fields.get(Feature::SignalRssi), Some(Quantity::dbm(-110.0)));
        assert_eq!(fields.get(Feature::TumbleRate), Some(Quantity::radians_per_second(0.25)));
        assert_eq!(fields.mode(), Some(OperatingMode::Nominal));
        assert_eq!(fields.len(), 7);
    }

    #[test]
    fn test_short_payload() {
        let payload = sample().encode();
        assert!(matches!(
            Go32Decoder.decode(&payload[..PAYLOAD_LEN - 1]),
            Err(DecodeError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_out_of_range_values() {
        let mut raw = sample();
        raw.batt_v_adc = 1024;
        assert!(Go32Decoder.decode(&raw.encode()).is_err());

        let mut raw = sample();
        raw.batt_i_adc = -1024;
        assert!(Go32Decoder.decode(&raw.encode()).is_err());

        let mut raw = sample();
        raw.spin_rate = f32::INFINITY;
        assert!(Go32Decoder.decode(&raw.encode()).is_err());

        let mut payload = sample().encode();
        payload[2] = 7;
        assert!(Go32Decoder.decode(&payload).is_err());
    }
}
