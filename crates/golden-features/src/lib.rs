//! Golden Features
//!
//! The canonical physical representation every satellite decodes into. One
//! fixed schema of named quantities in SI-style units, so that models and
//! operators never see a decoder's private units.
//!
//! | # | Feature | Unit |
//! |---|---------|------|
//! | 0 | `batt_voltage` | V |
//! | 1 | `batt_current` | A (+charge) |
//! | 2 | `solar_power` | W |
//! | 3 | `temp_obc` | °C |
//! | 4 | `temp_pa` | °C |
//! | 5 | `temp_batt` | °C |
//! | 6 | `temp_panel` | °C |
//! | 7 | `signal_rssi` | dBm |
//! | 8 | `tumble_rate` | rad/s |
//! | 9 | `uptime` | s |

pub mod normalize;
pub mod record;
pub mod rows;
pub mod schema;

pub use normalize::{NormalizeError, Normalizer, PhysicalFields, Quantity, RangeTable, SanityRange};
pub use record::{CanonicalRecord, OperatingMode, Reading};
pub use rows::RowError;
pub use schema::{schema_hash, Feature, Unit, UnknownFeature, FEATURE_COUNT, SCHEMA_VERSION};
