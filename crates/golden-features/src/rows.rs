//! Tabular persistence of canonical records
//!
//! One CSV row per record: `timestamp, identity, norad_id, mode`, one column
//! per schema feature with `NA` for missing, then `suspect` holding the
//! `;`-joined names of suspect features.

use crate::record::{CanonicalRecord, OperatingMode, Reading};
use crate::schema::Feature;
use chrono::{DateTime, SecondsFormat, Utc};
use link_layer::Identity;
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;

/// Explicit missing-value marker
pub const MISSING: &str = "NA";

const LEADING: [&str; 4] = ["timestamp", "identity", "norad_id", "mode"];
const TRAILING: &str = "suspect";

#[derive(Error, Debug)]
pub enum RowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("header does not match schema: {0}")]
    Header(String),
    #[error("line {line}: unknown identity {value:?}")]
    UnknownIdentity { line: u64, value: String },
    #[error("line {line}: invalid {column} value {value:?}")]
    InvalidValue {
        line: u64,
        column: &'static str,
        value: String,
    },
}

/// Column names, in order
pub fn header() -> Vec<&'static str> {
    LEADING
        .iter()
        .copied()
        .chain(Feature::ALL.iter().map(|f| f.name()))
        .chain(std::iter::once(TRAILING))
        .collect()
}

pub struct RowWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl RowWriter<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, RowError> {
        Self::new(File::create(path)?)
    }
}

impl<W: Write> RowWriter<W> {
    pub fn new(writer: W) -> Result<Self, RowError> {
        let mut inner = csv::Writer::from_writer(writer);
        inner.write_record(header())?;
        Ok(Self { inner })
    }

    pub fn write(&mut self, record: &CanonicalRecord) -> Result<(), RowError> {
        let mut row: Vec<String> = Vec::with_capacity(LEADING.len() + Feature::ALL.len() + 1);
        row.push(record.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true));
        row.push(record.identity.to_string());
        row.push(record.norad_id.to_string());
        row.push(
            record
                .mode
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| MISSING.to_string()),
        );
        for feature in Feature::ALL {
            row.push(match record.value(feature) {
                Some(v) => v.to_string(),
                None => MISSING.to_string(),
            });
        }
        row.push(
            record
                .suspect_features()
                .map(|f| f.name())
                .collect::<Vec<_>>()
                .join(";"),
        );
        self.inner.write_record(&row)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), RowError> {
        self.inner.flush()?;
        Ok(())
    }
}

pub struct RowReader<R: Read> {
    inner: csv::Reader<R>,
    known: Option<HashSet<Identity>>,
}

impl RowReader<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RowError> {
        Self::new(File::open(path)?)
    }
}

impl<R: Read> RowReader<R> {
    /// Open a reader and check the header against the schema
    pub fn new(reader: R) -> Result<Self, RowError> {
        let mut inner = csv::Reader::from_reader(reader);
        let found: Vec<String> = inner.headers()?.iter().map(str::to_string).collect();
        let expected = header();
        if found != expected {
            return Err(RowError::Header(format!(
                "expected [{}], found [{}]",
                expected.join(","),
                found.join(",")
            )));
        }
        Ok(Self { inner, known: None })
    }

    /// Reject rows whose identity is not in `known`
    pub fn with_known_identities(mut self, known: impl IntoIterator<Item = Identity>) -> Self {
        self.known = Some(known.into_iter().collect());
        self
    }

    pub fn read_all(mut self) -> Result<Vec<CanonicalRecord>, RowError> {
        let mut records = Vec::new();
        for row in self.inner.records() {
            let row = row?;
            records.push(parse_row(&row, self.known.as_ref())?);
        }
        Ok(records)
    }
}

fn parse_row(
    row: &csv::StringRecord,
    known: Option<&HashSet<Identity>>,
) -> Result<CanonicalRecord, RowError> {
    let line = row.position().map(|p| p.line()).unwrap_or(0);
    let field = |i: usize| row.get(i).unwrap_or("");
    let invalid = |column: &'static str, value: &str| RowError::InvalidValue {
        line,
        column,
        value: value.to_string(),
    };

    let timestamp = DateTime::parse_from_rfc3339(field(0))
        .map_err(|_| invalid("timestamp", field(0)))?
        .with_timezone(&Utc);

    let identity: Identity = field(1).parse().map_err(|_| RowError::UnknownIdentity {
        line,
        value: field(1).to_string(),
    })?;
    if known.is_some_and(|k| !k.contains(&identity)) {
        return Err(RowError::UnknownIdentity {
            line,
            value: field(1).to_string(),
        });
    }

    let norad_id: u32 = field(2).parse().map_err(|_| invalid("norad_id", field(2)))?;

    let mut record = CanonicalRecord::new(identity, norad_id, timestamp);
    record.mode = match field(3) {
        MISSING => None,
        s => Some(s.parse::<OperatingMode>().map_err(|_| invalid("mode", s))?),
    };

    for feature in Feature::ALL {
        let raw = field(LEADING.len() + feature.index());
        if raw == MISSING {
            continue;
        }
        let value: f64 = raw.parse().map_err(|_| invalid(feature.name(), raw))?;
        if !value.is_finite() {
            return Err(invalid(feature.name(), raw));
        }
        record.set(feature, Reading::new(value));
    }

    let suspect = field(LEADING.len() + Feature::ALL.len());
    for name in suspect.split(';').filter(|s| !s.is_empty()) {
        let feature: Feature = name.parse().map_err(|_| invalid(TRAILING, suspect))?;
        let reading = record.get(feature).ok_or_else(|| invalid(TRAILING, suspect))?;
        record.set(
            feature,
            Reading {
                value: reading.value,
                suspect: true,
            },
        );
    }

    Ok(record)
}

/// Write all records to a CSV file
pub fn write_records(path: impl AsRef<Path>, records: &[CanonicalRecord]) -> Result<(), RowError> {
    let mut writer = RowWriter::create(path)?;
    for record in records {
        writer.write(record)?;
    }
    writer.flush()
}

/// Read every record from a CSV file
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<CanonicalRecord>, RowError> {
    RowReader::open(path)?.read_all()
}
