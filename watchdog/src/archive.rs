//! Stored frame archives
//!
//! One JSON object per line, SatNOGS-style:
//!
//! ```json
//! {"frame": "86a240404040e0...", "timestamp": "2024-05-01T12:00:00Z", "rssi_dbm": -112.5, "observation_id": 9012345}
//! ```
//!
//! Lines that fail to parse are counted and skipped. Blank lines are ignored.

use chrono::{DateTime, Utc};
use link_layer::RawFrame;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Hex-encoded frame, FCS included
    pub frame: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi_dbm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation_id: Option<u64>,
}

impl ArchiveEntry {
    pub fn from_frame(frame: &RawFrame) -> Self {
        Self {
            frame: hex::encode(frame.bytes()),
            timestamp: frame.received_at(),
            rssi_dbm: frame.rssi_dbm(),
            observation_id: None,
        }
    }

    pub fn to_frame(&self) -> Result<RawFrame, hex::FromHexError> {
        let bytes = hex::decode(self.frame.trim())?;
        let frame = RawFrame::new(bytes, self.timestamp);
        Ok(match self.rssi_dbm {
            Some(rssi) => frame.with_rssi(rssi),
            None => frame,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Archive {
    pub frames: Vec<RawFrame>,
    /// Lines that were neither blank nor a valid entry
    pub skipped: usize,
}

/// Parse archive lines from any reader
pub fn read_archive<R: BufRead>(reader: R) -> Result<Archive, ArchiveError> {
    let mut archive = Archive::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parsed = serde_json::from_str::<ArchiveEntry>(line)
            .map_err(|e| e.to_string())
            .and_then(|entry| entry.to_frame().map_err(|e| e.to_string()));

        match parsed {
            Ok(frame) => archive.frames.push(frame),
            Err(reason) => {
                debug!(line = index + 1, %reason, "skipping archive line");
                archive.skipped += 1;
            }
        }
    }

    Ok(archive)
}

pub fn load_archive(path: impl AsRef<Path>) -> Result<Archive, ArchiveError> {
    let path = path.as_ref();
    let archive = read_archive(BufReader::new(File::open(path)?))?;
    info!(
        path = %path.display(),
        frames = archive.frames.len(),
        skipped = archive.skipped,
        "loaded archive"
    );
    Ok(archive)
}

pub fn write_archive<W: Write>(mut writer: W, frames: &[RawFrame]) -> Result<(), ArchiveError> {
    for frame in frames {
        serde_json::to_writer(&mut writer, &ArchiveEntry::from_frame(frame))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Cursor;

    #[test]
    fn test_reads_valid_and_skips_bad_lines() {
        let text = r#"{"frame": "c0ffee", "timestamp": "2024-05-01T12:00:00Z", "rssi_dbm": -110.0, "observation_id": 42}

not json
{"frame": "zz", "timestamp": "2024-05-01T12:00:10Z"}
{"frame": "0102", "timestamp": "2024-05-01T12:00:20Z"}
{"timestamp": "2024-05-01T12:00:30Z"}
"#;
        let archive = read_archive(Cursor::new(text)).unwrap();

        assert_eq!(archive.frames.len(), 2);
        assert_eq!(archive.skipped, 3);
        assert_eq!(archive.frames[0].bytes(), &[0xc0, 0xff, 0xee]);
        assert_eq!(archive.frames[0].rssi_dbm(), Some(-110.0));
        assert_eq!(archive.frames[1].rssi_dbm(), None);
        assert_eq!(
            archive.frames[1].received_at(),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 20).unwrap()
        );
    }

    #[test]
    fn test_write_then_load() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let frames = vec![
            RawFrame::new(vec![1, 2, 3], t).with_rssi(-99.5),
            RawFrame::new(vec![0xAB; 20], t),
        ];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pass.jsonl");
        write_archive(File::create(&path).unwrap(), &frames).unwrap();

        let archive = load_archive(&path).unwrap();
        assert_eq!(archive.frames, frames);
        assert_eq!(archive.skipped, 0);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_archive("/nonexistent/archive.jsonl"),
            Err(ArchiveError::Io(_))
        ));
    }
}
