//! Append-only CSV data log, one file per UTC date.
//!
//! Files are named `<prefix><YYYY-MM-DD>.csv`. The header is written when the
//! file is first created and takes the field names of that first record.
use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::PathBuf,
};

use thiserror::Error;
use tracing::debug;

use crate::models::LogRecord;

// ---

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("data log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result of a successful [`Recorder::append`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Appended {
    /// Row written to the given file.
    Written(PathBuf),
    /// Record had no timestamp and was skipped.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct Recorder {
    filename_prefix: String,
}

impl Recorder {
    pub fn new(filename_prefix: impl Into<String>) -> Self {
        Self {
            filename_prefix: filename_prefix.into(),
        }
    }

    /// File the record belongs to, or `None` without a timestamp.
    pub fn path_for(&self, record: &LogRecord) -> Option<PathBuf> {
        // ---
        record.timestamp_utc().map(|t| {
            PathBuf::from(format!(
                "{}{}.csv",
                self.filename_prefix,
                t.format("%Y-%m-%d")
            ))
        })
    }

    /// Append one row, creating the dated file with a header if needed.
    pub fn append(&self, record: &LogRecord) -> Result<Appended, RecorderError> {
        // ---
        let Some(path) = self.path_for(record) else {
            debug!("Data log: record without time, skipped");
            return Ok(Appended::Skipped);
        };
        let io_err = |source| RecorderError::Io {
            path: path.clone(),
            source,
        };

        // create_new makes header creation race free: losing the race is fine
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(csv_line(record.keys()).as_bytes())
                    .map_err(io_err)?;
                debug!("Data log: created {}", path.display());
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(io_err(e)),
        }

        let mut file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        let row = csv_line(record.values().map(|v| v.to_string()));
        file.write_all(row.as_bytes()).map_err(io_err)?;

        Ok(Appended::Written(path))
    }
}

/// Join cells with commas, quoting any that need it, and end the line.
fn csv_line<I, S>(cells: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    // ---
    let mut line = cells
        .into_iter()
        .map(|cell| {
            let cell = cell.as_ref();
            if cell.contains([',', '"', '\n', '\r']) {
                format!("\"{}\"", cell.replace('"', "\"\""))
            } else {
                cell.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",");
    line.push_str("\r\n");
    line
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{FieldValue, TIME_FIELD};
    use chrono::{TimeZone, Utc};
    use std::fs;
    use tempfile::TempDir;

    fn create_test_record(uv_index: f64, hour: u32) -> LogRecord {
        // ---
        LogRecord::new()
            .with("uv_index", uv_index)
            .with("uv_level", 1.5)
            .with(TIME_FIELD, Some(Utc.with_ymd_and_hms(2024, 2, 24, hour, 0, 0).unwrap()))
            .with("lat", Some(48.5))
            .with("lon", None::<f64>)
    }

    fn prefix_in(dir: &TempDir) -> String {
        format!("{}/uv_meter_data.", dir.path().display())
    }

    #[test]
    fn test_record_without_time_writes_nothing() {
        // ---
        let dir = TempDir::new().unwrap();
        let recorder = Recorder::new(prefix_in(&dir));
        let record = LogRecord::new().with("uv_index", 3.0).with(TIME_FIELD, FieldValue::Missing);

        assert_eq!(recorder.append(&record).unwrap(), Appended::Skipped);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_one_header_two_rows() {
        // ---
        let dir = TempDir::new().unwrap();
        let recorder = Recorder::new(prefix_in(&dir));

        recorder.append(&create_test_record(2.0, 10)).unwrap();
        let outcome = recorder.append(&create_test_record(4.5, 11)).unwrap();

        let path = dir.path().join("uv_meter_data.2024-02-24.csv");
        assert_eq!(outcome, Appended::Written(path.clone()));
        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "uv_index,uv_level,time,lat,lon");
        assert_eq!(lines[1], "2,1.5,2024-02-24 10:00:00+00:00,48.5,");
        assert!(lines[2].starts_with("4.5,"));
    }

    #[test]
    fn test_existing_file_gets_no_second_header() {
        // ---
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("uv_meter_data.2024-02-24.csv");
        // Another writer won the header race
        fs::write(&path, "uv_index,uv_level,time,lat,lon\r\n").unwrap();

        let recorder = Recorder::new(prefix_in(&dir));
        recorder.append(&create_test_record(1.0, 9)).unwrap();
        recorder.append(&create_test_record(1.0, 9)).unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content.matches("uv_index").count(), 1);
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_new_date_new_file() {
        // ---
        let dir = TempDir::new().unwrap();
        let recorder = Recorder::new(prefix_in(&dir));
        let next_day = create_test_record(1.0, 1).with(
            TIME_FIELD,
            Some(Utc.with_ymd_and_hms(2024, 2, 25, 0, 0, 1).unwrap()),
        );

        recorder.append(&create_test_record(1.0, 23)).unwrap();
        recorder.append(&next_day).unwrap();

        assert!(dir.path().join("uv_meter_data.2024-02-24.csv").exists());
        assert!(dir.path().join("uv_meter_data.2024-02-25.csv").exists());
    }

    #[test]
    fn test_unwritable_location_reports_error() {
        // ---
        let dir = TempDir::new().unwrap();
        let recorder = Recorder::new(format!("{}/missing/data.", dir.path().display()));

        let err = recorder.append(&create_test_record(1.0, 12)).unwrap_err();
        assert!(matches!(err, RecorderError::Io { .. }));
    }

    #[test]
    fn test_csv_quoting() {
        // ---
        assert_eq!(csv_line(["a", "b,c", "say \"hi\""]), "a,\"b,c\",\"say \"\"hi\"\"\"\r\n");
    }
}
