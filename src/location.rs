//! Time and location acquisition from an optional cellular/GPS notecard.
//!
//! The peripheral speaks newline-delimited JSON: every request is a single
//! object with a `req` field and every response is a single object. Any
//! transport or protocol failure is absorbed here: the caller always gets a
//! [`LocationTimeRecord`] back, with absent fields when nothing was learned.
//!
//! The handle is an explicit two-state value. Once a fetch fails the source
//! drops to [`LocationTimeSource::Disconnected`] and stays there until the
//! caller runs [`LocationTimeSource::connect`] again.
use std::{
    fs,
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use chrono::DateTime;
use serde_json::{json, Value};
use serialport::{ClearBuffer, SerialPort};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::LocationTimeRecord;

// ---

/// Line speed of the notecard's USB/serial interface.
pub const BAUD_RATE: u32 = 9600;

/// Failure talking to the location peripheral.
#[derive(Debug, Error)]
pub enum LocationFetchError {
    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("transport closed")]
    TransportClosed,

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

/// Request/response channel to the peripheral.
pub trait NoteTransport {
    /// Send one request and wait (bounded) for its response object.
    fn transaction(&mut self, request: &Value) -> Result<Value, LocationFetchError>;
}

/// Serial port in raw mode speaking line-delimited JSON.
///
/// Every read is bounded by the port timeout and a whole transaction by the
/// same duration. Dropping the transport closes the port.
pub struct SerialTransport {
    // ---
    name: String,
    port: BufReader<Box<dyn SerialPort>>,
    timeout: Duration,
}

impl SerialTransport {
    pub fn open(path: &Path, timeout: Duration) -> Result<Self, LocationFetchError> {
        // ---
        let port = serialport::new(path.to_string_lossy(), BAUD_RATE)
            .timeout(timeout)
            .open()?;
        Self::from_port(path.display().to_string(), port, timeout)
    }

    /// Wrap an already opened port, applying `timeout` to its reads.
    pub fn from_port(
        name: impl Into<String>,
        mut port: Box<dyn SerialPort>,
        timeout: Duration,
    ) -> Result<Self, LocationFetchError> {
        // ---
        port.set_timeout(timeout)?;
        Ok(Self {
            name: name.into(),
            port: BufReader::new(port),
            timeout,
        })
    }

    /// Drop anything received outside a transaction.
    fn discard_pending(&mut self) -> Result<(), LocationFetchError> {
        // ---
        let buffered = self.port.buffer().len();
        self.port.consume(buffered);
        self.port.get_ref().clear(ClearBuffer::Input)?;
        Ok(())
    }

    /// Next non-empty line, bounded by `deadline`.
    fn read_line(&mut self, deadline: Instant) -> Result<String, LocationFetchError> {
        // ---
        let mut buf = Vec::new();
        loop {
            if Instant::now() >= deadline {
                return Err(LocationFetchError::Timeout(self.timeout));
            }
            match self.port.read_until(b'\n', &mut buf) {
                Ok(0) => return Err(LocationFetchError::TransportClosed),
                Ok(_) if buf.ends_with(b"\n") => {
                    let line = String::from_utf8_lossy(&buf).trim().to_string();
                    if !line.is_empty() {
                        return Ok(line);
                    }
                    buf.clear();
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    return Err(LocationFetchError::Timeout(self.timeout))
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl NoteTransport for SerialTransport {
    fn transaction(&mut self, request: &Value) -> Result<Value, LocationFetchError> {
        // ---
        self.discard_pending()?;

        let mut line = request.to_string();
        line.push('\n');
        let port = self.port.get_mut();
        port.write_all(line.as_bytes())?;
        port.flush()?;
        debug!("Notecard {}: >> {}", self.name, request);

        let reply = self.read_line(Instant::now() + self.timeout)?;
        debug!("Notecard {}: << {}", self.name, reply);
        parse_response(&reply)
    }
}

/// Parse a response line, treating an `err` field as a failed request.
pub fn parse_response(line: &str) -> Result<Value, LocationFetchError> {
    // ---
    let value: Value = serde_json::from_str(line)
        .map_err(|e| LocationFetchError::MalformedResponse(format!("{}: {}", e, line)))?;

    if !value.is_object() {
        return Err(LocationFetchError::MalformedResponse(line.to_string()));
    }
    if let Some(err) = value.get("err") {
        return Err(LocationFetchError::MalformedResponse(err.to_string()));
    }
    Ok(value)
}

/// Candidate device paths: `/dev/tty` followed by a letter, sorted.
pub fn discover_devices(prefix: &str) -> Vec<PathBuf> {
    // ---
    let prefix_path = Path::new(prefix);
    let dir = prefix_path.parent().unwrap_or_else(|| Path::new("/dev"));
    let stem = prefix_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("tty");

    let mut devices: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|name| name.strip_prefix(stem))
                    .and_then(|rest| rest.chars().next())
                    .is_some_and(|c| c.is_ascii_alphabetic())
            })
            .map(|e| e.path())
            .collect(),
        Err(e) => {
            warn!("Notecard: cannot list {}: {}", dir.display(), e);
            Vec::new()
        }
    };
    devices.sort();
    devices
}

/// Connection state of the location peripheral.
pub enum LocationTimeSource {
    Connected(Box<dyn NoteTransport>),
    Disconnected,
}

impl LocationTimeSource {
    /// Probe serial devices under `device_prefix` for a notecard.
    pub fn connect(device_prefix: &str, timeout: Duration, gps_period_secs: u64) -> Self {
        // ---
        let devices = discover_devices(device_prefix);
        Self::connect_with(&devices, gps_period_secs, |path| {
            SerialTransport::open(path, timeout)
                .map(|t| Box::new(t) as Box<dyn NoteTransport>)
        })
    }

    /// Try each candidate until one answers the version query.
    ///
    /// The responding peripheral is then switched to periodic GPS updates
    /// every `gps_period_secs`.
    pub fn connect_with<F>(candidates: &[PathBuf], gps_period_secs: u64, mut open: F) -> Self
    where
        F: FnMut(&Path) -> Result<Box<dyn NoteTransport>, LocationFetchError>,
    {
        // ---
        for path in candidates {
            let mut transport = match open(path) {
                Ok(t) => t,
                Err(e) => {
                    debug!("Notecard: {} not usable: {}", path.display(), e);
                    continue;
                }
            };

            match transport.transaction(&json!({ "req": "card.version" })) {
                Ok(rsp) => info!("Notecard: opened at {} (version: {})", path.display(), rsp),
                Err(e) => {
                    debug!("Notecard: no answer on {}: {}", path.display(), e);
                    continue;
                }
            }

            let mode = json!({
                "req": "card.location.mode",
                "mode": "periodic",
                "seconds": gps_period_secs,
            });
            match transport.transaction(&mode) {
                Ok(rsp) => info!("Notecard: GPS periodic every {}s: {}", gps_period_secs, rsp),
                Err(e) => warn!("Notecard: failed to configure GPS mode: {}", e),
            }

            return LocationTimeSource::Connected(transport);
        }

        warn!("Notecard: no notecard found, logging without location");
        LocationTimeSource::Disconnected
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, LocationTimeSource::Connected(_))
    }

    /// Fetch the current time and position.
    ///
    /// Never fails. A transport error invalidates the handle; whatever was
    /// learned before the error is still returned.
    pub fn fetch(&mut self) -> LocationTimeRecord {
        // ---
        let LocationTimeSource::Connected(transport) = self else {
            return LocationTimeRecord::default();
        };

        let mut record = LocationTimeRecord::default();
        if let Err(e) = query_time_and_location(transport.as_mut(), &mut record) {
            warn!(
                "Notecard: connection lost ({}), continuing without location; reconnect required",
                e
            );
            *self = LocationTimeSource::Disconnected;
        }
        record
    }
}

/// Fill `record` from a time query followed by a location query.
///
/// The location query may override the rough coordinates from the time
/// query. Fields stay filled if a later query fails.
fn query_time_and_location(
    transport: &mut dyn NoteTransport,
    record: &mut LocationTimeRecord,
) -> Result<(), LocationFetchError> {
    // ---
    let rsp = transport.transaction(&json!({ "req": "card.time" }))?;

    let minutes = rsp.get("minutes").and_then(Value::as_i64).unwrap_or(0);
    record.timestamp_utc = match rsp.get("time").and_then(Value::as_i64) {
        Some(secs) => {
            let utc = minutes
                .checked_mul(60)
                .and_then(|offset| secs.checked_add(offset))
                .and_then(|t| DateTime::from_timestamp(t, 0));
            if utc.is_none() {
                return Err(LocationFetchError::MalformedResponse(format!(
                    "time {} with offset {} min out of range",
                    secs, minutes
                )));
            }
            utc
        }
        None => None,
    };
    record.latitude = rsp.get("lat").and_then(Value::as_f64);
    record.longitude = rsp.get("lon").and_then(Value::as_f64);

    let rsp = transport.transaction(&json!({ "req": "card.location" }))?;
    if let Some(lat) = rsp.get("lat").and_then(Value::as_f64) {
        record.latitude = Some(lat);
    }
    if let Some(lon) = rsp.get("lon").and_then(Value::as_f64) {
        record.longitude = Some(lon);
    }

    Ok(())
}
