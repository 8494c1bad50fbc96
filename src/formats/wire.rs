//! Wire encoding of records.
//!
//! # Wire Protocol
//!
//! Every encoder emits one newline-terminated text line per record:
//!
//! ```text
//! ┌──────────────────────────────┬──────┐
//! │ Encoded record (one line)    │ '\n' │
//! └──────────────────────────────┴──────┘
//! ```
//!
//! All three transports frame messages the same way: one line per datagram
//! on UDP, a line-delimited stream on TCP. Receivers split on newlines
//! regardless of transport.
//!
//! ## Encodings
//!
//! | Format | Line shape                                      |
//! |--------|-------------------------------------------------|
//! | csv    | `1678901234.567,sensor_001,1.23,4.56,7.89`      |
//! | json   | `{"timestamp":1678901234.567,"sensor_id":...}`  |
//! | crlx   | `timestamp:1678901234.567,sensor_id:...,x:...`  |
//!
//! With `data_only` the timestamp and sensor_id are omitted, leaving just
//! the x/y/z portion in the same format family.
//!
//! ## Numeric precision
//!
//! Floats are written with shortest round-trip formatting; parsing the
//! output recovers the exact source values, including full fractional
//! timestamp precision. Non-finite values cannot be represented in any of
//! the three encodings and are rejected before they reach the wire.

use crate::error::{Error, Result};
use crate::formats::Format;
use crate::record::Record;
use serde::Serialize;

/// Encodes records into wire bytes for a single stream.
#[derive(Debug, Clone)]
pub struct Serializer {
    format: Format,
    data_only: bool,
}

/// Wire shape used when the stream is configured to strip the timestamp and
/// sensor_id, leaving only the data portion.
#[derive(Serialize)]
struct DataOnly {
    x: f64,
    y: f64,
    z: f64,
}

impl Serializer {
    /// Create a new serializer for the given wire format
    pub fn new(format: Format, data_only: bool) -> Self {
        Self { format, data_only }
    }

    /// Encode one record as a newline-terminated line.
    ///
    /// A record carrying a non-finite float is rejected with
    /// [`Error::Encode`]; the caller skips it and the stream continues.
    pub fn serialize(&self, record: &Record) -> Result<Vec<u8>> {
        self.check_finite(record)?;
        let mut line = match self.format {
            Format::Csv => self.encode_csv(record),
            Format::Json => self.encode_json(record)?,
            Format::Crlx => self.encode_crlx(record),
        };
        line.push('\n');
        Ok(line.into_bytes())
    }

    fn encode_csv(&self, r: &Record) -> String {
        if self.data_only {
            format!("{},{},{}", r.x, r.y, r.z)
        } else {
            format!("{},{},{},{},{}", r.timestamp, r.sensor_id, r.x, r.y, r.z)
        }
    }

    fn encode_json(&self, r: &Record) -> Result<String> {
        let encoded = if self.data_only {
            serde_json::to_string(&DataOnly {
                x: r.x,
                y: r.y,
                z: r.z,
            })
        } else {
            serde_json::to_string(r)
        };
        encoded.map_err(|e| Error::Encode(e.to_string()))
    }

    fn encode_crlx(&self, r: &Record) -> String {
        if self.data_only {
            format!("x:{},y:{},z:{}", r.x, r.y, r.z)
        } else {
            format!(
                "timestamp:{},sensor_id:{},x:{},y:{},z:{}",
                r.timestamp, r.sensor_id, r.x, r.y, r.z
            )
        }
    }

    fn check_finite(&self, r: &Record) -> Result<()> {
        if !self.data_only && !r.timestamp.is_finite() {
            return Err(Error::Encode(format!("non-finite timestamp: {}", r.timestamp)));
        }
        for (name, value) in [("x", r.x), ("y", r.y), ("z", r.z)] {
            if !value.is_finite() {
                return Err(Error::Encode(format!("non-finite {}: {}", name, value)));
            }
        }
        Ok(())
    }
}

/// Create a serializer for the given wire format
pub fn create_serializer(format: Format, data_only: bool) -> Serializer {
    Serializer::new(format, data_only)
}
