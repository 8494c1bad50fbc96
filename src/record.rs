//! The sensor record type shared by parsing, rewriting and serialization.

use serde::{Deserialize, Serialize};

/// One timestamped sensor observation.
///
/// Records are immutable once parsed; the rewriter produces a fresh copy per
/// emission so that repeated playback of the same sequence stays untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Fractional seconds since the Unix epoch
    pub timestamp: f64,
    /// Identifier of the producing sensor
    pub sensor_id: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Record {
    /// Create a new record
    pub fn new(timestamp: f64, sensor_id: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            timestamp,
            sensor_id: sensor_id.into(),
            x,
            y,
            z,
        }
    }
}
