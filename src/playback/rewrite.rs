//! Per-record field rewriting.

use crate::record::Record;
use std::time::{SystemTime, UNIX_EPOCH};

/// Applies the configured overrides to each record just before encoding.
///
/// Rewriting the timestamp to the current wall clock is what makes playback
/// look live to the receiver. The source sequence is never mutated; every
/// emission gets its own copy.
#[derive(Debug, Clone)]
pub struct Rewriter {
    sensor_id: Option<String>,
    update_timestamp: bool,
}

impl Rewriter {
    pub fn new(sensor_id: Option<String>, update_timestamp: bool) -> Self {
        Self {
            sensor_id,
            update_timestamp,
        }
    }

    /// Rewrite one record using the current wall clock.
    pub fn rewrite(&self, record: &Record) -> Record {
        self.rewrite_at(record, now_epoch_secs())
    }

    /// Rewrite one record against an explicit clock reading.
    pub fn rewrite_at(&self, record: &Record, now: f64) -> Record {
        let mut out = record.clone();
        if self.update_timestamp {
            out.timestamp = now;
        }
        if let Some(id) = &self.sensor_id {
            out.sensor_id = id.clone();
        }
        out
    }
}

/// Current wall clock as fractional seconds since the Unix epoch
pub fn now_epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
