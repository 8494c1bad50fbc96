//! Record file parsing.
//!
//! Reads a whole source file into an ordered record sequence up front. The
//! playback engine never touches the filesystem after this point.
//!
//! Every parser rejects records with an empty `sensor_id`; downstream code
//! relies on the identifier being present whether or not an override is
//! configured.

use crate::error::{Error, Result};
use crate::formats::Format;
use crate::record::Record;
use std::fs;
use std::path::Path;

/// Read all records from `path` in the given format, preserving file order.
pub fn read_records(path: &Path, format: Format) -> Result<Vec<Record>> {
    let contents = fs::read_to_string(path)?;
    match format {
        Format::Csv => parse_csv(path, &contents),
        Format::Json => parse_json(path, &contents),
        Format::Crlx => parse_crlx(path, &contents),
    }
}

fn parse_err(path: &Path, line: usize, reason: impl Into<String>) -> Error {
    Error::Parse {
        file: path.display().to_string(),
        line,
        reason: reason.into(),
    }
}

// ============================================================================
// CSV
// ============================================================================

/// Positions of the required columns within a CSV header.
struct CsvColumns {
    timestamp: usize,
    sensor_id: usize,
    x: usize,
    y: usize,
    z: usize,
}

fn parse_csv(path: &Path, contents: &str) -> Result<Vec<Record>> {
    let mut lines = contents.lines().enumerate();

    // First non-empty line is the header; columns are located by name so
    // extra columns and reordered files parse fine.
    let (header_line, header) = loop {
        match lines.next() {
            Some((_, l)) if l.trim().is_empty() => continue,
            Some((n, l)) => break (n, l),
            None => return Ok(Vec::new()),
        }
    };
    let columns =
        locate_columns(header).map_err(|reason| parse_err(path, header_line + 1, reason))?;

    let mut records = Vec::new();
    for (n, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let record =
            parse_csv_row(line, &columns).map_err(|reason| parse_err(path, n + 1, reason))?;
        records.push(record);
    }
    Ok(records)
}

fn locate_columns(header: &str) -> std::result::Result<CsvColumns, String> {
    let names: Vec<&str> = header.split(',').map(str::trim).collect();
    let find = |name: &str| {
        names
            .iter()
            .position(|c| *c == name)
            .ok_or_else(|| format!("missing column '{}'", name))
    };
    Ok(CsvColumns {
        timestamp: find("timestamp")?,
        sensor_id: find("sensor_id")?,
        x: find("x")?,
        y: find("y")?,
        z: find("z")?,
    })
}

fn parse_csv_row(line: &str, columns: &CsvColumns) -> std::result::Result<Record, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let text = |idx: usize| {
        fields
            .get(idx)
            .copied()
            .ok_or_else(|| "too few columns".to_string())
    };
    let number = |idx: usize, name: &str| {
        text(idx)?
            .parse::<f64>()
            .map_err(|e| format!("bad {}: {}", name, e))
    };
    let sensor_id = text(columns.sensor_id)?;
    if sensor_id.is_empty() {
        return Err("empty sensor_id".to_string());
    }
    Ok(Record {
        timestamp: number(columns.timestamp, "timestamp")?,
        sensor_id: sensor_id.to_string(),
        x: number(columns.x, "x")?,
        y: number(columns.y, "y")?,
        z: number(columns.z, "z")?,
    })
}

// ============================================================================
// JSON
// ============================================================================

fn parse_json(path: &Path, contents: &str) -> Result<Vec<Record>> {
    // A document-level array is parsed as a whole; everything else is
    // treated as JSON Lines, with a single whole-document object accepted
    // for one-record files.
    if contents.trim_start().starts_with('[') {
        let records = serde_json::from_str::<Vec<Record>>(contents)
            .map_err(|e| parse_err(path, e.line(), e.to_string()))?;
        if let Some(i) = records.iter().position(|r| r.sensor_id.trim().is_empty()) {
            return Err(parse_err(path, 1, format!("record {}: empty sensor_id", i + 1)));
        }
        return Ok(records);
    }
    if let Ok(record) = serde_json::from_str::<Record>(contents) {
        if record.sensor_id.trim().is_empty() {
            return Err(parse_err(path, 1, "empty sensor_id"));
        }
        return Ok(vec![record]);
    }

    let mut records = Vec::new();
    for (n, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: Record =
            serde_json::from_str(line).map_err(|e| parse_err(path, n + 1, e.to_string()))?;
        if record.sensor_id.trim().is_empty() {
            return Err(parse_err(path, n + 1, "empty sensor_id"));
        }
        records.push(record);
    }
    Ok(records)
}

// ============================================================================
// CRLX
// ============================================================================

fn parse_crlx(path: &Path, contents: &str) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for (n, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = parse_crlx_line(line).map_err(|reason| parse_err(path, n + 1, reason))?;
        records.push(record);
    }
    Ok(records)
}

/// Parse one `key:value` comma-separated CRLX line. Unknown keys are
/// ignored; all five known keys are required and sensor_id must be
/// non-empty.
fn parse_crlx_line(line: &str) -> std::result::Result<Record, String> {
    let mut timestamp = None;
    let mut sensor_id = None;
    let mut x = None;
    let mut y = None;
    let mut z = None;

    for field in line.split(',') {
        let field = field.trim();
        if field.is_empty() {
            continue;
        }
        let (key, value) = field
            .split_once(':')
            .ok_or_else(|| format!("field '{}' is not key:value", field))?;
        let (key, value) = (key.trim(), value.trim());
        let numeric = || {
            value
                .parse::<f64>()
                .map_err(|e| format!("bad {}: {}", key, e))
        };
        match key {
            "timestamp" => timestamp = Some(numeric()?),
            "x" => x = Some(numeric()?),
            "y" => y = Some(numeric()?),
            "z" => z = Some(numeric()?),
            "sensor_id" => {
                if value.is_empty() {
                    return Err("empty sensor_id".to_string());
                }
                sensor_id = Some(value.to_string());
            }
            _ => {}
        }
    }

    Ok(Record {
        timestamp: timestamp.ok_or("missing timestamp")?,
        sensor_id: sensor_id.ok_or("missing sensor_id")?,
        x: x.ok_or("missing x")?,
        y: y.ok_or("missing y")?,
        z: z.ok_or("missing z")?,
    })
}
