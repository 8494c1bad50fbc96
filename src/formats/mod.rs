//! Record file formats: parsing from disk and wire encoding.

pub mod reader;
pub mod wire;

pub use reader::read_records;
pub use wire::{Serializer, create_serializer};

use std::path::Path;

/// Supported record encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Comma-separated values with a header line
    Csv,
    /// JSON: a document-level array, or one object per line
    Json,
    /// CRLX line format: comma-separated `key:value` fields
    Crlx,
}

impl Format {
    /// Infer the format from a file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Format> {
        let ext = path.extension()?.to_str()?;
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Format::Csv),
            "json" => Some(Format::Json),
            "crlx" => Some(Format::Crlx),
            _ => None,
        }
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            "crlx" => Ok(Format::Crlx),
            _ => Err(format!("unknown format '{}' (expected csv, json or crlx)", s)),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Format::Csv => "csv",
            Format::Json => "json",
            Format::Crlx => "crlx",
        })
    }
}
