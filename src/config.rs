//! YAML stream configuration.
//!
//! A document carries an optional `defaults` mapping and a `streams` section
//! that is either a mapping keyed by stream name or a sequence of entries
//! with a `name` field. Defaults fill in whatever fields an entry omits;
//! `name`, `file` and `port` identify a stream and cannot be defaulted.
//!
//! ```yaml
//! defaults:
//!   protocol: udp_unicast
//!   unicast_addr: 127.0.0.1
//!   interval: 0.5
//!
//! streams:
//!   gyro:
//!     file: data/gyro.csv
//!     port: 9090
//!   accel:
//!     file: data/accel.crlx
//!     port: 9091
//!     sensor_id: ACCEL_REPLAY
//! ```
//!
//! All validation happens here, once; the playback engine trusts every
//! [`StreamConfig`] it receives and re-checks nothing in the hot loop.

use crate::error::{Error, Result};
use crate::formats::Format;
use crate::playback::Target;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// One fully validated stream definition
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Unique stream name, used in logs and the final report
    pub name: String,
    /// Record file to replay
    pub file: PathBuf,
    /// Source file encoding
    pub format: Format,
    /// Where the records are sent
    pub target: Target,
    /// Replace every record's sensor_id with this value
    pub sensor_id: Option<String>,
    /// Rewrite timestamps to the wall clock at emission time
    pub update_timestamp: bool,
    /// Emit only the x,y,z data portion
    pub data_only: bool,
    /// Seconds between records, >= 0 and finite
    pub interval: f64,
    /// Wire encoding, when different from the source format
    pub wire_format: Option<Format>,
}

impl StreamConfig {
    /// Encoding used on the wire; defaults to the source format
    pub fn wire_format(&self) -> Format {
        self.wire_format.unwrap_or(self.format)
    }
}

/// Stream entry as written in YAML, before defaults and validation.
/// Unknown keys are rejected so a typo never silently drops a setting.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStream {
    name: Option<String>,
    file: Option<PathBuf>,
    format: Option<String>,
    protocol: Option<String>,
    host: Option<String>,
    broadcast_addr: Option<String>,
    unicast_addr: Option<String>,
    port: Option<u16>,
    sensor_id: Option<String>,
    update_timestamp: Option<bool>,
    data_only: Option<bool>,
    interval: Option<f64>,
    wire_format: Option<String>,
}

impl RawStream {
    /// Entry fields win; document defaults fill the rest. `name`, `file` and
    /// `port` identify a stream and are never inherited from defaults.
    fn merged_with(self, defaults: &RawStream) -> RawStream {
        RawStream {
            name: self.name,
            file: self.file,
            format: self.format.or_else(|| defaults.format.clone()),
            protocol: self.protocol.or_else(|| defaults.protocol.clone()),
            host: self.host.or_else(|| defaults.host.clone()),
            broadcast_addr: self.broadcast_addr.or_else(|| defaults.broadcast_addr.clone()),
            unicast_addr: self.unicast_addr.or_else(|| defaults.unicast_addr.clone()),
            port: self.port,
            sensor_id: self.sensor_id.or_else(|| defaults.sensor_id.clone()),
            update_timestamp: self.update_timestamp.or(defaults.update_timestamp),
            data_only: self.data_only.or(defaults.data_only),
            interval: self.interval.or(defaults.interval),
            wire_format: self.wire_format.or_else(|| defaults.wire_format.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    #[serde(default)]
    defaults: Option<RawStream>,
    streams: serde_yaml::Value,
}

/// Load and validate every stream in a YAML configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Vec<StreamConfig>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
    parse_config(&contents)
}

/// Parse and validate a YAML configuration document.
///
/// Stream order follows the document, so reports list streams the way the
/// file declares them.
pub fn parse_config(contents: &str) -> Result<Vec<StreamConfig>> {
    let doc: RawDocument = serde_yaml::from_str(contents)
        .map_err(|e| Error::Config(format!("invalid config: {}", e)))?;
    let defaults = doc.defaults.unwrap_or_default();
    if defaults.name.is_some() || defaults.file.is_some() || defaults.port.is_some() {
        return Err(Error::Config(
            "'name', 'file' and 'port' are per-stream settings and cannot be set in defaults"
                .to_string(),
        ));
    }

    let mut raw_streams = Vec::new();
    match doc.streams {
        serde_yaml::Value::Mapping(map) => {
            for (key, value) in map {
                let name = key
                    .as_str()
                    .ok_or_else(|| Error::Config("stream names must be strings".to_string()))?
                    .to_string();
                let mut raw: RawStream = serde_yaml::from_value(value)
                    .map_err(|e| Error::Config(format!("stream '{}': {}", name, e)))?;
                raw.name = Some(name);
                raw_streams.push(raw);
            }
        }
        serde_yaml::Value::Sequence(seq) => {
            for (i, value) in seq.into_iter().enumerate() {
                let raw: RawStream = serde_yaml::from_value(value)
                    .map_err(|e| Error::Config(format!("stream #{}: {}", i + 1, e)))?;
                raw_streams.push(raw);
            }
        }
        _ => {
            return Err(Error::Config(
                "'streams' must be a mapping or a sequence".to_string(),
            ));
        }
    }

    if raw_streams.is_empty() {
        return Err(Error::Config("no streams defined".to_string()));
    }

    let mut seen = HashSet::new();
    let mut streams = Vec::with_capacity(raw_streams.len());
    for raw in raw_streams {
        let config = validate_stream(raw.merged_with(&defaults))?;
        if !seen.insert(config.name.clone()) {
            return Err(Error::Config(format!(
                "duplicate stream name '{}'",
                config.name
            )));
        }
        streams.push(config);
    }
    Ok(streams)
}

fn validate_stream(raw: RawStream) -> Result<StreamConfig> {
    let name = match raw.name.as_deref() {
        Some(n) if !n.trim().is_empty() => n.to_string(),
        _ => return Err(Error::Config("stream entry is missing a name".to_string())),
    };
    let fail = |msg: String| Error::Config(format!("stream '{}': {}", name, msg));

    let file = raw.file.ok_or_else(|| fail("missing 'file'".to_string()))?;

    let format = match &raw.format {
        Some(s) => s.parse::<Format>().map_err(&fail)?,
        None => Format::from_path(&file).ok_or_else(|| {
            fail(format!(
                "cannot infer format from '{}', set 'format'",
                file.display()
            ))
        })?,
    };
    let wire_format = match &raw.wire_format {
        Some(s) => Some(s.parse::<Format>().map_err(&fail)?),
        None => None,
    };

    let port = match raw.port {
        Some(p) if p > 0 => p,
        Some(_) => return Err(fail("port must be nonzero".to_string())),
        None => return Err(fail("missing 'port'".to_string())),
    };

    let protocol = raw
        .protocol
        .ok_or_else(|| fail("missing 'protocol'".to_string()))?;
    let target = match protocol.as_str() {
        "tcp" => Target::Tcp {
            host: raw
                .host
                .ok_or_else(|| fail("tcp requires 'host'".to_string()))?,
            port,
        },
        "udp_broadcast" => Target::UdpBroadcast {
            addr: raw
                .broadcast_addr
                .ok_or_else(|| fail("udp_broadcast requires 'broadcast_addr'".to_string()))?,
            port,
        },
        "udp_unicast" => Target::UdpUnicast {
            addr: raw
                .unicast_addr
                .ok_or_else(|| fail("udp_unicast requires 'unicast_addr'".to_string()))?,
            port,
        },
        other => return Err(fail(format!("unknown protocol '{}'", other))),
    };

    let sensor_id = match raw.sensor_id {
        Some(s) if s.trim().is_empty() => {
            return Err(fail("sensor_id override must not be empty".to_string()));
        }
        other => other,
    };

    let interval = raw.interval.unwrap_or(1.0);
    if !interval.is_finite() || interval < 0.0 {
        return Err(fail(format!(
            "interval must be finite and >= 0, got {}",
            interval
        )));
    }

    Ok(StreamConfig {
        name,
        file,
        format,
        target,
        sensor_id,
        update_timestamp: raw.update_timestamp.unwrap_or(true),
        data_only: raw.data_only.unwrap_or(false),
        interval,
        wire_format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_streams_with_defaults() {
        let yaml = r#"
defaults:
  protocol: udp_unicast
  unicast_addr: 127.0.0.1
  interval: 0.5
  update_timestamp: false

streams:
  gyro:
    file: data/gyro.csv
    port: 9090
  accel:
    file: data/accel.crlx
    port: 9091
    interval: 2.0
    sensor_id: ACCEL_REPLAY
"#;
        let streams = parse_config(yaml).unwrap();
        assert_eq!(streams.len(), 2);

        // Document order preserved
        assert_eq!(streams[0].name, "gyro");
        assert_eq!(streams[1].name, "accel");

        // Inherited from defaults
        assert_eq!(
            streams[0].target,
            Target::UdpUnicast {
                addr: "127.0.0.1".to_string(),
                port: 9090
            }
        );
        assert_eq!(streams[0].interval, 0.5);
        assert!(!streams[0].update_timestamp);
        assert_eq!(streams[0].format, Format::Csv);

        // Entry overrides a default
        assert_eq!(streams[1].interval, 2.0);
        assert_eq!(streams[1].sensor_id.as_deref(), Some("ACCEL_REPLAY"));
        assert_eq!(streams[1].format, Format::Crlx);
    }

    #[test]
    fn test_sequence_streams() {
        let yaml = r#"
streams:
  - name: one
    file: a.json
    protocol: tcp
    host: 10.0.0.5
    port: 7000
  - name: two
    file: b.csv
    protocol: udp_broadcast
    broadcast_addr: 255.255.255.255
    port: 7001
"#;
        let streams = parse_config(yaml).unwrap();
        assert_eq!(streams[0].target, Target::Tcp { host: "10.0.0.5".to_string(), port: 7000 });
        assert_eq!(streams[0].format, Format::Json);
        assert!(matches!(streams[1].target, Target::UdpBroadcast { .. }));
        // Defaults applied when nothing else is given
        assert_eq!(streams[0].interval, 1.0);
        assert!(streams[0].update_timestamp);
        assert!(!streams[0].data_only);
    }

    #[test]
    fn test_explicit_format_and_wire_format() {
        let yaml = r#"
streams:
  cross:
    file: data/readings.dat
    format: crlx
    wire_format: json
    protocol: udp_unicast
    unicast_addr: 127.0.0.1
    port: 9000
"#;
        let streams = parse_config(yaml).unwrap();
        assert_eq!(streams[0].format, Format::Crlx);
        assert_eq!(streams[0].wire_format(), Format::Json);
    }

    #[test]
    fn test_wire_format_defaults_to_source_format() {
        let yaml = "streams:\n  s:\n    file: a.csv\n    protocol: udp_unicast\n    unicast_addr: 127.0.0.1\n    port: 9000\n";
        let streams = parse_config(yaml).unwrap();
        assert_eq!(streams[0].wire_format, None);
        assert_eq!(streams[0].wire_format(), Format::Csv);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let yaml = r#"
streams:
  - name: same
    file: a.csv
    protocol: udp_unicast
    unicast_addr: 127.0.0.1
    port: 9000
  - name: same
    file: b.csv
    protocol: udp_unicast
    unicast_addr: 127.0.0.1
    port: 9001
"#;
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate stream name 'same'"));
    }

    #[test]
    fn test_port_required_and_nonzero() {
        let base = "streams:\n  s:\n    file: a.csv\n    protocol: udp_unicast\n    unicast_addr: 127.0.0.1\n";
        let err = parse_config(base).unwrap_err();
        assert!(err.to_string().contains("missing 'port'"));

        let yaml = format!("{}    port: 0\n", base);
        let err = parse_config(&yaml).unwrap_err();
        assert!(err.to_string().contains("port must be nonzero"));
    }

    #[test]
    fn test_file_and_port_are_strictly_per_stream() {
        let yaml = "defaults:\n  port: 8089\n\nstreams:\n  s:\n    file: a.csv\n    protocol: udp_unicast\n    unicast_addr: 127.0.0.1\n    port: 9000\n";
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("cannot be set in defaults"));

        // An entry missing its own port gets no help from defaults
        let yaml = "defaults:\n  protocol: udp_unicast\n  unicast_addr: 127.0.0.1\n\nstreams:\n  s:\n    file: a.csv\n";
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("missing 'port'"));
    }

    #[test]
    fn test_protocol_specific_address_required() {
        let yaml = "streams:\n  s:\n    file: a.csv\n    protocol: tcp\n    port: 9000\n";
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("tcp requires 'host'"));

        let yaml = "streams:\n  s:\n    file: a.csv\n    protocol: udp_broadcast\n    port: 9000\n";
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("requires 'broadcast_addr'"));
    }

    #[test]
    fn test_unknown_protocol_rejected() {
        let yaml = "streams:\n  s:\n    file: a.csv\n    protocol: carrier_pigeon\n    port: 9000\n";
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("unknown protocol 'carrier_pigeon'"));
    }

    #[test]
    fn test_empty_sensor_id_rejected() {
        let yaml = "streams:\n  s:\n    file: a.csv\n    protocol: udp_unicast\n    unicast_addr: 127.0.0.1\n    port: 9000\n    sensor_id: \"\"\n";
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("sensor_id override must not be empty"));
    }

    #[test]
    fn test_negative_interval_rejected() {
        let yaml = "streams:\n  s:\n    file: a.csv\n    protocol: udp_unicast\n    unicast_addr: 127.0.0.1\n    port: 9000\n    interval: -1.0\n";
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("interval must be finite"));
    }

    #[test]
    fn test_unknown_extension_needs_explicit_format() {
        let yaml = "streams:\n  s:\n    file: a.dat\n    protocol: udp_unicast\n    unicast_addr: 127.0.0.1\n    port: 9000\n";
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("cannot infer format"));
    }

    #[test]
    fn test_empty_and_missing_streams_rejected() {
        assert!(parse_config("").is_err());
        assert!(parse_config("defaults:\n  interval: 1\n").is_err());
        assert!(parse_config("streams: {}\n").unwrap_err().to_string().contains("no streams"));
        assert!(parse_config("streams: 17\n").is_err());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let yaml = "streams:\n  s:\n    file: a.csv\n    protocol: udp_unicast\n    unicast_addr: 127.0.0.1\n    port: 9000\n    sensorid: oops\n";
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("sensorid"));
    }

    #[test]
    fn test_errors_name_the_stream() {
        let yaml = "streams:\n  lidar_replay:\n    protocol: udp_unicast\n    unicast_addr: 127.0.0.1\n    port: 9000\n";
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("stream 'lidar_replay'"));
        assert!(err.to_string().contains("missing 'file'"));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streams.yaml");
        std::fs::write(
            &path,
            "streams:\n  s:\n    file: a.csv\n    protocol: udp_unicast\n    unicast_addr: 127.0.0.1\n    port: 9000\n",
        )
        .unwrap();
        assert_eq!(load_config(&path).unwrap().len(), 1);
        assert!(load_config(dir.path().join("missing.yaml")).is_err());
    }
}
