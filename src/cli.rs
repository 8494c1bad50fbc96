//! Command-line interface.
//!
//! Two subcommands mirror the two supervisor modes: `stream` replays a
//! single record file from direct arguments, `config` replays every stream
//! defined in a YAML file.

use clap::{Args, Parser, Subcommand};
use punar_io::config::StreamConfig;
use punar_io::error::{Error, Result};
use punar_io::formats::Format;
use punar_io::playback::Target;
use std::path::PathBuf;

/// Replay recorded timeseries sensor data over TCP or UDP
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a single record file
    Stream(StreamArgs),
    /// Replay every stream defined in a YAML config file
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct StreamArgs {
    /// Record file to replay
    #[arg(short, long)]
    pub file: PathBuf,

    /// Transport protocol: tcp, udp_broadcast or udp_unicast
    #[arg(short, long)]
    pub protocol: String,

    /// Destination port
    #[arg(long)]
    pub port: u16,

    /// TCP host to connect to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Broadcast address for udp_broadcast
    #[arg(long, default_value = "255.255.255.255")]
    pub broadcast_addr: String,

    /// Unicast address for udp_unicast
    #[arg(long)]
    pub unicast_addr: Option<String>,

    /// Replace every record's sensor_id with this value
    #[arg(long)]
    pub sensor_id: Option<String>,

    /// Keep recorded timestamps instead of rewriting them to now
    #[arg(long)]
    pub no_update_timestamp: bool,

    /// Send only the x,y,z data portion of each record
    #[arg(long)]
    pub data_only: bool,

    /// Seconds between records
    #[arg(short, long, default_value_t = 1.0)]
    pub interval: f64,

    /// Source format: csv, json or crlx (inferred from the extension if omitted)
    #[arg(long)]
    pub format: Option<String>,

    /// Wire format, when different from the source format
    #[arg(long)]
    pub wire_format: Option<String>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// YAML config file defining the streams
    #[arg(short, long)]
    pub config: PathBuf,
}

impl StreamArgs {
    /// Build the single validated stream definition this invocation
    /// describes. The stream is named after the file stem.
    pub fn into_stream_config(self) -> Result<StreamConfig> {
        if !self.file.exists() {
            return Err(Error::Config(format!(
                "file not found: {}",
                self.file.display()
            )));
        }
        let name = self
            .file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("stream")
            .to_string();

        let format = match &self.format {
            Some(s) => s.parse::<Format>().map_err(Error::Config)?,
            None => Format::from_path(&self.file).ok_or_else(|| {
                Error::Config(format!(
                    "cannot infer format from '{}', pass --format",
                    self.file.display()
                ))
            })?,
        };
        let wire_format = match &self.wire_format {
            Some(s) => Some(s.parse::<Format>().map_err(Error::Config)?),
            None => None,
        };

        if self.port == 0 {
            return Err(Error::Config("port must be nonzero".to_string()));
        }
        let target = match self.protocol.as_str() {
            "tcp" => Target::Tcp {
                host: self.host,
                port: self.port,
            },
            "udp_broadcast" => Target::UdpBroadcast {
                addr: self.broadcast_addr,
                port: self.port,
            },
            "udp_unicast" => Target::UdpUnicast {
                addr: self.unicast_addr.ok_or_else(|| {
                    Error::Config("udp_unicast requires --unicast-addr".to_string())
                })?,
                port: self.port,
            },
            other => return Err(Error::Config(format!("unknown protocol '{}'", other))),
        };

        if let Some(id) = &self.sensor_id {
            if id.trim().is_empty() {
                return Err(Error::Config(
                    "sensor_id override must not be empty".to_string(),
                ));
            }
        }
        if !self.interval.is_finite() || self.interval < 0.0 {
            return Err(Error::Config(format!(
                "interval must be finite and >= 0, got {}",
                self.interval
            )));
        }

        Ok(StreamConfig {
            name,
            file: self.file,
            format,
            target,
            sensor_id: self.sensor_id,
            update_timestamp: !self.no_update_timestamp,
            data_only: self.data_only,
            interval: self.interval,
            wire_format,
        })
    }
}
