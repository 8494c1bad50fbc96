//! punar-io - timeseries sensor record playback.
//!
//! Replays pre-recorded sensor records (CSV, JSON or CRLX files) onto the
//! network as if they were being produced live, for exercising downstream
//! data-acquisition software without real hardware.
//!
//! The playback engine is the core: a [`playback::StreamPlayer`] paces one
//! record sequence over one transport (TCP, UDP broadcast or UDP unicast),
//! rewriting timestamps and sensor ids at emission time; a
//! [`playback::PlaybackSupervisor`] runs many players concurrently with
//! per-stream failure isolation and cooperative shutdown.

pub mod config;
pub mod error;
pub mod formats;
pub mod playback;
pub mod record;

// Re-export commonly used types
pub use config::StreamConfig;
pub use error::{Error, Result};
pub use record::Record;
