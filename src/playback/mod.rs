//! The playback engine.
//!
//! [`StreamPlayer`] paces one record sequence over one [`Transport`];
//! [`PlaybackSupervisor`] runs many players concurrently with per-stream
//! failure isolation and cooperative shutdown.

pub mod player;
pub mod rewrite;
pub mod supervisor;
pub mod transport;

pub use player::{PlayerState, StreamOutcome, StreamPlayer};
pub use rewrite::{Rewriter, now_epoch_secs};
pub use supervisor::{PlaybackReport, PlaybackSupervisor, StreamResult};
pub use transport::{Target, Transport, create_transport};
