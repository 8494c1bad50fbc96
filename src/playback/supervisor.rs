//! Concurrent stream supervision.
//!
//! The supervisor owns every stream player of one playback session. Each
//! player runs on its own named OS thread so streams pace themselves
//! independently; a slow or failing transport never stalls another stream.
//! Shutdown is cooperative: one shared flag, polled by every player.

use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::formats::{create_serializer, read_records};
use crate::playback::player::{StreamOutcome, StreamPlayer};
use crate::playback::rewrite::Rewriter;
use crate::playback::transport::create_transport;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default time allowed for players to wind down after `stop`
const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// Per-stream terminal result, in start order
#[derive(Debug)]
pub struct StreamResult {
    pub name: String,
    pub outcome: StreamOutcome,
}

/// Aggregated results of one playback session
#[derive(Debug, Default)]
pub struct PlaybackReport {
    pub streams: Vec<StreamResult>,
}

impl PlaybackReport {
    /// Total records sent across all streams
    pub fn total_records(&self) -> u64 {
        self.streams.iter().map(|s| s.outcome.records_sent()).sum()
    }

    /// True when every stream completed its full sequence
    pub fn all_completed(&self) -> bool {
        self.streams
            .iter()
            .all(|s| matches!(s.outcome, StreamOutcome::Completed { .. }))
    }
}

enum StreamEntry {
    /// Player thread spawned and possibly still running
    Running {
        name: String,
        handle: JoinHandle<StreamOutcome>,
    },
    /// Construction failed before the player could start
    Finished {
        name: String,
        outcome: StreamOutcome,
    },
}

/// Runs many stream players concurrently with failure isolation.
///
/// `start` spawns one thread per stream; a stream whose records cannot be
/// loaded (or whose thread cannot be spawned) is recorded as failed without
/// preventing the others from starting. `wait` blocks until every stream
/// finishes naturally; `stop` raises the shared cancellation flag and waits
/// up to a grace period, reporting any player that ignored it as stalled.
pub struct PlaybackSupervisor {
    cancel: Arc<AtomicBool>,
    grace: Duration,
    streams: Vec<StreamEntry>,
}

impl PlaybackSupervisor {
    pub fn new() -> Self {
        Self {
            cancel: Arc::new(AtomicBool::new(false)),
            grace: DEFAULT_STOP_GRACE,
            streams: Vec::new(),
        }
    }

    /// Replace the shutdown grace period
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// The shared cancellation flag. Storing `true` asks every player to
    /// finish its current record and stop.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Start one player per stream config, all concurrently.
    ///
    /// Start order is preserved in the final report. Failures here are
    /// per-stream: a bad entry becomes a failed result, the rest proceed.
    pub fn start(&mut self, configs: Vec<StreamConfig>) {
        for config in configs {
            let name = config.name.clone();
            match self.spawn_stream(config) {
                Ok(handle) => self.streams.push(StreamEntry::Running { name, handle }),
                Err(error) => {
                    log::error!("[{}] failed to start: {}", name, error);
                    self.streams.push(StreamEntry::Finished {
                        name,
                        outcome: StreamOutcome::Failed {
                            records_sent: 0,
                            error,
                        },
                    });
                }
            }
        }
    }

    fn spawn_stream(&self, config: StreamConfig) -> Result<JoinHandle<StreamOutcome>> {
        let interval = Duration::try_from_secs_f64(config.interval)
            .map_err(|e| Error::Config(format!("bad interval {}: {}", config.interval, e)))?;
        let records = read_records(&config.file, config.format)?;
        log::info!(
            "[{}] loaded {} records from {}",
            config.name,
            records.len(),
            config.file.display()
        );

        let mut player = StreamPlayer::new(
            config.name.clone(),
            records,
            create_transport(&config.target),
            Rewriter::new(config.sensor_id.clone(), config.update_timestamp),
            create_serializer(config.wire_format(), config.data_only),
            interval,
            Arc::clone(&self.cancel),
        );

        let handle = thread::Builder::new()
            .name(format!("stream-{}", config.name))
            .spawn(move || player.run())?;
        Ok(handle)
    }

    /// Block until every stream reaches a terminal state on its own.
    pub fn wait(&mut self) -> PlaybackReport {
        let mut report = PlaybackReport::default();
        for entry in self.streams.drain(..) {
            report.streams.push(match entry {
                StreamEntry::Running { name, handle } => {
                    let outcome = join_outcome(&name, handle);
                    StreamResult { name, outcome }
                }
                StreamEntry::Finished { name, outcome } => StreamResult { name, outcome },
            });
        }
        report
    }

    /// Raise the cancellation flag and wait up to the grace period for all
    /// players to wind down. A player still running when the grace period
    /// expires is reported as stalled and its thread abandoned.
    pub fn stop(&mut self) -> PlaybackReport {
        self.cancel.store(true, Ordering::Relaxed);

        let deadline = Instant::now() + self.grace;
        loop {
            let pending = self.streams.iter().any(|entry| match entry {
                StreamEntry::Running { handle, .. } => !handle.is_finished(),
                StreamEntry::Finished { .. } => false,
            });
            if !pending || Instant::now() >= deadline {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }

        let mut report = PlaybackReport::default();
        for entry in self.streams.drain(..) {
            report.streams.push(match entry {
                StreamEntry::Running { name, handle } => {
                    if handle.is_finished() {
                        let outcome = join_outcome(&name, handle);
                        StreamResult { name, outcome }
                    } else {
                        log::warn!(
                            "[{}] did not stop within {:?}, abandoning thread",
                            name,
                            self.grace
                        );
                        StreamResult {
                            name,
                            outcome: StreamOutcome::Stalled,
                        }
                    }
                }
                StreamEntry::Finished { name, outcome } => StreamResult { name, outcome },
            });
        }
        report
    }
}

impl Default for PlaybackSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PlaybackSupervisor {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        for entry in self.streams.drain(..) {
            if let StreamEntry::Running { handle, .. } = entry {
                let _ = handle.join();
            }
        }
    }
}

fn join_outcome(name: &str, handle: JoinHandle<StreamOutcome>) -> StreamOutcome {
    match handle.join() {
        Ok(outcome) => outcome,
        Err(_) => {
            log::error!("[{}] player thread panicked", name);
            StreamOutcome::Failed {
                records_sent: 0,
                error: Error::Other("player thread panicked".to_string()),
            }
        }
    }
}
