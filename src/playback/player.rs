//! Single-stream playback loop.
//!
//! A [`StreamPlayer`] owns one transport, one record sequence and one pacing
//! policy, and drives them through the stream lifecycle:
//!
//! ```text
//!           open          cancel observed
//!  Idle ──► Running ─────► Stopping ──► Stopped
//!    │         │                          ▲
//!    │         ├──────────────────────────┘ (sequence exhausted)
//!    │         ▼
//!    └──►  Failed   (fatal open or send error)
//! ```
//!
//! Pacing is deadline-based: the next emission target is
//! `previous_target + interval`, never `now + interval`, so per-record
//! jitter does not accumulate across a long sequence.

use crate::error::Error;
use crate::formats::Serializer;
use crate::playback::rewrite::Rewriter;
use crate::playback::transport::Transport;
use crate::record::Record;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Consecutive datagram send failures tolerated before the stream fails.
/// Guards against a persistently broken network path while letting the
/// occasional dropped datagram pass.
const MAX_CONSECUTIVE_SEND_FAILURES: u32 = 3;

/// Poll granularity of the pacing sleep; bounds cancellation latency.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Lifecycle state of one stream player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Running,
    Stopping,
    Stopped,
    Failed,
}

/// Terminal result of one stream
#[derive(Debug)]
pub enum StreamOutcome {
    /// Every record was emitted
    Completed { records_sent: u64 },
    /// Cancellation was observed before the sequence finished
    Cancelled { records_sent: u64 },
    /// A fatal error ended the stream early
    Failed { records_sent: u64, error: Error },
    /// The player missed the shutdown grace period and was abandoned.
    /// Only the supervisor constructs this.
    Stalled,
}

impl StreamOutcome {
    /// Records that made it onto the wire before the stream ended
    pub fn records_sent(&self) -> u64 {
        match self {
            StreamOutcome::Completed { records_sent }
            | StreamOutcome::Cancelled { records_sent }
            | StreamOutcome::Failed { records_sent, .. } => *records_sent,
            StreamOutcome::Stalled => 0,
        }
    }
}

/// Plays one record sequence over one transport at a fixed interval.
pub struct StreamPlayer {
    name: String,
    records: Vec<Record>,
    transport: Box<dyn Transport>,
    rewriter: Rewriter,
    serializer: Serializer,
    interval: Duration,
    cancel: Arc<AtomicBool>,
    state: PlayerState,
}

impl StreamPlayer {
    pub fn new(
        name: impl Into<String>,
        records: Vec<Record>,
        transport: Box<dyn Transport>,
        rewriter: Rewriter,
        serializer: Serializer,
        interval: Duration,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            name: name.into(),
            records,
            transport,
            rewriter,
            serializer,
            interval,
            cancel,
            state: PlayerState::Idle,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    /// Run the stream to a terminal state.
    ///
    /// Blocks until every record has been emitted, cancellation is observed,
    /// or a fatal error occurs. The transport is released before returning,
    /// whatever the outcome.
    pub fn run(&mut self) -> StreamOutcome {
        let outcome = self.play();
        self.transport.close();
        self.state = match outcome {
            StreamOutcome::Failed { .. } => PlayerState::Failed,
            _ => PlayerState::Stopped,
        };
        match &outcome {
            StreamOutcome::Completed { records_sent } => {
                log::info!("[{}] completed ({} records)", self.name, records_sent);
            }
            StreamOutcome::Cancelled { records_sent } => {
                log::info!("[{}] cancelled after {} records", self.name, records_sent);
            }
            StreamOutcome::Failed { records_sent, error } => {
                log::error!("[{}] failed after {} records: {}", self.name, records_sent, error);
            }
            StreamOutcome::Stalled => {}
        }
        outcome
    }

    fn play(&mut self) -> StreamOutcome {
        let mut records_sent = 0u64;

        if let Err(error) = self.transport.open() {
            return StreamOutcome::Failed { records_sent, error };
        }
        self.state = PlayerState::Running;
        log::info!(
            "[{}] streaming {} records to {} every {:?}",
            self.name,
            self.records.len(),
            self.transport.target(),
            self.interval
        );

        let datagram = self.transport.target().is_datagram();
        let mut consecutive_failures = 0u32;
        let mut next_deadline = Instant::now();

        for i in 0..self.records.len() {
            if self.cancel.load(Ordering::Relaxed) {
                self.state = PlayerState::Stopping;
                return StreamOutcome::Cancelled { records_sent };
            }

            let record = self.rewriter.rewrite(&self.records[i]);
            match self.serializer.serialize(&record) {
                Ok(payload) => match self.transport.send(&payload) {
                    Ok(()) => {
                        consecutive_failures = 0;
                        records_sent += 1;
                        log::trace!("[{}] sent record {}", self.name, i);
                    }
                    Err(error) if datagram => {
                        // Datagram send errors are not fatal on their own
                        consecutive_failures += 1;
                        log::warn!("[{}] send failed (record {}): {}", self.name, i, error);
                        if consecutive_failures >= MAX_CONSECUTIVE_SEND_FAILURES {
                            return StreamOutcome::Failed { records_sent, error };
                        }
                    }
                    Err(error) => {
                        return StreamOutcome::Failed { records_sent, error };
                    }
                },
                Err(error) => {
                    // Malformed record: skip it, the stream goes on
                    log::warn!("[{}] skipping record {}: {}", self.name, i, error);
                }
            }

            next_deadline += self.interval;
            if self.sleep_until(next_deadline) {
                self.state = PlayerState::Stopping;
                return StreamOutcome::Cancelled { records_sent };
            }
        }

        StreamOutcome::Completed { records_sent }
    }

    /// Sleep until `deadline`, polling the cancellation flag. Returns true
    /// when cancellation was observed.
    fn sleep_until(&self, deadline: Instant) -> bool {
        loop {
            if self.cancel.load(Ordering::Relaxed) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep((deadline - now).min(CANCEL_POLL_INTERVAL));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{Format, create_serializer};
    use crate::playback::transport::Target;
    use std::sync::Mutex;

    /// Script of send results for the mock transport.
    #[derive(Clone)]
    enum SendScript {
        Ok,
        FailAlways,
        FailFirst(u32),
    }

    struct MockTransport {
        target: Target,
        script: SendScript,
        sends: u32,
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
        open_fails: bool,
        closed: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(target: Target, script: SendScript) -> (Self, Arc<Mutex<Vec<Vec<u8>>>>) {
            let sent = Arc::new(Mutex::new(Vec::new()));
            let transport = Self {
                target,
                script,
                sends: 0,
                sent: Arc::clone(&sent),
                open_fails: false,
                closed: Arc::new(AtomicBool::new(false)),
            };
            (transport, sent)
        }

        fn io_err(&self) -> Error {
            Error::Send {
                target: self.target.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "mock failure"),
            }
        }
    }

    impl Transport for MockTransport {
        fn open(&mut self) -> Result<(), Error> {
            if self.open_fails {
                return Err(Error::Connection {
                    target: self.target.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "mock"),
                });
            }
            Ok(())
        }

        fn send(&mut self, payload: &[u8]) -> Result<(), Error> {
            self.sends += 1;
            let fail = match self.script {
                SendScript::Ok => false,
                SendScript::FailAlways => true,
                SendScript::FailFirst(n) => self.sends <= n,
            };
            if fail {
                return Err(self.io_err());
            }
            self.sent.lock().unwrap().push(payload.to_vec());
            Ok(())
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::Relaxed);
        }

        fn target(&self) -> &Target {
            &self.target
        }
    }

    fn udp_target() -> Target {
        Target::UdpUnicast {
            addr: "127.0.0.1".to_string(),
            port: 9090,
        }
    }

    fn tcp_target() -> Target {
        Target::Tcp {
            host: "127.0.0.1".to_string(),
            port: 9090,
        }
    }

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::new(1000.0 + i as f64, format!("s{}", i), 1.0, 2.0, 3.0))
            .collect()
    }

    fn player(records: Vec<Record>, transport: MockTransport, cancel: Arc<AtomicBool>) -> StreamPlayer {
        StreamPlayer::new(
            "test",
            records,
            Box::new(transport),
            Rewriter::new(None, false),
            create_serializer(Format::Crlx, false),
            Duration::ZERO,
            cancel,
        )
    }

    #[test]
    fn test_completes_and_counts_records() {
        let (transport, sent) = MockTransport::new(udp_target(), SendScript::Ok);
        let closed = Arc::clone(&transport.closed);
        let mut player = player(records(4), transport, Arc::new(AtomicBool::new(false)));
        let outcome = player.run();
        assert!(matches!(outcome, StreamOutcome::Completed { records_sent: 4 }));
        assert_eq!(player.state(), PlayerState::Stopped);
        assert!(closed.load(Ordering::Relaxed), "transport must be released");
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 4);
        assert!(sent[0].ends_with(b"\n"));
    }

    #[test]
    fn test_empty_sequence_completes_immediately() {
        let (transport, _) = MockTransport::new(udp_target(), SendScript::Ok);
        let mut player = player(records(0), transport, Arc::new(AtomicBool::new(false)));
        assert!(matches!(player.run(), StreamOutcome::Completed { records_sent: 0 }));
    }

    #[test]
    fn test_open_failure_is_fatal() {
        let (mut transport, _) = MockTransport::new(tcp_target(), SendScript::Ok);
        transport.open_fails = true;
        let closed = Arc::clone(&transport.closed);
        let mut player = player(records(3), transport, Arc::new(AtomicBool::new(false)));
        let outcome = player.run();
        match outcome {
            StreamOutcome::Failed { records_sent, error } => {
                assert_eq!(records_sent, 0);
                assert!(matches!(error, Error::Connection { .. }));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(player.state(), PlayerState::Failed);
        assert!(closed.load(Ordering::Relaxed), "transport released on failure too");
    }

    #[test]
    fn test_tcp_send_failure_is_immediately_fatal() {
        let (transport, _) = MockTransport::new(tcp_target(), SendScript::FailAlways);
        let mut player = player(records(5), transport, Arc::new(AtomicBool::new(false)));
        let outcome = player.run();
        assert!(matches!(outcome, StreamOutcome::Failed { records_sent: 0, .. }));
    }

    #[test]
    fn test_datagram_tolerates_sporadic_send_failures() {
        // Two failures in a row, then success: under the threshold of three
        let (transport, sent) = MockTransport::new(udp_target(), SendScript::FailFirst(2));
        let mut player = player(records(5), transport, Arc::new(AtomicBool::new(false)));
        let outcome = player.run();
        assert!(matches!(outcome, StreamOutcome::Completed { records_sent: 3 }));
        assert_eq!(sent.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_datagram_escalates_after_three_consecutive_failures() {
        let (transport, _) = MockTransport::new(udp_target(), SendScript::FailAlways);
        let mut player = player(records(10), transport, Arc::new(AtomicBool::new(false)));
        let outcome = player.run();
        assert!(matches!(outcome, StreamOutcome::Failed { records_sent: 0, .. }));
    }

    #[test]
    fn test_encode_failure_skips_record_only() {
        let mut recs = records(3);
        recs[1].x = f64::NAN;
        let (transport, sent) = MockTransport::new(udp_target(), SendScript::Ok);
        let mut player = player(recs, transport, Arc::new(AtomicBool::new(false)));
        let outcome = player.run();
        assert!(matches!(outcome, StreamOutcome::Completed { records_sent: 2 }));
        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_pre_cancelled_player_sends_nothing() {
        let (transport, sent) = MockTransport::new(udp_target(), SendScript::Ok);
        let mut player = player(records(3), transport, Arc::new(AtomicBool::new(true)));
        let outcome = player.run();
        assert!(matches!(outcome, StreamOutcome::Cancelled { records_sent: 0 }));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_pacing_sleeps_after_every_record() {
        let (transport, _) = MockTransport::new(udp_target(), SendScript::Ok);
        let mut player = StreamPlayer::new(
            "paced",
            records(5),
            Box::new(transport),
            Rewriter::new(None, false),
            create_serializer(Format::Crlx, false),
            Duration::from_millis(20),
            Arc::new(AtomicBool::new(false)),
        );
        let start = Instant::now();
        let outcome = player.run();
        let elapsed = start.elapsed();
        assert!(matches!(outcome, StreamOutcome::Completed { records_sent: 5 }));
        // 5 records x 20ms, and no runaway drift
        assert!(elapsed >= Duration::from_millis(95), "too fast: {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(500), "too slow: {:?}", elapsed);
    }
}
