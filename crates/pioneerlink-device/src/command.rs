use std::sync::{Arc, Mutex, MutexGuard};

use bytes::BytesMut;
use pioneerlink_frame::{encode, CmdWatchdog, WireMessage};
use pioneerlink_transport::{RawSink, ReliableChannel};
use tracing::{debug, error, warn};

use crate::timesync::Clock;

const SEND_BUFFER_CAPACITY: usize = 64;

/// Outbound half of the command/reply channel.
pub trait CommandChannel: Send + Sync {
    /// Write `bytes`, returning how many were sent. `Ok(0)` means the
    /// channel suppressed the write.
    fn send_data(&self, bytes: &[u8]) -> pioneerlink_transport::Result<usize>;
}

impl CommandChannel for ReliableChannel {
    fn send_data(&self, bytes: &[u8]) -> pioneerlink_transport::Result<usize> {
        ReliableChannel::send_data(self, bytes)
    }
}

/// Serializes commands and sends them on the command channel.
///
/// May be called from several threads at once; sends are serialized through
/// the shared encode buffer.
pub struct CommandSender {
    channel: Arc<dyn CommandChannel>,
    buf: Mutex<BytesMut>,
    log: Arc<dyn RawSink>,
    echo: Arc<dyn RawSink>,
}

impl CommandSender {
    /// `log` receives every sent command; `echo` is the raw observation
    /// output.
    pub fn new(
        channel: Arc<dyn CommandChannel>,
        log: Arc<dyn RawSink>,
        echo: Arc<dyn RawSink>,
    ) -> Self {
        Self {
            channel,
            buf: Mutex::new(BytesMut::with_capacity(SEND_BUFFER_CAPACITY)),
            log,
            echo,
        }
    }

    /// Encode and send `msg`.
    ///
    /// Returns the bytes sent. `0` means nothing went out: the channel is
    /// disconnected or listen-only, or encoding or the write failed. Only
    /// sent commands reach the log and the echo.
    pub fn send<M: WireMessage>(&self, msg: &M) -> usize {
        let mut buf = lock(&self.buf);
        buf.clear();

        if let Err(err) = encode(msg, &mut buf) {
            error!(command = M::NAME, error = %err, "command serialization failed");
            return 0;
        }

        match self.channel.send_data(&buf) {
            Ok(0) => 0,
            Ok(sent) => {
                debug!(command = M::NAME, bytes = sent, "command sent");
                self.log.write(&buf);
                self.echo.write(&buf);
                sent
            }
            Err(err) => {
                warn!(command = M::NAME, error = %err, "command send failed");
                0
            }
        }
    }
}

/// Keep-alive sent on every heartbeat while the command channel is up.
///
/// One long-lived record; only `connection_duration` changes between
/// sends.
pub struct Watchdog {
    clock: Arc<dyn Clock>,
    started_ms: u64,
    record: Mutex<CmdWatchdog>,
}

impl Watchdog {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let started_ms = clock.epoch_ms();
        Self {
            clock,
            started_ms,
            record: Mutex::new(CmdWatchdog::default()),
        }
    }

    /// Refresh the elapsed seconds and send the record.
    pub fn tick(&self, sender: &CommandSender) -> usize {
        let mut record = lock(&self.record);
        let elapsed_s = self.clock.epoch_ms().saturating_sub(self.started_ms) / 1000;
        // Wraps like the vehicle's 16-bit counter.
        record.connection_duration = elapsed_s as i16;
        sender.send(&*record)
    }

    /// The record as last sent.
    pub fn record(&self) -> CmdWatchdog {
        *lock(&self.record)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
