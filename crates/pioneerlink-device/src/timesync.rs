use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pioneerlink_frame::CmdSetSystemTime;
use tracing::{debug, info, warn};

/// Divergence between local and device clocks that triggers a correction.
pub const DRIFT_THRESHOLD_MS: u64 = 1100;
/// Minimum spacing between corrections.
pub const CORRECTION_INTERVAL: Duration = Duration::from_secs(5);

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn epoch_ms(&self) -> u64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Rate-limited correction of the vehicle clock.
///
/// Fed with the device clock of every telemetry record that carries one.
pub struct TimeSync {
    clock: Arc<dyn Clock>,
    last_correction: Mutex<Option<u64>>,
}

impl TimeSync {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last_correction: Mutex::new(None),
        }
    }

    /// Offer a device timestamp.
    ///
    /// When the clocks diverge by more than [`DRIFT_THRESHOLD_MS`] and no
    /// correction went out in the last [`CORRECTION_INTERVAL`], `send` is
    /// called with the local epoch seconds. The correction time is recorded
    /// only if `send` reports bytes written. Returns the bytes sent.
    ///
    /// Local times past the range of the 32-bit seconds field are never sent.
    pub fn offer<F>(&self, device_ms: u64, send: F) -> usize
    where
        F: FnOnce(&CmdSetSystemTime) -> usize,
    {
        let mut last = self
            .last_correction
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let now_ms = self.clock.epoch_ms();

        if let Some(previous) = *last {
            if now_ms.saturating_sub(previous) < CORRECTION_INTERVAL.as_millis() as u64 {
                return 0;
            }
        }

        let drift = now_ms.abs_diff(device_ms);
        if drift <= DRIFT_THRESHOLD_MS {
            return 0;
        }

        let unix_timestamp = match i32::try_from(now_ms / 1000) {
            Ok(seconds) => seconds,
            Err(_) => {
                warn!(now_ms, "local time does not fit the vehicle clock field");
                return 0;
            }
        };
        let command = CmdSetSystemTime { unix_timestamp };
        debug!(drift_ms = drift, "vehicle clock diverged");
        let sent = send(&command);
        if sent > 0 {
            info!(
                unix_timestamp = command.unix_timestamp,
                drift_ms = drift,
                "vehicle clock corrected"
            );
            *last = Some(now_ms);
        }
        sent
    }

    /// Epoch ms of the last correction that was sent.
    pub fn last_correction(&self) -> Option<u64> {
        *self
            .last_correction
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    /// Clock advanced by hand.
    #[derive(Debug, Default)]
    pub(crate) struct ManualClock(AtomicU64);

    impl ManualClock {
        pub(crate) fn at(ms: u64) -> Arc<Self> {
            Arc::new(Self(AtomicU64::new(ms)))
        }

        pub(crate) fn advance(&self, ms: u64) {
            self.0.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn epoch_ms(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    const NOW: u64 = 1_700_000_000_000;

    #[test]
    fn small_drift_sends_nothing() {
        let sync = TimeSync::new(ManualClock::at(NOW));
        let sent = sync.offer(NOW - 1100, |_| panic!("should not send"));
        assert_eq!(sent, 0);
        assert_eq!(sync.last_correction(), None);
    }

    #[test]
    fn large_drift_sends_local_seconds() {
        let sync = TimeSync::new(ManualClock::at(NOW + 500));
        let mut seen = None;
        let sent = sync.offer(NOW - 5_000, |cmd| {
            seen = Some(*cmd);
            5
        });
        assert_eq!(sent, 5);
        assert_eq!(
            seen,
            Some(CmdSetSystemTime {
                unix_timestamp: 1_700_000_000
            })
        );
        assert_eq!(sync.last_correction(), Some(NOW + 500));
    }

    #[test]
    fn device_ahead_of_local_also_counts() {
        let sync = TimeSync::new(ManualClock::at(NOW));
        assert_eq!(sync.offer(NOW + 2_000, |_| 5), 5);
    }

    #[test]
    fn two_frames_two_seconds_apart_send_once() {
        let clock = ManualClock::at(NOW);
        let sync = TimeSync::new(clock.clone());
        let mut sends = 0;

        sync.offer(0, |_| {
            sends += 1;
            5
        });
        clock.advance(2_000);
        sync.offer(0, |_| {
            sends += 1;
            5
        });
        assert_eq!(sends, 1);

        clock.advance(3_000);
        sync.offer(0, |_| {
            sends += 1;
            5
        });
        assert_eq!(sends, 2);
    }

    #[test]
    fn unsent_correction_is_not_recorded() {
        let clock = ManualClock::at(NOW);
        let sync = TimeSync::new(clock.clone());
        assert_eq!(sync.offer(0, |_| 0), 0);
        assert_eq!(sync.last_correction(), None);

        clock.advance(100);
        assert_eq!(sync.offer(0, |_| 5), 5);
    }

    #[test]
    fn local_time_past_2038_is_not_sent() {
        let past_range = (i32::MAX as u64 + 10) * 1000;
        let sync = TimeSync::new(ManualClock::at(past_range));
        let sent = sync.offer(NOW, |_| panic!("should not send"));
        assert_eq!(sent, 0);
        assert_eq!(sync.last_correction(), None);
    }

    #[test]
    fn last_second_of_the_field_is_still_sent() {
        let sync = TimeSync::new(ManualClock::at(i32::MAX as u64 * 1000 + 999));
        let mut seen = None;
        sync.offer(NOW, |cmd| {
            seen = Some(cmd.unix_timestamp);
            5
        });
        assert_eq!(seen, Some(i32::MAX));
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.epoch_ms() > 1_577_836_800_000);
    }
}
