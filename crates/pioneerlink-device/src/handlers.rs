//! Per-channel handlers for decoded records.

use std::sync::Arc;

use pioneerlink_frame::{MessageHandler, Reply, Telemetry};
use tracing::{debug, warn};

use crate::bus::Publisher;
use crate::command::CommandSender;
use crate::config::SharedConfig;
use crate::timesync::TimeSync;
use crate::translate::measurements_from_v2;

/// Handles records from the telemetry channel.
///
/// Every record carrying a device clock is first offered to time sync, then
/// translated and published.
pub struct TelemetryHandler {
    config: SharedConfig,
    publisher: Arc<dyn Publisher>,
    commands: Arc<CommandSender>,
    time_sync: TimeSync,
}

impl TelemetryHandler {
    pub fn new(
        config: SharedConfig,
        publisher: Arc<dyn Publisher>,
        commands: Arc<CommandSender>,
        time_sync: TimeSync,
    ) -> Self {
        Self {
            config,
            publisher,
            commands,
            time_sync,
        }
    }

    pub fn time_sync(&self) -> &TimeSync {
        &self.time_sync
    }

    fn sync_clock(&self, device_ms: u64) {
        let config = self.config.get();
        if !config.set_time || config.listen_only {
            return;
        }
        self.time_sync
            .offer(device_ms, |command| self.commands.send(command));
    }
}

impl MessageHandler<Telemetry> for TelemetryHandler {
    fn on_message(&self, message: Telemetry) {
        if let Some(device_ms) = message.device_time_ms() {
            self.sync_clock(device_ms);
        }

        match message {
            Telemetry::V1(t) => {
                debug!(battery_voltage = t.battery_voltage, depth_mm = t.depth, "telemetry v1");
            }
            Telemetry::V2(t) => {
                debug!(depth_mm = t.depth, "telemetry v2");
                let synthetic = self.config.get().synthetic_state;
                for measurement in measurements_from_v2(&t, synthetic) {
                    let kind = measurement.kind();
                    if let Err(err) = self.publisher.publish(measurement) {
                        warn!(kind, error = %err, "publish failed");
                    }
                }
            }
            Telemetry::CompassCalibration(c) => {
                debug!(
                    progress_x = c.progress_x,
                    progress_y = c.progress_y,
                    progress_z = c.progress_z,
                    progress_thruster = c.progress_thruster,
                    "compass calibration"
                );
            }
        }
    }
}

/// Handles records from the command/reply channel. Replies are logged only.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplyHandler;

impl MessageHandler<Reply> for ReplyHandler {
    fn on_message(&self, message: Reply) {
        match message {
            Reply::Ack(ack) => {
                debug!(
                    acked_code = ack.acked_code,
                    status = ack.status,
                    "command acknowledged"
                );
            }
            Reply::Ping(ping) => {
                debug!(sequence = ping.sequence, uptime_s = ping.uptime, "ping reply");
            }
            Reply::CameraParameters(params) => {
                debug!(
                    camera = params.camera,
                    camera_bitrate = params.bitrate,
                    "camera parameters"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pioneerlink_frame::{CompassCalibrationV2, TelemetryV1, TelemetryV2};
    use pioneerlink_transport::DiscardSink;

    use super::*;
    use crate::bus::Measurement;
    use crate::command::tests::FakeChannel;
    use crate::config::LinkConfig;
    use crate::error::LinkError;
    use crate::timesync::tests::ManualClock;

    const NOW: u64 = 1_700_000_000_000;

    struct Fixture {
        handler: TelemetryHandler,
        channel: Arc<FakeChannel>,
        clock: Arc<ManualClock>,
        published: Arc<Mutex<Vec<Measurement>>>,
    }

    fn fixture(config: LinkConfig) -> Fixture {
        let channel = FakeChannel::connected();
        let commands = Arc::new(CommandSender::new(
            channel.clone(),
            Arc::new(DiscardSink),
            Arc::new(DiscardSink),
        ));
        let published = Arc::new(Mutex::new(Vec::new()));
        let sink = published.clone();
        let publisher: Arc<dyn Publisher> =
            Arc::new(move |m: Measurement| -> crate::error::Result<()> {
                sink.lock().unwrap().push(m);
                Ok(())
            });
        let clock = ManualClock::at(NOW);
        let handler = TelemetryHandler::new(
            SharedConfig::new(config),
            publisher,
            commands,
            TimeSync::new(clock.clone()),
        );
        Fixture {
            handler,
            channel,
            clock,
            published,
        }
    }

    fn stale_v2(depth: i32) -> Telemetry {
        Telemetry::V2(TelemetryV2 {
            time: NOW - 10_000,
            depth,
            ..Default::default()
        })
    }

    #[test]
    fn v2_publishes_depth() {
        let fx = fixture(LinkConfig::default());
        fx.handler.on_message(stale_v2(1500));
        let published = fx.published.lock().unwrap();
        assert_eq!(published.len(), 3);
        assert_eq!(published[0], Measurement::Depth { value: 1.5 });
    }

    #[test]
    fn synthetic_state_adds_estimate() {
        let fx = fixture(LinkConfig {
            synthetic_state: true,
            ..LinkConfig::default()
        });
        fx.handler.on_message(stale_v2(0));
        let published = fx.published.lock().unwrap();
        assert_eq!(published.len(), 4);
        assert!(matches!(
            published[3],
            Measurement::NavigationEstimate(estimate) if estimate.synthetic
        ));
    }

    #[test]
    fn drifted_clock_sends_one_correction_per_interval() {
        let fx = fixture(LinkConfig::default());
        fx.handler.on_message(stale_v2(0));
        fx.clock.advance(2_000);
        fx.handler.on_message(stale_v2(0));

        let writes = fx.channel.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0][0], 0x07);
        assert_eq!(fx.handler.time_sync().last_correction(), Some(NOW));
    }

    #[test]
    fn v1_clock_also_triggers_time_sync() {
        let fx = fixture(LinkConfig::default());
        fx.handler.on_message(Telemetry::V1(TelemetryV1 {
            time: 0,
            ..Default::default()
        }));
        assert_eq!(fx.channel.writes().len(), 1);
        assert!(fx.published.lock().unwrap().is_empty());
    }

    #[test]
    fn time_sync_disabled_by_flag_or_listen_only() {
        for config in [
            LinkConfig {
                set_time: false,
                ..LinkConfig::default()
            },
            LinkConfig {
                listen_only: true,
                ..LinkConfig::default()
            },
        ] {
            let fx = fixture(config);
            fx.handler.on_message(stale_v2(0));
            assert!(fx.channel.writes().is_empty());
        }
    }

    #[test]
    fn compass_calibration_has_no_side_effects() {
        let fx = fixture(LinkConfig::default());
        fx.handler
            .on_message(Telemetry::CompassCalibration(CompassCalibrationV2::default()));
        assert!(fx.channel.writes().is_empty());
        assert!(fx.published.lock().unwrap().is_empty());
    }

    #[test]
    fn publish_failure_does_not_stop_the_record() {
        let attempts = Arc::new(Mutex::new(0usize));
        let counter = attempts.clone();
        let publisher: Arc<dyn Publisher> =
            Arc::new(move |_m: Measurement| -> crate::error::Result<()> {
                *counter.lock().unwrap() += 1;
                Err(LinkError::Publish("bus closed".to_string()))
            });
        let handler = TelemetryHandler::new(
            SharedConfig::new(LinkConfig {
                set_time: false,
                ..LinkConfig::default()
            }),
            publisher,
            Arc::new(CommandSender::new(
                FakeChannel::connected(),
                Arc::new(DiscardSink),
                Arc::new(DiscardSink),
            )),
            TimeSync::new(ManualClock::at(NOW)),
        );
        handler.on_message(stale_v2(100));
        assert_eq!(*attempts.lock().unwrap(), 3);
    }
}
