use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use pioneerlink_frame::{Channel, Dispatcher, MessageRegistry, WireMessage};
use pioneerlink_transport::{
    ChannelState, DatagramChannel, HealthSink, HealthState, RawSink, ReliableChannel,
    SenderFilter,
};
use tracing::{debug, info, warn};

use crate::bus::{Direction, LoggingControl, Measurement, NavigationState, Publisher, RawFrame};
use crate::command::{CommandSender, Watchdog};
use crate::config::{ConfigChange, LinkConfig, ReliableAction, SharedConfig};
use crate::error::Result;
use crate::handlers::{ReplyHandler, TelemetryHandler};
use crate::logger::LoggerSet;
use crate::timesync::{Clock, SystemClock, TimeSync};
use crate::translate::geolocation_from_state;

/// Accepts telemetry only from the command peer when filtering is enabled.
pub struct TcpPeerFilter {
    config: SharedConfig,
}

impl TcpPeerFilter {
    pub fn new(config: SharedConfig) -> Self {
        Self { config }
    }
}

impl SenderFilter for TcpPeerFilter {
    fn accept(&self, addr: IpAddr, _port: u16) -> bool {
        let config = self.config.get();
        !config.filter_udp_to_tcp || addr.to_canonical() == config.tcp_addr.to_canonical()
    }
}

/// A running link to one vehicle.
///
/// Owns both channels, the command driver and the raw logs. Acquiring a
/// link opens the channels; dropping it (or calling [`Link::release`])
/// stops the workers, closes the sockets and ends any logging session.
pub struct Link {
    config: SharedConfig,
    tcp: Arc<ReliableChannel>,
    udp: DatagramChannel,
    commands: Arc<CommandSender>,
    watchdog: Watchdog,
    loggers: Arc<LoggerSet>,
    released: bool,
}

impl Link {
    /// Build and open a link using the system clock.
    pub fn acquire(
        config: LinkConfig,
        publisher: Arc<dyn Publisher>,
        health: Arc<dyn HealthSink>,
    ) -> Result<Self> {
        Self::acquire_with_clock(config, publisher, health, Arc::new(SystemClock))
    }

    /// Build and open a link.
    ///
    /// Channel failures are not errors here: they are logged, reported to
    /// `health`, and leave the channel down until the next reconfiguration.
    /// Only an invalid `config` fails.
    pub fn acquire_with_clock(
        config: LinkConfig,
        publisher: Arc<dyn Publisher>,
        health: Arc<dyn HealthSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let shared = SharedConfig::new(config.clone());
        let loggers = Arc::new(LoggerSet::new());

        let replies = Dispatcher::new(MessageRegistry::replies(), Arc::new(ReplyHandler))
            .with_observer(echo_sink(
                &shared,
                &publisher,
                Channel::CommandReply,
                Direction::Inbound,
            ));
        let tcp = Arc::new(ReliableChannel::new(
            config.reliable_config(),
            Arc::new(replies),
            Arc::clone(&health),
            loggers.replies.clone(),
        ));

        let commands = Arc::new(CommandSender::new(
            tcp.clone(),
            loggers.commands.clone(),
            echo_sink(
                &shared,
                &publisher,
                Channel::CommandReply,
                Direction::Outbound,
            ),
        ));

        let telemetry_handler = TelemetryHandler::new(
            shared.clone(),
            Arc::clone(&publisher),
            Arc::clone(&commands),
            TimeSync::new(Arc::clone(&clock)),
        );
        let telemetry = Dispatcher::new(MessageRegistry::telemetry(), Arc::new(telemetry_handler))
            .with_observer(echo_sink(
                &shared,
                &publisher,
                Channel::Telemetry,
                Direction::Inbound,
            ));
        let udp = DatagramChannel::new(
            config.datagram_config(),
            Arc::new(telemetry),
            Arc::clone(&health),
            loggers.telemetry.clone(),
            Arc::new(TcpPeerFilter::new(shared.clone())),
        );

        let link = Self {
            config: shared,
            tcp,
            udp,
            commands,
            watchdog: Watchdog::new(clock),
            loggers,
            released: false,
        };

        health.report(HealthState::Active);
        link.tcp.open();
        link.udp.open();
        info!(
            peer = %config.reliable_config().peer(),
            udp_port = config.udp_listen_port,
            listen_only = config.listen_only,
            "link acquired"
        );
        Ok(link)
    }

    pub fn config(&self) -> LinkConfig {
        self.config.get()
    }

    /// Apply a new configuration, reopening only the channels it affects.
    pub fn update_config(&self, next: LinkConfig) -> Result<ConfigChange> {
        next.validate()?;
        let previous = self.config.replace(next.clone());
        let change = previous.diff(&next);

        self.tcp.set_config(next.reliable_config());
        self.udp.set_listen_port(next.udp_listen_port);

        match change.reliable {
            ReliableAction::Keep => {}
            ReliableAction::Reopen => {
                self.tcp.reconnect();
            }
            ReliableAction::Close => self.tcp.close(),
        }
        if change.rebind_datagram {
            self.udp.reconnect();
        }

        debug!(?change, "configuration updated");
        Ok(change)
    }

    /// Own heartbeat tick: send the watchdog while the command channel is up.
    pub fn on_heartbeat(&self) -> usize {
        if !self.tcp.is_connected() {
            return 0;
        }
        self.watchdog.tick(&self.commands)
    }

    /// Forward the operator position, unless estimates come from telemetry.
    pub fn on_navigation_state(&self, state: &NavigationState) -> usize {
        if self.config.get().synthetic_state {
            return 0;
        }
        self.commands.send(&geolocation_from_state(state))
    }

    /// Start or stop the raw logs at a logging session boundary.
    pub fn on_logging_control(&self, control: &LoggingControl) -> Result<()> {
        match control {
            LoggingControl::Started { folder } => {
                if !self.config.get().log_raw {
                    return Ok(());
                }
                self.loggers.start(folder)?;
                info!(folder = %folder.display(), "raw logging started");
            }
            LoggingControl::Stopped => {
                self.loggers.stop();
                debug!("raw logging stopped");
            }
        }
        Ok(())
    }

    /// Send any command record. Returns bytes sent; `0` when suppressed.
    pub fn send_command<M: WireMessage>(&self, msg: &M) -> usize {
        self.commands.send(msg)
    }

    pub fn command_state(&self) -> ChannelState {
        self.tcp.state()
    }

    /// Local address of the command stream, if connected.
    pub fn command_local_addr(&self) -> Option<SocketAddr> {
        self.tcp.local_addr()
    }

    /// Local address of the telemetry socket, if bound.
    pub fn telemetry_addr(&self) -> Option<SocketAddr> {
        self.udp.local_addr()
    }

    pub fn loggers(&self) -> &LoggerSet {
        &self.loggers
    }

    /// Stop and join both workers, close the sockets, then end logging.
    ///
    /// Safe to call more than once.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.tcp.close();
        self.udp.close();
        self.loggers.stop();
        self.released = true;
        info!("link released");
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.release();
    }
}

fn echo_sink(
    config: &SharedConfig,
    publisher: &Arc<dyn Publisher>,
    channel: Channel,
    direction: Direction,
) -> Arc<dyn RawSink> {
    let config = config.clone();
    let publisher = Arc::clone(publisher);
    Arc::new(move |bytes: &[u8]| {
        if !config.get().raw_echo {
            return;
        }
        let frame = RawFrame {
            channel,
            direction,
            bytes: bytes.to_vec(),
        };
        if let Err(err) = publisher.publish(Measurement::RawFrame(frame)) {
            warn!(error = %err, "raw echo publish failed");
        }
    })
}
