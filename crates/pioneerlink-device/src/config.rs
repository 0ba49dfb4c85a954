use std::net::{IpAddr, Ipv4Addr};
use std::ops::RangeInclusive;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use pioneerlink_transport::{DatagramConfig, ReliableConfig};
use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};

/// Default device command port.
pub const DEFAULT_TCP_PORT: u16 = 2011;
/// Default local telemetry port.
pub const DEFAULT_UDP_PORT: u16 = 2010;
/// Default connect/write timeout in seconds.
pub const DEFAULT_COMM_TIMEOUT_SECS: u64 = 10;
/// Accepted connect/write timeout range in seconds.
pub const COMM_TIMEOUT_RANGE: RangeInclusive<u64> = 1..=60;

/// Link configuration.
///
/// Unknown or missing fields fall back to [`LinkConfig::default`] when
/// deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Vehicle address for the command channel.
    pub tcp_addr: IpAddr,
    /// Vehicle command port.
    pub tcp_port: u16,
    /// Local port the vehicle broadcasts telemetry to. `0` picks a free port.
    pub udp_listen_port: u16,
    /// Never connect the command channel or send anything.
    pub listen_only: bool,
    /// Only accept telemetry sent from `tcp_addr`.
    pub filter_udp_to_tcp: bool,
    /// Publish a navigation estimate built from telemetry, and stop
    /// forwarding operator position to the vehicle.
    pub synthetic_state: bool,
    /// Write raw channel bytes during logging sessions.
    pub log_raw: bool,
    /// Publish raw copies of sent commands and decoded records.
    pub raw_echo: bool,
    /// Correct the vehicle clock when it drifts.
    pub set_time: bool,
    /// Connect and write timeout in seconds.
    pub comm_timeout: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            tcp_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            tcp_port: DEFAULT_TCP_PORT,
            udp_listen_port: DEFAULT_UDP_PORT,
            listen_only: false,
            filter_udp_to_tcp: false,
            synthetic_state: false,
            log_raw: true,
            raw_echo: false,
            set_time: true,
            comm_timeout: DEFAULT_COMM_TIMEOUT_SECS,
        }
    }
}

/// What the command channel must do after a configuration change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReliableAction {
    #[default]
    Keep,
    /// Peer or mode changed; disconnect and connect again.
    Reopen,
    /// Switched to listen-only; disconnect and stay down.
    Close,
}

/// Channel work implied by moving from one configuration to another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigChange {
    pub reliable: ReliableAction,
    pub rebind_datagram: bool,
}

impl ConfigChange {
    pub fn is_empty(&self) -> bool {
        self.reliable == ReliableAction::Keep && !self.rebind_datagram
    }
}

impl LinkConfig {
    /// Parse a JSON document, validating the result.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !COMM_TIMEOUT_RANGE.contains(&self.comm_timeout) {
            return Err(LinkError::InvalidConfig {
                field: "comm_timeout",
                reason: format!(
                    "must be within {}..={} seconds, got {}",
                    COMM_TIMEOUT_RANGE.start(),
                    COMM_TIMEOUT_RANGE.end(),
                    self.comm_timeout
                ),
            });
        }
        if self.tcp_port == 0 {
            return Err(LinkError::InvalidConfig {
                field: "tcp_port",
                reason: "must not be 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn comm_timeout(&self) -> Duration {
        Duration::from_secs(self.comm_timeout)
    }

    pub fn reliable_config(&self) -> ReliableConfig {
        ReliableConfig {
            addr: self.tcp_addr,
            port: self.tcp_port,
            timeout: self.comm_timeout(),
            listen_only: self.listen_only,
        }
    }

    pub fn datagram_config(&self) -> DatagramConfig {
        DatagramConfig {
            listen_port: self.udp_listen_port,
            ..DatagramConfig::default()
        }
    }

    /// Channel work needed to move from `self` to `next`.
    ///
    /// A timeout change alone reopens nothing; it applies on the next
    /// connect.
    pub fn diff(&self, next: &LinkConfig) -> ConfigChange {
        let peer_changed = self.tcp_addr != next.tcp_addr
            || self.tcp_port != next.tcp_port
            || self.listen_only != next.listen_only;

        let reliable = match (peer_changed, next.listen_only) {
            (false, _) => ReliableAction::Keep,
            (true, true) => ReliableAction::Close,
            (true, false) => ReliableAction::Reopen,
        };

        ConfigChange {
            reliable,
            rebind_datagram: self.udp_listen_port != next.udp_listen_port,
        }
    }
}

/// Configuration shared between the link and its receive workers.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig(Arc<RwLock<LinkConfig>>);

impl SharedConfig {
    pub fn new(config: LinkConfig) -> Self {
        Self(Arc::new(RwLock::new(config)))
    }

    /// Snapshot of the current configuration.
    pub fn get(&self) -> LinkConfig {
        self.0.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Install `config`, returning the previous one.
    pub fn replace(&self, config: LinkConfig) -> LinkConfig {
        let mut guard = self.0.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, config)
    }
}
