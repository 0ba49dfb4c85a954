use std::fmt;
use std::net::IpAddr;

/// Connection state of a transport channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connected,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelState::Disconnected => f.write_str("disconnected"),
            ChannelState::Connected => f.write_str("connected"),
        }
    }
}

/// Health condition reported to the surrounding system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Link is operating normally.
    Active,
    /// A connect, disconnect, or socket operation failed.
    CommunicationError,
}

/// Consumes received bytes and reports how many were processed.
///
/// Called synchronously from the channel's receive worker. Returning `0`
/// means nothing more can be made of `buf` right now (incomplete or
/// undecodable); the channel decides whether to keep or drop the tail.
pub trait FrameHandler: Send + Sync {
    fn handle(&self, buf: &[u8]) -> usize;
}

/// Receives health transitions from the channels.
pub trait HealthSink: Send + Sync {
    fn report(&self, state: HealthState);
}

/// Append-only sink for raw bytes seen on a channel.
pub trait RawSink: Send + Sync {
    fn write(&self, bytes: &[u8]);
}

/// Decides whether a datagram from `addr:port` should be dispatched.
pub trait SenderFilter: Send + Sync {
    fn accept(&self, addr: IpAddr, port: u16) -> bool;
}

impl<F> FrameHandler for F
where
    F: Fn(&[u8]) -> usize + Send + Sync,
{
    fn handle(&self, buf: &[u8]) -> usize {
        self(buf)
    }
}

impl<F> HealthSink for F
where
    F: Fn(HealthState) + Send + Sync,
{
    fn report(&self, state: HealthState) {
        self(state)
    }
}

impl<F> RawSink for F
where
    F: Fn(&[u8]) + Send + Sync,
{
    fn write(&self, bytes: &[u8]) {
        self(bytes)
    }
}

impl<F> SenderFilter for F
where
    F: Fn(IpAddr, u16) -> bool + Send + Sync,
{
    fn accept(&self, addr: IpAddr, port: u16) -> bool {
        self(addr, port)
    }
}

/// Raw sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl RawSink for DiscardSink {
    fn write(&self, _bytes: &[u8]) {}
}

/// Filter that accepts every sender.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl SenderFilter for AcceptAll {
    fn accept(&self, _addr: IpAddr, _port: u16) -> bool {
        true
    }
}
