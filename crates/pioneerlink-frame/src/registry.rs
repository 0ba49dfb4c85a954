//! Per-channel record registry and the dispatcher that drives it.
//!
//! A [`MessageRegistry`] maps the type codes of one channel to decoders for
//! a closed set of records. A [`Dispatcher`] pairs a registry with a
//! [`MessageHandler`] and plugs into a transport channel as its
//! [`FrameHandler`]: each call decodes at most one record from the front of
//! the buffer and reports how many bytes it consumed.

use std::sync::Arc;

use pioneerlink_transport::{FrameHandler, RawSink};
use tracing::{debug, trace, warn};

use crate::channel::{code_name, Channel};
use crate::codec::{decode, WireMessage};
use crate::commands::{
    CmdGetCameraParameters, CmdPing, CmdSetSystemTime, CmdUserGeoLocation, CmdWatchdog,
};
use crate::error::{FrameError, Result};
use crate::message::{Command, Reply, Telemetry};
use crate::replies::{ReplyAck, ReplyCameraParameters, ReplyPing};
use crate::telemetry::{CompassCalibrationV2, TelemetryV1, TelemetryV2};

type DecodeFn<M> = fn(&[u8]) -> Result<Option<(M, usize)>>;

/// One recognized type code.
pub struct RegistryEntry<M> {
    pub code: u16,
    pub name: &'static str,
    pub wire_size: usize,
    decode: DecodeFn<M>,
}

impl<M> Clone for RegistryEntry<M> {
    fn clone(&self) -> Self {
        Self {
            code: self.code,
            name: self.name,
            wire_size: self.wire_size,
            decode: self.decode,
        }
    }
}

/// Outcome of decoding the front of a buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<M> {
    /// A complete record and the bytes it occupied.
    Message { message: M, consumed: usize },
    /// A code nobody registered. `skipped` is the code width.
    Unknown { code: u16, skipped: usize },
    /// Not enough bytes yet for the code or for the record it announces.
    Incomplete { needed: usize, available: usize },
}

/// Type codes recognized on one channel.
pub struct MessageRegistry<M> {
    channel: Channel,
    entries: Vec<RegistryEntry<M>>,
}

impl<M> MessageRegistry<M> {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            entries: Vec::new(),
        }
    }

    /// Register record type `T`. A later registration for the same code
    /// replaces the earlier one.
    pub fn register<T>(mut self) -> Self
    where
        T: WireMessage + Into<M>,
    {
        debug_assert_eq!(T::CHANNEL, self.channel, "{} on wrong channel", T::NAME);
        self.entries.retain(|e| e.code != T::CODE);
        self.entries.push(RegistryEntry {
            code: T::CODE,
            name: T::NAME,
            wire_size: T::WIRE_SIZE,
            decode: decode_into::<T, M>,
        });
        self
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn lookup(&self, code: u16) -> Option<&RegistryEntry<M>> {
        self.entries.iter().find(|e| e.code == code)
    }

    pub fn entries(&self) -> &[RegistryEntry<M>] {
        &self.entries
    }

    /// Decode whatever sits at the front of `buf`.
    ///
    /// Unknown codes are not an error; they report the code width so the
    /// caller can skip past them.
    pub fn decode_next(&self, buf: &[u8]) -> Result<Decoded<M>> {
        let width = self.channel.code_width();
        let Some(code) = self.channel.peek_code(buf) else {
            return Ok(Decoded::Incomplete {
                needed: width,
                available: buf.len(),
            });
        };

        let Some(entry) = self.lookup(code) else {
            return Ok(Decoded::Unknown {
                code,
                skipped: width,
            });
        };

        match (entry.decode)(buf) {
            Ok(Some((message, consumed))) => Ok(Decoded::Message { message, consumed }),
            Ok(None) => Ok(Decoded::Unknown {
                code,
                skipped: width,
            }),
            Err(FrameError::Truncated {
                needed, available, ..
            }) => Ok(Decoded::Incomplete { needed, available }),
            Err(err) => Err(err),
        }
    }
}

impl MessageRegistry<Reply> {
    /// Replies the vehicle sends on the command/reply channel.
    pub fn replies() -> Self {
        Self::new(Channel::CommandReply)
            .register::<ReplyAck>()
            .register::<ReplyPing>()
            .register::<ReplyCameraParameters>()
    }
}

impl MessageRegistry<Telemetry> {
    /// Records broadcast on the telemetry channel.
    pub fn telemetry() -> Self {
        Self::new(Channel::Telemetry)
            .register::<TelemetryV1>()
            .register::<TelemetryV2>()
            .register::<CompassCalibrationV2>()
    }
}

impl MessageRegistry<Command> {
    /// Commands the control side sends. Used to read back the commands log.
    pub fn commands() -> Self {
        Self::new(Channel::CommandReply)
            .register::<CmdPing>()
            .register::<CmdWatchdog>()
            .register::<CmdUserGeoLocation>()
            .register::<CmdGetCameraParameters>()
            .register::<CmdSetSystemTime>()
    }
}

fn decode_into<T, M>(src: &[u8]) -> Result<Option<(M, usize)>>
where
    T: WireMessage + Into<M>,
{
    Ok(decode::<T>(src)?.map(|(msg, consumed)| (msg.into(), consumed)))
}

/// Receives every record a [`Dispatcher`] decodes.
///
/// Runs on the channel's receive worker. Implementations handle their own
/// failures; nothing they do can stall the dispatcher.
pub trait MessageHandler<M>: Send + Sync {
    fn on_message(&self, message: M);
}

impl<M, F> MessageHandler<M> for F
where
    F: Fn(M) + Send + Sync,
{
    fn on_message(&self, message: M) {
        self(message)
    }
}

/// Decodes records from one channel and hands them to a handler.
pub struct Dispatcher<M> {
    registry: MessageRegistry<M>,
    handler: Arc<dyn MessageHandler<M>>,
    observer: Option<Arc<dyn RawSink>>,
}

impl<M> Dispatcher<M> {
    pub fn new(registry: MessageRegistry<M>, handler: Arc<dyn MessageHandler<M>>) -> Self {
        Self {
            registry,
            handler,
            observer: None,
        }
    }

    /// Mirror the bytes of every decoded record to `observer` before the
    /// handler sees it.
    pub fn with_observer(mut self, observer: Arc<dyn RawSink>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn registry(&self) -> &MessageRegistry<M> {
        &self.registry
    }

    /// Decode at most one record from the front of `buf`.
    ///
    /// Returns the bytes consumed: the record size on success, the code
    /// width for an unknown code, and `0` when `buf` is incomplete or the
    /// record could not be decoded.
    pub fn dispatch(&self, buf: &[u8]) -> usize {
        let channel = self.registry.channel();
        match self.registry.decode_next(buf) {
            Ok(Decoded::Message { message, consumed }) => {
                trace!(channel = channel.name(), consumed, "decoded record");
                if let Some(observer) = &self.observer {
                    observer.write(&buf[..consumed.min(buf.len())]);
                }
                self.handler.on_message(message);
                consumed
            }
            Ok(Decoded::Unknown { code, skipped }) => {
                debug!(
                    channel = channel.name(),
                    code,
                    name = code_name(channel, code),
                    "skipping unrecognized type code"
                );
                skipped.max(1)
            }
            Ok(Decoded::Incomplete { needed, available }) => {
                trace!(channel = channel.name(), needed, available, "incomplete record");
                0
            }
            Err(err) => {
                warn!(channel = channel.name(), error = %err, "record decode failed");
                0
            }
        }
    }
}

impl<M: 'static> FrameHandler for Dispatcher<M> {
    fn handle(&self, buf: &[u8]) -> usize {
        self.dispatch(buf)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::encode;

    struct Collect<M> {
        seen: Mutex<Vec<M>>,
    }

    impl<M> Collect<M> {
        fn new() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl<M: Send> MessageHandler<M> for Collect<M> {
        fn on_message(&self, message: M) {
            self.seen.lock().unwrap().push(message);
        }
    }

    fn telemetry_dispatcher() -> (Dispatcher<Telemetry>, Arc<Collect<Telemetry>>) {
        let collect = Arc::new(Collect::new());
        let dispatcher = Dispatcher::new(MessageRegistry::telemetry(), collect.clone());
        (dispatcher, collect)
    }

    fn reply_dispatcher() -> (Dispatcher<Reply>, Arc<Collect<Reply>>) {
        let collect = Arc::new(Collect::new());
        let dispatcher = Dispatcher::new(MessageRegistry::replies(), collect.clone());
        (dispatcher, collect)
    }

    #[test]
    fn telemetry_v2_depth_reaches_handler() {
        let (dispatcher, collect) = telemetry_dispatcher();
        let mut buf = BytesMut::new();
        encode(
            &TelemetryV2 {
                depth: 1500,
                ..Default::default()
            },
            &mut buf,
        )
        .unwrap();

        assert_eq!(dispatcher.dispatch(&buf), 31);
        let seen = collect.seen.lock().unwrap();
        match seen.as_slice() {
            [Telemetry::V2(t)] => assert_eq!(t.depth_m(), 1.5),
            other => panic!("unexpected records: {other:?}"),
        }
    }

    #[test]
    fn unknown_reply_code_consumes_one_byte() {
        let (dispatcher, collect) = reply_dispatcher();
        assert_eq!(dispatcher.dispatch(&[0x42, 0x00, 0x00]), 1);
        assert!(collect.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_telemetry_code_consumes_two_bytes() {
        let (dispatcher, _) = telemetry_dispatcher();
        assert_eq!(dispatcher.dispatch(&[0x7E, 0x7E, 0x00]), 2);
    }

    #[test]
    fn all_unknown_buffer_is_fully_consumed() {
        let (dispatcher, collect) = reply_dispatcher();
        let garbage = [0x42u8, 0x43, 0x44, 0x45, 0x46];
        let mut offset = 0;
        let mut calls = 0;
        while offset < garbage.len() {
            let consumed = dispatcher.dispatch(&garbage[offset..]);
            assert!(consumed > 0);
            offset += consumed;
            calls += 1;
        }
        assert_eq!(offset, garbage.len());
        assert_eq!(calls, garbage.len());
        assert!(collect.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn truncated_record_consumes_nothing() {
        let (dispatcher, collect) = reply_dispatcher();
        assert_eq!(dispatcher.dispatch(&[0x82, 0x00, 0x01]), 0);
        assert_eq!(dispatcher.dispatch(&[]), 0);
        assert!(collect.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn known_record_after_unknown_code() {
        let (dispatcher, collect) = reply_dispatcher();
        let buf = [0x42, 0x81, 0x05, 0x00];
        assert_eq!(dispatcher.dispatch(&buf), 1);
        assert_eq!(dispatcher.dispatch(&buf[1..]), 3);
        assert_eq!(
            collect.seen.lock().unwrap().as_slice(),
            &[Reply::Ack(ReplyAck {
                acked_code: 5,
                status: 0
            })]
        );
    }

    #[test]
    fn decode_next_reports_incomplete_sizes() {
        let registry = MessageRegistry::telemetry();
        assert_eq!(
            registry.decode_next(&[0x02]).unwrap(),
            Decoded::Incomplete {
                needed: 2,
                available: 1
            }
        );
        assert_eq!(
            registry.decode_next(&[0x02, 0x02, 1]).unwrap(),
            Decoded::Incomplete {
                needed: 6,
                available: 3
            }
        );
    }

    #[test]
    fn commands_registry_reads_back_sent_commands() {
        let registry = MessageRegistry::commands();
        let mut buf = BytesMut::new();
        encode(&CmdSetSystemTime { unix_timestamp: 5 }, &mut buf).unwrap();
        assert_eq!(
            registry.decode_next(&buf).unwrap(),
            Decoded::Message {
                message: Command::SetSystemTime(CmdSetSystemTime { unix_timestamp: 5 }),
                consumed: 5
            }
        );
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let registry = MessageRegistry::<Reply>::new(Channel::CommandReply)
            .register::<ReplyAck>()
            .register::<ReplyAck>();
        assert_eq!(registry.entries().len(), 1);
        assert_eq!(registry.lookup(0x81).map(|e| e.wire_size), Some(3));
        assert!(registry.lookup(0x82).is_none());
    }

    #[test]
    fn observer_sees_only_decoded_record_bytes() {
        let mirrored = Arc::new(Mutex::new(Vec::<u8>::new()));
        let sink = mirrored.clone();
        let observer: Arc<dyn RawSink> = Arc::new(move |bytes: &[u8]| {
            sink.lock().unwrap().extend_from_slice(bytes);
        });
        let (dispatcher, _) = reply_dispatcher();
        let dispatcher = dispatcher.with_observer(observer);

        assert_eq!(dispatcher.dispatch(&[0x42]), 1);
        assert_eq!(dispatcher.dispatch(&[0x81, 0x02, 0x00, 0xFF]), 3);
        assert_eq!(mirrored.lock().unwrap().as_slice(), &[0x81, 0x02, 0x00]);
    }

    #[test]
    fn closure_handler_and_frame_handler_impl() {
        let count = Arc::new(Mutex::new(0usize));
        let counter = count.clone();
        let handler: Arc<dyn MessageHandler<Reply>> = Arc::new(move |_reply: Reply| {
            *counter.lock().unwrap() += 1;
        });
        let dispatcher = Dispatcher::new(MessageRegistry::replies(), handler);
        let frame_handler: &dyn FrameHandler = &dispatcher;
        assert_eq!(frame_handler.handle(&[0x81, 0x02, 0x00]), 3);
        assert_eq!(*count.lock().unwrap(), 1);
    }
}
