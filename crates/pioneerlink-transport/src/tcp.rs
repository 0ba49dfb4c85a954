use std::io::{ErrorKind, Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{ChannelState, FrameHandler, HealthSink, HealthState, RawSink};

const READ_CHUNK_SIZE: usize = 4 * 1024;
const INITIAL_PENDING_CAPACITY: usize = 8 * 1024;

/// Undecoded bytes kept across reads before the tail is discarded.
pub const MAX_PENDING_BYTES: usize = 64 * 1024;

/// Configuration for the command/reply channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReliableConfig {
    /// Device address.
    pub addr: IpAddr,
    /// Device command port.
    pub port: u16,
    /// Connect and write timeout.
    pub timeout: Duration,
    /// Never connect or send when set.
    pub listen_only: bool,
}

impl ReliableConfig {
    pub fn peer(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }
}

struct Worker {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

/// Connection-oriented channel used for commands and their replies.
///
/// The channel owns a TCP stream. Writes happen on the caller's thread via
/// [`ReliableChannel::send_data`]; a background worker owns a cloned read
/// half and hands every received chunk to the injected [`FrameHandler`].
/// Reconnection is never automatic: after a failure the channel stays
/// [`ChannelState::Disconnected`] until [`ReliableChannel::open`] or
/// [`ReliableChannel::connect`] is called again.
pub struct ReliableChannel {
    config: Mutex<ReliableConfig>,
    stream: Mutex<Option<TcpStream>>,
    worker: Mutex<Option<Worker>>,
    connected: Arc<AtomicBool>,
    handler: Arc<dyn FrameHandler>,
    health: Arc<dyn HealthSink>,
    raw: Arc<dyn RawSink>,
}

impl ReliableChannel {
    /// Create a disconnected channel.
    pub fn new(
        config: ReliableConfig,
        handler: Arc<dyn FrameHandler>,
        health: Arc<dyn HealthSink>,
        raw: Arc<dyn RawSink>,
    ) -> Self {
        Self {
            config: Mutex::new(config),
            stream: Mutex::new(None),
            worker: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            handler,
            health,
            raw,
        }
    }

    /// Current configuration.
    pub fn config(&self) -> ReliableConfig {
        lock(&self.config).clone()
    }

    /// Replace the configuration. Takes effect on the next connect.
    pub fn set_config(&self, config: ReliableConfig) {
        *lock(&self.config) = config;
    }

    /// Update peer address and port. Takes effect on the next connect.
    pub fn set_peer(&self, addr: IpAddr, port: u16) {
        let mut config = lock(&self.config);
        config.addr = addr;
        config.port = port;
    }

    /// Toggle listen-only mode.
    pub fn set_listen_only(&self, listen_only: bool) {
        lock(&self.config).listen_only = listen_only;
    }

    pub fn state(&self) -> ChannelState {
        if self.connected.load(Ordering::Acquire) {
            ChannelState::Connected
        } else {
            ChannelState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// Open a stream to the configured peer (Disconnected -> Connected).
    pub fn connect(&self) -> Result<()> {
        let mut stream = lock(&self.stream);
        if stream.is_some() {
            return Ok(());
        }

        let config = self.config();
        let addr = config.peer();
        let socket = TcpStream::connect_timeout(&addr, config.timeout)
            .map_err(|source| TransportError::Connect { addr, source })?;
        socket.set_nodelay(true)?;
        socket.set_write_timeout(Some(config.timeout))?;

        *stream = Some(socket);
        self.connected.store(true, Ordering::Release);
        info!(%addr, "command channel connected");
        Ok(())
    }

    /// Close the stream (Connected -> Disconnected).
    pub fn disconnect(&self) -> Result<()> {
        let socket = lock(&self.stream).take();
        self.connected.store(false, Ordering::Release);

        if let Some(socket) = socket {
            match socket.shutdown(Shutdown::Both) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotConnected => {}
                Err(err) => return Err(err.into()),
            }
            debug!("command channel disconnected");
        }
        Ok(())
    }

    /// Spawn the receive worker for the current stream.
    ///
    /// A no-op when the channel is not connected.
    pub fn start(&self) -> Result<()> {
        self.stop();
        self.join();

        let reader = match lock(&self.stream).as_ref() {
            Some(stream) => stream.try_clone()?,
            None => return Ok(()),
        };

        let running = Arc::new(AtomicBool::new(true));
        let ctx = ReceiveContext {
            running: Arc::clone(&running),
            connected: Arc::clone(&self.connected),
            handler: Arc::clone(&self.handler),
            health: Arc::clone(&self.health),
            raw: Arc::clone(&self.raw),
        };

        let handle = std::thread::Builder::new()
            .name("pioneer-tcp-rx".to_string())
            .spawn(move || receive_loop(reader, ctx))
            .map_err(|source| TransportError::Spawn {
                channel: "command",
                source,
            })?;

        *lock(&self.worker) = Some(Worker { handle, running });
        Ok(())
    }

    /// Signal the worker to exit and unblock its pending read.
    pub fn stop(&self) {
        let guard = lock(&self.worker);
        let Some(worker) = guard.as_ref() else {
            return;
        };
        worker.running.store(false, Ordering::Release);

        if let Some(stream) = lock(&self.stream).as_ref() {
            let _ = stream.shutdown(Shutdown::Read);
        }
    }

    /// Wait for the worker to exit.
    pub fn join(&self) {
        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            if worker.handle.join().is_err() {
                warn!("command receive worker panicked");
            }
        }
    }

    /// Stop, reconnect and restart the worker.
    ///
    /// Failures are logged and reported through the health sink; the
    /// channel is left disconnected until the next explicit call. Returns
    /// whether the channel is connected afterwards.
    pub fn open(&self) -> bool {
        self.stop();
        self.join();

        if self.config().listen_only {
            self.close();
            debug!("listen-only mode, command channel left disconnected");
            return false;
        }

        let result = self
            .disconnect()
            .and_then(|()| self.connect())
            .and_then(|()| self.start());

        match result {
            Ok(()) => {
                info!("command interface initialized");
                true
            }
            Err(err) => {
                self.close();
                warn!(error = %err, "command connection failed");
                self.health.report(HealthState::CommunicationError);
                false
            }
        }
    }

    /// Stop the worker and close the stream, reporting failures.
    pub fn close(&self) {
        self.stop();
        self.join();
        if let Err(err) = self.disconnect() {
            warn!(error = %err, "command disconnection failed");
            self.health.report(HealthState::CommunicationError);
        }
    }

    /// `disconnect` followed by `connect`.
    pub fn reconnect(&self) -> bool {
        self.open()
    }

    /// Write `bytes` to the device.
    ///
    /// Returns `Ok(0)` without touching the socket when disconnected or in
    /// listen-only mode.
    pub fn send_data(&self, bytes: &[u8]) -> Result<usize> {
        if lock(&self.config).listen_only || !self.is_connected() {
            return Ok(0);
        }

        let mut stream = lock(&self.stream);
        let Some(stream) = stream.as_mut() else {
            return Ok(0);
        };

        let mut offset = 0usize;
        while offset < bytes.len() {
            match stream.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        Ok(offset)
    }

    /// Local address of the open stream, if any.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        lock(&self.stream)
            .as_ref()
            .and_then(|stream| stream.local_addr().ok())
    }
}

impl Drop for ReliableChannel {
    fn drop(&mut self) {
        self.stop();
        self.join();
        let _ = self.disconnect();
    }
}

struct ReceiveContext {
    running: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
    handler: Arc<dyn FrameHandler>,
    health: Arc<dyn HealthSink>,
    raw: Arc<dyn RawSink>,
}

fn receive_loop(mut reader: TcpStream, ctx: ReceiveContext) {
    let mut pending = BytesMut::with_capacity(INITIAL_PENDING_CAPACITY);
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        let read = match reader.read(&mut chunk) {
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                if ctx.running.load(Ordering::Acquire) {
                    continue;
                }
                break;
            }
            Err(err) => {
                if ctx.running.load(Ordering::Acquire) {
                    lost_connection(&ctx, &format!("read failed: {err}"));
                }
                break;
            }
        };

        if read == 0 {
            if ctx.running.load(Ordering::Acquire) {
                lost_connection(&ctx, "closed by peer");
            }
            break;
        }

        ctx.raw.write(&chunk[..read]);
        pending.extend_from_slice(&chunk[..read]);
        drain_pending(&mut pending, ctx.handler.as_ref());
    }

    debug!("command receive worker exiting");
}

fn lost_connection(ctx: &ReceiveContext, reason: &str) {
    ctx.connected.store(false, Ordering::Release);
    warn!(reason, "command channel lost");
    ctx.health.report(HealthState::CommunicationError);
}

/// Hand buffered bytes to `handler` until it stops making progress.
///
/// Whatever the handler could not consume stays in `pending` for the next
/// read. The tail is discarded once it grows past [`MAX_PENDING_BYTES`].
pub fn drain_pending(pending: &mut BytesMut, handler: &dyn FrameHandler) {
    while !pending.is_empty() {
        let consumed = handler.handle(pending.as_ref()).min(pending.len());
        if consumed == 0 {
            break;
        }
        pending.advance(consumed);
    }

    if pending.len() > MAX_PENDING_BYTES {
        warn!(bytes = pending.len(), "discarding undecodable command stream bytes");
        pending.clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::{Ipv4Addr, TcpListener};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Instant;

    use super::*;
    use crate::traits::DiscardSink;

    fn config_for(port: u16) -> ReliableConfig {
        ReliableConfig {
            addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
            timeout: Duration::from_secs(2),
            listen_only: false,
        }
    }

    fn counting_health() -> (Arc<AtomicUsize>, Arc<dyn HealthSink>) {
        let errors = Arc::new(AtomicUsize::new(0));
        let sink_errors = Arc::clone(&errors);
        let sink: Arc<dyn HealthSink> = Arc::new(move |state: HealthState| {
            if state == HealthState::CommunicationError {
                sink_errors.fetch_add(1, Ordering::SeqCst);
            }
        });
        (errors, sink)
    }

    fn ignore_frames() -> Arc<dyn FrameHandler> {
        Arc::new(|buf: &[u8]| buf.len())
    }

    fn refused_port() -> u16 {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind should succeed");
        listener.local_addr().expect("local addr").port()
    }

    #[test]
    fn received_bytes_reach_handler() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind should succeed");
        let port = listener.local_addr().expect("local addr").port();

        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let handler = move |buf: &[u8]| {
            let _ = tx.send(buf.to_vec());
            buf.len()
        };
        let (_, health) = counting_health();
        let channel = ReliableChannel::new(
            config_for(port),
            Arc::new(handler),
            health,
            Arc::new(DiscardSink),
        );

        assert!(channel.open());
        let (mut device, _) = listener.accept().expect("accept should succeed");
        device.write_all(b"\x81\x07\x00").expect("device write");

        let received = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("handler should see bytes");
        assert_eq!(received, b"\x81\x07\x00");

        channel.close();
        assert_eq!(channel.state(), ChannelState::Disconnected);
    }

    #[test]
    fn send_data_writes_to_peer() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind should succeed");
        let port = listener.local_addr().expect("local addr").port();
        let (_, health) = counting_health();
        let channel =
            ReliableChannel::new(config_for(port), ignore_frames(), health, Arc::new(DiscardSink));

        assert!(channel.open());
        let (mut device, _) = listener.accept().expect("accept should succeed");

        let sent = channel.send_data(&[0x02, 0x00, 0x05, 0x00]).expect("send");
        assert_eq!(sent, 4);

        let mut buf = [0u8; 4];
        device.read_exact(&mut buf).expect("device read");
        assert_eq!(buf, [0x02, 0x00, 0x05, 0x00]);
        channel.close();
    }

    #[test]
    fn send_data_is_noop_when_disconnected() {
        let (_, health) = counting_health();
        let channel = ReliableChannel::new(
            config_for(refused_port()),
            ignore_frames(),
            health,
            Arc::new(DiscardSink),
        );
        assert_eq!(channel.send_data(b"abc").expect("send"), 0);
    }

    #[test]
    fn listen_only_never_writes() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind should succeed");
        let port = listener.local_addr().expect("local addr").port();
        let (_, health) = counting_health();
        let channel =
            ReliableChannel::new(config_for(port), ignore_frames(), health, Arc::new(DiscardSink));

        assert!(channel.open());
        let (_device, _) = listener.accept().expect("accept should succeed");
        channel.set_listen_only(true);
        assert_eq!(channel.send_data(b"abc").expect("send"), 0);

        assert!(!channel.open());
        assert_eq!(channel.state(), ChannelState::Disconnected);
    }

    #[test]
    fn connect_failure_stays_disconnected_without_retry() {
        let (errors, health) = counting_health();
        let channel = ReliableChannel::new(
            config_for(refused_port()),
            ignore_frames(),
            health,
            Arc::new(DiscardSink),
        );

        assert!(!channel.open());
        assert_eq!(channel.state(), ChannelState::Disconnected);
        assert_eq!(errors.load(Ordering::SeqCst), 1);

        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(channel.state(), ChannelState::Disconnected);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn raw_connect_reports_connect_error() {
        let (_, health) = counting_health();
        let channel = ReliableChannel::new(
            config_for(refused_port()),
            ignore_frames(),
            health,
            Arc::new(DiscardSink),
        );
        let err = channel.connect().unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[test]
    fn stop_unblocks_pending_read() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind should succeed");
        let port = listener.local_addr().expect("local addr").port();
        let (errors, health) = counting_health();
        let channel =
            ReliableChannel::new(config_for(port), ignore_frames(), health, Arc::new(DiscardSink));

        assert!(channel.open());
        let (_device, _) = listener.accept().expect("accept should succeed");

        let started = Instant::now();
        channel.stop();
        channel.join();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn peer_close_marks_disconnected() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind should succeed");
        let port = listener.local_addr().expect("local addr").port();
        let (errors, health) = counting_health();
        let channel =
            ReliableChannel::new(config_for(port), ignore_frames(), health, Arc::new(DiscardSink));

        assert!(channel.open());
        let (device, _) = listener.accept().expect("accept should succeed");
        drop(device);

        let deadline = Instant::now() + Duration::from_secs(2);
        while channel.is_connected() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(channel.state(), ChannelState::Disconnected);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(channel.send_data(b"x").expect("send"), 0);
    }

    #[test]
    fn drain_pending_keeps_incomplete_tail() {
        // Frames are 3 bytes long; shorter input is left for the next read.
        let handler = |buf: &[u8]| if buf.len() >= 3 { 3usize } else { 0usize };
        let mut pending = BytesMut::from(&b"abcdefgh"[..]);
        drain_pending(&mut pending, &handler);
        assert_eq!(pending.as_ref(), b"gh");

        pending.extend_from_slice(b"i");
        drain_pending(&mut pending, &handler);
        assert!(pending.is_empty());
    }

    #[test]
    fn drain_pending_discards_oversized_tail() {
        let handler = |_: &[u8]| 0usize;
        let mut pending = BytesMut::from(vec![0u8; MAX_PENDING_BYTES + 1].as_slice());
        drain_pending(&mut pending, &handler);
        assert!(pending.is_empty());
    }
}
