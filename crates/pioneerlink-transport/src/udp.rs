use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::error::{Result, TransportError};
use crate::traits::{FrameHandler, HealthSink, HealthState, RawSink, SenderFilter};

/// Largest datagram accepted from the device.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// How often a blocked receive wakes up to check for shutdown.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Configuration for the telemetry channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatagramConfig {
    /// Local interface to bind.
    pub bind_addr: IpAddr,
    /// Local port the device broadcasts to.
    pub listen_port: u16,
}

impl Default for DatagramConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            listen_port: 2010,
        }
    }
}

struct Worker {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

/// Connectionless channel that receives broadcast telemetry.
///
/// Each datagram is checked against the injected [`SenderFilter`] before it
/// is handed to the [`FrameHandler`]; rejected datagrams are dropped without
/// logging an error. The channel never transmits.
pub struct DatagramChannel {
    config: Mutex<DatagramConfig>,
    socket: Mutex<Option<Arc<UdpSocket>>>,
    worker: Mutex<Option<Worker>>,
    handler: Arc<dyn FrameHandler>,
    health: Arc<dyn HealthSink>,
    raw: Arc<dyn RawSink>,
    filter: Arc<dyn SenderFilter>,
}

impl DatagramChannel {
    pub fn new(
        config: DatagramConfig,
        handler: Arc<dyn FrameHandler>,
        health: Arc<dyn HealthSink>,
        raw: Arc<dyn RawSink>,
        filter: Arc<dyn SenderFilter>,
    ) -> Self {
        Self {
            config: Mutex::new(config),
            socket: Mutex::new(None),
            worker: Mutex::new(None),
            handler,
            health,
            raw,
            filter,
        }
    }

    pub fn config(&self) -> DatagramConfig {
        *lock(&self.config)
    }

    /// Change the listen port. Takes effect on the next connect.
    pub fn set_listen_port(&self, port: u16) {
        lock(&self.config).listen_port = port;
    }

    pub fn is_bound(&self) -> bool {
        lock(&self.socket).is_some()
    }

    /// Address the socket is bound to, if any.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        lock(&self.socket)
            .as_ref()
            .and_then(|socket| socket.local_addr().ok())
    }

    /// Bind the listen socket.
    pub fn connect(&self) -> Result<()> {
        let mut socket = lock(&self.socket);
        if socket.is_some() {
            return Ok(());
        }

        let config = self.config();
        let addr = SocketAddr::new(config.bind_addr, config.listen_port);
        let bound =
            UdpSocket::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        bound.set_read_timeout(Some(POLL_INTERVAL))?;

        info!(%addr, "telemetry channel bound");
        *socket = Some(Arc::new(bound));
        Ok(())
    }

    /// Release the listen socket.
    pub fn disconnect(&self) -> Result<()> {
        if lock(&self.socket).take().is_some() {
            debug!("telemetry channel released");
        }
        Ok(())
    }

    /// Spawn the receive worker for the bound socket.
    pub fn start(&self) -> Result<()> {
        self.stop();
        self.join();

        let Some(socket) = lock(&self.socket).clone() else {
            return Ok(());
        };

        let running = Arc::new(AtomicBool::new(true));
        let ctx = ReceiveContext {
            running: Arc::clone(&running),
            handler: Arc::clone(&self.handler),
            health: Arc::clone(&self.health),
            raw: Arc::clone(&self.raw),
            filter: Arc::clone(&self.filter),
        };

        let handle = std::thread::Builder::new()
            .name("pioneer-udp-rx".to_string())
            .spawn(move || receive_loop(&socket, ctx))
            .map_err(|source| TransportError::Spawn {
                channel: "telemetry",
                source,
            })?;

        *lock(&self.worker) = Some(Worker { handle, running });
        Ok(())
    }

    /// Signal the worker to exit. It wakes within [`POLL_INTERVAL`].
    pub fn stop(&self) {
        if let Some(worker) = lock(&self.worker).as_ref() {
            worker.running.store(false, Ordering::Release);
        }
    }

    /// Wait for the worker to exit.
    pub fn join(&self) {
        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            if worker.handle.join().is_err() {
                warn!("telemetry receive worker panicked");
            }
        }
    }

    /// Stop, rebind and restart the worker.
    ///
    /// Failures are logged and reported through the health sink. Returns
    /// whether the socket is bound afterwards.
    pub fn open(&self) -> bool {
        self.stop();
        self.join();

        let result = self
            .disconnect()
            .and_then(|()| self.connect())
            .and_then(|()| self.start());

        match result {
            Ok(()) => {
                info!("telemetry interface initialized");
                true
            }
            Err(err) => {
                self.close();
                warn!(error = %err, "telemetry connection failed");
                self.health.report(HealthState::CommunicationError);
                false
            }
        }
    }

    /// Stop the worker and release the socket.
    pub fn close(&self) {
        self.stop();
        self.join();
        if let Err(err) = self.disconnect() {
            warn!(error = %err, "telemetry disconnection failed");
            self.health.report(HealthState::CommunicationError);
        }
    }

    /// Rebind, typically after a listen port change.
    pub fn reconnect(&self) -> bool {
        self.open()
    }
}

impl Drop for DatagramChannel {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}

struct ReceiveContext {
    running: Arc<AtomicBool>,
    handler: Arc<dyn FrameHandler>,
    health: Arc<dyn HealthSink>,
    raw: Arc<dyn RawSink>,
    filter: Arc<dyn SenderFilter>,
}

fn receive_loop(socket: &UdpSocket, ctx: ReceiveContext) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    while ctx.running.load(Ordering::Acquire) {
        let (len, from) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                continue
            }
            Err(err) => {
                if ctx.running.load(Ordering::Acquire) {
                    warn!(error = %err, "telemetry receive failed");
                    ctx.health.report(HealthState::CommunicationError);
                }
                break;
            }
        };

        if !ctx.filter.accept(from.ip(), from.port()) {
            trace!(%from, "datagram rejected by sender filter");
            continue;
        }

        ctx.raw.write(&buf[..len]);
        dispatch_datagram(&buf[..len], ctx.handler.as_ref());
    }

    debug!("telemetry receive worker exiting");
}

/// Hand one datagram to `handler` until it is consumed or stops progressing.
///
/// Returns the number of bytes consumed. Any tail the handler cannot use is
/// dropped with the datagram.
pub fn dispatch_datagram(datagram: &[u8], handler: &dyn FrameHandler) -> usize {
    let mut offset = 0usize;
    while offset < datagram.len() {
        let consumed = handler.handle(&datagram[offset..]);
        if consumed == 0 {
            debug!(
                dropped = datagram.len() - offset,
                "dropping undecodable datagram tail"
            );
            break;
        }
        offset += consumed.min(datagram.len() - offset);
    }
    offset
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
