//! UDP "data out" ingestion.
//!
//! [`IngestService::bind`] opens the socket, [`IngestService::start`] spawns the
//! receive loop. The loop is the only writer of [`CurrentState`]; every decoded
//! snapshot (including menu packets with vehicle id 0) is forwarded on the
//! snapshot channel in arrival order.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use relay_ingest_core::*;

pub mod wire;

/// Receive buffer; comfortably above any known packet size.
const MAX_DATAGRAM: usize = 2048;

#[derive(Clone, Debug)]
pub struct FhConfig {
    pub bind_addr: String,        // loopback only, e.g. "127.0.0.1:9909"
    pub recv_buffer_size: usize,  // SO_RCVBUF
}

impl Default for FhConfig {
    fn default() -> Self {
        Self { bind_addr: "127.0.0.1:9909".into(), recv_buffer_size: 256 * 1024 }
    }
}

/// Last snapshot that carried a real vehicle.
///
/// Cloning the handle is cheap; readers always see a whole snapshot because the
/// slot holds an `Arc` that is swapped, never mutated in place.
#[derive(Clone, Debug, Default)]
pub struct CurrentState {
    slot: Arc<RwLock<Option<Arc<Snapshot>>>>,
}

impl CurrentState {
    pub fn load(&self) -> Option<Arc<Snapshot>> {
        self.slot.read().clone()
    }

    fn store(&self, snapshot: Arc<Snapshot>) {
        *self.slot.write() = Some(snapshot);
    }
}

#[derive(Debug, Default)]
pub struct IngestStats {
    pub datagrams: AtomicU64,
    pub malformed: AtomicU64,
    pub published: AtomicU64,
}

pub struct IngestService {
    cfg: FhConfig,
    socket: UdpSocket,
    state: CurrentState,
    stats: Arc<IngestStats>,
}

impl IngestService {
    /// Open the telemetry socket and register it with the running reactor.
    pub async fn bind(cfg: FhConfig) -> Result<Self, IngestError> {
        let socket = open_socket(&cfg).map_err(|source| IngestError::SocketBind {
            addr: cfg.bind_addr.clone(),
            source,
        })?;
        Ok(Self {
            cfg,
            socket,
            state: CurrentState::default(),
            stats: Arc::new(IngestStats::default()),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Read handle on the retained vehicle state.
    pub fn current_state(&self) -> CurrentState {
        self.state.clone()
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    /// Spawn the receive loop. The socket is released when the loop ends.
    pub fn start(self, tx: SnapshotTx) -> JoinHandle<Result<(), IngestError>> {
        tracing::info!(addr = %self.cfg.bind_addr, "starting telemetry listener");
        tokio::spawn(async move { self.run(tx).await })
    }

    /// Decode one datagram and apply it to the retained state.
    fn accept(&self, datagram: &[u8]) -> Result<Arc<Snapshot>, IngestError> {
        let snapshot = Arc::new(wire::decode(datagram)?);
        if snapshot.has_vehicle() {
            self.state.store(Arc::clone(&snapshot));
        }
        Ok(snapshot)
    }
}

#[async_trait::async_trait]
impl TelemetrySource for IngestService {
    async fn run(&self, tx: SnapshotTx) -> Result<(), IngestError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let mut downstream_gone = false;
        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(addr = %self.cfg.bind_addr, error = %e, "telemetry socket failed, stopping listener");
                    return Err(IngestError::Socket(e));
                }
            };
            self.stats.datagrams.fetch_add(1, Ordering::Relaxed);

            let snapshot = match self.accept(&buf[..len]) {
                Ok(s) => s,
                Err(e) if e.is_recoverable() => {
                    self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(%peer, error = %e, "dropping telemetry datagram");
                    continue;
                }
                Err(e) => {
                    tracing::error!(%peer, error = %e, "unrecoverable telemetry error, stopping listener");
                    return Err(e);
                }
            };

            tracing::trace!(
                vehicle = snapshot.vehicle.id,
                timestamp = snapshot.timestamp,
                "telemetry update"
            );
            if tx.send(snapshot).is_ok() {
                self.stats.published.fetch_add(1, Ordering::Relaxed);
            } else if !downstream_gone {
                // keep ingesting so the retained state stays fresh
                downstream_gone = true;
                tracing::warn!("snapshot receiver dropped, updates are no longer forwarded");
            }
        }
    }
}

fn open_socket(cfg: &FhConfig) -> std::io::Result<UdpSocket> {
    let addr: SocketAddr = cfg.bind_addr.parse().map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid socket address")
    })?;
    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if let Err(e) = socket.set_recv_buffer_size(cfg.recv_buffer_size) {
        tracing::warn!(error = %e, requested_size = cfg.recv_buffer_size, "failed to set SO_RCVBUF");
    }
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    UdpSocket::from_std(socket.into())
}
