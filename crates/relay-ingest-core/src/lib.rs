//! Core telemetry model and traits used by the relay

use std::sync::Arc;

mod snapshot;

pub use snapshot::{CarClass, Drivetrain, EngineData, Snapshot, Transform, VehicleInfo, WheelData};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Datagram too short for the fixed layout. Recoverable: drop it and keep receiving.
    #[error("malformed packet: {len} bytes, need at least {required}")]
    MalformedPacket { len: usize, required: usize },
    #[error("failed to bind telemetry socket on {addr}")]
    SocketBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("telemetry socket failed")]
    Socket(#[from] std::io::Error),
}

impl IngestError {
    /// Whether the receive loop can carry on after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, IngestError::MalformedPacket { .. })
    }
}

pub type SnapshotTx = crossbeam_channel::Sender<Arc<Snapshot>>;
pub type SnapshotRx = crossbeam_channel::Receiver<Arc<Snapshot>>;

/// Trait for any live source connector
#[async_trait::async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Receive until the source fails; every accepted snapshot goes to `tx` in arrival order.
    async fn run(&self, tx: SnapshotTx) -> Result<(), IngestError>;
}

/// Unbounded so the receive loop never waits on downstream consumers.
pub fn channel() -> (SnapshotTx, SnapshotRx) {
    crossbeam_channel::unbounded()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_malformed_packets_are_recoverable() {
        let malformed = IngestError::MalformedPacket { len: 10, required: 311 };
        assert!(malformed.is_recoverable());
        assert_eq!(
            malformed.to_string(),
            "malformed packet: 10 bytes, need at least 311"
        );

        let bind = IngestError::SocketBind {
            addr: "127.0.0.1:9909".into(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(!bind.is_recoverable());
        assert!(!IngestError::Socket(std::io::ErrorKind::BrokenPipe.into()).is_recoverable());
    }

    #[test]
    fn channel_preserves_order() {
        let (tx, rx) = channel();
        for ts in [3u32, 1, 2] {
            let s = Snapshot { timestamp: ts, ..Default::default() };
            tx.send(Arc::new(s)).unwrap();
        }
        let got: Vec<u32> = rx.try_iter().map(|s| s.timestamp).collect();
        assert_eq!(got, vec![3, 1, 2]);
    }
}
