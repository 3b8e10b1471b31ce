use std::sync::Arc;
use std::thread;

use relay_hub::BroadcastHub;
use relay_ingest_core::{Snapshot, SnapshotRx};
use relay_ingest_fh::{CurrentState, IngestStats};

pub type SnapshotHub = BroadcastHub<Snapshot>;

/// Shared handles for request handlers and background tasks.
#[derive(Clone)]
pub struct AppSession {
    pub hub: Arc<SnapshotHub>,
    /// None when the telemetry socket could not be bound
    pub state: Option<CurrentState>,
    pub ingest_stats: Option<Arc<IngestStats>>,
}

impl AppSession {
    pub fn new(hub: Arc<SnapshotHub>) -> Self {
        Self { hub, state: None, ingest_stats: None }
    }

    pub fn with_ingest(mut self, state: CurrentState, stats: Arc<IngestStats>) -> Self {
        self.state = Some(state);
        self.ingest_stats = Some(stats);
        self
    }

    /// Last snapshot with a real vehicle, if any arrived yet.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.state.as_ref().and_then(CurrentState::load)
    }
}

/// Forward decoded snapshots to the hub, in order, until every sender is gone.
pub fn spawn_pump(rx: SnapshotRx, hub: Arc<SnapshotHub>) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("snapshot-pump".into())
        .spawn(move || {
            while let Ok(snapshot) = rx.recv() {
                let delivered = hub.publish(snapshot);
                tracing::trace!(delivered, "published snapshot");
            }
            tracing::debug!("snapshot pump stopped");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_ingest_core::channel;

    #[test]
    fn pump_publishes_in_order_and_stops_with_sender() {
        let hub = Arc::new(SnapshotHub::default());
        let (_h, mut sub) = hub.subscribe();
        let (tx, rx) = channel();
        let pump = spawn_pump(rx, Arc::clone(&hub)).unwrap();

        for (id, ts) in [(1, 10u32), (1, 11), (0, 12)] {
            let mut s = Snapshot { timestamp: ts, ..Default::default() };
            s.vehicle.id = id;
            tx.send(Arc::new(s)).unwrap();
        }
        drop(tx);
        pump.join().unwrap();

        let mut got = Vec::new();
        while let Ok(s) = sub.try_recv() {
            got.push((s.vehicle.id, s.timestamp));
        }
        assert_eq!(got, vec![(1, 10), (1, 11), (0, 12)]);
        assert_eq!(hub.stats().published, 3);
    }

    #[test]
    fn session_without_ingest_has_no_state() {
        let session = AppSession::new(Arc::new(SnapshotHub::default()));
        assert!(session.current().is_none());
        assert!(session.ingest_stats.is_none());
    }
}
