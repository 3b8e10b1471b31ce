//! Periodic status summary for an external presence service.
//!
//! The timer only reads the retained vehicle state; it never sees menu packets
//! and never blocks ingestion.

use std::sync::Arc;
use std::time::Duration;

use relay_ingest_core::Snapshot;
use relay_ingest_fh::CurrentState;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceSummary {
    pub state: String,
    pub details: String,
    pub large_image_key: String,
    pub small_image_key: String,
    pub small_image_text: String,
}

impl PresenceSummary {
    pub fn from_snapshot(s: &Snapshot) -> Self {
        let class = s.vehicle.class.to_string();
        Self {
            state: format!("{} MPH ({} KPH)", s.mph() as i32, s.kph() as i32),
            details: "Exploring México".into(),
            large_image_key: "logo".into(),
            small_image_key: format!("carclass-{}", class.to_lowercase()),
            small_image_text: format!("{} | {}", class, s.vehicle.pi_value),
        }
    }
}

/// Destination for presence updates (rich-presence client, status page, ...).
pub trait PresenceSink: Send + Sync + 'static {
    fn update(&self, summary: &PresenceSummary);
}

/// Writes the summary to the log; used when no external service is configured.
pub struct LogPresence;

impl PresenceSink for LogPresence {
    fn update(&self, summary: &PresenceSummary) {
        tracing::debug!(
            state = %summary.state,
            class = %summary.small_image_text,
            "presence update"
        );
    }
}

/// Push one summary if there is a vehicle to describe.
pub fn refresh(current: Option<&Snapshot>, sink: &dyn PresenceSink) -> bool {
    match current {
        Some(s) => {
            sink.update(&PresenceSummary::from_snapshot(s));
            true
        }
        None => false,
    }
}

pub fn spawn_presence(
    state: CurrentState,
    sink: Arc<dyn PresenceSink>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            refresh(state.load().as_deref(), sink.as_ref());
        }
    })
}
