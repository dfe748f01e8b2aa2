// ── Publishing ──
//
// One `StatsEvent` per successful cycle, handed to a `Publisher` shared
// by every session task.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::CoreError;
use crate::model::StatsTree;

/// The event published after a successful aggregation cycle.
#[derive(Debug, Clone, Serialize)]
pub struct StatsEvent {
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Per-session cycle counter, starting at 1.
    pub counter: u64,
    pub stats: SessionStats,
}

/// The stats payload of one event.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub code: String,
    pub resources: StatsTree,
}

impl StatsEvent {
    pub const KIND: &'static str = "stats";

    pub fn new(code: impl Into<String>, counter: u64, resources: StatsTree) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: Self::KIND,
            counter,
            stats: SessionStats {
                code: code.into(),
                resources,
            },
        }
    }

    pub fn code(&self) -> &str {
        &self.stats.code
    }
}

/// Sink for stats events.
///
/// Called concurrently from every session task; implementations do their
/// own locking.
pub trait Publisher: Send + Sync {
    fn publish(&self, event: StatsEvent) -> Result<(), CoreError>;
}

/// Forwards events into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<StatsEvent>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatsEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Publisher for ChannelPublisher {
    fn publish(&self, event: StatsEvent) -> Result<(), CoreError> {
        self.tx.send(event).map_err(|_| CoreError::Publish {
            message: "event receiver closed".into(),
        })
    }
}
