//! Full-collection snapshots and their fan-out to subscribers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::order::{Category, LineStatus, OrderLine};

/// The whole order collection as of one committed mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
    /// Strictly increasing per store.
    pub version: u64,
    pub lines: Vec<OrderLine>,
    pub taken_at: DateTime<Utc>,
}

impl OrderSnapshot {
    pub fn new(version: u64, lines: Vec<OrderLine>) -> Self {
        Self {
            version,
            lines,
            taken_at: Utc::now(),
        }
    }

    pub fn line(&self, id: &str) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.id == id)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Units still open (not completed) in a category.
    pub fn open_units(&self, category: Category) -> u64 {
        self.lines
            .iter()
            .filter(|l| l.category == category && l.status != LineStatus::Completed)
            .map(|l| u64::from(l.quantity))
            .sum()
    }
}

/// Broadcasts snapshots to every subscribed client.
#[derive(Clone)]
pub struct SnapshotBroadcaster {
    sender: Arc<broadcast::Sender<Arc<OrderSnapshot>>>,
}

impl SnapshotBroadcaster {
    /// Creates a broadcaster buffering up to `capacity` snapshots per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, snapshot: Arc<OrderSnapshot>) {
        // No active receivers is fine.
        let _ = self.sender.send(snapshot);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<OrderSnapshot>> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
