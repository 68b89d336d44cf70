//! Publisher seam and an in-process broker.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::{MessagingError, Result};

/// Queue carrying appointment events into this service.
pub const APPOINTMENT_QUEUE: &str = "appointment-queue";
/// Queue carrying booking events out of this service.
pub const BOOKING_QUEUE: &str = "booking-queue";

const DEFAULT_CAPACITY: usize = 1024;
const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// A message as delivered by the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerMessage {
    pub queue: String,
    /// JSON text of the event.
    pub body: String,
    pub published_at: DateTime<Utc>,
}

/// Fallible transport used by producers.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, queue: &str, body: String) -> Result<()>;
}

#[derive(Debug, Default)]
struct BrokerState {
    queues: HashMap<String, broadcast::Sender<BrokerMessage>>,
    history: VecDeque<BrokerMessage>,
    fail_on_publish: bool,
}

/// In-process broker backed by one broadcast channel per queue.
///
/// The most recent published messages, across all queues, are kept in a
/// bounded history so tests can inspect what was sent even when nobody was
/// subscribed. Older messages are dropped once the limit is reached.
#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    state: Arc<RwLock<BrokerState>>,
    capacity: usize,
    history_limit: usize,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(BrokerState::default())),
            capacity: capacity.max(1),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Keeps at most `limit` messages in the history. Zero disables it.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Subscribes to a queue, creating it on first use.
    pub fn subscribe(&self, queue: &str) -> broadcast::Receiver<BrokerMessage> {
        let mut state = self.state.write();
        state
            .queues
            .entry(queue.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Makes every publish fail until switched off.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().fail_on_publish = fail;
    }

    /// Returns the retained messages published to a queue, oldest first.
    pub fn history(&self, queue: &str) -> Vec<BrokerMessage> {
        self.state
            .read()
            .history
            .iter()
            .filter(|m| m.queue == queue)
            .cloned()
            .collect()
    }

    pub fn published_count(&self, queue: &str) -> usize {
        self.state
            .read()
            .history
            .iter()
            .filter(|m| m.queue == queue)
            .count()
    }

    /// Decodes the history of a queue as JSON values.
    pub fn history_json(&self, queue: &str) -> Result<Vec<serde_json::Value>> {
        self.history(queue)
            .iter()
            .map(|m| serde_json::from_str(&m.body).map_err(MessagingError::from))
            .collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryBroker {
    async fn publish(&self, queue: &str, body: String) -> Result<()> {
        let mut state = self.state.write();
        if state.fail_on_publish {
            return Err(MessagingError::Publish(format!(
                "broker unavailable, dropping message for {queue}"
            )));
        }

        let message = BrokerMessage {
            queue: queue.to_string(),
            body,
            published_at: Utc::now(),
        };
        if self.history_limit > 0 {
            if state.history.len() == self.history_limit {
                state.history.pop_front();
            }
            state.history.push_back(message.clone());
        }

        // No subscriber is not an error.
        if let Some(sender) = state.queues.get(queue) {
            let _ = sender.send(message);
        }
        Ok(())
    }
}
