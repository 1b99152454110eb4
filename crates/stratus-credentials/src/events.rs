use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// LifecycleEvent
// ---------------------------------------------------------------------------

/// Structured lifecycle events emitted by the reconciler.
///
/// These are the observability boundary: consumers (log shippers, the
/// operational API, tests) subscribe through the [`EventBus`]; the exact
/// downstream schema is their concern.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    AccountAdded {
        account: String,
        timestamp: DateTime<Utc>,
    },
    AccountUpdated {
        account: String,
        timestamp: DateTime<Utc>,
    },
    AccountDeleted {
        account: String,
        timestamp: DateTime<Utc>,
    },
    ParseFailure {
        account: String,
        cause: String,
        timestamp: DateTime<Utc>,
    },
    CycleCompleted {
        added: usize,
        updated: usize,
        deleted: usize,
        unchanged: usize,
        parse_failures: usize,
        apply_failures: usize,
        timestamp: DateTime<Utc>,
    },
}

impl LifecycleEvent {
    /// The account an event concerns, when it concerns exactly one.
    pub fn account(&self) -> Option<&str> {
        match self {
            LifecycleEvent::AccountAdded { account, .. }
            | LifecycleEvent::AccountUpdated { account, .. }
            | LifecycleEvent::AccountDeleted { account, .. }
            | LifecycleEvent::ParseFailure { account, .. } => Some(account),
            LifecycleEvent::CycleCompleted { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// A broadcast-style event bus built on top of flume channels.
///
/// Each call to [`subscribe`](EventBus::subscribe) creates a new receiver
/// that will receive all events published after the subscription was
/// created. The bus is thread-safe and can be cloned cheaply (it wraps its
/// internals in an `Arc`).
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<Vec<flume::Sender<LifecycleEvent>>>>,
}

impl EventBus {
    /// Create a new, empty event bus with no subscribers.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a new subscriber and return its receiving end.
    pub fn subscribe(&self) -> flume::Receiver<LifecycleEvent> {
        let (tx, rx) = flume::unbounded();
        let mut senders = self.inner.lock().expect("EventBus lock poisoned");
        senders.push(tx);
        rx
    }

    /// Publish an event to all current subscribers.
    ///
    /// Disconnected subscribers (whose receivers have been dropped) are
    /// automatically pruned.
    pub fn publish(&self, event: LifecycleEvent) {
        let mut senders = self.inner.lock().expect("EventBus lock poisoned");
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Return the number of currently active subscribers.
    pub fn subscriber_count(&self) -> usize {
        let senders = self.inner.lock().expect("EventBus lock poisoned");
        senders.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
