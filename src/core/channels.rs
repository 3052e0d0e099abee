//! Alert queue and shutdown channels
//!
//! The alert queue decouples the change detector (producer) from the
//! notifier (consumer). It is a bounded tokio mpsc channel: enqueueing never
//! waits, and a full queue rejects the newest alert.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::config::constants;
use crate::core::symbols::Symbol;

/// Human-readable alert, text fixed at creation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertMessage {
    pub symbol: Symbol,
    /// Spread (%) of the previous cycle
    pub previous: f64,
    /// Spread (%) of this cycle
    pub current: f64,
    /// |current - previous| / previous
    pub relative_change: f64,
    pub created_at: DateTime<Utc>,
    text: String,
}

impl AlertMessage {
    pub fn new(symbol: Symbol, previous: f64, current: f64, relative_change: f64, threshold: f64) -> Self {
        let text = format!(
            "Spread for {} changed by {:.4}% (threshold {:.4}%): {:.6}% compared to {:.6}%",
            symbol,
            relative_change * 100.0,
            threshold * 100.0,
            current,
            previous
        );
        Self {
            symbol,
            previous,
            current,
            relative_change,
            created_at: Utc::now(),
            text,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for AlertMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Producer-side queue failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Queue at capacity, the new alert was dropped
    #[error("Alert queue full (capacity {0}), alert dropped")]
    Overflow(usize),

    /// Consumer side is gone
    #[error("Alert queue closed")]
    Closed,
}

/// Producer handle, cheap to clone
#[derive(Debug, Clone)]
pub struct AlertSender {
    tx: mpsc::Sender<AlertMessage>,
}

impl AlertSender {
    /// Append to the tail without waiting
    pub fn enqueue(&self, message: AlertMessage) -> Result<(), QueueError> {
        self.tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Overflow(self.tx.max_capacity()),
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Alerts queued and not yet drained
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer handle (single consumer)
#[derive(Debug)]
pub struct AlertReceiver {
    rx: mpsc::Receiver<AlertMessage>,
}

impl AlertReceiver {
    /// Remove and return the oldest alert, or `None` when empty
    pub fn try_receive(&mut self) -> Option<AlertMessage> {
        self.rx.try_recv().ok()
    }
}

/// Create a bounded alert queue
pub fn alert_queue(capacity: usize) -> (AlertSender, AlertReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (AlertSender { tx }, AlertReceiver { rx })
}

/// Bundle of all inter-task communication channels
#[derive(Debug)]
pub struct ChannelBundle {
    /// Detector -> Notifier: alerts
    pub alert_tx: AlertSender,
    pub alert_rx: AlertReceiver,

    /// Shutdown broadcast: main -> all tasks
    pub shutdown_tx: broadcast::Sender<()>,
}

impl ChannelBundle {
    pub fn new(capacity: usize) -> Self {
        let (alert_tx, alert_rx) = alert_queue(capacity);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            alert_tx,
            alert_rx,
            shutdown_tx,
        }
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new(constants::alert_queue_capacity())
    }
}
