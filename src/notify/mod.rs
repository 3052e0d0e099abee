//! Alert delivery
//!
//! The notifier task is the single consumer of the alert queue. On every tick
//! it drains up to `max_per_poll` alerts in FIFO order and hands each to a
//! `Notifier`. Delivery is at-most-once: a failed alert is logged and not
//! re-queued.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::NotifierConfig;
use crate::core::channels::{AlertMessage, AlertReceiver};

pub mod discord;

pub use discord::DiscordNotifier;

/// Delivery failures
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Request could not be sent
    #[error("Notification request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("Notification rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Destination for alert messages
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, message: &AlertMessage) -> Result<(), NotifyError>;

    fn name(&self) -> &'static str;
}

/// Writes alerts to the log; used when no webhook is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, message: &AlertMessage) -> Result<(), NotifyError> {
        info!(symbol = %message.symbol, "[NOTIFY] {}", message);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Pacing of the notifier task
#[derive(Debug, Clone, Copy)]
pub struct NotifierSettings {
    pub poll_interval: Duration,
    pub max_per_poll: usize,
}

impl From<&NotifierConfig> for NotifierSettings {
    fn from(config: &NotifierConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_per_poll: config.max_per_poll,
        }
    }
}

/// Totals reported when the task exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifierStats {
    pub delivered: usize,
    pub failed: usize,
}

/// Drain up to `max` alerts and deliver them in order
pub async fn deliver_batch<N>(receiver: &mut AlertReceiver, notifier: &N, max: usize) -> NotifierStats
where
    N: Notifier + ?Sized,
{
    let mut stats = NotifierStats::default();

    for _ in 0..max {
        let Some(message) = receiver.try_receive() else {
            break;
        };
        match notifier.deliver(&message).await {
            Ok(()) => stats.delivered += 1,
            Err(e) => {
                warn!(
                    notifier = notifier.name(),
                    symbol = %message.symbol,
                    error = %e,
                    "[NOTIFY] Delivery failed, alert discarded"
                );
                stats.failed += 1;
            }
        }
    }

    if stats.delivered + stats.failed == 0 {
        debug!("No new alerts to send");
    }
    stats
}

/// Consume the alert queue until shutdown
pub async fn notifier_task<N>(
    mut receiver: AlertReceiver,
    notifier: N,
    settings: NotifierSettings,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> NotifierStats
where
    N: Notifier,
{
    let mut ticker = interval(settings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut totals = NotifierStats::default();

    info!(
        notifier = notifier.name(),
        interval = ?settings.poll_interval,
        max_per_poll = settings.max_per_poll,
        "Notifier task started"
    );

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                info!("[SHUTDOWN] Notifier task stopping");
                break;
            }
            _ = ticker.tick() => {
                let batch = deliver_batch(&mut receiver, &notifier, settings.max_per_poll).await;
                totals.delivered += batch.delivered;
                totals.failed += batch.failed;
            }
        }
    }

    info!(delivered = totals.delivered, failed = totals.failed, "Notifier task stopped");
    totals
}
