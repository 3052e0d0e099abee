//! Spread watch entry point
//!
//! 1. Loads `.env` and configuration
//! 2. Builds the two venue sources
//! 3. Runs the poll scheduler and the notifier until Ctrl+C

use std::path::PathBuf;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};

use spread_watch::adapters::create_source;
use spread_watch::config::{self, constants};
use spread_watch::core::{init_logging, ChannelBundle, JsonlHistory, PollScheduler};
use spread_watch::notify::{notifier_task, DiscordNotifier, LogNotifier, NotifierSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenvy::dotenv().ok();
    init_logging();

    info!("Spread watch starting...");

    let config_path = std::env::var("CONFIG_PATH")
        .ok()
        .or_else(|| std::env::args().nth(1))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.yaml"));

    info!(path = %config_path.display(), "Loading configuration");
    let config = config::load_config(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    constants::log_configuration();

    info!(
        venue_a = %config.venues.a.kind,
        venue_b = %config.venues.b.kind,
        reference = %config.monitor.reference_venue,
        threshold = config.monitor.change_threshold,
        "[CONFIG] Venues configured"
    );

    let fetch_timeout = config.monitor.fetch_timeout();
    let venue_a = create_source(&config.venues.a, fetch_timeout);
    let venue_b = create_source(&config.venues.b, fetch_timeout);

    let channels = ChannelBundle::new(config.monitor.alert_queue_capacity);
    let ChannelBundle {
        alert_tx,
        alert_rx,
        shutdown_tx,
    } = channels;

    let mut scheduler = PollScheduler::from_config(venue_a, venue_b, &config, alert_tx);
    if let Some(path) = &config.history.path {
        info!(path = %path.display(), "Spread history enabled");
        scheduler = scheduler.with_history(Box::new(JsonlHistory::new(path)));
    }
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_tx.subscribe()));

    let settings = NotifierSettings::from(&config.notifier);
    let notifier_shutdown = shutdown_tx.subscribe();
    let notifier_handle = match &config.notifier.discord_webhook_url {
        Some(url) => tokio::spawn(notifier_task(
            alert_rx,
            DiscordNotifier::new(url.clone(), fetch_timeout),
            settings,
            notifier_shutdown,
        )),
        None => {
            info!("No Discord webhook configured, alerts go to the log");
            tokio::spawn(notifier_task(alert_rx, LogNotifier, settings, notifier_shutdown))
        }
    };

    // Spawn SIGINT handler task
    let shutdown_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("[SHUTDOWN] Graceful shutdown initiated");
                let _ = shutdown_signal.send(());
            }
            Err(err) => {
                error!(error = %err, "Failed to listen for Ctrl+C signal");
            }
        }
    });

    match scheduler_handle.await {
        Ok(scheduler) => info!(cycles = scheduler.cycles(), "Poll scheduler finished"),
        Err(e) => error!(error = %e, "Poll scheduler task failed"),
    }
    // Scheduler may have stopped on its own; make sure the notifier follows
    let _ = shutdown_tx.send(());
    match notifier_handle.await {
        Ok(stats) => info!(delivered = stats.delivered, failed = stats.failed, "Notifier finished"),
        Err(e) => error!(error = %e, "Notifier task failed"),
    }

    info!("[SHUTDOWN] Clean exit");
    Ok(())
}
