//! Poll scheduler driving the reconcile -> calculate -> detect cycle
//!
//! # Architecture
//! - One cycle per `tokio::time::interval` tick, measured start to start
//! - Cycles run inline in the loop, so two cycles never overlap; ticks that
//!   fire while a cycle is running are skipped (`MissedTickBehavior::Skip`)
//! - Shutdown-aware via broadcast receiver; an in-flight cycle gets
//!   `shutdown_grace` to finish and is abandoned after that
//! - A panicking cycle is logged and the loop continues
//!
//! The scheduler exclusively owns the change detector (previous spreads) and
//! a producer handle of the alert queue.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::sync::broadcast;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::adapters::PriceSource;
use crate::config::AppConfig;
use crate::core::channels::AlertSender;
use crate::core::detector::{ChangeDetector, DetectorConfig};
use crate::core::history::HistorySink;
use crate::core::spread::RateCalculator;
use crate::core::symbols::SymbolReconciler;

/// Timing configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between the start of two cycles
    pub poll_interval: Duration,
    /// Time an in-flight cycle may keep running after shutdown
    pub shutdown_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// Summary of one completed cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub common_symbols: usize,
    pub rates: usize,
    pub omitted: usize,
    pub alerts: usize,
    pub dropped: usize,
}

/// Drives monitoring cycles over two venues
pub struct PollScheduler<A, B> {
    venue_a: A,
    venue_b: B,
    reconciler: SymbolReconciler,
    calculator: RateCalculator,
    detector: ChangeDetector,
    alerts: AlertSender,
    history: Option<Box<dyn HistorySink>>,
    config: SchedulerConfig,
    cycles: u64,
}

impl<A, B> PollScheduler<A, B>
where
    A: PriceSource,
    B: PriceSource,
{
    pub fn new(
        venue_a: A,
        venue_b: B,
        reconciler: SymbolReconciler,
        calculator: RateCalculator,
        detector: ChangeDetector,
        alerts: AlertSender,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            venue_a,
            venue_b,
            reconciler,
            calculator,
            detector,
            alerts,
            history: None,
            config,
            cycles: 0,
        }
    }

    /// Build every component from the application configuration
    pub fn from_config(venue_a: A, venue_b: B, config: &AppConfig, alerts: AlertSender) -> Self {
        let monitor = &config.monitor;
        let reconciler = SymbolReconciler::new(
            config.venues.a.symbol_rules(),
            config.venues.b.symbol_rules(),
            monitor.fetch_timeout(),
        );
        let calculator = RateCalculator::new(
            monitor.reference_venue,
            monitor.fetch_timeout(),
            monitor.max_in_flight,
        );
        let detector = ChangeDetector::new(DetectorConfig {
            threshold: monitor.change_threshold,
            freshness_window: monitor.freshness_window(),
        });
        let scheduler_config = SchedulerConfig {
            poll_interval: monitor.poll_interval(),
            shutdown_grace: monitor.shutdown_grace(),
        };
        Self::new(venue_a, venue_b, reconciler, calculator, detector, alerts, scheduler_config)
    }

    pub fn with_history(mut self, sink: Box<dyn HistorySink>) -> Self {
        self.history = Some(sink);
        self
    }

    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    /// Number of cycles started so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one full cycle
    ///
    /// Fetch failures are absorbed by the reconciler and calculator; the
    /// detector runs only once the snapshot is complete.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycles += 1;
        let cycle = self.cycles;
        let started = Instant::now();

        let common = self.reconciler.reconcile(&self.venue_a, &self.venue_b).await;
        if common.is_empty() {
            info!(cycle, "[CYCLE] No common symbols, nothing to compare");
            return CycleReport {
                cycle,
                ..CycleReport::default()
            };
        }

        let snapshot = self
            .calculator
            .calculate(&self.venue_a, &self.venue_b, &common)
            .await;

        let detection = self.detector.detect(&snapshot, &self.alerts);

        if let Some(history) = &self.history {
            if let Err(e) = history.record(cycle, &snapshot).await {
                warn!(cycle, error = %e, "Failed to record spread history");
            }
        }

        let report = CycleReport {
            cycle,
            common_symbols: common.len(),
            rates: snapshot.len(),
            omitted: snapshot.omitted,
            alerts: detection.emitted,
            dropped: detection.dropped,
        };

        info!(
            cycle,
            common = report.common_symbols,
            rates = report.rates,
            omitted = report.omitted,
            alerts = report.alerts,
            dropped = report.dropped,
            queued = self.alerts.pending(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "[CYCLE] Cycle complete"
        );
        report
    }

    /// Run cycles until shutdown; returns the scheduler for inspection
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) -> Self {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let grace = self.config.shutdown_grace;

        info!(
            venue_a = self.venue_a.venue_name(),
            venue_b = self.venue_b.venue_name(),
            interval = ?self.config.poll_interval,
            "Poll scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("[SHUTDOWN] Poll scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let cycle = AssertUnwindSafe(self.run_cycle()).catch_unwind();
                    tokio::pin!(cycle);

                    let shutting_down = tokio::select! {
                        outcome = &mut cycle => {
                            log_panic(outcome);
                            false
                        }
                        _ = shutdown_rx.recv() => {
                            warn!(grace = ?grace, "[SHUTDOWN] Shutdown during cycle, waiting for completion");
                            match timeout(grace, &mut cycle).await {
                                Ok(outcome) => log_panic(outcome),
                                Err(_) => warn!("[SHUTDOWN] In-flight cycle abandoned before detection"),
                            }
                            true
                        }
                    };

                    if shutting_down {
                        break;
                    }
                }
            }
        }

        info!(cycles = self.cycles, "Poll scheduler stopped");
        self
    }
}

fn log_panic(outcome: Result<CycleReport, Box<dyn Any + Send>>) {
    if let Err(panic) = outcome {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!(reason = %reason, "[CYCLE] Cycle failed, continuing with next tick");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::create_source;
    use crate::adapters::test_utils::MockPriceSource;
    use crate::config::{ReferenceVenue, VenueKind};
    use crate::core::channels::{alert_queue, AlertReceiver};
    use crate::core::history::JsonlHistory;
    use crate::core::symbols::{Symbol, SymbolRules};
    use std::sync::Arc;

    type MockScheduler = PollScheduler<Arc<MockPriceSource>, Arc<MockPriceSource>>;

    fn venues() -> (Arc<MockPriceSource>, Arc<MockPriceSource>) {
        let a = Arc::new(
            MockPriceSource::new("bybit")
                .with_price("BTCUSDT", 100.0)
                .with_price("ETHUSDT", 50.0),
        );
        let b = Arc::new(
            MockPriceSource::new("coinbase")
                .with_price("BTC-USD", 101.0)
                .with_price("ETH-USD", 50.5),
        );
        (a, b)
    }

    fn scheduler(
        a: Arc<MockPriceSource>,
        b: Arc<MockPriceSource>,
        config: SchedulerConfig,
    ) -> (MockScheduler, AlertReceiver) {
        let (tx, rx) = alert_queue(100);
        let scheduler = PollScheduler::new(
            a,
            b,
            SymbolReconciler::new(
                SymbolRules::for_kind(VenueKind::Bybit),
                SymbolRules::for_kind(VenueKind::Coinbase),
                Duration::from_millis(500),
            ),
            RateCalculator::new(ReferenceVenue::A, Duration::from_millis(500), 2),
            ChangeDetector::default(),
            tx,
            config,
        );
        (scheduler, rx)
    }

    fn fast() -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_millis(30),
            shutdown_grace: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_cycles_detect_changes() {
        let (a, b) = venues();
        let (mut scheduler, mut rx) = scheduler(a, b.clone(), fast());

        let first = scheduler.run_cycle().await;
        assert_eq!(first.common_symbols, 2);
        assert_eq!(first.rates, 2);
        assert_eq!(first.alerts, 0);

        // BTC spread moves from 1% to 2%
        b.set_price("BTC-USD", 102.0);
        let second = scheduler.run_cycle().await;
        assert_eq!(second.cycle, 2);
        assert_eq!(second.alerts, 1);

        let message = rx.try_receive().unwrap();
        assert_eq!(message.symbol, Symbol::from("BTC/USD"));
        assert!(rx.try_receive().is_none());
    }

    #[tokio::test]
    async fn test_failed_symbol_keeps_previous_value() {
        let (a, b) = venues();
        let (mut scheduler, _rx) = scheduler(a, b.clone(), fast());
        scheduler.run_cycle().await;
        let eth_before = scheduler.detector().previous(&Symbol::from("ETH/USD")).unwrap();

        b.fail_symbol("ETH-USD");
        b.set_price("BTC-USD", 102.0);
        let report = scheduler.run_cycle().await;

        assert_eq!(report.rates, 1);
        assert_eq!(report.omitted, 1);
        assert_eq!(scheduler.detector().previous(&Symbol::from("ETH/USD")), Some(eth_before));
    }

    #[tokio::test]
    async fn test_listing_failure_is_empty_cycle() {
        let (a, b) = venues();
        let (mut scheduler, _rx) = scheduler(a.clone(), b, fast());
        scheduler.run_cycle().await;

        a.set_listing_down(true);
        let report = scheduler.run_cycle().await;

        assert_eq!(report.common_symbols, 0);
        assert_eq!(report.rates, 0);
        assert_eq!(scheduler.detector().previous_rates().len(), 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (a, b) = venues();
        let (scheduler, _rx) = scheduler(a, b, fast());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(scheduler.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(()).unwrap();

        let scheduler = timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler should stop")
            .unwrap();
        assert!(scheduler.cycles() >= 2);
    }

    #[tokio::test]
    async fn test_cycles_never_overlap() {
        let a = Arc::new(
            MockPriceSource::new("slow")
                .with_price("BTCUSDT", 100.0)
                .with_delay(Duration::from_millis(100)),
        );
        let b = Arc::new(MockPriceSource::new("coinbase").with_price("BTC-USD", 101.0));
        let (scheduler, _rx) = scheduler(a.clone(), b, fast());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(scheduler.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(350)).await;
        shutdown_tx.send(()).unwrap();
        let scheduler = handle.await.unwrap();

        // Each cycle takes ~100ms, so at most 4 can start within 350ms
        assert!(scheduler.cycles() <= 4, "cycles: {}", scheduler.cycles());
        assert!(a.price_calls.load(std::sync::atomic::Ordering::SeqCst) as u64 <= scheduler.cycles());
    }

    #[tokio::test]
    async fn test_in_flight_cycle_abandoned_after_grace() {
        let a = Arc::new(
            MockPriceSource::new("slow")
                .with_price("BTCUSDT", 100.0)
                .with_delay(Duration::from_millis(400)),
        );
        let b = Arc::new(MockPriceSource::new("coinbase").with_price("BTC-USD", 101.0));
        let (scheduler, _rx) = scheduler(a, b, fast());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(scheduler.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown_tx.send(()).unwrap();

        let scheduler = timeout(Duration::from_millis(300), handle)
            .await
            .expect("grace period should bound shutdown")
            .unwrap();
        assert!(scheduler.detector().previous_rates().is_empty());
    }

    #[tokio::test]
    async fn test_panicking_cycle_does_not_stop_scheduler() {
        let (a, b) = venues();
        a.set_panic_on_list(true);
        let config = SchedulerConfig {
            poll_interval: Duration::from_millis(20),
            shutdown_grace: Duration::from_millis(50),
        };
        let (scheduler, _rx) = scheduler(a.clone(), b, config);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(scheduler.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(90)).await;
        a.set_panic_on_list(false);
        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown_tx.send(()).unwrap();

        let scheduler = timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler should stop after panicking cycles")
            .expect("panics must not escape the scheduler task");

        assert!(scheduler.cycles() >= 3, "cycles: {}", scheduler.cycles());
        assert!(a.list_calls.load(std::sync::atomic::Ordering::SeqCst) >= 3);
        // Cycles after recovery update state again
        assert!(scheduler.detector().previous(&Symbol::from("BTC/USD")).is_some());
    }

    #[test]
    fn test_run_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}

        let venue = |kind| crate::config::VenueConfig {
            kind,
            base_url: None,
            rules: None,
        };
        let (tx, _rx) = alert_queue(1);
        let scheduler = PollScheduler::new(
            create_source(&venue(VenueKind::Bybit), Duration::from_secs(1)),
            create_source(&venue(VenueKind::Coinbase), Duration::from_secs(1)),
            SymbolReconciler::new(
                SymbolRules::for_kind(VenueKind::Bybit),
                SymbolRules::for_kind(VenueKind::Coinbase),
                Duration::from_secs(1),
            ),
            RateCalculator::new(ReferenceVenue::A, Duration::from_secs(1), 2),
            ChangeDetector::default(),
            tx,
            SchedulerConfig::default(),
        );
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        assert_send(&scheduler.run(shutdown_rx));
    }

    #[tokio::test]
    async fn test_history_written_per_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let (a, b) = venues();
        let (scheduler, _rx) = scheduler(a, b, fast());
        let mut scheduler = scheduler.with_history(Box::new(JsonlHistory::new(&path)));

        scheduler.run_cycle().await;
        scheduler.run_cycle().await;

        let lines = std::fs::read_to_string(&path).unwrap().lines().count();
        assert_eq!(lines, 4);
    }
}
