//! Change detection against the previous cycle's spreads.
//!
//! Owns the previous spread per symbol. For each symbol in a new
//! `RateSnapshot` the relative change against the previous value is compared
//! with the threshold; every valid new reading then replaces the previous one.
//! Symbols missing from the snapshot keep their old value.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::core::channels::{AlertMessage, AlertSender, QueueError};
use crate::core::spread::RateSnapshot;
use crate::core::symbols::Symbol;

/// Configuration for the change detector.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Relative change strictly above which an alert fires (default 0.0001)
    pub threshold: f64,
    /// Alert only if the previous update is no older than this (off by default)
    pub freshness_window: Option<Duration>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0001,
            freshness_window: None,
        }
    }
}

/// What one `detect` call produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Detection {
    /// Alerts accepted by the queue
    pub emitted: usize,
    /// Alerts lost to overflow or a closed queue
    pub dropped: usize,
    /// Symbols whose previous value was written
    pub updated: usize,
}

/// Stateful spread change detector.
pub struct ChangeDetector {
    config: DetectorConfig,
    previous: HashMap<Symbol, f64>,
    last_updated: Option<Instant>,
}

impl ChangeDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            previous: HashMap::new(),
            last_updated: None,
        }
    }

    /// Seed previous values (e.g. to resume from a known state).
    pub fn with_previous<I>(mut self, rates: I) -> Self
    where
        I: IntoIterator<Item = (Symbol, f64)>,
    {
        self.previous
            .extend(rates.into_iter().filter(|(_, rate)| rate.is_finite()));
        self
    }

    pub fn previous(&self, symbol: &Symbol) -> Option<f64> {
        self.previous.get(symbol).copied()
    }

    pub fn previous_rates(&self) -> &HashMap<Symbol, f64> {
        &self.previous
    }

    pub fn threshold(&self) -> f64 {
        self.config.threshold
    }

    /// Decide whether `current` is a reportable change for `symbol`.
    ///
    /// Pure: does not touch state. `None` when there is no previous value,
    /// the previous value is exactly zero, or the change is within threshold.
    pub fn evaluate(&self, symbol: &Symbol, current: f64) -> Option<AlertMessage> {
        let previous = self.previous(symbol)?;
        if previous == 0.0 {
            return None;
        }

        let relative_change = ((current - previous) / previous).abs();
        if !relative_change.is_finite() || relative_change <= self.config.threshold {
            return None;
        }

        Some(AlertMessage::new(
            symbol.clone(),
            previous,
            current,
            relative_change,
            self.config.threshold,
        ))
    }

    /// Run detection for one cycle.
    ///
    /// Each alert is enqueued as soon as it is produced. Previous values are
    /// overwritten for every symbol in the snapshot, alert or not. A `0.0`
    /// spread (equal prices) is stored like any reading and is skipped as a
    /// previous value on the next cycle.
    pub fn detect(&mut self, snapshot: &RateSnapshot, alerts: &AlertSender) -> Detection {
        let gate_open = self.freshness_gate_open();
        let mut detection = Detection::default();

        for (symbol, current) in snapshot.iter() {
            if !current.is_finite() {
                continue;
            }

            if gate_open {
                if let Some(message) = self.evaluate(symbol, current) {
                    info!(
                        symbol = %symbol,
                        previous = message.previous,
                        current = message.current,
                        change = %format!("{:.4}%", message.relative_change * 100.0),
                        "[ALERT] {}", message
                    );
                    match alerts.enqueue(message) {
                        Ok(()) => detection.emitted += 1,
                        Err(QueueError::Overflow(capacity)) => {
                            warn!(symbol = %symbol, capacity, "[ALERT] Queue full, alert dropped");
                            detection.dropped += 1;
                        }
                        Err(QueueError::Closed) => {
                            error!(symbol = %symbol, "[ALERT] Queue closed, alert dropped");
                            detection.dropped += 1;
                        }
                    }
                }
            }

            self.previous.insert(symbol.clone(), current);
            detection.updated += 1;
        }

        self.last_updated = Some(Instant::now());
        detection
    }

    fn freshness_gate_open(&self) -> bool {
        match (self.config.freshness_window, self.last_updated) {
            (Some(window), Some(last)) => last.elapsed() <= window,
            _ => true,
        }
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channels::alert_queue;

    fn sym(s: &str) -> Symbol {
        Symbol::from(s)
    }

    fn snapshot(rates: &[(&str, f64)]) -> RateSnapshot {
        rates.iter().map(|(s, r)| (sym(s), *r)).collect()
    }

    fn detector_with(symbol: &str, previous: f64) -> ChangeDetector {
        ChangeDetector::default().with_previous([(sym(symbol), previous)])
    }

    #[test]
    fn test_first_reading_never_alerts() {
        let (tx, mut rx) = alert_queue(10);
        let mut detector = ChangeDetector::default();

        let detection = detector.detect(&snapshot(&[("BTC", 0.5)]), &tx);

        assert_eq!(detection.emitted, 0);
        assert_eq!(detector.previous(&sym("BTC")), Some(0.5));
        assert!(rx.try_receive().is_none());
    }

    #[test]
    fn test_change_above_threshold_alerts() {
        // 100.0 -> 100.02: relative change 0.0002 > 0.0001
        let (tx, mut rx) = alert_queue(10);
        let mut detector = detector_with("BTC", 100.0);

        let detection = detector.detect(&snapshot(&[("BTC", 100.02)]), &tx);

        assert_eq!(detection.emitted, 1);
        let message = rx.try_receive().unwrap();
        assert_eq!(message.symbol, sym("BTC"));
        assert_eq!(message.previous, 100.0);
        assert_eq!(message.current, 100.02);
        assert_eq!(detector.previous(&sym("BTC")), Some(100.02));
    }

    #[test]
    fn test_change_within_threshold_is_silent() {
        // 100.0 -> 100.005: relative change 0.00005 <= 0.0001
        let (tx, mut rx) = alert_queue(10);
        let mut detector = detector_with("BTC", 100.0);

        let detection = detector.detect(&snapshot(&[("BTC", 100.005)]), &tx);

        assert_eq!(detection.emitted, 0);
        assert!(rx.try_receive().is_none());
        assert_eq!(detector.previous(&sym("BTC")), Some(100.005));
    }

    #[test]
    fn test_change_equal_to_threshold_is_silent() {
        let detector = ChangeDetector::new(DetectorConfig {
            threshold: 0.5,
            freshness_window: None,
        })
        .with_previous([(sym("BTC"), 2.0)]);

        // |3 - 2| / 2 = 0.5, not strictly greater
        assert!(detector.evaluate(&sym("BTC"), 3.0).is_none());
        assert!(detector.evaluate(&sym("BTC"), 3.01).is_some());
    }

    #[test]
    fn test_zero_previous_skips_and_recovers() {
        let (tx, mut rx) = alert_queue(10);
        let mut detector = detector_with("BTC", 0.0);

        let detection = detector.detect(&snapshot(&[("BTC", 5.0)]), &tx);

        assert_eq!(detection.emitted, 0);
        assert!(rx.try_receive().is_none());
        assert_eq!(detector.previous(&sym("BTC")), Some(5.0));

        // Next cycle computes against the recovered nonzero value
        let detection = detector.detect(&snapshot(&[("BTC", 6.0)]), &tx);
        assert_eq!(detection.emitted, 1);
    }

    #[test]
    fn test_zero_spread_is_stored_then_skipped() {
        let (tx, mut rx) = alert_queue(10);
        let mut detector = detector_with("BTC", 1.0);

        // Equal prices: large relative move, alert, and 0.0 becomes previous
        let detection = detector.detect(&snapshot(&[("BTC", 0.0)]), &tx);
        assert_eq!(detection.emitted, 1);
        assert_eq!(detector.previous(&sym("BTC")), Some(0.0));
        rx.try_receive().unwrap();

        let detection = detector.detect(&snapshot(&[("BTC", 2.0)]), &tx);
        assert_eq!(detection.emitted, 0);
        assert_eq!(detection.updated, 1);
        assert!(rx.try_receive().is_none());
        assert_eq!(detector.previous(&sym("BTC")), Some(2.0));
    }

    #[test]
    fn test_negative_previous_uses_magnitude() {
        let detector = detector_with("ETH", -0.5);
        let message = detector.evaluate(&sym("ETH"), -0.6).unwrap();
        assert!((message.relative_change - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_absent_symbols_keep_previous_value() {
        let (tx, _rx) = alert_queue(10);
        let mut detector = ChangeDetector::default()
            .with_previous([(sym("BTC"), 1.0), (sym("X"), 2.0)]);

        let detection = detector.detect(&snapshot(&[("BTC", 1.0)]), &tx);

        assert_eq!(detection.updated, 1);
        assert_eq!(detector.previous(&sym("X")), Some(2.0));
    }

    #[test]
    fn test_non_finite_reading_never_stored() {
        let (tx, _rx) = alert_queue(10);
        let mut detector = detector_with("BTC", 1.0);

        detector.detect(&snapshot(&[("BTC", f64::NAN), ("ETH", f64::INFINITY)]), &tx);

        assert_eq!(detector.previous(&sym("BTC")), Some(1.0));
        assert!(detector.previous(&sym("ETH")).is_none());
    }

    #[test]
    fn test_overflow_still_updates_state() {
        let (tx, mut rx) = alert_queue(1);
        let mut detector = ChangeDetector::default()
            .with_previous([(sym("A"), 1.0), (sym("B"), 1.0)]);

        let detection = detector.detect(&snapshot(&[("A", 2.0), ("B", 2.0)]), &tx);

        assert_eq!(detection.emitted, 1);
        assert_eq!(detection.dropped, 1);
        assert_eq!(detection.updated, 2);
        assert!(rx.try_receive().is_some());
        assert_eq!(detector.previous(&sym("A")), Some(2.0));
        assert_eq!(detector.previous(&sym("B")), Some(2.0));
    }

    #[test]
    fn test_alerts_across_cycles_are_not_deduplicated() {
        let (tx, mut rx) = alert_queue(10);
        let mut detector = detector_with("BTC", 1.0);

        detector.detect(&snapshot(&[("BTC", 2.0)]), &tx);
        detector.detect(&snapshot(&[("BTC", 3.0)]), &tx);

        assert_eq!(rx.try_receive().unwrap().current, 2.0);
        assert_eq!(rx.try_receive().unwrap().current, 3.0);
    }

    #[test]
    fn test_freshness_gate_blocks_stale_alerts() {
        let (tx, mut rx) = alert_queue(10);
        let mut detector = ChangeDetector::new(DetectorConfig {
            threshold: 0.0001,
            freshness_window: Some(Duration::from_millis(20)),
        });

        detector.detect(&snapshot(&[("BTC", 1.0)]), &tx);
        std::thread::sleep(Duration::from_millis(60));
        let detection = detector.detect(&snapshot(&[("BTC", 2.0)]), &tx);

        assert_eq!(detection.emitted, 0);
        assert!(rx.try_receive().is_none());
        assert_eq!(detector.previous(&sym("BTC")), Some(2.0));

        // Immediately after an update the gate is open again
        let detection = detector.detect(&snapshot(&[("BTC", 3.0)]), &tx);
        assert_eq!(detection.emitted, 1);
    }
}
