//! Core module - symbol reconciliation, spread calculation, change detection,
//! alert queue, scheduling, history, logging
//!
//! This module uses **explicit re-exports** instead of glob exports so the
//! public API only changes on purpose.
//!
//! ```ignore
//! use spread_watch::core::{PollScheduler, ChannelBundle, SymbolReconciler};
//! ```

pub mod channels;
pub mod detector;
pub mod history;
pub mod logging;
pub mod runtime;
pub mod spread;
pub mod symbols;

// Explicit re-exports for symbols module
pub use symbols::{
    CommonSymbols, NormalizedSymbol, QuoteKind, Symbol, SymbolPair, SymbolReconciler, SymbolRules,
    VenueSymbolMap,
};

// Explicit re-exports for spread module
pub use spread::{spread_pct, validate_reading, RateCalculator, RateSnapshot};

// Explicit re-exports for detector module
pub use detector::{ChangeDetector, Detection, DetectorConfig};

// Explicit re-exports for channels module
pub use channels::{alert_queue, AlertMessage, AlertReceiver, AlertSender, ChannelBundle, QueueError};

// Explicit re-exports for history module
pub use history::{HistoryError, HistoryRecord, HistorySink, JsonlHistory};

// Explicit re-exports for runtime module
pub use runtime::{CycleReport, PollScheduler, SchedulerConfig};

// Explicit re-exports for logging module
pub use logging::{
    init_logging, init_logging_with_config, sanitize, LoggingConfig, SanitizedValue,
    DEFAULT_LOG_LEVEL, SENSITIVE_FIELD_PATTERNS,
};
