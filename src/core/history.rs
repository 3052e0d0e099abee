//! Write-only spread history
//!
//! The scheduler hands every finished `RateSnapshot` to an optional
//! `HistorySink`. Nothing reads it back; a failed write is logged by the
//! caller and never affects the cycle.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::core::spread::RateSnapshot;
use crate::core::symbols::Symbol;

/// Errors for history persistence
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("History IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("History serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One persisted spread reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub cycle: u64,
    pub symbol: Symbol,
    pub spread_pct: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Destination for per-cycle snapshots
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, cycle: u64, snapshot: &RateSnapshot) -> Result<(), HistoryError>;
}

/// Appends one JSON object per symbol per cycle to a file
pub struct JsonlHistory {
    path: PathBuf,
}

impl JsonlHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistorySink for JsonlHistory {
    async fn record(&self, cycle: u64, snapshot: &RateSnapshot) -> Result<(), HistoryError> {
        if snapshot.is_empty() {
            return Ok(());
        }

        let recorded_at = Utc::now();
        let mut rows: Vec<(&Symbol, f64)> = snapshot.iter().collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));

        let mut buffer = Vec::new();
        for (symbol, spread_pct) in rows {
            let record = HistoryRecord {
                cycle,
                symbol: symbol.clone(),
                spread_pct,
                recorded_at,
            };
            serde_json::to_writer(&mut buffer, &record)?;
            buffer.push(b'\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&buffer).await?;
        file.flush().await?;

        tracing::debug!(cycle, path = %self.path.display(), "Spread history appended");
        Ok(())
    }
}
