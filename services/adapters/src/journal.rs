//! Append-only trade journal
//!
//! The strategy layer records what it did (log entries) and what it placed
//! (order records). Storage layout is owned by the implementation.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use types::{LogEntry, OrderRecord};

use crate::Result;

#[async_trait]
pub trait TradeJournal: Send + Sync {
    async fn append_log(&self, entry: &LogEntry) -> Result<()>;

    async fn append_order(&self, record: &OrderRecord) -> Result<()>;
}

/// Journal kept in memory; inspected by tests and the CLI summary.
#[derive(Default)]
pub struct MemoryJournal {
    logs: Mutex<Vec<LogEntry>>,
    orders: Mutex<Vec<OrderRecord>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.lock().clone()
    }

    pub fn orders(&self) -> Vec<OrderRecord> {
        self.orders.lock().clone()
    }
}

#[async_trait]
impl TradeJournal for MemoryJournal {
    async fn append_log(&self, entry: &LogEntry) -> Result<()> {
        self.logs.lock().push(entry.clone());
        Ok(())
    }

    async fn append_order(&self, record: &OrderRecord) -> Result<()> {
        self.orders.lock().push(record.clone());
        Ok(())
    }
}

/// One JSON object per line, logs and orders in separate files under `dir`.
pub struct JsonLinesJournal {
    logs_path: PathBuf,
    orders_path: PathBuf,
}

impl JsonLinesJournal {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        Ok(Self {
            logs_path: dir.join("logs.jsonl"),
            orders_path: dir.join("orders.jsonl"),
        })
    }

    async fn append<T: Serialize + Sync>(path: &Path, value: &T) -> Result<()> {
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl TradeJournal for JsonLinesJournal {
    async fn append_log(&self, entry: &LogEntry) -> Result<()> {
        Self::append(&self.logs_path, entry).await
    }

    async fn append_order(&self, record: &OrderRecord) -> Result<()> {
        Self::append(&self.orders_path, record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use types::Side;

    #[tokio::test]
    async fn test_json_lines_append() {
        let dir = tempfile::tempdir().unwrap();
        let journal = JsonLinesJournal::open(dir.path().join("journal")).await.unwrap();

        journal
            .append_log(&LogEntry::info("BTCUSDT", "regime changed"))
            .await
            .unwrap();
        journal
            .append_log(&LogEntry::warn("BTCUSDT", "stale data"))
            .await
            .unwrap();
        journal
            .append_order(&OrderRecord {
                order_id: "1".into(),
                symbol: "BTCUSDT".into(),
                side: Side::Sell,
                qty: dec!(0.5),
                entry_price: Some(dec!(100)),
                take_profit: None,
                stop_loss: None,
                leverage: 3,
                timestamp_ms: 0,
            })
            .await
            .unwrap();

        let logs = std::fs::read_to_string(dir.path().join("journal/logs.jsonl")).unwrap();
        assert_eq!(logs.lines().count(), 2);
        let first: LogEntry = serde_json::from_str(logs.lines().next().unwrap()).unwrap();
        assert_eq!(first.message, "regime changed");

        let orders = std::fs::read_to_string(dir.path().join("journal/orders.jsonl")).unwrap();
        let record: OrderRecord = serde_json::from_str(orders.trim()).unwrap();
        assert_eq!(record.side, Side::Sell);
    }
}
