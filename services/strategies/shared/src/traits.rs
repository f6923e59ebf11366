//! Strategy traits and interfaces

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Lifecycle every strategy service exposes to its binary.
///
/// Implementations are shared handles, so `start` and `stop` take `&self`
/// and must tolerate being called more than once.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Strategy name for identification
    fn name(&self) -> &'static str;

    /// Begin periodic work
    async fn start(&self) -> Result<()>;

    /// Cancel periodic work; market data may keep flowing
    async fn stop(&self) -> Result<()>;

    fn is_running(&self) -> bool;

    /// Get current strategy metrics
    fn metrics(&self) -> StrategyMetrics;
}

/// Basic strategy metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StrategyMetrics {
    pub messages_processed: u64,
    pub signals_generated: u64,
    pub signals_throttled: u64,
    pub trades_executed: u64,
    pub errors: u64,
    pub uptime_secs: u64,
}

/// A configuration section that can reject itself before use.
pub trait ConfigSection {
    fn validate(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MetricsCollector;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct RecordingStrategy {
        running: AtomicBool,
        metrics: MetricsCollector,
    }

    #[async_trait]
    impl Strategy for RecordingStrategy {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn start(&self) -> Result<()> {
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn metrics(&self) -> StrategyMetrics {
            self.metrics.get_metrics()
        }
    }

    #[tokio::test]
    async fn test_lifecycle_through_trait_object() {
        let strategy: Box<dyn Strategy> = Box::new(RecordingStrategy {
            running: AtomicBool::new(false),
            metrics: MetricsCollector::new(),
        });
        strategy.start().await.unwrap();
        strategy.start().await.unwrap();
        assert!(strategy.is_running());
        strategy.stop().await.unwrap();
        assert!(!strategy.is_running());
        assert_eq!(strategy.metrics().signals_generated, 0);
    }
}
