//! Logging initialisation shared by service binaries

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            with_target: true,
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `cfg.level`.
///
/// Calling this twice is harmless; the second call reports an error that
/// callers may ignore.
pub fn init_logging(service: &str, cfg: &LoggingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&cfg.level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if cfg.json {
        registry
            .with(fmt::layer().json().with_target(cfg.with_target))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(cfg.with_target))
            .try_init()?;
    }

    tracing::info!(service, level = %cfg.level, json = cfg.json, "Logging initialised");
    Ok(())
}
