//! Settings module for adapters
//!
//! Serde-loadable settings for the stream client and REST collaborators.
//! Durations are carried as milliseconds so the layered loader can override
//! them from TOML or the environment without custom parsing.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use config::service::{rest, stream};

use crate::input::connection::{ConnectionConfig, ReconnectPolicy};
use crate::{AdapterError, Result};

/// Reconnect policy as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconnectSettings {
    /// Constant delay between attempts; unbounded when `max_attempts` is absent
    Fixed {
        delay_ms: u64,
        #[serde(default)]
        max_attempts: Option<u32>,
    },
    /// Doubling delay from `base_ms`, capped at `max_ms`
    Exponential {
        base_ms: u64,
        max_ms: u64,
        #[serde(default)]
        max_attempts: Option<u32>,
    },
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        ReconnectSettings::Fixed {
            delay_ms: stream::RECONNECT_DELAY_MS,
            max_attempts: None,
        }
    }
}

impl From<&ReconnectSettings> for ReconnectPolicy {
    fn from(settings: &ReconnectSettings) -> Self {
        match *settings {
            ReconnectSettings::Fixed {
                delay_ms,
                max_attempts,
            } => ReconnectPolicy::Fixed {
                delay: Duration::from_millis(delay_ms),
                max_attempts,
            },
            ReconnectSettings::Exponential {
                base_ms,
                max_ms,
                max_attempts,
            } => ReconnectPolicy::ExponentialBackoff {
                base: Duration::from_millis(base_ms),
                max: Duration::from_millis(max_ms),
                max_attempts,
            },
        }
    }
}

/// Market-data stream settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// WebSocket URL; `${VAR}` references are expanded at load time
    pub url: String,
    pub connect_timeout_ms: u64,
    pub ping_interval_ms: u64,
    pub pong_timeout_ms: u64,
    pub topic_channel_capacity: usize,
    pub reconnect: ReconnectSettings,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            url: stream::DEFAULT_URL.to_string(),
            connect_timeout_ms: stream::CONNECT_TIMEOUT_MS,
            ping_interval_ms: stream::PING_INTERVAL_MS,
            pong_timeout_ms: stream::PONG_TIMEOUT_MS,
            topic_channel_capacity: stream::TOPIC_CHANNEL_CAPACITY,
            reconnect: ReconnectSettings::default(),
        }
    }
}

impl StreamSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(AdapterError::Configuration(format!(
                "stream url must be ws:// or wss://, got '{}'",
                self.url
            )));
        }
        if self.ping_interval_ms == 0 || self.pong_timeout_ms == 0 {
            return Err(AdapterError::Configuration(
                "heartbeat intervals must be non-zero".to_string(),
            ));
        }
        if self.topic_channel_capacity == 0 {
            return Err(AdapterError::Configuration(
                "topic_channel_capacity must be non-zero".to_string(),
            ));
        }
        match self.reconnect {
            ReconnectSettings::Exponential { base_ms, max_ms, .. } if base_ms > max_ms => {
                Err(AdapterError::Configuration(format!(
                    "reconnect base_ms {} exceeds max_ms {}",
                    base_ms, max_ms
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn to_connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            url: self.url.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            ping_interval: Duration::from_millis(self.ping_interval_ms),
            pong_timeout: Duration::from_millis(self.pong_timeout_ms),
            channel_capacity: self.topic_channel_capacity,
            reconnect: ReconnectPolicy::from(&self.reconnect),
        }
    }
}

/// REST collaborator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestSettings {
    pub base_url: String,
    pub request_timeout_ms: u64,
    /// `linear` for USDT perpetuals
    pub category: String,
}

impl Default for RestSettings {
    fn default() -> Self {
        Self {
            base_url: rest::DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: rest::REQUEST_TIMEOUT_MS,
            category: "linear".to_string(),
        }
    }
}

impl RestSettings {
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url)
            .map_err(|e| AdapterError::Configuration(format!("invalid REST base url: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stream_settings() {
        let s = StreamSettings::default();
        s.validate().unwrap();
        let cfg = s.to_connection_config();
        assert_eq!(cfg.ping_interval, Duration::from_secs(20));
        assert_eq!(cfg.pong_timeout, Duration::from_secs(30));
        assert_eq!(
            cfg.reconnect,
            ReconnectPolicy::Fixed {
                delay: Duration::from_secs(5),
                max_attempts: None
            }
        );
    }

    #[test]
    fn test_reconnect_settings_from_toml() {
        let s: StreamSettings = toml::from_str(
            r#"
url = "wss://example.invalid/ws"
[reconnect]
kind = "exponential"
base_ms = 500
max_ms = 8000
max_attempts = 6
"#,
        )
        .unwrap();
        s.validate().unwrap();
        assert_eq!(
            s.reconnect,
            ReconnectSettings::Exponential {
                base_ms: 500,
                max_ms: 8000,
                max_attempts: Some(6)
            }
        );
        assert_eq!(s.ping_interval_ms, 20_000);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let s = StreamSettings {
            url: "http://nope".into(),
            ..Default::default()
        };
        assert!(s.validate().is_err());

        let s = StreamSettings {
            reconnect: ReconnectSettings::Exponential {
                base_ms: 10_000,
                max_ms: 1_000,
                max_attempts: None,
            },
            ..Default::default()
        };
        assert!(s.validate().is_err());

        let r = RestSettings {
            base_url: "not a url".into(),
            ..Default::default()
        };
        assert!(r.validate().is_err());
    }
}
