//! # Centralized Configuration
//!
//! Configuration loading and shared defaults for the trading services.
//!
//! ## Features
//!
//! - **Layered loading**: compiled defaults, then an optional TOML file, then
//!   prefixed environment variables
//! - **Service defaults**: stream heartbeat, reconnect and polling cadences
//! - **Logging setup**: one `tracing-subscriber` initialisation shared by every binary
//!
//! ## Usage
//!
//! ```rust,no_run
//! use config::{load_config_file, resolve_config_path};
//! # #[derive(serde::Serialize, serde::Deserialize, Default)]
//! # struct MyConfig { symbol: String }
//!
//! let path = resolve_config_path("ADAPTIVE_CONFIG_PATH", "configs/adaptive.toml");
//! let cfg: MyConfig = load_config_file(&path, "ADAPTIVE", &MyConfig::default()).unwrap();
//! ```

pub mod logging;
pub mod service;
pub mod service_config;

pub use logging::{init_logging, LoggingConfig};
pub use service_config::{expand_env, load_config_file, resolve_config_path};
