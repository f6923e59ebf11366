//! Service Configuration Module
//!
//! Loads a service's configuration in three layers: compiled defaults, an
//! optional TOML file, and environment overrides (`<PREFIX>_SECTION__KEY`).

use anyhow::{Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Pick the config path from `env_var` when set, otherwise `default`.
pub fn resolve_config_path(env_var: &str, default: &str) -> PathBuf {
    match std::env::var(env_var) {
        Ok(path) if !path.trim().is_empty() => {
            debug!("Using config path from {}: {}", env_var, path);
            PathBuf::from(path)
        }
        _ => PathBuf::from(default),
    }
}

/// Load `T` from `path` on top of `defaults`, then apply environment overrides.
///
/// A missing file is not an error: the defaults (plus environment) are used
/// and a warning is logged.
pub fn load_config_file<T>(path: &Path, env_prefix: &str, defaults: &T) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut builder = Config::builder().add_source(
        Config::try_from(defaults).context("Failed to serialize default configuration")?,
    );

    if path.exists() {
        info!("Loading configuration from {:?}", path);
        builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
    } else {
        warn!("Config file {:?} not found, using defaults", path);
    }

    builder = builder.add_source(
        Environment::with_prefix(env_prefix)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build().context("Failed to build configuration")?;

    config
        .try_deserialize()
        .with_context(|| format!("Failed to deserialize configuration from {:?}", path))
}

/// Expand `${VAR}` / `$VAR` references in a configured string.
pub fn expand_env(value: &str) -> Result<String> {
    let expanded = shellexpand::env(value)
        .with_context(|| format!("Failed to expand environment variables in '{}'", value))?;
    Ok(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Section {
        url: String,
        interval_ms: u64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestConfig {
        symbol: String,
        stream: Section,
    }

    fn defaults() -> TestConfig {
        TestConfig {
            symbol: "BTCUSDT".into(),
            stream: Section {
                url: "wss://example.invalid".into(),
                interval_ms: 20_000,
            },
        }
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let cfg = load_config_file(&path, "CFGTEST_MISSING", &defaults()).unwrap();
        assert_eq!(cfg, defaults());
    }

    #[test]
    fn test_file_overrides_defaults_partially() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("svc.toml");
        fs::write(
            &path,
            r#"
symbol = "ETHUSDT"

[stream]
interval_ms = 5000
"#,
        )
        .unwrap();

        let cfg = load_config_file(&path, "CFGTEST_FILE", &defaults()).unwrap();
        assert_eq!(cfg.symbol, "ETHUSDT");
        assert_eq!(cfg.stream.interval_ms, 5000);
        assert_eq!(cfg.stream.url, "wss://example.invalid");
    }

    #[test]
    fn test_environment_override() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        std::env::set_var("CFGTEST_ENV_SYMBOL", "SOLUSDT");
        let cfg = load_config_file(&path, "CFGTEST_ENV", &defaults()).unwrap();
        std::env::remove_var("CFGTEST_ENV_SYMBOL");
        assert_eq!(cfg.symbol, "SOLUSDT");
    }

    #[test]
    fn test_resolve_config_path() {
        std::env::remove_var("CFGTEST_PATH_UNSET");
        assert_eq!(
            resolve_config_path("CFGTEST_PATH_UNSET", "config/default.toml"),
            PathBuf::from("config/default.toml")
        );
        std::env::set_var("CFGTEST_PATH_SET", "/etc/bot.toml");
        assert_eq!(
            resolve_config_path("CFGTEST_PATH_SET", "config/default.toml"),
            PathBuf::from("/etc/bot.toml")
        );
        std::env::remove_var("CFGTEST_PATH_SET");
    }

    #[test]
    fn test_expand_env() {
        std::env::set_var("CFGTEST_HOST", "stream.local");
        assert_eq!(
            expand_env("wss://${CFGTEST_HOST}/v5").unwrap(),
            "wss://stream.local/v5"
        );
        assert!(expand_env("wss://${CFGTEST_DEFINITELY_UNSET_VAR}/").is_err());
    }
}
