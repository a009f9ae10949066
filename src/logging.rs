//! Structured logging setup.
//!
//! Stdout in one of three formats, plus an optional daily-rolling JSON file.
//! `RUST_LOG` takes precedence over the configured level.
//!
//! ```bash
//! # Trace the Socket.IO framing, info for the rest
//! RUST_LOG=info,kitchen_display_client::ws=debug kitchen_display run
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON format (for log aggregation)
    Json,
    /// Compact single-line format
    Compact,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LogConfig {
    /// Level or filter directives, e.g. `info` or `info,kitchen_display_client::ws=debug`
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// When set, JSON logs are also written here, rotated daily
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_file_prefix() -> String {
    "kitchen-display.log".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            log_dir: None,
            file_prefix: default_file_prefix(),
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Build the filter: explicit override, then `RUST_LOG`, then the configured level.
/// Noisy transport crates are held at `warn` unless named explicitly.
fn build_filter(
    config: &LogConfig,
    env_filter_override: Option<&str>,
) -> Result<EnvFilter, Box<dyn std::error::Error>> {
    if let Some(filter) = env_filter_override {
        return Ok(EnvFilter::try_new(filter)?);
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    Ok(EnvFilter::try_new(&config.level)?
        .add_directive("tungstenite=warn".parse()?)
        .add_directive("tokio_tungstenite=warn".parse()?)
        .add_directive("rustls=warn".parse()?))
}

/// Initialize the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the program.
pub fn init_logging(
    config: &LogConfig,
    env_filter_override: Option<&str>,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let stdout_layer: BoxedLayer = match config.format {
        LogFormat::Pretty => fmt::layer()
            .with_filter(build_filter(config, env_filter_override)?)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_filter(build_filter(config, env_filter_override)?)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_filter(build_filter(config, env_filter_override)?)
            .boxed(),
    };

    let mut layers = vec![stdout_layer];
    let mut guard = None;
    if let Some(log_dir) = &config.log_dir {
        std::fs::create_dir_all(log_dir)?;
        let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, &config.file_prefix);
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        guard = Some(worker_guard);
        layers.push(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .json()
                .with_filter(build_filter(config, env_filter_override)?)
                .boxed(),
        );
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_defaults_from_toml() {
        let config: LogConfig = toml::from_str("").unwrap();
        assert_eq!(config, LogConfig::default());
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn test_log_format_names() {
        let config: LogConfig = toml::from_str("format = \"json\"\nlevel = \"debug\"").unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn test_filter_rejects_bad_directive() {
        let config = LogConfig {
            level: "info,kitchen=loud".to_string(),
            ..Default::default()
        };
        assert!(build_filter(&config, Some("info,kitchen=loud")).is_err());
    }
}
