//! TOML application config.
//!
//! Every field has a default, so an empty or missing file is a valid config.
//! Durations are spelled out in seconds or milliseconds and converted into
//! [`ConnectionConfig`] when the connection is built.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    logging::LogConfig,
    prelude::*,
    ws::{ConnectionConfig, Endpoint, HeartbeatConfig, ReconnectConfig, ORDERS_NAMESPACE},
    Error,
};

pub const DEFAULT_CONFIG_PATH: &str = "kitchen_display.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatSettings,
    #[serde(default)]
    pub reconnect: ReconnectSettings,
    #[serde(default)]
    pub logging: LogConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// Base API URL; the Socket.IO path is derived from it
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_namespace() -> String {
    ORDERS_NAMESPACE.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    20
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            namespace: default_namespace(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct HeartbeatSettings {
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_pong_timeout_secs")]
    pub pong_timeout_secs: u64,
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_pong_timeout_secs() -> u64 {
    60
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval_secs(),
            pong_timeout_secs: default_pong_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ReconnectSettings {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// 0.0 disables jitter
    #[serde(default)]
    pub jitter_factor: f64,
    /// 0 retries forever
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_attempts() -> u32 {
    10
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_factor: 0.0,
            max_attempts: default_max_attempts(),
        }
    }
}

impl AppConfig {
    /// Read `path`, falling back to defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.endpoint()?;
        if self.heartbeat.ping_interval_secs == 0 {
            return Err(Error::Config("heartbeat.ping_interval_secs must be > 0".into()));
        }
        if self.heartbeat.pong_timeout_secs <= self.heartbeat.ping_interval_secs {
            return Err(Error::Config(
                "heartbeat.pong_timeout_secs must exceed ping_interval_secs".into(),
            ));
        }
        if self.server.connect_timeout_secs == 0 {
            return Err(Error::Config("server.connect_timeout_secs must be > 0".into()));
        }
        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            return Err(Error::Config(
                "reconnect.initial_delay_ms must not exceed max_delay_ms".into(),
            ));
        }
        let multiplier = self.reconnect.backoff_multiplier;
        if multiplier.is_nan() || multiplier < 1.0 {
            return Err(Error::Config("reconnect.backoff_multiplier must be >= 1.0".into()));
        }
        if !(0.0..=1.0).contains(&self.reconnect.jitter_factor) {
            return Err(Error::Config("reconnect.jitter_factor must be within 0.0..=1.0".into()));
        }
        Ok(())
    }

    pub fn endpoint(&self) -> Result<Endpoint> {
        Endpoint::resolve(&self.server.api_url, &self.server.namespace)
    }

    /// Validated runtime connection settings.
    pub fn connection_config(&self) -> Result<ConnectionConfig> {
        self.validate()?;
        Ok(ConnectionConfig {
            endpoint: self.endpoint()?,
            heartbeat: HeartbeatConfig {
                ping_interval: Duration::from_secs(self.heartbeat.ping_interval_secs),
                pong_timeout: Duration::from_secs(self.heartbeat.pong_timeout_secs),
            },
            reconnect: ReconnectConfig {
                initial_delay: Duration::from_millis(self.reconnect.initial_delay_ms),
                max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
                backoff_multiplier: self.reconnect.backoff_multiplier,
                jitter_factor: self.reconnect.jitter_factor,
                max_attempts: self.reconnect.max_attempts,
            },
            connect_timeout: Duration::from_secs(self.server.connect_timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());

        let connection = config.connection_config().unwrap();
        assert_eq!(connection.heartbeat.ping_interval, Duration::from_secs(30));
        assert_eq!(connection.heartbeat.pong_timeout, Duration::from_secs(60));
        assert_eq!(connection.reconnect.initial_delay, Duration::from_secs(1));
        assert_eq!(connection.reconnect.max_delay, Duration::from_secs(30));
        assert_eq!(connection.reconnect.max_attempts, 10);
        assert_eq!(connection.connect_timeout, Duration::from_secs(20));
        assert_eq!(connection.endpoint.namespace(), "/orders");
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml_str(
            r#"
[server]
api_url = "https://api.example.com/api"

[reconnect]
max_attempts = 3
"#,
        )
        .unwrap();
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.reconnect.initial_delay_ms, 1000);
        let endpoint = config.endpoint().unwrap();
        assert_eq!(endpoint.origin(), "wss://api.example.com");
        assert_eq!(endpoint.path(), "/api/socket.io/");
    }

    #[test]
    fn test_sample_round_trips() {
        let sample = AppConfig::default().to_toml_string().unwrap();
        assert_eq!(AppConfig::from_toml_str(&sample).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = AppConfig::default();
        config.heartbeat.pong_timeout_secs = 10;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = AppConfig::default();
        config.server.api_url = "localhost:3000/api".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.reconnect.jitter_factor = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            AppConfig::from_toml_str("[server\napi_url = 1"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = AppConfig::load("/nonexistent/kitchen_display.toml").unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
