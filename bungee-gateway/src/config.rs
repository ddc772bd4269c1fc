//! Gateway-level configuration: the HTTP server surface plus the list of
//! reliability routes handed to `bungee_core::Registry`.
//!
//! ## Environment Variables
//!
//! - `GATEWAY_HOST`: override server host
//! - `GATEWAY_PORT`: override server port
//! - `GATEWAY_TIMEOUT`: override server request timeout
//! - `GATEWAY_LOG_LEVEL`: override logging level

use std::env;
use std::time::Duration;

use bungee_core::RouteConfig;
use serde::{Deserialize, Serialize};

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub routes: Vec<RouteConfig>,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// HTTP server configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(with = "bungee_core::common::duration_serde")]
    pub timeout: Duration,
    pub max_body_size: usize,
    pub cors: CorsConfig,
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Available log output formats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

/// Metrics/introspection configuration for the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(host) = env::var("GATEWAY_HOST") {
            if !host.is_empty() {
                self.server.host = host;
            }
        }

        if let Ok(port_str) = env::var("GATEWAY_PORT") {
            let port: u16 = port_str
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid GATEWAY_PORT: {port_str}"))?;
            if port > 0 {
                self.server.port = port;
            }
        }

        if let Ok(timeout) = env::var("GATEWAY_TIMEOUT") {
            self.server.timeout = bungee_core::common::duration_serde::parse_duration(&timeout)?;
        }

        if let Ok(level) = env::var("GATEWAY_LOG_LEVEL") {
            let valid_levels = ["trace", "debug", "info", "warn", "error"];
            if valid_levels.contains(&level.as_str()) {
                self.logging.level = level;
            } else {
                anyhow::bail!("invalid log level: {level}. use one of: {valid_levels:?}");
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("server host cannot be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("server port must be between 1 and 65535");
        }
        if self.server.max_body_size == 0 {
            anyhow::bail!("max body size cannot be 0");
        }
        if self.server.max_body_size > 100 * 1024 * 1024 {
            anyhow::bail!(
                "max body size cannot exceed 100MB, got {} bytes",
                self.server.max_body_size
            );
        }
        for route in &self.routes {
            if route.path.is_empty() {
                anyhow::bail!("route path cannot be empty");
            }
            if route.failover.enabled && route.upstreams.is_empty() {
                anyhow::bail!("route {} has failover enabled but no upstreams", route.path);
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                timeout: Duration::from_secs(30),
                max_body_size: 1024 * 1024,
                cors: CorsConfig {
                    enabled: true,
                    allowed_origins: vec!["*".to_string()],
                    allowed_methods: vec!["GET".to_string(), "POST".to_string()],
                    allowed_headers: vec!["*".to_string()],
                },
            },
            routes: vec![],
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
            metrics: MetricsConfig { enabled: true },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_route_with_no_upstreams_when_failover_enabled() {
        let mut config = Config::default();
        config.routes.push(RouteConfig {
            path: "/v1/chat".into(),
            upstreams: vec![],
            failover: bungee_core::FailoverConfig::default(),
            health_check: None,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_override_applies_valid_log_level() {
        std::env::set_var("GATEWAY_LOG_LEVEL", "debug");
        let mut config = Config::default();
        config.apply_env_overrides().unwrap();
        assert_eq!(config.logging.level, "debug");
        std::env::remove_var("GATEWAY_LOG_LEVEL");
    }

    #[test]
    fn deserializes_full_config_from_toml() {
        let toml_str = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            timeout = "30s"
            max_body_size = 1048576
            [server.cors]
            enabled = true
            allowed_origins = ["*"]
            allowed_methods = ["GET"]
            allowed_headers = ["*"]
            [logging]
            level = "info"
            format = "Pretty"
            [metrics]
            enabled = true
            [[routes]]
            path = "/v1/chat"
            [[routes.upstreams]]
            target = "http://a.internal"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].upstreams[0].target, "http://a.internal");
    }
}
