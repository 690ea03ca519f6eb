//! Root configuration type.

use std::net::SocketAddr;
use std::time::Duration;

use gatehouse_auth::AuthConfig;
use gatehouse_telemetry::{LogConfig, MetricsConfig};
use serde::{Deserialize, Serialize};

use crate::{AuthSection, ConfigError, LogFormat, ServerSection, TelemetrySection};

/// Complete Gatehouse service configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and the
/// environment.
///
/// # Example
///
/// ```
/// use gatehouse_config::GatehouseConfig;
///
/// let config = GatehouseConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:3000");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct GatehouseConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerSection,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthSection,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl GatehouseConfig {
    /// A preset for local development: pretty debug logs, no metrics recorder.
    #[must_use]
    pub fn development() -> Self {
        Self {
            telemetry: TelemetrySection {
                log_level: "debug".to_string(),
                log_format: LogFormat::Pretty,
                metrics_enabled: false,
                ..TelemetrySection::default()
            },
            ..Self::default()
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - The server address is not a socket address
    /// - A timeout is zero
    /// - The issuer is empty
    /// - The algorithm list is empty, unknown or not RSA
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;

        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "server.request_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.server.body_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "server.body_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.auth.keys_folder.trim().is_empty() {
            return Err(ConfigError::invalid("auth.keys_folder", "must not be empty"));
        }
        if self.telemetry.log_level.trim().is_empty() {
            return Err(ConfigError::invalid("telemetry.log_level", "must not be empty"));
        }

        self.auth_config()?;
        Ok(())
    }

    /// Parsed server bind address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.http_addr.parse().map_err(|_| {
            ConfigError::invalid(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            )
        })
    }

    /// Token validation settings.
    pub fn auth_config(&self) -> Result<AuthConfig, ConfigError> {
        let config = AuthConfig::new()
            .with_issuer(self.auth.issuer.clone())
            .with_leeway_secs(self.auth.leeway_secs)
            .with_algorithm_names(&self.auth.algorithms)
            .map_err(|e| ConfigError::invalid("auth.algorithms", e.to_string()))?;
        config.validate().map_err(|e| ConfigError::invalid("auth", e.to_string()))?;
        Ok(config)
    }

    /// Logging settings.
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        let base = match self.telemetry.log_format {
            LogFormat::Json => LogConfig::production(),
            LogFormat::Pretty => LogConfig::development(),
        };
        LogConfig {
            level: self.telemetry.log_level.clone(),
            service_name: self.telemetry.service_name.clone(),
            ..base
        }
    }

    /// Metrics settings.
    #[must_use]
    pub fn metrics_config(&self) -> MetricsConfig {
        MetricsConfig {
            enabled: self.telemetry.metrics_enabled,
            service_name: self.telemetry.service_name.clone(),
        }
    }

    /// Graceful shutdown budget.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Per-request handling budget.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Body collection budget.
    #[must_use]
    pub fn body_timeout(&self) -> Duration {
        Duration::from_secs(self.server.body_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_auth::AuthError;

    #[test]
    fn test_default_is_valid() {
        let config = GatehouseConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.socket_addr().unwrap().port(), 3000);
    }

    #[test]
    fn test_bad_address_rejected() {
        let mut config = GatehouseConfig::default();
        config.server.http_addr = "localhost".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "server.http_addr"));
    }

    #[test]
    fn test_symmetric_algorithm_rejected() {
        let mut config = GatehouseConfig::default();
        config.auth.algorithms = vec!["HS256".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        let mut config = GatehouseConfig::default();
        config.auth.algorithms = vec!["RS1024".to_string()];
        let err = config.auth_config().unwrap_err();
        assert!(err.to_string().contains("auth.algorithms"));
    }

    #[test]
    fn test_empty_issuer_rejected() {
        let mut config = GatehouseConfig::default();
        config.auth.issuer = String::new();
        assert!(config.validate().is_err());
        assert!(AuthConfig::new().with_issuer("").validate().is_err_and(|e| matches!(e, AuthError::Config(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = GatehouseConfig::default();
        config.server.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_telemetry_conversions() {
        let config = GatehouseConfig::development();
        let log = config.log_config();
        assert!(!log.json_format);
        assert_eq!(log.level, "debug");
        assert_eq!(log.service_name, "sales-api");
        assert!(!config.metrics_config().enabled);

        let log = GatehouseConfig::default().log_config();
        assert!(log.json_format);
        assert_eq!(log.level, "info");
    }

    #[test]
    fn test_auth_conversion() {
        let mut config = GatehouseConfig::default();
        config.auth.leeway_secs = 5;
        config.auth.algorithms = vec!["RS256".into(), "PS256".into()];
        let auth = config.auth_config().unwrap();
        assert_eq!(auth.leeway_secs, 5);
        assert_eq!(auth.algorithms.len(), 2);
    }
}
