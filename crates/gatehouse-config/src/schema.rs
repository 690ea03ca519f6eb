//! Configuration schema types.
//!
//! This module defines the structure of all configuration sections.

use serde::{Deserialize, Serialize};

/// Server configuration section.
///
/// # Example
///
/// ```
/// use gatehouse_config::ServerSection;
///
/// let config = ServerSection {
///     http_addr: "0.0.0.0:3000".to_string(),
///     shutdown_timeout_secs: 20,
///     request_timeout_secs: 10,
///     body_timeout_secs: 5,
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// HTTP server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Per-request handling timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Time allowed to receive a request body, in seconds.
    #[serde(default = "default_body_timeout")]
    pub body_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            request_timeout_secs: default_request_timeout(),
            body_timeout_secs: default_body_timeout(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_shutdown_timeout() -> u64 {
    20
}

fn default_request_timeout() -> u64 {
    10
}

fn default_body_timeout() -> u64 {
    5
}

/// Authentication configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AuthSection {
    /// Expected token issuer.
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Folder of `<kid>.pem` public keys.
    #[serde(default = "default_keys_folder")]
    pub keys_folder: String,

    /// Key id new tokens are expected to carry. Informational; every key in
    /// the folder verifies.
    #[serde(default = "default_active_kid")]
    pub active_kid: String,

    /// Clock skew tolerance in seconds.
    #[serde(default)]
    pub leeway_secs: u64,

    /// Accepted signing algorithms.
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<String>,

    /// Reload the key store when the folder changes.
    #[serde(default = "default_true")]
    pub watch_keys: bool,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            keys_folder: default_keys_folder(),
            active_kid: default_active_kid(),
            leeway_secs: 0,
            algorithms: default_algorithms(),
            watch_keys: true,
        }
    }
}

fn default_issuer() -> String {
    gatehouse_auth::DEFAULT_ISSUER.to_string()
}

fn default_keys_folder() -> String {
    "zarf/keys".to_string()
}

fn default_active_kid() -> String {
    "54bb2165-71e1-41a6-af3e-7da4a0e1e2c1".to_string()
}

fn default_algorithms() -> Vec<String> {
    vec!["RS256".to_string()]
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable output.
    Pretty,
}

/// Telemetry configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Service name used in logs and as the metrics `service` label.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Log level or filter directive.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,

    /// Install the Prometheus recorder.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_level: default_log_level(),
            log_format: LogFormat::Json,
            metrics_enabled: true,
        }
    }
}

fn default_service_name() -> String {
    "sales-api".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_defaults() {
        let server = ServerSection::default();
        assert_eq!(server.http_addr, "0.0.0.0:3000");
        assert_eq!(server.shutdown_timeout_secs, 20);

        let auth = AuthSection::default();
        assert_eq!(auth.issuer, "service project");
        assert_eq!(auth.algorithms, vec!["RS256".to_string()]);
        assert!(auth.watch_keys);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let auth: AuthSection = toml::from_str(r#"keys_folder = "/etc/keys""#).unwrap();
        assert_eq!(auth.keys_folder, "/etc/keys");
        assert_eq!(auth.issuer, "service project");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<TelemetrySection, _> = toml::from_str(r#"colour = "blue""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_log_format_serde() {
        let section: TelemetrySection = toml::from_str(r#"log_format = "pretty""#).unwrap();
        assert_eq!(section.log_format, LogFormat::Pretty);
    }
}
