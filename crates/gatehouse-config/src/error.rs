//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Why a configuration could not be loaded or is unusable.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required configuration file does not exist.
    #[error("no configuration file at {}", path.display())]
    Missing {
        /// Expected location.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("cannot read {}", path.display())]
    Read {
        /// File location.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Only `.toml` and `.json` are understood.
    #[error("unsupported configuration format `{0}`")]
    Format(String),

    /// Malformed TOML, or an unknown section or key.
    #[error("bad TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed JSON, or an unknown section or key.
    #[error("bad JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A value parsed but cannot be used.
    #[error("{field}: {reason}")]
    Invalid {
        /// Dotted field path, e.g. `server.http_addr`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An override variable could not be parsed.
    #[error("environment override {var}: {reason}")]
    Env {
        /// Variable name.
        var: String,
        /// What was expected.
        reason: String,
    },

    /// The key folder watcher could not be set up.
    #[error("cannot watch {}: {message}", path.display())]
    Watch {
        /// Watched folder.
        path: PathBuf,
        /// Watcher failure.
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn missing(path: impl Into<PathBuf>) -> Self {
        Self::Missing { path: path.into() }
    }

    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn env(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Env {
            var: var.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn watch(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Watch {
            path: path.into(),
            message: message.into(),
        }
    }

    /// The offending field, for [`ConfigError::Invalid`].
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Invalid { field, .. } => Some(field),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_names_field() {
        let err = ConfigError::invalid("server.http_addr", "not a socket address: nope");
        assert_eq!(err.to_string(), "server.http_addr: not a socket address: nope");
        assert_eq!(err.field(), Some("server.http_addr"));
        assert_eq!(ConfigError::Format("yaml".into()).field(), None);
    }

    #[test]
    fn test_env_names_variable() {
        let err = ConfigError::env("GATEHOUSE__AUTH__LEEWAY_SECS", "expected integer");
        assert_eq!(
            err.to_string(),
            "environment override GATEHOUSE__AUTH__LEEWAY_SECS: expected integer"
        );
    }

    #[test]
    fn test_read_keeps_io_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ConfigError::read("/etc/gatehouse.toml", io);
        assert!(std::error::Error::source(&err).is_some());
    }
}
