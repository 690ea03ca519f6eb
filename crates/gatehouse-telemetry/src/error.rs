//! Telemetry setup errors.

use thiserror::Error;

/// Logging or metrics could not be installed.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The log filter directive does not parse.
    #[error("invalid log filter `{filter}`: {reason}")]
    Filter {
        /// The rejected directive.
        filter: String,
        /// Parser message.
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("global log subscriber already installed")]
    SubscriberInstalled,

    /// The Prometheus recorder could not be installed.
    #[error("cannot install metrics recorder: {0}")]
    Recorder(String),
}
