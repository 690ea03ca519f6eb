//! Typed configuration for Gatehouse services.
//!
//! - TOML and JSON configuration files
//! - `GATEHOUSE__SECTION__KEY` environment overrides
//! - Strict parsing (unknown fields fail)
//! - Key folder watching for hot key rotation
//!
//! # Example
//!
//! ```no_run
//! use gatehouse_config::ConfigLoader;
//!
//! # fn main() -> Result<(), gatehouse_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()?
//!     .with_optional_file("gatehouse.toml")?
//!     .with_env_prefix("GATEHOUSE")
//!     .load()?;
//!
//! println!("listening on {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:3000"
//! shutdown_timeout_secs = 20
//! request_timeout_secs = 10
//! body_timeout_secs = 5
//!
//! [auth]
//! issuer = "service project"
//! keys_folder = "zarf/keys"
//! active_kid = "54bb2165-71e1-41a6-af3e-7da4a0e1e2c1"
//! leeway_secs = 0
//! algorithms = ["RS256"]
//! watch_keys = true
//!
//! [telemetry]
//! service_name = "sales-api"
//! log_level = "info"
//! log_format = "json"
//! metrics_enabled = true
//! ```

#![doc(html_root_url = "https://docs.rs/gatehouse-config/0.1.0")]

mod config;
mod error;
mod loader;
mod schema;
mod watcher;

pub use config::GatehouseConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{AuthSection, LogFormat, ServerSection, TelemetrySection};
pub use watcher::{KeyChange, KeyChangeKind, KeyFolderWatcher};
