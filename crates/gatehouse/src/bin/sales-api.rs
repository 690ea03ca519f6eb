//! sales-api - entry point
//!
//! Loads configuration, wires the pipeline and serves until SIGINT, SIGTERM
//! or a handler-requested shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use gatehouse::keys::KeyReloader;
use gatehouse::sales;
use gatehouse_auth::KeyStore;
use gatehouse_config::{ConfigLoader, GatehouseConfig, KeyFolderWatcher};
use gatehouse_server::{Server, ServerConfig};
use gatehouse_telemetry::{init_logging, init_metrics, Logger, RequestMetrics};

/// Environment variable prefix, e.g. `GATEHOUSE__SERVER__HTTP_ADDR`.
const ENV_PREFIX: &str = "GATEHOUSE";

/// Configuration file read when `--config` is not given.
const DEFAULT_CONFIG_FILE: &str = "gatehouse.toml";

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("sales-api {}", gatehouse::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self { config }
    }
}

fn print_help() {
    println!(
        r"sales-api - authenticated sales service

USAGE:
    sales-api [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    GATEHOUSE__SERVER__HTTP_ADDR              Listen address (default: 0.0.0.0:3000)
    GATEHOUSE__SERVER__SHUTDOWN_TIMEOUT_SECS  Drain timeout (default: 20)
    GATEHOUSE__AUTH__ISSUER                   Expected token issuer
    GATEHOUSE__AUTH__KEYS_FOLDER              Folder of <kid>.pem public keys
    GATEHOUSE__AUTH__WATCH_KEYS               Reload keys on folder changes
    GATEHOUSE__TELEMETRY__LOG_LEVEL           Log filter (default: info)
    GATEHOUSE__TELEMETRY__LOG_FORMAT          json or pretty

SIGNALS:
    SIGINT, SIGTERM    Graceful shutdown
    SIGHUP             Reload the key folder
"
    );
}

fn load_config(args: &Args) -> anyhow::Result<GatehouseConfig> {
    let loader = ConfigLoader::new().with_dotenv()?;
    let loader = match &args.config {
        Some(path) => loader
            .with_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => loader.with_optional_file(DEFAULT_CONFIG_FILE)?,
    };
    Ok(loader.with_env_prefix(ENV_PREFIX).load()?)
}

fn server_config(config: &GatehouseConfig) -> anyhow::Result<ServerConfig> {
    Ok(ServerConfig::new(config.socket_addr()?)
        .with_shutdown_timeout(config.shutdown_timeout())
        .with_request_timeout(config.request_timeout())
        .with_body_timeout(config.body_timeout()))
}

async fn run(config: GatehouseConfig, logger: Logger) -> anyhow::Result<()> {
    let keys_folder = PathBuf::from(&config.auth.keys_folder);
    let keys = Arc::new(
        KeyStore::load_from_dir(&keys_folder)
            .with_context(|| format!("loading keys from {}", keys_folder.display()))?,
    );
    let kids = keys.kids();
    logger.in_scope(|| {
        tracing::info!(folder = %keys_folder.display(), kids = ?kids, "keys loaded");
        if !kids.contains(&config.auth.active_kid) {
            tracing::warn!(active_kid = %config.auth.active_kid, "active kid has no key in the folder");
        }
    });

    let auth = sales::auth(config.auth_config()?, &keys).context("building auth")?;
    let app = sales::app(&auth, &logger, Arc::new(RequestMetrics::new()));
    let shutdown = app.shutdown_signal().clone();

    let watcher = if config.auth.watch_keys {
        Some(KeyFolderWatcher::new(&keys_folder).context("watching key folder")?)
    } else {
        None
    };
    let reloader = KeyReloader::new(keys, keys_folder, logger.clone()).spawn(watcher, shutdown);

    let server = Server::new(app, server_config(&config)?, logger.clone());
    let result = server.run().await;
    reloader.abort();

    result.context("serving")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let logger = init_logging(&config.log_config())?;
    init_metrics(&config.metrics_config())?;

    logger.in_scope(|| {
        tracing::info!(
            version = gatehouse::VERSION,
            http_addr = %config.server.http_addr,
            issuer = %config.auth.issuer,
            "starting sales-api"
        );
    });

    if let Err(err) = run(config, logger.clone()).await {
        logger.in_scope(|| tracing::error!(error = ?err, "sales-api stopped with error"));
        return Err(err);
    }

    logger.in_scope(|| tracing::info!("sales-api stopped"));
    Ok(())
}
