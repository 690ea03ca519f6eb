//! Key Store reloading.
//!
//! The Key Store is rebuilt from its folder on SIGHUP and, when watching is
//! enabled, whenever a `.pem` file in the folder changes. A failed reload
//! keeps the previous key set.

use std::future::pending;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gatehouse_auth::{AuthResult, KeyStore};
use gatehouse_config::{KeyChange, KeyFolderWatcher};
use gatehouse_server::ShutdownSignal;
use gatehouse_telemetry::Logger;
use tokio::task::JoinHandle;

/// Rebuilds a [`KeyStore`] from its folder.
#[derive(Debug, Clone)]
pub struct KeyReloader {
    store: Arc<KeyStore>,
    folder: PathBuf,
    logger: Logger,
}

impl KeyReloader {
    /// A reloader for `store`, backed by `folder`.
    pub fn new(store: Arc<KeyStore>, folder: impl Into<PathBuf>, logger: Logger) -> Self {
        Self {
            store,
            folder: folder.into(),
            logger,
        }
    }

    /// The backing folder.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Reloads the store now and logs the outcome.
    pub fn reload(&self, reason: &str) -> AuthResult<usize> {
        let result = self.store.reload_from_dir(&self.folder);
        self.logger.in_scope(|| match &result {
            Ok(count) => tracing::info!(reason, keys = count, kids = ?self.store.kids(), "key store reloaded"),
            Err(err) => tracing::error!(reason, error = %err, "key store reload failed, keeping previous keys"),
        });
        result
    }

    /// Reloads on SIGHUP and, if `watcher` is given, on folder changes,
    /// until `shutdown` fires.
    pub fn spawn(self, watcher: Option<KeyFolderWatcher>, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(self.run(watcher, shutdown))
    }

    async fn run(self, mut watcher: Option<KeyFolderWatcher>, shutdown: ShutdownSignal) {
        let mut hangup = hangup::listen(&self.logger);

        loop {
            tokio::select! {
                () = shutdown.recv() => break,

                () = hangup::recv(&mut hangup) => {
                    let _ = self.reload("SIGHUP");
                }

                change = next_change(&mut watcher) => match change {
                    Some(change) => {
                        let reason = format!("{:?} {}", change.kind, change.path.display());
                        let _ = self.reload(&reason);
                    }
                    None => {
                        self.logger.in_scope(|| tracing::warn!("key folder watcher stopped"));
                        watcher = None;
                    }
                },
            }
        }
    }
}

async fn next_change(watcher: &mut Option<KeyFolderWatcher>) -> Option<KeyChange> {
    match watcher {
        Some(watcher) => watcher.next().await,
        None => pending().await,
    }
}

#[cfg(unix)]
mod hangup {
    use std::future::pending;

    use gatehouse_telemetry::Logger;
    use tokio::signal::unix::{signal, Signal, SignalKind};

    pub(super) fn listen(logger: &Logger) -> Option<Signal> {
        match signal(SignalKind::hangup()) {
            Ok(sig) => Some(sig),
            Err(err) => {
                logger.in_scope(|| tracing::warn!(error = %err, "SIGHUP reload unavailable"));
                None
            }
        }
    }

    pub(super) async fn recv(sig: &mut Option<Signal>) {
        let Some(s) = sig else {
            return pending().await;
        };
        if s.recv().await.is_none() {
            pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
mod hangup {
    use gatehouse_telemetry::Logger;

    pub(super) fn listen(_logger: &Logger) -> Option<()> {
        None
    }

    pub(super) async fn recv(_sig: &mut Option<()>) {
        std::future::pending().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_test::fixtures::{PRIMARY_KID, PRIMARY_PUBLIC_PEM, SECONDARY_KID, SECONDARY_PUBLIC_PEM};
    use std::time::Duration;
    use tracing::Level;

    fn write_key(dir: &Path, kid: &str, pem: &str) {
        std::fs::write(dir.join(format!("{kid}.pem")), pem).unwrap();
    }

    #[test]
    fn test_reload_swaps_keys() {
        let dir = tempfile::tempdir().unwrap();
        write_key(dir.path(), PRIMARY_KID, PRIMARY_PUBLIC_PEM);

        let store = Arc::new(KeyStore::load_from_dir(dir.path()).unwrap());
        let (logger, logs) = Logger::to_buffer(Level::INFO);
        let reloader = KeyReloader::new(Arc::clone(&store), dir.path(), logger);

        write_key(dir.path(), SECONDARY_KID, SECONDARY_PUBLIC_PEM);
        assert_eq!(reloader.reload("test").unwrap(), 2);
        assert_eq!(store.len(), 2);
        assert_eq!(logs.events("key store reloaded").len(), 1);
    }

    #[test]
    fn test_failed_reload_keeps_keys() {
        let dir = tempfile::tempdir().unwrap();
        write_key(dir.path(), PRIMARY_KID, PRIMARY_PUBLIC_PEM);

        let store = Arc::new(KeyStore::load_from_dir(dir.path()).unwrap());
        let (logger, logs) = Logger::to_buffer(Level::INFO);
        let reloader = KeyReloader::new(Arc::clone(&store), dir.path(), logger);

        write_key(dir.path(), SECONDARY_KID, "not a pem");
        assert!(reloader.reload("test").is_err());
        assert_eq!(store.kids(), vec![PRIMARY_KID.to_string()]);
        assert_eq!(logs.events("key store reload failed, keeping previous keys").len(), 1);
    }

    #[tokio::test]
    async fn test_watcher_triggers_reload() {
        let dir = tempfile::tempdir().unwrap();
        write_key(dir.path(), PRIMARY_KID, PRIMARY_PUBLIC_PEM);

        let store = Arc::new(KeyStore::load_from_dir(dir.path()).unwrap());
        let reloader = KeyReloader::new(Arc::clone(&store), dir.path(), Logger::discard());
        let watcher = KeyFolderWatcher::new(dir.path())
            .unwrap()
            .with_debounce(Duration::from_millis(10));
        let shutdown = ShutdownSignal::new();
        let task = reloader.spawn(Some(watcher), shutdown.clone());

        // Rename in so the watcher never sees a half-written file.
        let staging = tempfile::tempdir().unwrap();
        write_key(staging.path(), SECONDARY_KID, SECONDARY_PUBLIC_PEM);
        let name = format!("{SECONDARY_KID}.pem");
        std::fs::rename(staging.path().join(&name), dir.path().join(&name)).unwrap();

        let rotated = tokio::time::timeout(Duration::from_secs(5), async {
            while store.len() < 2 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(rotated.is_ok(), "watcher should reload the new key");

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("reloader should stop on shutdown")
            .unwrap();
    }
}
