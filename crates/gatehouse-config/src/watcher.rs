//! Key folder watching for hot key rotation.
//!
//! [`KeyFolderWatcher`] reports `.pem` changes in the key folder so the
//! service can reload its key store without a restart. Bursts of events (an
//! editor writing a temp file, then renaming it) collapse into one change per
//! debounce window.
//!
//! # Example
//!
//! ```no_run
//! use gatehouse_config::KeyFolderWatcher;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), gatehouse_config::ConfigError> {
//! let mut watcher = KeyFolderWatcher::new("zarf/keys")?
//!     .with_debounce(Duration::from_millis(250));
//!
//! while let Some(change) = watcher.next().await {
//!     println!("key folder changed: {:?}", change.path);
//! }
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::ConfigError;

const KEY_EXTENSION: &str = "pem";

/// Kind of key file change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyChangeKind {
    /// A key file appeared.
    Created,
    /// A key file was rewritten.
    Modified,
    /// A key file was removed.
    Removed,
}

impl KeyChangeKind {
    fn from_event(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Created),
            EventKind::Modify(_) => Some(Self::Modified),
            EventKind::Remove(_) => Some(Self::Removed),
            _ => None,
        }
    }
}

/// A debounced change in the key folder.
#[derive(Debug, Clone)]
pub struct KeyChange {
    /// The `.pem` file that triggered the change.
    pub path: PathBuf,
    /// What happened to it.
    pub kind: KeyChangeKind,
    /// When the change was observed.
    pub timestamp: Instant,
}

/// Watches a key folder for `.pem` changes.
pub struct KeyFolderWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<Event>,
    folder: PathBuf,
    debounce: Duration,
    last_change: Option<Instant>,
}

impl std::fmt::Debug for KeyFolderWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyFolderWatcher")
            .field("folder", &self.folder)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl KeyFolderWatcher {
    /// Start watching `folder`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Watch` if the folder does not exist or the
    /// platform watcher cannot be created.
    pub fn new<P: AsRef<Path>>(folder: P) -> Result<Self, ConfigError> {
        let folder = folder.as_ref().to_path_buf();
        if !folder.is_dir() {
            return Err(ConfigError::watch(&folder, "not a directory"));
        }

        let (tx, rx) = mpsc::channel(100);

        // notify calls back on its own thread, outside the runtime.
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.blocking_send(event);
            }
        })
        .map_err(|e| ConfigError::watch(&folder, e.to_string()))?;

        watcher
            .watch(&folder, RecursiveMode::NonRecursive)
            .map_err(|e| ConfigError::watch(&folder, e.to_string()))?;

        Ok(Self {
            _watcher: watcher,
            rx,
            folder,
            debounce: Duration::from_millis(500),
            last_change: None,
        })
    }

    /// Set the debounce window. Default is 500ms.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// The watched folder.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Wait for the next key change.
    ///
    /// Returns `None` once the underlying watcher has shut down.
    pub async fn next(&mut self) -> Option<KeyChange> {
        loop {
            let event = self.rx.recv().await?;
            if let Some(change) = self.process_event(&event, Instant::now()) {
                return Some(change);
            }
        }
    }

    fn process_event(&mut self, event: &Event, now: Instant) -> Option<KeyChange> {
        let kind = KeyChangeKind::from_event(&event.kind)?;

        let path = event
            .paths
            .iter()
            .find(|p| p.extension().and_then(|e| e.to_str()) == Some(KEY_EXTENSION))?
            .clone();

        // The whole folder is reloaded per change, so debounce folder-wide.
        if let Some(last) = self.last_change {
            if now.duration_since(last) < self.debounce {
                return None;
            }
        }
        self.last_change = Some(now);

        Some(KeyChange {
            path,
            kind,
            timestamp: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind, RemoveKind};
    use std::fs;
    use tempfile::TempDir;
    use tokio::time::{sleep, timeout};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    fn watcher() -> (TempDir, KeyFolderWatcher) {
        let dir = TempDir::new().unwrap();
        let watcher = KeyFolderWatcher::new(dir.path()).unwrap();
        (dir, watcher)
    }

    #[test]
    fn test_missing_folder() {
        let err = KeyFolderWatcher::new("/nonexistent/keys").unwrap_err();
        assert!(matches!(err, ConfigError::Watch { .. }));
    }

    #[tokio::test]
    async fn test_only_pem_files_count() {
        let (_dir, mut watcher) = watcher();
        let now = Instant::now();

        assert!(watcher
            .process_event(&event(EventKind::Create(CreateKind::File), "/k/notes.txt"), now)
            .is_none());
        assert!(watcher
            .process_event(&event(EventKind::Create(CreateKind::File), "/k/README"), now)
            .is_none());

        let change = watcher
            .process_event(&event(EventKind::Create(CreateKind::File), "/k/abc.pem"), now)
            .unwrap();
        assert_eq!(change.kind, KeyChangeKind::Created);
        assert_eq!(change.path, PathBuf::from("/k/abc.pem"));
    }

    #[tokio::test]
    async fn test_access_events_ignored() {
        let (_dir, mut watcher) = watcher();
        let read = event(EventKind::Access(AccessKind::Any), "/k/abc.pem");
        assert!(watcher.process_event(&read, Instant::now()).is_none());
    }

    #[tokio::test]
    async fn test_burst_is_debounced() {
        let (_dir, watcher) = watcher();
        let mut watcher = watcher.with_debounce(Duration::from_millis(200));
        let start = Instant::now();

        let write = event(EventKind::Modify(ModifyKind::Data(DataChange::Any)), "/k/a.pem");
        let remove = event(EventKind::Remove(RemoveKind::File), "/k/b.pem");

        assert!(watcher.process_event(&write, start).is_some());
        assert!(watcher.process_event(&remove, start + Duration::from_millis(50)).is_none());

        let later = watcher
            .process_event(&remove, start + Duration::from_millis(300))
            .unwrap();
        assert_eq!(later.kind, KeyChangeKind::Removed);
    }

    #[tokio::test]
    async fn test_detects_new_key_file() {
        let (dir, watcher) = watcher();
        let mut watcher = watcher.with_debounce(Duration::from_millis(10));
        sleep(Duration::from_millis(100)).await;

        fs::write(dir.path().join("new.pem"), "-----BEGIN PUBLIC KEY-----").unwrap();

        // File system events can be slow or coalesced in CI; only check what
        // arrives.
        if let Ok(Some(change)) = timeout(Duration::from_secs(2), watcher.next()).await {
            assert_eq!(change.path.file_name().unwrap(), "new.pem");
        }
    }
}
