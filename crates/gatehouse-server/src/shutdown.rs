//! Shutdown signalling and connection draining.
//!
//! A [`ShutdownSignal`] fires on SIGINT/SIGTERM or when a handler returns
//! the shutdown error. The serving loop then stops accepting and waits on a
//! [`ConnectionTracker`] until open connections close.

use gatehouse_telemetry::Logger;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// A cloneable, fire-once shutdown signal.
///
/// ```rust
/// use gatehouse_server::ShutdownSignal;
///
/// let shutdown = ShutdownSignal::new();
/// let other = shutdown.clone();
///
/// shutdown.trigger();
/// assert!(other.is_shutdown());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal. Later calls do nothing.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Returns `true` once fired.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the signal fires, immediately if it already has.
    pub async fn recv(&self) {
        self.token.cancelled().await;
    }

    /// Fires this signal on SIGINT or SIGTERM.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn listen_for_os_signals(&self, logger: Logger) {
        let signal = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                received = os_signal() => match received {
                    Ok(name) => {
                        logger.in_scope(|| tracing::info!(signal = name, "shutdown started"));
                        signal.trigger();
                    }
                    Err(err) => logger.in_scope(|| {
                        tracing::error!(error = %err, "cannot listen for shutdown signals");
                    }),
                },
                () = signal.recv() => {}
            }
        });
    }
}

#[cfg(unix)]
async fn os_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = term.recv() => Ok("SIGTERM"),
        _ = int.recv() => Ok("SIGINT"),
    }
}

#[cfg(not(unix))]
async fn os_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

/// Counts open connections so shutdown can wait for them.
///
/// ```rust
/// use gatehouse_server::ConnectionTracker;
///
/// let tracker = ConnectionTracker::new();
/// let conn = tracker.acquire();
/// assert_eq!(tracker.active_connections(), 1);
///
/// drop(conn);
/// assert_eq!(tracker.active_connections(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    open: watch::Sender<usize>,
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionTracker {
    /// Creates a tracker with no connections.
    #[must_use]
    pub fn new() -> Self {
        Self {
            open: watch::Sender::new(0),
        }
    }

    /// Counts a connection until the returned token is dropped.
    #[must_use]
    pub fn acquire(&self) -> ConnectionToken {
        self.open.send_modify(|n| *n += 1);
        ConnectionToken {
            open: self.open.clone(),
        }
    }

    /// Number of open connections.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        *self.open.borrow()
    }

    /// Waits until every token has been dropped.
    pub async fn wait_for_idle(&self) {
        let mut rx = self.open.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

/// An open connection. Dropping it releases the count.
#[derive(Debug)]
pub struct ConnectionToken {
    open: watch::Sender<usize>,
}

impl Drop for ConnectionToken {
    fn drop(&mut self) {
        self.open.send_modify(|n| *n = n.saturating_sub(1));
    }
}
