//! OS file notification capability.

use std::path::Path;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::error::{Result, WatcherError};
use crate::event::{RawEvent, RawEventKind};

/// Capacity of the raw notification channel.
const CHANNEL_CAPACITY: usize = 1000;

/// Whether the platform watcher reports a file being closed after writing.
/// Modifications are only ever detected through that notification.
pub const REPORTS_CLOSE_WRITE: bool = cfg!(any(target_os = "linux", target_os = "android"));

/// Registers paths with a notification source.
///
/// Notifications are delivered separately, through the receiver handed out
/// when the backend is created.
pub trait NotifyBackend {
    /// Start delivering notifications for `path`.
    fn watch(&mut self, path: &Path, recursive: bool) -> Result<()>;

    /// Stop delivering notifications for `path`.
    fn unwatch(&mut self, path: &Path) -> Result<()>;
}

/// Backend built on the platform's recommended notify watcher.
pub struct OsBackend {
    watcher: RecommendedWatcher,
}

impl OsBackend {
    /// Create the backend and the stream of raw notifications.
    ///
    /// Fails with [`WatcherError::BackendUnavailable`] when the host offers no
    /// usable notification facility, including one that cannot report
    /// close-after-write.
    pub fn new() -> Result<(Self, mpsc::Receiver<RawEvent>)> {
        if !REPORTS_CLOSE_WRITE {
            return Err(WatcherError::BackendUnavailable(notify::Error::generic(
                "platform notifications do not report files closed after writing",
            )));
        }

        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for path in event.paths {
                        let kind = RawEventKind::from_notify(event.kind, &path);
                        // Runs on notify's own thread, never inside the runtime.
                        // Fails once the receiver is closed at shutdown.
                        if event_tx.blocking_send(RawEvent::new(kind, path)).is_err() {
                            debug!("Notification receiver dropped");
                            return;
                        }
                    }
                }
                Err(e) => {
                    error!("Watch error: {e}");
                }
            },
        )
        .map_err(WatcherError::BackendUnavailable)?;

        Ok((Self { watcher }, event_rx))
    }
}

impl NotifyBackend for OsBackend {
    fn watch(&mut self, path: &Path, recursive: bool) -> Result<()> {
        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        self.watcher.watch(path, mode)?;
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) -> Result<()> {
        self.watcher.unwatch(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    #[test]
    fn test_unavailable_without_close_write() {
        let result = OsBackend::new();
        assert!(matches!(result, Err(WatcherError::BackendUnavailable(_))));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_reports_close_write() {
        assert!(REPORTS_CLOSE_WRITE);
        assert!(OsBackend::new().is_ok());
    }
}
