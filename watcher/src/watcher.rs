//! Classifying OS notifications into canonical events.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::{NotifyBackend, OsBackend};
use crate::config::WatchMode;
use crate::error::{Result, WatcherError};
use crate::event::{Event, EventKind, RawEvent, RawEventKind};
use crate::pattern::PatternMatcher;
use crate::report::EventSink;
use crate::session::{RunResult, SessionController};

/// Suffix some backends append to deletions of entries whose name is lost.
const UNKNOWN_PATH_SUFFIX: &str = "-unknown-path";

/// Watches files and directories through a [`NotifyBackend`].
///
/// A rename arrives as two unrelated notifications. The old name is
/// reported as a removal and the new name as an addition; the two are never
/// merged.
pub struct EventWatcher {
    backend: Box<dyn NotifyBackend>,
    events: mpsc::Receiver<RawEvent>,
    pattern: PatternMatcher,
    roots: Vec<WatchRoot>,
}

/// A registered path, as the user gave it and as the backend reports it.
#[derive(Debug, Clone)]
struct WatchRoot {
    given: PathBuf,
    canonical: PathBuf,
}

impl WatchRoot {
    /// Rewrite a backend path under this root into the user's frame.
    fn to_given(&self, path: &Path) -> Option<PathBuf> {
        let rest = path.strip_prefix(&self.canonical).ok()?;
        if rest.as_os_str().is_empty() {
            Some(self.given.clone())
        } else {
            Some(self.given.join(rest))
        }
    }
}

impl EventWatcher {
    /// Create a watcher over an existing backend and its notification stream.
    pub fn new(
        backend: Box<dyn NotifyBackend>,
        events: mpsc::Receiver<RawEvent>,
        pattern: PatternMatcher,
    ) -> Self {
        Self {
            backend,
            events,
            pattern,
            roots: Vec::new(),
        }
    }

    /// Create a watcher on the platform notification facility.
    pub fn with_os_backend(pattern: PatternMatcher) -> Result<Self> {
        let (backend, events) = OsBackend::new()?;
        Ok(Self::new(Box::new(backend), events, pattern))
    }

    /// Register every existing path. Returns how many were registered.
    ///
    /// Paths are registered in canonical form; events are reported relative
    /// to the path as given.
    pub fn watch_paths<P: AsRef<Path>>(&mut self, paths: &[P], recursive: bool) -> Result<usize> {
        let mut last_error = None;

        for path in paths {
            let path = path.as_ref();
            if !path.exists() {
                warn!("Not watching non-existent path: {}", path.display());
                continue;
            }

            let registered = path
                .canonicalize()
                .map_err(WatcherError::from)
                .and_then(|canonical| {
                    self.backend.watch(&canonical, recursive)?;
                    Ok(canonical)
                });
            match registered {
                Ok(canonical) => {
                    debug!("Started watching: {}", path.display());
                    self.roots.push(WatchRoot {
                        given: path.to_path_buf(),
                        canonical,
                    });
                }
                Err(e) => {
                    warn!("Failed to watch {}: {e}", path.display());
                    last_error = Some(e);
                }
            }
        }

        if self.roots.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
            let first = paths
                .first()
                .map(|p| p.as_ref().to_path_buf())
                .unwrap_or_default();
            return Err(WatcherError::PathNotFound(first));
        }
        Ok(self.roots.len())
    }

    /// Paths registered with the backend, as given.
    pub fn roots(&self) -> Vec<&Path> {
        self.roots.iter().map(|root| root.given.as_path()).collect()
    }

    /// Map a backend path back to the frame of the root it falls under.
    fn user_path(&self, path: PathBuf) -> PathBuf {
        self.roots
            .iter()
            .find_map(|root| root.to_given(&path))
            .unwrap_or(path)
    }

    /// Turn a raw notification into a canonical event, if it is one.
    pub fn classify(&self, raw: RawEvent) -> Option<Event> {
        let RawEvent { kind, path } = raw;
        let path = self.user_path(path);
        let kind = if self.roots.iter().any(|root| root.given == path) {
            kind.for_watch_root()
        } else {
            kind
        };

        let (event_kind, path) = match kind {
            RawEventKind::Created | RawEventKind::MovedTo => (EventKind::Add, path),
            RawEventKind::CloseWrite => (EventKind::Modify, path),
            RawEventKind::Deleted
            | RawEventKind::MovedFrom
            | RawEventKind::SelfDeleted
            | RawEventKind::SelfMoved => (EventKind::Remove, strip_unknown_suffix(path)),
            RawEventKind::Other(description) => {
                debug!("Ignoring {description} on {}", path.display());
                return None;
            }
        };

        if !self.pattern.matches_path(&path) {
            debug!("Filtered {event_kind} on {}", path.display());
            return None;
        }
        Some(Event::new(event_kind, path))
    }

    /// Drive the watcher until the session terminates.
    pub async fn run<S: EventSink>(
        &mut self,
        session: &mut SessionController<S>,
    ) -> Result<RunResult> {
        let cancel = session.cancel_token().clone();
        let deadline = session.deadline();
        info!("Watching {} path(s)", self.roots.len());

        loop {
            let raw = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Watching interrupted");
                    return Ok(session.interrupted(WatchMode::Watching));
                }
                _ = sleep_until(deadline) => {
                    return Ok(session.timed_out_result());
                }
                raw = self.events.recv() => raw,
            };

            let Some(raw) = raw else {
                return Err(WatcherError::ChannelClosed);
            };

            let Some(event) = self.classify(raw) else {
                continue;
            };
            if let ControlFlow::Break(result) = session.dispatch(event)? {
                return Ok(result);
            }
        }
    }

    /// Release every registration with the backend.
    ///
    /// The notification stream is closed and drained first. A backend
    /// blocked on a full stream would otherwise never process the unwatch.
    pub fn shutdown(&mut self) {
        self.events.close();
        while self.events.try_recv().is_ok() {}

        for root in self.roots.drain(..) {
            if let Err(e) = self.backend.unwatch(&root.canonical) {
                debug!("Failed to unwatch {}: {e}", root.given.display());
            }
        }
    }
}

impl Drop for EventWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Wait until the deadline, or forever without one.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn strip_unknown_suffix(path: PathBuf) -> PathBuf {
    match path.to_str().and_then(|s| s.strip_suffix(UNKNOWN_PATH_SUFFIX)) {
        Some(stripped) => PathBuf::from(stripped),
        None => path,
    }
}
