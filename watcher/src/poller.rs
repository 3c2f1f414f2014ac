//! Modification-time polling over an explicit list of files.

use std::io;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::config::WatchMode;
use crate::error::{Result, WatcherError};
use crate::event::Event;
use crate::report::EventSink;
use crate::session::{RunResult, SessionController};

/// A path whose state is tracked across samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    /// Path as given by the caller.
    pub path: PathBuf,

    /// What the path pointed at when the session started.
    pub kind: TargetKind,

    /// Modification time from the most recent successful read.
    pub last_modified: Option<SystemTime>,

    /// Whether the path currently exists. Untracked targets are "removed".
    pub tracked: bool,
}

impl WatchTarget {
    fn from_path(path: &Path) -> io::Result<Self> {
        let metadata = path.metadata()?;
        Ok(Self {
            path: path.to_path_buf(),
            kind: if metadata.is_dir() {
                TargetKind::Directory
            } else {
                TargetKind::File
            },
            last_modified: metadata.modified().ok(),
            tracked: true,
        })
    }
}

/// Kind of watch target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    File,
    Directory,
}

/// Detects changes to a fixed set of files by comparing modification times.
///
/// Each tick runs in phases: [`sample`](Self::sample) captures the current
/// times, the caller sleeps, [`compare`](Self::compare) re-reads them, and
/// [`revive`](Self::revive) checks whether removed files came back. A target
/// is either tracked or removed, never both, and is never forgotten.
#[derive(Debug)]
pub struct Poller {
    targets: Vec<WatchTarget>,

    /// Targets that were already removed when the current tick began.
    /// Only these may be revived in this tick.
    revivable: Vec<usize>,
}

impl Poller {
    /// Stat every path once. Missing paths are an input error.
    pub fn new<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut targets = Vec::with_capacity(paths.len());

        for path in paths {
            let path = path.as_ref();
            match WatchTarget::from_path(path) {
                Ok(target) => targets.push(target),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(WatcherError::PathNotFound(path.to_path_buf()));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Self {
            targets,
            revivable: Vec::new(),
        })
    }

    /// Start a tick: capture modification times and report vanished files.
    pub fn sample(&mut self) -> Vec<Event> {
        self.revivable = self
            .targets
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.tracked)
            .map(|(i, _)| i)
            .collect();

        let mut events = Vec::new();
        for target in self.targets.iter_mut().filter(|t| t.tracked) {
            match read_modified(&target.path) {
                Ok(modified) => target.last_modified = Some(modified),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    target.tracked = false;
                    events.push(Event::remove(&target.path));
                }
                Err(e) => warn!("Failed to stat {}: {e}", target.path.display()),
            }
        }
        events
    }

    /// Re-read modification times after the sleep and report differences.
    pub fn compare(&mut self) -> Vec<Event> {
        let mut events = Vec::new();

        for target in self.targets.iter_mut().filter(|t| t.tracked) {
            match read_modified(&target.path) {
                Ok(modified) => {
                    if target.last_modified != Some(modified) {
                        target.last_modified = Some(modified);
                        events.push(Event::modify(&target.path));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    target.tracked = false;
                    events.push(Event::remove(&target.path));
                }
                Err(e) => warn!("Failed to stat {}: {e}", target.path.display()),
            }
        }
        events
    }

    /// Bring back files that were removed before this tick and exist again.
    pub fn revive(&mut self) -> Vec<Event> {
        let mut events = Vec::new();

        for &index in &self.revivable {
            let target = &mut self.targets[index];
            if let Ok(modified) = read_modified(&target.path) {
                target.tracked = true;
                target.last_modified = Some(modified);
                events.push(Event::add(&target.path));
            }
        }
        self.revivable.clear();
        events
    }

    /// Targets that currently exist.
    pub fn tracked(&self) -> impl Iterator<Item = &WatchTarget> {
        self.targets.iter().filter(|t| t.tracked)
    }

    /// Targets that have disappeared.
    pub fn removed(&self) -> impl Iterator<Item = &WatchTarget> {
        self.targets.iter().filter(|t| !t.tracked)
    }

    /// Check whether a path is in the tracked set.
    pub fn is_tracked(&self, path: &Path) -> bool {
        self.tracked().any(|t| t.path == path)
    }

    /// Drive the poller until the session terminates.
    pub async fn run<S: EventSink>(
        &mut self,
        session: &mut SessionController<S>,
    ) -> Result<RunResult> {
        let interval = session.config().interval;
        let cancel = session.cancel_token().clone();
        info!(
            "Polling {} file(s) every {interval:?}",
            self.targets.len()
        );

        loop {
            if let ControlFlow::Break(result) = session.dispatch_all(self.sample())? {
                return Ok(result);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Polling interrupted");
                    return Ok(session.interrupted(WatchMode::Polling));
                }
                _ = tokio::time::sleep(interval) => {}
            }

            if let ControlFlow::Break(result) = session.dispatch_all(self.compare())? {
                return Ok(result);
            }
            if let ControlFlow::Break(result) = session.dispatch_all(self.revive())? {
                return Ok(result);
            }

            if session.timed_out() {
                return Ok(session.timed_out_result());
            }
        }
    }
}

fn read_modified(path: &Path) -> io::Result<SystemTime> {
    path.metadata()?.modified()
}
