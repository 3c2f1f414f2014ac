//! Configuration types for a watch session.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WatcherError};
use crate::pattern::{DEFAULT_PATTERN, PatternMatcher};

/// Default polling interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for a single session.
///
/// Built once from external input and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Paths to watch.
    pub paths: Vec<PathBuf>,

    /// How changes are detected.
    pub mode: WatchMode,

    /// Keep reporting events instead of stopping at the first one.
    pub continuous: bool,

    /// Report every event with exit code 0.
    pub success_only: bool,

    /// Sampling interval for polling.
    pub interval: Duration,

    /// Session time limit; zero means unbounded.
    pub timeout: Duration,

    /// Watch directories recursively.
    pub recursive: bool,

    /// Regex fragments. The first entry is normally [`DEFAULT_PATTERN`].
    pub regexes: Vec<String>,

    /// Glob patterns.
    pub globs: Vec<String>,
}

impl SessionConfig {
    /// Create a new single-shot watching config.
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            mode: WatchMode::Watching,
            continuous: false,
            success_only: false,
            interval: DEFAULT_INTERVAL,
            timeout: Duration::ZERO,
            recursive: false,
            regexes: vec![DEFAULT_PATTERN.to_string()],
            globs: Vec::new(),
        }
    }

    /// Set the watch mode.
    pub fn with_mode(mut self, mode: WatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Switch to polling with the given interval.
    pub fn polling(mut self, interval: Duration) -> Self {
        self.mode = WatchMode::Polling;
        self.interval = interval;
        self
    }

    /// Enable continuous mode.
    pub fn continuous(mut self) -> Self {
        self.continuous = true;
        self
    }

    /// Always exit with code 0 on an event.
    pub fn success_only(mut self) -> Self {
        self.success_only = true;
        self
    }

    /// Set the session timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Watch directories recursively.
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    /// Add a regex fragment.
    pub fn regex(mut self, pattern: impl Into<String>) -> Self {
        self.regexes.push(pattern.into());
        self
    }

    /// Add a glob pattern.
    pub fn glob(mut self, pattern: impl Into<String>) -> Self {
        self.globs.push(pattern.into());
        self
    }

    /// Continuous mode after applying the timeout rule: a bounded run is
    /// always continuous.
    pub fn effective_continuous(&self) -> bool {
        self.continuous || self.has_timeout()
    }

    pub fn has_timeout(&self) -> bool {
        !self.timeout.is_zero()
    }

    /// Compile the path filter.
    pub fn pattern(&self) -> Result<PatternMatcher> {
        PatternMatcher::build(&self.regexes, &self.globs)
    }

    /// Check the configuration before any loop starts.
    pub fn validate(&self) -> Result<()> {
        if self.paths.is_empty() {
            return Err(WatcherError::Config("no paths given".to_string()));
        }

        if self.interval.is_zero() {
            return Err(WatcherError::Config(
                "interval must be greater than zero".to_string(),
            ));
        }

        match self.mode {
            WatchMode::Polling => {
                for path in &self.paths {
                    validate_pollable(path)?;
                }
                if self.has_timeout() && self.timeout < self.interval {
                    return Err(WatcherError::Conflict(format!(
                        "timeout ({:?}) is shorter than the polling interval ({:?})",
                        self.timeout, self.interval
                    )));
                }
            }
            WatchMode::Watching => {
                // Missing paths are skipped at registration; one must exist.
                if !self.paths.iter().any(|p| p.exists()) {
                    return Err(WatcherError::PathNotFound(self.paths[0].clone()));
                }
            }
        }

        self.pattern()?;
        Ok(())
    }
}

fn validate_pollable(path: &Path) -> Result<()> {
    let metadata = match path.metadata() {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(WatcherError::PathNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    if metadata.is_dir() {
        return Err(WatcherError::NotAFile(path.to_path_buf()));
    }
    Ok(())
}

/// How changes are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchMode {
    /// OS file notifications.
    #[default]
    Watching,

    /// Periodic modification-time sampling of listed files.
    Polling,
}
