//! # Change Watcher
//!
//! This crate detects modification, creation and removal of file-system
//! paths and reports them as classified events with deterministic exit
//! codes, for shell scripts and supervision loops that block until
//! something changes.
//!
//! ## Features
//!
//! - **Notification Watching**: OS file events, optionally recursive
//! - **Polling**: Modification-time sampling of explicitly listed files
//! - **Pattern Filtering**: Regex and glob fragments combined into one matcher
//! - **Run Modes**: Single-shot or continuous, with an optional timeout
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Session Controller                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  SessionConfig ──► Poller | EventWatcher ──► Event ──► EventSink│
//! │                               │                                 │
//! │                               ▼                                 │
//! │                  NotifyBackend + PatternMatcher                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod event;
pub mod pattern;
pub mod poller;
pub mod report;
pub mod session;
pub mod watcher;

pub use backend::{NotifyBackend, OsBackend};
pub use config::{SessionConfig, WatchMode};
pub use error::{Result, WatcherError};
pub use event::{Event, EventKind, RawEvent, RawEventKind};
pub use pattern::{DEFAULT_PATTERN, PatternMatcher};
pub use poller::{Poller, WatchTarget};
pub use report::{EventSink, LineReporter, OutputFormat};
pub use session::{RunResult, SessionController, Termination};
pub use watcher::EventWatcher;
