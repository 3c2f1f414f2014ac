//! Canonical change events and the raw notifications they are built from.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use serde::{Deserialize, Serialize};

/// A classified change to a watched path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// The kind of change.
    pub kind: EventKind,

    /// Path to the affected file or directory.
    pub path: PathBuf,

    /// When the change was observed.
    pub observed_at: DateTime<Utc>,
}

impl Event {
    /// Create a new event observed now.
    pub fn new(kind: EventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            observed_at: Utc::now(),
        }
    }

    pub fn modify(path: impl Into<PathBuf>) -> Self {
        Self::new(EventKind::Modify, path)
    }

    pub fn add(path: impl Into<PathBuf>) -> Self {
        Self::new(EventKind::Add, path)
    }

    pub fn remove(path: impl Into<PathBuf>) -> Self {
        Self::new(EventKind::Remove, path)
    }
}

/// The only three change classifications exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Existing path changed.
    Modify,

    /// Path appeared.
    Add,

    /// Path disappeared.
    Remove,
}

impl EventKind {
    /// Exit code reported for this kind in single-shot mode.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Modify => 0,
            Self::Add => 1,
            Self::Remove => 2,
        }
    }

    /// One-character tag used in emitted lines.
    pub fn tag(self) -> char {
        match self {
            Self::Modify => '*',
            Self::Add => '+',
            Self::Remove => '-',
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Modify => "modify",
            Self::Add => "add",
            Self::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// A low-level notification delivered by the OS backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: RawEventKind,
    pub path: PathBuf,
}

impl RawEvent {
    pub fn new(kind: RawEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Kind of raw notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEventKind {
    /// Entry created inside a watched directory.
    Created,

    /// Entry deleted inside a watched directory.
    Deleted,

    /// Entry renamed away (old name).
    MovedFrom,

    /// Entry renamed into place (new name).
    MovedTo,

    /// File closed after being opened for writing.
    CloseWrite,

    /// A watch root was itself deleted.
    SelfDeleted,

    /// A watch root was itself moved.
    SelfMoved,

    /// Anything else; carries a description for debug logs.
    Other(String),
}

impl From<notify::EventKind> for RawEventKind {
    fn from(kind: notify::EventKind) -> Self {
        match kind {
            notify::EventKind::Create(_) => Self::Created,
            notify::EventKind::Remove(_) => Self::Deleted,
            notify::EventKind::Modify(ModifyKind::Name(rename)) => match rename {
                RenameMode::From => Self::MovedFrom,
                RenameMode::To => Self::MovedTo,
                // `Both` pairs a from/to that were already delivered separately.
                other => Self::Other(format!("rename {other:?}")),
            },
            notify::EventKind::Access(AccessKind::Close(AccessMode::Write)) => Self::CloseWrite,
            other => Self::Other(format!("{other:?}")),
        }
    }
}

impl RawEventKind {
    /// Classify a notification about `path`.
    ///
    /// A rename with no direction is resolved by whether `path` still exists:
    /// present means it is the new name, absent means the old one.
    pub fn from_notify(kind: notify::EventKind, path: &Path) -> Self {
        match kind {
            notify::EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
                if path.exists() {
                    Self::MovedTo
                } else {
                    Self::MovedFrom
                }
            }
            other => Self::from(other),
        }
    }

    /// Promote a deletion or move-away to its self-variant when the affected
    /// path is a watch root.
    pub fn for_watch_root(self) -> Self {
        match self {
            Self::Deleted => Self::SelfDeleted,
            Self::MovedFrom => Self::SelfMoved,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_event_creation() {
        let event = Event::add("/test/file.txt");
        assert_eq!(event.kind, EventKind::Add);
        assert_eq!(event.path, Path::new("/test/file.txt"));
    }

    #[test]
    fn test_exit_codes_and_tags() {
        assert_eq!(EventKind::Modify.exit_code(), 0);
        assert_eq!(EventKind::Add.exit_code(), 1);
        assert_eq!(EventKind::Remove.exit_code(), 2);

        assert_eq!(EventKind::Modify.tag(), '*');
        assert_eq!(EventKind::Add.tag(), '+');
        assert_eq!(EventKind::Remove.tag(), '-');
    }

    #[test]
    fn test_raw_kind_from_notify() {
        use notify::EventKind as N;

        assert_eq!(
            RawEventKind::from(N::Create(CreateKind::File)),
            RawEventKind::Created
        );
        assert_eq!(
            RawEventKind::from(N::Remove(RemoveKind::Any)),
            RawEventKind::Deleted
        );
        assert_eq!(
            RawEventKind::from(N::Modify(ModifyKind::Name(RenameMode::From))),
            RawEventKind::MovedFrom
        );
        assert_eq!(
            RawEventKind::from(N::Modify(ModifyKind::Name(RenameMode::To))),
            RawEventKind::MovedTo
        );
        assert_eq!(
            RawEventKind::from(N::Access(AccessKind::Close(AccessMode::Write))),
            RawEventKind::CloseWrite
        );
        assert!(matches!(
            RawEventKind::from(N::Modify(ModifyKind::Data(DataChange::Any))),
            RawEventKind::Other(_)
        ));
        assert!(matches!(
            RawEventKind::from(N::Modify(ModifyKind::Name(RenameMode::Both))),
            RawEventKind::Other(_)
        ));
    }

    #[test]
    fn test_watch_root_promotion() {
        assert_eq!(
            RawEventKind::Deleted.for_watch_root(),
            RawEventKind::SelfDeleted
        );
        assert_eq!(
            RawEventKind::MovedFrom.for_watch_root(),
            RawEventKind::SelfMoved
        );
        assert_eq!(RawEventKind::Created.for_watch_root(), RawEventKind::Created);
    }

    #[test]
    fn test_undirected_rename_resolved_by_existence() {
        let temp_dir = TempDir::new().unwrap();
        let present = temp_dir.path().join("new.txt");
        std::fs::write(&present, "x").unwrap();
        let absent = temp_dir.path().join("old.txt");
        let rename = notify::EventKind::Modify(ModifyKind::Name(RenameMode::Any));

        assert_eq!(
            RawEventKind::from_notify(rename, &present),
            RawEventKind::MovedTo
        );
        assert_eq!(
            RawEventKind::from_notify(rename, &absent),
            RawEventKind::MovedFrom
        );
        assert_eq!(
            RawEventKind::from_notify(
                notify::EventKind::Access(AccessKind::Close(AccessMode::Write)),
                &present
            ),
            RawEventKind::CloseWrite
        );
    }
}
