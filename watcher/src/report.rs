//! Emitting one line per event.

use std::io::{self, Write};

use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::event::{Event, EventKind};

/// Receives every event the session reports.
pub trait EventSink {
    fn emit(&mut self, event: &Event) -> Result<()>;
}

/// Collects events in memory.
impl EventSink for Vec<Event> {
    fn emit(&mut self, event: &Event) -> Result<()> {
        self.push(event.clone());
        Ok(())
    }
}

/// Line format for reported events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `2026-01-01T12:00:00.000 * path`
    #[default]
    Human,

    /// One JSON object per line.
    Json,
}

/// Writes events as lines to any writer.
pub struct LineReporter<W: Write> {
    writer: W,
    format: OutputFormat,
    quiet: bool,
}

impl<W: Write> LineReporter<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer,
            format,
            quiet: false,
        }
    }

    /// Suppress all output.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> EventSink for LineReporter<W> {
    fn emit(&mut self, event: &Event) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        match self.format {
            OutputFormat::Human => writeln!(self.writer, "{}", human_line(event))?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.writer, &JsonLine::from(event))
                    .map_err(io::Error::from)?;
                writeln!(self.writer)?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }
}

fn human_line(event: &Event) -> String {
    let local: DateTime<Local> = event.observed_at.into();
    format!(
        "{} {} {}",
        local.format("%Y-%m-%dT%H:%M:%S%.3f"),
        event.kind.tag(),
        event.path.display()
    )
}

#[derive(Serialize)]
struct JsonLine<'a> {
    timestamp: String,
    kind: EventKind,
    tag: char,
    path: std::borrow::Cow<'a, str>,
}

impl<'a> From<&'a Event> for JsonLine<'a> {
    fn from(event: &'a Event) -> Self {
        Self {
            timestamp: rfc3339(event.observed_at),
            kind: event.kind,
            tag: event.kind.tag(),
            path: event.path.to_string_lossy(),
        }
    }
}

fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}
