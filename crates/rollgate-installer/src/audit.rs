use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::RootLayout;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl AuditEntry {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            message: single_line(&message.into()),
        }
    }
}

/// History is one entry per line, so embedded line breaks are escaped.
fn single_line(message: &str) -> String {
    if !message.contains(['\n', '\r']) {
        return message.to_string();
    }
    message.replace('\r', "\\r").replace('\n', "\\n")
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.message
        )
    }
}

/// Append-only sink narrating an update attempt.
pub trait AuditLog {
    fn record(&self, message: &str) -> Result<()>;
}

impl<T: AuditLog + ?Sized> AuditLog for &T {
    fn record(&self, message: &str) -> Result<()> {
        (**self).record(message)
    }
}

impl<T: AuditLog + ?Sized> AuditLog for Box<T> {
    fn record(&self, message: &str) -> Result<()> {
        (**self).record(message)
    }
}

/// Writes `[<timestamp>] <message>` lines to `install_history.log`.
#[derive(Debug, Clone)]
pub struct FileAuditLog {
    path: PathBuf,
}

impl FileAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_layout(layout: &RootLayout) -> Self {
        Self::new(layout.history_path())
    }
}

impl AuditLog for FileAuditLog {
    fn record(&self, message: &str) -> Result<()> {
        let path = &self.path;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open install history: {}", path.display()))?;
        let line = format!("{}\n", AuditEntry::now(message));
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to append install history: {}", path.display()))?;
        file.flush()
            .with_context(|| format!("failed to flush install history: {}", path.display()))?;
        Ok(())
    }
}

/// Keeps entries in memory; useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: RefCell<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .map(|entry| entry.message.clone())
            .collect()
    }
}

impl AuditLog for MemoryAuditLog {
    fn record(&self, message: &str) -> Result<()> {
        self.entries.borrow_mut().push(AuditEntry::now(message));
        Ok(())
    }
}

/// Forwards every entry to `inner`, then hands the rendered line to `observer`.
pub struct ObservedAuditLog<A, F> {
    inner: A,
    observer: F,
}

impl<A, F> ObservedAuditLog<A, F>
where
    A: AuditLog,
    F: Fn(&str),
{
    pub fn new(inner: A, observer: F) -> Self {
        Self { inner, observer }
    }
}

impl<A, F> AuditLog for ObservedAuditLog<A, F>
where
    A: AuditLog,
    F: Fn(&str),
{
    fn record(&self, message: &str) -> Result<()> {
        self.inner.record(message)?;
        (self.observer)(message);
        Ok(())
    }
}

/// Returns the last `limit` history lines (all of them when `limit` is `None`).
pub fn read_history(layout: &RootLayout, limit: Option<usize>) -> Result<Vec<String>> {
    let path = layout.history_path();
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read install history: {}", path.display()));
        }
    };

    let lines = raw
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    let skip = limit
        .map(|limit| lines.len().saturating_sub(limit))
        .unwrap_or(0);
    Ok(lines.into_iter().skip(skip).collect())
}
