//! Time-window log scanner
//!
//! Pulls `[YYYY-MM-DD HH:MM:SS]` stamped lines out of a set of text files and
//! keeps the ones that fall inside a trailing window. Output order is file
//! order, then line order within each file; nothing is re-sorted.

use crate::error::Result;
use crate::inspect::Outcome;
use crate::table::{TabularResult, Value, row};
use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, TimeZone};
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Timestamp layout used both for matching and for the `date` column
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Window used when the caller does not supply one
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Columns of every scan result
pub const LOG_COLUMNS: [&str; 2] = ["date", "message"];

static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})\]").expect("timestamp pattern is valid")
});

/// A stamped line inside the window
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Parsed timestamp, second resolution
    pub timestamp: DateTime<Local>,
    /// The original line with surrounding whitespace trimmed
    pub message: String,
}

/// Scanner bound to a fixed cutoff
#[derive(Debug, Clone)]
pub struct LogScanner {
    window: TimeDelta,
    /// `None` when the window reaches past the earliest representable time
    cutoff: Option<DateTime<Local>>,
}

impl LogScanner {
    /// Scanner keeping entries no older than `window` before `now`
    pub fn new(window: TimeDelta, now: DateTime<Local>) -> Self {
        Self {
            window,
            cutoff: now.checked_sub_signed(window),
        }
    }

    /// Scanner with a window expressed in whole days
    pub fn days(days: u32, now: DateTime<Local>) -> Self {
        let window = TimeDelta::try_days(i64::from(days)).unwrap_or(TimeDelta::MAX);
        Self::new(window, now)
    }

    /// Oldest timestamp still kept; `None` keeps everything
    pub fn cutoff(&self) -> Option<DateTime<Local>> {
        self.cutoff
    }

    /// Examine one line. Lines without a usable timestamp, or older than the
    /// cutoff, yield `None`.
    pub fn scan_line(&self, line: &str) -> Option<LogEntry> {
        let stamp = TIMESTAMP_RE.captures(line)?.get(1)?.as_str();
        let naive = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
        // Nonexistent local times (DST gap) are dropped like any other bad stamp
        let timestamp = Local.from_local_datetime(&naive).earliest()?;

        if self.cutoff.is_some_and(|cutoff| timestamp < cutoff) {
            return None;
        }
        Some(LogEntry {
            timestamp,
            message: line.trim().to_string(),
        })
    }

    /// Scan files in the order given. Files that cannot be opened are skipped.
    pub fn scan_files<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<LogEntry> {
        let mut entries = Vec::new();
        for path in paths {
            self.scan_file(path.as_ref(), &mut entries);
        }
        entries
    }

    fn scan_file(&self, path: &Path, entries: &mut Vec<LogEntry>) {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable log file");
                return;
            }
        };

        let before = entries.len();
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    if let Some(entry) = self.scan_line(&line) {
                        entries.push(entry);
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Read failed, keeping entries read so far");
                    break;
                }
            }
        }

        tracing::debug!(
            path = %path.display(),
            matched = entries.len() - before,
            "Scanned log file"
        );
    }

    /// Scan explicit files and wrap the result as an outcome
    pub fn scan_paths<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Outcome> {
        let entries = self.scan_files(paths);
        self.outcome(entries)
    }

    /// Scan every file in `dir` matching `pattern` (alphabetical order).
    ///
    /// A missing directory is a failure; an existing directory without
    /// matching files, or without entries in the window, is empty.
    pub fn scan_directory(&self, dir: &Path, pattern: &str) -> Result<Outcome> {
        if !dir.is_dir() {
            return Ok(Outcome::Failure("log directory not found".to_string()));
        }

        let files = candidate_files(dir, pattern)?;
        tracing::debug!(dir = %dir.display(), pattern, count = files.len(), "Log files found");
        self.scan_paths(&files)
    }

    fn outcome(&self, entries: Vec<LogEntry>) -> Result<Outcome> {
        if entries.is_empty() {
            return Ok(Outcome::Empty(format!(
                "No log entries found in the last {} days.",
                self.window.num_days()
            )));
        }
        Ok(Outcome::Data(entries_to_result(entries)?))
    }
}

/// Files in `dir` whose names match `pattern`
fn candidate_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        pattern
    );

    let mut files = Vec::new();
    for entry in glob::glob(&full)? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Skipping unreadable directory entry"),
        }
    }
    Ok(files)
}

/// Convert entries into a `{date, message}` result
pub fn entries_to_result(entries: Vec<LogEntry>) -> Result<TabularResult> {
    let records = entries
        .into_iter()
        .map(|e| {
            row([
                ("date", Value::from(e.timestamp.format(TIMESTAMP_FORMAT).to_string())),
                ("message", Value::from(e.message)),
            ])
        })
        .collect();
    TabularResult::from_records(LOG_COLUMNS, records)
}
