//! Line-oriented snapshot file used between single-shot runs.
//!
//! Each line is `name:status:lastChangeAt`, where `status` is a
//! case-insensitive `true`/`false` token and `lastChangeAt` is decimal epoch
//! seconds. Lines that do not match are skipped.
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::TargetState;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to write state file {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Snapshot of every known target state, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedState {
    records: BTreeMap<String, TargetState>,
}

impl FromIterator<(String, TargetState)> for PersistedState {
    fn from_iter<I: IntoIterator<Item = (String, TargetState)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let value: f64 = raw.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    let secs = value.floor();
    let nanos = ((value - secs) * 1_000_000_000.0).round() as u32;
    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    format!("{}.{:06}", ts.timestamp(), ts.timestamp_subsec_micros())
}

fn parse_line(line: &str) -> Option<(String, TargetState)> {
    let parts: Vec<&str> = line.trim().split(':').collect();
    let [name, status, last_change] = parts.as_slice() else {
        return None;
    };
    if name.is_empty() {
        return None;
    }
    let status = if status.eq_ignore_ascii_case("true") {
        true
    } else if status.eq_ignore_ascii_case("false") {
        false
    } else {
        return None;
    };
    let last_change_at = parse_timestamp(last_change)?;
    Some((name.to_string(), TargetState::new(status, last_change_at)))
}

impl PersistedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&TargetState> {
        self.records.get(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> impl Iterator<Item = (String, TargetState)> {
        self.records.into_iter()
    }

    /// Parses file contents, skipping blank and malformed lines.
    pub fn parse(contents: &str) -> Self {
        let mut records = BTreeMap::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(line) {
                Some((name, state)) => {
                    records.insert(name, state);
                }
                None => debug!(line_number = index + 1, "Skipping malformed state record."),
            }
        }
        Self { records }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, state) in &self.records {
            let _ = writeln!(
                out,
                "{}:{}:{}",
                name,
                state.status,
                format_timestamp(&state.last_change_at)
            );
        }
        out
    }

    /// Reads the snapshot at `path`. A missing or unreadable file yields an
    /// empty snapshot.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let state = Self::parse(&contents);
                info!(path = ?path, targets = state.len(), "Loaded previous state.");
                state
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?path, "No previous state file found.");
                Self::default()
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to read previous state, starting empty.");
                Self::default()
            }
        }
    }

    /// Writes the snapshot through a temporary file in the same directory and
    /// renames it into place.
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        let write_err = |source| PersistenceError::Write {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(self.render().as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;

        debug!(path = ?path, targets = self.len(), "Saved state.");
        Ok(())
    }
}
