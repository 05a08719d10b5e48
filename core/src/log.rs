//! Append-only command log
//!
//! One record per line, `[YYYY-MM-DD HH:MM:SS] <command>`, written by the
//! hook process and read whole by `blast`. Lines are never mutated, deleted,
//! or reordered; the file only ever grows. A reader racing a concurrent
//! append may see a torn trailing line, so parsing is strictly best-effort:
//! anything that does not carry a well-formed timestamp prefix degrades to a
//! timestamp-less record instead of an error.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};

/// Timestamp layout used on every log line. Fixed and lexically sortable.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One timestamped command entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Second-granularity local time; `None` for malformed lines
    pub timestamp: Option<NaiveDateTime>,

    /// The command text, trimmed
    pub text: String,
}

impl Record {
    /// Parse one non-empty log line.
    ///
    /// Splits on the first `]`. A line without the closing delimiter, or
    /// with a bracketed prefix that is not a valid timestamp, becomes a
    /// record whose `text` is the whole raw line.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix('[') {
            if let Some(end) = rest.find(']') {
                if let Ok(ts) = NaiveDateTime::parse_from_str(&rest[..end], TIMESTAMP_FORMAT) {
                    return Self {
                        timestamp: Some(ts),
                        text: rest[end + 1..].trim().to_string(),
                    };
                }
            }
        }
        Self {
            timestamp: None,
            text: line.to_string(),
        }
    }

    /// The timestamp rendered in log-line form, empty when absent.
    pub fn timestamp_display(&self) -> String {
        self.timestamp
            .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default()
    }
}

/// Handle on the append-only log file.
pub struct LogStore {
    path: PathBuf,
}

impl LogStore {
    /// Create a store for the configured log path.
    pub fn new(config: &Config) -> Self {
        Self {
            path: config.log_path(),
        }
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Append one command as a timestamped line, flushed before returning.
    ///
    /// This is the single entry point the hook calls for every command the
    /// shell reports. The parent directory is created on first use.
    pub fn append(&self, text: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "[{}] {}", timestamp, text.trim())?;
        file.flush()?;

        debug!("appended command to {:?}", self.path);
        Ok(())
    }

    /// Load every record in append order.
    ///
    /// Reads the whole file with lossy UTF-8 decoding (an in-flight append
    /// can tear a multibyte sequence) and skips empty lines. A missing file
    /// is `Error::LogMissing`, surfaced to the user rather than crashing.
    pub fn load_all(&self) -> Result<Vec<Record>> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::LogMissing {
                    path: self.path.clone(),
                }
            } else {
                Error::Io(e)
            }
        })?;

        let content = String::from_utf8_lossy(&bytes);
        let records: Vec<Record> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(Record::parse)
            .collect();

        debug!("loaded {} records from {:?}", records.len(), self.path);
        Ok(records)
    }

    /// File size in bytes, zero when absent. Used by `status` reporting.
    pub fn size_bytes(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> LogStore {
        LogStore::new(&Config::for_state_dir(dir.path()))
    }

    #[test]
    fn test_append_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.append("ls -la").unwrap();
        store.append("  git status  ").unwrap();
        store.append("cargo test").unwrap();

        let records = store.load_all().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].text, "ls -la");
        assert_eq!(records[1].text, "git status");
        assert_eq!(records[2].text, "cargo test");
        for record in &records {
            assert!(record.timestamp.is_some());
        }
    }

    #[test]
    fn test_missing_file_is_log_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(matches!(
            store.load_all(),
            Err(Error::LogMissing { .. })
        ));
    }

    #[test]
    fn test_malformed_line_degrades() {
        let record = Record::parse("[2024-01-01 10:00 unterminated");
        assert!(record.timestamp.is_none());
        assert_eq!(record.text, "[2024-01-01 10:00 unterminated");

        let record = Record::parse("no brackets at all");
        assert!(record.timestamp.is_none());
        assert_eq!(record.text, "no brackets at all");
    }

    #[test]
    fn test_well_formed_line_parses() {
        let record = Record::parse("[2024-03-05 14:30:01] make check");
        assert_eq!(record.timestamp_display(), "2024-03-05 14:30:01");
        assert_eq!(record.text, "make check");
    }

    #[test]
    fn test_empty_and_partial_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            "[2024-03-05 14:30:01] ls\n\n   \n[2024-03-05 14:30:02",
        )
        .unwrap();

        let records = store.load_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "ls");
        // Torn trailing line survives as its own timestamp-less record
        assert!(records[1].timestamp.is_none());
    }
}
