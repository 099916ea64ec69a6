//! CSV sample log.
//!
//! One header line, then one row per probe, flushed as soon as it is written
//! so an interrupted run leaves every completed sample on disk.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use trafgen_common::SampleRecord;

use crate::error::RunError;

pub const HEADER: &str = "timestamp,seq,mode,status,latency_ms_or_info";

#[derive(Debug)]
pub struct SampleLogger {
    path: PathBuf,
    writer: BufWriter<File>,
    rows: u64,
}

impl SampleLogger {
    /// Creates (or truncates) the log at `path` and writes the header.
    /// Missing parent directories are created.
    ///
    /// # Errors
    /// [`RunError::LogOpen`] if the directory or file cannot be created, or
    /// the header cannot be written.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, RunError> {
        let path = path.into();
        let open_err = |source| RunError::LogOpen {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_err)?;
        }
        let file = File::create(&path).map_err(open_err)?;

        let mut writer = BufWriter::new(file);
        writeln!(writer, "{HEADER}")
            .and_then(|_| writer.flush())
            .map_err(open_err)?;

        debug!(path = %path.display(), "sample log opened");
        Ok(Self {
            path,
            writer,
            rows: 0,
        })
    }

    /// Appends one row and flushes it.
    pub fn append(&mut self, record: &SampleRecord) -> Result<(), RunError> {
        let row = format_row(record);
        writeln!(self.writer, "{row}")
            .and_then(|_| self.writer.flush())
            .map_err(|source| RunError::LogWrite {
                path: self.path.clone(),
                source,
            })?;
        self.rows += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Data rows written so far, header excluded.
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

fn format_row(record: &SampleRecord) -> String {
    let value = record.result.value.to_string();
    format!(
        "{:.3},{},{},{},{}",
        record.timestamp,
        record.seq,
        record.mode,
        record.result.status,
        escape_field(&value)
    )
}

/// Quotes a field only when it would otherwise break the row.
fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use trafgen_common::{Mode, ProbeResult};

    fn record(seq: u64, result: ProbeResult) -> SampleRecord {
        SampleRecord {
            timestamp: 1_700_000_000.123_456,
            seq,
            mode: Mode::Tcp,
            result,
        }
    }

    #[test]
    fn header_is_written_on_create() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");

        let logger = SampleLogger::create(&path).unwrap();
        assert_eq!(logger.rows(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), format!("{HEADER}\n"));
    }

    #[test]
    fn rows_are_visible_before_the_logger_is_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        let mut logger = SampleLogger::create(&path).unwrap();

        logger
            .append(&record(0, ProbeResult::ok(Duration::from_micros(1500))))
            .unwrap();
        logger.append(&record(1, ProbeResult::lost())).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            [
                HEADER,
                "1700000000.123,0,tcp,ok,1.500",
                "1700000000.123,1,tcp,lost,",
            ]
        );
        assert_eq!(logger.rows(), 2);
    }

    #[test]
    fn info_with_separators_is_quoted() {
        let row = format_row(&record(3, ProbeResult::error("refused, \"twice\"")));
        assert_eq!(row, "1700000000.123,3,tcp,error,\"refused, \"\"twice\"\"\"");
    }

    #[test]
    fn unavailable_is_logged_as_error() {
        let row = format_row(&record(0, ProbeResult::unavailable("no raw socket")));
        assert!(row.ends_with(",error,no raw socket"));
    }

    #[test]
    fn missing_parents_are_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/log.csv");
        SampleLogger::create(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn unwritable_location_is_a_log_open_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"").unwrap();

        let err = SampleLogger::create(blocker.join("log.csv")).unwrap_err();
        assert!(matches!(err, RunError::LogOpen { .. }));
    }
}
