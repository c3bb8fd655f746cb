//! Per-datapoint run logs.
//!
//! Each datapoint gets its own log file in the logs directory, and the existence of that file is
//! what marks the datapoint as processed. Every line is mirrored to `tracing` with the datapoint
//! id attached.

use chrono::Local;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Path of the run log for `datapoint_id`.
pub fn log_path(logs_dir: &Path, datapoint_id: &str) -> PathBuf {
    logs_dir.join(format!("{datapoint_id}.log"))
}

/// Whether a run log already exists for `datapoint_id`.
pub fn is_processed(logs_dir: &Path, datapoint_id: &str) -> bool {
    log_path(logs_dir, datapoint_id).exists()
}

#[derive(Clone, Copy, Debug)]
enum Level {
    Info,
    Warn,
    Error,
}

/// Handle to one datapoint's run log. Write failures are reported through `tracing` and
/// otherwise ignored.
pub struct DatapointLog {
    datapoint_id: String,
    out: Box<dyn Write>,
}

impl DatapointLog {
    /// Creates (or truncates) the log file for `datapoint_id` under `logs_dir`.
    pub fn create(logs_dir: &Path, datapoint_id: &str) -> io::Result<DatapointLog> {
        fs::create_dir_all(logs_dir)?;
        let file = File::create(log_path(logs_dir, datapoint_id))?;
        Ok(DatapointLog::new(datapoint_id, Box::new(file)))
    }

    pub fn new(datapoint_id: &str, out: Box<dyn Write>) -> DatapointLog {
        DatapointLog {
            datapoint_id: datapoint_id.to_string(),
            out,
        }
    }

    /// A log that only goes to `tracing`.
    pub fn tracing_only(datapoint_id: &str) -> DatapointLog {
        DatapointLog::new(datapoint_id, Box::new(io::sink()))
    }

    pub fn info(&mut self, message: &str) {
        info!(datapoint = %self.datapoint_id, "{message}");
        self.write(Level::Info, message);
    }

    pub fn warn(&mut self, message: &str) {
        warn!(datapoint = %self.datapoint_id, "{message}");
        self.write(Level::Warn, message);
    }

    pub fn error(&mut self, message: &str) {
        error!(datapoint = %self.datapoint_id, "{message}");
        self.write(Level::Error, message);
    }

    fn write(&mut self, level: Level, message: &str) {
        let level = match level {
            Level::Info => "INFO",
            Level::Warn => "WARNING",
            Level::Error => "ERROR",
        };
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        if let Err(e) = writeln!(self.out, "{timestamp} - {level} - {message}") {
            warn!(datapoint = %self.datapoint_id, "failed to write run log: {e}");
        }
    }
}

impl Drop for DatapointLog {
    fn drop(&mut self) {
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::tempdir;

    #[test]
    fn log_file_marks_processed() {
        let dir = tempdir().unwrap();
        let logs = dir.path().join("logs");
        assert!(!is_processed(&logs, "abc"));
        {
            let mut log = DatapointLog::create(&logs, "abc").unwrap();
            log.info("Processing breaking update");
            log.error("Docker command timed out");
        }
        assert!(is_processed(&logs, "abc"));
        let contents = fs::read_to_string(log_path(&logs, "abc")).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - INFO - Processing breaking update"));
        assert!(lines[1].ends_with(" - ERROR - Docker command timed out"));
    }
}
