//! Persistent run artifacts: `run_data.csv` and the per-datapoint `error_files` listing.

use bumpfix_core::diagnostic::FileDiagnosticMap;
use bumpfix_core::report::{DatapointReport, ReportSink};
use std::error::Error;
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use tracing::debug;

const HEADER: [&str; 12] = [
    "CommitID",
    "Outcome",
    "PreFixFiles",
    "PostFixFiles",
    "FixedFiles",
    "UnfixedFiles",
    "NewErrorFiles",
    "PreFixDiagnostics",
    "PostFixDiagnostics",
    "FixedDiagnostics",
    "UnfixedDiagnostics",
    "NewDiagnostics",
];

const SEPARATOR: &str = "------------------";

/// Writes one CSV row per datapoint, and the error file listing of every datapoint that got as
/// far as extracting diagnostics.
pub struct RunReport {
    csv_path: PathBuf,
    error_files_dir: PathBuf,
}

impl RunReport {
    pub fn new(csv_path: PathBuf, error_files_dir: PathBuf) -> RunReport {
        RunReport {
            csv_path,
            error_files_dir,
        }
    }

    fn append_row(&self, report: &DatapointReport) -> Result<(), Box<dyn Error>> {
        if let Some(parent) = self.csv_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.csv_path)?;
        let is_new = file.metadata()?.len() == 0;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer.write_record(HEADER)?;
        }
        writer.write_record(row(report))?;
        writer.flush()?;
        Ok(())
    }

    fn write_error_files(&self, report: &DatapointReport) -> Result<(), Box<dyn Error>> {
        let Some(ref pre_fix) = report.pre_fix else {
            return Ok(());
        };
        let mut text = String::new();
        write_section(&mut text, "Pre-fix Error Files:", pre_fix);
        if let Some(ref post_fix) = report.post_fix {
            write_section(&mut text, "Post-fix Error Files:", post_fix);
        }
        fs::create_dir_all(&self.error_files_dir)?;
        let path = self
            .error_files_dir
            .join(format!("{}_error_files.txt", report.datapoint_id));
        fs::write(&path, text)?;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}

impl ReportSink for RunReport {
    /// The CSV row is appended even when the error file listing cannot be written.
    fn record(&mut self, report: &DatapointReport) -> Result<(), Box<dyn Error>> {
        let row = self.append_row(report);
        let listing = self.write_error_files(report);
        row.and(listing)
    }
}

fn row(report: &DatapointReport) -> Vec<String> {
    let mut row = vec![report.datapoint_id.clone(), report.outcome.to_string()];
    match report.reconciliation {
        Some(ref r) => row.extend(
            [
                r.pre_fix_file_count,
                r.post_fix_file_count,
                r.fixed_files.len(),
                r.unfixed_files.len(),
                r.new_error_files.len(),
                r.pre_fix_diagnostic_count,
                r.post_fix_diagnostic_count,
                r.fixed_diagnostics.len(),
                r.unfixed_diagnostics.len(),
                r.new_diagnostics.len(),
            ]
            .map(|count| count.to_string()),
        ),
        None => row.resize(HEADER.len(), String::new()),
    }
    row
}

/// Appends a titled section: the file paths, then each file's diagnostics.
fn write_section(text: &mut String, title: &str, map: &FileDiagnosticMap) {
    text.push_str(title);
    text.push('\n');
    for path in map.file_paths() {
        let _ = writeln!(text, "{path}");
    }
    text.push_str(SEPARATOR);
    text.push('\n');
    for (path, diagnostics) in map.iter() {
        let _ = writeln!(text, "{path}");
        for diagnostic in diagnostics {
            let _ = writeln!(text, "  {}", diagnostic.message);
        }
    }
    text.push_str(SEPARATOR);
    text.push('\n');
}
