//! Batch selection and the sequential batch loop.

use bumpfix_core::BumpResult;
use bumpfix_core::config::Config;
use bumpfix_core::datapoint::Datapoint;
use bumpfix_core::orchestrator::Orchestrator;
use bumpfix_core::report::{DatapointOutcome, ReportSink};
use bumpfix_core::runlog::{DatapointLog, is_processed};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Returns the datapoints to process, in file name order.
///
/// With `specific_file` only that datapoint is returned, regardless of its category. Otherwise
/// every `*.json` in `config.input` matching `config.category` is loaded, and if `config.limit`
/// is set a random sample of that size is kept.
pub fn select_datapoints(
    config: &Config,
    specific_file: Option<&Path>,
) -> BumpResult<Vec<Datapoint>> {
    if let Some(path) = specific_file {
        return Ok(vec![Datapoint::load(path)?]);
    }

    let mut datapoints = vec![];
    for path in benchmark_files(&config.input)? {
        match Datapoint::load(&path) {
            Ok(datapoint)
                if datapoint.failure_category.as_deref() == Some(config.category.as_str()) =>
            {
                datapoints.push(datapoint)
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable benchmark file: {e}"),
        }
    }
    info!(
        "Found {} datapoints with category {}",
        datapoints.len(),
        config.category
    );

    let Some(limit) = config.limit.filter(|&limit| limit < datapoints.len()) else {
        return Ok(datapoints);
    };
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut chosen = index::sample(&mut rng, datapoints.len(), limit).into_vec();
    chosen.sort_unstable();
    let mut chosen = chosen.into_iter().peekable();
    let sample = datapoints
        .into_iter()
        .enumerate()
        .filter(|(i, _)| chosen.next_if_eq(i).is_some())
        .map(|(_, datapoint)| datapoint)
        .collect::<Vec<_>>();
    info!("Randomly selected {} datapoints", sample.len());
    Ok(sample)
}

/// Sorted paths of the `*.json` files directly inside `dir`.
fn benchmark_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut paths = vec![];
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Per-outcome counts for one batch.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: HashMap<DatapointOutcome, usize>,
    /// Datapoints skipped because a run log from an earlier run exists.
    pub skipped: usize,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.outcomes.values().sum()
    }

    pub fn count(&self, outcome: DatapointOutcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    pub fn log(&self) {
        info!("=== Run Summary ===");
        info!("Processed: {}", self.processed());
        info!("Skipped (already processed): {}", self.skipped);
        let mut outcomes: Vec<_> = self.outcomes.iter().collect();
        outcomes.sort_unstable_by_key(|(outcome, _)| outcome.name());
        for (outcome, count) in outcomes {
            info!("  {outcome}: {count}");
        }
    }
}

/// Runs every datapoint through `orchestrator`, one at a time, recording each report in `sink`.
///
/// A datapoint with a run log in `logs_dir` is skipped, so an interrupted batch can be restarted.
pub fn run_batch(
    orchestrator: &mut Orchestrator<'_>,
    datapoints: &[Datapoint],
    logs_dir: &Path,
    sink: &mut dyn ReportSink,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for (i, datapoint) in datapoints.iter().enumerate() {
        if is_processed(logs_dir, &datapoint.id) {
            info!("Skipping {}: already processed", datapoint.id);
            summary.skipped += 1;
            continue;
        }
        info!("[{}/{}] {}", i + 1, datapoints.len(), datapoint.id);
        let mut log = DatapointLog::create(logs_dir, &datapoint.id).unwrap_or_else(|e| {
            warn!("Failed to create run log for {}: {e}", datapoint.id);
            DatapointLog::tracing_only(&datapoint.id)
        });

        let report = orchestrator.run(datapoint, &mut log);
        match report.reconciliation {
            Some(ref reconciliation) => log.info(&format!("✅ {reconciliation}")),
            None => log.warn(&format!("❌ {}", report.outcome)),
        }
        if let Err(e) = sink.record(&report) {
            error!("Failed to record the report for {}: {e}", datapoint.id);
        }
        *summary.outcomes.entry(report.outcome).or_default() += 1;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpfix_core::orchestrator::RunSettings;
    use bumpfix_core::runlog::log_path;
    use bumpfix_core::test_util::{MemorySink, MockRemote, MockRepairer, output, tempdir};

    fn record(category: &str) -> String {
        format!(
            r#"{{
                "breakingUpdateReproductionCommand": "docker run ghcr.io/bench/breaking-updates:x",
                "updatedDependency": {{
                    "dependencyGroupID": "org.lib",
                    "previousVersion": "1.0",
                    "newVersion": "2.0"
                }},
                "failureCategory": "{category}"
            }}"#
        )
    }

    fn benchmark_dir(ids: &[&str]) -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        for id in ids {
            fs::write(dir.path().join(format!("{id}.json")), record("COMPILATION_FAILURE")).unwrap();
        }
        dir
    }

    fn config(input: &Path) -> Config {
        let mut config = Config::mock();
        config.input = input.to_path_buf();
        config
    }

    fn ids(datapoints: &[Datapoint]) -> Vec<&str> {
        datapoints.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn selects_matching_category_in_order() {
        let dir = benchmark_dir(&["c3", "a1", "b2"]);
        fs::write(dir.path().join("d4.json"), record("TEST_FAILURE")).unwrap();
        fs::write(dir.path().join("e5.json"), "not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let selected = select_datapoints(&config(dir.path()), None).unwrap();
        assert_eq!(ids(&selected), ["a1", "b2", "c3"]);
    }

    #[test]
    fn specific_file_ignores_category() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("d4.json");
        fs::write(&path, record("TEST_FAILURE")).unwrap();
        let selected = select_datapoints(&config(dir.path()), Some(&path)).unwrap();
        assert_eq!(ids(&selected), ["d4"]);
    }

    #[test]
    fn seeded_sample_is_reproducible() {
        let dir = benchmark_dir(&["a", "b", "c", "d", "e", "f", "g", "h"]);
        let mut config = config(dir.path());
        config.limit = Some(3);
        config.seed = Some(42);
        let first = select_datapoints(&config, None).unwrap();
        let second = select_datapoints(&config, None).unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(ids(&first), ids(&second));
        let mut sorted = ids(&first);
        sorted.sort_unstable();
        assert_eq!(ids(&first), sorted);
    }

    #[test]
    fn limit_above_count_keeps_everything() {
        let dir = benchmark_dir(&["a", "b"]);
        let mut config = config(dir.path());
        config.limit = Some(10);
        assert_eq!(select_datapoints(&config, None).unwrap().len(), 2);
    }

    #[test]
    fn missing_input_directory_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(select_datapoints(&config(&dir.path().join("missing")), None).is_err());
    }

    #[test]
    fn batch_skips_processed_datapoints() {
        let benchmarks = benchmark_dir(&["a1", "b2", "c3"]);
        let datapoints = select_datapoints(&config(benchmarks.path()), None).unwrap();
        let output_dir = tempdir().unwrap();
        let logs_dir = output_dir.path().join("logs");
        fs::create_dir_all(&logs_dir).unwrap();
        fs::write(log_path(&logs_dir, "b2"), "earlier run").unwrap();

        let mut remote = MockRemote::new().run(|_, _| Ok(output("[INFO] BUILD SUCCESS")));
        let mut repairer = MockRepairer::new();
        let mut settings = RunSettings::from_config(&Config::mock());
        settings.temp_dir = output_dir.path().join("temp");
        let mut orchestrator = Orchestrator::new(&mut remote, &mut repairer, settings);
        let mut sink = MemorySink::default();
        let summary = run_batch(&mut orchestrator, &datapoints, &logs_dir, &mut sink);

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.processed(), 2);
        assert_eq!(summary.count(DatapointOutcome::NotReproducible), 2);
        let recorded: Vec<_> = sink.reports.iter().map(|r| r.datapoint_id.as_str()).collect();
        assert_eq!(recorded, ["a1", "c3"]);
        assert!(is_processed(&logs_dir, "a1"));
        assert_eq!(fs::read_to_string(log_path(&logs_dir, "b2")).unwrap(), "earlier run");
        drop(orchestrator);
        assert_eq!(remote.commands.len(), 2);

        // A second run over the same logs directory does nothing.
        let mut remote = MockRemote::new();
        let mut repairer = MockRepairer::new();
        let settings = RunSettings::from_config(&Config::mock());
        let mut orchestrator = Orchestrator::new(&mut remote, &mut repairer, settings);
        let summary = run_batch(&mut orchestrator, &datapoints, &logs_dir, &mut sink);
        assert_eq!((summary.skipped, summary.processed()), (3, 0));
    }
}
