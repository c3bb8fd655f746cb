//! The per-datapoint state machine: reproduce the break, extract diagnostics, repair each
//! affected file once, rebuild, reconcile.
//!
//! ```text
//! INIT -> REPRODUCING_BREAK -> SUCCESS_TERMINAL
//!                           -> EXTRACTING -> FETCHING_FILES -> REPAIRING -> REDEPLOYING
//!                              -> REPRODUCING_FIXED -> RECONCILING -> DONE
//! any state -> FAILED; either reproduction -> TIMEOUT
//! ```
//!
//! Errors never escape [Orchestrator::run]; they become the outcome of the returned report.

use crate::config::Config;
use crate::datapoint::Datapoint;
use crate::diagnostic::FileDiagnosticMap;
use crate::error::DatapointError;
use crate::extract::extract;
use crate::outcome::{BuildOutcome, Classifier};
use crate::reconcile::reconcile;
use crate::remote::{ExecOutput, Remote, RemoteError, local_name, read_local_copy};
use crate::repair::Repairer;
use crate::report::{DatapointOutcome, DatapointReport};
use crate::runlog::DatapointLog;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunState {
    Init,
    ReproducingBreak,
    SuccessTerminal,
    Extracting,
    FetchingFiles,
    Repairing,
    Redeploying,
    ReproducingFixed,
    Reconciling,
    Done,
    Failed,
    Timeout,
}

/// The parts of [Config] the state machine needs.
#[derive(Clone, Debug)]
pub struct RunSettings {
    pub build_timeout: Duration,
    pub timeout_retries: u32,
    pub classifier: Classifier,
    pub download_files: bool,
    pub check_pre_commit: bool,
    /// Root for local file copies; each datapoint uses `<temp_dir>/<id>`.
    pub temp_dir: PathBuf,
}

impl RunSettings {
    pub fn from_config(config: &Config) -> RunSettings {
        RunSettings {
            build_timeout: config.build_timeout(),
            timeout_retries: config.timeout_retries,
            classifier: Classifier::new(config.stderr_policy),
            download_files: config.download_files,
            check_pre_commit: config.check_pre_commit,
            temp_dir: config.temp_dir(),
        }
    }
}

/// Drives single datapoints through the state machine.
pub struct Orchestrator<'a> {
    remote: &'a mut dyn Remote,
    repairer: &'a mut dyn Repairer,
    settings: RunSettings,
    state: RunState,
    trace: Vec<RunState>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        remote: &'a mut dyn Remote,
        repairer: &'a mut dyn Repairer,
        settings: RunSettings,
    ) -> Orchestrator<'a> {
        Orchestrator {
            remote,
            repairer,
            settings,
            state: RunState::Init,
            trace: vec![],
        }
    }

    /// States visited by the most recent [Orchestrator::run], in order.
    pub fn trace(&self) -> &[RunState] {
        &self.trace
    }

    /// Processes one datapoint end to end.
    pub fn run(&mut self, datapoint: &Datapoint, log: &mut DatapointLog) -> DatapointReport {
        self.trace.clear();
        self.enter(RunState::Init);
        log.info(&format!("Processing breaking update {}", datapoint.id));
        match self.drive(datapoint, log) {
            Ok(report) => report,
            Err(e) => {
                self.enter(match e {
                    DatapointError::ReproductionTimeout(_) => RunState::Timeout,
                    _ => RunState::Failed,
                });
                log.error(&format!("{e}"));
                DatapointReport::stopped(&datapoint.id, e.outcome()).with_detail(e.to_string())
            }
        }
    }

    fn enter(&mut self, state: RunState) {
        debug!(from = ?self.state, to = ?state, "state transition");
        self.state = state;
        self.trace.push(state);
    }

    fn drive(
        &mut self,
        datapoint: &Datapoint,
        log: &mut DatapointLog,
    ) -> Result<DatapointReport, DatapointError> {
        let id = datapoint.id.as_str();
        if self.settings.check_pre_commit
            && let Some(ref command) = datapoint.pre_commit_command
        {
            log.info("Running the pre-update build");
            let output = self.build(command)?;
            let verdict = self.classify(&output);
            if verdict != BuildOutcome::Success {
                log.warn(&format!("Pre-update build did not pass ({verdict})"));
                return Ok(
                    DatapointReport::stopped(id, DatapointOutcome::PreCommitFailed)
                        .with_build(verdict),
                );
            }
        }

        self.enter(RunState::ReproducingBreak);
        log.info("Reproducing the breaking build");
        let output = self.build(&datapoint.breaking_command)?;
        let verdict = self.classify(&output);
        log.info(&format!("Breaking build outcome: {verdict}"));
        if verdict == BuildOutcome::Success {
            self.enter(RunState::SuccessTerminal);
            log.info("Breaking build passed; nothing to repair");
            return Ok(
                DatapointReport::stopped(id, DatapointOutcome::NotReproducible).with_build(verdict),
            );
        }

        self.enter(RunState::Extracting);
        let pre_fix = extract(&output.combined());
        if pre_fix.is_empty() {
            if let BuildOutcome::Indeterminate { .. } = verdict {
                log.warn("Build output has no verdict and no diagnostics");
                return Ok(
                    DatapointReport::stopped(id, DatapointOutcome::Indeterminate)
                        .with_build(verdict),
                );
            }
            return Err(DatapointError::UnparseableLog);
        }
        log.info(&format!(
            "Pre-fix: {} diagnostics in {} files",
            pre_fix.diagnostic_count(),
            pre_fix.file_count()
        ));
        for path in pre_fix.file_paths() {
            log.info(&format!("Pre-fix error file: {path}"));
        }

        let image = datapoint.docker_image_ref.as_deref().ok_or_else(|| {
            DatapointError::RemoteInfrastructure(format!(
                "no docker image in command {:?}",
                datapoint.breaking_command
            ))
        })?;

        self.enter(RunState::FetchingFiles);
        let local_dir = self.settings.temp_dir.join(id);
        let sources = self.fetch_sources(image, &pre_fix, &local_dir, log)?;

        self.enter(RunState::Repairing);
        let repaired = self.repair_all(datapoint, &pre_fix, &sources, &local_dir, log);
        if repaired.is_empty() {
            log.warn("No file was repaired; rebuilding unchanged sources");
        }

        self.enter(RunState::Redeploying);
        log.info(&format!("Redeploying {} repaired files", repaired.len()));
        let timeout = self.settings.build_timeout;
        let output = self.with_retries(|remote| remote.deploy(image, &repaired, timeout))?;

        self.enter(RunState::ReproducingFixed);
        let verdict = self.classify(&output);
        log.info(&format!("Post-fix build outcome: {verdict}"));
        let post_fix = match verdict {
            BuildOutcome::Success => FileDiagnosticMap::new(),
            _ => extract(&output.combined()),
        };
        if post_fix.is_empty() && matches!(verdict, BuildOutcome::Indeterminate { .. }) {
            self.enter(RunState::Failed);
            log.warn("Post-fix build output has no verdict and no diagnostics; not reconciling");
            let mut report = DatapointReport::stopped(id, DatapointOutcome::PostFixIndeterminate)
                .with_build(verdict);
            report.pre_fix = Some(pre_fix);
            return Ok(report);
        }

        self.enter(RunState::Reconciling);
        let reconciliation = reconcile(&pre_fix, &post_fix);
        log.info(&format!("Reconciliation: {reconciliation}"));
        for path in post_fix.file_paths() {
            log.info(&format!("Post-fix error file: {path}"));
        }

        self.enter(RunState::Done);
        Ok(DatapointReport {
            datapoint_id: id.to_string(),
            outcome: DatapointOutcome::Reconciled,
            build_outcome: Some(verdict),
            pre_fix: Some(pre_fix),
            post_fix: Some(post_fix),
            reconciliation: Some(reconciliation),
            detail: None,
        })
    }

    fn classify(&self, output: &ExecOutput) -> BuildOutcome {
        self.settings
            .classifier
            .classify(&output.stdout, &output.stderr)
    }

    fn build(&mut self, command: &str) -> Result<ExecOutput, DatapointError> {
        let timeout = self.settings.build_timeout;
        self.with_retries(|remote| remote.run(command, timeout))
    }

    /// Runs `op`, retrying it up to `timeout_retries` more times while it times out.
    fn with_retries<F>(&mut self, mut op: F) -> Result<ExecOutput, DatapointError>
    where
        F: FnMut(&mut dyn Remote) -> Result<ExecOutput, RemoteError>,
    {
        let mut attempt = 0;
        loop {
            match op(&mut *self.remote) {
                Err(RemoteError::Timeout(t)) if attempt < self.settings.timeout_retries => {
                    attempt += 1;
                    debug!(attempt, "remote command timed out after {}s; retrying", t.as_secs());
                }
                result => return result.map_err(DatapointError::from),
            }
        }
    }

    /// Returns `(remote path, content)` for every error file with a usable local copy.
    fn fetch_sources(
        &mut self,
        image: &str,
        pre_fix: &FileDiagnosticMap,
        local_dir: &Path,
        log: &mut DatapointLog,
    ) -> Result<Vec<(String, String)>, DatapointError> {
        let remote_paths: Vec<String> = pre_fix.file_paths().map(String::from).collect();
        if self.settings.download_files {
            let fetched = self.remote.fetch(image, &remote_paths, local_dir)?;
            log.info(&format!("Fetched {} of {} files", fetched.len(), remote_paths.len()));
        }

        let mut sources = vec![];
        for remote_path in remote_paths {
            let local_path = local_dir.join(local_name(&remote_path));
            match read_local_copy(&local_path) {
                Ok((stored_path, content)) if stored_path == remote_path => {
                    sources.push((remote_path, content));
                }
                Ok((stored_path, _)) => log.warn(&format!(
                    "Local copy {} holds {stored_path}, not {remote_path}; skipping",
                    local_path.display()
                )),
                Err(e) => log.warn(&format!("No local copy of {remote_path}: {e}")),
            }
        }
        Ok(sources)
    }

    /// Repairs each file once. Per-file failures are logged and leave the file out.
    fn repair_all(
        &mut self,
        datapoint: &Datapoint,
        pre_fix: &FileDiagnosticMap,
        sources: &[(String, String)],
        local_dir: &Path,
        log: &mut DatapointLog,
    ) -> BTreeMap<String, String> {
        let library = datapoint.library_context();
        let updated_dir = local_dir.join("updated");
        let mut repaired = BTreeMap::new();
        for (remote_path, content) in sources {
            let file_name = local_name(remote_path);
            let diagnostics = pre_fix.get(remote_path).unwrap_or_default();
            match self
                .repairer
                .repair(content, file_name, diagnostics, &library)
            {
                Ok(Some(updated)) => {
                    let copy = updated_dir.join(file_name);
                    if let Err(e) =
                        fs::create_dir_all(&updated_dir).and_then(|()| fs::write(&copy, &updated))
                    {
                        log.warn(&format!("Failed to keep a copy at {}: {e}", copy.display()));
                    }
                    log.info(&format!("✅ Repaired {remote_path}"));
                    repaired.insert(remote_path.clone(), updated);
                }
                Ok(None) => log.warn(&format!("❌ No usable repair for {remote_path}")),
                Err(e) => log.error(&format!("❌ Repair of {remote_path} failed: {e}")),
            }
        }
        repaired
    }
}
