//! Per-datapoint results and the sink they are handed to.

use crate::diagnostic::FileDiagnosticMap;
use crate::outcome::BuildOutcome;
use crate::reconcile::ReconciliationResult;
use serde::Serialize;
use std::error::Error;
use std::fmt;

/// How processing of one datapoint ended.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatapointOutcome {
    /// Repaired, rebuilt and reconciled.
    Reconciled,
    /// The breaking build passed; nothing to repair.
    NotReproducible,
    Timeout,
    /// The breaking build failed but no diagnostics could be extracted.
    UnparseableLog,
    InfrastructureFailure,
    /// The pre-update build did not pass, so the datapoint is not trustworthy.
    PreCommitFailed,
    /// The breaking build output had no verdict and no diagnostics.
    Indeterminate,
    /// The rebuild after the repair had no verdict and no diagnostics, so nothing is known about
    /// what the repair fixed.
    PostFixIndeterminate,
}

impl DatapointOutcome {
    pub fn name(self) -> &'static str {
        match self {
            DatapointOutcome::Reconciled => "RECONCILED",
            DatapointOutcome::NotReproducible => "NOT_REPRODUCIBLE",
            DatapointOutcome::Timeout => "TIMEOUT",
            DatapointOutcome::UnparseableLog => "UNPARSEABLE_LOG",
            DatapointOutcome::InfrastructureFailure => "INFRASTRUCTURE_FAILURE",
            DatapointOutcome::PreCommitFailed => "PRE_COMMIT_FAILED",
            DatapointOutcome::Indeterminate => "INDETERMINATE",
            DatapointOutcome::PostFixIndeterminate => "POST_FIX_INDETERMINATE",
        }
    }
}

impl fmt::Display for DatapointOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything known about one processed datapoint.
#[derive(Clone, Debug)]
pub struct DatapointReport {
    pub datapoint_id: String,
    pub outcome: DatapointOutcome,
    /// Verdict of the last build that ran.
    pub build_outcome: Option<BuildOutcome>,
    pub pre_fix: Option<FileDiagnosticMap>,
    pub post_fix: Option<FileDiagnosticMap>,
    /// Present only when `outcome` is [DatapointOutcome::Reconciled].
    pub reconciliation: Option<ReconciliationResult>,
    /// Error text for failed outcomes.
    pub detail: Option<String>,
}

impl DatapointReport {
    /// A report for a datapoint that stopped before reconciliation.
    pub fn stopped(datapoint_id: &str, outcome: DatapointOutcome) -> DatapointReport {
        DatapointReport {
            datapoint_id: datapoint_id.to_string(),
            outcome,
            build_outcome: None,
            pre_fix: None,
            post_fix: None,
            reconciliation: None,
            detail: None,
        }
    }

    pub fn with_build(mut self, build_outcome: BuildOutcome) -> DatapointReport {
        self.build_outcome = Some(build_outcome);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> DatapointReport {
        self.detail = Some(detail.into());
        self
    }
}

/// Persists datapoint results.
pub trait ReportSink {
    fn record(&mut self, report: &DatapointReport) -> Result<(), Box<dyn Error>>;
}
