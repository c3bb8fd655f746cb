//! Core of bumpfix: turns Maven build logs from breaking dependency updates into per-file
//! diagnostics, drives one repair attempt per datapoint, and reconciles the diagnostics seen
//! before and after the repair.
//!
//! Everything that touches the outside world (the remote Docker host, the LLM, report files) is
//! reached through the traits in [remote], [repair] and [report], so the state machine in
//! [orchestrator] can be exercised entirely in memory.

pub mod config;
pub mod datapoint;
pub mod diagnostic;
pub mod error;
pub mod extract;
#[cfg(feature = "llm-support")]
pub mod llm;
pub mod orchestrator;
pub mod outcome;
pub mod reconcile;
pub mod remote;
pub mod repair;
pub mod report;
pub mod runlog;
pub mod test_util;

pub use diagnostic::{Diagnostic, DiagnosticKey, DiagnosticLocation, FileDiagnosticMap};
pub use error::{BumpResult, DatapointError};
pub use outcome::{BuildOutcome, Classifier, StderrPolicy};
pub use reconcile::{ReconciliationResult, reconcile};
