//! The interface to whatever proposes repaired file contents.

use crate::diagnostic::Diagnostic;
use serde::Serialize;
use std::io;
use thiserror::Error;

/// The dependency update a repair has to adapt to.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct LibraryContext {
    pub name: String,
    pub base_version: String,
    pub new_version: String,
}

#[derive(Debug, Error)]
pub enum RepairError {
    #[error("LLM request failed: {0}")]
    Llm(String),
    #[error("could not parse repair input: {0}")]
    Parse(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Proposes a new version of one source file.
pub trait Repairer {
    /// Returns the full replacement content, or `None` if the repairer produced nothing usable
    /// (no code, or code identical to `file_content`).
    fn repair(
        &mut self,
        file_content: &str,
        file_name: &str,
        diagnostics: &[Diagnostic],
        library: &LibraryContext,
    ) -> Result<Option<String>, RepairError>;
}
