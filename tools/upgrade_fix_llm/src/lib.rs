//! `UpgradeFixLlm`: repairs one Java file at a time with an LLM, giving it the compiler errors,
//! the dependency update, and the library's release notes for the versions in between.

mod prompt;
mod release_notes;
mod response;

pub use release_notes::{ReleaseNote, compare_versions};

use bumpfix_core::config::unknown_field_warning;
use bumpfix_core::diagnostic::Diagnostic;
use bumpfix_core::llm::{BumpLLM, LLMConfig, build_request};
use bumpfix_core::repair::{LibraryContext, RepairError, Repairer};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, trace};

const FIXER_PROMPT: &str = include_str!("../system_prompts/fixer.txt");

/// Configuration read from `[tools.upgrade_fix_llm]`.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Directory of `<groupId>.json` release-note files. No notes are used when unset.
    pub release_notes_dir: Option<PathBuf>,

    #[serde(flatten)]
    pub llm: LLMConfig,

    #[serde(flatten)]
    unknown: HashMap<String, Value>,
}

impl Config {
    pub fn validate(&self) {
        unknown_field_warning("tools.upgrade_fix_llm", &self.unknown);
    }
}

pub struct UpgradeFixLlm {
    llm: BumpLLM,
    release_notes_dir: Option<PathBuf>,
}

impl UpgradeFixLlm {
    pub fn new(config: &Config) -> Result<UpgradeFixLlm, Box<dyn std::error::Error>> {
        config.validate();
        Ok(UpgradeFixLlm {
            llm: BumpLLM::build(&config.llm, None, FIXER_PROMPT)?,
            release_notes_dir: config.release_notes_dir.clone(),
        })
    }
}

impl Repairer for UpgradeFixLlm {
    fn repair(
        &mut self,
        file_content: &str,
        file_name: &str,
        diagnostics: &[Diagnostic],
        library: &LibraryContext,
    ) -> Result<Option<String>, RepairError> {
        let notes = match self.release_notes_dir {
            Some(ref dir) => release_notes::load(dir, library)?,
            None => vec![],
        };
        debug!(
            "Repairing {file_name}: {} diagnostics, {} release notes",
            diagnostics.len(),
            notes.len()
        );
        let messages = prompt::messages(file_content, file_name, diagnostics, library, &notes)
            .map_err(|e| RepairError::Parse(e.to_string()))?;

        trace!("Calling LLM to fix {file_name}");
        let reply = self
            .llm
            .invoke(&build_request(&messages))
            .map_err(|e| RepairError::Llm(e.to_string()))?;
        trace!("LLM returned {} bytes", reply.len());

        Ok(response::updated_code(&reply, file_content))
    }
}
