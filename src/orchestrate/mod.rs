// src/orchestrate/mod.rs
//
// =============================================================================
// WF2WF: IMPORT/EXPORT ORCHESTRATION
// =============================================================================
//
// Generic templates that every format adapter plugs into: the adapter
// supplies the narrow `{parse}` / `{generate_output, auxiliary_files}`
// contract; the orchestrator supplies the shared pipeline (inference,
// prompting, adaptation, loss tracking, validation) so no adapter has to
// reimplement it.

pub mod export;
pub mod import;

use crate::ir::Workflow;
use crate::prompt::Prompter;
use anyhow::Result;

/// What an importer hands back after its own format-specific parse:
/// a skeleton IR workflow plus notes about anything the parser itself
/// couldn't resolve (fed into the prompter/inference stage next).
pub struct ImportResult {
    pub workflow: Workflow,
    pub parsing_notes: Vec<String>,
}

pub trait ImportAdapter {
    fn format_name(&self) -> &'static str;

    /// Parses raw source text into a skeleton IR workflow. Adapters
    /// should be tolerant: a field they can't understand becomes a
    /// `metadata.parsing_notes` entry, not a hard error.
    fn parse(&self, content: &str) -> Result<ImportResult>;
}

pub trait ExportAdapter {
    fn format_name(&self) -> &'static str;

    /// Renders `workflow` to the target format's primary output text,
    /// recording any field it cannot represent via `tracker`.
    fn generate_output(&self, workflow: &Workflow, tracker: &mut crate::loss::LossTracker) -> Result<String>;

    /// Any additional files the primary output references (e.g. HTCondor
    /// DAGMan's per-job `.sub` submit descriptions) as `(relative_path,
    /// content)` pairs, written alongside the primary output. Most
    /// formats are self-contained and need none.
    fn auxiliary_files(&self, _workflow: &Workflow, _tracker: &mut crate::loss::LossTracker) -> Result<Vec<(String, String)>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub target_environment: crate::ir::Environment,
    pub interactive: bool,
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub target_environment: crate::ir::Environment,
    pub adapt_from: Option<crate::ir::Environment>,
}

pub(crate) fn resolve_prompter(options_interactive: bool, no_prompt: bool) -> Box<dyn Prompter> {
    crate::prompt::get_prompter(no_prompt || !options_interactive, None)
}
