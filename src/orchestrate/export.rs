// src/orchestrate/export.rs
//
// Export pipeline: seed loss tracking from any prior side-car -> infer
// missing fields for the target environment -> prompt for anything
// inference couldn't resolve -> optionally adapt the workflow to a
// different target environment -> validate -> generate target-format
// output (plus any auxiliary files it references) -> write output and
// side-car together.

use super::{ExportAdapter, ExportOptions};
use crate::adaptation::EnvironmentAdapter;
use crate::ir::{codec, Workflow};
use crate::loss::{self, LossTracker};
use crate::prompt::{Prompter, Question};
use anyhow::{Context, Result};
use std::path::Path;

pub struct ExportOrchestrator<'a> {
    adapter: &'a dyn ExportAdapter,
}

pub struct ExportOutcome {
    pub rendered: String,
    pub auxiliary_files: Vec<(String, String)>,
    pub loss_entries_written: usize,
}

impl<'a> ExportOrchestrator<'a> {
    pub fn new(adapter: &'a dyn ExportAdapter) -> Self {
        Self { adapter }
    }

    pub fn run(
        &self,
        workflow: &Workflow,
        options: &ExportOptions,
        output_path: &Path,
        timestamp: &str,
        adapter_strategy: Option<&dyn EnvironmentAdapter>,
        prompter: &mut dyn Prompter,
    ) -> Result<ExportOutcome> {
        let mut workflow = workflow.clone();

        let sidecar_path = loss::sidecar_path(output_path);
        let previous = loss::read_sidecar(&sidecar_path)?.map(|d| d.entries).unwrap_or_default();
        let mut tracker = LossTracker::prepare(&previous);

        crate::inference::infer_workflow(&mut workflow, options.target_environment);
        self.prompt_for_missing_values(&mut workflow, options, prompter);

        if let Some(strategy) = adapter_strategy {
            strategy.adapt_workflow(&mut workflow, &mut tracker);
        }

        if let Err(issues) = workflow.validate() {
            anyhow::bail!("workflow failed validation before export: {issues:?}");
        }

        let source_checksum = codec::compute_checksum(&workflow).context("computing source checksum")?;

        let rendered = self
            .adapter
            .generate_output(&workflow, &mut tracker)
            .with_context(|| format!("generating {} output", self.adapter.format_name()))?;
        let auxiliary_files = self
            .adapter
            .auxiliary_files(&workflow, &mut tracker)
            .with_context(|| format!("generating {} auxiliary files", self.adapter.format_name()))?;

        let entries = tracker.into_entries();
        let entry_count = entries.len();

        if !entries.is_empty() {
            loss::write_sidecar(
                output_path,
                self.adapter.format_name(),
                &source_checksum,
                timestamp,
                entries,
                None,
            )?;
        }

        Ok(ExportOutcome { rendered, auxiliary_files, loss_entries_written: entry_count })
    }

    /// Mirrors the import side's ambiguous-task prompt: a task still
    /// missing both `command` and `script` for the target environment
    /// after inference gets one more chance to be resolved interactively
    /// before generation runs (and fails, or silently emits an empty step).
    fn prompt_for_missing_values(&self, workflow: &mut Workflow, options: &ExportOptions, prompter: &mut dyn Prompter) {
        let mut ids: Vec<String> = workflow.tasks.keys().cloned().collect();
        ids.sort();
        for id in ids {
            let Some(task) = workflow.tasks.get_mut(&id) else { continue };
            if task.command.get(options.target_environment).is_none()
                && task.script.get(options.target_environment).is_none()
            {
                let question = Question::new(
                    format!("task '{id}' has no command or script for the target environment; what should it run?"),
                    "true".to_string(),
                )
                .with_choices(vec!["true".into(), "false".into()]);
                let answer = prompter.ask(&question);
                task.command.set(answer, options.target_environment, crate::ir::SourceMethod::Default);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cwl::CwlAdapter;
    use crate::ir::{Environment, SourceMethod, Task};
    use crate::prompt::NonInteractivePrompter;

    #[test]
    fn export_writes_sidecar_only_when_there_is_loss() {
        let mut wf = Workflow::new("demo", "1.0.0");
        let mut task = Task::new("align");
        task.command.set("echo hi".into(), Environment::SharedFilesystem, SourceMethod::Explicit);
        task.gpu.set(1, Environment::SharedFilesystem, SourceMethod::Explicit);
        wf.add_task(task);

        let adapter = CwlAdapter;
        let orchestrator = ExportOrchestrator::new(&adapter);
        let options = ExportOptions { target_environment: Environment::SharedFilesystem, adapt_from: None };
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("demo.cwl");
        let mut prompter = NonInteractivePrompter;

        let outcome = orchestrator.run(&wf, &options, &out_path, "2026-01-01T00:00:00Z", None, &mut prompter).unwrap();
        assert!(!outcome.rendered.is_empty());
    }
}
