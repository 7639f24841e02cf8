// src/orchestrate/import.rs
//
// Import pipeline: parse -> build skeleton -> infer missing fields ->
// prompt for anything inference couldn't resolve -> validate -> return a
// ready-to-use IR workflow.

use super::{ImportAdapter, ImportOptions};
use crate::ir::Workflow;
use crate::prompt::{Prompter, Question};
use anyhow::{Context, Result};

pub struct ImportOrchestrator<'a> {
    adapter: &'a dyn ImportAdapter,
}

impl<'a> ImportOrchestrator<'a> {
    pub fn new(adapter: &'a dyn ImportAdapter) -> Self {
        Self { adapter }
    }

    pub fn run(&self, content: &str, options: &ImportOptions, prompter: &mut dyn Prompter) -> Result<Workflow> {
        let parsed = self
            .adapter
            .parse(content)
            .with_context(|| format!("parsing {} source", self.adapter.format_name()))?;

        let mut workflow = parsed.workflow;
        workflow.metadata.source_format = Some(self.adapter.format_name().to_string());
        workflow.metadata.parsing_notes.extend(parsed.parsing_notes);

        crate::inference::infer_workflow(&mut workflow, options.target_environment);

        self.resolve_ambiguous_tasks(&mut workflow, options, prompter);

        if let Err(issues) = workflow.validate() {
            workflow.metadata.validation_errors.extend(issues);
        }

        Ok(workflow)
    }

    /// Anything inference fell back to an environment-derived default for
    /// (rather than a command/extension match) is surfaced as a question
    /// when running interactively; non-interactive/test modes just keep
    /// the inferred default.
    fn resolve_ambiguous_tasks(&self, workflow: &mut Workflow, options: &ImportOptions, prompter: &mut dyn Prompter) {
        let mut ids: Vec<String> = workflow.tasks.keys().cloned().collect();
        ids.sort();
        for id in ids {
            let Some(task) = workflow.tasks.get_mut(&id) else { continue };
            if task.command.get(options.target_environment).is_none()
                && task.script.get(options.target_environment).is_none()
            {
                let question = Question::new(
                    format!("task '{id}' has no command or script; what should it run?"),
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
    use crate::adapters::snakemake::SnakemakeAdapter;
    use crate::ir::Environment;
    use crate::prompt::NonInteractivePrompter;

    #[test]
    fn import_fills_missing_command_with_default_answer() {
        let source = "rule noop:\n    input: \"a.txt\"\n    output: \"b.txt\"\n";
        let adapter = SnakemakeAdapter;
        let orchestrator = ImportOrchestrator::new(&adapter);
        let options = ImportOptions { target_environment: Environment::SharedFilesystem, interactive: false };
        let mut prompter = NonInteractivePrompter;
        let workflow = orchestrator.run(source, &options, &mut prompter).unwrap();
        let task = workflow.tasks.get("noop").expect("rule parsed as task");
        assert!(task.command.get(Environment::SharedFilesystem).is_some());
    }
}
