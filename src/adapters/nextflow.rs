// src/adapters/nextflow.rs
//
// Simplified Nextflow DSL2 adapter: `process name { cpus N; memory '…';
// script: """…""" }` blocks. Channel wiring and the full expression
// language are out of scope — edges are taken from the declaration order
// of `process` blocks, matching a linear pipeline.

use super::Format;
use crate::ir::{Environment, SourceMethod, Task, Workflow};
use crate::loss::LossTracker;
use crate::orchestrate::{ExportAdapter, ImportAdapter, ImportResult};
use anyhow::Result;
use regex::Regex;

pub struct NextflowAdapter;

fn process_block_re() -> Regex {
    Regex::new(r"(?ms)^process\s+([A-Za-z_][A-Za-z0-9_]*)\s*\{(.*?)^\}").unwrap()
}

fn script_re() -> Regex {
    Regex::new(r#"(?ms)script:\s*"""(.*?)"""|script:\s*'(.*)'"#).unwrap()
}

fn memory_to_mb(spec: &str) -> Option<i64> {
    let spec = spec.trim().trim_matches('\'').trim_matches('"');
    let (num, unit) = spec.split_once(' ')?;
    let n: f64 = num.trim().parse().ok()?;
    let mb = match unit.trim().to_uppercase().as_str() {
        "GB" | "G" => n * 1024.0,
        "MB" | "M" => n,
        "KB" | "K" => n / 1024.0,
        _ => return None,
    };
    Some(mb.round() as i64)
}

impl ImportAdapter for NextflowAdapter {
    fn format_name(&self) -> &'static str {
        Format::Nextflow.name()
    }

    fn parse(&self, content: &str) -> Result<ImportResult> {
        let mut workflow = Workflow::new("nextflow_workflow", "1.0.0");
        let mut notes = Vec::new();
        let mut previous_id: Option<String> = None;

        for caps in process_block_re().captures_iter(content) {
            let name = caps[1].to_string();
            let body = &caps[2];
            let mut task = Task::new(name.clone());

            for line in body.lines() {
                let line = line.trim();
                if let Some(rest) = line.strip_prefix("cpus ") {
                    if let Ok(n) = rest.trim().parse::<i64>() {
                        task.cpu.set(n, Environment::CloudNative, SourceMethod::Explicit);
                    }
                } else if let Some(rest) = line.strip_prefix("memory ") {
                    if let Some(mb) = memory_to_mb(rest) {
                        task.mem_mb.set(mb, Environment::CloudNative, SourceMethod::Explicit);
                    }
                } else if let Some(rest) = line.strip_prefix("container ") {
                    task.container.set(
                        rest.trim().trim_matches('\'').trim_matches('"').to_string(),
                        Environment::CloudNative,
                        SourceMethod::Explicit,
                    );
                }
            }

            if let Some(script_caps) = script_re().captures(body) {
                let script = script_caps.get(1).or_else(|| script_caps.get(2)).map(|m| m.as_str().trim().to_string());
                if let Some(script) = script {
                    task.script.set(script, Environment::CloudNative, SourceMethod::Explicit);
                }
            } else {
                notes.push(format!("process '{name}': no script block found"));
            }

            workflow.add_task(task);
            if let Some(prev) = &previous_id {
                workflow.add_edge(prev.clone(), name.clone());
            }
            previous_id = Some(name);
        }

        Ok(ImportResult { workflow, parsing_notes: notes })
    }
}

impl ExportAdapter for NextflowAdapter {
    fn format_name(&self) -> &'static str {
        Format::Nextflow.name()
    }

    fn generate_output(&self, workflow: &Workflow, tracker: &mut LossTracker) -> Result<String> {
        let env = Environment::CloudNative;
        let mut out = String::new();
        let order = if workflow.task_order.is_empty() {
            let mut ids: Vec<String> = workflow.tasks.keys().cloned().collect();
            ids.sort();
            ids
        } else {
            workflow.task_order.clone()
        };

        for id in &order {
            let Some(task) = workflow.tasks.get(id) else { continue };
            out.push_str(&format!("process {id} {{\n"));
            if let Some(cpu) = task.cpu.get(env) {
                out.push_str(&format!("    cpus {cpu}\n"));
            }
            if let Some(mem) = task.mem_mb.get(env) {
                out.push_str(&format!("    memory '{} MB'\n", mem));
            }
            if let Some(container) = task.container.get(env) {
                out.push_str(&format!("    container '{container}'\n"));
            }
            let script = task
                .script
                .get(env)
                .or_else(|| task.command.get(env))
                .cloned()
                .unwrap_or_default();
            out.push_str("    script:\n    \"\"\"\n");
            out.push_str(&format!("    {script}\n"));
            out.push_str("    \"\"\"\n}\n\n");

            if task.checkpointing.get(env).is_some() {
                tracker.record_spec_class_loss(
                    format!("/tasks/{id}/checkpointing"),
                    "checkpointing",
                    serde_json::to_value(task.checkpointing.get(env)).unwrap_or_default(),
                );
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_process_with_resources_and_script() {
        let source = "process align {\n    cpus 4\n    memory '4 GB'\n    script:\n    \"\"\"\n    bwa mem ref.fa reads.fq\n    \"\"\"\n}\n";
        let adapter = NextflowAdapter;
        let result = adapter.parse(source).unwrap();
        let task = &result.workflow.tasks["align"];
        assert_eq!(task.cpu.get(Environment::CloudNative), Some(&4));
        assert_eq!(task.mem_mb.get(Environment::CloudNative), Some(&4096));
    }

    #[test]
    fn chains_processes_in_declaration_order() {
        let source = "process a {\n    script:\n    \"\"\"echo a\"\"\"\n}\n\nprocess b {\n    script:\n    \"\"\"echo b\"\"\"\n}\n";
        let adapter = NextflowAdapter;
        let result = adapter.parse(source).unwrap();
        assert_eq!(result.workflow.edges.len(), 1);
        assert_eq!(result.workflow.edges[0].parent, "a");
    }
}
