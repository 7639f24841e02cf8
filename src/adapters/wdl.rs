// src/adapters/wdl.rs
//
// Simplified WDL adapter: `task name { command <<<...>>> runtime { cpu: N
// memory: "N GB" docker: "..." } }` blocks plus a `workflow { call a; call
// b }` block whose call order becomes the task chain. Not the full WDL
// expression language.

use super::Format;
use crate::ir::{Environment, SourceMethod, Task, Workflow};
use crate::loss::LossTracker;
use crate::orchestrate::{ExportAdapter, ImportAdapter, ImportResult};
use anyhow::Result;
use regex::Regex;

pub struct WdlAdapter;

fn task_block_re() -> Regex {
    Regex::new(r"(?ms)^task\s+([A-Za-z_][A-Za-z0-9_]*)\s*\{(.*?)^\}").unwrap()
}

fn command_re() -> Regex {
    Regex::new(r"(?ms)command\s*<<<(.*?)>>>|command\s*\{(.*?)\}").unwrap()
}

fn runtime_block_re() -> Regex {
    Regex::new(r"(?ms)runtime\s*\{(.*?)\}").unwrap()
}

fn call_re() -> Regex {
    Regex::new(r"(?m)^\s*call\s+([A-Za-z_][A-Za-z0-9_.]*)").unwrap()
}

fn memory_to_mb(spec: &str) -> Option<i64> {
    let spec = spec.trim().trim_matches('"');
    let (num, unit) = spec.split_once(' ')?;
    let n: f64 = num.trim().parse().ok()?;
    Some(match unit.trim().to_uppercase().as_str() {
        "GB" | "G" => (n * 1024.0).round() as i64,
        "MB" | "M" => n.round() as i64,
        _ => return None,
    })
}

impl ImportAdapter for WdlAdapter {
    fn format_name(&self) -> &'static str {
        Format::Wdl.name()
    }

    fn parse(&self, content: &str) -> Result<ImportResult> {
        let mut workflow = Workflow::new("wdl_workflow", "1.0.0");
        let mut notes = Vec::new();
        let env = Environment::SharedFilesystem;

        for caps in task_block_re().captures_iter(content) {
            let name = caps[1].to_string();
            let body = &caps[2];
            let mut task = Task::new(name.clone());

            if let Some(cmd_caps) = command_re().captures(body) {
                let command = cmd_caps.get(1).or_else(|| cmd_caps.get(2)).map(|m| m.as_str().trim().to_string());
                if let Some(command) = command {
                    task.command.set(command, env, SourceMethod::Explicit);
                }
            } else {
                notes.push(format!("task '{name}': no command block found"));
            }

            if let Some(runtime_caps) = runtime_block_re().captures(body) {
                for line in runtime_caps[1].lines() {
                    let line = line.trim().trim_end_matches(',');
                    let Some((key, value)) = line.split_once(':') else { continue };
                    let key = key.trim();
                    let value = value.trim().trim_matches('"');
                    match key {
                        "cpu" => {
                            if let Ok(n) = value.parse::<i64>() {
                                task.cpu.set(n, env, SourceMethod::Explicit);
                            }
                        }
                        "memory" => {
                            if let Some(mb) = memory_to_mb(value) {
                                task.mem_mb.set(mb, env, SourceMethod::Explicit);
                            }
                        }
                        "docker" => {
                            task.container.set(value.to_string(), env, SourceMethod::Explicit);
                        }
                        "maxRetries" => {
                            if let Ok(n) = value.parse::<i64>() {
                                task.retry_count.set(n, env, SourceMethod::Explicit);
                            }
                        }
                        other => notes.push(format!("task '{name}': unrecognized runtime key '{other}'")),
                    }
                }
            }

            workflow.add_task(task);
        }

        let calls: Vec<String> = call_re()
            .captures_iter(content)
            .map(|c| c[1].split('.').last().unwrap_or(&c[1]).to_string())
            .filter(|name| workflow.tasks.contains_key(name))
            .collect();
        for pair in calls.windows(2) {
            workflow.add_edge(pair[0].clone(), pair[1].clone());
        }

        Ok(ImportResult { workflow, parsing_notes: notes })
    }
}

impl ExportAdapter for WdlAdapter {
    fn format_name(&self) -> &'static str {
        Format::Wdl.name()
    }

    fn generate_output(&self, workflow: &Workflow, tracker: &mut LossTracker) -> Result<String> {
        let env = Environment::SharedFilesystem;
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
            out.push_str(&format!("task {id} {{\n"));
            let command = task.command.get(env).cloned().unwrap_or_default();
            out.push_str(&format!("  command <<<\n  {command}\n  >>>\n"));
            out.push_str("  runtime {\n");
            if let Some(cpu) = task.cpu.get(env) {
                out.push_str(&format!("    cpu: {cpu}\n"));
            }
            if let Some(mem) = task.mem_mb.get(env) {
                out.push_str(&format!("    memory: \"{mem} MB\"\n"));
            }
            if let Some(image) = task.container.get(env) {
                out.push_str(&format!("    docker: \"{image}\"\n"));
            }
            out.push_str("  }\n}\n\n");

            if task.networking.get(env).is_some() {
                tracker.record_spec_class_loss(
                    format!("/tasks/{id}/networking"),
                    "networking",
                    serde_json::to_value(task.networking.get(env)).unwrap_or_default(),
                );
            }
        }

        out.push_str("workflow main {\n");
        for id in &order {
            out.push_str(&format!("  call {id}\n"));
        }
        out.push_str("}\n");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_task_runtime_block() {
        let source = "task align {\n  command <<<\n  bwa mem ref.fa reads.fq\n  >>>\n  runtime {\n    cpu: 4\n    memory: \"4 GB\"\n    docker: \"biocontainers/bwa\"\n  }\n}\n";
        let adapter = WdlAdapter;
        let result = adapter.parse(source).unwrap();
        let task = &result.workflow.tasks["align"];
        assert_eq!(task.cpu.get(Environment::SharedFilesystem), Some(&4));
        assert_eq!(task.mem_mb.get(Environment::SharedFilesystem), Some(&4096));
        assert_eq!(task.container.get(Environment::SharedFilesystem), Some(&"biocontainers/bwa".to_string()));
    }
}
