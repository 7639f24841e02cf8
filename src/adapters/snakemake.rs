// src/adapters/snakemake.rs
//
// Simplified Snakemake adapter: rule blocks with `input:`/`output:`/
// `shell:`/`threads:`/`resources:` keys. Not a full Snakefile grammar —
// enough to round-trip a rule's command, resources, and file dependencies.

use super::Format;
use crate::ir::{Environment, Parameter, SourceMethod, Task, TypeSpec, Primitive, Workflow};
use crate::loss::LossTracker;
use crate::orchestrate::{ImportAdapter, ImportResult, ExportAdapter};
use anyhow::Result;
use regex::Regex;

pub struct SnakemakeAdapter;

fn rule_header_re() -> Regex {
    Regex::new(r"(?m)^rule\s+([A-Za-z_][A-Za-z0-9_]*)\s*:\s*$").unwrap()
}

fn key_value_re() -> Regex {
    Regex::new(r#"^\s*(input|output|shell|threads|resources)\s*:\s*(.*)$"#).unwrap()
}

fn strip_quotes(s: &str) -> String {
    s.trim().trim_matches('"').trim_matches(',').trim().to_string()
}

impl ImportAdapter for SnakemakeAdapter {
    fn format_name(&self) -> &'static str {
        Format::Snakemake.name()
    }

    fn parse(&self, content: &str) -> Result<ImportResult> {
        let mut workflow = Workflow::new("snakemake_workflow", "1.0.0");
        let mut notes = Vec::new();

        let header_re = rule_header_re();
        let kv_re = key_value_re();
        let headers: Vec<_> = header_re.captures_iter(content).map(|c| (c.get(0).unwrap().start(), c[1].to_string())).collect();

        for (i, (start, name)) in headers.iter().enumerate() {
            let block_start = *start + header_re.find(&content[*start..]).map(|m| m.len()).unwrap_or(0);
            let block_end = headers.get(i + 1).map(|(s, _)| *s).unwrap_or(content.len());
            let block = &content[block_start..block_end];

            let mut task = Task::new(name.clone());
            for line in block.lines() {
                let Some(caps) = kv_re.captures(line) else { continue };
                let key = &caps[1];
                let value = strip_quotes(&caps[2]);
                match key {
                    "input" => {
                        for (j, v) in value.split(',').enumerate() {
                            let v = strip_quotes(v);
                            if !v.is_empty() {
                                task.inputs.push(Parameter::new(format!("in{j}"), TypeSpec::primitive(Primitive::File)));
                            }
                        }
                    }
                    "output" => {
                        for (j, v) in value.split(',').enumerate() {
                            let v = strip_quotes(v);
                            if !v.is_empty() {
                                task.outputs.push(Parameter::new(format!("out{j}"), TypeSpec::primitive(Primitive::File)));
                            }
                        }
                    }
                    "shell" => {
                        task.command.set(value, Environment::SharedFilesystem, SourceMethod::Explicit);
                    }
                    "threads" => {
                        if let Ok(n) = value.parse::<i64>() {
                            task.threads.set(n, Environment::SharedFilesystem, SourceMethod::Explicit);
                            task.cpu.set(n, Environment::SharedFilesystem, SourceMethod::Explicit);
                        }
                    }
                    "resources" => {
                        for pair in value.split(',') {
                            let pair = pair.trim();
                            if let Some((k, v)) = pair.split_once('=') {
                                if let Ok(n) = v.trim().parse::<i64>() {
                                    match k.trim() {
                                        "mem_mb" => task.mem_mb.set(n, Environment::SharedFilesystem, SourceMethod::Explicit),
                                        "disk_mb" => task.disk_mb.set(n, Environment::SharedFilesystem, SourceMethod::Explicit),
                                        "runtime" => task.time_s.set(n * 60, Environment::SharedFilesystem, SourceMethod::Explicit),
                                        other => notes.push(format!("rule '{name}': unrecognized resource key '{other}'")),
                                    }
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
            workflow.add_task(task);
        }

        for window in headers.windows(2) {
            let (_, parent) = &window[0];
            let (_, child) = &window[1];
            workflow.add_edge(parent.clone(), child.clone());
        }

        Ok(ImportResult { workflow, parsing_notes: notes })
    }
}

impl ExportAdapter for SnakemakeAdapter {
    fn format_name(&self) -> &'static str {
        Format::Snakemake.name()
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
            out.push_str(&format!("rule {id}:\n"));
            if !task.inputs.is_empty() {
                let files: Vec<String> = task.inputs.iter().map(|p| format!("\"{}\"", p.id)).collect();
                out.push_str(&format!("    input: {}\n", files.join(", ")));
            }
            if !task.outputs.is_empty() {
                let files: Vec<String> = task.outputs.iter().map(|p| format!("\"{}\"", p.id)).collect();
                out.push_str(&format!("    output: {}\n", files.join(", ")));
            }
            if let Some(cmd) = task.command.get(env) {
                out.push_str(&format!("    shell: \"{cmd}\"\n"));
            }
            if let Some(threads) = task.threads.get(env) {
                out.push_str(&format!("    threads: {threads}\n"));
            }
            let mut resources = Vec::new();
            if let Some(mem) = task.mem_mb.get(env) {
                resources.push(format!("mem_mb={mem}"));
            }
            if !resources.is_empty() {
                out.push_str(&format!("    resources: {}\n", resources.join(", ")));
            }

            if task.gpu.get(env).is_some() {
                tracker.record_resource_specification_loss(
                    format!("/tasks/{id}/gpu"),
                    "gpu",
                    serde_json::json!(task.gpu.get(env)),
                );
            }
            if task.security.get(env).is_some() {
                tracker.record_spec_class_loss(
                    format!("/tasks/{id}/security"),
                    "security",
                    serde_json::to_value(task.security.get(env)).unwrap_or_default(),
                );
            }
            out.push('\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_rule() {
        let source = "rule align:\n    input: \"reads.fq\"\n    output: \"aligned.bam\"\n    shell: \"bwa mem ref.fa reads.fq > aligned.bam\"\n    threads: 4\n";
        let adapter = SnakemakeAdapter;
        let result = adapter.parse(source).unwrap();
        let task = &result.workflow.tasks["align"];
        assert_eq!(task.command.get(Environment::SharedFilesystem).unwrap(), "bwa mem ref.fa reads.fq > aligned.bam");
        assert_eq!(task.threads.get(Environment::SharedFilesystem), Some(&4));
    }

    #[test]
    fn generates_rule_block_for_a_task() {
        let mut wf = Workflow::new("demo", "1.0.0");
        let mut task = Task::new("align");
        task.command.set("bwa mem".into(), Environment::SharedFilesystem, SourceMethod::Explicit);
        wf.add_task(task);
        let adapter = SnakemakeAdapter;
        let mut tracker = LossTracker::new();
        let out = adapter.generate_output(&wf, &mut tracker).unwrap();
        assert!(out.contains("rule align:"));
        assert!(out.contains("shell: \"bwa mem\""));
    }
}
