// src/adapters/cwl.rs
//
// Simplified Common Workflow Language adapter. Understands a `class:
// Workflow` document whose steps embed an inline `class: CommandLineTool`
// `run:` block with `baseCommand`, `requirements`/`hints` (DockerRequirement,
// ResourceRequirement), and `in`/`out` parameter lists. Step dependencies
// are derived from `in: { param: "otherStep/output" }` source references.

use super::Format;
use crate::ir::{Environment, Parameter, Primitive, Requirement, SourceMethod, Task, TypeSpec, Workflow};
use crate::loss::LossTracker;
use crate::orchestrate::{ExportAdapter, ImportAdapter, ImportResult};
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;

pub struct CwlAdapter;

fn requirement_from_value(class_name: &str, value: &Value) -> Requirement {
    let mut data = HashMap::new();
    if let Value::Object(map) = value {
        for (k, v) in map {
            if k != "class" {
                data.insert(k.clone(), v.clone());
            }
        }
    }
    Requirement { class_name: class_name.to_string(), data }
}

fn apply_requirement(task: &mut Task, req: &Requirement, env: Environment) {
    match req.class_name.as_str() {
        "ResourceRequirement" => {
            if let Some(n) = req.data.get("coresMin").and_then(Value::as_i64) {
                task.cpu.set(n, env, SourceMethod::Explicit);
            }
            if let Some(n) = req.data.get("ramMin").and_then(Value::as_i64) {
                task.mem_mb.set(n, env, SourceMethod::Explicit);
            }
            if let Some(n) = req.data.get("outdirMin").and_then(Value::as_i64) {
                task.disk_mb.set(n, env, SourceMethod::Explicit);
            }
            if let Some(n) = req.data.get("gpuMin").and_then(Value::as_i64) {
                task.gpu.set(n, env, SourceMethod::Explicit);
            }
        }
        "DockerRequirement" => {
            if let Some(image) = req.data.get("dockerPull").and_then(Value::as_str) {
                task.container.set(image.to_string(), env, SourceMethod::Explicit);
            }
        }
        _ => {}
    }
}

impl ImportAdapter for CwlAdapter {
    fn format_name(&self) -> &'static str {
        Format::Cwl.name()
    }

    fn parse(&self, content: &str) -> Result<ImportResult> {
        let doc: Value = serde_yaml::from_str(content).context("parsing CWL YAML document")?;
        let mut workflow = Workflow::new("cwl_workflow", "1.0.0");
        let mut notes = Vec::new();
        let env = Environment::SharedFilesystem;

        let Some(steps) = doc.get("steps").and_then(Value::as_object) else {
            notes.push("no 'steps' map found; treating as an empty workflow skeleton".to_string());
            return Ok(ImportResult { workflow, parsing_notes: notes });
        };

        let mut step_names: Vec<&String> = steps.keys().collect();
        step_names.sort();

        for step_id in &step_names {
            let step = &steps[*step_id];
            let mut task = Task::new((*step_id).clone());
            let mut collected_requirements = Vec::new();

            if let Some(run) = step.get("run") {
                if let Some(base_command) = run.get("baseCommand") {
                    let command = match base_command {
                        Value::String(s) => s.clone(),
                        Value::Array(parts) => parts.iter().filter_map(Value::as_str).collect::<Vec<_>>().join(" "),
                        _ => String::new(),
                    };
                    if !command.is_empty() {
                        task.command.set(command, env, SourceMethod::Explicit);
                    }
                }
                for key in ["requirements", "hints"] {
                    if let Some(Value::Array(items)) = run.get(key) {
                        for item in items {
                            if let Some(class_name) = item.get("class").and_then(Value::as_str) {
                                let req = requirement_from_value(class_name, item);
                                apply_requirement(&mut task, &req, env);
                                if key == "requirements" {
                                    collected_requirements.push(req);
                                }
                            }
                        }
                    }
                }
            }
            if !collected_requirements.is_empty() {
                task.requirements.set(collected_requirements, env, SourceMethod::Explicit);
            }

            if let Some(Value::Object(ins)) = step.get("in") {
                for (param_name, source) in ins {
                    task.inputs.push(Parameter::new(param_name.clone(), TypeSpec::primitive(Primitive::File)));
                    if let Some(source_str) = source.as_str() {
                        if let Some((parent_step, _output)) = source_str.split_once('/') {
                            if steps.contains_key(parent_step) {
                                workflow.add_edge(parent_step.to_string(), (*step_id).clone());
                            }
                        }
                    }
                }
            }
            if let Some(Value::Array(outs)) = step.get("out") {
                for out in outs {
                    if let Some(name) = out.as_str() {
                        task.outputs.push(Parameter::new(name.to_string(), TypeSpec::primitive(Primitive::File)));
                    }
                }
            }

            workflow.add_task(task);
        }

        Ok(ImportResult { workflow, parsing_notes: notes })
    }
}

impl ExportAdapter for CwlAdapter {
    fn format_name(&self) -> &'static str {
        Format::Cwl.name()
    }

    fn generate_output(&self, workflow: &Workflow, tracker: &mut LossTracker) -> Result<String> {
        let env = Environment::SharedFilesystem;
        let mut steps = serde_json::Map::new();

        let order = if workflow.task_order.is_empty() {
            let mut ids: Vec<String> = workflow.tasks.keys().cloned().collect();
            ids.sort();
            ids
        } else {
            workflow.task_order.clone()
        };

        for id in &order {
            let Some(task) = workflow.tasks.get(id) else { continue };
            let mut requirements = Vec::new();

            let mut resource_req = serde_json::Map::new();
            resource_req.insert("class".into(), Value::String("ResourceRequirement".into()));
            if let Some(cpu) = task.cpu.get(env) {
                resource_req.insert("coresMin".into(), serde_json::json!(cpu));
            }
            if let Some(mem) = task.mem_mb.get(env) {
                resource_req.insert("ramMin".into(), serde_json::json!(mem));
            }
            if let Some(gpu) = task.gpu.get(env) {
                resource_req.insert("gpuMin".into(), serde_json::json!(gpu));
            }
            if resource_req.len() > 1 {
                requirements.push(Value::Object(resource_req));
            }
            if let Some(image) = task.container.get(env) {
                requirements.push(serde_json::json!({ "class": "DockerRequirement", "dockerPull": image }));
            }

            let command = task.command.get(env).cloned().unwrap_or_default();
            let base_command: Vec<&str> = command.split_whitespace().collect();

            let mut run = serde_json::Map::new();
            run.insert("class".into(), Value::String("CommandLineTool".into()));
            run.insert("baseCommand".into(), serde_json::json!(base_command));
            if !requirements.is_empty() {
                run.insert("requirements".into(), Value::Array(requirements));
            }

            let ins: serde_json::Map<String, Value> =
                task.inputs.iter().map(|p| (p.id.clone(), Value::String(p.id.clone()))).collect();
            let outs: Vec<Value> = task.outputs.iter().map(|p| Value::String(p.id.clone())).collect();

            let step = serde_json::json!({ "run": run, "in": ins, "out": outs });
            steps.insert(id.clone(), step);

            if task.security.get(env).is_some() {
                tracker.record_spec_class_loss(
                    format!("/tasks/{id}/security"),
                    "security",
                    serde_json::to_value(task.security.get(env)).unwrap_or_default(),
                );
            }
            if task.retry_count.get(env).is_some() && !has_retry_extension(task, env) {
                tracker.record(
                    format!("/tasks/{id}/retry_count"),
                    "retry_count",
                    serde_json::json!(task.retry_count.get(env)),
                    "CWL core has no retry requirement; represented only via cwltool's ToolTimeLimit extension, which is not emitted here",
                    crate::ir::LossSeverity::Info,
                    "resource_specification",
                );
            }
        }

        let doc = serde_json::json!({
            "cwlVersion": "v1.2",
            "class": "Workflow",
            "steps": steps,
        });
        serde_yaml::to_string(&doc).context("serializing CWL YAML document")
    }
}

fn has_retry_extension(_task: &Task, _env: Environment) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Environment;

    #[test]
    fn parses_gpu_and_docker_requirements() {
        let source = r#"
cwlVersion: v1.2
class: Workflow
steps:
  align:
    run:
      class: CommandLineTool
      baseCommand: ["bwa", "mem"]
      requirements:
        - class: ResourceRequirement
          coresMin: 4
          ramMin: 4096
          gpuMin: 1
        - class: DockerRequirement
          dockerPull: biocontainers/bwa
    in:
      reads: reads
    out: [aligned]
"#;
        let adapter = CwlAdapter;
        let result = adapter.parse(source).unwrap();
        let task = &result.workflow.tasks["align"];
        assert_eq!(task.gpu.get(Environment::SharedFilesystem), Some(&1));
        assert_eq!(task.container.get(Environment::SharedFilesystem), Some(&"biocontainers/bwa".to_string()));
    }

    #[test]
    fn step_dependency_becomes_an_edge() {
        let source = r#"
cwlVersion: v1.2
class: Workflow
steps:
  a:
    run:
      class: CommandLineTool
      baseCommand: ["echo"]
    in: {}
    out: [result]
  b:
    run:
      class: CommandLineTool
      baseCommand: ["cat"]
    in:
      data: a/result
    out: [final]
"#;
        let adapter = CwlAdapter;
        let result = adapter.parse(source).unwrap();
        assert_eq!(result.workflow.edges.len(), 1);
        assert_eq!(result.workflow.edges[0].parent, "a");
        assert_eq!(result.workflow.edges[0].child, "b");
    }
}
