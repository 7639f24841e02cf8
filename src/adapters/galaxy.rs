// src/adapters/galaxy.rs
//
// Simplified Galaxy `.ga` workflow adapter. Galaxy tool state is itself a
// JSON-encoded string per step; we read/write a small subset of it
// (`command`, `cpu`, `mem_mb`, `container`) rather than the full Galaxy
// tool-shed parameter schema.

use super::Format;
use crate::ir::{Environment, SourceMethod, Task, Workflow};
use crate::loss::LossTracker;
use crate::orchestrate::{ExportAdapter, ImportAdapter, ImportResult};
use anyhow::{Context, Result};
use serde_json::Value;

pub struct GalaxyAdapter;

impl ImportAdapter for GalaxyAdapter {
    fn format_name(&self) -> &'static str {
        Format::Galaxy.name()
    }

    fn parse(&self, content: &str) -> Result<ImportResult> {
        let doc: Value = serde_json::from_str(content).context("parsing Galaxy workflow JSON")?;
        let env = Environment::CloudNative;
        let name = doc.get("name").and_then(Value::as_str).unwrap_or("galaxy_workflow").to_string();
        let mut workflow = Workflow::new(name, "1.0.0");
        let mut notes = Vec::new();

        let Some(steps) = doc.get("steps").and_then(Value::as_object) else {
            notes.push("no 'steps' map found; treating as an empty workflow skeleton".to_string());
            return Ok(ImportResult { workflow, parsing_notes: notes });
        };

        let mut step_ids: Vec<&String> = steps.keys().collect();
        step_ids.sort_by_key(|k| k.parse::<i64>().unwrap_or(i64::MAX));

        let mut id_to_name = std::collections::HashMap::new();
        for step_id in &step_ids {
            let step = &steps[*step_id];
            let step_name = step
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(step_id.as_str())
                .replace(' ', "_");
            id_to_name.insert((*step_id).clone(), step_name.clone());

            let mut task = Task::new(step_name.clone());
            if let Some(tool_id) = step.get("tool_id").and_then(Value::as_str) {
                task.metadata.format_specific.insert("tool_id".to_string(), Value::String(tool_id.to_string()));
            }

            if let Some(tool_state_raw) = step.get("tool_state").and_then(Value::as_str) {
                if let Ok(tool_state) = serde_json::from_str::<Value>(tool_state_raw) {
                    if let Some(cmd) = tool_state.get("command").and_then(Value::as_str) {
                        task.command.set(cmd.to_string(), env, SourceMethod::Explicit);
                    }
                    if let Some(cpu) = tool_state.get("cpu").and_then(Value::as_i64) {
                        task.cpu.set(cpu, env, SourceMethod::Explicit);
                    }
                    if let Some(mem) = tool_state.get("mem_mb").and_then(Value::as_i64) {
                        task.mem_mb.set(mem, env, SourceMethod::Explicit);
                    }
                    if let Some(container) = tool_state.get("container").and_then(Value::as_str) {
                        task.container.set(container.to_string(), env, SourceMethod::Explicit);
                    }
                } else {
                    notes.push(format!("step '{step_id}': tool_state is not valid JSON; skipped"));
                }
            }

            workflow.add_task(task);
        }

        for step_id in &step_ids {
            let step = &steps[*step_id];
            let Some(child_name) = id_to_name.get(*step_id) else { continue };
            if let Some(Value::Object(connections)) = step.get("input_connections") {
                for conn in connections.values() {
                    if let Some(parent_id) = conn.get("id").map(|v| v.to_string().trim_matches('"').to_string()) {
                        if let Some(parent_name) = id_to_name.get(&parent_id) {
                            workflow.add_edge(parent_name.clone(), child_name.clone());
                        }
                    }
                }
            }
        }

        Ok(ImportResult { workflow, parsing_notes: notes })
    }
}

impl ExportAdapter for GalaxyAdapter {
    fn format_name(&self) -> &'static str {
        Format::Galaxy.name()
    }

    fn generate_output(&self, workflow: &Workflow, tracker: &mut LossTracker) -> Result<String> {
        let env = Environment::CloudNative;
        let order = if workflow.task_order.is_empty() {
            let mut ids: Vec<String> = workflow.tasks.keys().cloned().collect();
            ids.sort();
            ids
        } else {
            workflow.task_order.clone()
        };

        let mut index_of = std::collections::HashMap::new();
        for (i, id) in order.iter().enumerate() {
            index_of.insert(id.clone(), i);
        }

        let mut steps = serde_json::Map::new();
        for (i, id) in order.iter().enumerate() {
            let Some(task) = workflow.tasks.get(id) else { continue };
            let mut tool_state = serde_json::Map::new();
            if let Some(cmd) = task.command.get(env) {
                tool_state.insert("command".into(), Value::String(cmd.clone()));
            }
            if let Some(cpu) = task.cpu.get(env) {
                tool_state.insert("cpu".into(), serde_json::json!(cpu));
            }
            if let Some(mem) = task.mem_mb.get(env) {
                tool_state.insert("mem_mb".into(), serde_json::json!(mem));
            }
            if let Some(container) = task.container.get(env) {
                tool_state.insert("container".into(), Value::String(container.clone()));
            }

            let mut input_connections = serde_json::Map::new();
            for edge in workflow.edges.iter().filter(|e| &e.child == id) {
                if let Some(parent_idx) = index_of.get(&edge.parent) {
                    input_connections.insert(
                        "input".into(),
                        serde_json::json!({ "id": parent_idx, "output_name": "output" }),
                    );
                }
            }

            steps.insert(
                i.to_string(),
                serde_json::json!({
                    "id": i,
                    "name": id,
                    "tool_id": task.metadata.format_specific.get("tool_id").cloned().unwrap_or(Value::String(id.clone())),
                    "tool_state": serde_json::to_string(&tool_state).unwrap_or_default(),
                    "input_connections": input_connections,
                }),
            );

            if task.gpu.get(env).is_some() {
                tracker.record_resource_specification_loss(
                    format!("/tasks/{id}/gpu"),
                    "gpu",
                    serde_json::json!(task.gpu.get(env)),
                );
            }
        }

        let doc = serde_json::json!({
            "a_galaxy_workflow": "true",
            "format-version": "0.1",
            "name": workflow.name,
            "steps": steps,
        });
        serde_json::to_string_pretty(&doc).context("serializing Galaxy workflow JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_steps_and_input_connection_edges() {
        let source = r#"{
            "name": "demo",
            "steps": {
                "0": { "id": 0, "name": "align", "tool_id": "bwa", "tool_state": "{\"command\": \"bwa mem\", \"cpu\": 4}", "input_connections": {} },
                "1": { "id": 1, "name": "sort", "tool_id": "samtools", "tool_state": "{\"command\": \"samtools sort\"}", "input_connections": { "input": { "id": 0, "output_name": "output" } } }
            }
        }"#;
        let adapter = GalaxyAdapter;
        let result = adapter.parse(source).unwrap();
        assert_eq!(result.workflow.tasks["align"].cpu.get(Environment::CloudNative), Some(&4));
        assert_eq!(result.workflow.edges.len(), 1);
    }
}
