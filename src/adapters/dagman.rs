// src/adapters/dagman.rs
//
// HTCondor DAGMan adapter for the two-file convention a real DAGMan
// deployment uses: a `.dag` file with `JOB <id> <id>.sub` reference lines
// plus `PARENT x CHILD y` edges, and one `.sub` submit description per
// job carrying `executable`/`arguments`/`request_cpus`/`request_memory`/
// `retry`. Import only ever sees the `.dag` file's text (the orchestrator
// hands adapters a single content string), so it recovers task ids and
// edges from the reference lines but not per-task resources — those live
// in the `.sub` files this adapter's own exports write out separately.
// The older inline `JOB name { ... }` submit-block form is also accepted
// on import for interoperability with hand-written DAGMan files.

use super::Format;
use crate::ir::{Environment, SourceMethod, Task, Workflow};
use crate::loss::LossTracker;
use crate::orchestrate::{ExportAdapter, ImportAdapter, ImportResult};
use anyhow::Result;
use regex::Regex;

pub struct DagmanAdapter;

fn job_block_re() -> Regex {
    Regex::new(r"(?ms)^JOB\s+([A-Za-z_][A-Za-z0-9_]*)\s*\{(.*?)^\}").unwrap()
}

fn job_reference_re() -> Regex {
    Regex::new(r"(?m)^JOB\s+(\S+)\s+(\S+\.sub)\s*$").unwrap()
}

fn parent_child_re() -> Regex {
    Regex::new(r"(?m)^PARENT\s+(\S+)\s+CHILD\s+(\S+)\s*$").unwrap()
}

impl ImportAdapter for DagmanAdapter {
    fn format_name(&self) -> &'static str {
        Format::Dagman.name()
    }

    fn parse(&self, content: &str) -> Result<ImportResult> {
        let mut workflow = Workflow::new("dagman_workflow", "1.0.0");
        let mut notes = Vec::new();

        for caps in job_block_re().captures_iter(content) {
            let name = &caps[1];
            let body = &caps[2];
            let mut task = Task::new(name.to_string());
            let mut executable = None;
            let mut arguments = String::new();

            for line in body.lines() {
                let line = line.trim();
                let Some((key, value)) = line.split_once('=') else { continue };
                let key = key.trim();
                let value = value.trim();
                match key {
                    "executable" => executable = Some(value.to_string()),
                    "arguments" => arguments = value.to_string(),
                    "request_cpus" => {
                        if let Ok(n) = value.parse::<i64>() {
                            task.cpu.set(n, Environment::DistributedComputing, SourceMethod::Explicit);
                        }
                    }
                    "request_memory" => {
                        if let Ok(n) = value.parse::<i64>() {
                            task.mem_mb.set(n, Environment::DistributedComputing, SourceMethod::Explicit);
                        }
                    }
                    "request_disk" => {
                        if let Ok(n) = value.parse::<i64>() {
                            task.disk_mb.set(n, Environment::DistributedComputing, SourceMethod::Explicit);
                        }
                    }
                    "retry" => {
                        if let Ok(n) = value.parse::<i64>() {
                            task.retry_count.set(n, Environment::DistributedComputing, SourceMethod::Explicit);
                        }
                    }
                    other => notes.push(format!("job '{name}': unrecognized submit key '{other}'")),
                }
            }

            if let Some(exe) = executable {
                let command = if arguments.is_empty() { exe } else { format!("{exe} {arguments}") };
                task.command.set(command, Environment::DistributedComputing, SourceMethod::Explicit);
            }
            workflow.add_task(task);
        }

        for caps in job_reference_re().captures_iter(content) {
            let name = caps[1].to_string();
            if workflow.tasks.contains_key(&name) {
                continue;
            }
            notes.push(format!("job '{name}': resources live in '{}', not visible to a single-file parse", &caps[2]));
            workflow.add_task(Task::new(name));
        }

        for caps in parent_child_re().captures_iter(content) {
            workflow.add_edge(caps[1].to_string(), caps[2].to_string());
        }

        Ok(ImportResult { workflow, parsing_notes: notes })
    }
}

impl ExportAdapter for DagmanAdapter {
    fn format_name(&self) -> &'static str {
        Format::Dagman.name()
    }

    fn generate_output(&self, workflow: &Workflow, tracker: &mut LossTracker) -> Result<String> {
        let env = Environment::DistributedComputing;
        let mut out = String::new();

        for id in &task_order(workflow) {
            let Some(task) = workflow.tasks.get(id) else { continue };
            out.push_str(&format!("JOB {id} {id}.sub\n"));

            if task.gpu.get(env).is_some() {
                tracker.record_resource_specification_loss(
                    format!("/tasks/{id}/gpu"),
                    "gpu",
                    serde_json::json!(task.gpu.get(env)),
                );
            }
        }

        for edge in &workflow.edges {
            out.push_str(&format!("PARENT {} CHILD {}\n", edge.parent, edge.child));
        }

        Ok(out)
    }

    fn auxiliary_files(&self, workflow: &Workflow, _tracker: &mut LossTracker) -> Result<Vec<(String, String)>> {
        let env = Environment::DistributedComputing;
        let mut files = Vec::new();

        for id in &task_order(workflow) {
            let Some(task) = workflow.tasks.get(id) else { continue };
            let command = task
                .command
                .get(env)
                .or_else(|| task.command.get(Environment::SharedFilesystem))
                .cloned()
                .unwrap_or_default();
            let mut parts = command.splitn(2, ' ');
            let executable = parts.next().unwrap_or_default();
            let arguments = parts.next().unwrap_or_default();

            let mut sub = String::new();
            sub.push_str(&format!("executable = {executable}\n"));
            if !arguments.is_empty() {
                sub.push_str(&format!("arguments = {arguments}\n"));
            }
            if let Some(cpu) = task.cpu.get(env).or_else(|| task.cpu.get(Environment::SharedFilesystem)) {
                sub.push_str(&format!("request_cpus = {cpu}\n"));
            }
            if let Some(mem) = task.mem_mb.get(env).or_else(|| task.mem_mb.get(Environment::SharedFilesystem)) {
                sub.push_str(&format!("request_memory = {mem}MB\n"));
            }
            if let Some(retries) = task.retry_count.get(env) {
                sub.push_str(&format!("retry = {retries}\n"));
            }
            sub.push_str("queue\n");

            files.push((format!("{id}.sub"), sub));
        }

        Ok(files)
    }
}

fn task_order(workflow: &Workflow) -> Vec<String> {
    if workflow.task_order.is_empty() {
        let mut ids: Vec<String> = workflow.tasks.keys().cloned().collect();
        ids.sort();
        ids
    } else {
        workflow.task_order.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_job_block_and_parent_child_edge() {
        let source = "JOB A {\n  executable = /bin/echo\n  arguments = hello\n  request_cpus = 2\n  request_memory = 2048\n}\n\nJOB B {\n  executable = /bin/cat\n}\n\nPARENT A CHILD B\n";
        let adapter = DagmanAdapter;
        let result = adapter.parse(source).unwrap();
        assert_eq!(result.workflow.tasks["A"].cpu.get(Environment::DistributedComputing), Some(&2));
        assert_eq!(result.workflow.edges.len(), 1);
        assert_eq!(result.workflow.edges[0].parent, "A");
    }

    #[test]
    fn round_trips_a_minimal_two_job_dag() {
        let adapter = DagmanAdapter;
        let mut wf = Workflow::new("demo", "1.0.0");
        let mut a = Task::new("A");
        a.command.set("/bin/echo hello".into(), Environment::DistributedComputing, SourceMethod::Explicit);
        a.cpu.set(2, Environment::DistributedComputing, SourceMethod::Explicit);
        wf.add_task(a);
        wf.add_task(Task::new("B"));
        wf.add_edge("A", "B");

        let mut tracker = LossTracker::new();
        let rendered = adapter.generate_output(&wf, &mut tracker).unwrap();
        assert!(rendered.contains("JOB A A.sub"));
        assert!(rendered.contains("JOB B B.sub"));

        let reparsed = adapter.parse(&rendered).unwrap();
        assert_eq!(reparsed.workflow.tasks.len(), 2);
        assert_eq!(reparsed.workflow.edges[0], crate::ir::Edge { parent: "A".into(), child: "B".into() });

        let files = adapter.auxiliary_files(&wf, &mut tracker).unwrap();
        let (name, content) = files.iter().find(|(n, _)| n == "A.sub").unwrap();
        assert_eq!(name, "A.sub");
        assert!(content.contains("executable = /bin/echo"));
        assert!(content.contains("arguments = hello"));
        assert!(content.contains("request_cpus = 2"));
    }
}
