// src/adaptation.rs
//
// =============================================================================
// WF2WF: ENVIRONMENT ADAPTATION
// =============================================================================
//
// Strategies that project a workflow's resource/behavior bindings from one
// execution environment onto another, appending new bindings rather than
// mutating existing ones so earlier environments' values stay intact for
// inspection or re-export.

use crate::ir::{Environment, SourceMethod, Task, Workflow};
use crate::loss::LossTracker;

/// One migration strategy: given a source and target environment, adapt
/// every behaviorally relevant field on a task. Implementors only need to
/// supply `adapt_resource_value`; the rest of the fields are walked by the
/// default `adapt_task`/`adapt_workflow` methods.
pub trait EnvironmentAdapter {
    fn source_environment(&self) -> Environment;
    fn target_environment(&self) -> Environment;

    /// Scale a resource value (cpu/mem_mb/disk_mb/time_s/...) from source
    /// to target environment. `field` lets a strategy apply per-field
    /// multipliers (e.g. memory overhead differs from disk overhead).
    fn adapt_resource_value(&self, field: &str, value: i64) -> i64;

    fn staging_required(&self) -> bool {
        false
    }

    fn file_transfer_mode(&self) -> Option<&'static str> {
        None
    }

    fn adapt_task(&self, task: &mut Task, tracker: &mut LossTracker, json_pointer_prefix: &str) {
        let (src, dst) = (self.source_environment(), self.target_environment());

        for (field, esv) in [
            ("cpu", &mut task.cpu),
            ("mem_mb", &mut task.mem_mb),
            ("disk_mb", &mut task.disk_mb),
            ("gpu_mem_mb", &mut task.gpu_mem_mb),
            ("time_s", &mut task.time_s),
        ] {
            if esv.get(dst).is_some() {
                continue;
            }
            let before = esv.get(src).copied();
            esv.adapt(src, dst, |v| self.adapt_resource_value(field, *v));
            if let (Some(before), Some(after)) = (before, esv.get(dst).copied()) {
                if before != after {
                    tracker.record_environment_adaptation(
                        format!("{json_pointer_prefix}/{field}"),
                        field,
                        serde_json::json!(before),
                        serde_json::json!({
                            "source_environment": src.to_string(),
                            "target_environment": dst.to_string(),
                            "adapted_value": after,
                        }),
                    );
                }
            }
        }

        if self.staging_required() && task.staging_required.get(dst).is_none() {
            task.staging_required.set(true, dst, SourceMethod::Adapted);
        }
        if let Some(mode) = self.file_transfer_mode() {
            if task.file_transfer_mode.get(dst).is_none() {
                task.file_transfer_mode.set(mode.to_string(), dst, SourceMethod::Adapted);
            }
        }
    }

    fn adapt_workflow(&self, workflow: &mut Workflow, tracker: &mut LossTracker) {
        let mut ids: Vec<String> = workflow.tasks.keys().cloned().collect();
        ids.sort();
        for id in ids {
            if let Some(task) = workflow.tasks.get_mut(&id) {
                self.adapt_task(task, tracker, &format!("/tasks/{id}"));
            }
        }
        let (src, dst) = (self.source_environment(), self.target_environment());
        if workflow.execution_model.get(dst).is_none() {
            if let Some(model) = workflow.execution_model.get(src).copied() {
                workflow.execution_model.set(model, dst, SourceMethod::Adapted);
            }
        }
    }
}

/// Shared-filesystem -> distributed-computing: jobs no longer see a common
/// POSIX mount, so memory/disk/runtime need headroom for staging overhead
/// and file transfer must be made explicit.
pub struct SharedToDistributedAdapter {
    pub memory_overhead_factor: f64,
    pub disk_overhead_factor: f64,
    pub runtime_overhead_factor: f64,
}

impl Default for SharedToDistributedAdapter {
    fn default() -> Self {
        Self {
            memory_overhead_factor: 1.2,
            disk_overhead_factor: 1.5,
            runtime_overhead_factor: 1.1,
        }
    }
}

impl EnvironmentAdapter for SharedToDistributedAdapter {
    fn source_environment(&self) -> Environment {
        Environment::SharedFilesystem
    }

    fn target_environment(&self) -> Environment {
        Environment::DistributedComputing
    }

    fn adapt_resource_value(&self, field: &str, value: i64) -> i64 {
        let factor = match field {
            "mem_mb" | "gpu_mem_mb" => self.memory_overhead_factor,
            "disk_mb" => self.disk_overhead_factor,
            "time_s" => self.runtime_overhead_factor,
            _ => 1.0,
        };
        ((value as f64) * factor).ceil() as i64
    }

    fn staging_required(&self) -> bool {
        true
    }

    fn file_transfer_mode(&self) -> Option<&'static str> {
        Some("staging")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{SourceMethod, Task, Workflow};

    #[test]
    fn shared_to_distributed_scales_memory_and_marks_staging() {
        let mut wf = Workflow::new("adapt-demo", "1.0.0");
        let mut task = Task::new("align");
        task.mem_mb.set(1000, Environment::SharedFilesystem, SourceMethod::Explicit);
        wf.add_task(task);

        let adapter = SharedToDistributedAdapter::default();
        let mut tracker = LossTracker::new();
        adapter.adapt_workflow(&mut wf, &mut tracker);

        let task = &wf.tasks["align"];
        assert_eq!(task.mem_mb.get(Environment::DistributedComputing), Some(&1200));
        assert_eq!(task.mem_mb.get(Environment::SharedFilesystem), Some(&1000));
        assert_eq!(task.staging_required.get(Environment::DistributedComputing), Some(&true));
        assert!(!tracker.is_empty());
    }

    #[test]
    fn adapt_never_overwrites_an_existing_target_binding() {
        let mut wf = Workflow::new("adapt-demo", "1.0.0");
        let mut task = Task::new("align");
        task.mem_mb.set(1000, Environment::SharedFilesystem, SourceMethod::Explicit);
        task.mem_mb.set(9999, Environment::DistributedComputing, SourceMethod::Explicit);
        wf.add_task(task);

        let adapter = SharedToDistributedAdapter::default();
        let mut tracker = LossTracker::new();
        adapter.adapt_workflow(&mut wf, &mut tracker);

        assert_eq!(wf.tasks["align"].mem_mb.get(Environment::DistributedComputing), Some(&9999));
    }
}
