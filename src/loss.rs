// src/loss.rs
//
// =============================================================================
// WF2WF: LOSS SUBSYSTEM
// =============================================================================
//
// Every export that cannot represent a field of the IR in the target
// format records a `LossEntry` instead of silently dropping data. The
// accumulated entries are written to a side-car file next to the export
// output; a later import of that same target file, followed by a
// re-export back to a format that *can* represent the field, reinjects it
// via `apply`/`detect_and_apply_sidecar`.

use crate::ir::{
    LossDocument, LossEntry, LossOrigin, LossSeverity, LossStatus, LossSummary, Workflow,
};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const SIDECAR_EXTENSION: &str = "loss.json";

/// Accumulates entries during a single export. Seeded up front (via
/// `prepare`) with the set of (pointer, field) pairs a previous round
/// trip had successfully reinjected, so a field lost again this run is
/// recorded as `LostAgain` instead of a fresh `Lost` — a repeat loss
/// should read differently from a first-time one. Within a single run,
/// recording the same (pointer, field) twice is a no-op: the first call
/// wins and decides the status.
#[derive(Debug, Default)]
pub struct LossTracker {
    entries: Vec<LossEntry>,
    previously_reapplied: HashSet<(String, String)>,
    seen: HashSet<(String, String)>,
}

impl LossTracker {
    pub fn new() -> Self {
        Self::prepare(&[])
    }

    /// Seeds the tracker with the previous side-car's entries so `record`
    /// can tell a repeat loss from a first-time one.
    pub fn prepare(previous: &[LossEntry]) -> Self {
        let previously_reapplied = previous
            .iter()
            .filter(|e| matches!(e.status, LossStatus::Reapplied))
            .map(|e| (e.json_pointer.clone(), e.field.clone()))
            .collect();
        Self { entries: Vec::new(), previously_reapplied, seen: HashSet::new() }
    }

    /// Generic recorder. `json_pointer` addresses the lost field per RFC
    /// 6901 (e.g. "/tasks/align/gpu_mem_mb"). Duplicate (pointer, field)
    /// entries within the same run are suppressed.
    pub fn record(
        &mut self,
        json_pointer: impl Into<String>,
        field: impl Into<String>,
        lost_value: serde_json::Value,
        reason: impl Into<String>,
        severity: LossSeverity,
        category: impl Into<String>,
    ) {
        let json_pointer = json_pointer.into();
        let field = field.into();
        let Some(status) = self.resolve_status(&json_pointer, &field, LossStatus::Lost) else { return };
        self.entries.push(LossEntry {
            json_pointer,
            field,
            lost_value,
            reason: reason.into(),
            origin: LossOrigin::Wf2wf,
            status,
            severity,
            category: category.into(),
            environment_context: None,
            adaptation_details: None,
            recovery_suggestions: Vec::new(),
        });
    }

    pub fn record_environment_adaptation(
        &mut self,
        json_pointer: impl Into<String>,
        field: impl Into<String>,
        lost_value: serde_json::Value,
        adaptation_details: serde_json::Value,
    ) {
        let json_pointer = json_pointer.into();
        let field = field.into();
        let Some(status) = self.resolve_status(&json_pointer, &field, LossStatus::Adapted) else { return };
        self.entries.push(LossEntry {
            json_pointer,
            field,
            lost_value,
            reason: "value adapted across execution environments".into(),
            origin: LossOrigin::Wf2wf,
            status,
            severity: LossSeverity::Info,
            category: "environment_adaptation".into(),
            environment_context: None,
            adaptation_details: Some(adaptation_details),
            recovery_suggestions: vec!["review adapted value for target environment".into()],
        });
    }

    pub fn record_spec_class_loss(
        &mut self,
        json_pointer: impl Into<String>,
        field: impl Into<String>,
        lost_value: serde_json::Value,
    ) {
        let json_pointer = json_pointer.into();
        let field = field.into();
        let Some(status) = self.resolve_status(&json_pointer, &field, LossStatus::Lost) else { return };
        self.entries.push(LossEntry {
            json_pointer,
            field,
            lost_value,
            reason: "target format has no equivalent specification class".into(),
            origin: LossOrigin::Wf2wf,
            status,
            severity: LossSeverity::Warn,
            category: "spec_class".into(),
            environment_context: None,
            adaptation_details: None,
            recovery_suggestions: vec!["re-export to a format supporting this spec class".into()],
        });
    }

    pub fn record_resource_specification_loss(
        &mut self,
        json_pointer: impl Into<String>,
        field: impl Into<String>,
        lost_value: serde_json::Value,
    ) {
        let json_pointer = json_pointer.into();
        let field = field.into();
        let Some(status) = self.resolve_status(&json_pointer, &field, LossStatus::Lost) else { return };
        self.entries.push(LossEntry {
            json_pointer,
            field,
            lost_value,
            reason: "target format cannot express this resource field".into(),
            origin: LossOrigin::Wf2wf,
            status,
            severity: LossSeverity::Warn,
            category: "resource_specification".into(),
            environment_context: None,
            adaptation_details: None,
            recovery_suggestions: vec!["set the field via a target-specific extension if available".into()],
        });
    }

    pub fn record_file_transfer_loss(
        &mut self,
        json_pointer: impl Into<String>,
        field: impl Into<String>,
        lost_value: serde_json::Value,
    ) {
        let json_pointer = json_pointer.into();
        let field = field.into();
        let Some(status) = self.resolve_status(&json_pointer, &field, LossStatus::Lost) else { return };
        self.entries.push(LossEntry {
            json_pointer,
            field,
            lost_value,
            reason: "target format has no file transfer / staging model".into(),
            origin: LossOrigin::Wf2wf,
            status,
            severity: LossSeverity::Info,
            category: "file_transfer".into(),
            environment_context: None,
            adaptation_details: None,
            recovery_suggestions: Vec::new(),
        });
    }

    /// Dedups against entries already recorded this run, returning `None`
    /// when `(pointer, field)` was already seen. On first occurrence,
    /// escalates `Lost` to `LostAgain` when the previous side-car had this
    /// field marked `Reapplied` — otherwise passes `default_status` through
    /// unchanged (so `Adapted` entries are never reclassified as losses).
    fn resolve_status(&mut self, json_pointer: &str, field: &str, default_status: LossStatus) -> Option<LossStatus> {
        let key = (json_pointer.to_string(), field.to_string());
        if !self.seen.insert(key.clone()) {
            return None;
        }
        if default_status == LossStatus::Lost && self.previously_reapplied.contains(&key) {
            Some(LossStatus::LostAgain)
        } else {
            Some(default_status)
        }
    }

    pub fn into_entries(self) -> Vec<LossEntry> {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn summarize(entries: &[LossEntry]) -> LossSummary {
    let mut summary = LossSummary { total_entries: entries.len(), ..Default::default() };
    for e in entries {
        *summary.by_category.entry(e.category.clone()).or_insert(0) += 1;
        *summary.by_severity.entry(format!("{:?}", e.severity).to_lowercase()).or_insert(0) += 1;
        *summary.by_status.entry(format!("{:?}", e.status).to_lowercase()).or_insert(0) += 1;
        *summary.by_origin.entry(format!("{:?}", e.origin).to_lowercase()).or_insert(0) += 1;
    }
    summary
}

/// Side-car path for a given export output path: `foo.cwl` -> `foo.cwl.loss.json`.
pub fn sidecar_path(output_path: &Path) -> PathBuf {
    let mut s = output_path.as_os_str().to_owned();
    s.push(".");
    s.push(SIDECAR_EXTENSION);
    PathBuf::from(s)
}

pub fn write_sidecar(
    output_path: &Path,
    target_engine: &str,
    source_checksum: &str,
    timestamp: &str,
    entries: Vec<LossEntry>,
    environment_adaptation: Option<serde_json::Value>,
) -> Result<PathBuf> {
    let summary = summarize(&entries);
    let doc = LossDocument {
        wf2wf_version: env!("CARGO_PKG_VERSION").to_string(),
        target_engine: target_engine.to_string(),
        source_checksum: source_checksum.to_string(),
        timestamp: timestamp.to_string(),
        entries,
        summary,
        environment_adaptation,
    };
    let path = sidecar_path(output_path);
    let json = serde_json::to_string_pretty(&doc).context("serializing loss document")?;
    let tmp_path = path.with_extension("loss.json.tmp");
    std::fs::write(&tmp_path, json).with_context(|| format!("writing temp loss side-car {tmp_path:?}"))?;
    std::fs::rename(&tmp_path, &path).with_context(|| format!("renaming loss side-car into place {path:?}"))?;
    Ok(path)
}

pub fn read_sidecar(path: &Path) -> Result<Option<LossDocument>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path).with_context(|| format!("reading loss side-car {path:?}"))?;
    let doc: LossDocument = serde_json::from_str(&data).with_context(|| format!("parsing loss side-car {path:?}"))?;
    Ok(Some(doc))
}

/// Reinject side-car entries into `workflow` via JSON-pointer addressing,
/// marking each successfully-applied entry `Reapplied`. Entries whose
/// pointer no longer resolves in the target IR shape are left `Lost` and
/// reported back so the caller can log them.
pub fn apply(workflow: &mut Workflow, mut doc: LossDocument) -> Result<Vec<String>> {
    let mut failures = Vec::new();
    let mut value = serde_json::to_value(&*workflow).context("converting workflow to Value for reinjection")?;

    for entry in doc.entries.iter_mut() {
        match json_pointer_set(&mut value, &entry.json_pointer, entry.lost_value.clone()) {
            Ok(()) => entry.status = LossStatus::Reapplied,
            Err(e) => failures.push(format!("{}: {e}", entry.json_pointer)),
        }
    }

    *workflow = serde_json::from_value(value).context("converting Value back to workflow after reinjection")?;
    workflow.loss_map = doc.entries;
    Ok(failures)
}

/// Checksum-gated convenience: only reinjects if `doc.source_checksum`
/// matches `current_checksum`, since a side-car written against a
/// different version of the source document would apply stale values.
pub fn detect_and_apply_sidecar(
    workflow: &mut Workflow,
    sidecar: &Path,
    current_checksum: &str,
) -> Result<bool> {
    let Some(doc) = read_sidecar(sidecar)? else {
        return Ok(false);
    };
    if doc.source_checksum != current_checksum {
        log::warn!(
            "loss side-car {:?} checksum mismatch (expected {}, found {}); skipping reinjection",
            sidecar,
            current_checksum,
            doc.source_checksum
        );
        return Ok(false);
    }
    let failures = apply(workflow, doc)?;
    for f in failures {
        log::warn!("failed to reinject loss entry: {f}");
    }
    Ok(true)
}

/// Minimal RFC 6901 JSON-pointer setter sufficient for reinjection: walks
/// object/array segments, creating intermediate object levels as needed,
/// and sets the final segment to `value`.
fn json_pointer_set(root: &mut serde_json::Value, pointer: &str, value: serde_json::Value) -> Result<()> {
    if pointer.is_empty() || pointer == "/" {
        *root = value;
        return Ok(());
    }
    let segments: Vec<String> = pointer
        .trim_start_matches('/')
        .split('/')
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect();
    let (last, parents) = segments.split_last().context("empty json pointer")?;

    let mut cur = root;
    for seg in parents {
        cur = match cur {
            serde_json::Value::Object(map) => {
                map.entry(seg.clone()).or_insert_with(|| serde_json::Value::Object(Default::default()))
            }
            serde_json::Value::Array(arr) => {
                let idx: usize = seg.parse().with_context(|| format!("non-numeric array segment '{seg}'"))?;
                arr.get_mut(idx).with_context(|| format!("array index {idx} out of bounds"))?
            }
            other => anyhow::bail!("cannot descend into non-container value: {other:?}"),
        };
    }
    match cur {
        serde_json::Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        serde_json::Value::Array(arr) => {
            let idx: usize = last.parse().with_context(|| format!("non-numeric array segment '{last}'"))?;
            if idx < arr.len() {
                arr[idx] = value;
            } else {
                arr.push(value);
            }
            Ok(())
        }
        other => anyhow::bail!("cannot set field on non-container value: {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{LossSeverity, Task, Workflow};

    #[test]
    fn prepare_marks_previously_reapplied_entries_as_lost_again() {
        let previous = vec![LossEntry {
            json_pointer: "/tasks/a/gpu".into(),
            field: "gpu".into(),
            lost_value: serde_json::json!(1),
            reason: "no gpu model".into(),
            origin: LossOrigin::Wf2wf,
            status: LossStatus::Reapplied,
            severity: LossSeverity::Warn,
            category: "resource_specification".into(),
            environment_context: None,
            adaptation_details: None,
            recovery_suggestions: Vec::new(),
        }];
        let mut tracker = LossTracker::prepare(&previous);
        tracker.record("/tasks/a/gpu", "gpu", serde_json::json!(1), "no gpu model", LossSeverity::Warn, "resource_specification");
        let entries = tracker.into_entries();
        assert_eq!(entries[0].status, LossStatus::LostAgain);
    }

    #[test]
    fn record_dedups_same_pointer_and_field_within_a_run() {
        let mut tracker = LossTracker::new();
        tracker.record("/tasks/a/gpu", "gpu", serde_json::json!(1), "no gpu model", LossSeverity::Warn, "resource_specification");
        tracker.record("/tasks/a/gpu", "gpu", serde_json::json!(1), "no gpu model", LossSeverity::Warn, "resource_specification");
        assert_eq!(tracker.into_entries().len(), 1);
    }

    #[test]
    fn sidecar_path_appends_loss_json() {
        let p = sidecar_path(Path::new("out/foo.cwl"));
        assert_eq!(p, PathBuf::from("out/foo.cwl.loss.json"));
    }

    #[test]
    fn apply_reinjects_pointer_and_marks_reapplied() {
        let mut wf = Workflow::new("demo", "1.0.0");
        wf.add_task(Task::new("a"));
        let doc = LossDocument {
            wf2wf_version: "0.1.0".into(),
            target_engine: "cwl".into(),
            source_checksum: "abc".into(),
            timestamp: "2026-01-01T00:00:00Z".into(),
            entries: vec![LossEntry {
                json_pointer: "/label".into(),
                field: "label".into(),
                lost_value: serde_json::json!("restored-label"),
                reason: "target has no label field".into(),
                origin: LossOrigin::Wf2wf,
                status: LossStatus::Lost,
                severity: LossSeverity::Info,
                category: "spec_class".into(),
                environment_context: None,
                adaptation_details: None,
                recovery_suggestions: Vec::new(),
            }],
            summary: LossSummary::default(),
            environment_adaptation: None,
        };
        let failures = apply(&mut wf, doc).unwrap();
        assert!(failures.is_empty());
        assert_eq!(wf.label.as_deref(), Some("restored-label"));
        assert_eq!(wf.loss_map[0].status, LossStatus::Reapplied);
    }
}
