// src/adapters/bco.rs
//
// IEEE 2791-2020 BioCompute Object adapter. A BCO document has several
// required "domains"; we read/write `description_domain.pipeline_steps`
// (task list, sequential edges), `execution_domain` (script/docker image,
// environment variables) and an `extension_domain` entry namespaced
// `"wf2wf:execution_model"` carrying whatever `ExecutionModel` the IR
// recorded (decided and logged in DESIGN.md). Signing delegates to an
// external `openssl` process via `sign()`, which computes the etag the
// signature covers, writes a detached signature and an in-toto attestation
// alongside the document, and records the event in `extension_domain`.

use super::Format;
use crate::ir::{Environment, ExecutionModel, SourceMethod, Task, Workflow};
use crate::loss::LossTracker;
use crate::orchestrate::{ExportAdapter, ImportAdapter, ImportResult};
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

pub struct BcoAdapter;

const EXECUTION_MODEL_NAMESPACE: &str = "wf2wf:execution_model";
const PROVENANCE_NAMESPACE: &str = "wf2wf:provenance";

impl ImportAdapter for BcoAdapter {
    fn format_name(&self) -> &'static str {
        Format::Bco.name()
    }

    fn parse(&self, content: &str) -> Result<ImportResult> {
        let doc: Value = serde_json::from_str(content).context("parsing BCO JSON document")?;
        let env = Environment::CloudNative;
        let name = doc
            .get("provenance_domain")
            .and_then(|d| d.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("bco_workflow")
            .to_string();
        let mut workflow = Workflow::new(name, "1.0.0");
        let mut notes = Vec::new();

        let steps = doc
            .get("description_domain")
            .and_then(|d| d.get("pipeline_steps"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let script_by_step: std::collections::HashMap<i64, String> = doc
            .get("execution_domain")
            .and_then(|d| d.get("script"))
            .and_then(Value::as_array)
            .map(|scripts| {
                scripts
                    .iter()
                    .enumerate()
                    .filter_map(|(i, s)| s.get("uri").and_then(|u| u.get("uri")).and_then(Value::as_str).map(|u| (i as i64, u.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let docker_image = doc
            .get("execution_domain")
            .and_then(|d| d.get("software_prerequisites"))
            .and_then(Value::as_array)
            .and_then(|prereqs| prereqs.iter().find(|p| p.get("name").and_then(Value::as_str) == Some("docker")))
            .and_then(|p| p.get("version").and_then(Value::as_str))
            .map(str::to_string);

        let mut previous_name: Option<String> = None;
        for step in &steps {
            let step_number = step.get("step_number").and_then(Value::as_i64).unwrap_or(0);
            let step_name = step
                .get("name")
                .and_then(Value::as_str)
                .map(|s| s.replace(' ', "_"))
                .unwrap_or_else(|| format!("step_{step_number}"));

            let mut task = Task::new(step_name.clone());
            if let Some(script) = script_by_step.get(&step_number) {
                task.command.set(script.clone(), env, SourceMethod::Explicit);
            }
            if let Some(image) = &docker_image {
                task.container.set(image.clone(), env, SourceMethod::Explicit);
            }
            if let Some(desc) = step.get("description").and_then(Value::as_str) {
                task.documentation.text = Some(desc.to_string());
            } else {
                notes.push(format!("pipeline step {step_number}: no description field"));
            }

            workflow.add_task(task);
            if let Some(prev) = previous_name {
                workflow.add_edge(prev, step_name.clone());
            }
            previous_name = Some(step_name);
        }

        if let Some(model_str) = doc
            .get("extension_domain")
            .and_then(Value::as_array)
            .and_then(|exts| exts.iter().find(|e| e.get("extension_schema").and_then(Value::as_str) == Some(EXECUTION_MODEL_NAMESPACE)))
            .and_then(|e| e.get("value"))
            .and_then(Value::as_str)
        {
            if let Ok(model) = serde_json::from_value::<ExecutionModel>(Value::String(model_str.to_string())) {
                workflow.execution_model.set(model, env, SourceMethod::Explicit);
            }
        }

        Ok(ImportResult { workflow, parsing_notes: notes })
    }
}

impl ExportAdapter for BcoAdapter {
    fn format_name(&self) -> &'static str {
        Format::Bco.name()
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

        let mut pipeline_steps = Vec::new();
        let mut scripts = Vec::new();
        let mut docker_image = None;

        for (i, id) in order.iter().enumerate() {
            let Some(task) = workflow.tasks.get(id) else { continue };
            pipeline_steps.push(serde_json::json!({
                "step_number": i,
                "name": id,
                "description": task.documentation.text.clone().unwrap_or_default(),
                "input_list": task.inputs.iter().map(|p| serde_json::json!({ "filename": p.id })).collect::<Vec<_>>(),
                "output_list": task.outputs.iter().map(|p| serde_json::json!({ "filename": p.id })).collect::<Vec<_>>(),
            }));
            if let Some(cmd) = task.command.get(env) {
                scripts.push(serde_json::json!({ "uri": { "uri": cmd } }));
            }
            if docker_image.is_none() {
                docker_image = task.container.get(env).cloned();
            }

            if task.security.get(env).is_some() {
                tracker.record_spec_class_loss(
                    format!("/tasks/{id}/security"),
                    "security",
                    serde_json::to_value(task.security.get(env)).unwrap_or_default(),
                );
            }
        }

        let mut extension_domain = Vec::new();
        if let Some(model) = workflow.execution_model.get(env) {
            extension_domain.push(serde_json::json!({
                "extension_schema": EXECUTION_MODEL_NAMESPACE,
                "value": serde_json::to_value(model).unwrap_or(Value::Null),
            }));
        }

        let software_prerequisites = docker_image
            .map(|image| vec![serde_json::json!({ "name": "docker", "version": image })])
            .unwrap_or_default();

        let doc = serde_json::json!({
            "object_id": format!("https://biocomputeobject.org/{}/BCO_000000", workflow.name),
            "spec_version": "https://w3id.org/ieee/ieee-2791-schema/2791object.json",
            "provenance_domain": {
                "name": workflow.name,
                "version": workflow.version,
            },
            "usability_domain": [],
            "description_domain": {
                "pipeline_steps": pipeline_steps,
            },
            "execution_domain": {
                "script": scripts,
                "script_driver": "shell",
                "software_prerequisites": software_prerequisites,
                "external_data_endpoints": [],
                "environment_variables": {},
            },
            "io_domain": {
                "input_subdomain": [],
                "output_subdomain": [],
            },
            "error_domain": {
                "empirical_error": {},
                "algorithmic_error": {},
            },
            "extension_domain": extension_domain,
        });

        serde_json::to_string_pretty(&doc).context("serializing BCO JSON document")
    }
}

/// SHA-256 hex digest over the canonical-form serialization of a BCO
/// document, used both as the `extension_domain` sidecar etag and as the
/// subject digest in `sign`'s in-toto attestation.
pub fn compute_etag(bco_json: &str) -> Result<String> {
    let value: Value = serde_json::from_str(bco_json).context("parsing BCO JSON for etag computation")?;
    let canonical = serde_json::to_string(&value).context("canonicalizing BCO document")?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Structural validity: the domains IEEE 2791 marks required are present.
pub fn validate_bco(bco_json: &str) -> Result<Vec<String>> {
    let doc: Value = serde_json::from_str(bco_json).context("parsing BCO JSON for validation")?;
    let required = [
        "provenance_domain",
        "usability_domain",
        "description_domain",
        "execution_domain",
        "io_domain",
        "error_domain",
    ];
    let mut issues = Vec::new();
    for field in required {
        if doc.get(field).is_none() {
            issues.push(format!("missing required domain '{field}'"));
        }
    }
    Ok(issues)
}

/// Result of signing a BCO document: the document with a
/// `wf2wf:provenance` extension entry appended, the detached signature
/// bytes, and an in-toto attestation covering the same etag.
pub struct SignOutcome {
    pub etag: String,
    pub signed_document: String,
    pub signature: Vec<u8>,
    pub attestation: Vec<u8>,
}

/// Signs a BCO document with `key_path` via an external `openssl dgst
/// -sha256 -sign` process. Computes the etag over the document as given,
/// then appends a `wf2wf:provenance` extension entry recording that etag
/// and the signing key before re-serializing, so the signed document's own
/// etag (recomputed on verification) necessarily differs from the etag the
/// signature covers — callers that verify must use the etag embedded in
/// the extension entry, not a fresh `compute_etag` over the signed output.
pub fn sign(bco_json: &str, key_path: &Path) -> Result<SignOutcome> {
    let mut doc: Value = serde_json::from_str(bco_json).context("parsing BCO JSON for signing")?;
    let canonical = serde_json::to_string(&doc).context("canonicalizing BCO document for signing")?;
    let etag_hex = compute_etag(bco_json)?;
    let etag = format!("sha256:{etag_hex}");

    let signature = sign_with_openssl(canonical.as_bytes(), key_path)?;

    let provenance_entry = serde_json::json!({
        "extension_schema": PROVENANCE_NAMESPACE,
        "value": {
            "etag": etag,
            "signed_with": key_path.display().to_string(),
        },
    });
    match doc.get_mut("extension_domain").and_then(Value::as_array_mut) {
        Some(extensions) => extensions.push(provenance_entry),
        None => doc["extension_domain"] = serde_json::json!([provenance_entry]),
    }
    let signed_document = serde_json::to_string_pretty(&doc).context("serializing signed BCO document")?;

    let attestation = serde_json::json!({
        "_type": "https://in-toto.io/Statement/v1",
        "subject": [{ "name": "bco", "digest": { "sha256": etag_hex } }],
        "predicateType": "https://wf2wf.dev/attestations/bco-sign/v1",
        "predicate": {
            "signed_with": key_path.display().to_string(),
        },
    });
    let attestation = serde_json::to_vec_pretty(&attestation).context("serializing in-toto attestation")?;

    Ok(SignOutcome { etag, signed_document, signature, attestation })
}

fn sign_with_openssl(data: &[u8], key_path: &Path) -> Result<Vec<u8>> {
    let mut child = Command::new("openssl")
        .args(["dgst", "-sha256", "-sign"])
        .arg(key_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("spawning openssl dgst -sign")?;
    child
        .stdin
        .take()
        .expect("stdin was piped")
        .write_all(data)
        .context("writing document to openssl stdin")?;
    let output = child.wait_with_output().context("waiting on openssl dgst -sign")?;
    if !output.status.success() {
        anyhow::bail!("openssl dgst -sign failed: {}", String::from_utf8_lossy(&output.stderr));
    }
    Ok(output.stdout)
}

/// Structural diff between two BCO documents: which top-level domains
/// differ, without attempting a semantic merge.
pub fn diff_documents(a: &str, b: &str) -> Result<Vec<String>> {
    let a: Value = serde_json::from_str(a).context("parsing first BCO document")?;
    let b: Value = serde_json::from_str(b).context("parsing second BCO document")?;
    let mut diffs = Vec::new();
    let (Value::Object(a_map), Value::Object(b_map)) = (&a, &b) else {
        return Ok(vec!["documents are not both JSON objects".to_string()]);
    };
    let mut keys: Vec<&String> = a_map.keys().chain(b_map.keys()).collect();
    keys.sort();
    keys.dedup();
    for key in keys {
        if a_map.get(key) != b_map.get(key) {
            diffs.push(format!("domain '{key}' differs"));
        }
    }
    Ok(diffs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etag_is_deterministic() {
        let doc = r#"{"a": 1, "b": 2}"#;
        assert_eq!(compute_etag(doc).unwrap(), compute_etag(doc).unwrap());
    }

    #[test]
    fn validate_flags_missing_domains() {
        let doc = r#"{"provenance_domain": {}}"#;
        let issues = validate_bco(doc).unwrap();
        assert!(issues.iter().any(|i| i.contains("execution_domain")));
    }

    #[test]
    fn diff_reports_changed_domains() {
        let a = r#"{"provenance_domain": {"name": "x"}, "execution_domain": {}}"#;
        let b = r#"{"provenance_domain": {"name": "y"}, "execution_domain": {}}"#;
        let diffs = diff_documents(a, b).unwrap();
        assert_eq!(diffs, vec!["domain 'provenance_domain' differs"]);
    }
}
