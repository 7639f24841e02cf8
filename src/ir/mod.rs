// src/ir/mod.rs
//
// =============================================================================
// WF2WF: INTERMEDIATE REPRESENTATION (v 0.1 )
// =============================================================================
//
// The "Esperanto" of the workflow world: a single versioned schema that
// every format adapter imports into and exports out of — tasks,
// parameters, and a DAG of edges, with every behaviorally relevant field
// carried per-environment so adaptation never destroys information.

pub mod codec;
pub mod env_value;

pub use env_value::{Binding, Environment, EnvironmentSpecificValue, SourceMethod};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// IR schema version. Bumped whenever a breaking change is made to the
/// on-disk JSON shape; carried in `Workflow.metadata` and in the
/// `$schema` URL emitted by the codec.
pub const IR_VERSION: &str = "1.0.0";

// ============================================================================
// 1. TYPE SPEC (Parameter typing)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Primitive {
    String,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    File,
    Directory,
    Any,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeSpec {
    Primitive { primitive: Primitive },
    Array { items: Box<TypeSpec> },
    Record { fields: HashMap<String, TypeSpec> },
    Enum { symbols: Vec<String> },
    Union { members: Vec<TypeSpec>, nullable: bool },
}

impl TypeSpec {
    pub fn primitive(p: Primitive) -> Self {
        TypeSpec::Primitive { primitive: p }
    }

    /// Structural invariants: record needs >=1 field, enum needs >=1
    /// symbol, union needs >=1 member, and `nullable` must agree with
    /// the presence of a literal "null" member.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            TypeSpec::Record { fields } if fields.is_empty() => {
                Err("record TypeSpec must declare at least one field".into())
            }
            TypeSpec::Enum { symbols } if symbols.is_empty() => {
                Err("enum TypeSpec must declare at least one symbol".into())
            }
            TypeSpec::Union { members, nullable } => {
                if members.is_empty() {
                    return Err("union TypeSpec must declare at least one member".into());
                }
                let has_null_member = members.iter().any(|m| {
                    matches!(m, TypeSpec::Enum { symbols } if symbols.iter().any(|s| s == "null"))
                });
                if *nullable != has_null_member {
                    return Err("union.nullable must agree with presence of a 'null' member".into());
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// 2. PARAMETER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub id: String,
    #[serde(rename = "type")]
    pub type_spec: TypeSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary_files: Vec<String>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub transfer_mode: EnvironmentSpecificValue<String>,
}

impl Parameter {
    pub fn new(id: impl Into<String>, type_spec: TypeSpec) -> Self {
        Self {
            id: id.into(),
            type_spec,
            label: None,
            doc: None,
            default: None,
            secondary_files: Vec::new(),
            transfer_mode: EnvironmentSpecificValue::new(),
        }
    }
}

// ============================================================================
// 3. REQUIREMENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub class_name: String,
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl Requirement {
    /// Class-specific validation. Unknown classes pass through untouched
    /// (forward-compat with format-specific extensions).
    pub fn validate(&self) -> Result<(), String> {
        match self.class_name.as_str() {
            "DockerRequirement" => {
                let known = ["dockerPull", "dockerLoad", "dockerFile", "dockerImport", "dockerImageId"];
                if !known.iter().any(|k| self.data.contains_key(*k)) {
                    return Err(
                        "DockerRequirement requires one of dockerPull/dockerLoad/dockerFile/dockerImport/dockerImageId".into(),
                    );
                }
                Ok(())
            }
            "ResourceRequirement" => {
                let known = [
                    "coresMin", "coresMax", "ramMin", "ramMax", "tmpdirMin", "tmpdirMax",
                    "outdirMin", "outdirMax", "gpuMin", "gpuMax",
                ];
                for key in self.data.keys() {
                    if !known.contains(&key.as_str()) {
                        return Err(format!("ResourceRequirement: unknown key '{key}'"));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// 4. SPEC CLASSES (flat, all-optional records)
// ============================================================================

macro_rules! spec_class {
    ($name:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
        pub struct $name {
            $(
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }
    };
}

spec_class!(CheckpointSpec {
    strategy: String,
    interval_s: u64,
    storage_location: String,
    enabled: bool,
    notes: String,
});

spec_class!(LoggingSpec {
    log_level: String,
    log_format: String,
    log_destination: String,
    aggregation: String,
    notes: String,
});

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SecuritySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_policies: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub secrets: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NetworkingSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_ports: Vec<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub egress_rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress_rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// ============================================================================
// 5. EXECUTION MODEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionModel {
    Sequential,
    Pipeline,
    Parallel,
    Dynamic,
    SharedFilesystem,
    DistributedComputing,
    CloudNative,
    Hybrid,
    Edge,
    Unknown,
}

// ============================================================================
// 6. LOSS ENTRY & LOSS DOCUMENT (data shapes; behavior lives in crate::loss)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossOrigin {
    User,
    Wf2wf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossStatus {
    Lost,
    LostAgain,
    Reapplied,
    Adapted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossSeverity {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossEntry {
    pub json_pointer: String,
    pub field: String,
    pub lost_value: serde_json::Value,
    pub reason: String,
    pub origin: LossOrigin,
    pub status: LossStatus,
    pub severity: LossSeverity,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_context: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptation_details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recovery_suggestions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LossSummary {
    pub total_entries: usize,
    pub by_category: HashMap<String, usize>,
    pub by_severity: HashMap<String, usize>,
    pub by_status: HashMap<String, usize>,
    pub by_origin: HashMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossDocument {
    pub wf2wf_version: String,
    pub target_engine: String,
    pub source_checksum: String,
    pub timestamp: String,
    pub entries: Vec<LossEntry>,
    pub summary: LossSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_adaptation: Option<serde_json::Value>,
}

// ============================================================================
// 7. METADATA & PROVENANCE
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parsing_notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conversion_warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub format_specific: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub uninterpreted: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub annotations: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub environment_metadata: HashMap<String, HashMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub quality_metrics: HashMap<String, f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extras: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Documentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intent: Vec<String>,
}

// ============================================================================
// 8. TASK
// ============================================================================

/// Every behaviorally relevant attribute is an `EnvironmentSpecificValue`,
/// so adapters can carry e.g. `cpu` bound for `shared_filesystem`
/// alongside a different, adapted `cpu` bound for `distributed_computing`
/// without losing either.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub inputs: Vec<Parameter>,
    #[serde(default)]
    pub outputs: Vec<Parameter>,

    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub command: EnvironmentSpecificValue<String>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub script: EnvironmentSpecificValue<String>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub cpu: EnvironmentSpecificValue<i64>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub mem_mb: EnvironmentSpecificValue<i64>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub disk_mb: EnvironmentSpecificValue<i64>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub gpu: EnvironmentSpecificValue<i64>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub gpu_mem_mb: EnvironmentSpecificValue<i64>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub time_s: EnvironmentSpecificValue<i64>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub threads: EnvironmentSpecificValue<i64>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub conda: EnvironmentSpecificValue<String>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub container: EnvironmentSpecificValue<String>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub workdir: EnvironmentSpecificValue<String>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub env_vars: EnvironmentSpecificValue<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub modules: EnvironmentSpecificValue<Vec<String>>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub retry_count: EnvironmentSpecificValue<i64>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub retry_delay: EnvironmentSpecificValue<i64>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub retry_backoff: EnvironmentSpecificValue<String>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub max_runtime: EnvironmentSpecificValue<i64>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub checkpoint_interval: EnvironmentSpecificValue<i64>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub on_failure: EnvironmentSpecificValue<String>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub failure_notification: EnvironmentSpecificValue<String>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub cleanup_on_failure: EnvironmentSpecificValue<bool>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub restart_from_checkpoint: EnvironmentSpecificValue<bool>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub partial_results: EnvironmentSpecificValue<bool>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub priority: EnvironmentSpecificValue<i64>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub file_transfer_mode: EnvironmentSpecificValue<String>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub staging_required: EnvironmentSpecificValue<bool>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub cleanup_after: EnvironmentSpecificValue<bool>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub cloud_provider: EnvironmentSpecificValue<String>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub cloud_storage_class: EnvironmentSpecificValue<String>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub cloud_encryption: EnvironmentSpecificValue<bool>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub parallel_transfers: EnvironmentSpecificValue<i64>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub bandwidth_limit: EnvironmentSpecificValue<String>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub when: EnvironmentSpecificValue<String>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub scatter: EnvironmentSpecificValue<Vec<String>>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub checkpointing: EnvironmentSpecificValue<CheckpointSpec>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub logging: EnvironmentSpecificValue<LoggingSpec>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub security: EnvironmentSpecificValue<SecuritySpec>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub networking: EnvironmentSpecificValue<NetworkingSpec>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub requirements: EnvironmentSpecificValue<Vec<Requirement>>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub hints: EnvironmentSpecificValue<Vec<Requirement>>,

    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub provenance: Provenance,
    #[serde(default)]
    pub documentation: Documentation,
}

impl Task {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            command: Default::default(),
            script: Default::default(),
            cpu: Default::default(),
            mem_mb: Default::default(),
            disk_mb: Default::default(),
            gpu: Default::default(),
            gpu_mem_mb: Default::default(),
            time_s: Default::default(),
            threads: Default::default(),
            conda: Default::default(),
            container: Default::default(),
            workdir: Default::default(),
            env_vars: Default::default(),
            modules: Default::default(),
            retry_count: Default::default(),
            retry_delay: Default::default(),
            retry_backoff: Default::default(),
            max_runtime: Default::default(),
            checkpoint_interval: Default::default(),
            on_failure: Default::default(),
            failure_notification: Default::default(),
            cleanup_on_failure: Default::default(),
            restart_from_checkpoint: Default::default(),
            partial_results: Default::default(),
            priority: Default::default(),
            file_transfer_mode: Default::default(),
            staging_required: Default::default(),
            cleanup_after: Default::default(),
            cloud_provider: Default::default(),
            cloud_storage_class: Default::default(),
            cloud_encryption: Default::default(),
            parallel_transfers: Default::default(),
            bandwidth_limit: Default::default(),
            when: Default::default(),
            scatter: Default::default(),
            checkpointing: Default::default(),
            logging: Default::default(),
            security: Default::default(),
            networking: Default::default(),
            requirements: Default::default(),
            hints: Default::default(),
            metadata: Metadata::default(),
            provenance: Provenance::default(),
            documentation: Documentation::default(),
        }
    }
}

// ============================================================================
// 9. WORKFLOW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Edge {
    pub parent: String,
    pub child: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub documentation: Documentation,

    #[serde(default)]
    pub inputs: Vec<Parameter>,
    #[serde(default)]
    pub outputs: Vec<Parameter>,

    #[serde(default)]
    pub tasks: HashMap<String, Task>,
    /// Insertion order of `tasks`, preserved for deterministic emission
    /// even though `tasks` is keyed by id; the ordering is not itself
    /// semantically significant, only its stability across runs.
    #[serde(default)]
    pub task_order: Vec<String>,

    #[serde(default)]
    pub edges: Vec<Edge>,

    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub requirements: EnvironmentSpecificValue<Vec<Requirement>>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub hints: EnvironmentSpecificValue<Vec<Requirement>>,
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_empty")]
    pub execution_model: EnvironmentSpecificValue<ExecutionModel>,

    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub provenance: Provenance,

    #[serde(default)]
    pub loss_map: Vec<LossEntry>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            label: None,
            documentation: Documentation::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            tasks: HashMap::new(),
            task_order: Vec::new(),
            edges: Vec::new(),
            requirements: EnvironmentSpecificValue::new(),
            hints: EnvironmentSpecificValue::new(),
            execution_model: EnvironmentSpecificValue::new(),
            metadata: Metadata::default(),
            provenance: Provenance::default(),
            loss_map: Vec::new(),
        }
    }

    pub fn add_task(&mut self, task: Task) {
        if !self.tasks.contains_key(&task.id) {
            self.task_order.push(task.id.clone());
        }
        self.tasks.insert(task.id.clone(), task);
    }

    pub fn add_edge(&mut self, parent: impl Into<String>, child: impl Into<String>) {
        let edge = Edge { parent: parent.into(), child: child.into() };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    /// Tasks in topological order, ties among simultaneously-ready tasks
    /// broken by task id so emission is deterministic across runs.
    /// `petgraph::algo::toposort` walks a DFS and does not give that
    /// guarantee, so this runs Kahn's algorithm by hand with a sorted
    /// ready set instead.
    pub fn topological_order(&self) -> Result<Vec<String>, String> {
        let mut in_degree: HashMap<&str, usize> = self.tasks.keys().map(|id| (id.as_str(), 0)).collect();
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            if self.tasks.contains_key(&edge.parent) && self.tasks.contains_key(&edge.child) {
                *in_degree.get_mut(edge.child.as_str()).unwrap() += 1;
                children.entry(edge.parent.as_str()).or_default().push(edge.child.as_str());
            }
        }

        let mut ready: std::collections::BTreeSet<&str> =
            in_degree.iter().filter(|(_, &d)| d == 0).map(|(&id, _)| id).collect();

        let mut order = Vec::with_capacity(self.tasks.len());
        while let Some(&id) = ready.iter().next() {
            ready.remove(id);
            order.push(id.to_string());
            if let Some(kids) = children.get(id) {
                for &child in kids {
                    let d = in_degree.get_mut(child).unwrap();
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(child);
                    }
                }
            }
        }

        if order.len() != self.tasks.len() {
            Err("workflow edges do not form a DAG (cycle detected)".into())
        } else {
            Ok(order)
        }
    }

    /// Structural and cross-field validation: dangling/self-loop edges,
    /// cycles, duplicate parameter ids, and out-of-range resource bounds.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut issues = Vec::new();

        for edge in &self.edges {
            if !self.tasks.contains_key(&edge.parent) {
                issues.push(format!("edge parent '{}' is not a known task", edge.parent));
            }
            if !self.tasks.contains_key(&edge.child) {
                issues.push(format!("edge child '{}' is not a known task", edge.child));
            }
            if edge.parent == edge.child {
                issues.push(format!("self-loop edge on task '{}'", edge.parent));
            }
        }

        if let Err(cycle_err) = self.topological_order() {
            issues.push(cycle_err);
        }

        let mut seen_params = std::collections::HashSet::new();
        for p in self.inputs.iter().chain(self.outputs.iter()) {
            if !seen_params.insert(p.id.clone()) {
                issues.push(format!("duplicate workflow parameter id '{}'", p.id));
            }
            if let Err(e) = p.type_spec.validate() {
                issues.push(format!("parameter '{}': {e}", p.id));
            }
        }

        for task in self.tasks.values() {
            let mut seen = std::collections::HashSet::new();
            for p in task.inputs.iter().chain(task.outputs.iter()) {
                if !seen.insert(p.id.clone()) {
                    issues.push(format!("task '{}': duplicate parameter id '{}'", task.id, p.id));
                }
                if let Err(e) = p.type_spec.validate() {
                    issues.push(format!("task '{}' parameter '{}': {e}", task.id, p.id));
                }
            }
            for (field, env_value) in [("cpu", &task.cpu)] {
                if let Some(v) = env_value.values.first() {
                    if v.value < 1 {
                        issues.push(format!("task '{}': {field} must be >= 1", task.id));
                    }
                }
            }
            for b in task.mem_mb.values.iter() {
                if b.value < 1 {
                    issues.push(format!("task '{}': mem_mb must be >= 1", task.id));
                }
            }
            for b in task.time_s.values.iter() {
                if b.value < 1 {
                    issues.push(format!("task '{}': time_s must be >= 1", task.id));
                }
            }
            for b in task.priority.values.iter() {
                if !(-1000..=1000).contains(&b.value) {
                    issues.push(format!("task '{}': priority must be within [-1000, 1000]", task.id));
                }
            }
            for b in task.gpu.values.iter() {
                if b.value < 0 {
                    issues.push(format!("task '{}': gpu must be >= 0", task.id));
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

// ============================================================================
// 10. RESOURCE PROFILES
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ResourceSpec {
    pub cpu: Option<i64>,
    pub mem_mb: Option<i64>,
    pub disk_mb: Option<i64>,
    pub gpu: Option<i64>,
    pub gpu_mem_mb: Option<i64>,
    pub time_s: Option<i64>,
    pub threads: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ResourceProfile {
    pub name: &'static str,
    pub description: &'static str,
    pub environment: Environment,
    pub priority: &'static str,
    pub resources: ResourceSpec,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cycles_as_invalid() {
        let mut wf = Workflow::new("cyclic", "1.0.0");
        wf.add_task(Task::new("a"));
        wf.add_task(Task::new("b"));
        wf.add_edge("a", "b");
        wf.add_edge("b", "a");
        assert!(wf.validate().is_err());
    }

    #[test]
    fn topological_order_breaks_ties_by_id() {
        let mut wf = Workflow::new("diamond", "1.0.0");
        for id in ["d", "c", "b", "a"] {
            wf.add_task(Task::new(id));
        }
        wf.add_edge("a", "b");
        wf.add_edge("a", "c");
        wf.add_edge("b", "d");
        wf.add_edge("c", "d");
        let order = wf.topological_order().unwrap();
        assert_eq!(order[0], "a");
        assert_eq!(order[3], "d");
    }

    #[test]
    fn rejects_edges_to_unknown_tasks() {
        let mut wf = Workflow::new("dangling", "1.0.0");
        wf.add_task(Task::new("a"));
        wf.add_edge("a", "ghost");
        let errs = wf.validate().unwrap_err();
        assert!(errs.iter().any(|e| e.contains("ghost")));
    }

    #[test]
    fn record_type_spec_requires_fields() {
        let empty_record = TypeSpec::Record { fields: HashMap::new() };
        assert!(empty_record.validate().is_err());
    }
}
