// src/ir/env_value.rs
//
// =============================================================================
// WF2WF: ENVIRONMENT-SPECIFIC VALUES
// =============================================================================
//
// The generic carrier for any field on Task/Workflow whose concrete value
// depends on the execution environment (shared_filesystem, distributed,
// cloud, hybrid, edge, local). A single field can hold one binding per
// environment plus an environment-independent default, so a workflow
// authored against one environment keeps its values when adapted to
// another instead of losing them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of execution environments a workflow can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    SharedFilesystem,
    DistributedComputing,
    CloudNative,
    Hybrid,
    Edge,
    Local,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Environment::SharedFilesystem => "shared_filesystem",
            Environment::DistributedComputing => "distributed_computing",
            Environment::CloudNative => "cloud_native",
            Environment::Hybrid => "hybrid",
            Environment::Edge => "edge",
            Environment::Local => "local",
        };
        f.write_str(s)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shared_filesystem" => Ok(Environment::SharedFilesystem),
            "distributed_computing" => Ok(Environment::DistributedComputing),
            "cloud_native" => Ok(Environment::CloudNative),
            "hybrid" => Ok(Environment::Hybrid),
            "edge" => Ok(Environment::Edge),
            "local" => Ok(Environment::Local),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// How a binding's value came to be set. Stored per-binding, not per-field,
/// since two bindings of the same field can have different provenance
/// (e.g. one explicit from the source file, one inferred for a new env).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMethod {
    Explicit,
    Inferred,
    Template,
    Default,
    Adapted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding<T> {
    pub value: T,
    pub environments: Vec<Environment>,
    pub source_method: SourceMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// A field whose value depends on the execution environment.
///
/// Invariant: bindings are independent; looking up an environment that no
/// binding mentions returns `None`, never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSpecificValue<T> {
    #[serde(default = "Vec::new")]
    pub values: Vec<Binding<T>>,
}

impl<T> Default for EnvironmentSpecificValue<T> {
    fn default() -> Self {
        Self { values: Vec::new() }
    }
}

impl<T: Clone + PartialEq> EnvironmentSpecificValue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: T, env: Environment, source_method: SourceMethod) -> Self {
        let mut esv = Self::new();
        esv.set(value, env, source_method);
        esv
    }

    /// Upsert a binding for `env`. Idempotent if `(value, env)` already
    /// present. If `env` is already bound to a different value, that
    /// binding's environment list loses `env` (a single environment can
    /// only resolve to one current value) and a fresh binding is appended.
    pub fn set(&mut self, value: T, env: Environment, source_method: SourceMethod) {
        if let Some(existing) = self.values.iter().find(|b| b.value == value && b.environments.contains(&env)) {
            let _ = existing;
            return;
        }
        for b in self.values.iter_mut() {
            b.environments.retain(|e| *e != env);
        }
        self.values.retain(|b| !b.environments.is_empty());
        self.values.push(Binding {
            value,
            environments: vec![env],
            source_method,
            confidence: None,
        });
    }

    /// First binding whose environments contains `env`, else `None`.
    pub fn get(&self, env: Environment) -> Option<&T> {
        self.values.iter().find(|b| b.environments.contains(&env)).map(|b| &b.value)
    }

    pub fn get_with_default<'a>(&'a self, env: Environment, default: &'a T) -> &'a T {
        self.get(env).unwrap_or(default)
    }

    pub fn source_method_for(&self, env: Environment) -> Option<SourceMethod> {
        self.values.iter().find(|b| b.environments.contains(&env)).map(|b| b.source_method)
    }

    /// Union of binding environments, sorted+deduped for determinism.
    pub fn all_environments(&self) -> Vec<Environment> {
        let mut envs: Vec<Environment> = self.values.iter().flat_map(|b| b.environments.iter().copied()).collect();
        envs.sort();
        envs.dedup();
        envs
    }

    /// Append a binding for `target_env` derived from `source_env` via
    /// `strategy`, tagged `source_method = Adapted`. Never removes or
    /// mutates pre-existing bindings — adaptation is append-only.
    pub fn adapt<F>(&mut self, source_env: Environment, target_env: Environment, strategy: F)
    where
        F: FnOnce(&T) -> T,
    {
        let Some(source_value) = self.get(source_env).cloned() else {
            return;
        };
        let adapted = strategy(&source_value);
        self.values.push(Binding {
            value: adapted,
            environments: vec![target_env],
            source_method: SourceMethod::Adapted,
            confidence: None,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_none_for_unknown_environment() {
        let esv: EnvironmentSpecificValue<i64> = EnvironmentSpecificValue::new();
        assert_eq!(esv.get(Environment::Edge), None);
    }

    #[test]
    fn set_is_idempotent_for_same_value_and_env() {
        let mut esv = EnvironmentSpecificValue::new();
        esv.set(4, Environment::SharedFilesystem, SourceMethod::Explicit);
        esv.set(4, Environment::SharedFilesystem, SourceMethod::Explicit);
        assert_eq!(esv.values.len(), 1);
    }

    #[test]
    fn adapt_preserves_source_bindings() {
        let mut esv = EnvironmentSpecificValue::new();
        esv.set(4096, Environment::SharedFilesystem, SourceMethod::Explicit);
        esv.adapt(Environment::SharedFilesystem, Environment::DistributedComputing, |v| v * 2);
        assert_eq!(esv.get(Environment::SharedFilesystem), Some(&4096));
        assert_eq!(esv.get(Environment::DistributedComputing), Some(&8192));
        assert_eq!(esv.values.len(), 2);
    }

    #[test]
    fn all_environments_is_sorted_and_deduped() {
        let mut esv = EnvironmentSpecificValue::new();
        esv.set(1, Environment::Edge, SourceMethod::Default);
        esv.set(2, Environment::Local, SourceMethod::Default);
        assert_eq!(esv.all_environments(), vec![Environment::Edge, Environment::Local]);
    }

    #[test]
    fn environment_round_trips_through_display_and_fromstr() {
        for env in [
            Environment::SharedFilesystem,
            Environment::DistributedComputing,
            Environment::CloudNative,
            Environment::Hybrid,
            Environment::Edge,
            Environment::Local,
        ] {
            let s = env.to_string();
            assert_eq!(s.parse::<Environment>().unwrap(), env);
        }
    }
}
