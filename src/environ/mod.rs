// src/environ/mod.rs
//
// =============================================================================
// WF2WF: ENVIRONMENT / CONTAINER MANAGER
// =============================================================================
//
// Turns a task's conda/container requirement into something runnable:
// detects what's already specified, infers a reasonable default when
// nothing is, and (re)builds or reuses a cached image via external tools
// (conda-lock, micromamba, a container builder, syft, apptainer). All
// subprocess calls go through `run_with_timeout` so every external tool
// invocation gets the same timeout and missing-tool fallback behavior.

pub mod cache;

use crate::ir::Task;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

pub use cache::{Cache, CacheEntry};

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub cache_dir: PathBuf,
    pub dry_run: bool,
    pub require_tools: bool,
    pub subprocess_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            cache_dir: std::env::temp_dir().join("wf2wf-cache"),
            dry_run: false,
            require_tools: false,
            subprocess_timeout: Duration::from_secs(300),
        }
    }
}

impl RunConfig {
    /// Reads `WF2WF_CACHE_DIR`, `WF2WF_ENVIRON_DRYRUN`, `WF2WF_NO_PROMPT`
    /// over the given defaults. `no_prompt` is surfaced for callers that
    /// build a `prompt::Prompter`; this struct only stores the two fields
    /// the environment manager itself cares about.
    pub fn from_env(mut self) -> Self {
        if let Ok(dir) = std::env::var("WF2WF_CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Ok(flag) = std::env::var("WF2WF_ENVIRON_DRYRUN") {
            self.dry_run = flag == "1" || flag.eq_ignore_ascii_case("true");
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct DetectedEnvironment {
    pub conda: Option<String>,
    pub container: Option<String>,
}

/// Reads whatever the task already states explicitly; does not guess.
pub fn detect(task: &Task, env: crate::ir::Environment) -> DetectedEnvironment {
    DetectedEnvironment {
        conda: task.conda.get(env).cloned(),
        container: task.container.get(env).cloned(),
    }
}

/// Command -> image / conda-channel heuristics (pinned defaults, see
/// DESIGN.md). Only fires when neither conda nor container is set.
pub fn infer_missing(task: &mut Task, env: crate::ir::Environment) {
    if task.conda.get(env).is_some() || task.container.get(env).is_some() {
        return;
    }
    let Some(command) = task.command.get(env).cloned() else { return };
    let image = infer_image_for_command(&command);
    task.container.set(image, env, crate::ir::SourceMethod::Inferred);
}

fn infer_image_for_command(command: &str) -> String {
    let lower = command.to_lowercase();
    let bio_tools = ["blast", "bwa", "samtools", "bcftools", "gatk"];
    if let Some(tool) = bio_tools.iter().find(|t| lower.contains(*t)) {
        return format!("biocontainers/{tool}");
    }
    if lower.starts_with("python") || lower.contains(" python") {
        return "python:3.11".to_string();
    }
    if lower.starts_with("rscript") || lower.starts_with("r ") || lower.contains(" r ") {
        return "rocker/r-ver:4.3.0".to_string();
    }
    "ubuntu:22.04".to_string()
}

/// Digest used as the cache key: stable hash of the fields that determine
/// what gets built (conda spec, container base, command).
pub fn build_digest(task: &Task, env: crate::ir::Environment) -> String {
    let mut hasher = Sha256::new();
    hasher.update(task.conda.get(env).map(String::as_str).unwrap_or("").as_bytes());
    hasher.update(b"|");
    hasher.update(task.container.get(env).map(String::as_str).unwrap_or("").as_bytes());
    hasher.update(b"|");
    hasher.update(task.command.get(env).map(String::as_str).unwrap_or("").as_bytes());
    hex::encode(hasher.finalize())
}

/// Builds (or reuses a cached) environment for `task`, returning
/// `(tag, digest)`: `tag` is a human-addressable `wf2wf/env:<digest>`
/// reference, `digest` is the content-addressed `sha256:<hex>` build
/// digest it was built from. Falls back to a deterministic dry-run tuple
/// (derived purely from the digest, so repeated dry runs are idempotent
/// without touching the cache) when `config.dry_run` is set.
pub async fn build_or_reuse(task: &Task, env: crate::ir::Environment, config: &RunConfig) -> Result<(String, String)> {
    let digest_hex = build_digest(task, env);
    let tag = format!("wf2wf/env:{digest_hex}");
    let digest = format!("sha256:{digest_hex}");

    let cache = Cache::open(&config.cache_dir)?;
    if let Some(entry) = cache.lookup(&digest_hex).await {
        log::info!("reusing cached environment for task (digest {digest}): {}", entry.image_reference);
        return Ok((entry.tag, format!("sha256:{}", entry.digest)));
    }

    if config.dry_run {
        log::info!("dry run: would build environment for digest {digest}");
        return Ok((tag, digest));
    }

    let image = match task.container.get(env) {
        Some(image) => pull_or_build_image(image, config).await?,
        None => match task.conda.get(env) {
            Some(spec) => build_conda_env(spec, config).await?,
            None => anyhow::bail!("task '{}' has no conda or container environment to build", task.id),
        },
    };

    cache
        .insert(CacheEntry {
            digest: digest_hex.clone(),
            tag: tag.clone(),
            image_reference: image,
            built_at_unix: 0,
            sbom_path: None,
            sif_path: None,
        })
        .await?;
    Ok((tag, digest))
}

async fn run_with_timeout(mut command: Command, config: &RunConfig, operation: &str) -> Result<std::process::Output> {
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    let fut = command.output();
    match timeout(config.subprocess_timeout, fut).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(e).with_context(|| format!("spawning process for {operation}")),
        Err(_) => anyhow::bail!(
            "operation '{operation}' timed out after {}s",
            config.subprocess_timeout.as_secs()
        ),
    }
}

async fn pull_or_build_image(image: &str, config: &RunConfig) -> Result<String> {
    let mut cmd = Command::new("docker");
    cmd.args(["image", "inspect", image]);
    match run_with_timeout(cmd, config, "docker image inspect").await {
        Ok(output) if output.status.success() => Ok(image.to_string()),
        _ if config.require_tools => anyhow::bail!("docker unavailable or image '{image}' not present"),
        _ => {
            log::warn!("docker unavailable; returning unverified image reference '{image}'");
            Ok(image.to_string())
        }
    }
}

async fn build_conda_env(spec: &str, config: &RunConfig) -> Result<String> {
    let mut cmd = Command::new("micromamba");
    cmd.args(["create", "-n", "wf2wf-env", "-f", spec, "--yes"]);
    match run_with_timeout(cmd, config, "micromamba create").await {
        Ok(output) if output.status.success() => Ok(format!("conda:wf2wf-env:{spec}")),
        _ if config.require_tools => anyhow::bail!("micromamba unavailable or environment spec '{spec}' invalid"),
        _ => {
            log::warn!("micromamba unavailable; returning unverified conda reference for '{spec}'");
            Ok(format!("conda:wf2wf-env:{spec}"))
        }
    }
}

/// Generates a software bill of materials via `syft`, or writes a minimal
/// stub document when the tool is missing (never fails the conversion over
/// a missing SBOM tool unless `require_tools`).
pub async fn generate_sbom(image: &str, out_path: &std::path::Path, config: &RunConfig) -> Result<PathBuf> {
    if config.dry_run {
        return Ok(out_path.to_path_buf());
    }
    let mut cmd = Command::new("syft");
    cmd.args([image, "-o", "json"]);
    match run_with_timeout(cmd, config, "syft").await {
        Ok(output) if output.status.success() => {
            tokio::fs::write(out_path, &output.stdout).await.context("writing sbom output")?;
        }
        _ if config.require_tools => anyhow::bail!("syft unavailable for image '{image}'"),
        _ => {
            let stub = serde_json::json!({ "image": image, "components": [], "generator": "stub" });
            tokio::fs::write(out_path, serde_json::to_vec_pretty(&stub)?).await.context("writing stub sbom")?;
        }
    }
    Ok(out_path.to_path_buf())
}

/// Converts an OCI/docker image reference into an Apptainer `.sif` via the
/// `apptainer` CLI, or a dry-run placeholder path.
pub async fn convert_to_sif(image: &str, out_path: &std::path::Path, config: &RunConfig) -> Result<PathBuf> {
    if config.dry_run {
        return Ok(out_path.to_path_buf());
    }
    let mut cmd = Command::new("apptainer");
    cmd.args(["build", &out_path.to_string_lossy(), &format!("docker://{image}")]);
    match run_with_timeout(cmd, config, "apptainer build").await {
        Ok(output) if output.status.success() => Ok(out_path.to_path_buf()),
        _ if config.require_tools => anyhow::bail!("apptainer unavailable for image '{image}'"),
        _ => {
            log::warn!("apptainer unavailable; skipping SIF conversion for '{image}'");
            Ok(out_path.to_path_buf())
        }
    }
}

pub async fn prune_cache(config: &RunConfig, max_age_secs: u64) -> Result<usize> {
    let cache = Cache::open(&config.cache_dir)?;
    cache.prune_older_than(max_age_secs).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Environment, SourceMethod, Task};

    #[test]
    fn infers_bioinformatics_image_from_command() {
        let mut task = Task::new("align");
        task.command.set("bwa mem ref.fa reads.fq".into(), Environment::SharedFilesystem, SourceMethod::Explicit);
        infer_missing(&mut task, Environment::SharedFilesystem);
        assert_eq!(task.container.get(Environment::SharedFilesystem), Some(&"biocontainers/bwa".to_string()));
    }

    #[test]
    fn falls_back_to_ubuntu_for_unknown_command() {
        let mut task = Task::new("misc");
        task.command.set("do-something-custom".into(), Environment::SharedFilesystem, SourceMethod::Explicit);
        infer_missing(&mut task, Environment::SharedFilesystem);
        assert_eq!(task.container.get(Environment::SharedFilesystem), Some(&"ubuntu:22.04".to_string()));
    }

    #[test]
    fn does_not_override_explicit_container() {
        let mut task = Task::new("align");
        task.container.set("my/custom:1.0".into(), Environment::SharedFilesystem, SourceMethod::Explicit);
        task.command.set("bwa mem".into(), Environment::SharedFilesystem, SourceMethod::Explicit);
        infer_missing(&mut task, Environment::SharedFilesystem);
        assert_eq!(task.container.get(Environment::SharedFilesystem), Some(&"my/custom:1.0".to_string()));
    }

    #[tokio::test]
    async fn dry_run_build_returns_placeholder_without_spawning_tools() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig { cache_dir: dir.path().to_path_buf(), dry_run: true, ..Default::default() };
        let task = Task::new("align");
        let (tag, digest) = build_or_reuse(&task, Environment::SharedFilesystem, &config).await.unwrap();
        assert!(tag.starts_with("wf2wf/env:"));
        assert!(digest.starts_with("sha256:"));
    }
}
