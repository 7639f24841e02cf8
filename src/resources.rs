// src/resources.rs
//
// =============================================================================
// WF2WF: RESOURCE PARSING & PROFILES
// =============================================================================
//
// Memory/time string normalization (the units every format adapter
// encounters: "4GB", "1h") and the built-in resource profiles a task can
// be tagged with. Cross-field validation (cpu/mem/gpu/time/priority
// bounds) lives on `Workflow::validate`, which operates on the
// per-environment bindings directly instead of a flattened snapshot.

use crate::ir::{Environment, ResourceProfile, ResourceSpec};
use anyhow::{bail, Result};

/// Parses a human memory size string into whole megabytes. Accepts plain
/// integers (assumed MB), and "B"/"KB"/"MB"/"GB"/"TB" suffixes
/// (case-insensitive, optional space). Rejects "PB" and anything it can't
/// parse, matching the original's conservative unit set.
pub fn normalize_memory(spec: &str) -> Result<i64> {
    let spec = spec.trim();
    if let Ok(n) = spec.parse::<i64>() {
        return Ok(n);
    }
    let lower = spec.to_lowercase();
    let (number_part, unit) = split_number_and_unit(&lower)?;
    let n: f64 = number_part.parse().map_err(|_| anyhow::anyhow!("invalid memory value '{spec}'"))?;
    let mb = match unit.as_str() {
        "b" => n / (1024.0 * 1024.0),
        "kb" => n / 1024.0,
        "mb" => n,
        "gb" => n * 1024.0,
        "tb" => n * 1024.0 * 1024.0,
        other => bail!("unsupported memory unit '{other}' in '{spec}'"),
    };
    Ok(mb.round() as i64)
}

/// Parses a human duration string into whole seconds. Accepts plain
/// integers (assumed seconds), and "s"/"m"/"h"/"d" suffixes. Rejects "w"
/// (weeks) and anything else, matching the original's conservative unit set.
pub fn normalize_time(spec: &str) -> Result<i64> {
    let spec = spec.trim();
    if let Ok(n) = spec.parse::<i64>() {
        return Ok(n);
    }
    let lower = spec.to_lowercase();
    let (number_part, unit) = split_number_and_unit(&lower)?;
    let n: f64 = number_part.parse().map_err(|_| anyhow::anyhow!("invalid time value '{spec}'"))?;
    let seconds = match unit.as_str() {
        "s" => n,
        "m" => n * 60.0,
        "h" => n * 3600.0,
        "d" => n * 86400.0,
        other => bail!("unsupported time unit '{other}' in '{spec}'"),
    };
    Ok(seconds.round() as i64)
}

fn split_number_and_unit(spec: &str) -> Result<(String, String)> {
    let split_at = spec.find(|c: char| c.is_alphabetic()).ok_or_else(|| anyhow::anyhow!("no unit found in '{spec}'"))?;
    let (number_part, unit) = spec.split_at(split_at);
    Ok((number_part.trim().to_string(), unit.trim().to_string()))
}

/// The seven built-in resource profiles, with fixed resource numbers so
/// `suggest_resource_profile` is deterministic across runs.
pub fn default_profiles() -> Vec<ResourceProfile> {
    vec![
        ResourceProfile {
            name: "shared",
            description: "Conservative defaults for a shared POSIX filesystem cluster",
            environment: Environment::SharedFilesystem,
            priority: "normal",
            resources: ResourceSpec { cpu: Some(1), mem_mb: Some(1024), disk_mb: Some(1024), gpu: None, gpu_mem_mb: None, time_s: Some(3600), threads: Some(1) },
        },
        ResourceProfile {
            name: "cluster",
            description: "HTCondor/Slurm batch job with modest headroom for staging",
            environment: Environment::DistributedComputing,
            priority: "normal",
            resources: ResourceSpec { cpu: Some(2), mem_mb: Some(2048), disk_mb: Some(4096), gpu: None, gpu_mem_mb: None, time_s: Some(7200), threads: Some(2) },
        },
        ResourceProfile {
            name: "cloud",
            description: "Cloud-native containerized execution",
            environment: Environment::CloudNative,
            priority: "normal",
            resources: ResourceSpec { cpu: Some(2), mem_mb: Some(4096), disk_mb: Some(8192), gpu: None, gpu_mem_mb: None, time_s: Some(7200), threads: Some(2) },
        },
        ResourceProfile {
            name: "hpc",
            description: "Large shared-memory HPC node allocation",
            environment: Environment::SharedFilesystem,
            priority: "high",
            resources: ResourceSpec { cpu: Some(16), mem_mb: Some(32768), disk_mb: Some(16384), gpu: None, gpu_mem_mb: None, time_s: Some(86400), threads: Some(16) },
        },
        ResourceProfile {
            name: "gpu",
            description: "Single-GPU ML/bioinformatics workload",
            environment: Environment::CloudNative,
            priority: "high",
            resources: ResourceSpec { cpu: Some(4), mem_mb: Some(16384), disk_mb: Some(16384), gpu: Some(1), gpu_mem_mb: Some(16384), time_s: Some(14400), threads: Some(4) },
        },
        ResourceProfile {
            name: "memory_intensive",
            description: "Variant calling / assembly workloads with large RAM footprints",
            environment: Environment::SharedFilesystem,
            priority: "high",
            resources: ResourceSpec { cpu: Some(4), mem_mb: Some(65536), disk_mb: Some(16384), gpu: None, gpu_mem_mb: None, time_s: Some(28800), threads: Some(4) },
        },
        ResourceProfile {
            name: "io_intensive",
            description: "Bulk file transfer / format conversion with large scratch disk",
            environment: Environment::DistributedComputing,
            priority: "normal",
            resources: ResourceSpec { cpu: Some(2), mem_mb: Some(4096), disk_mb: Some(65536), gpu: None, gpu_mem_mb: None, time_s: Some(10800), threads: Some(2) },
        },
    ]
}

/// Suggests the closest built-in profile for an observed resource shape,
/// preferring a GPU profile whenever `gpu` is requested, then ranking the
/// rest by absolute distance in mem_mb.
pub fn suggest_resource_profile(observed: &ResourceSpec) -> ResourceProfile {
    let profiles = default_profiles();
    if observed.gpu.unwrap_or(0) > 0 {
        return profiles.into_iter().find(|p| p.name == "gpu").expect("gpu profile always present");
    }
    let target_mem = observed.mem_mb.unwrap_or(1024);
    profiles
        .into_iter()
        .min_by_key(|p| (p.resources.mem_mb.unwrap_or(0) - target_mem).abs())
        .expect("default_profiles is never empty")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_memory_units() {
        assert_eq!(normalize_memory("1GB").unwrap(), 1024);
        assert_eq!(normalize_memory("512MB").unwrap(), 512);
        assert_eq!(normalize_memory("1024KB").unwrap(), 1);
        assert_eq!(normalize_memory("1TB").unwrap(), 1048576);
    }

    #[test]
    fn rejects_petabyte_memory() {
        assert!(normalize_memory("1PB").is_err());
    }

    #[test]
    fn normalizes_time_units() {
        assert_eq!(normalize_time("1h").unwrap(), 3600);
        assert_eq!(normalize_time("30m").unwrap(), 1800);
        assert_eq!(normalize_time("45s").unwrap(), 45);
    }

    #[test]
    fn rejects_week_duration() {
        assert!(normalize_time("1w").is_err());
    }

    #[test]
    fn suggest_resource_profile_prefers_gpu_when_requested() {
        let spec = ResourceSpec { cpu: Some(4), mem_mb: Some(8192), disk_mb: None, gpu: Some(1), gpu_mem_mb: None, time_s: None, threads: None };
        assert_eq!(suggest_resource_profile(&spec).name, "gpu");
    }
}
