// src/inference.rs
//
// =============================================================================
// WF2WF: INFERENCE ENGINE
// =============================================================================
//
// Fills in resource/environment fields an import couldn't find explicitly
// stated, in priority order: command-pattern heuristics, file-extension
// heuristics, environment-derived defaults, execution-model derivation.
// Never overwrites an explicit/adapted binding; every value it sets is
// tagged `source_method = Inferred`.
//
// cpu, mem_mb, and gpu are independent rule chains over the command
// string, each evaluated first-match-wins on its own list of tool
// keywords — a tool that matches the cpu chain's "aligner" bucket and the
// mem chain's "assembler" bucket gets both values independently, rather
// than one merged per-tool rule short-circuiting the rest.

use crate::ir::{Environment, ExecutionModel, SourceMethod, Task, Workflow};
use regex::Regex;

struct ValueRule {
    pattern: &'static str,
    value: i64,
}

fn compile_rules(specs: &[(&'static str, i64)]) -> Vec<(Regex, ValueRule)> {
    specs
        .iter()
        .map(|(p, v)| (Regex::new(p).expect("static inference regex must compile"), ValueRule { pattern: p, value: *v }))
        .collect()
}

fn cpu_rules() -> Vec<(Regex, ValueRule)> {
    compile_rules(&[
        (r"(?i)(bwa|bowtie|star|hisat2|salmon|kallisto)", 4),
        (r"(?i)(samtools|bcftools|bedtools|awk|sed|grep)", 1),
        (r"(?i)(gatk|freebayes|mutect|varscan)", 2),
        (r"(?i)(fastqc|multiqc|qualimap)", 1),
        (r"(?i)(rscript|python|perl|bash)", 1),
    ])
}

fn mem_rules() -> Vec<(Regex, ValueRule)> {
    compile_rules(&[
        (r"(?i)(gatk|freebayes|mutect|varscan)", 8192),
        (r"(?i)(star|hisat2|salmon|kallisto)", 4096),
        (r"(?i)(bwa|bowtie|samtools|bcftools)", 2048),
        (r"(?i)(fastqc|multiqc|qualimap)", 1024),
    ])
}

fn gpu_rule() -> (Regex, i64, i64) {
    (Regex::new(r"(?i)(gpu|cuda|tensorflow|pytorch|nvidia)").expect("static inference regex must compile"), 1, 4096)
}

struct ExtensionRule {
    extensions: &'static [&'static str],
    disk_mb: i64,
}

fn extension_rules() -> Vec<ExtensionRule> {
    vec![
        ExtensionRule { extensions: &["bam", "sam", "cram", "vcf", "fastq", "fq", "fasta", "fa"], disk_mb: 4096 },
        ExtensionRule { extensions: &["txt", "csv", "tsv", "json", "yaml", "yml"], disk_mb: 1024 },
    ]
}

/// Runs the full inference pipeline over every task in `workflow` for
/// `env`, setting only fields with no existing binding for that
/// environment.
pub fn infer_workflow(workflow: &mut Workflow, env: Environment) {
    let mut ids: Vec<String> = workflow.tasks.keys().cloned().collect();
    ids.sort();
    for id in ids {
        if let Some(task) = workflow.tasks.get_mut(&id) {
            infer_task(task, env);
        }
    }
    infer_execution_model(workflow, env);
}

pub fn infer_task(task: &mut Task, env: Environment) {
    infer_from_command(task, env);
    infer_from_extensions(task, env);
    infer_defaults(task, env);
}

fn infer_from_command(task: &mut Task, env: Environment) {
    let Some(command) = task.command.get(env).cloned() else { return };

    for (re, rule) in cpu_rules() {
        if re.is_match(&command) {
            set_if_absent(&mut task.cpu, rule.value, env);
            log::debug!("task '{}': inferred cpu from command pattern {}", task.id, rule.pattern);
            break;
        }
    }
    for (re, rule) in mem_rules() {
        if re.is_match(&command) {
            set_if_absent(&mut task.mem_mb, rule.value, env);
            log::debug!("task '{}': inferred mem_mb from command pattern {}", task.id, rule.pattern);
            break;
        }
    }
    let (gpu_re, gpu, gpu_mem_mb) = gpu_rule();
    if gpu_re.is_match(&command) {
        set_if_absent(&mut task.gpu, gpu, env);
        set_if_absent(&mut task.gpu_mem_mb, gpu_mem_mb, env);
        log::debug!("task '{}': inferred gpu from command", task.id);
    }
}

fn infer_from_extensions(task: &mut Task, env: Environment) {
    if task.disk_mb.get(env).is_some() {
        return;
    }
    let names: Vec<String> = task
        .inputs
        .iter()
        .chain(task.outputs.iter())
        .filter_map(|p| p.default.as_ref().and_then(|v| v.as_str()).map(str::to_string))
        .collect();
    for rule in extension_rules() {
        let matched = names.iter().any(|n| {
            rule.extensions.iter().any(|ext| n.to_lowercase().ends_with(&format!(".{ext}")))
        });
        if matched {
            set_if_absent(&mut task.disk_mb, rule.disk_mb, env);
            return;
        }
    }
}

/// Environment-derived defaults: conservative baseline when nothing else
/// fired, scaled by what the target environment typically affords.
fn infer_defaults(task: &mut Task, env: Environment) {
    set_if_absent(&mut task.cpu, 1, env);
    let default_mem = match env {
        Environment::DistributedComputing | Environment::CloudNative => 2048,
        Environment::Edge => 512,
        _ => 1024,
    };
    set_if_absent(&mut task.mem_mb, default_mem, env);
    set_if_absent(&mut task.time_s, 3600, env);
}

fn set_if_absent(esv: &mut crate::ir::EnvironmentSpecificValue<i64>, value: i64, env: Environment) {
    if esv.get(env).is_none() {
        esv.set(value, env, SourceMethod::Inferred);
    }
}

fn infer_execution_model(workflow: &mut Workflow, env: Environment) {
    if workflow.execution_model.get(env).is_some() {
        return;
    }
    let model = if workflow.edges.is_empty() && workflow.tasks.len() <= 1 {
        ExecutionModel::Sequential
    } else if workflow.tasks.values().all(|t| t.scatter.get(env).is_some()) && !workflow.tasks.is_empty() {
        ExecutionModel::Parallel
    } else {
        ExecutionModel::Pipeline
    };
    workflow.execution_model.set(model, env, SourceMethod::Inferred);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Environment, Task, Workflow};

    #[test]
    fn infers_aligner_resources_from_command() {
        let mut task = Task::new("align");
        task.command.set("bwa mem ref.fa reads.fq".into(), Environment::SharedFilesystem, SourceMethod::Explicit);
        infer_task(&mut task, Environment::SharedFilesystem);
        assert_eq!(task.cpu.get(Environment::SharedFilesystem), Some(&4));
        assert_eq!(task.mem_mb.get(Environment::SharedFilesystem), Some(&2048));
    }

    #[test]
    fn never_overwrites_explicit_cpu() {
        let mut task = Task::new("align");
        task.command.set("bwa mem ref.fa reads.fq".into(), Environment::SharedFilesystem, SourceMethod::Explicit);
        task.cpu.set(16, Environment::SharedFilesystem, SourceMethod::Explicit);
        infer_task(&mut task, Environment::SharedFilesystem);
        assert_eq!(task.cpu.get(Environment::SharedFilesystem), Some(&16));
    }

    #[test]
    fn falls_back_to_environment_derived_defaults() {
        let mut task = Task::new("noop");
        infer_task(&mut task, Environment::CloudNative);
        assert_eq!(task.cpu.get(Environment::CloudNative), Some(&1));
        assert_eq!(task.mem_mb.get(Environment::CloudNative), Some(&2048));
    }

    #[test]
    fn single_task_workflow_infers_sequential_execution_model() {
        let mut wf = Workflow::new("single", "1.0.0");
        wf.add_task(Task::new("only"));
        infer_workflow(&mut wf, Environment::SharedFilesystem);
        assert_eq!(
            wf.execution_model.get(Environment::SharedFilesystem),
            Some(&ExecutionModel::Sequential)
        );
    }
}
