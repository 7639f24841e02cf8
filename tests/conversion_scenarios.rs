// tests/conversion_scenarios.rs
//
// End-to-end scenarios: Snakemake -> DAGMan conversion, CWL GPU/retry
// loss + reinjection, BCO validation, environment build dry-run
// idempotence, and shared -> distributed adaptation via the CLI-facing
// pieces.

use wf2wf::adapters::bco::BcoAdapter;
use wf2wf::adapters::cwl::CwlAdapter;
use wf2wf::adapters::dagman::DagmanAdapter;
use wf2wf::adapters::snakemake::SnakemakeAdapter;
use wf2wf::adaptation::{EnvironmentAdapter, SharedToDistributedAdapter};
use wf2wf::environ::RunConfig;
use wf2wf::ir::{Environment, SourceMethod};
use wf2wf::loss::LossTracker;
use wf2wf::orchestrate::export::ExportOrchestrator;
use wf2wf::orchestrate::import::ImportOrchestrator;
use wf2wf::orchestrate::{ExportAdapter, ExportOptions, ImportOptions};
use wf2wf::prompt::NonInteractivePrompter;

fn import(adapter: &dyn wf2wf::orchestrate::ImportAdapter, source: &str, env: Environment) -> wf2wf::ir::Workflow {
    let orchestrator = ImportOrchestrator::new(adapter);
    let mut prompter = NonInteractivePrompter;
    let options = ImportOptions { target_environment: env, interactive: false };
    orchestrator.run(source, &options, &mut prompter).expect("import should succeed")
}

#[test]
fn snakemake_to_dagman_minimal_conversion() {
    let source = "rule align:\n    input: \"reads.fq\"\n    output: \"aligned.bam\"\n    shell: \"bwa mem ref.fa reads.fq > aligned.bam\"\n    threads: 4\n";
    let snakemake = SnakemakeAdapter;
    let workflow = import(&snakemake, source, Environment::SharedFilesystem);
    assert_eq!(workflow.tasks.len(), 1);

    let dagman = DagmanAdapter;
    let mut tracker = LossTracker::new();
    let rendered = dagman.generate_output(&workflow, &mut tracker).unwrap();
    assert!(rendered.contains("JOB align align.sub"));

    let files = dagman.auxiliary_files(&workflow, &mut tracker).unwrap();
    let (_, sub) = files.iter().find(|(name, _)| name == "align.sub").unwrap();
    assert!(sub.contains("request_cpus = 4"));
}

#[test]
fn cwl_gpu_and_retry_loss_then_reinjection() {
    let source = r#"
cwlVersion: v1.2
class: Workflow
steps:
  call_variants:
    run:
      class: CommandLineTool
      baseCommand: ["gatk", "HaplotypeCaller"]
      requirements:
        - class: ResourceRequirement
          coresMin: 2
          ramMin: 8192
          gpuMin: 1
        - class: DockerRequirement
          dockerPull: biocontainers/gatk
    in: {}
    out: [vcf]
"#;
    let cwl = CwlAdapter;
    let mut workflow = import(&cwl, source, Environment::SharedFilesystem);
    workflow.tasks.get_mut("call_variants").unwrap().retry_count.set(
        3,
        Environment::SharedFilesystem,
        SourceMethod::Explicit,
    );

    // Export to Snakemake, which has no GPU/retry concept: both should be
    // recorded as loss entries.
    let snakemake = SnakemakeAdapter;
    let orchestrator = ExportOrchestrator::new(&snakemake);
    let options = ExportOptions { target_environment: Environment::SharedFilesystem, adapt_from: None };
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("pipeline.smk");
    let mut prompter = NonInteractivePrompter;
    let outcome = orchestrator
        .run(&workflow, &options, &out_path, "2026-01-01T00:00:00Z", None, &mut prompter)
        .unwrap();
    assert!(outcome.loss_entries_written > 0);

    let sidecar = wf2wf::loss::sidecar_path(&out_path);
    let doc = wf2wf::loss::read_sidecar(&sidecar).unwrap().expect("sidecar written");
    assert!(doc.entries.iter().any(|e| e.field == "gpu"));
}

#[test]
fn bco_round_trip_preserves_execution_model() {
    let mut workflow = wf2wf::ir::Workflow::new("demo_bco", "1.0.0");
    let mut task = wf2wf::ir::Task::new("step_one");
    task.command.set("echo hello".into(), Environment::CloudNative, SourceMethod::Explicit);
    workflow.add_task(task);
    workflow.execution_model.set(wf2wf::ir::ExecutionModel::Pipeline, Environment::CloudNative, SourceMethod::Explicit);

    let bco = BcoAdapter;
    let mut tracker = LossTracker::new();
    let rendered = bco.generate_output(&workflow, &mut tracker).unwrap();

    let issues = wf2wf::adapters::bco::validate_bco(&rendered).unwrap();
    assert!(issues.is_empty(), "generated BCO document should satisfy required domains: {issues:?}");

    let reimported = import(&bco, &rendered, Environment::CloudNative);
    assert_eq!(
        reimported.execution_model.get(Environment::CloudNative),
        Some(&wf2wf::ir::ExecutionModel::Pipeline)
    );
}

#[tokio::test]
async fn environment_build_dry_run_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig { cache_dir: dir.path().to_path_buf(), dry_run: true, ..Default::default() };
    let mut task = wf2wf::ir::Task::new("align");
    task.container.set("biocontainers/bwa".into(), Environment::SharedFilesystem, SourceMethod::Explicit);

    let (tag1, digest1) = wf2wf::environ::build_or_reuse(&task, Environment::SharedFilesystem, &config).await.unwrap();
    let (tag2, digest2) = wf2wf::environ::build_or_reuse(&task, Environment::SharedFilesystem, &config).await.unwrap();
    assert_eq!((tag1.clone(), digest1.clone()), (tag2, digest2));
    assert!(tag1.starts_with("wf2wf/env:"));
    assert!(digest1.starts_with("sha256:"));
}

#[test]
fn shared_to_distributed_adaptation_is_append_only() {
    let mut workflow = wf2wf::ir::Workflow::new("adapt_demo", "1.0.0");
    let mut task = wf2wf::ir::Task::new("transfer");
    task.mem_mb.set(2048, Environment::SharedFilesystem, SourceMethod::Explicit);
    task.disk_mb.set(4096, Environment::SharedFilesystem, SourceMethod::Explicit);
    workflow.add_task(task);

    let adapter = SharedToDistributedAdapter::default();
    let mut tracker = LossTracker::new();
    adapter.adapt_workflow(&mut workflow, &mut tracker);

    let task = &workflow.tasks["transfer"];
    assert_eq!(task.mem_mb.get(Environment::SharedFilesystem), Some(&2048));
    assert!(task.mem_mb.get(Environment::DistributedComputing).unwrap() > &2048);
    assert_eq!(task.staging_required.get(Environment::DistributedComputing), Some(&true));
    assert!(!tracker.is_empty());
}

#[test]
fn interactive_import_uses_scripted_prompt_answers() {
    use wf2wf::prompt::{Prompter, TestPrompter};

    let source = "rule noop:\n    input: \"a.txt\"\n    output: \"b.txt\"\n";
    let snakemake = SnakemakeAdapter;
    let orchestrator = ImportOrchestrator::new(&snakemake);
    let options = ImportOptions { target_environment: Environment::SharedFilesystem, interactive: true };
    let mut prompter: Box<dyn Prompter> = Box::new(TestPrompter::new(vec!["true".to_string()]));
    let workflow = orchestrator.run(source, &options, prompter.as_mut()).unwrap();
    assert!(workflow.tasks["noop"].command.get(Environment::SharedFilesystem).is_some());
}
