// src/cli.rs
//
// =============================================================================
// WF2WF: COMMAND-LINE INTERFACE
// =============================================================================
//
// `clap` derive CLI (`#[derive(Parser)] struct Cli`,
// `#[derive(Subcommand)] enum Command`). Flags plus three environment
// variables (`WF2WF_CACHE_DIR`, `WF2WF_ENVIRON_DRYRUN`, `WF2WF_NO_PROMPT`)
// assemble into `RunConfig`.

use crate::adapters::{bco, Format};
use crate::error::Wf2WfError;
use crate::ir::{codec, Environment};
use crate::orchestrate::export::ExportOrchestrator;
use crate::orchestrate::import::ImportOrchestrator;
use crate::orchestrate::{ExportAdapter, ExportOptions, ImportAdapter, ImportOptions};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Parser)]
#[command(name = "wf2wf", version, about = "Convert scientific workflow descriptions between languages via a shared IR")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Suppress interactive prompts (also set by WF2WF_NO_PROMPT=1).
    #[arg(long, global = true)]
    pub no_prompt: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert a workflow from one format to another.
    Convert {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long, default_value = "shared_filesystem")]
        target_env: String,
        #[arg(long)]
        adapt_from: Option<String>,
    },
    /// Validate a workflow file against the IR's structural rules.
    Validate {
        input: PathBuf,
        #[arg(long)]
        format: Option<String>,
    },
    /// Print a summary of a workflow's tasks, edges, and environments.
    Info {
        input: PathBuf,
        #[arg(long)]
        format: Option<String>,
    },
    /// IEEE 2791 BioCompute Object operations.
    Bco {
        #[command(subcommand)]
        action: BcoAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum BcoAction {
    /// Sign a BCO document with the given private key, writing a
    /// detached signature and an in-toto attestation alongside it and
    /// recording the event in the document's `extension_domain`.
    Sign {
        input: PathBuf,
        #[arg(long)]
        key: PathBuf,
    },
    /// Report which top-level domains differ between two BCO documents.
    Diff { left: PathBuf, right: PathBuf },
    /// Check that all IEEE-2791-required domains are present.
    Validate { input: PathBuf },
}

fn format_for(path: &std::path::Path, explicit: Option<&str>) -> Result<Format, Wf2WfError> {
    if let Some(name) = explicit {
        return format_from_name(name);
    }
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    Format::from_extension(ext).ok_or_else(|| Wf2WfError::Usage(format!("cannot determine format from extension '{ext}'; pass --from/--to")))
}

fn format_from_name(name: &str) -> Result<Format, Wf2WfError> {
    match name.to_lowercase().as_str() {
        "snakemake" => Ok(Format::Snakemake),
        "dagman" => Ok(Format::Dagman),
        "nextflow" => Ok(Format::Nextflow),
        "cwl" => Ok(Format::Cwl),
        "wdl" => Ok(Format::Wdl),
        "galaxy" => Ok(Format::Galaxy),
        "bco" => Ok(Format::Bco),
        other => Err(Wf2WfError::Usage(format!("unknown format '{other}'"))),
    }
}

fn import_adapter(format: Format) -> Box<dyn ImportAdapter> {
    match format {
        Format::Snakemake => Box::new(crate::adapters::snakemake::SnakemakeAdapter),
        Format::Dagman => Box::new(crate::adapters::dagman::DagmanAdapter),
        Format::Nextflow => Box::new(crate::adapters::nextflow::NextflowAdapter),
        Format::Cwl => Box::new(crate::adapters::cwl::CwlAdapter),
        Format::Wdl => Box::new(crate::adapters::wdl::WdlAdapter),
        Format::Galaxy => Box::new(crate::adapters::galaxy::GalaxyAdapter),
        Format::Bco => Box::new(crate::adapters::bco::BcoAdapter),
    }
}

fn export_adapter(format: Format) -> Box<dyn ExportAdapter> {
    match format {
        Format::Snakemake => Box::new(crate::adapters::snakemake::SnakemakeAdapter),
        Format::Dagman => Box::new(crate::adapters::dagman::DagmanAdapter),
        Format::Nextflow => Box::new(crate::adapters::nextflow::NextflowAdapter),
        Format::Cwl => Box::new(crate::adapters::cwl::CwlAdapter),
        Format::Wdl => Box::new(crate::adapters::wdl::WdlAdapter),
        Format::Galaxy => Box::new(crate::adapters::galaxy::GalaxyAdapter),
        Format::Bco => Box::new(crate::adapters::bco::BcoAdapter),
    }
}

fn adaptation_strategy(from: Environment, to: Environment) -> Option<Box<dyn crate::adaptation::EnvironmentAdapter>> {
    match (from, to) {
        (Environment::SharedFilesystem, Environment::DistributedComputing) => {
            Some(Box::new(crate::adaptation::SharedToDistributedAdapter::default()))
        }
        _ => None,
    }
}

pub fn run(cli: Cli) -> Result<(), Wf2WfError> {
    let no_prompt = cli.no_prompt || std::env::var("WF2WF_NO_PROMPT").map(|v| v == "1").unwrap_or(false);

    match cli.command {
        Command::Convert { input, output, from, to, target_env, adapt_from } => {
            convert(&input, &output, from.as_deref(), to.as_deref(), &target_env, adapt_from.as_deref(), no_prompt)
        }
        Command::Validate { input, format } => validate(&input, format.as_deref()),
        Command::Info { input, format } => info(&input, format.as_deref()),
        Command::Bco { action } => bco_action(action),
    }
}

fn read_input(path: &std::path::Path) -> Result<String, Wf2WfError> {
    std::fs::read_to_string(path).map_err(|e| Wf2WfError::Import { path: path.display().to_string(), cause: e.to_string() })
}

fn convert(
    input: &std::path::Path,
    output: &std::path::Path,
    from: Option<&str>,
    to: Option<&str>,
    target_env: &str,
    adapt_from: Option<&str>,
    no_prompt: bool,
) -> Result<(), Wf2WfError> {
    let from_format = format_for(input, from)?;
    let to_format = format_for(output, to)?;
    let target_environment =
        Environment::from_str(target_env).map_err(|e| Wf2WfError::Usage(format!("invalid --target-env: {e}")))?;

    let content = read_input(input)?;
    let importer = import_adapter(from_format);
    let orchestrator = ImportOrchestrator::new(importer.as_ref());
    let mut prompter = crate::prompt::get_prompter(no_prompt, None);
    let import_options = ImportOptions { target_environment, interactive: !no_prompt };
    let workflow = orchestrator
        .run(&content, &import_options, prompter.as_mut())
        .map_err(|e| Wf2WfError::Import { path: input.display().to_string(), cause: e.to_string() })?;

    if !workflow.metadata.validation_errors.is_empty() {
        log::warn!("imported workflow has validation warnings: {:?}", workflow.metadata.validation_errors);
    }

    let exporter = export_adapter(to_format);
    let export_orchestrator = ExportOrchestrator::new(exporter.as_ref());
    let export_options = ExportOptions { target_environment, adapt_from: None };
    let strategy = adapt_from
        .map(Environment::from_str)
        .transpose()
        .map_err(|e| Wf2WfError::Usage(format!("invalid --adapt-from: {e}")))?
        .and_then(|from_env| adaptation_strategy(from_env, target_environment));

    let timestamp = chrono::Utc::now().to_rfc3339();
    let outcome = export_orchestrator
        .run(&workflow, &export_options, output, &timestamp, strategy.as_deref(), prompter.as_mut())
        .map_err(|e| Wf2WfError::Export { path: output.display().to_string(), cause: e.to_string() })?;

    std::fs::write(output, &outcome.rendered)
        .map_err(|e| Wf2WfError::Export { path: output.display().to_string(), cause: e.to_string() })?;

    let output_dir = output.parent().unwrap_or_else(|| std::path::Path::new("."));
    for (name, content) in &outcome.auxiliary_files {
        let aux_path = output_dir.join(name);
        std::fs::write(&aux_path, content)
            .map_err(|e| Wf2WfError::Export { path: aux_path.display().to_string(), cause: e.to_string() })?;
    }

    log::info!(
        "converted {} -> {} ({} loss entries recorded)",
        input.display(),
        output.display(),
        outcome.loss_entries_written
    );
    Ok(())
}

fn validate(input: &std::path::Path, format: Option<&str>) -> Result<(), Wf2WfError> {
    let format = format_for(input, format)?;
    let content = read_input(input)?;
    let importer = import_adapter(format);
    let orchestrator = ImportOrchestrator::new(importer.as_ref());
    let mut prompter = crate::prompt::get_prompter(true, None);
    let options = ImportOptions { target_environment: Environment::SharedFilesystem, interactive: false };
    let workflow = orchestrator
        .run(&content, &options, prompter.as_mut())
        .map_err(|e| Wf2WfError::Import { path: input.display().to_string(), cause: e.to_string() })?;

    match codec::validate_compat(&workflow) {
        Ok(()) => {
            println!("{}: valid", input.display());
            Ok(())
        }
        Err(issues) => Err(Wf2WfError::Validation(issues)),
    }
}

fn info(input: &std::path::Path, format: Option<&str>) -> Result<(), Wf2WfError> {
    let format = format_for(input, format)?;
    let content = read_input(input)?;
    let importer = import_adapter(format);
    let orchestrator = ImportOrchestrator::new(importer.as_ref());
    let mut prompter = crate::prompt::get_prompter(true, None);
    let options = ImportOptions { target_environment: Environment::SharedFilesystem, interactive: false };
    let workflow = orchestrator
        .run(&content, &options, prompter.as_mut())
        .map_err(|e| Wf2WfError::Import { path: input.display().to_string(), cause: e.to_string() })?;

    println!("name: {}", workflow.name);
    println!("tasks: {}", workflow.tasks.len());
    println!("edges: {}", workflow.edges.len());
    match workflow.topological_order() {
        Ok(order) => println!("topological order: {}", order.join(" -> ")),
        Err(e) => println!("topological order: error ({e})"),
    }
    Ok(())
}

fn bco_action(action: BcoAction) -> Result<(), Wf2WfError> {
    match action {
        BcoAction::Sign { input, key } => {
            let content = read_input(&input)?;
            let outcome = bco::sign(&content, &key)
                .map_err(|e| Wf2WfError::ExternalTool { tool: "openssl".to_string(), cause: e.to_string() })?;
            std::fs::write(&input, &outcome.signed_document)
                .map_err(|e| Wf2WfError::Export { path: input.display().to_string(), cause: e.to_string() })?;
            let sig_path = PathBuf::from(format!("{}.sig", input.display()));
            let intoto_path = PathBuf::from(format!("{}.intoto.json", input.display()));
            std::fs::write(&sig_path, &outcome.signature)
                .map_err(|e| Wf2WfError::Export { path: sig_path.display().to_string(), cause: e.to_string() })?;
            std::fs::write(&intoto_path, &outcome.attestation)
                .map_err(|e| Wf2WfError::Export { path: intoto_path.display().to_string(), cause: e.to_string() })?;
            println!("etag: {}", outcome.etag);
            println!("wrote {}", sig_path.display());
            println!("wrote {}", intoto_path.display());
            Ok(())
        }
        BcoAction::Diff { left, right } => {
            let left_content = read_input(&left)?;
            let right_content = read_input(&right)?;
            let diffs = bco::diff_documents(&left_content, &right_content)
                .map_err(|e| Wf2WfError::Validation(vec![e.to_string()]))?;
            if diffs.is_empty() {
                println!("no differences in top-level domains");
            } else {
                for d in diffs {
                    println!("{d}");
                }
            }
            Ok(())
        }
        BcoAction::Validate { input } => {
            let content = read_input(&input)?;
            let issues = bco::validate_bco(&content).map_err(|e| Wf2WfError::Validation(vec![e.to_string()]))?;
            if issues.is_empty() {
                println!("{}: valid BCO document", input.display());
                Ok(())
            } else {
                Err(Wf2WfError::Validation(issues))
            }
        }
    }
}
