// src/lib.rs
//
// =============================================================================
// WF2WF: WORKFLOW IR CONVERTER
// =============================================================================
//
// Bidirectional converter between scientific/batch workflow languages
// (Snakemake, HTCondor DAGMan, Nextflow DSL2, CWL, WDL, Galaxy, and IEEE
// 2791 BioCompute Objects), mediated by a single versioned,
// environment-aware intermediate representation.

pub mod adaptation;
pub mod adapters;
pub mod cli;
pub mod environ;
pub mod error;
pub mod inference;
pub mod ir;
pub mod loss;
pub mod orchestrate;
pub mod prompt;
pub mod resources;

pub use error::Wf2WfError;
pub use ir::{Environment, Task, Workflow};
