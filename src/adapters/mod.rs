// src/adapters/mod.rs
//
// =============================================================================
// WF2WF: FORMAT ADAPTERS
// =============================================================================
//
// Adapters are contracts, not algorithms: each module implements a
// representative parser/emitter sufficient to round-trip the fields a
// workflow conversion actually exercises, not a full grammar for its
// language.

pub mod bco;
pub mod cwl;
pub mod dagman;
pub mod galaxy;
pub mod nextflow;
pub mod snakemake;
pub mod wdl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Snakemake,
    Dagman,
    Nextflow,
    Cwl,
    Wdl,
    Galaxy,
    Bco,
}

impl Format {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "smk" | "snakefile" => Some(Format::Snakemake),
            "dag" => Some(Format::Dagman),
            "nf" => Some(Format::Nextflow),
            "cwl" => Some(Format::Cwl),
            "wdl" => Some(Format::Wdl),
            "ga" => Some(Format::Galaxy),
            "bco" | "json" => Some(Format::Bco),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Format::Snakemake => "snakemake",
            Format::Dagman => "dagman",
            Format::Nextflow => "nextflow",
            Format::Cwl => "cwl",
            Format::Wdl => "wdl",
            Format::Galaxy => "galaxy",
            Format::Bco => "bco",
        }
    }
}
