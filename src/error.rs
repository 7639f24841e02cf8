// src/error.rs
//
// =============================================================================
// WF2WF: ERROR TAXONOMY
// =============================================================================
//
// Typed error kinds matching the CLI exit-code contract:
//   0 success, 1 validation failure, 2 usage error, 3 external-tool failure.
//
// Adapter- and engine-internal code still propagates with `anyhow::Result`;
// this enum is the boundary type surfaced to `main.rs` and to callers that
// need to branch on error kind.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Wf2WfError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("import failed for {path}: {cause}")]
    Import { path: String, cause: String },

    #[error("export failed for {path}: {cause}")]
    Export { path: String, cause: String },

    #[error("validation failed: {0:?}")]
    Validation(Vec<String>),

    #[error("failed to reinject lost field {pointer}: {cause}")]
    LossReapply { pointer: String, cause: String },

    #[error("external tool '{tool}' failed: {cause}")]
    ExternalTool { tool: String, cause: String },

    #[error("operation '{operation}' timed out after {budget_s}s")]
    Timeout { operation: String, budget_s: u64 },
}

impl Wf2WfError {
    /// Exit code surfaced by `main.rs`: 0 success, 1 validation failure,
    /// 2 usage error, 3 external-tool failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Wf2WfError::Usage(_) => 2,
            Wf2WfError::Import { .. } | Wf2WfError::Export { .. } => 1,
            Wf2WfError::Validation(_) => 1,
            Wf2WfError::LossReapply { .. } => 1,
            Wf2WfError::ExternalTool { .. } => 3,
            Wf2WfError::Timeout { .. } => 3,
        }
    }
}
