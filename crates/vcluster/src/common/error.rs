use thiserror::Error;

use crate::exec::TIMEOUT_EXIT_CODE;

/// Error taxonomy of the orchestration layer.
///
/// `Environment` means a command could not be launched at all (missing binary,
/// unreachable host). `Timeout` and `Failed` are distinguished by the exit
/// code of the external `timeout` wrapper. `NotFound` marks a store
/// inconsistency (a referenced record is missing); it is logged and the
/// offending update is dropped, never treated as fatal.
#[derive(Debug, Error)]
pub enum VcError {
    #[error("Cannot launch command: {0}")]
    Environment(#[from] std::io::Error),
    #[error("Command timed out: {output}")]
    Timeout { output: String },
    #[error("Command failed with exit code {code}: {output}")]
    Failed { code: i32, output: String },
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl VcError {
    /// Classify a non-zero exit code, separating the timeout sentinel from
    /// ordinary command failures.
    pub fn from_exit(code: i32, output: String) -> Self {
        if code == TIMEOUT_EXIT_CODE {
            VcError::Timeout { output }
        } else {
            VcError::Failed { code, output }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, VcError::Timeout { .. })
    }
}
