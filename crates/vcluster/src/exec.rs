//! Boundary for running scheduler and cluster-management commands.
//!
//! Everything that leaves this process goes through [`CommandExecutor`]: a
//! single `run` primitive that captures exit code, stdout and stderr. The
//! production implementation spawns local processes; tests substitute a
//! scripted mock.

use std::future::Future;
use std::pin::Pin;

use bstr::ByteSlice;
use tokio::process::Command;

use crate::common::error::VcError;

/// Exit code produced by the external `timeout` wrapper when the wrapped
/// command exceeds its limit. Distinguished from other non-zero exits.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Stdout and stderr concatenated for diagnostics.
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            stdout.to_string()
        } else if stdout.is_empty() {
            stderr.to_string()
        } else {
            format!("{stdout}\n{stderr}")
        }
    }
}

pub type ExecFuture = Pin<Box<dyn Future<Output = crate::Result<CommandOutput>>>>;

/// Executes a command and captures its output.
///
/// An `Err` is returned only when the command could not be launched at all;
/// a non-zero exit is reported through [`CommandOutput::code`] and classified
/// later by [`check_output`].
pub trait CommandExecutor {
    fn run(&self, argv: Vec<String>) -> ExecFuture;
}

/// Spawns commands as local processes.
pub struct ProcessExecutor;

impl CommandExecutor for ProcessExecutor {
    fn run(&self, argv: Vec<String>) -> ExecFuture {
        Box::pin(async move {
            if argv.is_empty() {
                return Err(VcError::Validation("Empty command line".to_string()));
            }
            log::debug!("Running command `{}`", argv.join(" "));
            let mut command = Command::new(&argv[0]);
            command.args(&argv[1..]);
            let output = command.output().await?;
            Ok(CommandOutput {
                code: output.status.code().unwrap_or(-1),
                stdout: output.stdout.to_str_lossy().into_owned(),
                stderr: output.stderr.to_str_lossy().into_owned(),
            })
        })
    }
}

/// Map a non-zero exit into the error taxonomy, carrying the captured output.
pub fn check_output(output: CommandOutput) -> crate::Result<CommandOutput> {
    if output.success() {
        Ok(output)
    } else {
        Err(VcError::from_exit(output.code, output.combined()))
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandOutput, TIMEOUT_EXIT_CODE, check_output};
    use crate::common::error::VcError;

    fn output(code: i32, stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput {
            code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_check_output_success() {
        assert!(check_output(output(0, "ok", "")).is_ok());
    }

    #[test]
    fn test_check_output_timeout_sentinel() {
        let error = check_output(output(TIMEOUT_EXIT_CODE, "", "killed")).unwrap_err();
        assert!(error.is_timeout());
    }

    #[test]
    fn test_check_output_failure() {
        let error = check_output(output(1, "out", "err")).unwrap_err();
        match error {
            VcError::Failed { code, output } => {
                assert_eq!(code, 1);
                assert_eq!(output, "out\nerr");
            }
            other => panic!("Unexpected error: {other:?}"),
        }
    }
}
