//! The external-command capability the reconciler runs grubby through.
//!
//! The reconciliation logic only ever sees [`CommandRunner`], so it can
//! be driven in tests by a scripted fake without touching a real
//! bootloader. The production implementation shells out via `sh -c`;
//! command lines are built pre-quoted by [`crate::command`].

use std::process::Command;

use anyhow::{Context, Result};

use crate::error::ReconcileError;

/// Captured output of one external command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Synchronous, blocking command execution.
pub trait CommandRunner {
    fn run(&self, command_line: &str) -> Result<CommandOutput>;
}

/// Runs command lines through the system shell.
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, command_line: &str) -> Result<CommandOutput> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command_line)
            .output()
            .with_context(|| format!("executing '{command_line}'"))?;
        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run a command and classify failures.
///
/// A "Permission denied" in stderr is fatal regardless of exit status;
/// grubby prints it when invoked without root and its exit codes are not
/// reliable across versions. Any other non-zero exit is a command
/// failure that aborts the batch.
pub fn run_checked(
    runner: &dyn CommandRunner,
    command_line: &str,
) -> Result<CommandOutput, ReconcileError> {
    let output = runner.run(command_line)?;
    if output.stderr.contains("Permission denied") {
        return Err(ReconcileError::Permission(command_line.to_string()));
    }
    if output.status != 0 {
        return Err(ReconcileError::CommandFailed {
            command: command_line.to_string(),
            status: output.status,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_runner_captures_output() {
        let out = ShellRunner.run("echo hello").unwrap();
        assert_eq!(out.status, 0);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn test_run_checked_permission_denied_is_fatal() {
        let runner =
            testing::ScriptedRunner::new().fail("grubby --info=ALL", 0, "grubby: Permission denied");
        let err = run_checked(&runner, "grubby --info=ALL").unwrap_err();
        assert!(matches!(err, ReconcileError::Permission(_)));
        assert!(err.to_string().contains("elevated privileges"));
    }

    #[test]
    fn test_run_checked_nonzero_exit() {
        let runner = testing::ScriptedRunner::new().fail("grubby --info=nope", 1, "no such entry");
        let err = run_checked(&runner, "grubby --info=nope").unwrap_err();
        assert!(matches!(err, ReconcileError::CommandFailed { status: 1, .. }));
    }
}
