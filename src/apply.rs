//! The per-entry reconciliation loop.
//!
//! Entries are processed strictly in input order, single-threaded.
//! Current boot state is re-queried before every entry because an
//! earlier entry's commands may have changed what a later selector
//! resolves against. Any validation error or command failure aborts the
//! rest of the batch; commands already executed stay executed and are
//! surfaced alongside the failure.

use serde::Serialize;
use thiserror::Error;

use crate::command;
use crate::default_kernel;
use crate::error::ReconcileError;
use crate::info::parse_info;
use crate::input::SettingEntry;
use crate::options::{copies_default, diff_args, replaces_previous};
use crate::runner::{run_checked, CommandRunner};
use crate::selector::{resolve, Action};

/// Accumulated outcome of one run: whether anything changed and every
/// command line that was executed, in order. Append-only.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunResult {
    pub changed: bool,
    pub actions: Vec<String>,
}

/// A batch that stopped early. Carries the commands that had already
/// run; there is no rollback across entries.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct ApplyFailure {
    pub partial: RunResult,
    pub source: ReconcileError,
}

/// Run a mutating command and record it.
pub(crate) fn execute(
    runner: &dyn CommandRunner,
    result: &mut RunResult,
    command_line: String,
) -> Result<(), ReconcileError> {
    run_checked(runner, &command_line)?;
    result.changed = true;
    result.actions.push(command_line);
    Ok(())
}

/// Reconcile every declarative entry against the live bootloader state.
pub fn apply_settings(
    runner: &dyn CommandRunner,
    entries: &[SettingEntry],
) -> Result<RunResult, ApplyFailure> {
    let mut result = RunResult::default();
    if let Err(source) = default_kernel::preflight(entries) {
        return Err(ApplyFailure {
            partial: result,
            source,
        });
    }
    for entry in entries {
        if let Err(source) = apply_entry(runner, entry, &mut result) {
            return Err(ApplyFailure {
                partial: result,
                source,
            });
        }
    }
    Ok(result)
}

fn apply_entry(
    runner: &dyn CommandRunner,
    entry: &SettingEntry,
    result: &mut RunResult,
) -> Result<(), ReconcileError> {
    let info = run_checked(runner, "grubby --info=ALL")?;
    let default_index = run_checked(runner, "grubby --default-index")?;
    let records = parse_info(&info.stdout, &default_index.stdout);

    let resolved = resolve(&entry.kernel, entry.state.as_deref(), &records)?;

    match resolved.action {
        Action::Remove => {
            execute(runner, result, command::rm_kernel_cmd(&resolved.kernel_id))?;
        }
        Action::Modify => {
            if replaces_previous(&entry.options) {
                let info = kernel_info(runner, &resolved.kernel_id)?;
                let current_args = crate::options::get_boot_args(&info);
                if let Some(cmd) = command::rm_boot_args_cmd(&current_args, &resolved.kernel_id) {
                    execute(runner, result, cmd)?;
                }
            }
            let info = kernel_info(runner, &resolved.kernel_id)?;
            let (remove_tokens, add_tokens) = diff_args(&info, &entry.options);
            if let Some(cmd) =
                command::mod_boot_args_cmd(&resolved.kernel_id, &remove_tokens, &add_tokens)
            {
                execute(runner, result, cmd)?;
            }
        }
        Action::Create => {
            // A new entry has no current args; diff against nothing so
            // only the present-state settings land on the command line.
            let (_, add_tokens) = diff_args("", &entry.options);
            let cmd = command::add_kernel_cmd(
                &resolved.kernel_id,
                &add_tokens,
                copies_default(&entry.options),
                entry.default,
            );
            execute(runner, result, cmd)?;
        }
    }

    if entry.default && resolved.action != Action::Remove {
        if let Some((key, value)) = &resolved.default_probe {
            default_kernel::ensure_default(runner, *key, value, result)?;
        }
    }
    Ok(())
}

fn kernel_info(runner: &dyn CommandRunner, kernel_id: &str) -> Result<String, ReconcileError> {
    Ok(run_checked(runner, &format!("grubby --info={kernel_id}"))?.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::parse_settings;
    use crate::runner::testing::ScriptedRunner;

    const INFO_ALL: &str = r#"index=0
kernel="/boot/vmlinuz-6.5.12"
args="ro quiet"
initrd="/boot/initramfs-6.5.12.img"
title="Fedora 6.5.12"
index=1
kernel="/boot/vmlinuz-6.5.10"
args="ro"
initrd="/boot/initramfs-6.5.10.img"
title="Fedora 6.5.10"
"#;

    const INFO_0: &str = "index=0\nkernel=\"/boot/vmlinuz-6.5.12\"\nargs=\"ro quiet\"\n";

    fn base_runner() -> ScriptedRunner {
        ScriptedRunner::new()
            .respond("grubby --info=ALL", INFO_ALL)
            .respond("grubby --default-index", "0\n")
    }

    #[test]
    fn test_already_converged_modify_runs_nothing() {
        let runner = base_runner().respond("grubby --info=0", INFO_0);
        let entries =
            parse_settings(r#"[{"kernel": {"index": 0}, "options": [{"name": "quiet"}]}]"#)
                .unwrap();
        let result = apply_settings(&runner, &entries).unwrap();
        assert!(!result.changed);
        assert!(result.actions.is_empty());
    }

    #[test]
    fn test_modify_removes_absent_arg() {
        let runner = base_runner().respond("grubby --info=0", INFO_0);
        let entries = parse_settings(
            r#"[{"kernel": {"index": 0}, "options": [{"name": "quiet", "state": "absent"}]}]"#,
        )
        .unwrap();
        let result = apply_settings(&runner, &entries).unwrap();
        assert!(result.changed);
        assert_eq!(
            result.actions,
            vec!["grubby --update-kernel=0 --remove-args=quiet".to_string()]
        );
    }

    #[test]
    fn test_replace_previous_then_apply() {
        let runner = base_runner().respond("grubby --info=0", INFO_0);
        let entries = parse_settings(
            r#"[{"kernel": {"index": 0}, "options": [{"previous": "replaced"}, {"name": "panic", "value": 5}]}]"#,
        )
        .unwrap();
        let result = apply_settings(&runner, &entries).unwrap();
        assert_eq!(
            result.actions,
            vec![
                "grubby --update-kernel=0 --remove-args='ro quiet'".to_string(),
                "grubby --update-kernel=0 --args=panic=5".to_string(),
            ]
        );
        // The scripted info is not refreshed between the two commands,
        // so "ro quiet" still reads as present; the add side only
        // carries the genuinely new token either way.
    }

    #[test]
    fn test_remove_entry() {
        let runner = base_runner();
        let entries = parse_settings(r#"[{"kernel": {"index": 1}, "state": "absent"}]"#).unwrap();
        let result = apply_settings(&runner, &entries).unwrap();
        assert_eq!(result.actions, vec!["grubby --remove-kernel=1".to_string()]);
    }

    #[test]
    fn test_create_entry_with_copy_default_and_default_flag() {
        let runner = base_runner().respond("grubby --default-kernel", "/boot/vmlinuz-new\n");
        let entries = parse_settings(
            r#"[{
                "kernel": {"path": "/boot/vmlinuz-new", "title": "New", "initrd": "/boot/initramfs-new.img"},
                "options": [{"name": "quiet"}, {"copy_default": true}],
                "default": true
            }]"#,
        )
        .unwrap();
        let result = apply_settings(&runner, &entries).unwrap();
        assert_eq!(
            result.actions,
            vec![
                "grubby --add-kernel=/boot/vmlinuz-new --title=New \
                 --initrd=/boot/initramfs-new.img --args=quiet --copy-default --make-default"
                    .to_string(),
            ]
        );
        // --make-default already took effect, so no set-default follows.
        assert!(result.changed);
    }

    #[test]
    fn test_validation_error_aborts_batch_with_partial_result() {
        let runner = base_runner().respond("grubby --info=0", INFO_0);
        let entries = parse_settings(
            r#"[
                {"kernel": {"index": 0}, "options": [{"name": "quiet", "state": "absent"}]},
                {"kernel": "BOGUS"}
            ]"#,
        )
        .unwrap();
        let failure = apply_settings(&runner, &entries).unwrap_err();
        assert!(matches!(failure.source, ReconcileError::SelectorKeyword(_)));
        assert_eq!(
            failure.partial.actions,
            vec!["grubby --update-kernel=0 --remove-args=quiet".to_string()]
        );
        assert!(failure.partial.changed);
    }

    #[test]
    fn test_permission_denied_is_fatal_before_anything_runs() {
        let runner = ScriptedRunner::new().fail("grubby --info=ALL", 1, "grubby: Permission denied");
        let entries = parse_settings(r#"[{"kernel": "DEFAULT"}]"#).unwrap();
        let failure = apply_settings(&runner, &entries).unwrap_err();
        assert!(matches!(failure.source, ReconcileError::Permission(_)));
        assert!(failure.partial.actions.is_empty());
    }

    #[test]
    fn test_command_failure_aborts() {
        let runner = base_runner()
            .respond("grubby --info=0", INFO_0)
            .fail("grubby --update-kernel=0 --args=debug", 1, "update failed");
        let entries =
            parse_settings(r#"[{"kernel": {"index": 0}, "options": [{"name": "debug"}]}]"#)
                .unwrap();
        let failure = apply_settings(&runner, &entries).unwrap_err();
        assert!(matches!(
            failure.source,
            ReconcileError::CommandFailed { status: 1, .. }
        ));
        assert!(!failure.partial.changed);
    }

    #[test]
    fn test_state_is_requeried_per_entry() {
        let runner = base_runner()
            .respond("grubby --info=0", INFO_0)
            .respond("grubby --info=1", "index=1\nkernel=\"/boot/vmlinuz-6.5.10\"\nargs=\"ro\"\n");
        let entries = parse_settings(
            r#"[
                {"kernel": {"index": 0}, "options": [{"name": "quiet"}]},
                {"kernel": {"index": 1}, "options": [{"name": "quiet"}]}
            ]"#,
        )
        .unwrap();
        apply_settings(&runner, &entries).unwrap();
        let calls = runner.calls.borrow();
        assert_eq!(
            calls
                .iter()
                .filter(|c| c.as_str() == "grubby --info=ALL")
                .count(),
            2
        );
    }
}
