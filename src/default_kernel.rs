//! Default-kernel coordination across a declarative batch.
//!
//! Two jobs: before any entry runs, reject batches that declare more
//! than one default (or declare one on a keyword selector that cannot
//! name a single kernel); after an entry that asked to be default has
//! been created or modified, compare the bootloader's current default
//! against it and issue `--set-default` only on a real difference.

use serde_json::Value;

use crate::apply::{execute, RunResult};
use crate::command;
use crate::error::ReconcileError;
use crate::input::SettingEntry;
use crate::runner::{run_checked, CommandRunner};
use crate::selector::{render_kernel_id, SelectorKey};

/// Validate the batch's default declarations before any entry runs.
pub fn preflight(entries: &[SettingEntry]) -> Result<(), ReconcileError> {
    let mut declared: Vec<String> = Vec::new();
    for entry in entries.iter().filter(|e| e.default) {
        if let Value::String(word) = &entry.kernel {
            return Err(ReconcileError::DefaultConflict(format!(
                "default=true cannot target the '{word}' keyword; \
                 identify the kernel by path, title, or index"
            )));
        }
        declared.push(identifying_value(&entry.kernel));
    }
    if declared.len() > 1 {
        return Err(ReconcileError::DefaultConflict(format!(
            "only one kernel can be set as default, but default=true was requested for: {}",
            declared.join(", ")
        )));
    }
    Ok(())
}

/// The value naming a default-declaring entry in the conflict message:
/// its path, else its title, else its index.
fn identifying_value(kernel: &Value) -> String {
    if let Value::Object(map) = kernel {
        for key in ["path", "title", "index"] {
            if let Some(value) = map.get(key) {
                return match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
            }
        }
    }
    kernel.to_string()
}

/// Make `value` the default kernel if it is not already.
///
/// The current default is queried by the same attribute the selector
/// used, so a path selector compares against `--default-kernel`, a
/// title selector against `--default-title`, an index selector against
/// `--default-index`.
pub fn ensure_default(
    runner: &dyn CommandRunner,
    key: SelectorKey,
    value: &str,
    result: &mut RunResult,
) -> Result<(), ReconcileError> {
    let query = match key {
        SelectorKey::Path => "grubby --default-kernel",
        SelectorKey::Title => "grubby --default-title",
        SelectorKey::Index => "grubby --default-index",
        // Resolution never probes by initrd; nothing identifies by it.
        SelectorKey::Initrd => return Ok(()),
    };
    let current = run_checked(runner, query)?;
    if current.stdout.trim() == value {
        return Ok(());
    }
    execute(
        runner,
        result,
        command::set_default_cmd(&render_kernel_id(key, value)),
    )
}
