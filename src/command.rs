//! Shell-safe rendering of grubby command lines.
//!
//! Every value interpolated into a command line goes through
//! [`shell_quote`], so titles with spaces or bootloader variables like
//! `$tuned_initrd` survive the `sh -c` round trip literally.

/// The bootloader tool every command line starts with.
pub const GRUBBY: &str = "grubby";

/// Quote `val` for POSIX shell interpolation.
///
/// Returns the value unchanged when it only contains characters that are
/// safe unquoted; otherwise wraps it in single quotes, escaping embedded
/// single quotes the `'"'"'` way.
pub fn shell_quote(val: &str) -> String {
    if val.is_empty() {
        return "''".to_string();
    }
    let safe = val
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if safe {
        val.to_string()
    } else {
        format!("'{}'", val.replace('\'', r#"'"'"'"#))
    }
}

/// Render the command that strips every existing boot argument from a
/// kernel. Returns `None` when the entry has no arguments to strip.
pub fn rm_boot_args_cmd(current_args: &str, kernel_id: &str) -> Option<String> {
    if current_args.is_empty() {
        return None;
    }
    Some(format!(
        "{} --update-kernel={} --remove-args={}",
        GRUBBY,
        kernel_id,
        shell_quote(current_args)
    ))
}

/// Render the command that applies an argument delta to an existing
/// kernel. Returns `None` when both token lists are empty; an empty
/// delta means the entry is already converged and no command may run.
pub fn mod_boot_args_cmd(kernel_id: &str, remove_tokens: &str, add_tokens: &str) -> Option<String> {
    if remove_tokens.is_empty() && add_tokens.is_empty() {
        return None;
    }
    let mut cmd = format!("{} --update-kernel={}", GRUBBY, kernel_id);
    if !remove_tokens.is_empty() {
        cmd.push_str(&format!(" --remove-args={}", shell_quote(remove_tokens)));
    }
    if !add_tokens.is_empty() {
        cmd.push_str(&format!(" --args={}", shell_quote(add_tokens)));
    }
    Some(cmd)
}

/// Render the command that creates a new boot entry.
///
/// `create_fragment` is the resolver's pre-quoted
/// `--add-kernel=... --title=... --initrd=...` sequence.
pub fn add_kernel_cmd(
    create_fragment: &str,
    add_tokens: &str,
    copy_default: bool,
    make_default: bool,
) -> String {
    let mut cmd = format!("{} {}", GRUBBY, create_fragment);
    if !add_tokens.is_empty() {
        cmd.push_str(&format!(" --args={}", shell_quote(add_tokens)));
    }
    if copy_default {
        cmd.push_str(" --copy-default");
    }
    if make_default {
        cmd.push_str(" --make-default");
    }
    cmd
}

/// Render the command that removes a boot entry.
pub fn rm_kernel_cmd(kernel_id: &str) -> String {
    format!("{} --remove-kernel={}", GRUBBY, kernel_id)
}

/// Render the command that changes the default boot entry.
pub fn set_default_cmd(kernel_id: &str) -> String {
    format!("{} --set-default={}", GRUBBY, kernel_id)
}
