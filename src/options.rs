//! Desired boot-argument settings and the delta computation against a
//! kernel's current argument string.

use std::fmt;

use regex::Regex;
use serde::Deserialize;

/// A string-or-integer scalar, as declarative input allows both.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Int(i64),
    Str(String),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Int(n) => write!(f, "{n}"),
            ScalarValue::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Whether an argument should end up on or off the kernel command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgState {
    Present,
    Absent,
}

/// One desired kernel-argument directive.
///
/// Besides the plain `{name, value?, state?}` form, two sentinel shapes
/// exist: `{previous: replaced}` asks for every pre-existing argument to
/// be wiped before the rest of the options apply, and
/// `{copy_default: true}` asks a newly created entry to inherit the
/// default kernel's arguments. Neither sentinel takes part in diffing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ArgumentSetting {
    ReplacePrevious {
        previous: ReplacedMarker,
    },
    CopyDefault {
        copy_default: bool,
    },
    Arg {
        name: String,
        #[serde(default)]
        value: Option<ScalarValue>,
        #[serde(default)]
        state: Option<ArgState>,
    },
}

/// The only accepted value for the `previous` sentinel key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplacedMarker {
    Replaced,
}

impl ArgumentSetting {
    /// Render the `name` or `name=value` token this setting stands for.
    /// Sentinels have no token.
    fn token(&self) -> Option<String> {
        match self {
            ArgumentSetting::Arg { name, value, .. } => match value {
                Some(v) => Some(format!("{name}={v}")),
                None => Some(name.clone()),
            },
            _ => None,
        }
    }

    fn is_absent(&self) -> bool {
        matches!(
            self,
            ArgumentSetting::Arg {
                state: Some(ArgState::Absent),
                ..
            }
        )
    }
}

/// Whether the options list carries the `{previous: replaced}` sentinel.
pub fn replaces_previous(options: &[ArgumentSetting]) -> bool {
    options
        .iter()
        .any(|o| matches!(o, ArgumentSetting::ReplacePrevious { .. }))
}

/// Whether the options list carries the `{copy_default: true}` sentinel.
pub fn copies_default(options: &[ArgumentSetting]) -> bool {
    options
        .iter()
        .any(|o| matches!(o, ArgumentSetting::CopyDefault { copy_default: true }))
}

/// Extract the current argument string from `grubby --info=<id>` output.
///
/// Handles both the quoted `args="..."` form and the unquoted legacy
/// form; returns an empty string when the info has no args line at all.
pub fn get_boot_args(kernel_info: &str) -> String {
    let quoted = Regex::new(r#"args="(.*)""#).unwrap();
    if let Some(caps) = quoted.captures(kernel_info) {
        return caps[1].trim().to_string();
    }
    let bare = Regex::new(r"(?m)^args=(.*)$").unwrap();
    if let Some(caps) = bare.captures(kernel_info) {
        return caps[1].trim().to_string();
    }
    String::new()
}

/// Whether `token` currently appears in `args`, bounded by start, end,
/// or a space. `quiet` does not match inside `quiet=5`.
fn token_present(args: &str, token: &str) -> bool {
    let re = Regex::new(&format!(r"(^| ){}( |$)", regex::escape(token))).unwrap();
    re.is_match(args)
}

/// Compute the argument delta for one kernel.
///
/// Returns `(remove_tokens, add_tokens)`, each a space-joined token
/// string. Settings marked absent whose token is currently present go to
/// the remove side; settings marked (or defaulting to) present whose
/// token is currently missing go to the add side. Both strings empty
/// means the kernel is already converged and no command may be issued.
pub fn diff_args(kernel_info: &str, options: &[ArgumentSetting]) -> (String, String) {
    let current = get_boot_args(kernel_info);
    let mut remove = Vec::new();
    let mut add = Vec::new();
    for setting in options {
        let Some(token) = setting.token() else {
            continue;
        };
        if setting.is_absent() {
            if token_present(&current, &token) {
                remove.push(token);
            }
        } else if !token_present(&current, &token) {
            add.push(token);
        }
    }
    (remove.join(" "), add.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg(name: &str) -> ArgumentSetting {
        ArgumentSetting::Arg {
            name: name.to_string(),
            value: None,
            state: None,
        }
    }

    fn arg_value(name: &str, value: ScalarValue) -> ArgumentSetting {
        ArgumentSetting::Arg {
            name: name.to_string(),
            value: Some(value),
            state: None,
        }
    }

    fn absent(name: &str) -> ArgumentSetting {
        ArgumentSetting::Arg {
            name: name.to_string(),
            value: None,
            state: Some(ArgState::Absent),
        }
    }

    const INFO: &str = r#"
index=0
kernel="/boot/vmlinuz-6.5.12-100.fc37.x86_64"
args="ro quiet panic=5"
initrd="/boot/initramfs-6.5.12-100.fc37.x86_64.img"
"#;

    const INFO_UNQUOTED: &str = "index=0\nkernel=/boot/vmlinuz-6\nargs=ro quiet panic=5\n";

    #[test]
    fn test_get_boot_args() {
        assert_eq!(get_boot_args(INFO), "ro quiet panic=5");
        assert_eq!(get_boot_args(INFO_UNQUOTED), "ro quiet panic=5");
        assert_eq!(get_boot_args(""), "");
        assert_eq!(get_boot_args("index=0\nkernel=/boot/k\n"), "");
    }

    #[test]
    fn test_diff_already_present_is_noop() {
        let (remove, add) = diff_args(INFO, &[arg("quiet")]);
        assert_eq!(remove, "");
        assert_eq!(add, "");
    }

    #[test]
    fn test_diff_absent_of_present_token() {
        let (remove, add) = diff_args(INFO, &[absent("quiet")]);
        assert_eq!(remove, "quiet");
        assert_eq!(add, "");
    }

    #[test]
    fn test_diff_add_missing_tokens() {
        let (remove, add) = diff_args(
            INFO,
            &[
                arg_value("console", ScalarValue::Str("tty0".to_string())),
                arg_value("loglevel", ScalarValue::Int(3)),
                arg("quiet"),
            ],
        );
        assert_eq!(remove, "");
        assert_eq!(add, "console=tty0 loglevel=3");
    }

    #[test]
    fn test_diff_absent_of_missing_token_is_noop() {
        let (remove, add) = diff_args(INFO, &[absent("debug")]);
        assert_eq!(remove, "");
        assert_eq!(add, "");
    }

    #[test]
    fn test_diff_token_boundaries() {
        // "panic" is not present as a bare token, only as "panic=5".
        let (remove, add) = diff_args(INFO, &[arg("panic")]);
        assert_eq!(remove, "");
        assert_eq!(add, "panic");
        let (remove, _) = diff_args(INFO, &[absent("panic")]);
        assert_eq!(remove, "");
    }

    #[test]
    fn test_diff_is_idempotent_on_same_input() {
        let options = [absent("quiet"), arg("debug")];
        let first = diff_args(INFO, &options);
        let second = diff_args(INFO, &options);
        assert_eq!(first, second);
        assert_eq!(first, ("quiet".to_string(), "debug".to_string()));
    }

    #[test]
    fn test_diff_converged_state_yields_empty_delta() {
        let converged = "index=0\nargs=\"ro panic=5 debug\"\n";
        let options = [absent("quiet"), arg("debug")];
        let (remove, add) = diff_args(converged, &options);
        assert_eq!(remove, "");
        assert_eq!(add, "");
    }

    #[test]
    fn test_sentinels_contribute_no_tokens() {
        let options = [
            ArgumentSetting::ReplacePrevious {
                previous: ReplacedMarker::Replaced,
            },
            ArgumentSetting::CopyDefault { copy_default: true },
            arg("splash"),
        ];
        let (remove, add) = diff_args(INFO, &options);
        assert_eq!(remove, "");
        assert_eq!(add, "splash");
        assert!(replaces_previous(&options));
        assert!(copies_default(&options));
    }

    #[test]
    fn test_sentinel_deserialization() {
        let parsed: Vec<ArgumentSetting> = serde_json::from_str(
            r#"[{"previous": "replaced"}, {"copy_default": true}, {"name": "quiet", "state": "present"}]"#,
        )
        .unwrap();
        assert!(matches!(parsed[0], ArgumentSetting::ReplacePrevious { .. }));
        assert!(matches!(parsed[1], ArgumentSetting::CopyDefault { copy_default: true }));
        assert!(matches!(
            parsed[2],
            ArgumentSetting::Arg {
                state: Some(ArgState::Present),
                ..
            }
        ));
    }
}
