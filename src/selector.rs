//! Declarative kernel selectors and their resolution against parsed
//! boot entries.
//!
//! A selector is either a keyword (`DEFAULT`, `ALL`) or an attribute
//! mapping over `path`, `index`, `title`, `initrd`. Resolution validates
//! the shape, decides whether the entry must be created, modified, or
//! removed, and renders the identifier grubby expects for that action.
//! Validation short-circuits on the first failure; a failure is final
//! for its entry and nothing mutating has run by then.

use serde_json::Value;

use crate::command::shell_quote;
use crate::error::ReconcileError;
use crate::info::KernelRecord;
use crate::options::ScalarValue;

/// Attribute names a mapping-form selector may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKey {
    Path,
    Index,
    Title,
    Initrd,
}

impl SelectorKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectorKey::Path => "path",
            SelectorKey::Index => "index",
            SelectorKey::Title => "title",
            SelectorKey::Initrd => "initrd",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "path" => Some(SelectorKey::Path),
            "index" => Some(SelectorKey::Index),
            "title" => Some(SelectorKey::Title),
            "initrd" => Some(SelectorKey::Initrd),
            _ => None,
        }
    }

    /// The record field this key compares against. A record's kernel
    /// path is printed under `kernel`, not `path`.
    fn record_field(self) -> &'static str {
        match self {
            SelectorKey::Path => "kernel",
            other => other.as_str(),
        }
    }
}

/// A validated selector: keyword form or attribute-reference form.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelSelector {
    Keyword(String),
    Reference(Vec<(SelectorKey, String)>),
}

/// What resolution decided for one declarative entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Modify,
    Remove,
}

/// A resolved selector: the action to take and the pre-quoted kernel
/// identifier (for create, the full `--add-kernel=...` fragment).
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub action: Action,
    pub kernel_id: String,
    /// The attribute to compare the current default kernel by when this
    /// entry also declares `default: true`. `None` for keyword selectors,
    /// which can never legally declare a default.
    pub default_probe: Option<(SelectorKey, String)>,
}

/// Validate a raw `kernel` value into a typed selector.
///
/// This is the input boundary: everything after it works on
/// [`KernelSelector`] and never on raw JSON.
pub fn validate_selector(kernel: &Value) -> Result<KernelSelector, ReconcileError> {
    match kernel {
        Value::String(s) => {
            if s == "DEFAULT" || s == "ALL" {
                Ok(KernelSelector::Keyword(s.clone()))
            } else {
                Err(ReconcileError::SelectorKeyword(s.clone()))
            }
        }
        Value::Object(map) => {
            let mut reference = Vec::new();
            for (name, value) in map {
                let Some(key) = SelectorKey::parse(name) else {
                    return Err(ReconcileError::SelectorShape(format!(
                        "kernel key in '{name}: {value}' must be one of 'path, index, title, initrd'"
                    )));
                };
                let scalar = match value {
                    Value::String(s) => ScalarValue::Str(s.clone()),
                    Value::Number(n) if n.is_i64() => ScalarValue::Int(n.as_i64().unwrap_or(0)),
                    other => {
                        return Err(ReconcileError::SelectorShape(format!(
                            "kernel value in '{name}: {other}' must be of type str or int"
                        )))
                    }
                };
                reference.push((key, scalar.to_string()));
            }
            Ok(KernelSelector::Reference(reference))
        }
        other => Err(ReconcileError::SelectorShape(format!(
            "kernel value in {other} must be of type str or dict"
        ))),
    }
}

/// Resolve a declarative entry against the current boot entries.
///
/// `state` is the entry's raw `state` field; omitted means `present`.
pub fn resolve(
    kernel: &Value,
    state: Option<&str>,
    records: &[KernelRecord],
) -> Result<Resolved, ReconcileError> {
    let absent = match state {
        None | Some("present") => false,
        Some("absent") => true,
        Some(_) => return Err(ReconcileError::SelectorState),
    };
    let existing_action = if absent { Action::Remove } else { Action::Modify };

    match validate_selector(kernel)? {
        KernelSelector::Keyword(word) => Ok(Resolved {
            action: existing_action,
            kernel_id: shell_quote(&word),
            default_probe: None,
        }),
        KernelSelector::Reference(fields) if fields.len() == 1 => {
            let (key, value) = &fields[0];
            if *key == SelectorKey::Initrd {
                return Err(ReconcileError::AmbiguousInitrd);
            }
            Ok(Resolved {
                action: existing_action,
                kernel_id: render_kernel_id(*key, value),
                default_probe: Some((*key, value.clone())),
            })
        }
        KernelSelector::Reference(fields) => {
            resolve_reference(&fields, absent, existing_action, records)
        }
    }
}

/// Multi-key resolution: match against existing records, falling back to
/// creation when nothing matches at all.
fn resolve_reference(
    fields: &[(SelectorKey, String)],
    absent: bool,
    existing_action: Action,
    records: &[KernelRecord],
) -> Result<Resolved, ReconcileError> {
    let mut conflict: Option<(Vec<SelectorKey>, Vec<(SelectorKey, String, String)>)> = None;
    for record in records {
        let mut matched: Vec<SelectorKey> = Vec::new();
        let mut differing: Vec<(SelectorKey, String, String)> = Vec::new();
        for (key, value) in fields {
            let Some(actual) = record.get(key.record_field()) else {
                continue;
            };
            if actual == value {
                matched.push(*key);
            } else {
                differing.push((*key, value.clone(), actual.to_string()));
            }
        }
        if matched.is_empty() {
            continue;
        }
        if !differing.is_empty() {
            // Remember the first partial agreement, but keep scanning: a
            // later record may still match in full.
            if conflict.is_none() {
                conflict = Some((matched, differing));
            }
            continue;
        }
        // Full agreement on every shared field: modify or remove it,
        // identified by a modification-eligible key (never initrd).
        let (key, value) = modification_key(fields)
            .ok_or(ReconcileError::AmbiguousInitrd)?;
        return Ok(Resolved {
            action: existing_action,
            kernel_id: render_kernel_id(key, value),
            default_probe: Some((key, value.clone())),
        });
    }

    if let Some((matched, differing)) = conflict {
        // Partial agreement: the entry exists but the selector
        // contradicts it on some fields. Refusing is the only safe
        // move; acting could modify or clone the wrong entry.
        let matched_names = matched
            .iter()
            .map(|k| format!("'{}'", k.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        let differing_pairs = differing
            .iter()
            .map(|(k, wanted, actual)| {
                format!("{}: (requested '{}', found '{}')", k.as_str(), wanted, actual)
            })
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ReconcileError::ConflictingMatch {
            matched: matched_names,
            differing: differing_pairs,
        });
    }

    // No record matched even partially: this selector describes a new
    // entry and must carry exactly path, title, initrd.
    let mut path = None;
    let mut title = None;
    let mut initrd = None;
    for (key, value) in fields {
        match key {
            SelectorKey::Path => path = Some(value),
            SelectorKey::Title => title = Some(value),
            SelectorKey::Initrd => initrd = Some(value),
            SelectorKey::Index => {}
        }
    }
    let (Some(path), Some(title), Some(initrd)) = (path, title, initrd) else {
        return Err(ReconcileError::IncompleteCreate);
    };
    if fields.len() != 3 {
        return Err(ReconcileError::IncompleteCreate);
    }
    if absent {
        // Removing a kernel that does not exist: accepted no-op variant.
        return Ok(Resolved {
            action: Action::Remove,
            kernel_id: shell_quote(path),
            default_probe: Some((SelectorKey::Path, path.clone())),
        });
    }
    Ok(Resolved {
        action: Action::Create,
        kernel_id: format!(
            "--add-kernel={} --title={} --initrd={}",
            shell_quote(path),
            shell_quote(title),
            shell_quote(initrd)
        ),
        default_probe: Some((SelectorKey::Path, path.clone())),
    })
}

/// Pick the identifier attribute for modifying or removing an existing
/// entry: path wins over title, title over index; initrd never
/// identifies anything.
fn modification_key(fields: &[(SelectorKey, String)]) -> Option<(SelectorKey, &String)> {
    for wanted in [SelectorKey::Path, SelectorKey::Title, SelectorKey::Index] {
        if let Some((key, value)) = fields.iter().find(|(k, _)| *k == wanted) {
            return Some((*key, value));
        }
    }
    None
}

/// Render the grubby identifier for one attribute: the shell-quoted
/// value, with titles carried as `TITLE=<title>`.
pub(crate) fn render_kernel_id(key: SelectorKey, value: &str) -> String {
    match key {
        SelectorKey::Title => shell_quote(&format!("TITLE={value}")),
        _ => shell_quote(value),
    }
}
