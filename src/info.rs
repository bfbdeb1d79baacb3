//! Parsing of `grubby --info=ALL` output into kernel records.
//!
//! The format is line-oriented: a new entry starts at `index=<digits>`,
//! the following lines are `key="value"` (quotes optional on older
//! distributions), and anything else is a bare value for a malformed or
//! non-Linux entry. The parse is deliberately tolerant; grubby output
//! varies between releases and between bootloader backends.

use regex::Regex;
use serde_json::{json, Map, Value};

use crate::error::ReconcileError;
use crate::runner::{run_checked, CommandRunner};

/// One parsed boot entry.
///
/// Field order follows the order grubby printed them; identity within one
/// parse is positional by the `index` field. Records are built fresh per
/// run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelRecord {
    fields: Vec<(String, String)>,
    /// Whether this entry is the bootloader's current default.
    pub is_default: bool,
}

impl KernelRecord {
    fn new(is_default: bool) -> Self {
        Self {
            fields: Vec::new(),
            is_default,
        }
    }

    /// Look up a field by name.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a field, replacing any earlier value for the same key.
    fn set(&mut self, key: &str, value: &str) {
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value.to_string();
        } else {
            self.fields.push((key.to_string(), value.to_string()));
        }
    }

    /// All parsed fields, in print order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parse `grubby --info=ALL` output.
///
/// `default_index` is the separately queried `grubby --default-index`
/// output; the record whose `index` equals it is tagged as default.
/// Empty input yields an empty list. Lines that precede the first
/// `index=` line have no record to attach to and are dropped.
pub fn parse_info(info: &str, default_index: &str) -> Vec<KernelRecord> {
    let index_re = Regex::new(r"^index=(\d+)").unwrap();
    let kv_re = Regex::new(r"^(.*?)=(.*)$").unwrap();
    let default_index = default_index.trim();

    let mut records: Vec<KernelRecord> = Vec::new();
    for line in info.trim().lines() {
        if line.is_empty() {
            continue;
        }
        if let Some(caps) = index_re.captures(line) {
            let is_default = &caps[1] == default_index;
            records.push(KernelRecord::new(is_default));
        }
        let Some(current) = records.last_mut() else {
            continue;
        };
        if let Some(caps) = kv_re.captures(line) {
            let key = caps[1].trim_matches('"');
            let value = caps[2].trim_matches('"');
            current.set(key, value);
        } else {
            // Bare line: a non-Linux or otherwise malformed entry whose
            // only content is the kernel value itself.
            current.set("kernel", line);
        }
    }
    records
}

/// Serialize records for the read-only facts path: every parsed field
/// plus the derived `default` flag.
pub fn kernel_facts(records: &[KernelRecord]) -> Value {
    let entries: Vec<Value> = records
        .iter()
        .map(|record| {
            let mut obj = Map::new();
            for (key, value) in record.fields() {
                obj.insert(key.to_string(), json!(value));
            }
            obj.insert("default".to_string(), json!(record.is_default));
            Value::Object(obj)
        })
        .collect();
    Value::Array(entries)
}

/// Query the bootloader and return current kernel facts.
///
/// The read-only inventory path: two grubby queries, one parse, no
/// mutation.
pub fn gather_facts(runner: &dyn CommandRunner) -> Result<Value, ReconcileError> {
    let info = run_checked(runner, "grubby --info=ALL")?;
    let default_index = run_checked(runner, "grubby --default-index")?;
    Ok(kernel_facts(&parse_info(
        &info.stdout,
        &default_index.stdout,
    )))
}
