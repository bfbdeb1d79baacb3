//! Deserialization of the declarative settings document.
//!
//! The document is an ordered JSON list of entries. The `kernel` value
//! stays a raw [`serde_json::Value`] here; the selector resolver owns
//! shape validation and its error wording, so deserialization must not
//! reject shapes the resolver wants to report on.

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::options::ArgumentSetting;

/// One declarative entry: which kernel, what state, which arguments,
/// and whether it should be the default.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingEntry {
    pub kernel: Value,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub options: Vec<ArgumentSetting>,
    #[serde(default)]
    pub default: bool,
}

/// Parse a settings document from a JSON string.
pub fn parse_settings(json: &str) -> Result<Vec<SettingEntry>> {
    serde_json::from_str(json).context("parsing bootloader settings document")
}

/// Load a settings document from a file.
pub fn load_settings(path: &Path) -> Result<Vec<SettingEntry>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading settings file '{}'", path.display()))?;
    parse_settings(&text)
}

/// Load a settings document from standard input.
pub fn read_settings_from(mut reader: impl Read) -> Result<Vec<SettingEntry>> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .context("reading settings from stdin")?;
    parse_settings(&text)
}
