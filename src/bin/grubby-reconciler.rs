use std::io;
use std::path::Path;

use anyhow::{bail, Context, Result};
use grubby_reconciler::{apply_settings, gather_facts, input, ShellRunner};
use serde_json::json;

fn usage() -> &'static str {
    "Usage:\n  grubby-reconciler facts\n  grubby-reconciler apply <settings.json|->"
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.as_slice() {
        [facts] if facts == "facts" => print_facts(),
        [apply, source] if apply == "apply" => apply_from(source),
        _ => bail!(usage()),
    }
}

fn print_facts() -> Result<()> {
    let facts = gather_facts(&ShellRunner)?;
    let document = json!({ "bootloader_facts": facts });
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

fn apply_from(source: &str) -> Result<()> {
    let entries = if source == "-" {
        input::read_settings_from(io::stdin().lock())?
    } else {
        input::load_settings(Path::new(source))?
    };

    match apply_settings(&ShellRunner, &entries) {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(failure) => {
            // Surface what already ran before the failure; commands
            // executed for earlier entries are not rolled back.
            println!("{}", serde_json::to_string_pretty(&failure.partial)?);
            Err(failure.source).context("applying bootloader settings")
        }
    }
}
