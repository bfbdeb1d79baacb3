//! Declarative management of Linux bootloader kernel entries through
//! the `grubby` command-line tool.
//!
//! The crate reconciles a desired-state description against the live
//! boot configuration: it parses grubby's `--info=ALL` text into kernel
//! records, resolves each declarative selector into a create/modify/
//! remove decision, diffs the kernel's boot-argument string against the
//! requested settings, and issues the minimal set of grubby commands to
//! converge. Re-running against converged state issues nothing.
//!
//! # Architecture
//!
//! ```text
//! input ──► selector ──► options ──► command ──► runner
//!   │          │            │           │          │
//!   │     classifies   computes the  renders    executes
//!   │     create /     args delta    shell-safe (injected,
//!   │     modify /                   grubby      scripted
//!   │     remove                     commands    in tests)
//!   │
//!   └──► apply drives the loop per entry, re-querying state each time;
//!        default_kernel validates and applies default declarations;
//!        info parses grubby output into records.
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use grubby_reconciler::{apply_settings, input, ShellRunner};
//!
//! let entries = input::parse_settings(
//!     r#"[{"kernel": {"index": 0}, "options": [{"name": "quiet"}]}]"#,
//! )?;
//! let result = apply_settings(&ShellRunner, &entries)?;
//! println!("changed: {}", result.changed);
//! ```

pub mod apply;
pub mod command;
pub mod default_kernel;
pub mod error;
pub mod info;
pub mod input;
pub mod options;
pub mod runner;
pub mod selector;

pub use apply::{apply_settings, ApplyFailure, RunResult};
pub use error::ReconcileError;
pub use info::gather_facts;
pub use input::SettingEntry;
pub use runner::{CommandRunner, ShellRunner};
