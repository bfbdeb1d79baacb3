//! Error taxonomy for selector validation and command execution.
//!
//! Every variant is a terminal classification: nothing here is retried.
//! Validation errors are raised before any mutating command runs for the
//! entry that failed, so a failed entry never leaves partial state behind.
//! Commands already executed for earlier entries are not rolled back.

use thiserror::Error;

/// Failure raised while resolving a declarative entry or driving grubby.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The `state` field was supplied with something other than
    /// `present` or `absent`.
    #[error("state must be one of 'present, absent'")]
    SelectorState,

    /// The selector's `kernel` value, a mapping key, or a mapping value
    /// has the wrong shape. The message echoes the offending input.
    #[error("{0}")]
    SelectorShape(String),

    /// A string-form selector that is not one of the allowed keywords.
    #[error("kernel {0} is of type str, it must be one of 'DEFAULT, ALL'")]
    SelectorKeyword(String),

    /// `initrd` was supplied as the only selector key. An initrd alone
    /// cannot identify an existing entry; it is only meaningful when
    /// creating one.
    #[error(
        "you can use 'initrd' as a kernel key only when creating a kernel; \
         to modify or remove an existing kernel, use one of path, title, index"
    )]
    AmbiguousInitrd,

    /// A multi-key selector agreed with an existing entry on some fields
    /// but disagreed on others.
    #[error("a kernel matching {matched} already exists but differs on {differing}")]
    ConflictingMatch { matched: String, differing: String },

    /// The selector matched nothing, so it would create an entry, but it
    /// does not carry the three keys a creation needs.
    #[error("to create a kernel, you must provide 3 kernel keys - 'path, title, initrd'")]
    IncompleteCreate,

    /// More than one entry declared `default: true`, or a `default: true`
    /// entry used a keyword selector that cannot name a single kernel.
    #[error("{0}")]
    DefaultConflict(String),

    /// grubby reported "Permission denied". Fatal; nothing else is tried.
    #[error("you must run this with elevated privileges (command '{0}' was denied)")]
    Permission(String),

    /// A grubby invocation exited non-zero.
    #[error("command '{command}' failed with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    /// The command runner itself failed (e.g. the shell could not spawn).
    #[error(transparent)]
    Runner(#[from] anyhow::Error),
}
