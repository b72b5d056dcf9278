//! Error taxonomy of the binding engine.
//!
//! Store errors are recovered by the prompt controller with a message to the
//! operator. Executor errors are fatal for the session.

use std::path::PathBuf;

/// Errors raised by a [`BindingStore`](crate::store::BindingStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The binding file exists but cannot be parsed.
    #[error("corrupt binding file {path}:{line}: {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// The binding cannot be written in the record format.
    #[error("cannot save binding for {key:?}: {reason}")]
    TemplateEncoding { key: char, reason: String },

    /// Reading or writing the binding file failed.
    #[error("binding file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by a [`CommandRunner`](crate::executor::CommandRunner).
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The subordinate process could not be started or waited for.
    #[error("cannot run {shell}: {reason}")]
    Unavailable { shell: String, reason: String },
}
