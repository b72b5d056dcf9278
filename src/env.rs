//! Environment handed to subordinate processes.

use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Name of the variable holding the current line in subordinate processes.
pub const LINE_VAR: &str = "SEDSHELL_LINE";

/// Process environment handed to every command the executor starts.
///
/// The environment contains:
/// - `vars`: variables visible to executed commands.
/// - `current_dir`: the working directory commands run in.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// The working directory for command execution.
    pub current_dir: PathBuf,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { vars, current_dir }
    }

    /// Get the value of an environment variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override an environment variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Copy of this environment with the current line exported.
    pub fn for_line(&self, line: &str) -> Self {
        let mut env = self.clone();
        env.set_var(LINE_VAR, line);
        env
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
