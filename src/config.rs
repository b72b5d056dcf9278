//! Where bindings live and what to do when they cannot be read.

use crate::error::StoreError;
use crate::store::FileStore;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_VAR: &str = "SEDSHELL_CONFIG_DIR";

/// Binding file name inside the configuration directory.
pub const BINDINGS_FILE: &str = "bindings";

const APP_DIR: &str = "sedshell";

/// Reaction to a binding file that exists but cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorruptPolicy {
    /// Report it, move it aside and start without bindings.
    #[default]
    Empty,
    /// Report it and stop before reading any line.
    Abort,
}

impl FromStr for CorruptPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "empty" => Ok(CorruptPolicy::Empty),
            "abort" => Ok(CorruptPolicy::Abort),
            other => Err(format!("expected `empty` or `abort`, got `{other}`")),
        }
    }
}

impl fmt::Display for CorruptPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CorruptPolicy::Empty => "empty",
            CorruptPolicy::Abort => "abort",
        })
    }
}

/// Settings for one run, resolved from the command line.
#[derive(Debug, Clone)]
pub struct Config {
    /// File to read lines from; standard input when `None`.
    pub input: Option<PathBuf>,
    pub bindings_path: PathBuf,
    /// Shell for commands; `sh` on `PATH` when `None`.
    pub shell: Option<PathBuf>,
    pub corrupt_policy: CorruptPolicy,
    pub debug: bool,
}

/// Default configuration directory.
///
/// `$SEDSHELL_CONFIG_DIR`, else the platform config directory, else
/// `~/.config`, else the working directory.
pub fn default_config_dir() -> PathBuf {
    config_dir_from(
        std::env::var_os(CONFIG_DIR_VAR),
        dirs::config_dir(),
        dirs::home_dir(),
    )
}

fn config_dir_from(
    env_value: Option<OsString>,
    platform: Option<PathBuf>,
    home: Option<PathBuf>,
) -> PathBuf {
    if let Some(dir) = env_value.filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    platform
        .map(|p| p.join(APP_DIR))
        .or_else(|| home.map(|h| h.join(".config").join(APP_DIR)))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR))
}

/// A corrupt binding file that was set aside under [`CorruptPolicy::Empty`].
#[derive(Debug)]
pub struct Recovered {
    pub error: StoreError,
    pub moved_to: PathBuf,
}

#[derive(Debug)]
pub struct OpenedStore {
    pub store: FileStore,
    pub recovered: Option<Recovered>,
}

/// Load the binding file at `path`, applying `policy` if it is corrupt.
///
/// Under [`CorruptPolicy::Abort`] the corrupt error is returned. Other I/O
/// errors are always returned.
pub fn open_store(path: &Path, policy: CorruptPolicy) -> Result<OpenedStore, StoreError> {
    match FileStore::load(path) {
        Ok(store) => Ok(OpenedStore {
            store,
            recovered: None,
        }),
        Err(error @ StoreError::Corrupt { .. }) => match policy {
            CorruptPolicy::Abort => Err(error),
            CorruptPolicy::Empty => {
                warn!(%error, "starting with no bindings");
                let moved_to = FileStore::quarantine(path)?;
                Ok(OpenedStore {
                    store: FileStore::empty(path),
                    recovered: Some(Recovered { error, moved_to }),
                })
            }
        },
        Err(error) => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{Binding, Mode, Template};
    use crate::store::BindingStore;
    use std::fs;

    #[test]
    fn policy_parses() {
        assert_eq!("empty".parse(), Ok(CorruptPolicy::Empty));
        assert_eq!("abort".parse(), Ok(CorruptPolicy::Abort));
        assert!("ignore".parse::<CorruptPolicy>().is_err());
        assert_eq!(CorruptPolicy::default().to_string(), "empty");
    }

    #[test]
    fn config_dir_precedence() {
        let platform = Some(PathBuf::from("/xdg"));
        let home = Some(PathBuf::from("/home/op"));
        assert_eq!(
            config_dir_from(Some("/custom".into()), platform.clone(), home.clone()),
            PathBuf::from("/custom")
        );
        assert_eq!(
            config_dir_from(Some("".into()), platform.clone(), home.clone()),
            PathBuf::from("/xdg/sedshell")
        );
        assert_eq!(
            config_dir_from(None, None, home),
            PathBuf::from("/home/op/.config/sedshell")
        );
        assert_eq!(config_dir_from(None, None, None), PathBuf::from("./sedshell"));
    }

    #[test]
    fn corrupt_store_with_empty_policy_is_set_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bindings");
        fs::write(&path, "this is not a binding\n").unwrap();

        let mut opened = open_store(&path, CorruptPolicy::Empty).unwrap();
        let recovered = opened.recovered.expect("corruption reported");
        assert!(matches!(recovered.error, StoreError::Corrupt { line: 1, .. }));
        assert!(opened.store.bindings().is_empty());

        opened
            .store
            .set(Binding::new('d', Template::new("rm"), Mode::Consume))
            .unwrap();
        assert_eq!(
            fs::read_to_string(&recovered.moved_to).unwrap(),
            "this is not a binding\n"
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), "d\t!\trm\n");
    }

    #[test]
    fn corrupt_store_with_abort_policy_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bindings");
        fs::write(&path, "x\n").unwrap();

        let err = open_store(&path, CorruptPolicy::Abort).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(path.exists());
    }

    #[test]
    fn healthy_store_opens_without_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bindings");
        fs::write(&path, "d\t&\tls -l\n").unwrap();

        let opened = open_store(&path, CorruptPolicy::Abort).unwrap();
        assert!(opened.recovered.is_none());
        assert_eq!(opened.store.get('d').unwrap().mode, Mode::Keep);
    }
}
