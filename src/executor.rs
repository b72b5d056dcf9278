//! Running commands in a real shell.
//!
//! The current line is never spliced into a script. It travels as the
//! shell's first positional argument and as `$SEDSHELL_LINE`.

use crate::binding::Template;
use crate::env::Environment;
use crate::error::ExecutorError;
use std::borrow::Cow;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::debug;

/// Conventional process exit code: 0 for success, anything else for failure.
pub type ExitCode = i32;

/// Shell used for commands when none is configured.
pub const DEFAULT_SHELL: &str = "sh";

/// `$0` of the scripts we hand to the shell.
const SCRIPT_NAME: &str = "sedshell";

/// Result of running one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub code: ExitCode,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ExecutionOutcome {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Runs operator-supplied commands in subordinate processes.
///
/// A non-zero exit code is an ordinary [`ExecutionOutcome`]. An `Err` means
/// no process could be run at all.
pub trait CommandRunner {
    /// Run `template` with `line` substituted for its placeholder.
    fn run(&mut self, template: &Template, line: &str) -> Result<ExecutionOutcome, ExecutorError>;

    /// Run `command` as typed, without the line.
    fn run_raw(&mut self, command: &str) -> Result<ExecutionOutcome, ExecutorError>;

    /// Hand the terminal to an interactive shell until it exits.
    fn run_interactive_shell(&mut self, line: &str) -> Result<ExitCode, ExecutorError>;
}

/// [`CommandRunner`] that starts a real shell for every command.
///
/// Commands run as `<shell> -c <script> sedshell <line>`, so the script sees
/// the line as `"$1"` and as `$SEDSHELL_LINE`.
#[derive(Debug)]
pub struct ShellExecutor {
    shell: PathBuf,
    interactive_shell: PathBuf,
    env: Environment,
}

impl ShellExecutor {
    /// Resolve `shell` (default [`DEFAULT_SHELL`]) on `PATH`.
    ///
    /// The interactive shell is `$SHELL`, falling back to the command shell.
    pub fn new(env: Environment, shell: Option<&Path>) -> Result<Self, ExecutorError> {
        let requested = shell.unwrap_or_else(|| Path::new(DEFAULT_SHELL));
        let search_paths = env.get_var("PATH").unwrap_or_default();
        let shell = find_command_path(OsStr::new(&search_paths), requested)
            .map(Cow::into_owned)
            .ok_or_else(|| ExecutorError::Unavailable {
                shell: requested.display().to_string(),
                reason: "not found".to_string(),
            })?;

        let interactive_shell = env
            .get_var("SHELL")
            .filter(|s| !s.is_empty())
            .and_then(|s| {
                find_command_path(OsStr::new(&search_paths), Path::new(&s)).map(Cow::into_owned)
            })
            .unwrap_or_else(|| shell.clone());

        debug!(shell = %shell.display(), interactive = %interactive_shell.display(), "executor ready");
        Ok(Self {
            shell,
            interactive_shell,
            env,
        })
    }

    fn unavailable(&self, shell: &Path, err: std::io::Error) -> ExecutorError {
        ExecutorError::Unavailable {
            shell: shell.display().to_string(),
            reason: err.to_string(),
        }
    }

    fn capture(&self, mut cmd: Command) -> Result<ExecutionOutcome, ExecutorError> {
        let output = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| self.unavailable(&self.shell, e))?;
        let code = match output.status.code() {
            Some(x) => x,
            None => terminated_by_signal(output.status),
        };
        debug!(code, "command finished");
        Ok(ExecutionOutcome {
            code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

impl CommandRunner for ShellExecutor {
    fn run(&mut self, template: &Template, line: &str) -> Result<ExecutionOutcome, ExecutorError> {
        let script = template.script();
        debug!(%script, line, "running command");
        let env = self.env.for_line(line);
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&script)
            .arg(SCRIPT_NAME)
            .arg(line)
            .envs(env.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&env.current_dir);
        self.capture(cmd)
    }

    fn run_raw(&mut self, command: &str) -> Result<ExecutionOutcome, ExecutorError> {
        debug!(command, "running raw command");
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .envs(self.env.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&self.env.current_dir);
        self.capture(cmd)
    }

    fn run_interactive_shell(&mut self, line: &str) -> Result<ExitCode, ExecutorError> {
        debug!(shell = %self.interactive_shell.display(), line, "starting interactive shell");
        let env = self.env.for_line(line);
        let (stdin, stdout, stderr) = terminal_stdio();
        let mut child = Command::new(&self.interactive_shell)
            .arg("-i")
            .envs(env.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&env.current_dir)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|e| self.unavailable(&self.interactive_shell, e))?;
        let exit_status = child
            .wait()
            .map_err(|e| self.unavailable(&self.interactive_shell, e))?;
        Ok(match exit_status.code() {
            Some(x) => x,
            None => terminated_by_signal(exit_status),
        })
    }
}

/// Standard streams attached to the controlling terminal.
///
/// Standard input usually carries the lines being triaged, so an interactive
/// shell has to read from the terminal instead.
#[cfg(unix)]
fn terminal_stdio() -> (Stdio, Stdio, Stdio) {
    let tty = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/tty");
    let streams = tty.and_then(|tty| Ok((tty.try_clone()?, tty.try_clone()?, tty)));
    match streams {
        Ok((i, o, e)) => (i.into(), o.into(), e.into()),
        Err(err) => {
            debug!(%err, "no controlling terminal, inheriting streams");
            (Stdio::inherit(), Stdio::inherit(), Stdio::inherit())
        }
    }
}

#[cfg(not(unix))]
fn terminal_stdio() -> (Stdio, Stdio, Stdio) {
    (Stdio::inherit(), Stdio::inherit(), Stdio::inherit())
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it exists.
/// - Relative with multiple components (e.g., `bin/sh`): returns it if it exists.
/// - `./foo` on Unix or any `./`-prefixed path on other platforms: returns it if it exists.
/// - Single path component (no separators): search each directory in `search_paths` (PATH)
///   and return the first existing match.
/// - Empty path: returns `None`.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let search_in_current_dir = cfg!(not(unix)) || path.starts_with("./");
    if search_in_current_dir && path.exists() {
        return Some(Cow::Borrowed(path));
    }

    let mut components = path.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        (None, None) => None,
        (Some(x), None) => find_in_path(search_paths, x.as_os_str()).map(Cow::Owned),
        _ => find_by_path(path).map(Cow::Borrowed),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(cmd))
        .find(|path| path.exists())
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.exists() { Some(path) } else { None }
}
