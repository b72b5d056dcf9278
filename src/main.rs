use anyhow::{Context, Result};
use argh::FromArgs;
use sedshell::config::{self, BINDINGS_FILE, Config, CorruptPolicy};
use sedshell::env::Environment;
use sedshell::error::StoreError;
use sedshell::operator::{Operator, TerminalOperator};
use sedshell::{Session, SessionEnd, ShellExecutor};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// Run shell commands on lines read from a file or standard input, choosing
/// what to do with each line by a single key press. Press ? for the keys.
struct Args {
    #[argh(positional)]
    /// file to read lines from; standard input when omitted
    input: Option<PathBuf>,

    #[argh(option, short = 'C')]
    /// directory to store configuration and data
    config_dir: Option<PathBuf>,

    #[argh(option)]
    /// binding file to use instead of <config-dir>/bindings
    bindings: Option<PathBuf>,

    #[argh(option)]
    /// shell used to run commands (default: sh)
    shell: Option<PathBuf>,

    #[argh(option, default = "CorruptPolicy::Empty")]
    /// what to do with an unreadable binding file: empty or abort
    on_corrupt_store: CorruptPolicy,

    #[argh(switch)]
    /// print debug output
    debug: bool,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let bindings_path = args.bindings.unwrap_or_else(|| {
            args.config_dir
                .unwrap_or_else(config::default_config_dir)
                .join(BINDINGS_FILE)
        });
        Config {
            input: args.input,
            bindings_path,
            shell: args.shell,
            corrupt_policy: args.on_corrupt_store,
            debug: args.debug,
        }
    }
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run(config: Config) -> Result<ExitCode> {
    let mut operator = TerminalOperator::new().context("cannot open the terminal")?;

    let opened = match config::open_store(&config.bindings_path, config.corrupt_policy) {
        Ok(opened) => opened,
        Err(e @ StoreError::Corrupt { .. }) => {
            debug!(error = %e, "refusing to start");
            eprintln!("sedshell: {e}");
            eprintln!("sedshell: fix the file or rerun with --on-corrupt-store empty");
            return Ok(ExitCode::from(2));
        }
        Err(e) => return Err(e.into()),
    };
    if let Some(recovered) = &opened.recovered {
        operator.say(&format!(
            "{}\nStarting with no bindings; the old file was moved to {}",
            recovered.error,
            recovered.moved_to.display()
        ))?;
    }

    let executor = ShellExecutor::new(Environment::new(), config.shell.as_deref())?;

    let input: Box<dyn BufRead> = match &config.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("cannot open {}", path.display()))?,
        )),
        None => Box::new(std::io::stdin().lock()),
    };

    let mut session = Session::new(opened.store, executor, operator);
    let summary = session.run(input)?;
    if summary.end == SessionEnd::Quit {
        debug!(lines = summary.lines_prompted, "operator quit");
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();
    let config = Config::from(args);
    init_logging(config.debug);
    debug!(?config, "starting");

    match run(config) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
