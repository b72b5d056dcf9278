//! Keystroke state machine deciding what happens to one line.
//!
//! Every line starts in [`State::AwaitingKey`] and ends in either
//! [`State::LineDone`] or [`State::SessionAbort`]. Text input (commands,
//! patterns) and binding keys are separate states so each read from the
//! operator is exactly one transition.

use crate::binding::{Binding, Mode, Template, format_key};
use crate::executor::{CommandRunner, ExecutionOutcome};
use crate::operator::Operator;
use crate::session::{AdHoc, SessionState};
use crate::skip::{SkipFilter, SkipKind};
use crate::store::BindingStore;
use anyhow::Result;
use tracing::{debug, warn};

/// Builtin actions. Their keys cannot be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Skip,
    Run(Mode),
    Repeat,
    Save,
    RunRaw,
    Shell,
    StartSkipping(SkipKind),
    Help,
    Quit,
}

impl Action {
    /// Every action with its key, in help order.
    pub const ALL: [(char, Action); 11] = [
        (' ', Action::Skip),
        ('!', Action::Run(Mode::Consume)),
        ('&', Action::Run(Mode::Keep)),
        ('^', Action::Repeat),
        ('>', Action::Save),
        ('<', Action::RunRaw),
        ('$', Action::Shell),
        ('\\', Action::StartSkipping(SkipKind::While)),
        ('/', Action::StartSkipping(SkipKind::Until)),
        ('?', Action::Help),
        ('\x04', Action::Quit),
    ];

    pub fn from_key(key: char) -> Option<Action> {
        match key {
            // Ctrl-C quits as well, but stays out of the help menu.
            '\x03' => Some(Action::Quit),
            _ => Self::ALL
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, action)| *action),
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Action::Skip => "Skip this line",
            Action::Run(Mode::Consume) => "Run a shell command on the line ({} is the line)",
            Action::Run(Mode::Keep) => "Run a shell command, but stay on the line ({} is the line)",
            Action::Repeat => "Repeat the last command",
            Action::Save => "Save the last command to a key",
            Action::RunRaw => "Run a command and print output (ignoring line)",
            Action::Shell => "Start an interactive shell ($SEDSHELL_LINE holds the line)",
            Action::StartSkipping(SkipKind::While) => {
                "Skip lines while a regular expression matches"
            }
            Action::StartSkipping(SkipKind::Until) => {
                "Skip lines until a regular expression matches"
            }
            Action::Help => "List commands",
            Action::Quit => "Exit",
        }
    }
}

/// States of the per-line machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    AwaitingKey,
    EnteringAdHocCommand(Mode),
    EnteringRawCommand,
    EnteringBindingKey,
    EnteringSkipPattern(SkipKind),
    LineDone,
    SessionAbort,
}

/// How processing of a line ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Move on to the next line.
    Done,
    /// The operator asked to stop the session.
    Quit,
}

/// Drives one line from the first key press to a terminal state.
///
/// Borrows the session's collaborators for the duration of one line only.
pub struct PromptController<'a> {
    store: &'a mut dyn BindingStore,
    runner: &'a mut dyn CommandRunner,
    operator: &'a mut dyn Operator,
}

impl<'a> PromptController<'a> {
    pub fn new(
        store: &'a mut dyn BindingStore,
        runner: &'a mut dyn CommandRunner,
        operator: &'a mut dyn Operator,
    ) -> Self {
        Self {
            store,
            runner,
            operator,
        }
    }

    /// Process `line` until the operator is done with it.
    ///
    /// Errors are fatal for the session: the executor could not start a
    /// process, or talking to the operator failed. Everything else is
    /// reported to the operator and handled here.
    pub fn process_line(&mut self, state: &mut SessionState, line: &str) -> Result<LineOutcome> {
        let mut current = State::AwaitingKey;
        loop {
            let next = match current {
                State::LineDone => return Ok(LineOutcome::Done),
                State::SessionAbort => return Ok(LineOutcome::Quit),
                State::AwaitingKey => self.await_key(state, line)?,
                State::EnteringAdHocCommand(mode) => self.enter_ad_hoc(state, line, mode)?,
                State::EnteringRawCommand => self.enter_raw(state)?,
                State::EnteringBindingKey => self.enter_binding_key(state)?,
                State::EnteringSkipPattern(kind) => self.enter_skip_pattern(state, line, kind)?,
            };
            debug!(from = ?current, to = ?next, "transition");
            current = next;
        }
    }

    fn await_key(&mut self, state: &mut SessionState, line: &str) -> Result<State> {
        let Some(key) = self.operator.read_key(line)? else {
            return Ok(State::SessionAbort);
        };

        if let Some(action) = Action::from_key(key) {
            return self.perform(action, state, line);
        }

        if let Some(binding) = self.store.get(key).cloned() {
            debug!(key = %format_key(key), template = %binding.template, "running binding");
            let outcome = self.runner.run(&binding.template, line)?;
            state.commands_run += 1;
            return self.report(&outcome, binding.mode);
        }

        self.operator
            .say(&format!("No binding for {} (? for help)", format_key(key)))?;
        Ok(State::AwaitingKey)
    }

    fn perform(&mut self, action: Action, state: &mut SessionState, line: &str) -> Result<State> {
        match action {
            Action::Skip => Ok(State::LineDone),
            Action::Run(mode) => Ok(State::EnteringAdHocCommand(mode)),
            Action::Repeat => {
                let Some(last) = state.last_ad_hoc.clone() else {
                    self.operator.say("No command to repeat yet")?;
                    return Ok(State::AwaitingKey);
                };
                let outcome = self.runner.run(&last.template, line)?;
                state.commands_run += 1;
                self.report(&outcome, last.mode)
            }
            Action::Save => {
                if state.last_ad_hoc.is_none() {
                    self.operator.say("No command to save yet")?;
                    return Ok(State::AwaitingKey);
                }
                Ok(State::EnteringBindingKey)
            }
            Action::RunRaw => Ok(State::EnteringRawCommand),
            Action::Shell => {
                let code = self.runner.run_interactive_shell(line)?;
                if code != 0 {
                    self.operator.say(&format!("[shell exited with {code}]"))?;
                }
                Ok(State::LineDone)
            }
            Action::StartSkipping(kind) => Ok(State::EnteringSkipPattern(kind)),
            Action::Help => {
                let help = self.help();
                self.operator.say(&help)?;
                Ok(State::AwaitingKey)
            }
            Action::Quit => Ok(State::SessionAbort),
        }
    }

    fn enter_ad_hoc(&mut self, state: &mut SessionState, line: &str, mode: Mode) -> Result<State> {
        let Some(text) = self.operator.read_line("Command: ")? else {
            return Ok(State::AwaitingKey);
        };
        let text = text.trim();
        if text.is_empty() {
            self.operator.say("No command entered")?;
            return Ok(State::AwaitingKey);
        }

        let template = Template::new(text);
        state.last_ad_hoc = Some(AdHoc {
            template: template.clone(),
            mode,
        });
        let outcome = self.runner.run(&template, line)?;
        state.commands_run += 1;
        self.report(&outcome, mode)
    }

    fn enter_raw(&mut self, state: &mut SessionState) -> Result<State> {
        let Some(text) = self.operator.read_line("Command: ")? else {
            return Ok(State::AwaitingKey);
        };
        let text = text.trim();
        if text.is_empty() {
            self.operator.say("No command entered")?;
            return Ok(State::AwaitingKey);
        }
        let outcome = self.runner.run_raw(text)?;
        state.commands_run += 1;
        self.report(&outcome, Mode::Keep)
    }

    fn enter_binding_key(&mut self, state: &mut SessionState) -> Result<State> {
        let Some(last) = state.last_ad_hoc.clone() else {
            self.operator.say("No command to save yet")?;
            return Ok(State::AwaitingKey);
        };
        let Some(key) = self.operator.read_key("Command letter?")? else {
            return Ok(State::AwaitingKey);
        };
        if let Some(action) = Action::from_key(key) {
            self.operator.say(&format!(
                "{} is reserved for: {}",
                format_key(key),
                action.describe()
            ))?;
            return Ok(State::AwaitingKey);
        }

        let binding = Binding::new(key, last.template, last.mode);
        let shown = binding.to_string();
        match self.store.set(binding.clone()) {
            Ok(Some(previous)) if previous != binding => {
                self.operator.say(&format!(
                    "{shown} (replaces {} {})",
                    previous.mode.symbol(),
                    previous.template
                ))?;
            }
            Ok(_) => self.operator.say(&shown)?,
            Err(e) => {
                warn!(error = %e, "binding not saved");
                self.operator.say(&format!("Binding not saved: {e}"))?;
            }
        }
        Ok(State::AwaitingKey)
    }

    fn enter_skip_pattern(
        &mut self,
        state: &mut SessionState,
        line: &str,
        kind: SkipKind,
    ) -> Result<State> {
        let Some(pattern) = self.operator.read_line("Regex: ")? else {
            return Ok(State::AwaitingKey);
        };
        let filter = match SkipFilter::new(kind, &pattern) {
            Ok(f) => f,
            Err(e) => {
                self.operator.say(&format!("Invalid regex: {e}"))?;
                return Ok(State::AwaitingKey);
            }
        };
        if filter.skips(line) {
            state.skip = Some(filter);
            Ok(State::LineDone)
        } else {
            Ok(State::AwaitingKey)
        }
    }

    /// Show what a command printed. Failures are reported but do not keep the
    /// operator on the line; only keep-mode commands do.
    fn report(&mut self, outcome: &ExecutionOutcome, mode: Mode) -> Result<State> {
        let stdout = String::from_utf8_lossy(&outcome.stdout);
        let stderr = String::from_utf8_lossy(&outcome.stderr);
        if !stdout.is_empty() {
            self.operator.say(stdout.trim_end_matches('\n'))?;
        }
        if !stderr.is_empty() {
            self.operator.say(stderr.trim_end_matches('\n'))?;
        }
        if !outcome.success() {
            self.operator.say(&format!("[exit status {}]", outcome.code))?;
        }
        Ok(match mode {
            Mode::Consume => State::LineDone,
            Mode::Keep => State::AwaitingKey,
        })
    }

    fn help(&self) -> String {
        let mut text = String::new();
        for (key, action) in Action::ALL {
            text.push_str(&format!("{} - {}\n", format_key(key), action.describe()));
        }
        text.push_str("{} may sit inside quotes; a command without it gets the line appended\n");
        let bindings = self.store.bindings();
        if !bindings.is_empty() {
            text.push('\n');
            for b in bindings {
                text.push_str(&format!("{b}\n"));
            }
        }
        text
    }
}
