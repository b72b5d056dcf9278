//! The loop over input lines and the state that outlives a single line.

use crate::binding::{Mode, Template};
use crate::controller::{LineOutcome, PromptController};
use crate::executor::CommandRunner;
use crate::operator::Operator;
use crate::skip::SkipFilter;
use crate::store::BindingStore;
use anyhow::{Context, Result};
use std::io::BufRead;
use tracing::{debug, info};

/// The last command typed with `!` or `&`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdHoc {
    pub template: Template,
    pub mode: Mode,
}

/// Per-run state shared by the lines of one session.
#[derive(Debug, Default)]
pub struct SessionState {
    /// Candidate for `^` (repeat) and `>` (save).
    pub last_ad_hoc: Option<AdHoc>,
    /// Active skip filter, consulted before each line is prompted.
    pub skip: Option<SkipFilter>,
    pub commands_run: usize,
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Every line was handled.
    Exhausted,
    /// The operator quit.
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub lines_read: usize,
    pub lines_prompted: usize,
    pub lines_filtered: usize,
    pub commands_run: usize,
    pub end: SessionEnd,
}

/// One run of the engine over a line source.
///
/// Owns the store, the command runner and the operator, and lends them to a
/// [`PromptController`] one line at a time.
pub struct Session<S, R, O> {
    store: S,
    runner: R,
    operator: O,
    state: SessionState,
}

impl<S, R, O> Session<S, R, O>
where
    S: BindingStore,
    R: CommandRunner,
    O: Operator,
{
    pub fn new(store: S, runner: R, operator: O) -> Self {
        Self {
            store,
            runner,
            operator,
            state: SessionState::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn operator(&self) -> &O {
        &self.operator
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Offer every non-blank line of `input` to the operator, in order.
    ///
    /// Lines are read one at a time as they are needed. Fails when the input
    /// cannot be read, the operator cannot be reached, or no command can be
    /// started.
    pub fn run(&mut self, input: impl BufRead) -> Result<SessionSummary> {
        self.operator.say("sedshell")?;
        self.operator
            .say("? - for help. Run with --help for documentation\n")?;

        let mut lines_read = 0;
        let mut lines_prompted = 0;
        let mut lines_filtered = 0;
        let mut end = SessionEnd::Exhausted;

        for (idx, line) in input.lines().enumerate() {
            let line = line.with_context(|| format!("reading input line {}", idx + 1))?;
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if line.trim().is_empty() {
                continue;
            }
            lines_read += 1;

            if let Some(filter) = &self.state.skip {
                if filter.skips(line) {
                    debug!(line, "filtered");
                    lines_filtered += 1;
                    continue;
                }
                debug!(line, "skip filter finished");
                self.state.skip = None;
            }

            lines_prompted += 1;
            let outcome = PromptController::new(&mut self.store, &mut self.runner, &mut self.operator)
                .process_line(&mut self.state, line)?;
            if outcome == LineOutcome::Quit {
                end = SessionEnd::Quit;
                break;
            }
        }

        let summary = SessionSummary {
            lines_read,
            lines_prompted,
            lines_filtered,
            commands_run: self.state.commands_run,
            end,
        };
        info!(?summary, "session finished");
        Ok(summary)
    }
}
