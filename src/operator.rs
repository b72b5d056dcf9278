//! Talking to the person at the keyboard.

use crate::binding::format_key;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use rustyline::config::{Behavior, Config};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;

/// Source of operator decisions and sink for feedback.
pub trait Operator {
    /// Show `prompt` and wait for a single key.
    ///
    /// Returns `None` when the operator closed their input.
    fn read_key(&mut self, prompt: &str) -> Result<Option<char>>;

    /// Show `prompt` and read a line of text.
    ///
    /// Returns `None` when the operator cancelled the input.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;

    /// Write feedback: help text, command output, error reports.
    fn say(&mut self, text: &str) -> Result<()>;
}

/// Operator on the controlling terminal.
///
/// Keys are read in raw mode and text through a line editor, both from the
/// terminal rather than from standard input, so lines can be piped in.
/// Feedback goes to standard error.
pub struct TerminalOperator {
    editor: DefaultEditor,
    out: Box<dyn Write>,
}

impl TerminalOperator {
    pub fn new() -> Result<Self> {
        let config = Config::builder()
            .behavior(Behavior::PreferTerm)
            .auto_add_history(true)
            .build();
        Ok(Self {
            editor: DefaultEditor::with_config(config)?,
            out: Box::new(std::io::stderr()),
        })
    }
}

/// Leaves raw mode when dropped, also on early returns.
struct RawMode;

impl RawMode {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Translate a key press into the character the controller dispatches on.
///
/// Control combinations become ASCII control characters (`C-d` is `'\x04'`).
fn key_char(code: KeyCode, modifiers: KeyModifiers) -> Option<char> {
    match code {
        KeyCode::Char(c) if modifiers.contains(KeyModifiers::CONTROL) => {
            if c.is_ascii_alphabetic() {
                Some(((c.to_ascii_lowercase() as u8) & 0x1f) as char)
            } else {
                None
            }
        }
        KeyCode::Char(c) => Some(c),
        KeyCode::Enter => Some('\r'),
        KeyCode::Tab => Some('\t'),
        KeyCode::Esc => Some('\x1b'),
        _ => None,
    }
}

impl Operator for TerminalOperator {
    fn read_key(&mut self, prompt: &str) -> Result<Option<char>> {
        write!(self.out, "{prompt} ")?;
        self.out.flush()?;

        let key = {
            let _raw = RawMode::enable()?;
            loop {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if let Some(c) = key_char(key.code, key.modifiers) {
                        break c;
                    }
                }
            }
        };

        writeln!(self.out, "{}", format_key(key))?;
        Ok(Some(key))
    }

    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Some(line)),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{text}")?;
        self.out.flush()?;
        Ok(())
    }
}
