//! In-memory operator for driving the engine without a terminal.

use crate::operator::Operator;
use anyhow::{Result, anyhow};
use std::collections::VecDeque;
use std::io::Write;

/// One scripted operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Key(char),
    Text(String),
    /// Closed input, as Ctrl-D on an empty line editor.
    Eof,
}

/// Memory-backed operator that replays a fixed script.
///
/// Everything the engine says, prompts included, is collected in a
/// transcript. Asking for a key when the script holds text (or the other way
/// round) is an error, so a test cannot drift out of step with the engine.
/// An exhausted script behaves like closed input.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    script: VecDeque<Input>,
    transcript: Vec<u8>,
}

impl ScriptedOperator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a key press.
    pub fn key(mut self, c: char) -> Self {
        self.script.push_back(Input::Key(c));
        self
    }

    /// Queue one key press per character of `keys`.
    pub fn keys(mut self, keys: &str) -> Self {
        self.script.extend(keys.chars().map(Input::Key));
        self
    }

    /// Queue a line of text.
    pub fn text(mut self, line: impl Into<String>) -> Self {
        self.script.push_back(Input::Text(line.into()));
        self
    }

    /// Queue closed input.
    pub fn eof(mut self) -> Self {
        self.script.push_back(Input::Eof);
        self
    }

    /// Inputs not consumed yet.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    /// Everything written so far.
    pub fn transcript(&self) -> String {
        String::from_utf8_lossy(&self.transcript).into_owned()
    }
}

impl Operator for ScriptedOperator {
    fn read_key(&mut self, prompt: &str) -> Result<Option<char>> {
        writeln!(self.transcript, "{prompt}")?;
        match self.script.pop_front() {
            Some(Input::Key(c)) => Ok(Some(c)),
            Some(Input::Eof) | None => Ok(None),
            Some(Input::Text(text)) => Err(anyhow!("expected a key press, script has {text:?}")),
        }
    }

    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        writeln!(self.transcript, "{prompt}")?;
        match self.script.pop_front() {
            Some(Input::Text(text)) => Ok(Some(text)),
            Some(Input::Eof) | None => Ok(None),
            Some(Input::Key(c)) => Err(anyhow!("expected a line of text, script has key {c:?}")),
        }
    }

    fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.transcript, "{text}")?;
        Ok(())
    }
}
