//! Key bindings and the command templates they run.

use std::fmt;

/// Marker replaced by the current line when a template is expanded.
pub const PLACEHOLDER: &str = "{}";

/// What happens to the current line after a command ran on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A successful run finishes the line.
    Consume,
    /// The line stays current so other actions can follow.
    Keep,
}

impl Mode {
    /// The action key that creates commands of this mode, also used as the
    /// mode marker in the binding file.
    pub fn symbol(self) -> char {
        match self {
            Mode::Consume => '!',
            Mode::Keep => '&',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '!' => Some(Mode::Consume),
            '&' => Some(Mode::Keep),
            _ => None,
        }
    }
}

/// A shell command with an optional `{}` placeholder for the current line.
///
/// Every placeholder is replaced by the line, wherever it appears. Without a
/// placeholder the line is appended as the last argument, the way `xargs` and
/// `find -exec` treat their arguments.
///
/// Quoting around a placeholder is honoured: `'pre-{}'` and `"pre-{}"` both
/// expand to `pre-` followed by the line. A single-quoted placeholder closes
/// the quote, inserts the line and reopens it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template(String);

impl Template {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn has_placeholder(&self) -> bool {
        self.0.contains(PLACEHOLDER)
    }

    /// Build the shell script for this template.
    ///
    /// The line is never pasted into the script: it is referenced as `"$1"`
    /// and handed to the shell as its first positional argument.
    pub fn script(&self) -> String {
        if !self.has_placeholder() {
            return format!("{} \"$1\"", self.0);
        }

        let mut script = String::with_capacity(self.0.len() + 8);
        let mut quote = Quote::None;
        let mut rest = self.0.as_str();
        while let Some(c) = rest.chars().next() {
            if rest.starts_with(PLACEHOLDER) {
                script.push_str(match quote {
                    Quote::None => "\"$1\"",
                    Quote::Single => "'\"$1\"'",
                    Quote::Double => "${1}",
                });
                rest = &rest[PLACEHOLDER.len()..];
                continue;
            }
            script.push(c);
            rest = &rest[c.len_utf8()..];
            match (quote, c) {
                (Quote::None | Quote::Double, '\\') => {
                    // the escaped character is copied as is
                    if let Some(next) = rest.chars().next() {
                        script.push(next);
                        rest = &rest[next.len_utf8()..];
                    }
                }
                (Quote::None, '\'') => quote = Quote::Single,
                (Quote::None, '"') => quote = Quote::Double,
                (Quote::Single, '\'') | (Quote::Double, '"') => quote = Quote::None,
                _ => {}
            }
        }
        script
    }
}

/// Quoting context of a position in a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A key bound to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub key: char,
    pub template: Template,
    pub mode: Mode,
}

impl Binding {
    pub fn new(key: char, template: Template, mode: Mode) -> Self {
        Self {
            key,
            template,
            mode,
        }
    }
}

impl fmt::Display for Binding {
    /// Menu form, e.g. `d - ! rm`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} {}",
            format_key(self.key),
            self.mode.symbol(),
            self.template
        )
    }
}

/// Human readable name of a key for menus and messages.
pub fn format_key(key: char) -> String {
    match key {
        ' ' => "SPACE".to_string(),
        '\r' | '\n' => "ENTER".to_string(),
        '\t' => "TAB".to_string(),
        c if (c as u32) >= 1 && (c as u32) <= 26 => {
            format!("C-{}", (b'a' + (c as u8) - 1) as char)
        }
        c => c.to_string(),
    }
}
