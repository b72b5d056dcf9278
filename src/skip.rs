//! Regex filters that pass over runs of lines without prompting.

use regex::{Regex, RegexBuilder};

/// How a [`SkipFilter`] decides which lines to pass over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipKind {
    /// Skip lines while the pattern keeps matching.
    While,
    /// Skip lines until the pattern matches.
    Until,
}

/// A case-insensitive pattern that fast-forwards over lines.
///
/// The filter is finished at the first line it does not skip; that line is
/// offered to the operator as usual.
#[derive(Debug, Clone)]
pub struct SkipFilter {
    kind: SkipKind,
    regex: Regex,
}

impl SkipFilter {
    pub fn new(kind: SkipKind, pattern: &str) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self { kind, regex })
    }

    pub fn kind(&self) -> SkipKind {
        self.kind
    }

    /// Whether `line` is skipped.
    pub fn skips(&self, line: &str) -> bool {
        let matched = self.regex.is_match(line);
        match self.kind {
            SkipKind::While => matched,
            SkipKind::Until => !matched,
        }
    }
}
