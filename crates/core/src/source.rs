//! Source locations for diagnostics, backtraces and `__file`/`__line`.

use std::fmt;
use std::rc::Rc;

/// A file name plus a line number, as carried by statements, callables and
/// backtrace frames. Cloning is cheap; the file name is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    file: Rc<str>,
    line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<Rc<str>>, line: u32) -> Self {
        SourceLocation {
            file: file.into(),
            line,
        }
    }

    /// A location for values synthesized by the host rather than read from
    /// a script.
    pub fn unknown() -> Self {
        SourceLocation::new("<unknown>", 0)
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// The same file, a different line.
    pub fn at_line(&self, line: u32) -> Self {
        SourceLocation {
            file: self.file.clone(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A line/column pair within one source buffer (1-indexed for display).
/// Used by the tokenizer and parser; statements downgrade it to a
/// `SourceLocation` once the file name is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Span { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}
