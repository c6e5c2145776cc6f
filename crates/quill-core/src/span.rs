//! Source position tracking shared by the lexer, parser, and evaluator.

use std::fmt;

/// A single point in the source text, used for token and AST node spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Byte offset of the first character (0-indexed).
    pub offset: u32,
    /// Line number (0-indexed).
    pub line: u32,
    /// Column number (0-indexed).
    pub column: u32,
    /// Length in bytes.
    pub length: u32,
}

impl Span {
    pub fn new(offset: u32, line: u32, column: u32, length: u32) -> Self {
        Span {
            offset,
            line,
            column,
            length,
        }
    }

    /// A zero-length span at the start of the source, used for synthesized nodes.
    pub fn synthetic() -> Self {
        Span::default()
    }

    /// Merge two spans into one covering both (used when an expression's span
    /// needs to cover a sub-expression plus trailing tokens).
    pub fn merge(self, other: Span) -> Span {
        let end_self = self.offset + self.length;
        let end_other = other.offset + other.length;
        let start = self.offset.min(other.offset);
        let end = end_self.max(end_other);
        Span {
            offset: start,
            line: self.line.min(other.line),
            column: if self.offset <= other.offset {
                self.column
            } else {
                other.column
            },
            length: end - start,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}
