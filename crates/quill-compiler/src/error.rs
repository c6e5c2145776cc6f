//! Parse-time error type. Unlike [`crate::lexer::LexicalError`], a single
//! `ParseError` does not abort parsing: the parser accumulates one
//! [`quill_core::Diagnostic`] per error and synchronizes to the next
//! statement boundary.

use quill_core::Span;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        ParseError {
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at {}: {}", self.span, self.message)
    }
}

impl std::error::Error for ParseError {}
