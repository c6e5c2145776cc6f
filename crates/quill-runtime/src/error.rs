//! `InterpError`: the ten error kinds the evaluator can raise, with a
//! hand-written `Display` + `std::error::Error` impl rather than an
//! error-derive crate.

use quill_compiler::ParseError;
use quill_core::Span;
use std::fmt;

#[derive(Debug, Clone)]
pub struct SourceLocation {
    pub span: Span,
}

impl From<Span> for SourceLocation {
    fn from(span: Span) -> Self {
        SourceLocation { span }
    }
}

#[derive(Debug, Clone)]
pub enum InterpError {
    Lexical { message: String, where_: Option<SourceLocation> },
    Parse { message: String, where_: Option<SourceLocation> },
    Type { message: String, where_: Option<SourceLocation> },
    UnresolvedName { message: String, where_: Option<SourceLocation> },
    Arithmetic { message: String, where_: Option<SourceLocation> },
    IndexOutOfRange { message: String, where_: Option<SourceLocation> },
    InvalidMemory { message: String, where_: Option<SourceLocation> },
    StackOverflow { message: String, where_: Option<SourceLocation> },
    OutOfMemory { message: String, where_: Option<SourceLocation> },
    Cancelled,
}

impl InterpError {
    pub fn type_error(message: impl Into<String>) -> Self {
        InterpError::Type { message: message.into(), where_: None }
    }

    pub fn unresolved(message: impl Into<String>) -> Self {
        InterpError::UnresolvedName { message: message.into(), where_: None }
    }

    pub fn arithmetic(message: impl Into<String>) -> Self {
        InterpError::Arithmetic { message: message.into(), where_: None }
    }

    pub fn index_out_of_range(message: impl Into<String>) -> Self {
        InterpError::IndexOutOfRange { message: message.into(), where_: None }
    }

    pub fn invalid_memory(message: impl Into<String>) -> Self {
        InterpError::InvalidMemory { message: message.into(), where_: None }
    }

    pub fn stack_overflow(message: impl Into<String>) -> Self {
        InterpError::StackOverflow { message: message.into(), where_: None }
    }

    pub fn out_of_memory(message: impl Into<String>) -> Self {
        InterpError::OutOfMemory { message: message.into(), where_: None }
    }

    pub fn with_location(self, loc: SourceLocation) -> Self {
        match self {
            InterpError::Lexical { message, .. } => InterpError::Lexical { message, where_: Some(loc) },
            InterpError::Parse { message, .. } => InterpError::Parse { message, where_: Some(loc) },
            InterpError::Type { message, .. } => InterpError::Type { message, where_: Some(loc) },
            InterpError::UnresolvedName { message, .. } => {
                InterpError::UnresolvedName { message, where_: Some(loc) }
            }
            InterpError::Arithmetic { message, .. } => {
                InterpError::Arithmetic { message, where_: Some(loc) }
            }
            InterpError::IndexOutOfRange { message, .. } => {
                InterpError::IndexOutOfRange { message, where_: Some(loc) }
            }
            InterpError::InvalidMemory { message, .. } => {
                InterpError::InvalidMemory { message, where_: Some(loc) }
            }
            InterpError::StackOverflow { message, .. } => {
                InterpError::StackOverflow { message, where_: Some(loc) }
            }
            InterpError::OutOfMemory { message, .. } => {
                InterpError::OutOfMemory { message, where_: Some(loc) }
            }
            InterpError::Cancelled => InterpError::Cancelled,
        }
    }
}

impl From<ParseError> for InterpError {
    fn from(e: ParseError) -> Self {
        InterpError::Parse {
            message: e.message,
            where_: Some(SourceLocation { span: e.span }),
        }
    }
}

impl fmt::Display for InterpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn loc(w: &Option<SourceLocation>) -> String {
            match w {
                Some(l) => format!(" at {}", l.span),
                None => String::new(),
            }
        }
        match self {
            InterpError::Lexical { message, where_ } => {
                write!(f, "lexical error{}: {message}", loc(where_))
            }
            InterpError::Parse { message, where_ } => {
                write!(f, "parse error{}: {message}", loc(where_))
            }
            InterpError::Type { message, where_ } => {
                write!(f, "type error{}: {message}", loc(where_))
            }
            InterpError::UnresolvedName { message, where_ } => {
                write!(f, "unresolved name{}: {message}", loc(where_))
            }
            InterpError::Arithmetic { message, where_ } => {
                write!(f, "arithmetic error{}: {message}", loc(where_))
            }
            InterpError::IndexOutOfRange { message, where_ } => {
                write!(f, "index out of range{}: {message}", loc(where_))
            }
            InterpError::InvalidMemory { message, where_ } => {
                write!(f, "invalid memory access{}: {message}", loc(where_))
            }
            InterpError::StackOverflow { message, where_ } => {
                write!(f, "stack overflow{}: {message}", loc(where_))
            }
            InterpError::OutOfMemory { message, where_ } => {
                write!(f, "out of memory{}: {message}", loc(where_))
            }
            InterpError::Cancelled => write!(f, "execution cancelled"),
        }
    }
}

impl std::error::Error for InterpError {}
