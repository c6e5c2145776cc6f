//! Quill Core: shared span, diagnostic, and value-tag types.
//!
//! This crate provides the language-agnostic pieces that both the compiler
//! (lexer + parser) and the runtime (memory manager + evaluator) need to
//! agree on: source positions, diagnostic formatting, and the value-type tag
//! enumeration that classifies in-memory layout and reference-ness.
//!
//! # Modules
//!
//! - `span`: source position tracking
//! - `diagnostic`: severities and formatted diagnostic output
//! - `tag`: the `ValueTag` enumeration

pub mod diagnostic;
pub mod span;
pub mod tag;

pub use diagnostic::{Diagnostic, Severity, format_diagnostics};
pub use span::Span;
pub use tag::ValueTag;
