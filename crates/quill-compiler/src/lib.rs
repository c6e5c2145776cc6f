//! Quill Compiler: lexer and recursive-descent parser producing the AST
//! consumed by `quill_runtime`'s evaluator.
//!
//! # Modules
//!
//! - `lexer`: source text to tokens
//! - `ast`: the syntax tree shape
//! - `parser`: tokens to AST, with diagnostic-accumulating error recovery
//! - `error`: lexical/parse error types

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;

pub use ast::Program;
pub use error::ParseError;
pub use lexer::{LexicalError, Token, TokenKind};
pub use parser::{parse, Parser};

/// Keywords that name a primitive [`quill_core::ValueTag`] directly, used by
/// the parser to admit them wherever a type name is expected.
pub(crate) fn tag_keyword(k: &str) -> bool {
    matches!(
        k,
        "sbyte"
            | "byte"
            | "short"
            | "ushort"
            | "int"
            | "uint"
            | "long"
            | "ulong"
            | "float"
            | "double"
            | "decimal"
            | "char"
            | "bool"
            | "string"
            | "object"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Item, Stmt};

    #[test]
    fn parses_function_with_arithmetic_body() {
        let source = r#"
            int add(int a, int b) {
                return a + b * 2;
            }
        "#;
        let (program, diags) = parse(source);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        assert_eq!(program.items.len(), 1);
        let Item::Function(f) = &program.items[0] else {
            panic!("expected a function item");
        };
        assert_eq!(f.name, "add");
        assert_eq!(f.params.len(), 2);
        let body = f.body.as_ref().unwrap();
        assert_eq!(body.stmts.len(), 1);
        assert!(matches!(&body.stmts[0], Stmt::Return { value: Some(_), .. }));
    }

    #[test]
    fn parses_if_else_and_while() {
        let source = r#"
            void run() {
                int x = 0;
                while (x < 10) {
                    if (x == 5) { break; } else { x = x + 1; }
                }
            }
        "#;
        let (program, diags) = parse(source);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        assert_eq!(program.items.len(), 1);
    }

    #[test]
    fn parses_pointer_and_array_expressions() {
        let source = r#"
            void run() {
                int[] xs = new int[4];
                xs[0] = 1;
                int* p = &xs[0];
                int v = *p;
            }
        "#;
        let (_program, diags) = parse(source);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    }

    #[test]
    fn parses_interpolated_string_with_format_spec() {
        let source = r#"
            void run() {
                string s = $"value={x,5:F2}";
            }
        "#;
        let (program, diags) = parse(source);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        let Item::Function(f) = &program.items[0] else { panic!() };
        let Stmt::VarDecl(v) = &f.body.as_ref().unwrap().stmts[0] else {
            panic!("expected var decl")
        };
        let Some(Expr::InterpolatedString { parts, .. }) = &v.init else {
            panic!("expected interpolated string")
        };
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn parses_switch_statement_with_patterns() {
        let source = r#"
            void run() {
                switch (x) {
                    case int n when n > 0:
                        break;
                    case null:
                        break;
                    default:
                        break;
                }
            }
        "#;
        let (_program, diags) = parse(source);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    }

    #[test]
    fn recovers_from_malformed_statement() {
        let source = r#"
            void run() {
                int x = ;
                int y = 1;
            }
        "#;
        let (program, diags) = parse(source);
        assert!(!diags.is_empty());
        // Parsing should still recover and find the function item.
        assert_eq!(program.items.len(), 1);
    }
}
