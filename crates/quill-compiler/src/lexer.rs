//! Lexer: turns source text into a vector of classified tokens with literal
//! text preserved.
//!
//! Tokenization is eager (the whole source is scanned up front into a
//! `Vec<Token>`), since the parser's `Parser { tokens, pos }` shape needs
//! random access into the stream for snapshot/restore error recovery.
//! Rewind and the `>>`/`>>>` splitting trick used to resolve generic-closer
//! ambiguity are implemented by the parser manipulating this vector and its
//! cursor directly (see `parser.rs`).

use quill_core::Span;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum StringKind {
    Regular,
    Verbatim,
    Interpolated,
    InterpolatedVerbatim,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Keyword(String),
    /// Raw literal text, exactly as spelled (including suffix/prefix/underscores).
    Number(String),
    /// Decoded string contents plus which literal form produced them. For
    /// interpolated forms, `raw` holds the unprocessed `{…}`-bearing text so
    /// the parser can re-lex each interpolation fragment.
    StringLit { decoded: String, raw: String, kind: StringKind },
    CharLit(char),
    Operator(String),
    Punct(char),
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(s) => write!(f, "identifier `{s}`"),
            TokenKind::Keyword(s) => write!(f, "keyword `{s}`"),
            TokenKind::Number(s) => write!(f, "number `{s}`"),
            TokenKind::StringLit { raw, .. } => write!(f, "string `{raw}`"),
            TokenKind::CharLit(c) => write!(f, "char `{c}`"),
            TokenKind::Operator(s) => write!(f, "operator `{s}`"),
            TokenKind::Punct(c) => write!(f, "`{c}`"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexicalError {
    pub message: String,
    pub span: Span,
}

impl fmt::Display for LexicalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lexical error at {}: {}", self.span, self.message)
    }
}

impl std::error::Error for LexicalError {}

const KEYWORDS: &[&str] = &[
    "var", "const", "using", "namespace", "if", "else", "while", "do", "for", "foreach", "in",
    "switch", "case", "default", "when", "try", "catch", "finally", "throw", "return", "break",
    "continue", "goto", "class", "struct", "interface", "enum", "new", "this", "base", "null",
    "true", "false", "is", "as", "void", "public", "private", "protected", "internal", "static",
    "readonly", "virtual", "override", "abstract", "sealed", "async", "await", "lock", "yield",
    "out", "ref", "params", "where", "and", "or", "not", "_", "sbyte", "byte", "short", "ushort",
    "int", "uint", "long", "ulong", "float", "double", "decimal", "char", "bool", "string",
    "object",
];

const OPERATORS: &[&str] = &[
    ">>>=", "<<=", ">>=", ">>>", "??=", "...", "=>", "==", "!=", ">=", "<=", "&&", "||", "++",
    "--", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "**", "??", "<<", ">>", "..", "+", "-",
    "*", "/", "%", "!", "=", ">", "<", "&", "|", "^", "~", "?",
];

const PUNCTUATORS: &[char] = &['(', ')', '{', '}', '[', ']', ';', ',', ':', '.'];

struct Scanner<'a> {
    src: &'a [u8],
    text: &'a str,
    pos: usize,
    line: u32,
    col: u32,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Scanner {
            src: text.as_bytes(),
            text,
            pos: 0,
            line: 0,
            col: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn span_from(&self, start_pos: usize, start_line: u32, start_col: u32) -> Span {
        Span::new(
            start_pos as u32,
            start_line,
            start_col,
            (self.pos - start_pos) as u32,
        )
    }
}

/// Tokenize the full source text. Stops and returns the first lexical error
/// it hits on an unrecognized character — unlike the parser, the lexer does
/// not attempt recovery.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexicalError> {
    let mut s = Scanner::new(source);
    let mut tokens = Vec::new();

    loop {
        skip_trivia(&mut s);
        let start_pos = s.pos;
        let start_line = s.line;
        let start_col = s.col;

        let Some(c) = s.peek() else {
            tokens.push(Token {
                kind: TokenKind::Eof,
                span: s.span_from(start_pos, start_line, start_col),
            });
            break;
        };

        let kind = if c.is_ascii_digit() || (c == b'.' && s.peek_at(1).is_some_and(|d| d.is_ascii_digit()))
        {
            lex_number(&mut s)?
        } else if c == b'"' {
            lex_string(&mut s, false, start_pos, start_line, start_col)?
        } else if c == b'@' && s.peek_at(1) == Some(b'"') {
            s.bump();
            lex_string(&mut s, true, start_pos, start_line, start_col)?
        } else if c == b'$' && s.peek_at(1) == Some(b'"') {
            s.bump();
            lex_interpolated(&mut s, false, start_pos, start_line, start_col)?
        } else if (c == b'$' && s.peek_at(1) == Some(b'@') && s.peek_at(2) == Some(b'"'))
            || (c == b'@' && s.peek_at(1) == Some(b'$') && s.peek_at(2) == Some(b'"'))
        {
            s.bump();
            s.bump();
            lex_interpolated(&mut s, true, start_pos, start_line, start_col)?
        } else if c == b'\'' {
            lex_char(&mut s, start_pos, start_line, start_col)?
        } else if is_ident_start(c) {
            lex_ident_or_keyword(&mut s)
        } else if let Some(op) = match_operator(&s) {
            for _ in 0..op.len() {
                s.bump();
            }
            TokenKind::Operator(op)
        } else if PUNCTUATORS.contains(&(c as char)) {
            s.bump();
            TokenKind::Punct(c as char)
        } else {
            return Err(LexicalError {
                message: format!("unrecognized character '{}'", c as char),
                span: s.span_from(start_pos, start_line, start_col),
            });
        };

        tokens.push(Token {
            kind,
            span: s.span_from(start_pos, start_line, start_col),
        });
    }

    Ok(tokens)
}

fn is_ident_start(c: u8) -> bool {
    c == b'_' || c.is_ascii_alphabetic()
}

fn is_ident_continue(c: u8) -> bool {
    c == b'_' || c.is_ascii_alphanumeric()
}

fn skip_trivia(s: &mut Scanner) {
    loop {
        match s.peek() {
            Some(c) if c.is_ascii_whitespace() => {
                s.bump();
            }
            Some(b'/') if s.peek_at(1) == Some(b'/') => {
                while let Some(c) = s.peek() {
                    if c == b'\n' {
                        break;
                    }
                    s.bump();
                }
            }
            Some(b'/') if s.peek_at(1) == Some(b'*') => {
                s.bump();
                s.bump();
                while let Some(c) = s.peek() {
                    if c == b'*' && s.peek_at(1) == Some(b'/') {
                        s.bump();
                        s.bump();
                        break;
                    }
                    s.bump();
                }
            }
            Some(b'#') => {
                // Preprocessor-style directive: skip to end of line.
                while let Some(c) = s.peek() {
                    if c == b'\n' {
                        break;
                    }
                    s.bump();
                }
            }
            _ => break,
        }
    }
}

fn lex_ident_or_keyword(s: &mut Scanner) -> TokenKind {
    let start = s.pos;
    while let Some(c) = s.peek() {
        if is_ident_continue(c) {
            s.bump();
        } else {
            break;
        }
    }
    let text = &s.text[start..s.pos];
    if KEYWORDS.contains(&text) {
        TokenKind::Keyword(text.to_string())
    } else {
        TokenKind::Ident(text.to_string())
    }
}

fn match_operator(s: &Scanner) -> Option<String> {
    for op in OPERATORS {
        if s.text[s.pos..].starts_with(op) {
            return Some((*op).to_string());
        }
    }
    None
}

fn lex_number(s: &mut Scanner) -> Result<TokenKind, LexicalError> {
    let start = s.pos;
    let start_line = s.line;
    let start_col = s.col;

    let is_hex = s.peek() == Some(b'0') && matches!(s.peek_at(1), Some(b'x') | Some(b'X'));
    let is_bin = s.peek() == Some(b'0') && matches!(s.peek_at(1), Some(b'b') | Some(b'B'));

    if is_hex || is_bin {
        s.bump();
        s.bump();
        consume_digit_run(s, |c| {
            if is_hex {
                c.is_ascii_hexdigit()
            } else {
                c == b'0' || c == b'1'
            }
        })?;
    } else {
        consume_digit_run(s, |c| c.is_ascii_digit())?;

        if s.peek() == Some(b'.') && s.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            s.bump();
            consume_digit_run(s, |c| c.is_ascii_digit())?;
        }

        if matches!(s.peek(), Some(b'e') | Some(b'E')) {
            let save = s.pos;
            s.bump();
            if matches!(s.peek(), Some(b'+') | Some(b'-')) {
                s.bump();
            }
            if s.peek().is_some_and(|c| c.is_ascii_digit()) {
                consume_digit_run(s, |c| c.is_ascii_digit())?;
            } else {
                s.pos = save;
            }
        }
    }

    // Type suffixes: f|d|m|u|l|ul|lu, case-insensitive.
    while matches!(
        s.peek(),
        Some(b'f') | Some(b'F') | Some(b'd') | Some(b'D') | Some(b'm') | Some(b'M') | Some(b'u')
            | Some(b'U') | Some(b'l') | Some(b'L')
    ) {
        s.bump();
    }

    Ok(TokenKind::Number(s.text[start..s.pos].to_string()))
}

fn consume_digit_run(s: &mut Scanner, pred: impl Fn(u8) -> bool) -> Result<(), LexicalError> {
    let mut last_was_digit = false;
    loop {
        match s.peek() {
            Some(c) if pred(c) => {
                s.bump();
                last_was_digit = true;
            }
            Some(b'_') => {
                let next_ok = s.peek_at(1).is_some_and(&pred);
                if !last_was_digit || !next_ok {
                    return Err(LexicalError {
                        message: "underscore in numeric literal must separate digits".to_string(),
                        span: Span::new(s.pos as u32, s.line, s.col, 1),
                    });
                }
                s.bump();
                last_was_digit = false;
            }
            _ => break,
        }
    }
    Ok(())
}

fn lex_char(s: &mut Scanner, start: usize, start_line: u32, start_col: u32) -> Result<TokenKind, LexicalError> {
    s.bump(); // opening '
    let c = match s.peek() {
        Some(b'\\') => {
            s.bump();
            decode_escape(s, start, start_line, start_col)?
        }
        Some(_) => {
            let rest = &s.text[s.pos..];
            let ch = rest.chars().next().ok_or_else(|| LexicalError {
                message: "unterminated character literal".to_string(),
                span: s.span_from(start, start_line, start_col),
            })?;
            for _ in 0..ch.len_utf8() {
                s.bump();
            }
            ch
        }
        None => {
            return Err(LexicalError {
                message: "unterminated character literal".to_string(),
                span: s.span_from(start, start_line, start_col),
            });
        }
    };
    if s.peek() != Some(b'\'') {
        return Err(LexicalError {
            message: "character literal must contain exactly one scalar value".to_string(),
            span: s.span_from(start, start_line, start_col),
        });
    }
    s.bump();
    Ok(TokenKind::CharLit(c))
}

fn decode_escape(s: &mut Scanner, start: usize, start_line: u32, start_col: u32) -> Result<char, LexicalError> {
    let c = s.bump().ok_or_else(|| LexicalError {
        message: "unterminated escape sequence".to_string(),
        span: s.span_from(start, start_line, start_col),
    })?;
    Ok(match c {
        b'n' => '\n',
        b't' => '\t',
        b'r' => '\r',
        b'0' => '\0',
        b'\\' => '\\',
        b'\'' => '\'',
        b'"' => '"',
        b'a' => '\u{7}',
        b'b' => '\u{8}',
        b'f' => '\u{c}',
        b'v' => '\u{b}',
        other => {
            return Err(LexicalError {
                message: format!("unknown escape sequence '\\{}'", other as char),
                span: s.span_from(start, start_line, start_col),
            });
        }
    })
}

fn lex_string(
    s: &mut Scanner,
    verbatim: bool,
    start: usize,
    start_line: u32,
    start_col: u32,
) -> Result<TokenKind, LexicalError> {
    s.bump(); // opening "
    let mut decoded = String::new();
    loop {
        match s.peek() {
            None => {
                return Err(LexicalError {
                    message: "unterminated string literal".to_string(),
                    span: s.span_from(start, start_line, start_col),
                });
            }
            Some(b'"') => {
                if verbatim && s.peek_at(1) == Some(b'"') {
                    s.bump();
                    s.bump();
                    decoded.push('"');
                    continue;
                }
                s.bump();
                break;
            }
            Some(b'\\') if !verbatim => {
                s.bump();
                decoded.push(decode_escape(s, start, start_line, start_col)?);
            }
            Some(_) => {
                let rest = &s.text[s.pos..];
                let ch = rest.chars().next().unwrap();
                for _ in 0..ch.len_utf8() {
                    s.bump();
                }
                decoded.push(ch);
            }
        }
    }
    let raw = s.text[start..s.pos].to_string();
    Ok(TokenKind::StringLit {
        decoded,
        raw,
        kind: if verbatim {
            StringKind::Verbatim
        } else {
            StringKind::Regular
        },
    })
}

/// Interpolated strings keep their raw body (minus quotes) so the parser can
/// re-lex each `{…}` fragment independently.
fn lex_interpolated(
    s: &mut Scanner,
    verbatim: bool,
    start: usize,
    start_line: u32,
    start_col: u32,
) -> Result<TokenKind, LexicalError> {
    s.bump(); // opening "
    let body_start = s.pos;
    let mut depth = 0i32;
    loop {
        match s.peek() {
            None => {
                return Err(LexicalError {
                    message: "unterminated interpolated string literal".to_string(),
                    span: s.span_from(start, start_line, start_col),
                });
            }
            Some(b'{') if depth == 0 && s.peek_at(1) == Some(b'{') => {
                s.bump();
                s.bump();
            }
            Some(b'}') if depth == 0 && s.peek_at(1) == Some(b'}') => {
                s.bump();
                s.bump();
            }
            Some(b'{') => {
                depth += 1;
                s.bump();
            }
            Some(b'}') if depth > 0 => {
                depth -= 1;
                s.bump();
            }
            Some(b'"') if depth == 0 => {
                if verbatim && s.peek_at(1) == Some(b'"') {
                    s.bump();
                    s.bump();
                    continue;
                }
                break;
            }
            Some(b'\\') if !verbatim && depth == 0 => {
                s.bump();
                s.bump();
            }
            Some(_) => {
                s.bump();
            }
        }
    }
    let body = s.text[body_start..s.pos].to_string();
    s.bump(); // closing "
    Ok(TokenKind::StringLit {
        decoded: String::new(),
        raw: body,
        kind: if verbatim {
            StringKind::InterpolatedVerbatim
        } else {
            StringKind::Interpolated
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .filter(|k| !matches!(k, TokenKind::Eof))
            .collect()
    }

    #[test]
    fn lexes_identifiers_and_keywords() {
        assert_eq!(
            kinds("myVar if"),
            vec![
                TokenKind::Ident("myVar".into()),
                TokenKind::Keyword("if".into()),
            ]
        );
    }

    #[test]
    fn lexes_numeric_suffixes_and_underscores() {
        let toks = kinds("1_000 0x1F 0b101 3.14 2e10 5f 5ul");
        assert_eq!(
            toks,
            vec![
                TokenKind::Number("1_000".into()),
                TokenKind::Number("0x1F".into()),
                TokenKind::Number("0b101".into()),
                TokenKind::Number("3.14".into()),
                TokenKind::Number("2e10".into()),
                TokenKind::Number("5f".into()),
                TokenKind::Number("5ul".into()),
            ]
        );
    }

    #[test]
    fn rejects_double_underscore_in_number() {
        assert!(tokenize("1__0").is_err());
    }

    #[test]
    fn lexes_string_forms() {
        let toks = kinds(r#""hi\n" @"C:\x" $"{a}" $@"{a}\b""#);
        assert!(matches!(
            &toks[0],
            TokenKind::StringLit { kind: StringKind::Regular, decoded, .. } if decoded == "hi\n"
        ));
        assert!(matches!(
            &toks[1],
            TokenKind::StringLit { kind: StringKind::Verbatim, decoded, .. } if decoded == r"C:\x"
        ));
        assert!(matches!(
            &toks[2],
            TokenKind::StringLit { kind: StringKind::Interpolated, .. }
        ));
        assert!(matches!(
            &toks[3],
            TokenKind::StringLit { kind: StringKind::InterpolatedVerbatim, .. }
        ));
    }

    #[test]
    fn longest_match_operator_table() {
        let toks = kinds(">>>= >>= >> > >= ??= ??");
        assert_eq!(
            toks,
            vec![
                TokenKind::Operator(">>>=".into()),
                TokenKind::Operator(">>=".into()),
                TokenKind::Operator(">>".into()),
                TokenKind::Operator(">".into()),
                TokenKind::Operator(">=".into()),
                TokenKind::Operator("??=".into()),
                TokenKind::Operator("??".into()),
            ]
        );
    }

    #[test]
    fn unrecognized_character_fails() {
        assert!(tokenize("int x = `").is_err());
    }

    #[test]
    fn skips_comments_and_preprocessor_directives() {
        let toks = kinds("// line\n#define X\n/* block */ return");
        assert_eq!(toks, vec![TokenKind::Keyword("return".into())]);
    }
}
