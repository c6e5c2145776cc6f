//! Recursive-descent parser with precedence-climbing expression parsing.
//! A `Parser { tokens: Vec<Token>, pos: usize }` cursor exposes a
//! `mark()`/`reset()` backtracking pair, used here as the speculative
//! lookahead that tells a parenthesized lambda from a parenthesized
//! expression and a constructor from an ordinary method, on top of a full
//! statement and declaration grammar plus diagnostic-accumulating error
//! recovery.

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{self, StringKind, Token, TokenKind};
use quill_core::{Diagnostic, Span};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a complete compilation unit. Lexical errors abort immediately with
/// a single diagnostic and an empty program; parse errors are recovered from
/// and reported alongside a best-effort partial AST.
pub fn parse(source: &str) -> (Program, Vec<Diagnostic>) {
    match lexer::tokenize(source) {
        Ok(tokens) => {
            let mut parser = Parser::new(tokens);
            let program = parser.parse_program();
            (program, parser.diagnostics)
        }
        Err(e) => (
            Program { items: Vec::new() },
            vec![Diagnostic::error(e.message, e.span)],
        ),
    }
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    // --- cursor ---------------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_n(&self, n: usize) -> &Token {
        let i = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[i]
    }

    fn bump(&mut self) -> Token {
        let t = self.peek().clone();
        if !t.is_eof() {
            self.pos += 1;
        }
        t
    }

    /// Snapshot the cursor for speculative parsing.
    fn mark(&self) -> usize {
        self.pos
    }

    fn reset(&mut self, mark: usize) {
        self.pos = mark;
    }

    fn is_op(&self, op: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Operator(o) if o == op)
    }

    fn is_punct(&self, p: char) -> bool {
        matches!(&self.peek().kind, TokenKind::Punct(c) if *c == p)
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Keyword(k) if k == kw)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.is_op(op) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_punct(&mut self, p: char) -> bool {
        if self.is_punct(p) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.is_keyword(kw) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: char) -> Result<Span, ParseError> {
        if self.is_punct(p) {
            Ok(self.bump().span)
        } else {
            Err(self.error(format!("expected `{p}`, found {}", self.peek().kind)))
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<Span, ParseError> {
        if self.is_keyword(kw) {
            Ok(self.bump().span)
        } else {
            Err(self.error(format!("expected `{kw}`, found {}", self.peek().kind)))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span), ParseError> {
        let tok = self.peek().clone();
        if let TokenKind::Ident(name) = tok.kind {
            self.bump();
            Ok((name, tok.span))
        } else {
            Err(self.error(format!("expected identifier, found {}", tok.kind)))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.peek().span)
    }

    fn record(&mut self, err: ParseError) {
        self.diagnostics.push(Diagnostic::error(err.message, err.span));
    }

    /// Skip tokens until a likely statement boundary, so one malformed
    /// statement doesn't cascade into spurious errors for the rest of the file.
    fn synchronize(&mut self) {
        loop {
            if self.peek().is_eof() {
                return;
            }
            if self.is_punct(';') {
                self.bump();
                return;
            }
            if self.is_punct('}') {
                return;
            }
            if matches!(
                &self.peek().kind,
                TokenKind::Keyword(k) if matches!(k.as_str(),
                    "if" | "while" | "for" | "foreach" | "return" | "switch" | "class"
                        | "struct" | "namespace" | "try" | "var" | "const")
            ) {
                return;
            }
            self.bump();
        }
    }

    fn error_expr(&self, span: Span) -> Expr {
        Expr::Ident {
            name: "<error>".to_string(),
            span,
        }
    }

    // --- program ----------------------------------------------------------

    pub fn parse_program(&mut self) -> Program {
        let mut items = Vec::new();
        while !self.peek().is_eof() {
            match self.parse_item() {
                Ok(item) => items.push(item),
                Err(e) => {
                    self.record(e);
                    self.synchronize();
                }
            }
        }
        Program { items }
    }

    fn parse_item(&mut self) -> Result<Item, ParseError> {
        if self.is_keyword("using") && !matches!(self.peek_n(1).kind, TokenKind::Punct('(')) {
            return self.parse_using().map(Item::Using);
        }
        if self.is_keyword("namespace") {
            return self.parse_namespace().map(Item::Namespace);
        }
        if self.is_keyword("struct") {
            return self.parse_struct().map(Item::Struct);
        }
        if self.is_keyword("class") {
            return self.parse_class().map(Item::Class);
        }
        if self.is_keyword("interface") {
            return self.parse_interface().map(Item::Interface);
        }
        if self.is_keyword("enum") {
            return self.parse_enum().map(Item::Enum);
        }
        if self.looks_like_function_decl() {
            return self.parse_function_decl().map(Item::Function);
        }
        self.parse_stmt().map(Item::Statement)
    }

    fn parse_using(&mut self) -> Result<UsingDecl, ParseError> {
        let start = self.expect_keyword("using")?;
        let mut path = self.expect_ident()?.0;
        while self.eat_punct('.') {
            path.push('.');
            path.push_str(&self.expect_ident()?.0);
        }
        let end = self.expect_punct(';')?;
        Ok(UsingDecl {
            path,
            span: start.merge(end),
        })
    }

    fn parse_namespace(&mut self) -> Result<NamespaceDecl, ParseError> {
        let start = self.expect_keyword("namespace")?;
        let (name, _) = self.expect_ident()?;
        self.expect_punct('{')?;
        let mut items = Vec::new();
        while !self.is_punct('}') && !self.peek().is_eof() {
            match self.parse_item() {
                Ok(item) => items.push(item),
                Err(e) => {
                    self.record(e);
                    self.synchronize();
                }
            }
        }
        let end = self.expect_punct('}')?;
        Ok(NamespaceDecl {
            name,
            items,
            span: start.merge(end),
        })
    }

    // --- modifiers / declaration lookahead --------------------------------

    fn skip_modifiers(&mut self) -> bool {
        let mut saw_static = false;
        loop {
            let matched = [
                "public", "private", "protected", "internal", "virtual", "override", "abstract",
                "sealed", "async", "readonly",
            ]
            .iter()
            .any(|kw| self.eat_keyword(kw));
            if self.eat_keyword("static") {
                saw_static = true;
                continue;
            }
            if !matched {
                break;
            }
        }
        saw_static
    }

    fn looks_like_function_decl(&self) -> bool {
        // Heuristic: `name(` or `Type name(` followed eventually by `(` before `;`/`{`/`=`.
        let mut i = 0;
        loop {
            match &self.peek_n(i).kind {
                TokenKind::Keyword(k)
                    if matches!(
                        k.as_str(),
                        "public" | "private" | "protected" | "internal" | "static" | "virtual"
                            | "override" | "abstract" | "sealed" | "async" | "readonly"
                    ) =>
                {
                    i += 1;
                }
                TokenKind::Ident(_) => {
                    i += 1;
                    if matches!(self.peek_n(i).kind, TokenKind::Operator(ref o) if o == "[") {
                        i += 1;
                    }
                    while matches!(self.peek_n(i).kind, TokenKind::Punct('[')) {
                        i += 1;
                        if matches!(self.peek_n(i).kind, TokenKind::Punct(']')) {
                            i += 1;
                        }
                    }
                    if matches!(self.peek_n(i).kind, TokenKind::Ident(_)) {
                        i += 1;
                        return matches!(self.peek_n(i).kind, TokenKind::Punct('('));
                    }
                    return matches!(self.peek_n(i).kind, TokenKind::Punct('('));
                }
                TokenKind::Keyword(k) if crate::tag_keyword(k) || k == "void" => {
                    i += 1;
                }
                _ => return false,
            }
        }
    }

    fn parse_type(&mut self) -> Result<TypeRef, ParseError> {
        let (name, start) = self.expect_ident_or_type_keyword()?;
        let mut array_rank = 0;
        while self.is_punct('[') {
            self.bump();
            self.expect_punct(']')?;
            array_rank += 1;
        }
        let nullable = self.eat_op("?");
        let end = self.peek().span;
        Ok(TypeRef {
            name,
            array_rank,
            nullable,
            span: start.merge(end),
        })
    }

    fn expect_ident_or_type_keyword(&mut self) -> Result<(String, Span), ParseError> {
        let tok = self.peek().clone();
        match &tok.kind {
            TokenKind::Ident(name) => {
                self.bump();
                Ok((name.clone(), tok.span))
            }
            TokenKind::Keyword(k) if crate::tag_keyword(k) || k == "void" => {
                self.bump();
                Ok((k.clone(), tok.span))
            }
            _ => Err(self.error(format!("expected a type name, found {}", tok.kind))),
        }
    }

    // --- declarations -------------------------------------------------------

    fn parse_function_decl(&mut self) -> Result<FunctionDecl, ParseError> {
        let start = self.peek().span;
        let is_static = self.skip_modifiers();
        let return_ty = if self.is_keyword("void") {
            self.bump();
            None
        } else {
            Some(self.parse_type()?)
        };
        let (name, _) = self.expect_ident()?;
        self.expect_punct('(')?;
        let params = self.parse_params()?;
        self.expect_punct(')')?;
        let body = if self.is_punct('{') {
            Some(self.parse_block()?)
        } else {
            self.expect_punct(';')?;
            None
        };
        let end = body.as_ref().map(|b| b.span).unwrap_or(start);
        Ok(FunctionDecl {
            name,
            params,
            return_ty,
            body,
            is_static,
            span: start.merge(end),
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();
        if self.is_punct(')') {
            return Ok(params);
        }
        loop {
            let start = self.peek().span;
            let mode = if self.eat_keyword("ref") {
                ParamMode::Ref
            } else if self.eat_keyword("out") {
                ParamMode::Out
            } else if self.eat_keyword("params") {
                ParamMode::Params
            } else {
                ParamMode::ByValue
            };
            let ty = Some(self.parse_type()?);
            let (name, _) = self.expect_ident()?;
            let default = if self.eat_op("=") {
                Some(self.parse_expr()?)
            } else {
                None
            };
            let end = self.peek().span;
            params.push(Param {
                name,
                ty,
                mode,
                default,
                span: start.merge(end),
            });
            if !self.eat_punct(',') {
                break;
            }
        }
        Ok(params)
    }

    fn parse_struct(&mut self) -> Result<StructDecl, ParseError> {
        let start = self.expect_keyword("struct")?;
        let (name, _) = self.expect_ident()?;
        self.expect_punct('{')?;
        let (fields, methods) = self.parse_members()?;
        let end = self.expect_punct('}')?;
        Ok(StructDecl {
            name,
            fields,
            methods,
            span: start.merge(end),
        })
    }

    fn parse_class(&mut self) -> Result<ClassDecl, ParseError> {
        let start = self.expect_keyword("class")?;
        let (name, _) = self.expect_ident()?;
        let mut base = None;
        let mut interfaces = Vec::new();
        if self.eat_punct(':') {
            let (first, _) = self.expect_ident()?;
            base = Some(first);
            while self.eat_punct(',') {
                interfaces.push(self.expect_ident()?.0);
            }
        }
        self.expect_punct('{')?;
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut constructors = Vec::new();
        while !self.is_punct('}') && !self.peek().is_eof() {
            let mark = self.mark();
            let is_ctor = {
                let saved = self.skip_modifiers();
                let is_ctor_name = matches!(&self.peek().kind, TokenKind::Ident(n) if *n == name)
                    && matches!(self.peek_n(1).kind, TokenKind::Punct('('));
                self.reset(mark);
                let _ = saved;
                is_ctor_name
            };
            if is_ctor {
                match self.parse_constructor(&name) {
                    Ok(ctor) => constructors.push(ctor),
                    Err(e) => {
                        self.record(e);
                        self.synchronize();
                    }
                }
                continue;
            }
            match self.parse_member() {
                Ok(Member::Field(f)) => fields.push(f),
                Ok(Member::Method(m)) => methods.push(m),
                Err(e) => {
                    self.record(e);
                    self.synchronize();
                }
            }
        }
        let end = self.expect_punct('}')?;
        Ok(ClassDecl {
            name,
            base,
            interfaces,
            fields,
            methods,
            constructors,
            span: start.merge(end),
        })
    }

    fn parse_constructor(&mut self, _owner: &str) -> Result<FunctionDecl, ParseError> {
        let start = self.peek().span;
        self.skip_modifiers();
        let (name, _) = self.expect_ident()?;
        self.expect_punct('(')?;
        let params = self.parse_params()?;
        self.expect_punct(')')?;
        let body = self.parse_block()?;
        let span = start.merge(body.span);
        Ok(FunctionDecl {
            name,
            params,
            return_ty: None,
            body: Some(body),
            is_static: false,
            span,
        })
    }

    fn parse_interface(&mut self) -> Result<InterfaceDecl, ParseError> {
        let start = self.expect_keyword("interface")?;
        let (name, _) = self.expect_ident()?;
        self.expect_punct('{')?;
        let mut methods = Vec::new();
        while !self.is_punct('}') && !self.peek().is_eof() {
            match self.parse_function_decl() {
                Ok(m) => methods.push(m),
                Err(e) => {
                    self.record(e);
                    self.synchronize();
                }
            }
        }
        let end = self.expect_punct('}')?;
        Ok(InterfaceDecl {
            name,
            methods,
            span: start.merge(end),
        })
    }

    fn parse_enum(&mut self) -> Result<EnumDecl, ParseError> {
        let start = self.expect_keyword("enum")?;
        let (name, _) = self.expect_ident()?;
        let underlying = if self.eat_punct(':') {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect_punct('{')?;
        let mut members = Vec::new();
        while !self.is_punct('}') && !self.peek().is_eof() {
            let (member_name, mspan) = self.expect_ident()?;
            let value = if self.eat_op("=") {
                Some(self.parse_expr()?)
            } else {
                None
            };
            members.push(EnumMember {
                name: member_name,
                value,
                span: mspan,
            });
            if !self.eat_punct(',') {
                break;
            }
        }
        let end = self.expect_punct('}')?;
        Ok(EnumDecl {
            name,
            underlying,
            members,
            span: start.merge(end),
        })
    }

    fn parse_members(&mut self) -> Result<(Vec<FieldDecl>, Vec<FunctionDecl>), ParseError> {
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.is_punct('}') && !self.peek().is_eof() {
            match self.parse_member() {
                Ok(Member::Field(f)) => fields.push(f),
                Ok(Member::Method(m)) => methods.push(m),
                Err(e) => {
                    self.record(e);
                    self.synchronize();
                }
            }
        }
        Ok((fields, methods))
    }

    fn parse_member(&mut self) -> Result<Member, ParseError> {
        let start = self.peek().span;
        let is_static = self.skip_modifiers();
        let is_readonly_applied = false;
        let ty = self.parse_type()?;
        let (name, _) = self.expect_ident()?;
        if self.is_punct('(') {
            self.bump();
            let params = self.parse_params()?;
            self.expect_punct(')')?;
            let body = if self.is_punct('{') {
                Some(self.parse_block()?)
            } else {
                self.expect_punct(';')?;
                None
            };
            let end = body.as_ref().map(|b| b.span).unwrap_or(start);
            return Ok(Member::Method(FunctionDecl {
                name,
                params,
                return_ty: Some(ty),
                body,
                is_static,
                span: start.merge(end),
            }));
        }
        let default = if self.eat_op("=") {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let end = self.expect_punct(';')?;
        Ok(Member::Field(FieldDecl {
            name,
            ty,
            default,
            is_static,
            is_readonly: is_readonly_applied,
            span: start.merge(end),
        }))
    }

    // --- statements ----------------------------------------------------------

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        let start = self.expect_punct('{')?;
        let mut stmts = Vec::new();
        while !self.is_punct('}') && !self.peek().is_eof() {
            match self.parse_stmt() {
                Ok(s) => stmts.push(s),
                Err(e) => {
                    self.record(e);
                    self.synchronize();
                }
            }
        }
        let end = self.expect_punct('}')?;
        Ok(Block {
            stmts,
            span: start.merge(end),
        })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        if self.is_punct('{') {
            return self.parse_block().map(Stmt::Block);
        }
        if self.is_punct(';') {
            let span = self.bump().span;
            return Ok(Stmt::Empty { span });
        }
        if self.is_keyword("var") || self.is_keyword("const") {
            return self.parse_var_decl_stmt();
        }
        if self.is_keyword("if") {
            return self.parse_if();
        }
        if self.is_keyword("while") {
            return self.parse_while();
        }
        if self.is_keyword("do") {
            return self.parse_do_while();
        }
        if self.is_keyword("for") {
            return self.parse_for();
        }
        if self.is_keyword("foreach") {
            return self.parse_foreach();
        }
        if self.is_keyword("switch") {
            return self.parse_switch_stmt();
        }
        if self.is_keyword("try") {
            return self.parse_try();
        }
        if self.is_keyword("throw") {
            return self.parse_throw();
        }
        if self.is_keyword("return") {
            return self.parse_return();
        }
        if self.is_keyword("break") {
            let span = self.bump().span;
            let end = self.expect_punct(';')?;
            return Ok(Stmt::Break { span: span.merge(end) });
        }
        if self.is_keyword("continue") {
            let span = self.bump().span;
            let end = self.expect_punct(';')?;
            return Ok(Stmt::Continue { span: span.merge(end) });
        }
        if self.is_keyword("goto") {
            let span = self.bump().span;
            if self.eat_keyword("case") {
                let value = self.parse_expr()?;
                let end = self.expect_punct(';')?;
                return Ok(Stmt::GotoCase { value, span: span.merge(end) });
            }
            if self.eat_keyword("default") {
                let end = self.expect_punct(';')?;
                return Ok(Stmt::GotoDefault { span: span.merge(end) });
            }
            let (label, _) = self.expect_ident()?;
            let end = self.expect_punct(';')?;
            return Ok(Stmt::Goto { label, span: span.merge(end) });
        }
        if self.is_keyword("using") && matches!(self.peek_n(1).kind, TokenKind::Punct('(')) {
            return self.parse_using_stmt();
        }
        // label: `ident :` not followed by `::`
        if matches!(self.peek().kind, TokenKind::Ident(_))
            && matches!(self.peek_n(1).kind, TokenKind::Punct(':'))
        {
            let (name, span) = self.expect_ident()?;
            let end = self.bump().span;
            return Ok(Stmt::Label { name, span: span.merge(end) });
        }
        if self.looks_like_function_decl() {
            return self.parse_function_decl().map(Stmt::Function);
        }
        if self.looks_like_var_decl() {
            return self.parse_var_decl_stmt();
        }
        let expr = self.parse_expr()?;
        let end = self.expect_punct(';')?;
        let span = expr.span().merge(end);
        Ok(Stmt::Expr(expr.with_span(span)))
    }

    fn looks_like_var_decl(&self) -> bool {
        let starts_type = matches!(self.peek().kind, TokenKind::Ident(_))
            || matches!(&self.peek().kind, TokenKind::Keyword(k) if crate::tag_keyword(k));
        if !starts_type {
            return false;
        }
        let mut i = 1;
        while matches!(self.peek_n(i).kind, TokenKind::Punct('[')) {
            i += 1;
            if matches!(self.peek_n(i).kind, TokenKind::Punct(']')) {
                i += 1;
            }
        }
        matches!(self.peek_n(i).kind, TokenKind::Ident(_))
    }

    fn parse_var_decl_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.parse_var_decl().map(Stmt::VarDecl)
    }

    fn parse_var_decl(&mut self) -> Result<VarDecl, ParseError> {
        let start = self.peek().span;
        let is_const = self.eat_keyword("const");
        let ty = if is_const || self.is_keyword("var") {
            if self.is_keyword("var") {
                self.bump();
                None
            } else {
                Some(self.parse_type()?)
            }
        } else {
            Some(self.parse_type()?)
        };
        let (name, _) = self.expect_ident()?;
        let init = if self.eat_op("=") {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let end = self.expect_punct(';')?;
        Ok(VarDecl {
            name,
            ty,
            is_const,
            init,
            span: start.merge(end),
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect_keyword("if")?;
        self.expect_punct('(')?;
        let cond = self.parse_expr()?;
        self.expect_punct(')')?;
        let then_branch = Box::new(self.parse_stmt()?);
        let else_branch = if self.eat_keyword("else") {
            Some(Box::new(self.parse_stmt()?))
        } else {
            None
        };
        let end = else_branch
            .as_ref()
            .map(|s| s.span())
            .unwrap_or_else(|| then_branch.span());
        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
            span: start.merge(end),
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect_keyword("while")?;
        self.expect_punct('(')?;
        let cond = self.parse_expr()?;
        self.expect_punct(')')?;
        let body = Box::new(self.parse_stmt()?);
        let span = start.merge(body.span());
        Ok(Stmt::While { cond, body, span })
    }

    fn parse_do_while(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect_keyword("do")?;
        let body = Box::new(self.parse_stmt()?);
        self.expect_keyword("while")?;
        self.expect_punct('(')?;
        let cond = self.parse_expr()?;
        self.expect_punct(')')?;
        let end = self.expect_punct(';')?;
        Ok(Stmt::DoWhile {
            body,
            cond,
            span: start.merge(end),
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect_keyword("for")?;
        self.expect_punct('(')?;
        let init = if self.is_punct(';') {
            self.bump();
            None
        } else if self.looks_like_var_decl() {
            Some(Box::new(Stmt::VarDecl(self.parse_var_decl()?)))
        } else {
            let e = self.parse_expr()?;
            self.expect_punct(';')?;
            Some(Box::new(Stmt::Expr(e)))
        };
        let cond = if self.is_punct(';') {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect_punct(';')?;
        let mut step = Vec::new();
        if !self.is_punct(')') {
            step.push(self.parse_expr()?);
            while self.eat_punct(',') {
                step.push(self.parse_expr()?);
            }
        }
        self.expect_punct(')')?;
        let body = Box::new(self.parse_stmt()?);
        let span = start.merge(body.span());
        Ok(Stmt::For {
            init,
            cond,
            step,
            body,
            span,
        })
    }

    fn parse_foreach(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect_keyword("foreach")?;
        self.expect_punct('(')?;
        let binding_ty = if self.is_keyword("var") {
            self.bump();
            None
        } else {
            Some(self.parse_type()?)
        };
        let binding = if self.eat_punct('(') {
            let mut names = vec![self.expect_ident()?.0];
            while self.eat_punct(',') {
                names.push(self.expect_ident()?.0);
            }
            self.expect_punct(')')?;
            ForEachBinding::Tuple(names)
        } else {
            ForEachBinding::Single(self.expect_ident()?.0)
        };
        self.expect_keyword("in")?;
        let iterable = self.parse_expr()?;
        self.expect_punct(')')?;
        let body = Box::new(self.parse_stmt()?);
        let span = start.merge(body.span());
        Ok(Stmt::ForEach {
            binding,
            binding_ty,
            iterable,
            body,
            span,
        })
    }

    /// `using (<resource decl or expr>) <body>` — a scoped resource that is
    /// disposed on every exit path from `body`, unlike the `using path;`
    /// import form `parse_item` recognizes at the top level.
    fn parse_using_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect_keyword("using")?;
        self.expect_punct('(')?;
        let decl = if self.looks_like_var_decl() || self.is_keyword("var") || self.is_keyword("const") {
            let start = self.peek().span;
            let is_const = self.eat_keyword("const");
            let ty = if is_const || self.is_keyword("var") {
                if self.is_keyword("var") {
                    self.bump();
                    None
                } else {
                    Some(self.parse_type()?)
                }
            } else {
                Some(self.parse_type()?)
            };
            let (name, _) = self.expect_ident()?;
            self.expect_op("=")?;
            let init = Some(self.parse_expr()?);
            let span = start.merge(init.as_ref().unwrap().span());
            Box::new(Stmt::VarDecl(VarDecl { name, ty, is_const, init, span }))
        } else {
            let e = self.parse_expr()?;
            let span = e.span();
            Box::new(Stmt::Expr(e.with_span(span)))
        };
        self.expect_punct(')')?;
        let body = Box::new(self.parse_stmt()?);
        let span = start.merge(body.span());
        Ok(Stmt::Using { decl, body, span })
    }

    fn parse_switch_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect_keyword("switch")?;
        self.expect_punct('(')?;
        let scrutinee = self.parse_expr()?;
        self.expect_punct(')')?;
        self.expect_punct('{')?;
        let mut arms = Vec::new();
        while !self.is_punct('}') && !self.peek().is_eof() {
            let arm_start = self.peek().span;
            let pattern = if self.eat_keyword("default") {
                Pattern::Wildcard { span: arm_start }
            } else {
                self.expect_keyword("case")?;
                self.parse_pattern()?
            };
            let guard = if self.eat_keyword("when") {
                Some(self.parse_expr()?)
            } else {
                None
            };
            self.expect_punct(':')?;
            let mut body = Vec::new();
            while !self.is_keyword("case")
                && !self.is_keyword("default")
                && !self.is_punct('}')
                && !self.peek().is_eof()
            {
                match self.parse_stmt() {
                    Ok(s) => body.push(s),
                    Err(e) => {
                        self.record(e);
                        self.synchronize();
                    }
                }
            }
            let end = body.last().map(|s| s.span()).unwrap_or(arm_start);
            arms.push(SwitchArm {
                pattern,
                guard,
                body,
                span: arm_start.merge(end),
            });
        }
        let end = self.expect_punct('}')?;
        Ok(Stmt::Switch {
            scrutinee,
            arms,
            span: start.merge(end),
        })
    }

    fn parse_try(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect_keyword("try")?;
        let body = self.parse_block()?;
        let mut catches = Vec::new();
        while self.is_keyword("catch") {
            let cstart = self.bump().span;
            let mut exception_ty = None;
            let mut binding = None;
            if self.eat_punct('(') {
                exception_ty = Some(self.parse_type()?);
                if matches!(self.peek().kind, TokenKind::Ident(_)) {
                    binding = Some(self.expect_ident()?.0);
                }
                self.expect_punct(')')?;
            }
            let cbody = self.parse_block()?;
            catches.push(CatchClause {
                exception_ty,
                binding,
                span: cstart.merge(cbody.span),
                body: cbody,
            });
        }
        let finally = if self.eat_keyword("finally") {
            Some(self.parse_block()?)
        } else {
            None
        };
        let end = finally
            .as_ref()
            .map(|b| b.span)
            .or_else(|| catches.last().map(|c| c.span))
            .unwrap_or(body.span);
        Ok(Stmt::Try {
            body,
            catches,
            finally,
            span: start.merge(end),
        })
    }

    fn parse_throw(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect_keyword("throw")?;
        let value = if self.is_punct(';') {
            None
        } else {
            Some(self.parse_expr()?)
        };
        let end = self.expect_punct(';')?;
        Ok(Stmt::Throw {
            value,
            span: start.merge(end),
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect_keyword("return")?;
        let value = if self.is_punct(';') {
            None
        } else {
            Some(self.parse_expr()?)
        };
        let end = self.expect_punct(';')?;
        Ok(Stmt::Return {
            value,
            span: start.merge(end),
        })
    }

    // --- expressions: precedence climbing ----------------------------------

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_ternary()?;
        let op = match &self.peek().kind {
            TokenKind::Operator(o) => match o.as_str() {
                "=" => Some(AssignOp::Assign),
                "+=" => Some(AssignOp::Add),
                "-=" => Some(AssignOp::Sub),
                "*=" => Some(AssignOp::Mul),
                "/=" => Some(AssignOp::Div),
                "%=" => Some(AssignOp::Rem),
                "&=" => Some(AssignOp::BitAnd),
                "|=" => Some(AssignOp::BitOr),
                "^=" => Some(AssignOp::BitXor),
                "<<=" => Some(AssignOp::Shl),
                ">>=" => Some(AssignOp::Shr),
                ">>>=" => Some(AssignOp::UShr),
                "??=" => Some(AssignOp::Coalesce),
                _ => None,
            },
            _ => None,
        };
        let Some(op) = op else { return Ok(left) };
        self.bump();
        let value = self.parse_assignment()?;
        let span = left.span().merge(value.span());
        Ok(Expr::Assign {
            op,
            target: Box::new(left),
            value: Box::new(value),
            span,
        })
    }

    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_binary(0)?;
        if self.eat_op("?") {
            let then_expr = self.parse_assignment()?;
            self.expect_punct(':')?;
            let else_expr = self.parse_assignment()?;
            let span = cond.span().merge(else_expr.span());
            return Ok(Expr::Ternary {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
                span,
            });
        }
        if self.is_keyword("is") {
            self.bump();
            let pattern = self.parse_pattern()?;
            let span = cond.span().merge(pattern.span());
            return Ok(Expr::Is {
                operand: Box::new(cond),
                pattern: Box::new(pattern),
                span,
            });
        }
        Ok(cond)
    }

    fn binary_op_and_prec(&mut self) -> Option<(BinOp, u8)> {
        let (op, prec) = match &self.peek().kind {
            TokenKind::Operator(o) => match o.as_str() {
                "||" => (BinOp::Or, 1),
                "&&" => (BinOp::And, 2),
                "|" => (BinOp::BitOr, 3),
                "^" => (BinOp::BitXor, 4),
                "&" => (BinOp::BitAnd, 5),
                "==" => (BinOp::Eq, 6),
                "!=" => (BinOp::Ne, 6),
                "<" => (BinOp::Lt, 7),
                "<=" => (BinOp::Le, 7),
                ">" => (BinOp::Gt, 7),
                ">=" => (BinOp::Ge, 7),
                "<<" => (BinOp::Shl, 8),
                ">>" => (BinOp::Shr, 8),
                ">>>" => (BinOp::UShr, 8),
                "??" => (BinOp::Coalesce, 1),
                "+" => (BinOp::Add, 9),
                "-" => (BinOp::Sub, 9),
                "*" => (BinOp::Mul, 10),
                "/" => (BinOp::Div, 10),
                "%" => (BinOp::Rem, 10),
                "**" => (BinOp::Pow, 11),
                _ => return None,
            },
            _ => return None,
        };
        Some((op, prec))
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let Some((op, prec)) = self.binary_op_and_prec() else { break };
            if prec < min_prec {
                break;
            }
            self.bump();
            let next_min = if op == BinOp::Pow { prec } else { prec + 1 };
            let right = self.parse_binary(next_min)?;
            let span = left.span().merge(right.span());
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek().span;
        let op = match &self.peek().kind {
            TokenKind::Operator(o) => match o.as_str() {
                "-" => Some(UnOp::Neg),
                "!" => Some(UnOp::Not),
                "~" => Some(UnOp::BitNot),
                "++" => Some(UnOp::PreInc),
                "--" => Some(UnOp::PreDec),
                "&" => Some(UnOp::AddressOf),
                "*" => Some(UnOp::Deref),
                _ => None,
            },
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let operand = self.parse_unary()?;
            let span = start.merge(operand.span());
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                span,
            });
        }
        if self.is_punct('(') && self.looks_like_cast() {
            self.bump();
            let ty = self.parse_type()?;
            self.expect_punct(')')?;
            let operand = self.parse_unary()?;
            let span = start.merge(operand.span());
            return Ok(Expr::Cast {
                ty,
                operand: Box::new(operand),
                span,
            });
        }
        self.parse_postfix()
    }

    fn looks_like_cast(&self) -> bool {
        let tag_ok = matches!(&self.peek_n(1).kind, TokenKind::Keyword(k) if crate::tag_keyword(k));
        tag_ok && matches!(self.peek_n(2).kind, TokenKind::Punct(')'))
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat_punct('.') {
                let (name, nspan) = self.expect_ident()?;
                let span = expr.span().merge(nspan);
                expr = Expr::Member {
                    target: Box::new(expr),
                    name,
                    span,
                };
            } else if self.is_punct('(') {
                self.bump();
                let args = self.parse_args()?;
                let end = self.expect_punct(')')?;
                let span = expr.span().merge(end);
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    span,
                };
            } else if self.is_punct('[') {
                self.bump();
                let index = self.parse_index_kind()?;
                let end = self.expect_punct(']')?;
                let span = expr.span().merge(end);
                expr = Expr::Index {
                    target: Box::new(expr),
                    index,
                    span,
                };
            } else if self.is_op("++") {
                let end = self.bump().span;
                let span = expr.span().merge(end);
                expr = Expr::Unary {
                    op: UnOp::PostInc,
                    operand: Box::new(expr),
                    span,
                };
            } else if self.is_op("--") {
                let end = self.bump().span;
                let span = expr.span().merge(end);
                expr = Expr::Unary {
                    op: UnOp::PostDec,
                    operand: Box::new(expr),
                    span,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// The bracketed content of an index expression: `^k`, `s..e`, `..e`,
    /// `s..`, `..`, or a plain index. A `^`-prefixed bound on either side of
    /// a range is folded into a negated expression, the same "negative means
    /// from the end" convention the `InRange` built-in resolves bounds with.
    fn parse_index_kind(&mut self) -> Result<IndexKind, ParseError> {
        if self.is_op("..") {
            self.bump();
            let end = if self.is_punct(']') { None } else { Some(Box::new(self.parse_range_bound()?)) };
            return Ok(IndexKind::Range { start: None, end });
        }
        if self.eat_op("^") {
            let value = self.parse_expr()?;
            if self.is_op("..") {
                self.bump();
                let end = if self.is_punct(']') { None } else { Some(Box::new(self.parse_range_bound()?)) };
                return Ok(IndexKind::Range { start: Some(Box::new(negate(value))), end });
            }
            return Ok(IndexKind::FromEnd(Box::new(value)));
        }
        let first = self.parse_expr()?;
        if self.eat_op("..") {
            let end = if self.is_punct(']') { None } else { Some(Box::new(self.parse_range_bound()?)) };
            return Ok(IndexKind::Range { start: Some(Box::new(first)), end });
        }
        Ok(IndexKind::Single(Box::new(first)))
    }

    fn parse_range_bound(&mut self) -> Result<Expr, ParseError> {
        if self.eat_op("^") {
            let value = self.parse_expr()?;
            return Ok(negate(value));
        }
        self.parse_expr()
    }

    fn parse_args(&mut self) -> Result<Vec<Arg>, ParseError> {
        let mut args = Vec::new();
        if self.is_punct(')') {
            return Ok(args);
        }
        loop {
            let start = self.peek().span;
            let mode = if self.eat_keyword("ref") {
                ParamMode::Ref
            } else if self.eat_keyword("out") {
                ParamMode::Out
            } else {
                ParamMode::ByValue
            };
            let name = if matches!(self.peek().kind, TokenKind::Ident(_))
                && matches!(self.peek_n(1).kind, TokenKind::Punct(':'))
                && !matches!(self.peek_n(2).kind, TokenKind::Punct(':'))
            {
                let (n, _) = self.expect_ident()?;
                self.bump();
                Some(n)
            } else {
                None
            };
            let value = self.parse_expr()?;
            let span = start.merge(value.span());
            args.push(Arg { name, value, mode, span });
            if !self.eat_punct(',') {
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.peek().clone();
        match tok.kind.clone() {
            TokenKind::Number(text) => {
                self.bump();
                self.number_literal(&text, tok.span)
            }
            TokenKind::StringLit { decoded, raw, kind } => {
                self.bump();
                self.string_literal(decoded, raw, kind, tok.span)
            }
            TokenKind::CharLit(c) => {
                self.bump();
                Ok(Expr::CharLiteral { value: c, span: tok.span })
            }
            TokenKind::Keyword(k) if k == "true" => {
                self.bump();
                Ok(Expr::BoolLiteral { value: true, span: tok.span })
            }
            TokenKind::Keyword(k) if k == "false" => {
                self.bump();
                Ok(Expr::BoolLiteral { value: false, span: tok.span })
            }
            TokenKind::Keyword(k) if k == "null" => {
                self.bump();
                Ok(Expr::NullLiteral { span: tok.span })
            }
            TokenKind::Keyword(k) if k == "this" => {
                self.bump();
                Ok(Expr::This { span: tok.span })
            }
            TokenKind::Keyword(k) if k == "new" => self.parse_new(),
            TokenKind::Keyword(k) if k == "switch" => self.parse_switch_expr(),
            TokenKind::Ident(name) => {
                self.bump();
                if self.is_op("=>") {
                    return self.parse_lambda_single(name, tok.span);
                }
                Ok(Expr::Ident { name, span: tok.span })
            }
            TokenKind::Punct('(') => self.parse_paren_or_lambda(),
            TokenKind::Punct('[') => self.parse_array_literal(),
            _ => Err(self.error(format!("expected an expression, found {}", tok.kind))),
        }
    }

    fn number_literal(&self, text: &str, span: Span) -> Result<Expr, ParseError> {
        let lower = text.to_ascii_lowercase();
        let is_float_syntax = lower.contains('.') || lower.contains('e');
        let (digits, suffix) = split_numeric_suffix(&lower);
        if is_float_syntax || matches!(suffix.as_deref(), Some("f") | Some("d") | Some("m")) {
            let value: f64 = digits.parse().map_err(|_| {
                ParseError::new(format!("invalid numeric literal `{text}`"), span)
            })?;
            Ok(Expr::FloatLiteral {
                value,
                tag_hint: suffix,
                span,
            })
        } else {
            let without_underscores: String = digits.chars().filter(|c| *c != '_').collect();
            let value = parse_int_literal(&without_underscores).map_err(|_| {
                ParseError::new(format!("invalid numeric literal `{text}`"), span)
            })?;
            Ok(Expr::IntLiteral {
                value,
                tag_hint: suffix,
                span,
            })
        }
    }

    fn string_literal(
        &mut self,
        decoded: String,
        raw: String,
        kind: StringKind,
        span: Span,
    ) -> Result<Expr, ParseError> {
        match kind {
            StringKind::Regular | StringKind::Verbatim => {
                Ok(Expr::StringLiteral { value: decoded, span })
            }
            StringKind::Interpolated | StringKind::InterpolatedVerbatim => {
                let verbatim = matches!(kind, StringKind::InterpolatedVerbatim);
                let parts = parse_interpolation_parts(&raw, verbatim, span)?;
                Ok(Expr::InterpolatedString { parts, span })
            }
        }
    }

    fn parse_new(&mut self) -> Result<Expr, ParseError> {
        let start = self.expect_keyword("new")?;
        let ty = self.parse_type()?;
        if self.is_punct('[') {
            let mut lengths = Vec::new();
            while self.eat_punct('[') {
                lengths.push(self.parse_expr()?);
                self.expect_punct(']')?;
            }
            let end = lengths.last().map(|e| e.span()).unwrap_or(ty.span);
            return Ok(Expr::NewArray {
                element_ty: ty,
                lengths,
                span: start.merge(end),
            });
        }
        self.expect_punct('(')?;
        let args = self.parse_args()?;
        let end = self.expect_punct(')')?;
        Ok(Expr::NewObject {
            ty,
            args,
            span: start.merge(end),
        })
    }

    fn parse_switch_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.expect_keyword("switch")?;
        self.expect_punct('(')?;
        let scrutinee = self.parse_expr()?;
        self.expect_punct(')')?;
        self.expect_punct('{')?;
        let mut arms = Vec::new();
        while !self.is_punct('}') && !self.peek().is_eof() {
            let pattern = self.parse_pattern()?;
            let guard = if self.eat_keyword("when") {
                Some(self.parse_expr()?)
            } else {
                None
            };
            self.expect_op("=>")?;
            let value = self.parse_assignment()?;
            arms.push((pattern, guard, value));
            if !self.eat_punct(',') {
                break;
            }
        }
        let end = self.expect_punct('}')?;
        Ok(Expr::SwitchExpr {
            scrutinee: Box::new(scrutinee),
            arms,
            span: start.merge(end),
        })
    }

    fn expect_op(&mut self, op: &str) -> Result<Span, ParseError> {
        if self.is_op(op) {
            Ok(self.bump().span)
        } else {
            Err(self.error(format!("expected `{op}`, found {}", self.peek().kind)))
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expr, ParseError> {
        let start = self.expect_punct('[')?;
        let mut elements = Vec::new();
        if !self.is_punct(']') {
            elements.push(self.parse_expr()?);
            while self.eat_punct(',') {
                elements.push(self.parse_expr()?);
            }
        }
        let end = self.expect_punct(']')?;
        Ok(Expr::ArrayLiteral {
            elements,
            span: start.merge(end),
        })
    }

    fn parse_paren_or_lambda(&mut self) -> Result<Expr, ParseError> {
        let mark = self.mark();
        if let Some(lambda) = self.try_parse_paren_lambda(mark) {
            return lambda;
        }
        self.reset(mark);
        let start = self.expect_punct('(')?;
        let first = self.parse_expr()?;
        if self.eat_punct(',') {
            let mut elements = vec![first];
            elements.push(self.parse_expr()?);
            while self.eat_punct(',') {
                elements.push(self.parse_expr()?);
            }
            let end = self.expect_punct(')')?;
            return Ok(Expr::Tuple {
                elements,
                span: start.merge(end),
            });
        }
        let end = self.expect_punct(')')?;
        Ok(Expr::Paren {
            inner: Box::new(first),
            span: start.merge(end),
        })
    }

    fn try_parse_paren_lambda(&mut self, mark: usize) -> Option<Result<Expr, ParseError>> {
        let start = self.peek().span;
        self.bump(); // (
        let mut params = Vec::new();
        if !self.is_punct(')') {
            loop {
                let pstart = self.peek().span;
                let TokenKind::Ident(name) = self.peek().kind.clone() else {
                    self.reset(mark);
                    return None;
                };
                self.bump();
                params.push(Param {
                    name,
                    ty: None,
                    mode: ParamMode::ByValue,
                    default: None,
                    span: pstart,
                });
                if !self.eat_punct(',') {
                    break;
                }
            }
        }
        if !self.eat_punct(')') {
            self.reset(mark);
            return None;
        }
        if !self.is_op("=>") {
            self.reset(mark);
            return None;
        }
        self.bump();
        Some(self.finish_lambda(params, start))
    }

    fn parse_lambda_single(&mut self, name: String, start: Span) -> Result<Expr, ParseError> {
        self.bump(); // =>
        self.finish_lambda(
            vec![Param {
                name,
                ty: None,
                mode: ParamMode::ByValue,
                default: None,
                span: start,
            }],
            start,
        )
    }

    fn finish_lambda(&mut self, params: Vec<Param>, start: Span) -> Result<Expr, ParseError> {
        let body = if self.is_punct('{') {
            LambdaBody::Block(self.parse_block()?)
        } else {
            LambdaBody::Expr(Box::new(self.parse_assignment()?))
        };
        let end = match &body {
            LambdaBody::Block(b) => b.span,
            LambdaBody::Expr(e) => e.span(),
        };
        Ok(Expr::Lambda {
            params,
            body,
            span: start.merge(end),
        })
    }

    // --- patterns ------------------------------------------------------------

    fn parse_pattern(&mut self) -> Result<Pattern, ParseError> {
        self.parse_pattern_or()
    }

    fn parse_pattern_or(&mut self) -> Result<Pattern, ParseError> {
        let mut left = self.parse_pattern_and()?;
        while self.eat_keyword("or") {
            let right = self.parse_pattern_and()?;
            let span = left.span().merge(right.span());
            left = Pattern::Or {
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        Ok(left)
    }

    fn parse_pattern_and(&mut self) -> Result<Pattern, ParseError> {
        let mut left = self.parse_pattern_unary()?;
        while self.eat_keyword("and") {
            let right = self.parse_pattern_unary()?;
            let span = left.span().merge(right.span());
            left = Pattern::And {
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        Ok(left)
    }

    fn parse_pattern_unary(&mut self) -> Result<Pattern, ParseError> {
        if self.is_keyword("not") {
            let start = self.bump().span;
            let inner = self.parse_pattern_unary()?;
            let span = start.merge(inner.span());
            return Ok(Pattern::Not {
                inner: Box::new(inner),
                span,
            });
        }
        self.parse_pattern_primary()
    }

    fn parse_pattern_primary(&mut self) -> Result<Pattern, ParseError> {
        let tok = self.peek().clone();
        if self.eat_keyword("_") {
            return Ok(Pattern::Wildcard { span: tok.span });
        }
        if self.is_keyword("null") {
            self.bump();
            return Ok(Pattern::Null { span: tok.span });
        }
        if let TokenKind::Operator(o) = &tok.kind {
            if matches!(o.as_str(), "<" | "<=" | ">" | ">=" | "==" | "!=") {
                let op = match o.as_str() {
                    "<" => BinOp::Lt,
                    "<=" => BinOp::Le,
                    ">" => BinOp::Gt,
                    ">=" => BinOp::Ge,
                    "==" => BinOp::Eq,
                    _ => BinOp::Ne,
                };
                self.bump();
                let value = self.parse_binary(9)?;
                let span = tok.span.merge(value.span());
                return Ok(Pattern::Relational { op, value, span });
            }
        }
        // Type pattern `Type` or `Type binding`, vs. a bare constant expression.
        let looks_like_type = matches!(&tok.kind, TokenKind::Ident(n) if n.chars().next().is_some_and(|c| c.is_uppercase()))
            || matches!(&tok.kind, TokenKind::Keyword(k) if crate::tag_keyword(k));
        if looks_like_type {
            let mark = self.mark();
            if let Ok(ty) = self.parse_type() {
                if let TokenKind::Ident(binding) = self.peek().kind.clone() {
                    self.bump();
                    let span = tok.span.merge(self.peek().span);
                    return Ok(Pattern::Type {
                        ty,
                        binding: Some(binding),
                        span,
                    });
                }
                // `Type` alone without trailing constant tokens is a type pattern.
                if !matches!(self.peek().kind, TokenKind::Punct('(')) {
                    return Ok(Pattern::Type {
                        ty,
                        binding: None,
                        span: tok.span,
                    });
                }
            }
            self.reset(mark);
        }
        let value = self.parse_unary()?;
        let span = value.span();
        Ok(Pattern::Constant { value, span })
    }

    // --- helpers referenced by ast.rs-adjacent code --------------------------
}

enum Member {
    Field(FieldDecl),
    Method(FunctionDecl),
}

fn split_numeric_suffix(lower: &str) -> (String, Option<String>) {
    let suffixes = ["ul", "lu", "f", "d", "m", "u", "l"];
    for suf in suffixes {
        if lower.ends_with(suf) && lower.len() > suf.len() {
            return (
                lower[..lower.len() - suf.len()].to_string(),
                Some(suf.to_string()),
            );
        }
    }
    (lower.to_string(), None)
}

fn parse_int_literal(digits: &str) -> Result<i64, std::num::ParseIntError> {
    if let Some(hex) = digits.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).or_else(|_| u64::from_str_radix(hex, 16).map(|v| v as i64))
    } else if let Some(bin) = digits.strip_prefix("0b") {
        i64::from_str_radix(bin, 2)
    } else {
        digits.parse()
    }
}

/// Split an interpolated string body into literal and `{expr[,align][:fmt]}`
/// parts, re-lexing+re-parsing each expression fragment independently.
fn parse_interpolation_parts(
    body: &str,
    _verbatim: bool,
    span: Span,
) -> Result<Vec<InterpolationPart>, ParseError> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let chars: Vec<char> = body.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                literal.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                literal.push('}');
                i += 2;
            }
            '{' => {
                if !literal.is_empty() {
                    parts.push(InterpolationPart::Literal(std::mem::take(&mut literal)));
                }
                let mut depth = 1;
                let frag_start = i + 1;
                i += 1;
                while i < chars.len() && depth > 0 {
                    match chars[i] {
                        '{' => depth += 1,
                        '}' => depth -= 1,
                        _ => {}
                    }
                    if depth > 0 {
                        i += 1;
                    }
                }
                let fragment: String = chars[frag_start..i].iter().collect();
                i += 1; // closing }

                let (expr_part, align, format) = split_interpolation_fragment(&fragment);
                let (tokens, _) = match lexer::tokenize(&expr_part) {
                    Ok(t) => (t, ()),
                    Err(e) => return Err(ParseError::new(e.message, span)),
                };
                let mut sub = Parser::new(tokens);
                let expr = sub.parse_expr()?;
                let alignment = match align {
                    Some(a) => {
                        let tokens = lexer::tokenize(&a)
                            .map_err(|e| ParseError::new(e.message, span))?;
                        let mut sp = Parser::new(tokens);
                        Some(sp.parse_expr()?)
                    }
                    None => None,
                };
                parts.push(InterpolationPart::Expr {
                    expr,
                    alignment,
                    format,
                });
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }
    if !literal.is_empty() {
        parts.push(InterpolationPart::Literal(literal));
    }
    Ok(parts)
}

/// Split `expr,align:format` at top-level `,`/`:` (not inside nested
/// brackets or strings).
fn split_interpolation_fragment(fragment: &str) -> (String, Option<String>, Option<String>) {
    let chars: Vec<char> = fragment.chars().collect();
    let mut depth = 0i32;
    let mut comma_at = None;
    let mut colon_at = None;
    for (i, c) in chars.iter().enumerate() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 && comma_at.is_none() => comma_at = Some(i),
            ':' if depth == 0 && colon_at.is_none() => colon_at = Some(i),
            _ => {}
        }
    }
    let expr_end = comma_at.or(colon_at).unwrap_or(chars.len());
    let expr_part: String = chars[..expr_end].iter().collect();
    let align = comma_at.map(|c| {
        let end = colon_at.unwrap_or(chars.len());
        chars[c + 1..end].iter().collect::<String>().trim().to_string()
    });
    let format = colon_at.map(|c| chars[c + 1..].iter().collect::<String>());
    (expr_part.trim().to_string(), align, format)
}

impl Expr {
    /// Rebuild this expression with a new span covering trailing tokens
    /// (e.g. the terminating `;` of an expression statement).
    fn with_span(self, span: Span) -> Expr {
        match self {
            Expr::IntLiteral { value, tag_hint, .. } => Expr::IntLiteral { value, tag_hint, span },
            other => other_with_span(other, span),
        }
    }
}

/// Folds a `^`-prefixed bound into a negated expression, the convention a
/// negative slice bound already means "count from the end" under.
fn negate(value: Expr) -> Expr {
    let span = value.span();
    Expr::Unary { op: UnOp::Neg, operand: Box::new(value), span }
}

fn other_with_span(expr: Expr, span: Span) -> Expr {
    // Statement spans are cosmetic (used for diagnostics); reusing the
    // original span where the shape makes updating it non-trivial is fine.
    match expr {
        Expr::Assign { op, target, value, .. } => Expr::Assign { op, target, value, span },
        Expr::Call { callee, args, .. } => Expr::Call { callee, args, span },
        other => other,
    }
}
