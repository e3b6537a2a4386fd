//! The FlatBuffers-flavored IDL front end.
//!
//! Recognizes `namespace`, `enum`, `table`/`struct`, and `root_type`
//! declarations (§4.3). This is a small hand-rolled lexer/parser in the
//! spirit of the narrow SQL tokenizer in [`crate::query`] — enough
//! structure to report a useful `SyntaxError` position, not a general
//! FlatBuffers compiler.

use std::collections::HashMap;

use crate::error::{Error, ErrorCode, Result};
use crate::value::Value;

use super::{ColumnDef, ColumnType, TableDef};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Colon,
    Semicolon,
    Comma,
    Equals,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    source: &'a str,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Lexer {
            chars: source.char_indices().peekable(),
            source,
        }
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize)>> {
        let mut tokens = Vec::new();
        while let Some(&(pos, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
                continue;
            }
            if c == '/' {
                let mut clone = self.chars.clone();
                clone.next();
                if let Some((_, '/')) = clone.peek().copied() {
                    while let Some(&(_, c)) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.chars.next();
                    }
                    continue;
                }
            }
            match c {
                ':' => {
                    self.chars.next();
                    tokens.push((Token::Colon, pos));
                }
                ';' => {
                    self.chars.next();
                    tokens.push((Token::Semicolon, pos));
                }
                ',' => {
                    self.chars.next();
                    tokens.push((Token::Comma, pos));
                }
                '=' => {
                    self.chars.next();
                    tokens.push((Token::Equals, pos));
                }
                '{' => {
                    self.chars.next();
                    tokens.push((Token::LBrace, pos));
                }
                '}' => {
                    self.chars.next();
                    tokens.push((Token::RBrace, pos));
                }
                '[' => {
                    self.chars.next();
                    tokens.push((Token::LBracket, pos));
                }
                ']' => {
                    self.chars.next();
                    tokens.push((Token::RBracket, pos));
                }
                '(' => {
                    self.chars.next();
                    tokens.push((Token::LParen, pos));
                }
                ')' => {
                    self.chars.next();
                    tokens.push((Token::RParen, pos));
                }
                c if c.is_ascii_digit() || (c == '-' && self.peek_digit_after_sign()) => {
                    let start = pos;
                    let mut end = pos + c.len_utf8();
                    self.chars.next();
                    while let Some(&(p, c)) = self.chars.peek() {
                        if c.is_ascii_digit() || c == '.' {
                            end = p + c.len_utf8();
                            self.chars.next();
                        } else {
                            break;
                        }
                    }
                    tokens.push((Token::Number(self.source[start..end].to_string()), start));
                }
                c if c.is_alphabetic() || c == '_' => {
                    let start = pos;
                    let mut end = pos + c.len_utf8();
                    self.chars.next();
                    while let Some(&(p, c)) = self.chars.peek() {
                        if c.is_alphanumeric() || c == '_' {
                            end = p + c.len_utf8();
                            self.chars.next();
                        } else {
                            break;
                        }
                    }
                    tokens.push((Token::Ident(self.source[start..end].to_string()), start));
                }
                other => {
                    return Err(Error::with_message(
                        ErrorCode::SyntaxError,
                        format!("unexpected character '{}'", other),
                    )
                    .at(pos));
                }
            }
        }
        Ok(tokens)
    }

    fn peek_digit_after_sign(&self) -> bool {
        let mut clone = self.chars.clone();
        clone.next();
        matches!(clone.peek(), Some((_, c)) if c.is_ascii_digit())
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    enums: HashMap<String, ()>,
    pending_namespace: Option<String>,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_pos(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, p)| *p).unwrap_or(0)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.advance() {
            Some(Token::Ident(s)) => Ok(s),
            _ => Err(Error::with_message(ErrorCode::SyntaxError, "expected identifier")
                .at(self.peek_pos())),
        }
    }

    fn expect(&mut self, want: &Token) -> Result<()> {
        match self.advance() {
            Some(t) if &t == want => Ok(()),
            _ => Err(Error::with_message(
                ErrorCode::SyntaxError,
                format!("expected {:?}", want),
            )
            .at(self.peek_pos())),
        }
    }

    /// Record every `enum Name : type { ... }` declaration's name before
    /// the real parse pass runs, so a field's type resolves the same way
    /// regardless of whether its enum is declared before or after the
    /// table that uses it (§4.3: order-independent).
    fn collect_enum_names(&mut self) {
        for i in 0..self.tokens.len() {
            if let Token::Ident(kw) = &self.tokens[i].0 {
                if kw == "enum" {
                    if let Some((Token::Ident(name), _)) = self.tokens.get(i + 1) {
                        self.enums.insert(name.clone(), ());
                    }
                }
            }
        }
    }

    fn parse(&mut self) -> Result<Vec<TableDef>> {
        self.collect_enum_names();
        let mut tables = Vec::new();
        loop {
            match self.peek() {
                None => break,
                Some(Token::Ident(kw)) if kw == "namespace" => {
                    self.advance();
                    let mut ns = self.expect_ident()?;
                    // namespace can be dotted: A.B.C -- identifiers joined by '.'; our
                    // lexer treats '.' as unsupported, so namespaces are single-segment
                    // or the caller pre-joins. Track the raw ident run until ';'.
                    while let Some(Token::Ident(more)) = self.peek() {
                        ns.push('.');
                        ns.push_str(more);
                        self.advance();
                    }
                    self.expect(&Token::Semicolon)?;
                    self.pending_namespace = Some(ns);
                }
                Some(Token::Ident(kw)) if kw == "enum" => {
                    self.advance();
                    let name = self.expect_ident()?;
                    self.expect(&Token::Colon)?;
                    let _underlying = self.expect_ident()?;
                    self.expect(&Token::LBrace)?;
                    while self.peek() != Some(&Token::RBrace) {
                        self.expect_ident()?;
                        if self.peek() == Some(&Token::Comma) {
                            self.advance();
                        }
                    }
                    self.expect(&Token::RBrace)?;
                    self.enums.insert(name, ());
                }
                Some(Token::Ident(kw)) if kw == "table" || kw == "struct" => {
                    self.advance();
                    let table = self.parse_table()?;
                    tables.push(table);
                }
                Some(Token::Ident(kw)) if kw == "root_type" => {
                    self.advance();
                    self.expect_ident()?;
                    self.expect(&Token::Semicolon)?;
                }
                _ => {
                    return Err(Error::with_message(ErrorCode::SyntaxError, "unrecognized construct")
                        .at(self.peek_pos()));
                }
            }
        }
        if let Some(ns) = self.pending_namespace.clone() {
            for t in &mut tables {
                t.fb_namespace = Some(ns.clone());
            }
        }
        Ok(tables)
    }

    fn parse_table(&mut self) -> Result<TableDef> {
        let name = self.expect_ident()?;
        let mut table = TableDef::new(name);
        self.expect(&Token::LBrace)?;
        while self.peek() != Some(&Token::RBrace) {
            let field_name = self.expect_ident()?;
            self.expect(&Token::Colon)?;
            let (ty, is_bytes_vector) = self.parse_type()?;
            let _ = is_bytes_vector;

            let mut default = None;
            if self.peek() == Some(&Token::Equals) {
                self.advance();
                default = Some(self.parse_default(ty)?);
            }

            let mut col = ColumnDef::new(field_name, ty);
            col.default = default;

            if self.peek() == Some(&Token::LParen) {
                self.advance();
                while self.peek() != Some(&Token::RParen) {
                    let attr = self.expect_ident()?;
                    match attr.as_str() {
                        "key" | "id" => col.is_key = true,
                        "indexed" => col.is_indexed = true,
                        "required" => col.is_required = true,
                        _ => {
                            // Unknown attributes (e.g. `deprecated`) are skipped;
                            // an optional `: value` may follow.
                            if self.peek() == Some(&Token::Colon) {
                                self.advance();
                                self.advance();
                            }
                        }
                    }
                    if self.peek() == Some(&Token::Comma) {
                        self.advance();
                    }
                }
                self.expect(&Token::RParen)?;
            }

            self.expect(&Token::Semicolon)?;
            table.push_column(col);
        }
        self.expect(&Token::RBrace)?;
        Ok(table)
    }

    fn parse_type(&mut self) -> Result<(ColumnType, bool)> {
        if self.peek() == Some(&Token::LBracket) {
            self.advance();
            let inner = self.expect_ident()?;
            self.expect(&Token::RBracket)?;
            let _ = inner;
            return Ok((ColumnType::Bytes, true));
        }
        let ident = self.expect_ident()?;
        Ok((self.resolve_scalar_type(&ident), false))
    }

    fn resolve_scalar_type(&self, ident: &str) -> ColumnType {
        match ident {
            "bool" => ColumnType::Bool,
            "byte" | "ubyte" | "short" | "ushort" | "int" | "uint" => ColumnType::Int,
            "long" | "ulong" => ColumnType::Long,
            "float" | "double" => ColumnType::Float,
            "string" => ColumnType::String,
            other if self.enums.contains_key(other) => ColumnType::Int,
            _ => ColumnType::Bytes,
        }
    }

    fn parse_default(&mut self, ty: ColumnType) -> Result<Value> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(match ty {
                ColumnType::Float => Value::Float(n.parse().unwrap_or(0.0)),
                _ => Value::Int(n.parse::<f64>().unwrap_or(0.0) as i64),
            }),
            Some(Token::Ident(s)) => Ok(match s.as_str() {
                "true" => Value::Int(1),
                "false" => Value::Int(0),
                other => Value::String(other.to_string()),
            }),
            _ => Err(Error::with_message(ErrorCode::SyntaxError, "expected default value")
                .at(self.peek_pos())),
        }
    }
}

pub fn parse(source: &str) -> Result<Vec<TableDef>> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        enums: HashMap::new(),
        pending_namespace: None,
    };
    parser.parse()
}
