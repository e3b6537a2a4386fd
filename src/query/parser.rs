//! Recursive-descent parser from SQL tokens to a [`SelectStmt`] (§4.4).

use crate::error::{Error, ErrorCode, Result};
use crate::value::Value;

use super::ast::{Op, Predicate, Projection, SelectStmt};
use super::lexer::{Lexer, Token};

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
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

    fn expect(&mut self, want: &Token) -> Result<()> {
        match self.advance() {
            Some(t) if &t == want => Ok(()),
            _ => Err(Error::with_message(ErrorCode::SyntaxError, format!("expected {:?}", want))
                .at(self.peek_pos())),
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.advance() {
            Some(Token::Ident(s)) => Ok(s),
            _ => Err(Error::with_message(ErrorCode::SyntaxError, "expected identifier")
                .at(self.peek_pos())),
        }
    }

    fn parse_select(&mut self) -> Result<SelectStmt> {
        self.expect(&Token::Select)?;
        let projection = self.parse_projection()?;
        self.expect(&Token::From)?;
        let table = self.expect_ident()?;

        let mut predicates = Vec::new();
        if self.peek() == Some(&Token::Where) {
            self.advance();
            predicates.push(self.parse_predicate()?);
            while self.peek() == Some(&Token::And) {
                self.advance();
                predicates.push(self.parse_predicate()?);
            }
        }

        let mut limit = None;
        if self.peek() == Some(&Token::Limit) {
            self.advance();
            match self.advance() {
                Some(Token::Integer(n)) if n >= 0 => limit = Some(n as usize),
                _ => {
                    return Err(Error::with_message(ErrorCode::SyntaxError, "expected non-negative limit")
                        .at(self.peek_pos()))
                }
            }
        }

        if self.pos != self.tokens.len() {
            return Err(Error::with_message(ErrorCode::SyntaxError, "trailing input after statement")
                .at(self.peek_pos()));
        }

        Ok(SelectStmt {
            projection,
            table,
            predicates,
            limit,
        })
    }

    fn parse_projection(&mut self) -> Result<Projection> {
        if self.peek() == Some(&Token::Star) {
            self.advance();
            return Ok(Projection::Star);
        }
        if self.peek() == Some(&Token::Count) {
            self.advance();
            self.expect(&Token::LParen)?;
            self.expect(&Token::Star)?;
            self.expect(&Token::RParen)?;
            return Ok(Projection::CountStar);
        }
        let mut cols = vec![self.expect_ident()?];
        while self.peek() == Some(&Token::Comma) {
            self.advance();
            cols.push(self.expect_ident()?);
        }
        Ok(Projection::Columns(cols))
    }

    fn parse_predicate(&mut self) -> Result<Predicate> {
        let column = self.expect_ident()?;
        let op = self.parse_op()?;
        let literal = self.parse_literal()?;
        Ok(Predicate { column, op, literal })
    }

    fn parse_op(&mut self) -> Result<Op> {
        match self.advance() {
            Some(Token::Eq) => Ok(Op::Eq),
            Some(Token::NotEq) => Ok(Op::NotEq),
            Some(Token::Lt) => Ok(Op::Lt),
            Some(Token::Le) => Ok(Op::Le),
            Some(Token::Gt) => Ok(Op::Gt),
            Some(Token::Ge) => Ok(Op::Ge),
            _ => Err(Error::with_message(ErrorCode::SyntaxError, "expected comparison operator")
                .at(self.peek_pos())),
        }
    }

    fn parse_literal(&mut self) -> Result<Value> {
        match self.advance() {
            Some(Token::Integer(n)) => Ok(Value::Int(n)),
            Some(Token::Float(f)) => Ok(Value::Float(f)),
            Some(Token::Str(s)) => Ok(Value::String(s)),
            Some(Token::Bytes(b)) => Ok(Value::Bytes(b)),
            Some(Token::Null) => Ok(Value::Null),
            _ => Err(Error::with_message(ErrorCode::SyntaxError, "expected literal")
                .at(self.peek_pos())),
        }
    }
}

/// Parse one `SELECT` statement.
pub fn parse(sql: &str) -> Result<SelectStmt> {
    let tokens = Lexer::new(sql).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_select()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_star_select_with_where_and_limit() {
        let stmt = parse("SELECT * FROM orders WHERE amount >= 10 AND status = 'open' LIMIT 5").unwrap();
        assert_eq!(stmt.table, "orders");
        assert_eq!(stmt.projection, Projection::Star);
        assert_eq!(stmt.predicates.len(), 2);
        assert_eq!(stmt.limit, Some(5));
    }

    #[test]
    fn parses_column_projection() {
        let stmt = parse("SELECT name, age FROM people").unwrap();
        assert_eq!(stmt.projection, Projection::Columns(vec!["name".into(), "age".into()]));
    }

    #[test]
    fn parses_count_star() {
        let stmt = parse("SELECT COUNT(*) FROM t").unwrap();
        assert_eq!(stmt.projection, Projection::CountStar);
    }

    #[test]
    fn rejects_trailing_garbage() {
        let err = parse("SELECT * FROM t EXTRA").unwrap_err();
        assert_eq!(err.code(), ErrorCode::SyntaxError);
    }
}
