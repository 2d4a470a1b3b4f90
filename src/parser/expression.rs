//! Token cursor and the expression grammar.
//!
//! Binary operators use precedence climbing; the ternary only binds at the
//! lowest level and pipes apply after a full ternary expression.

use super::tokenizer::{Keyword, Tok, Token};
use crate::ast::{BinaryOp, Expr, Pos, StringPart, UnaryOp};
use crate::error::{Error, ErrorKind, Result};
use crate::pipes;

/// Cursor over a token stream with `accept`/`expect`/`peek` primitives
pub struct Tokens {
    tokens: Vec<Token>,
    index: usize,
}

impl Tokens {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, index: 0 }
    }

    pub fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    pub fn peek_at(&self, n: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.index + n).min(last)]
    }

    pub fn pos(&self) -> Pos {
        self.peek().pos
    }

    pub fn at_eof(&self) -> bool {
        matches!(self.peek().tok, Tok::Eof)
    }

    pub fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.index < self.tokens.len().saturating_sub(1) {
            self.index += 1;
        }
        token
    }

    pub fn is_punct(&self, symbol: &str) -> bool {
        matches!(self.peek().tok, Tok::Punct(p) if p == symbol)
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.peek().tok, Tok::Keyword(k) if k == keyword)
    }

    pub fn accept_punct(&mut self, symbol: &str) -> bool {
        if self.is_punct(symbol) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn accept_keyword(&mut self, keyword: Keyword) -> bool {
        if self.is_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn expect_punct(&mut self, symbol: &str) -> Result<Pos> {
        if self.is_punct(symbol) {
            Ok(self.advance().pos)
        } else {
            Err(self.unexpected(&format!("'{}'", symbol)))
        }
    }

    pub fn expect_keyword(&mut self, keyword: Keyword) -> Result<Pos> {
        if self.is_keyword(keyword) {
            Ok(self.advance().pos)
        } else {
            Err(self.unexpected(&format!("'{}'", keyword.as_str())))
        }
    }

    pub fn expect_ident(&mut self) -> Result<(String, Pos)> {
        match &self.peek().tok {
            Tok::Ident(name) => {
                let name = name.clone();
                Ok((name, self.advance().pos))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// `expected X, found Y` at the current token
    pub fn unexpected(&self, expected: &str) -> Error {
        Error::parse(
            ErrorKind::UnexpectedToken,
            format!("expected {}, found {}", expected, self.peek().tok.describe()),
            self.pos(),
        )
    }

    /// Full expression, including trailing pipes
    pub fn parse_expr(&mut self) -> Result<Expr> {
        let mut expr = self.parse_binary(0)?;
        while self.is_punct("|") {
            self.advance();
            let (name, pos) = self.expect_ident()?;
            let Some(pipe) = pipes::lookup(&name) else {
                return Err(Error::parse(
                    ErrorKind::UndeclaredPipe,
                    format!("Cannot pipe into: {}", name),
                    pos,
                ));
            };
            let mut args = Vec::with_capacity(pipe.arity);
            for _ in 0..pipe.arity {
                if !self.starts_operand() {
                    return Err(arity_error(&name, pipe.arity, self.pos()));
                }
                args.push(self.parse_binary(0)?);
            }
            if self.starts_extra_argument() {
                return Err(arity_error(&name, pipe.arity, self.pos()));
            }
            let target_pos = expr.pos();
            expr = Expr::Pipe {
                name,
                target: Box::new(expr),
                args,
                pos: target_pos,
            };
        }
        Ok(expr)
    }

    fn starts_operand(&self) -> bool {
        matches!(
            self.peek().tok,
            Tok::Number(_)
                | Tok::Bool(_)
                | Tok::Null
                | Tok::StringStart
                | Tok::Ident(_)
                | Tok::Punct("(" | "{" | "[" | "!" | "-")
        )
    }

    /// Tokens that can only be a surplus pipe argument; an identifier or a
    /// string may legitimately start the next tag.
    fn starts_extra_argument(&self) -> bool {
        matches!(
            self.peek().tok,
            Tok::Number(_) | Tok::Bool(_) | Tok::Null | Tok::Punct("(" | "{")
        )
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        match self.peek().tok {
            Tok::Punct(symbol) => BinaryOp::from_symbol(symbol),
            _ => None,
        }
    }

    /// Precedence climbing; the ternary is only accepted at level 0
    pub fn parse_binary(&mut self, min_prec: u8) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.binary_op() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(prec + 1)?;
            let pos = lhs.pos();
            lhs = Expr::Binop {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        if min_prec < 1 && self.accept_punct("?") {
            let then = self.parse_binary(0)?;
            self.expect_punct(":")?;
            let otherwise = self.parse_binary(0)?;
            let pos = lhs.pos();
            return Ok(Expr::Ternary {
                condition: Box::new(lhs),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
                pos,
            });
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = if self.is_punct("!") {
            UnaryOp::Not
        } else if self.is_punct("-") {
            UnaryOp::Neg
        } else {
            return self.parse_accessors();
        };
        let pos = self.advance().pos;
        let operand = self.parse_unary()?;
        Ok(Expr::Unop {
            op,
            operand: Box::new(operand),
            pos,
        })
    }

    fn parse_accessors(&mut self) -> Result<Expr> {
        let base = self.parse_atom()?;
        let mut path = Vec::new();
        loop {
            if self.is_punct(".") {
                let key = match &self.peek_at(1).tok {
                    Tok::Ident(name) => name.clone(),
                    Tok::Keyword(k) => k.as_str().to_string(),
                    _ => break,
                };
                self.advance();
                let pos = self.advance().pos;
                path.push(Expr::literal(key, pos));
            } else if self.is_punct("[") {
                self.advance();
                path.push(self.parse_expr()?);
                self.expect_punct("]")?;
            } else {
                break;
            }
        }
        if path.is_empty() {
            return Ok(base);
        }
        let pos = base.pos();
        Ok(Expr::Accumulator {
            base: Box::new(base),
            path,
            pos,
        })
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        let pos = token.pos;
        match token.tok {
            Tok::Number(value) => {
                self.advance();
                Ok(Expr::Number { value, pos })
            }
            Tok::Bool(value) => {
                self.advance();
                Ok(Expr::Bool { value, pos })
            }
            Tok::Null => {
                self.advance();
                Ok(Expr::Null { pos })
            }
            Tok::Ident(name) => {
                self.advance();
                Ok(Expr::Ident { name, pos })
            }
            Tok::StringStart => self.parse_string(),
            Tok::Punct("(") => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect_punct(")")?;
                Ok(Expr::Parenthetical {
                    inner: Box::new(inner),
                    pos,
                })
            }
            Tok::Punct("{") => self.parse_object(),
            Tok::Punct("[") => self.parse_array(),
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_object(&mut self) -> Result<Expr> {
        let pos = self.expect_punct("{")?;
        let mut entries = Vec::new();
        while !self.is_punct("}") {
            let key = match self.peek().tok {
                Tok::Ident(_) => self.expect_ident()?.0,
                Tok::StringStart => self.parse_strict_string()?.0,
                _ => return Err(self.unexpected("object key")),
            };
            self.expect_punct(":")?;
            let value = self.parse_expr()?;
            entries.push((key, value));
            if !self.accept_punct(",") {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(Expr::Object { entries, pos })
    }

    fn parse_array(&mut self) -> Result<Expr> {
        let pos = self.expect_punct("[")?;
        let mut items = Vec::new();
        while !self.is_punct("]") {
            items.push(self.parse_expr()?);
            if !self.accept_punct(",") {
                break;
            }
        }
        self.expect_punct("]")?;
        Ok(Expr::Array { items, pos })
    }

    /// String literal with interpolations
    pub fn parse_string(&mut self) -> Result<Expr> {
        let pos = match self.peek().tok {
            Tok::StringStart => self.advance().pos,
            _ => return Err(self.unexpected("string")),
        };
        let mut parts = Vec::new();
        loop {
            match &self.peek().tok {
                Tok::Chunk(text) => {
                    let text = text.clone();
                    self.advance();
                    parts.push(StringPart::Chunk(text));
                }
                Tok::InterpStart => {
                    self.advance();
                    let expr = self.parse_expr()?;
                    if !matches!(self.peek().tok, Tok::InterpEnd) {
                        return Err(self.unexpected("'}}'"));
                    }
                    self.advance();
                    parts.push(StringPart::Expr(expr));
                }
                _ => break,
            }
        }
        Ok(Expr::String { parts, pos })
    }

    /// String literal that must not interpolate
    pub fn parse_strict_string(&mut self) -> Result<(String, Pos)> {
        let pos = match self.peek().tok {
            Tok::StringStart => self.advance().pos,
            _ => return Err(self.unexpected("string")),
        };
        let mut text = String::new();
        loop {
            match &self.peek().tok {
                Tok::Chunk(chunk) => {
                    text.push_str(chunk);
                    self.advance();
                }
                Tok::InterpStart => {
                    return Err(Error::parse(
                        ErrorKind::ForbiddenInterpolation,
                        "cannot interpolate here",
                        self.pos(),
                    ));
                }
                _ => break,
            }
        }
        Ok((text, pos))
    }
}

fn arity_error(name: &str, arity: usize, pos: Pos) -> Error {
    let message = match arity {
        0 => format!("pipe '{}' takes no arguments", name),
        1 => format!("pipe '{}' takes 1 argument", name),
        n => format!("pipe '{}' takes {} arguments", name, n),
    };
    Error::parse(ErrorKind::PipeArity, message, pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tokenizer::tokenize;

    /// Parse a whole interpolation body, `{{` and `}}` excluded
    fn expr(source: &str) -> Result<Expr> {
        let wrapped = format!("\"{{{{ {} }}}}\"", source);
        let mut tokens = Tokens::new(tokenize(&wrapped, 0)?);
        match tokens.parse_string()? {
            Expr::String { mut parts, .. } => match parts.pop() {
                Some(StringPart::Expr(e)) => Ok(e),
                other => panic!("unexpected parts: {:?}", other),
            },
            other => panic!("not a string: {:?}", other),
        }
    }

    /// Compact S-expression form for assertions
    fn show(e: &Expr) -> String {
        match e {
            Expr::Null { .. } => "null".into(),
            Expr::Bool { value, .. } => value.to_string(),
            Expr::Number { value, .. } => crate::value::format_number(*value),
            Expr::Ident { name, .. } => name.clone(),
            Expr::String { parts, .. } => format!(
                "'{}'",
                parts
                    .iter()
                    .map(|p| match p {
                        StringPart::Chunk(c) => c.clone(),
                        StringPart::Expr(e) => format!("{{{}}}", show(e)),
                    })
                    .collect::<String>()
            ),
            Expr::Accumulator { base, path, .. } => format!(
                "{}{}",
                show(base),
                path.iter().map(|p| format!("[{}]", show(p))).collect::<String>()
            ),
            Expr::Object { entries, .. } => format!(
                "{{{}}}",
                entries
                    .iter()
                    .map(|(k, v)| format!("{}:{}", k, show(v)))
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            Expr::Array { items, .. } => format!(
                "[{}]",
                items.iter().map(show).collect::<Vec<_>>().join(",")
            ),
            Expr::Ternary { condition, then, otherwise, .. } => {
                format!("({} ? {} : {})", show(condition), show(then), show(otherwise))
            }
            Expr::Unop { op, operand, .. } => format!("({}{})", op.as_str(), show(operand)),
            Expr::Binop { op, lhs, rhs, .. } => {
                format!("({} {} {})", show(lhs), op.as_str(), show(rhs))
            }
            Expr::Parenthetical { inner, .. } => show(inner),
            Expr::Pipe { name, target, args, .. } => format!(
                "({} | {}{})",
                show(target),
                name,
                args.iter().map(|a| format!(" {}", show(a))).collect::<String>()
            ),
        }
    }

    #[test]
    fn test_precedence() {
        assert_eq!(show(&expr("1 + 2 * 3").unwrap()), "(1 + (2 * 3))");
        assert_eq!(show(&expr("a || b && c == d").unwrap()), "(a || (b && (c == d)))");
        assert_eq!(show(&expr("1 - 2 - 3").unwrap()), "((1 - 2) - 3)");
        assert_eq!(show(&expr("a < b + 1").unwrap()), "(a < (b + 1))");
        assert_eq!(show(&expr("!a && -b").unwrap()), "((!a) && (-b))");
    }

    #[test]
    fn test_ternary_is_lowest_and_right_associative() {
        assert_eq!(
            show(&expr("a > 0 ? 'pos' : a < 0 ? 'neg' : 'zero'").unwrap()),
            "((a > 0) ? 'pos' : ((a < 0) ? 'neg' : 'zero'))"
        );
    }

    #[test]
    fn test_accessors() {
        assert_eq!(show(&expr("user.name").unwrap()), "user['name']");
        assert_eq!(show(&expr("rows[i + 1].cells[0]").unwrap()), "rows[(i + 1)]['cells'][0]");
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            show(&expr("{a: 1, 'b c': [true, null]}").unwrap()),
            "{a:1,b c:[true,null]}"
        );
        assert_eq!(show(&expr("'n={{ n }}'").unwrap()), "'n={n}'");
    }

    #[test]
    fn test_pipes_chain_left_to_right() {
        assert_eq!(
            show(&expr("name | trim | toupper").unwrap()),
            "((name | trim) | toupper)"
        );
        assert_eq!(
            show(&expr("items | slice 1 n - 1").unwrap()),
            "(items | slice 1 (n - 1))"
        );
        assert_eq!(
            show(&expr("items | map _a * 2 | join ', '").unwrap()),
            "((items | map (_a * 2)) | join ', ')"
        );
    }

    #[test]
    fn test_pipe_errors() {
        let err = expr("items | shout").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndeclaredPipe);
        assert_eq!(err.message, "Cannot pipe into: shout");

        let err = expr("items | length 2").unwrap_err();
        assert_eq!(err.kind, ErrorKind::PipeArity);
        assert!(err.message.contains("length"));

        let err = expr("items | map").unwrap_err();
        assert_eq!(err.kind, ErrorKind::PipeArity);
        assert!(err.message.contains("map"));
    }

    #[test]
    fn test_unexpected_token() {
        let err = expr("1 +").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedToken);
        assert_eq!(err.message, "expected expression, found '}}'");
    }
}
